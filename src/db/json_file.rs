use std::{fs, io::ErrorKind, path::Path};

use serde::{de::DeserializeOwned, Serialize};

use crate::errors::AppError;

/// Reads a JSON document, treating a missing or blank file as the default value.
pub fn read_json_file<T>(path: &Path) -> Result<T, AppError>
where
    T: DeserializeOwned + Default,
{
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(T::default()),
        Err(error) => return Err(error.into()),
    };

    if bytes.iter().all(|byte| byte.is_ascii_whitespace()) {
        return Ok(T::default());
    }

    serde_json::from_slice(&bytes).map_err(|source| AppError::UnableToParseJSON {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes pretty JSON readable only by the current user.
pub fn write_json_file<T>(path: &Path, value: &T) -> Result<(), AppError>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');
    fs::write(path, body)?;
    restrict_permissions(path)?;

    tracing::debug!(path = %path.display(), "Wrote JSON file");
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), AppError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), AppError> {
    Ok(())
}
