pub mod slack;

#[cfg(test)]
pub mod slack_mock;
