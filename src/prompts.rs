use std::io::IsTerminal;

use dialoguer::{theme::ColorfulTheme, Confirm, Input, Password, Select};

use crate::errors::AppError;

/// Questions asked of the person running a command.
pub trait Prompter: Send + Sync {
    fn is_interactive(&self) -> bool;

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, AppError>;

    /// Returns the index of the chosen item.
    fn select(&self, prompt: &str, items: &[String]) -> Result<usize, AppError>;

    fn input(&self, prompt: &str, required: bool) -> Result<String, AppError>;

    fn password(&self, prompt: &str) -> Result<String, AppError>;
}

pub struct TerminalPrompter {
    interactive: bool,
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    pub fn new(no_prompt: bool) -> TerminalPrompter {
        TerminalPrompter {
            interactive: !no_prompt && std::io::stdin().is_terminal() && std::io::stderr().is_terminal(),
            theme: ColorfulTheme::default(),
        }
    }

    fn ensure_interactive(&self, prompt: &str) -> Result<(), AppError> {
        if self.interactive {
            Ok(())
        } else {
            Err(AppError::NoInteractivity(prompt.to_string()))
        }
    }
}

impl Prompter for TerminalPrompter {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, AppError> {
        self.ensure_interactive(prompt)?;

        let answer = Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(answer)
    }

    fn select(&self, prompt: &str, items: &[String]) -> Result<usize, AppError> {
        self.ensure_interactive(prompt)?;
        if items.is_empty() {
            return Err(AppError::UnexpectedError(format!("No options to choose from for \"{}\"", prompt)));
        }

        let index = Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact()?;
        Ok(index)
    }

    fn input(&self, prompt: &str, required: bool) -> Result<String, AppError> {
        self.ensure_interactive(prompt)?;

        let value = Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(!required)
            .interact_text()?;
        Ok(value.trim().to_string())
    }

    fn password(&self, prompt: &str) -> Result<String, AppError> {
        self.ensure_interactive(prompt)?;

        let value = Password::with_theme(&self.theme).with_prompt(prompt).interact()?;
        Ok(value)
    }
}

#[cfg(test)]
pub mod mock {
    use std::{collections::VecDeque, sync::Mutex};

    use crate::errors::AppError;

    use super::Prompter;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Answer {
        Confirm(bool),
        Select(usize),
        Input(String),
    }

    /// Replays scripted answers in order and records every question.
    pub struct MockPrompter {
        interactive: bool,
        answers: Mutex<VecDeque<Answer>>,
        questions: Mutex<Vec<String>>,
    }

    impl MockPrompter {
        pub fn new(answers: Vec<Answer>) -> MockPrompter {
            MockPrompter {
                interactive: true,
                answers: Mutex::new(answers.into()),
                questions: Mutex::new(vec![]),
            }
        }

        pub fn non_interactive() -> MockPrompter {
            MockPrompter {
                interactive: false,
                ..MockPrompter::new(vec![])
            }
        }

        pub fn questions(&self) -> Vec<String> {
            self.questions.lock().unwrap().clone()
        }

        fn next(&self, prompt: &str) -> Result<Answer, AppError> {
            self.questions.lock().unwrap().push(prompt.to_string());
            if !self.interactive {
                return Err(AppError::NoInteractivity(prompt.to_string()));
            }

            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AppError::UnexpectedError(format!("No scripted answer for \"{}\"", prompt)))
        }
    }

    impl Prompter for MockPrompter {
        fn is_interactive(&self) -> bool {
            self.interactive
        }

        fn confirm(&self, prompt: &str, _default: bool) -> Result<bool, AppError> {
            match self.next(prompt)? {
                Answer::Confirm(answer) => Ok(answer),
                other => Err(AppError::UnexpectedError(format!("Expected a confirmation, got {:?}", other))),
            }
        }

        fn select(&self, prompt: &str, _items: &[String]) -> Result<usize, AppError> {
            match self.next(prompt)? {
                Answer::Select(index) => Ok(index),
                other => Err(AppError::UnexpectedError(format!("Expected a selection, got {:?}", other))),
            }
        }

        fn input(&self, prompt: &str, _required: bool) -> Result<String, AppError> {
            match self.next(prompt)? {
                Answer::Input(value) => Ok(value),
                other => Err(AppError::UnexpectedError(format!("Expected text input, got {:?}", other))),
            }
        }

        fn password(&self, prompt: &str) -> Result<String, AppError> {
            self.input(prompt, true)
        }
    }
}
