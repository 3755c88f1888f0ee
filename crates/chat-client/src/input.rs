use std::path::{Path, PathBuf};

use thiserror::Error;

pub const ATTACHMENT_EXTENSION: &str = "pdf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Approve,
    Modify(Option<String>),
    Attach(PathBuf),
    SignIn,
    SignOut,
    Sidebar,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("unknown command: {0} (try /help)")]
    UnknownCommand(String),
    #[error("{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("only .pdf files can be attached: {0}")]
    UnsupportedAttachment(String),
}

/// Collects typed lines into one submission. A trailing backslash keeps the
/// message open on the next line; any other line submits it.
#[derive(Debug, Default)]
pub struct InputBuffer {
    pending: Vec<String>,
}

impl InputBuffer {
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(continued) = line.strip_suffix('\\') {
            self.pending.push(continued.to_string());
            return None;
        }

        self.pending.push(line.to_string());
        let submitted = self.pending.join("\n");
        self.pending.clear();
        Some(submitted)
    }

    pub fn is_continuing(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Blank submissions yield `Ok(None)`. A leading `//` sends the text with a
/// single slash instead of running a command.
pub fn parse_submission(text: &str) -> Result<Option<Command>, InputError> {
    if text.trim().is_empty() {
        return Ok(None);
    }

    let trimmed = text.trim_start();
    if let Some(escaped) = trimmed.strip_prefix("//") {
        return Ok(Some(Command::Send(format!("/{escaped}"))));
    }

    let Some(command_line) = trimmed.strip_prefix('/') else {
        return Ok(Some(Command::Send(text.to_string())));
    };

    let (name, argument) = match command_line.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (command_line.trim(), ""),
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "approve" => Command::Approve,
        "modify" => Command::Modify(non_empty(argument)),
        "attach" => {
            let path = non_empty(argument).ok_or(InputError::MissingArgument("/attach"))?;
            let path = PathBuf::from(path);
            if !is_supported_attachment(&path) {
                return Err(InputError::UnsupportedAttachment(
                    path.display().to_string(),
                ));
            }
            Command::Attach(path)
        }
        "login" | "signin" => Command::SignIn,
        "logout" | "signout" => Command::SignOut,
        "sidebar" => Command::Sidebar,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(InputError::UnknownCommand(format!("/{other}"))),
    };

    Ok(Some(command))
}

pub fn is_supported_attachment(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case(ATTACHMENT_EXTENSION))
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{Command, InputBuffer, InputError, parse_submission};

    #[test]
    fn enter_submits_and_trailing_backslash_continues() {
        let mut buffer = InputBuffer::default();

        assert_eq!(buffer.push_line("plan my biology\\"), None);
        assert!(buffer.is_continuing());
        assert_eq!(
            buffer.push_line("exam study\n"),
            Some("plan my biology\nexam study".to_string())
        );
        assert!(!buffer.is_continuing());
        assert_eq!(buffer.push_line("hi"), Some("hi".to_string()));
    }

    #[test]
    fn blank_submissions_are_ignored() {
        assert_eq!(parse_submission(""), Ok(None));
        assert_eq!(parse_submission("   \n "), Ok(None));
    }

    #[test]
    fn plain_text_is_sent_verbatim() {
        assert_eq!(
            parse_submission("  plan my week "),
            Ok(Some(Command::Send("  plan my week ".to_string())))
        );
        assert_eq!(
            parse_submission("//approve is a word"),
            Ok(Some(Command::Send("/approve is a word".to_string())))
        );
    }

    #[test]
    fn proposal_commands_parse_with_optional_feedback() {
        assert_eq!(parse_submission("/approve"), Ok(Some(Command::Approve)));
        assert_eq!(parse_submission("/modify"), Ok(Some(Command::Modify(None))));
        assert_eq!(
            parse_submission("/MODIFY  fewer hours on weekends "),
            Ok(Some(Command::Modify(Some(
                "fewer hours on weekends".to_string()
            ))))
        );
    }

    #[test]
    fn attach_accepts_only_pdf_files() {
        assert_eq!(
            parse_submission("/attach notes/Biology.PDF"),
            Ok(Some(Command::Attach(PathBuf::from("notes/Biology.PDF"))))
        );
        assert_eq!(
            parse_submission("/attach notes.docx"),
            Err(InputError::UnsupportedAttachment("notes.docx".to_string()))
        );
        assert_eq!(
            parse_submission("/attach"),
            Err(InputError::MissingArgument("/attach"))
        );
    }

    #[test]
    fn unknown_commands_are_rejected() {
        assert_eq!(
            parse_submission("/dance"),
            Err(InputError::UnknownCommand("/dance".to_string()))
        );
        assert_eq!(parse_submission("/quit"), Ok(Some(Command::Quit)));
        assert_eq!(parse_submission("/login"), Ok(Some(Command::SignIn)));
        assert_eq!(parse_submission("/logout"), Ok(Some(Command::SignOut)));
    }
}
