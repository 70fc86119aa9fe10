use std::fs::OpenOptions;
use std::io::{BufWriter, Write};

use crate::api::{ChatMessage, ROLE_USER};

/// Plain-text transcript of a session, appended to a user-chosen file.
pub struct LoggingState {
    file_path: Option<String>,
}

impl LoggingState {
    /// Without a file every log call is a no-op.
    pub fn new(log_file: Option<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut logging = LoggingState { file_path: None };
        if let Some(path) = log_file {
            logging.set_log_file(path)?;
        }
        Ok(logging)
    }

    pub fn set_log_file(&mut self, path: String) -> Result<(), Box<dyn std::error::Error>> {
        // Fail now rather than on the first message.
        OpenOptions::new().create(true).append(true).open(&path)?;
        self.file_path = Some(path);
        Ok(())
    }

    pub fn log_message(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        match &self.file_path {
            Some(path) => write_block(path, content),
            None => Ok(()),
        }
    }

    /// User turns are prefixed with `>`; everything else is written as is.
    pub fn log_chat_message(&self, message: &ChatMessage) -> Result<(), Box<dyn std::error::Error>> {
        let text = match &message.content {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        if message.role == ROLE_USER {
            let quoted = text
                .lines()
                .map(|line| format!("> {line}"))
                .collect::<Vec<_>>()
                .join("\n");
            self.log_message(&quoted)
        } else {
            self.log_message(&text)
        }
    }
}

fn write_block(path: &str, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);

    for line in content.lines() {
        writeln!(writer, "{line}")?;
    }
    // Blank line between entries.
    writeln!(writer)?;

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn logger_without_file_writes_nothing() {
        let logging = LoggingState::new(None).expect("logger");
        logging.log_message("ignored").expect("no-op");
        logging
            .log_chat_message(&ChatMessage::user("ignored"))
            .expect("no-op");
    }

    #[test]
    fn transcript_quotes_user_turns_and_separates_entries() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("session.log");
        let path_str = path.to_string_lossy().into_owned();

        let logging = LoggingState::new(Some(path_str)).expect("logger");
        logging
            .log_chat_message(&ChatMessage::user("first line\nsecond line"))
            .expect("log user");
        logging
            .log_message("## reasoning summary\nweighed options")
            .expect("log reasoning");
        logging
            .log_chat_message(&ChatMessage::assistant("answer"))
            .expect("log assistant");

        let contents = fs::read_to_string(&path).expect("read log");
        assert_eq!(
            contents,
            "> first line\n> second line\n\n## reasoning summary\nweighed options\n\nanswer\n\n"
        );
    }

    #[test]
    fn reopening_appends_to_existing_transcript() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("session.log");
        let path_str = path.to_string_lossy().into_owned();

        LoggingState::new(Some(path_str.clone()))
            .expect("logger")
            .log_message("one")
            .expect("log");
        LoggingState::new(Some(path_str))
            .expect("logger")
            .log_message("two")
            .expect("log");

        assert_eq!(fs::read_to_string(&path).expect("read log"), "one\n\ntwo\n\n");
    }

    #[test]
    fn unwritable_path_is_rejected_up_front() {
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("missing").join("log.txt");
        assert!(LoggingState::new(Some(missing.to_string_lossy().into_owned())).is_err());
    }
}
