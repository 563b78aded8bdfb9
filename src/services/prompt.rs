//! Interactive Confirmation
//!
//! Yes/no questions asked by the update path. Behind a trait so tests can
//! script the answers.

use std::io::{BufRead, Write};

use async_trait::async_trait;

#[async_trait]
pub trait Prompter: Send + Sync {
    /// Ask `message`; an empty answer takes `default`.
    async fn confirm(&self, message: &str, default: bool) -> bool;
}

/// Reads answers from the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompter;

/// Interpret one line of user input.
pub fn parse_answer(line: &str, default: bool) -> bool {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    }
}

#[async_trait]
impl Prompter for StdinPrompter {
    async fn confirm(&self, message: &str, default: bool) -> bool {
        let hint = if default { "Y/n" } else { "y/N" };
        let question = format!("? {} ({}) ", message, hint);

        let answer = tokio::task::spawn_blocking(move || {
            let mut stdout = std::io::stdout();
            let _ = write!(stdout, "{}", question);
            let _ = stdout.flush();

            let mut line = String::new();
            match std::io::stdin().lock().read_line(&mut line) {
                // Closed stdin cannot answer; treat as a decline.
                Ok(0) | Err(_) => None,
                Ok(_) => Some(line),
            }
        })
        .await
        .ok()
        .flatten();

        match answer {
            Some(line) => parse_answer(&line, default),
            None => false,
        }
    }
}
