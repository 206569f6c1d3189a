//! Dialog boundary: pickers, error messages and confirmations.
//!
//! Every prompt may come back empty or negative; callers treat that as
//! "cancelled, no state change".

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::error;

pub trait Dialogs: Send + Sync {
    fn pick_directory(&self, start: &Path) -> Option<PathBuf>;
    fn pick_file(&self, start: &Path) -> Option<PathBuf>;
    fn show_error(&self, message: &str);
    fn confirm(&self, title: &str, message: &str) -> bool;
}

/// Prompts on the controlling terminal (stderr for questions, stdin for answers).
pub struct TerminalDialogs;

impl TerminalDialogs {
    fn ask(question: &str) -> Option<String> {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "{question}");
        let _ = stderr.flush();
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let answer = line.trim();
                (!answer.is_empty()).then(|| answer.to_string())
            }
        }
    }
}

impl Dialogs for TerminalDialogs {
    fn pick_directory(&self, start: &Path) -> Option<PathBuf> {
        Self::ask(&format!("Directory (in {}): ", start.display())).map(|answer| resolve_answer(start, &answer))
    }

    fn pick_file(&self, start: &Path) -> Option<PathBuf> {
        Self::ask(&format!("File (in {}): ", start.display())).map(|answer| resolve_answer(start, &answer))
    }

    fn show_error(&self, message: &str) {
        eprintln!("error: {message}");
    }

    fn confirm(&self, title: &str, message: &str) -> bool {
        Self::ask(&format!("{title}: {message} [y/N] "))
            .is_some_and(|a| matches!(a.to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

/// A typed answer: absolute paths stand, relative ones are taken from `start`.
pub fn resolve_answer(start: &Path, answer: &str) -> PathBuf {
    let path = PathBuf::from(answer);
    if path.is_absolute() { path } else { start.join(path) }
}

/// For non-interactive front ends: never picks, never confirms, logs errors.
pub struct HeadlessDialogs;

impl Dialogs for HeadlessDialogs {
    fn pick_directory(&self, _start: &Path) -> Option<PathBuf> {
        None
    }

    fn pick_file(&self, _start: &Path) -> Option<PathBuf> {
        None
    }

    fn show_error(&self, message: &str) {
        error!("{message}");
    }

    fn confirm(&self, _title: &str, _message: &str) -> bool {
        false
    }
}
