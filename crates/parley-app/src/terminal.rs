//! Terminal presentation adapter and input parsing.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use parley_chat::{Presentation, TypingHandle};
use parley_core::Sender;

/// Renders the conversation to stdout and remembers the offered options so
/// numbered input can select them.
#[derive(Debug, Default)]
pub struct TerminalPresentation {
    options: Mutex<Vec<String>>,
    next_handle: AtomicU64,
}

impl TerminalPresentation {
    pub fn new() -> Self {
        Self::default()
    }

    /// The option shown as `[n]`, counting from 1.
    pub fn option_at(&self, n: usize) -> Option<String> {
        let options = self.options.lock().ok()?;
        n.checked_sub(1).and_then(|i| options.get(i).cloned())
    }

    fn print(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", line);
        let _ = out.flush();
    }
}

impl Presentation for TerminalPresentation {
    fn append_message(&self, sender: Sender, text: &str) {
        self.print(&format!("{:>4}> {}", sender.as_str(), text));
    }

    fn present_options(&self, options: &[String]) {
        if let Ok(mut current) = self.options.lock() {
            *current = options.to_vec();
        }
        for (i, option) in options.iter().enumerate() {
            self.print(&format!("      [{}] {}", i + 1, option));
        }
    }

    fn clear_options(&self) {
        if let Ok(mut current) = self.options.lock() {
            current.clear();
        }
    }

    fn clear_input(&self) {}

    fn show_typing(&self) -> TypingHandle {
        self.print("      ...");
        TypingHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    fn remove_typing(&self, _handle: TypingHandle) {}

    fn set_expanded(&self, expanded: bool) {
        self.print(if expanded {
            "(chat opened)"
        } else {
            "(chat closed)"
        });
    }
}

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Quit,
    Toggle,
    History,
    /// `/n` selects the n-th offered option.
    Select(usize),
    Text(&'a str),
}

pub fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    match line {
        "/quit" | "/exit" => Command::Quit,
        "/toggle" => Command::Toggle,
        "/history" => Command::History,
        _ => match line.strip_prefix('/').and_then(|n| n.parse::<usize>().ok()) {
            Some(n) => Command::Select(n),
            None => Command::Text(line),
        },
    }
}
