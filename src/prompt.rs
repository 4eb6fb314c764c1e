//! User choices during setup
//!
//! Rendering menus is the host's business; sessions only need to ask for a choice from a
//! list or a line of text. Returning `None` means the user gave no answer (closed input,
//! Ctrl-D) and the session aborts cleanly.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::Mutex;

/// Source of user decisions
pub trait Prompter: Send + Sync {
    /// Pick one of `choices`, returning its index
    fn select(&self, message: &str, choices: &[String]) -> Option<usize>;

    /// Enter free text
    fn input(&self, message: &str) -> Option<String>;
}

/// Numbered menus on stderr, answers from stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompter;

impl StdinPrompter {
    fn read_line() -> Option<String> {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl Prompter for StdinPrompter {
    fn select(&self, message: &str, choices: &[String]) -> Option<usize> {
        if choices.is_empty() {
            return None;
        }

        let mut stderr = io::stderr();
        let _ = writeln!(stderr, "\n{}", message);
        for (i, choice) in choices.iter().enumerate() {
            let _ = writeln!(stderr, "  {}) {}", i + 1, choice);
        }

        loop {
            let _ = write!(stderr, "Enter a number [1-{}]: ", choices.len());
            let _ = stderr.flush();

            let answer = Self::read_line()?;
            if let Some(index) = parse_choice(&answer, choices) {
                return Some(index);
            }
            let _ = writeln!(stderr, "'{}' is not a valid choice.", answer);
        }
    }

    fn input(&self, message: &str) -> Option<String> {
        let mut stderr = io::stderr();
        let _ = write!(stderr, "{}: ", message);
        let _ = stderr.flush();

        Self::read_line()
    }
}

/// Accepts a 1-based index or the exact text of a choice
fn parse_choice(answer: &str, choices: &[String]) -> Option<usize> {
    if let Ok(number) = answer.parse::<usize>() {
        return (1..=choices.len()).contains(&number).then(|| number - 1);
    }
    choices
        .iter()
        .position(|choice| choice.eq_ignore_ascii_case(answer))
}

/// A pre-recorded answer for [`ScriptedPrompter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Choose the entry whose label contains this text
    Choose(String),
    /// Type this text
    Text(String),
    /// Give no answer
    Abort,
}

/// Replays a fixed list of answers, for embedding hosts and tests.
///
/// Running out of answers, or a `Choose` that matches nothing, counts as an abort.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Answer>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Messages that were asked so far
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn next(&self, message: &str) -> Option<Answer> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(message.to_string());
        }
        self.answers.lock().ok()?.pop_front()
    }
}

impl Prompter for ScriptedPrompter {
    fn select(&self, message: &str, choices: &[String]) -> Option<usize> {
        match self.next(message)? {
            Answer::Choose(wanted) => choices.iter().position(|c| c.contains(&wanted)),
            Answer::Text(_) | Answer::Abort => None,
        }
    }

    fn input(&self, message: &str) -> Option<String> {
        match self.next(message)? {
            Answer::Text(text) => Some(text),
            Answer::Choose(_) | Answer::Abort => None,
        }
    }
}
