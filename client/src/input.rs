//! Guess input normalisation with sequencing

use log::warn;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq)]
pub struct GuessInput {
    pub sequence: u32,
    pub timestamp: u64,
    pub text: String,
}

/// Turns raw input lines into guesses the server understands
pub struct InputManager {
    next_sequence: u32,
    max_letters: usize,
    last_input: Option<GuessInput>,
}

impl InputManager {
    pub fn new(max_letters: usize) -> Self {
        Self {
            next_sequence: 1,
            max_letters,
            last_input: None,
        }
    }

    /// Uppercases the line and drops anything that isn't a letter.
    /// Returns None when nothing is left to guess.
    pub fn capture(&mut self, line: &str) -> Option<GuessInput> {
        let text: String = line
            .chars()
            .filter(|c| c.is_alphabetic())
            .flat_map(char::to_uppercase)
            .collect();

        if text.is_empty() {
            return None;
        }

        // The server has the final say on validity
        if text.chars().count() > self.max_letters {
            warn!("Guess {} is longer than the {} letter rack", text, self.max_letters);
        }

        let input = GuessInput {
            sequence: self.next_sequence,
            timestamp: Self::get_timestamp(),
            text,
        };
        self.next_sequence += 1;
        self.last_input = Some(input.clone());

        Some(input)
    }

    pub fn last_input(&self) -> Option<&GuessInput> {
        self.last_input.as_ref()
    }

    fn get_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_millis() as u64
    }
}
