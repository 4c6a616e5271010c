//! Presentation collaborator: the sinks the engine writes to, plus a console renderer

use log::{debug, info, warn};
use std::time::Instant;

pub const PANEL_HEIGHT: f64 = 420.0;
pub const LETTER_HEIGHT: f64 = 24.0;
const PANEL_ROWS: usize = 20;

/// Rendered box of the falling letter, in panel pixels from the top.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterBox {
    pub top: f64,
    pub height: f64,
}

impl LetterBox {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Named effects the engine produces. Implementations own all layout and
/// animation; the engine only reads back the letter's rendered box.
pub trait Presentation {
    fn letter_bounds(&self) -> Option<LetterBox>;
    fn set_threshold(&mut self, offset: f64);
    fn set_fall_duration(&mut self, seconds: f64);
    fn spawn_letter(&mut self, letter: char);
    fn set_letter(&mut self, letter: char);
    /// Detach and reattach the letter node so its fall starts over.
    fn restart_letter(&mut self);
    /// Restart the letter's transition after a scoring guess. Idempotent.
    fn pulse_letter(&mut self);
    fn remove_letter(&mut self);
    fn display_score(&mut self, total: f64);
    fn display_current_score(&mut self, score: f64);
    fn display_rack(&mut self, rack: &str);
    fn display_previous_guesses(&mut self, guesses: &[String]);
    fn display_error(&mut self, message: &str);
    fn disable_input(&mut self);
}

struct FallingGlyph {
    character: char,
    fall_started: Instant,
}

/// Terminal renderer. Models the falling animation as a linear travel from
/// the threshold line to the panel floor over the fall-duration hint.
pub struct Renderer {
    threshold: f64,
    start_line_gap: f64,
    fall_duration: f64,
    letter: Option<FallingGlyph>,
    last_row: Option<usize>,
    input_enabled: bool,
}

impl Renderer {
    pub fn new(start_line_gap: f64, fall_duration: f64) -> Result<Self, Box<dyn std::error::Error>> {
        if fall_duration <= 0.0 {
            return Err(format!("fall duration must be positive, got {}", fall_duration).into());
        }

        Ok(Renderer {
            threshold: 0.0,
            start_line_gap,
            fall_duration,
            letter: None,
            last_row: None,
            input_enabled: true,
        })
    }

    /// Drops everything on screen, as a page reload would.
    pub fn reset(&mut self, fall_duration: f64) {
        self.threshold = 0.0;
        self.fall_duration = fall_duration;
        self.letter = None;
        self.last_row = None;
        self.input_enabled = true;
        println!("---- session restarted ----");
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    fn start_top(&self) -> f64 {
        (self.threshold / 100.0 * PANEL_HEIGHT).clamp(0.0, PANEL_HEIGHT - LETTER_HEIGHT)
    }

    fn restart_fall(&mut self) {
        if let Some(glyph) = self.letter.as_mut() {
            glyph.fall_started = Instant::now();
        }
        self.last_row = None;
    }

    fn draw_status(&mut self) {
        let (Some(glyph), Some(bounds)) = (self.letter.as_ref(), self.letter_bounds()) else {
            return;
        };

        let row = ((bounds.top / PANEL_HEIGHT) * PANEL_ROWS as f64) as usize;
        if self.last_row == Some(row) {
            return;
        }
        self.last_row = Some(row);

        let mut lane = vec!['.'; PANEL_ROWS];
        if let Some(cell) = lane.get_mut(row) {
            *cell = glyph.character;
        }
        let line_row = (((self.threshold + self.start_line_gap) / 100.0) * PANEL_ROWS as f64) as usize;
        if let Some(cell) = lane.get_mut(line_row) {
            if *cell == '.' {
                *cell = '-';
            }
        }

        let lane: String = lane.into_iter().collect();
        println!("|{}| board {:.2}%", lane, self.threshold);
    }
}

impl Presentation for Renderer {
    fn letter_bounds(&self) -> Option<LetterBox> {
        let glyph = self.letter.as_ref()?;
        let progress = (glyph.fall_started.elapsed().as_secs_f64() / self.fall_duration).min(1.0);
        let start = self.start_top();
        let end = PANEL_HEIGHT - LETTER_HEIGHT;

        Some(LetterBox {
            top: start + (end - start).max(0.0) * progress,
            height: LETTER_HEIGHT,
        })
    }

    fn set_threshold(&mut self, offset: f64) {
        self.threshold = offset;
        self.draw_status();
    }

    fn set_fall_duration(&mut self, seconds: f64) {
        if seconds > 0.0 {
            self.fall_duration = seconds;
        }
    }

    fn spawn_letter(&mut self, letter: char) {
        debug!("Spawning letter {}", letter);
        self.letter = Some(FallingGlyph {
            character: letter,
            fall_started: Instant::now(),
        });
        self.last_row = None;
    }

    fn set_letter(&mut self, letter: char) {
        if let Some(glyph) = self.letter.as_mut() {
            glyph.character = letter;
            self.last_row = None;
        }
    }

    fn restart_letter(&mut self) {
        self.restart_fall();
    }

    fn pulse_letter(&mut self) {
        self.restart_fall();
    }

    fn remove_letter(&mut self) {
        self.letter = None;
    }

    fn display_score(&mut self, total: f64) {
        println!("score: {}", total);
    }

    fn display_current_score(&mut self, score: f64) {
        if score > 0.0 {
            println!("+{}", score);
        }
    }

    fn display_rack(&mut self, rack: &str) {
        println!("rack: {}", rack);
    }

    fn display_previous_guesses(&mut self, guesses: &[String]) {
        println!("guessed: {}", guesses.join(" "));
    }

    fn display_error(&mut self, message: &str) {
        warn!("{}", message);
        eprintln!("{}", message);
    }

    fn disable_input(&mut self) {
        if self.input_enabled {
            info!("Input disabled");
        }
        self.input_enabled = false;
    }
}

#[cfg(test)]
pub mod testing {
    use super::{LetterBox, Presentation};

    #[derive(Debug, Clone, PartialEq)]
    pub enum Effect {
        Threshold(f64),
        FallDuration(f64),
        Spawn(char),
        Letter(char),
        Restart,
        Pulse,
        Remove,
        Score(f64),
        CurrentScore(f64),
        Rack(String),
        PreviousGuesses(Vec<String>),
        Error(String),
        DisableInput,
    }

    /// Records every effect; the letter box is set by the test.
    #[derive(Default)]
    pub struct Recorder {
        pub bounds: Option<LetterBox>,
        pub effects: Vec<Effect>,
    }

    impl Recorder {
        pub fn with_letter_at(top: f64) -> Self {
            Recorder {
                bounds: Some(LetterBox { top, height: 24.0 }),
                effects: Vec::new(),
            }
        }

        pub fn count(&self, matches: impl Fn(&Effect) -> bool) -> usize {
            self.effects.iter().filter(|e| matches(e)).count()
        }

        pub fn errors(&self) -> Vec<&str> {
            self.effects
                .iter()
                .filter_map(|e| match e {
                    Effect::Error(message) => Some(message.as_str()),
                    _ => None,
                })
                .collect()
        }
    }

    impl Presentation for Recorder {
        fn letter_bounds(&self) -> Option<LetterBox> {
            self.bounds
        }
        fn set_threshold(&mut self, offset: f64) {
            self.effects.push(Effect::Threshold(offset));
        }
        fn set_fall_duration(&mut self, seconds: f64) {
            self.effects.push(Effect::FallDuration(seconds));
        }
        fn spawn_letter(&mut self, letter: char) {
            self.effects.push(Effect::Spawn(letter));
        }
        fn set_letter(&mut self, letter: char) {
            self.effects.push(Effect::Letter(letter));
        }
        fn restart_letter(&mut self) {
            self.effects.push(Effect::Restart);
        }
        fn pulse_letter(&mut self) {
            self.effects.push(Effect::Pulse);
        }
        fn remove_letter(&mut self) {
            self.bounds = None;
            self.effects.push(Effect::Remove);
        }
        fn display_score(&mut self, total: f64) {
            self.effects.push(Effect::Score(total));
        }
        fn display_current_score(&mut self, score: f64) {
            self.effects.push(Effect::CurrentScore(score));
        }
        fn display_rack(&mut self, rack: &str) {
            self.effects.push(Effect::Rack(rack.to_string()));
        }
        fn display_previous_guesses(&mut self, guesses: &[String]) {
            self.effects.push(Effect::PreviousGuesses(guesses.to_vec()));
        }
        fn display_error(&mut self, message: &str) {
            self.effects.push(Effect::Error(message.to_string()));
        }
        fn disable_input(&mut self) {
            self.effects.push(Effect::DisableInput);
        }
    }
}
