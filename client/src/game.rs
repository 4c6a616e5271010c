use crate::guess::GuessCoordinator;
use crate::letter::FallingLetterLifecycle;
use crate::network::Completion;
use crate::push::{self, PushEffect, PushMessage, RestartWatch};
use crate::rendering::Presentation;
use log::{debug, info, warn};
use shared::{Request, Tuning, GAME_OVER_MESSAGE};

/// Position of the fail line and how fast it sinks.
///
/// `threshold_offset` only grows under the clock. Guesses pull it back up
/// and a bingo resets it; nothing else lowers it.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardState {
    pub threshold_offset: f64,
    pub fall_rate: f64,
    pub fall_duration_hint: f64,
    initial_fall_rate: f64,
    initial_fall_duration: f64,
}

impl BoardState {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            threshold_offset: 0.0,
            fall_rate: tuning.initial_fall_rate,
            fall_duration_hint: tuning.initial_fall_duration,
            initial_fall_rate: tuning.initial_fall_rate,
            initial_fall_duration: tuning.initial_fall_duration,
        }
    }

    /// One frame of sinking. Frame length is deliberately ignored.
    pub fn advance(&mut self) {
        self.threshold_offset += self.fall_rate;
    }

    pub fn escalate(&mut self, acceleration: f64, deceleration: f64) {
        self.fall_rate *= acceleration;
        self.fall_duration_hint *= deceleration;
    }

    /// Pulls the threshold back towards the start line, never above it.
    pub fn relieve(&mut self, amount: f64) {
        self.threshold_offset = (self.threshold_offset - amount).max(0.0);
    }

    pub fn reset(&mut self) {
        self.threshold_offset = 0.0;
        self.fall_rate = self.initial_fall_rate;
        self.fall_duration_hint = self.initial_fall_duration;
    }

    pub fn bonus_eligible(&self, margin: f64) -> bool {
        self.threshold_offset <= margin
    }

    pub fn is_fatal(&self, limit: f64) -> bool {
        self.threshold_offset > limit
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreState {
    pub current_score: f64,
    pub total_score: f64,
    /// Display only; never read back for game logic.
    pub previous_guesses: Vec<String>,
}

impl ScoreState {
    pub fn record(&mut self, current_score: f64, total_score: f64) {
        if total_score < self.total_score {
            warn!(
                "Server total went down from {} to {}",
                self.total_score, total_score
            );
        }
        self.current_score = current_score.max(0.0);
        self.total_score = total_score;
    }

    pub fn replace_previous_guesses(&mut self, guesses: Vec<String>) {
        self.previous_guesses = guesses;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Started,
    Terminated,
}

#[derive(Debug, Clone)]
pub struct GameSession {
    phase: Phase,
}

impl GameSession {
    pub fn new() -> Self {
        Self {
            phase: Phase::NotStarted,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_started(&self) -> bool {
        self.phase != Phase::NotStarted
    }

    pub fn is_terminated(&self) -> bool {
        self.phase == Phase::Terminated
    }

    /// Returns true only on the first call that actually starts the session.
    pub fn start(&mut self) -> bool {
        if self.phase == Phase::NotStarted {
            self.phase = Phase::Started;
            return true;
        }
        false
    }

    /// Returns true only on the single transition into `Terminated`.
    pub fn terminate(&mut self) -> bool {
        if self.phase == Phase::Terminated {
            return false;
        }
        self.phase = Phase::Terminated;
        true
    }
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Session is over; the caller must stop scheduling ticks.
    Halted,
    Idle,
    Falling,
    Replaced { requests: Vec<Request> },
    Terminated,
}

/// Everything the clock and the network completions mutate.
///
/// Clock ticks and completions interleave on one task with no locking.
/// Writes to the board are last-writer-wins: the clock only adds
/// `fall_rate`, and scoring applies a clamped relief or a reset, so a lost
/// update costs at most one frame of drift.
pub struct GameState {
    pub tuning: Tuning,
    pub board: BoardState,
    pub score: ScoreState,
    pub session: GameSession,
    pub letter: FallingLetterLifecycle,
    pub guesses: GuessCoordinator,
    pub restart: RestartWatch,
}

impl GameState {
    pub fn new(tuning: Tuning) -> Self {
        Self {
            board: BoardState::new(&tuning),
            score: ScoreState::default(),
            session: GameSession::new(),
            letter: FallingLetterLifecycle::new(),
            guesses: GuessCoordinator::new(),
            restart: RestartWatch::default(),
            tuning,
        }
    }

    /// Puts the first letter on screen and asks the server for its glyph.
    pub fn begin(&mut self, view: &mut dyn Presentation) -> Vec<Request> {
        view.set_threshold(self.board.threshold_offset);
        view.set_fall_duration(self.board.fall_duration_hint);
        self.letter.spawn(view)
    }

    pub fn tick(&mut self, view: &mut dyn Presentation) -> TickOutcome {
        if self.session.is_terminated() {
            return TickOutcome::Halted;
        }
        if !self.session.is_started() || !self.letter.is_live() {
            return TickOutcome::Idle;
        }
        let Some(bounds) = view.letter_bounds() else {
            return TickOutcome::Idle;
        };

        self.board.advance();
        view.set_threshold(self.board.threshold_offset);
        view.set_fall_duration(self.board.fall_duration_hint);

        if bounds.bottom() <= self.tuning.fall_boundary {
            return TickOutcome::Falling;
        }

        if self.board.is_fatal(self.tuning.fatal_limit) {
            self.letter.remove(view);
            if self.session.terminate() {
                info!(
                    "GAME OVER at threshold {:.2} with score {}",
                    self.board.threshold_offset, self.score.total_score
                );
                view.display_rack(GAME_OVER_MESSAGE);
                view.disable_input();
            }
            return TickOutcome::Terminated;
        }

        self.board
            .escalate(self.tuning.acceleration, self.tuning.deceleration);
        debug!(
            "Letter expired, fall rate now {:.6}, fall duration {:.2}s",
            self.board.fall_rate, self.board.fall_duration_hint
        );

        TickOutcome::Replaced {
            requests: self.letter.replace(view),
        }
    }

    pub fn submit_guess(&mut self, guess: &str) -> Vec<Request> {
        self.guesses
            .submit(guess, &self.board, &self.session, &self.tuning)
    }

    pub fn apply_completion(&mut self, completion: Completion, view: &mut dyn Presentation) {
        if self.session.is_terminated() {
            debug!("Dropping completion after game over: {:?}", completion);
            return;
        }

        if completion.is_success() && self.session.start() {
            info!("Game started");
        }

        match completion {
            Completion::Tile(result) => self.letter.apply_tile(result, view),
            Completion::LetterAccepted(result) => self.letter.apply_rack_snapshot(result, view),
            Completion::Guess { guess, result } => self.guesses.apply_reply(
                &guess,
                result,
                &mut self.board,
                &mut self.score,
                &self.tuning,
                view,
            ),
            Completion::PreviousGuesses(result) => {
                self.guesses
                    .apply_previous_guesses(result, &mut self.score, view)
            }
        }
    }

    pub fn apply_push(&mut self, message: PushMessage, view: &mut dyn Presentation) -> PushEffect {
        push::merge(self, message, view)
    }
}
