//! Guess submission and merging of the server's authoritative scoring reply

use crate::game::{BoardState, GameSession, ScoreState};
use crate::network::{GatewayError, GuessOutcome};
use crate::rendering::Presentation;
use log::{debug, info, warn};
use shared::{GuessReply, Request, ScoreFeed, Tuning};

#[derive(Debug, Default)]
pub struct GuessCoordinator {
    last_guess: Option<String>,
    submitted: u32,
}

impl GuessCoordinator {
    pub fn new() -> Self {
        Self {
            last_guess: None,
            submitted: 0,
        }
    }

    pub fn last_guess(&self) -> Option<&str> {
        self.last_guess.as_deref()
    }

    pub fn submitted(&self) -> u32 {
        self.submitted
    }

    /// Builds the guess call and the independent previous-guesses refresh.
    /// Silent no-op once the game is over.
    pub fn submit(
        &mut self,
        guess: &str,
        board: &BoardState,
        session: &GameSession,
        tuning: &Tuning,
    ) -> Vec<Request> {
        if session.is_terminated() {
            debug!("Ignoring guess {} after game over", guess);
            return Vec::new();
        }

        let bonus = board.bonus_eligible(tuning.bonus_margin);
        self.last_guess = Some(guess.to_string());
        self.submitted += 1;
        debug!("Submitting guess #{} {} (bonus: {})", self.submitted, guess, bonus);

        vec![
            Request::GuessWord {
                guess: guess.to_string(),
                bonus,
            },
            Request::PreviousGuesses,
        ]
    }

    pub fn apply_reply(
        &mut self,
        guess: &str,
        result: Result<GuessOutcome, GatewayError>,
        board: &mut BoardState,
        score: &mut ScoreState,
        tuning: &Tuning,
        view: &mut dyn Presentation,
    ) {
        let reply = match result {
            Ok(GuessOutcome::Scored(reply)) => reply,
            Ok(GuessOutcome::Status { text, url }) => {
                if tuning.score_feed == ScoreFeed::Reply {
                    warn!("Guess {} answered without a score: {}", guess, text);
                    let error = GatewayError::Malformed {
                        url,
                        reason: format!("expected a scored reply, got {:?}", text),
                    };
                    view.display_error(&error.describe());
                } else {
                    debug!("Guess {} acknowledged: {}", guess, text);
                }
                return;
            }
            Err(e) => {
                view.display_error(&e.describe());
                return;
            }
        };

        self.merge_reply(guess, reply, board, score, tuning, view);
    }

    fn merge_reply(
        &mut self,
        guess: &str,
        reply: GuessReply,
        board: &mut BoardState,
        score: &mut ScoreState,
        tuning: &Tuning,
        view: &mut dyn Presentation,
    ) {
        debug!("Guess {} scored {} ({})", guess, reply.current_score, reply.status);

        score.record(reply.current_score, reply.score);
        view.display_current_score(score.current_score);
        view.display_score(score.total_score);
        if !reply.tiles.is_empty() {
            view.display_rack(&reply.tiles);
        }
        if let Some(transcript) = reply.previous_guesses {
            score.replace_previous_guesses(transcript.into_entries());
            view.display_previous_guesses(&score.previous_guesses);
        }

        if tuning.score_feed == ScoreFeed::Reply {
            self.apply_current_score(score.current_score, guess.chars().count(), board, tuning, view);
        }
    }

    /// Score-driven board movement. Returns true if the board moved.
    pub fn apply_current_score(
        &self,
        current_score: f64,
        guess_len: usize,
        board: &mut BoardState,
        tuning: &Tuning,
        view: &mut dyn Presentation,
    ) -> bool {
        if current_score <= 0.0 {
            return false;
        }

        // Relief follows the configured policy; the default gives back half
        // the awarded points, clamped at the start line.
        board.relieve(tuning.score_policy.relief(current_score));

        if tuning.reset_trigger.fires(guess_len, tuning.max_letters) {
            info!("Bingo! Difficulty reset");
            board.reset();
            view.set_fall_duration(board.fall_duration_hint);
        }

        view.set_threshold(board.threshold_offset);
        view.pulse_letter();
        true
    }

    pub fn apply_previous_guesses(
        &mut self,
        result: Result<Vec<String>, GatewayError>,
        score: &mut ScoreState,
        view: &mut dyn Presentation,
    ) {
        match result {
            Ok(guesses) => {
                score.replace_previous_guesses(guesses);
                view.display_previous_guesses(&score.previous_guesses);
            }
            Err(e) => view.display_error(&e.describe()),
        }
    }
}
