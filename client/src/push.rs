//! Server push channels: event-stream decoding, snapshot merging and
//! server-restart detection

use crate::game::GameState;
use crate::network::{Gateway, GatewayError};
use crate::rendering::Presentation;
use log::{debug, info, warn};
use shared::{parse_score, Concern, ScoreFeed, ScoreUpdate, Transcript};
use tokio::sync::mpsc;

#[derive(Debug)]
pub struct PushMessage {
    pub concern: Concern,
    pub payload: Result<String, GatewayError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushEffect {
    Applied,
    Ignored,
    /// The server session restarted; all local state must be discarded.
    Reload,
}

/// Watches the start channel. The first signal starts the game, any later
/// one means the server restarted underneath us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartWatch {
    #[default]
    AwaitingFirst,
    Active,
}

impl RestartWatch {
    /// Returns true when the signal means a restart.
    pub fn observe(&mut self) -> bool {
        match self {
            RestartWatch::AwaitingFirst => {
                *self = RestartWatch::Active;
                false
            }
            RestartWatch::Active => true,
        }
    }
}

/// Incremental `text/event-stream` decoder. Only `data` fields are kept;
/// multi-line data is joined with `\n`.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|pair| pair == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(data) = parse_event(&block[..end]) {
                events.push(data);
            }
        }
        events
    }
}

fn parse_event(block: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(block);
    let mut data = Vec::new();

    for line in text.split('\n') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            data.push(value);
        }
    }

    if data.is_empty() {
        None
    } else {
        Some(data.join("\n"))
    }
}

/// Streams one concern until the connection fails or closes. Not retried.
pub async fn run_channel(gateway: Gateway, concern: Concern, tx: mpsc::UnboundedSender<PushMessage>) {
    let mut response = match gateway.open_stream(concern.path()).await {
        Ok(response) => response,
        Err(e) => {
            let _ = tx.send(PushMessage {
                concern,
                payload: Err(e),
            });
            return;
        }
    };
    info!("Push channel {:?} open", concern);

    let url = gateway.url(concern.path());
    let mut decoder = EventStreamDecoder::new();
    loop {
        let failure = match response.chunk().await {
            Ok(Some(bytes)) => {
                for data in decoder.feed(&bytes) {
                    let message = PushMessage {
                        concern,
                        payload: Ok(data),
                    };
                    if tx.send(message).is_err() {
                        return;
                    }
                }
                continue;
            }
            Ok(None) => GatewayError::Closed { url },
            Err(source) => GatewayError::Transport { url, source },
        };

        warn!("Push channel {:?} ended: {}", concern, failure);
        let _ = tx.send(PushMessage {
            concern,
            payload: Err(failure),
        });
        return;
    }
}

/// Applies one pushed snapshot. Every payload replaces the matching state.
pub fn merge(state: &mut GameState, message: PushMessage, view: &mut dyn Presentation) -> PushEffect {
    let PushMessage { concern, payload } = message;

    let payload = match payload {
        Ok(payload) => payload,
        Err(e) => {
            if !state.session.is_terminated() {
                view.display_error(&e.describe());
            }
            return PushEffect::Ignored;
        }
    };

    // A restart must reload even a finished game, so it skips the game-over gate.
    if concern == Concern::Started {
        if state.restart.observe() {
            info!("Server session restarted, reloading");
            return PushEffect::Reload;
        }
        if state.session.start() {
            info!("Game started");
        }
        return PushEffect::Applied;
    }

    if state.session.is_terminated() {
        debug!("Dropping {:?} push after game over", concern);
        return PushEffect::Ignored;
    }

    match concern {
        Concern::PreviousGuesses => {
            let guesses = Transcript::parse(&payload).into_entries();
            state.score.replace_previous_guesses(guesses);
            view.display_previous_guesses(&state.score.previous_guesses);
        }
        Concern::Rack => view.display_rack(payload.trim()),
        Concern::TotalScore => match parse_score(&payload) {
            Some(total) => {
                let current = state.score.current_score;
                state.score.record(current, total);
                view.display_score(state.score.total_score);
            }
            None => return malformed(concern, &payload, view),
        },
        Concern::CurrentScore => {
            let Some(update) = ScoreUpdate::parse(&payload) else {
                return malformed(concern, &payload, view);
            };
            let total = state.score.total_score;
            state.score.record(update.score, total);
            view.display_current_score(state.score.current_score);

            if state.tuning.score_feed == ScoreFeed::Push {
                let guess_len = update
                    .word
                    .as_deref()
                    .or(state.guesses.last_guess())
                    .map(|word| word.chars().count())
                    .unwrap_or(0);
                state.guesses.apply_current_score(
                    state.score.current_score,
                    guess_len,
                    &mut state.board,
                    &state.tuning,
                    view,
                );
            }
        }
        Concern::Started => {}
    }

    PushEffect::Applied
}

fn malformed(concern: Concern, payload: &str, view: &mut dyn Presentation) -> PushEffect {
    let error = GatewayError::Malformed {
        url: concern.path().to_string(),
        reason: format!("unexpected payload {:?}", payload),
    };
    view.display_error(&error.describe());
    PushEffect::Ignored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::testing::{Effect, Recorder};
    use assert_approx_eq::assert_approx_eq;
    use shared::Tuning;

    fn ok(concern: Concern, payload: &str) -> PushMessage {
        PushMessage {
            concern,
            payload: Ok(payload.to_string()),
        }
    }

    fn push_state() -> GameState {
        let tuning = Tuning {
            score_feed: ScoreFeed::Push,
            ..Tuning::default()
        };
        GameState::new(tuning)
    }

    #[test]
    fn test_decoder_single_event() {
        let mut decoder = EventStreamDecoder::new();
        assert_eq!(decoder.feed(b"data: HELLO\n\n"), vec!["HELLO"]);
    }

    #[test]
    fn test_decoder_split_chunks_and_crlf() {
        let mut decoder = EventStreamDecoder::new();
        assert!(decoder.feed(b"data: AB").is_empty());
        assert!(decoder.feed(b"C\r\n").is_empty());
        assert_eq!(decoder.feed(b"\r\ndata: next\r\n\r\n"), vec!["ABC", "next"]);
    }

    #[test]
    fn test_decoder_multiline_and_comments() {
        let mut decoder = EventStreamDecoder::new();
        let events = decoder.feed(b": keepalive\n\nevent: update\ndata: CAT\ndata:DOG\nid: 4\n\n");
        assert_eq!(events, vec!["CAT\nDOG"]);
    }

    #[test]
    fn test_decoder_empty_data_field() {
        let mut decoder = EventStreamDecoder::new();
        assert_eq!(decoder.feed(b"data\n\n"), vec![""]);
    }

    #[test]
    fn test_restart_watch() {
        let mut watch = RestartWatch::default();
        assert!(!watch.observe());
        assert_eq!(watch, RestartWatch::Active);
        assert!(watch.observe());
        assert!(watch.observe());
    }

    #[test]
    fn test_first_start_signal_starts_session() {
        let mut state = push_state();
        let mut view = Recorder::default();

        assert_eq!(merge(&mut state, ok(Concern::Started, "1"), &mut view), PushEffect::Applied);
        assert!(state.session.is_started());
        assert_eq!(
            merge(&mut state, ok(Concern::Started, "1"), &mut view),
            PushEffect::Reload
        );
    }

    #[test]
    fn test_restart_reloads_finished_game() {
        let mut state = push_state();
        let mut view = Recorder::default();
        merge(&mut state, ok(Concern::Started, ""), &mut view);
        state.session.terminate();

        assert_eq!(
            merge(&mut state, ok(Concern::Started, ""), &mut view),
            PushEffect::Reload
        );
    }

    #[test]
    fn test_snapshots_replace_state() {
        let mut state = push_state();
        let mut view = Recorder::default();

        merge(&mut state, ok(Concern::PreviousGuesses, "CAT\nDOG"), &mut view);
        merge(&mut state, ok(Concern::PreviousGuesses, "EMU"), &mut view);
        merge(&mut state, ok(Concern::TotalScore, "21"), &mut view);
        merge(&mut state, ok(Concern::Rack, "<span>ABCDEF</span>"), &mut view);

        assert_eq!(state.score.previous_guesses, vec!["EMU"]);
        assert_approx_eq!(state.score.total_score, 21.0);
        assert!(view
            .effects
            .contains(&Effect::Rack("<span>ABCDEF</span>".to_string())));
    }

    #[test]
    fn test_pushed_score_moves_board_in_push_feed() {
        let mut state = push_state();
        let mut view = Recorder::default();
        state.board.threshold_offset = 10.0;
        state
            .guesses
            .submit("HELLO", &state.board, &state.session, &state.tuning);

        merge(&mut state, ok(Concern::CurrentScore, "3"), &mut view);

        assert_approx_eq!(state.board.threshold_offset, 8.5);
        assert_eq!(view.count(|e| *e == Effect::Pulse), 1);
    }

    #[test]
    fn test_pushed_bingo_uses_word_length() {
        let mut state = push_state();
        let mut view = Recorder::default();
        state.board.threshold_offset = 30.0;
        state.board.escalate(1.1, 0.9);

        merge(&mut state, ok(Concern::CurrentScore, r#"[16, "BINGOS"]"#), &mut view);

        assert_eq!(state.board, crate::game::BoardState::new(&state.tuning));
    }

    #[test]
    fn test_pushed_score_ignored_for_board_in_reply_feed() {
        let mut state = GameState::new(Tuning::default());
        let mut view = Recorder::default();
        state.board.threshold_offset = 10.0;

        merge(&mut state, ok(Concern::CurrentScore, "3"), &mut view);

        assert_approx_eq!(state.board.threshold_offset, 10.0);
        assert_approx_eq!(state.score.current_score, 3.0);
    }

    #[test]
    fn test_malformed_score_is_reported() {
        let mut state = push_state();
        let mut view = Recorder::default();

        let effect = merge(&mut state, ok(Concern::TotalScore, "many"), &mut view);

        assert_eq!(effect, PushEffect::Ignored);
        assert_eq!(view.errors().len(), 1);
        assert_approx_eq!(state.score.total_score, 0.0);
    }

    #[test]
    fn test_non_finite_total_is_malformed() {
        let mut state = push_state();
        let mut view = Recorder::default();
        merge(&mut state, ok(Concern::TotalScore, "9"), &mut view);

        for payload in ["NaN", "inf", "-2"] {
            let effect = merge(&mut state, ok(Concern::TotalScore, payload), &mut view);
            assert_eq!(effect, PushEffect::Ignored);
        }

        assert_approx_eq!(state.score.total_score, 9.0);
        assert_eq!(view.errors().len(), 3);
    }

    #[test]
    fn test_non_finite_current_score_leaves_board_alone() {
        let mut state = push_state();
        let mut view = Recorder::default();
        state.board.threshold_offset = 20.0;

        for payload in ["inf", "NaN", r#"[-5, "HELLO"]"#] {
            let effect = merge(&mut state, ok(Concern::CurrentScore, payload), &mut view);
            assert_eq!(effect, PushEffect::Ignored);
        }

        assert_approx_eq!(state.board.threshold_offset, 20.0);
        assert_approx_eq!(state.score.current_score, 0.0);
        assert_eq!(view.errors().len(), 3);
        assert_eq!(view.count(|e| *e == Effect::Pulse), 0);
    }

    #[test]
    fn test_snapshots_ignored_after_game_over() {
        let mut state = push_state();
        let mut view = Recorder::default();
        state.session.terminate();

        let effect = merge(&mut state, ok(Concern::Rack, "ABCDEF"), &mut view);

        assert_eq!(effect, PushEffect::Ignored);
        assert!(view.effects.is_empty());
    }

    #[test]
    fn test_channel_failure_is_reported() {
        let mut state = push_state();
        let mut view = Recorder::default();
        let message = PushMessage {
            concern: Concern::Rack,
            payload: Err(GatewayError::Closed {
                url: "http://localhost/get_rack".to_string(),
            }),
        };

        assert_eq!(merge(&mut state, message, &mut view), PushEffect::Ignored);
        assert_eq!(
            view.errors(),
            vec!["ERROR: stream closed [http://localhost/get_rack]"]
        );
    }
}
