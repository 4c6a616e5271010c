//! Client network layer: HTTP gateway to the game server and the main loop
//! coordinating frames, completions, push channels and guess input

use crate::game::{GameState, TickOutcome};
use crate::input::InputManager;
use crate::push::{self, PushEffect, PushMessage};
use crate::rendering::Renderer;
use log::{debug, error, info, warn};
use shared::{Concern, GuessReply, Request, ScoreFeed, Transcript, Tuning};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Every way a server call can fail. None of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP error! Status: {status} [{url}]")]
    Status { status: u16, url: String },
    #[error("{source} [{url}]")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("malformed payload: {reason} [{url}]")]
    Malformed { url: String, reason: String },
    #[error("stream closed [{url}]")]
    Closed { url: String },
}

impl GatewayError {
    /// Text for the error display.
    pub fn describe(&self) -> String {
        format!("ERROR: {}", self)
    }
}

/// A guess is answered with a JSON scoring reply or, by servers that push
/// scores separately, with a bare status line.
#[derive(Debug, Clone, PartialEq)]
pub enum GuessOutcome {
    Scored(GuessReply),
    Status { text: String, url: String },
}

/// Result of a finished server call, applied back onto the game state.
#[derive(Debug)]
pub enum Completion {
    Guess {
        guess: String,
        result: Result<GuessOutcome, GatewayError>,
    },
    Tile(Result<char, GatewayError>),
    LetterAccepted(Result<String, GatewayError>),
    PreviousGuesses(Result<Vec<String>, GatewayError>),
}

impl Completion {
    pub fn is_success(&self) -> bool {
        match self {
            Completion::Guess { result, .. } => result.is_ok(),
            Completion::Tile(result) => result.is_ok(),
            Completion::LetterAccepted(result) => result.is_ok(),
            Completion::PreviousGuesses(result) => result.is_ok(),
        }
    }
}

#[derive(Clone)]
pub struct Gateway {
    http: reqwest::Client,
    base_url: String,
}

impl Gateway {
    pub fn new(base_url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let parsed = reqwest::Url::parse(base_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(format!("unsupported scheme in server address {}", base_url).into());
        }

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Gateway {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn fetch_text(&self, path: &str, query: &[(&str, String)]) -> Result<String, GatewayError> {
        let url = self.url(path);
        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                url,
            });
        }

        response
            .text()
            .await
            .map_err(|source| GatewayError::Transport { url, source })
    }

    pub async fn guess_word(&self, guess: &str, bonus: bool) -> Result<GuessOutcome, GatewayError> {
        let request = Request::GuessWord {
            guess: guess.to_string(),
            bonus,
        };
        let body = self.fetch_text(request.path(), &request.query()).await?;
        let trimmed = body.trim();

        if !trimmed.starts_with('{') {
            return Ok(GuessOutcome::Status {
                text: trimmed.to_string(),
                url: self.url(request.path()),
            });
        }

        serde_json::from_str::<GuessReply>(trimmed)
            .map(GuessOutcome::Scored)
            .map_err(|e| GatewayError::Malformed {
                url: self.url(request.path()),
                reason: e.to_string(),
            })
    }

    pub async fn next_tile(&self) -> Result<char, GatewayError> {
        let path = Request::NextTile.path();
        let body = self.fetch_text(path, &[]).await?;

        let mut chars = body.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(tile), None) => Ok(tile),
            _ => Err(GatewayError::Malformed {
                url: self.url(path),
                reason: format!("expected a single tile, got {:?}", body),
            }),
        }
    }

    pub async fn accept_new_letter(&self, letter: char) -> Result<String, GatewayError> {
        let request = Request::AcceptLetter { letter };
        self.fetch_text(request.path(), &request.query()).await
    }

    pub async fn previous_guesses(&self) -> Result<Vec<String>, GatewayError> {
        let body = self.fetch_text(Request::PreviousGuesses.path(), &[]).await?;
        Ok(Transcript::parse(&body).into_entries())
    }

    pub async fn execute(&self, request: Request) -> Completion {
        match request {
            Request::GuessWord { guess, bonus } => {
                let result = self.guess_word(&guess, bonus).await;
                Completion::Guess { guess, result }
            }
            Request::NextTile => Completion::Tile(self.next_tile().await),
            Request::AcceptLetter { letter } => {
                Completion::LetterAccepted(self.accept_new_letter(letter).await)
            }
            Request::PreviousGuesses => Completion::PreviousGuesses(self.previous_guesses().await),
        }
    }

    /// Opens a long-lived event stream. The body is read by the caller.
    pub async fn open_stream(&self, path: &str) -> Result<reqwest::Response, GatewayError> {
        let url = self.url(path);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                url,
            });
        }
        Ok(response)
    }
}

/// Completions and push messages are tagged with the session epoch so that
/// anything still in flight across a reload is discarded.
type Tagged<T> = (u64, T);

pub struct Client {
    gateway: Gateway,
    tuning: Tuning,
    game_state: GameState,
    input_manager: InputManager,
    renderer: Renderer,
    frame_duration: Duration,
    push_enabled: bool,
    push_tasks: Vec<JoinHandle<()>>,
    epoch: u64,

    completion_tx: mpsc::UnboundedSender<Tagged<Completion>>,
    completion_rx: mpsc::UnboundedReceiver<Tagged<Completion>>,
    push_tx: mpsc::UnboundedSender<Tagged<PushMessage>>,
    push_rx: mpsc::UnboundedReceiver<Tagged<PushMessage>>,
}

impl Client {
    pub fn new(
        server_url: &str,
        tuning: Tuning,
        frame_duration: Duration,
        push_enabled: bool,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        if frame_duration.is_zero() {
            return Err("frame duration must be positive".into());
        }
        tuning.validate()?;

        // The push score feed needs its channels open
        let push_enabled = push_enabled || tuning.score_feed == ScoreFeed::Push;

        let gateway = Gateway::new(server_url)?;
        let renderer = Renderer::new(tuning.start_line_gap, tuning.initial_fall_duration)?;
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (push_tx, push_rx) = mpsc::unbounded_channel();

        Ok(Client {
            gateway,
            game_state: GameState::new(tuning.clone()),
            input_manager: InputManager::new(tuning.max_letters),
            tuning,
            renderer,
            frame_duration,
            push_enabled,
            push_tasks: Vec::new(),
            epoch: 0,
            completion_tx,
            completion_rx,
            push_tx,
            push_rx,
        })
    }

    /// Fires each request on its own task. Replies arrive unordered on the
    /// completion channel and never block the frame loop.
    fn dispatch(&self, requests: Vec<Request>) {
        for request in requests {
            debug!("Dispatching {:?}", request);
            let gateway = self.gateway.clone();
            let completion_tx = self.completion_tx.clone();
            let epoch = self.epoch;

            tokio::spawn(async move {
                let completion = gateway.execute(request).await;
                if let Err(e) = completion_tx.send((epoch, completion)) {
                    debug!("Completion dropped, client loop has exited: {:?}", e.0 .1);
                }
            });
        }
    }

    fn open_push_channels(&mut self) {
        if !self.push_enabled {
            return;
        }

        for concern in Concern::ALL {
            let gateway = self.gateway.clone();
            let (tx, mut rx) = mpsc::unbounded_channel::<PushMessage>();
            let push_tx = self.push_tx.clone();
            let epoch = self.epoch;

            let stream = tokio::spawn(push::run_channel(gateway, concern, tx));
            let forward = tokio::spawn(async move {
                while let Some(message) = rx.recv().await {
                    if push_tx.send((epoch, message)).is_err() {
                        break;
                    }
                }
            });
            self.push_tasks.push(stream);
            self.push_tasks.push(forward);
        }
    }

    fn close_push_channels(&mut self) {
        for task in self.push_tasks.drain(..) {
            task.abort();
        }
    }

    pub fn push_enabled(&self) -> bool {
        self.push_enabled
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Replaces the game and the screen with fresh ones under a new epoch.
    /// Returns the requests that start the new game.
    fn reset_session(&mut self) -> Vec<Request> {
        self.epoch += 1;
        self.game_state = GameState::new(self.tuning.clone());
        self.input_manager = InputManager::new(self.tuning.max_letters);
        self.renderer.reset(self.tuning.initial_fall_duration);
        self.game_state.begin(&mut self.renderer)
    }

    /// Throws away every piece of local state and starts over.
    fn reload(&mut self) {
        info!("Reloading session");
        self.close_push_channels();
        let requests = self.reset_session();
        self.open_push_channels();
        self.dispatch(requests);
    }

    /// Returns false when the completion belongs to an earlier session.
    fn apply_tagged_completion(&mut self, epoch: u64, completion: Completion) -> bool {
        if epoch != self.epoch {
            debug!("Discarding completion from an earlier session");
            return false;
        }
        self.game_state.apply_completion(completion, &mut self.renderer);
        true
    }

    fn apply_tagged_push(&mut self, epoch: u64, message: PushMessage) -> PushEffect {
        if epoch != self.epoch {
            debug!("Discarding {:?} push from an earlier session", message.concern);
            return PushEffect::Ignored;
        }
        self.game_state.apply_push(message, &mut self.renderer)
    }

    fn handle_line(&mut self, line: &str) {
        if !self.renderer.input_enabled() {
            info!("Input is disabled, the game is over");
            return;
        }

        if let Some(input) = self.input_manager.capture(line) {
            debug!("Guess #{} at {}: {}", input.sequence, input.timestamp, input.text);
            let requests = self.game_state.submit_guess(&input.text);
            self.dispatch(requests);
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.open_push_channels();
        let requests = self.game_state.begin(&mut self.renderer);
        self.dispatch(requests);

        let mut completion_rx = std::mem::replace(&mut self.completion_rx, mpsc::unbounded_channel().1);
        let mut push_rx = std::mem::replace(&mut self.push_rx, mpsc::unbounded_channel().1);

        let mut frame_interval = interval(self.frame_duration);
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut halted = false;

        loop {
            tokio::select! {
                _ = frame_interval.tick(), if !halted => {
                    match self.game_state.tick(&mut self.renderer) {
                        TickOutcome::Replaced { requests } => self.dispatch(requests),
                        TickOutcome::Terminated => {
                            info!("GAME OVER");
                            halted = true;
                        }
                        TickOutcome::Halted => halted = true,
                        TickOutcome::Idle | TickOutcome::Falling => {}
                    }
                },

                Some((epoch, completion)) = completion_rx.recv() => {
                    self.apply_tagged_completion(epoch, completion);
                },

                Some((epoch, message)) = push_rx.recv() => {
                    if self.apply_tagged_push(epoch, message) == PushEffect::Reload {
                        self.reload();
                        halted = false;
                    }
                },

                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.handle_line(&line),
                    Ok(None) => {
                        info!("Input closed, exiting");
                        break;
                    }
                    Err(e) => {
                        error!("Error reading input: {}", e);
                        break;
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down");
                    break;
                }
            }
        }

        self.close_push_channels();
        if self.game_state.session.is_terminated() {
            info!("Final score: {}", self.game_state.score.total_score);
        } else {
            warn!("Left the game before it ended");
        }

        Ok(())
    }
}
