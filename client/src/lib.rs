//! # Letterfall Client Library
//!
//! Client-side engine for the letterfall word game. A letter falls towards a
//! threshold line that sinks a little every frame; correct guesses push the
//! line back up, and the game ends once it sinks past a fatal limit.
//!
//! ## Architecture Overview
//!
//! All game state lives in one explicit object, [`game::GameState`], owned
//! by the main loop in [`network::Client`]. The loop is single-threaded and
//! cooperative: a frame interval drives the clock, while server calls run as
//! spawned tasks whose completions come back over a channel and are applied
//! in arrival order.
//!
//! ### Server Authority
//! The server validates guesses, scores them and deals tiles. Its replies
//! are the only source of truth for scores; the client never computes score
//! driven board movement on its own.
//!
//! ### Frame Clock
//! Each frame adds the fall rate to the threshold, publishes it to the
//! presentation, and checks whether the letter has landed. A landed letter
//! either ends the game or speeds everything up and is replaced.
//!
//! ### Push Channels
//! Optionally, the server streams snapshots of scores, rack and previous
//! guesses. A second start signal means the server restarted, and the
//! client reloads from scratch.
//!
//! ## Module Organization
//!
//! - `game`: board, score and session state, and the per-frame tick
//! - `letter`: spawn, expiry and replacement of the falling letter
//! - `guess`: guess submission and reply merging
//! - `push`: event-stream decoding and snapshot merging
//! - `network`: HTTP gateway and the main loop
//! - `rendering`: presentation effects and a console renderer
//! - `input`: guess input normalisation
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use shared::Tuning;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new(
//!         "http://127.0.0.1:8080",
//!         Tuning::default(),
//!         Duration::from_millis(16),
//!         false,
//!     )?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod guess;
pub mod input;
pub mod letter;
pub mod network;
pub mod push;
pub mod rendering;
