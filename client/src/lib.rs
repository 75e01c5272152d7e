//! # Match Client Library
//!
//! This library provides the player's side of the word-unscrambling game. A
//! client finds or creates a match, subscribes to its change feed and plays
//! rounds from the terminal.
//!
//! ## Architecture Overview
//!
//! The server holds the only authoritative copy of a match. The client keeps
//! the latest snapshot it was sent and never edits it locally; every change it
//! wants goes out as a conditional update and comes back through the feed.
//!
//! ### Authority
//! Player1's client is the authority. Only it writes the timer-driven
//! transitions (start of the countdown, round start, round expiry, end of the
//! game and the restart after it). Each write pins the phase it was derived
//! from, so a stale or repeated write is refused by the server.
//!
//! ### Local Timers
//! Both clients run a display timer that resets to the phase's nominal length
//! whenever the snapshot's status changes. The authority acts when its timer
//! reaches zero; the other client only displays it.
//!
//! ### Guessing
//! Correct guesses are buffered locally. Once every solution of the live
//! round has been found, the full set is submitted to the server, which
//! decides the round.
//!
//! ## Module Organization
//!
//! - `state_machine`: pure transition builders for the authority
//! - `session`: snapshot handling, timers and guess buffering
//! - `network`: UDP requests and the play loop
//! - `display`: terminal text for the current state
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use client::session::Session;
//! use shared::Timings;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new("127.0.0.1:8080").await?;
//!     let created = client.create_match("Alice", "NWL23").await?;
//!     client
//!         .play(&created.id, Session::new("Alice", Timings::default()))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod display;
pub mod network;
pub mod session;
pub mod state_machine;
