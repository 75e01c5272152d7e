//! # Match Server Library
//!
//! This library hosts the shared state of the two-player word-unscrambling
//! game. Clients never talk to each other directly: every match lives as a
//! single record in the server's store, and both players coordinate by
//! writing conditional updates to it and watching its change feed.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Record
//! The store holds the one true copy of each match. Writes carry the prior
//! field values they were computed from, and a write whose expectations no
//! longer hold is dropped as a conflict. This is how races between the two
//! players (claiming the open seat, submitting a winning answer set, advancing
//! a timer-driven phase) are settled.
//!
//! ### Change Feed
//! Every applied write is broadcast to the clients subscribed to that match,
//! so both players converge on the same snapshot.
//!
//! ### Round Resolution
//! Complete answer sets are checked against the live round's canonical
//! solutions. The first accepted submission scores the round.
//!
//! ### Presence
//! A leave signal, or a subscriber going silent past the heartbeat timeout,
//! closes the match and deletes it.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! All packets are funnelled into one loop that owns the store and handles
//! them one at a time. Each conditional update is therefore atomic without
//! any further locking.
//!
//! ### UDP-Based Communication
//! Packets are `bincode`-encoded `shared::Packet` values, one per datagram.
//! Leave signals are fire-and-forget; a lost one is covered by the heartbeat
//! timeout.
//!
//! ## Module Organization
//!
//! - `lobby`: match creation and seat claiming
//! - `network`: socket tasks and the event loop
//! - `presence`: closing and retiring matches
//! - `puzzle`: lexicon-backed puzzle source
//! - `resolver`: round resolution
//! - `store`: conditional-update store and change feed
//! - `subscriptions`: change-feed subscribers and heartbeat tracking
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//! use server::puzzle::LexiconPuzzles;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let puzzles = Box::new(LexiconPuzzles::new("data"));
//!     let mut server = Server::new("127.0.0.1:8080", puzzles, ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod lobby;
pub mod network;
pub mod presence;
pub mod puzzle;
pub mod resolver;
pub mod store;
pub mod subscriptions;
