//! Yahtzee Dice State Library
//!
//! This crate provides the game core for local multiplayer Yahtzee played
//! with Bluetooth smart dice.
//!
//! # Overview
//!
//! - **Turn State Machine** - Binds the five lowest-id connected dice to the
//!   turn, records the initial roll, tracks held dice and reroll cycles, and
//!   survives dice dropping out and reconnecting mid-turn.
//!
//! - **Scoring Engine** - Pure scoring of five faces for the thirteen
//!   categories.
//!
//! - **Category Ledger** - Write-once scorecard per player.
//!
//! - **Game Orchestration** - Round-robin turns, category locking, results.
//!
//! - **Runtime** - A tokio task that serializes die events and UI actions
//!   and drives the LED timers.
//!
//! # Design Principles
//!
//! 1. **Events in, state out** - Die events are the only input from hardware;
//!    the UI reads [`GameView`] snapshots.
//!
//! 2. **Injected dice** - The core talks to dice through [`DiceController`],
//!    so tests and the simulator run against [`DiceRegistry`].
//!
//! 3. **Explicit time** - Cooldowns take an `Instant` so they can be tested
//!    without sleeping.
//!
//! 4. **Serialization-ready** - Views can be converted to JSON for clients.
//!
//! # Example
//!
//! ```rust
//! use yahtzee_dice_state::{
//!     config::GameConfig, Category, DiceController, DiceRegistry, DieEvent, DieId, Game,
//!     NextTurn,
//! };
//!
//! let mut dice = DiceRegistry::new();
//! for address in ["D1", "D2", "D3", "D4", "D5"] {
//!     let (id, _) = dice.discover(address);
//!     dice.observe(&DieEvent::Connected(id));
//! }
//!
//! let mut game = Game::new(dice, &["Alice", "Bob"], GameConfig::default()).unwrap();
//!
//! for (i, face) in [2, 3, 4, 5, 6].into_iter().enumerate() {
//!     game.handle_event(DieEvent::Stable { die: DieId(i as u32), face });
//! }
//!
//! let outcome = game.attempt_lock_category(Category::LargeStraight).unwrap();
//! assert_eq!(outcome.score, 40);
//! assert_eq!(outcome.next, NextTurn::Player(1));
//! ```

pub mod config;
pub mod runtime;
pub mod state;

// Re-export everything from state module at crate root
pub use state::*;
