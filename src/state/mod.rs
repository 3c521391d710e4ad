//! Game state for a five-dice Yahtzee table played with smart dice.
//!
//! This module provides the core state types:
//!
//! - `dice` - Die identities, events and the controller the core talks to
//! - `scoring` - Categories and the pure scoring function
//! - `turn` - Per-turn roll/hold/reroll state machine
//! - `ledger` - Write-once scorecard per player
//! - `game` - Player rotation, locking and results
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                              Game<C>                                  │
//! │                                                                       │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐   │
//! │  │ C: DiceController│   │   TurnMachine    │   │ Vec<PlayerLedger>│   │
//! │  │                  │   │                  │   │                  │   │
//! │  │ id → connected,  │──▶│ required dice    │──▶│ category →       │   │
//! │  │      colour,     │   │ snapshots, held  │   │   LockedCategory │   │
//! │  │      LED         │◀──│ reroll cycle     │   │                  │   │
//! │  └──────────────────┘   └──────────────────┘   └──────────────────┘   │
//! │                                  │                                     │
//! │                                  ▼                                     │
//! │                          scoring::score()                              │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use yahtzee_dice_state::state::{
//!     dice::{DiceRegistry, DieEvent, DieId},
//!     game::Game,
//!     scoring::Category,
//! };
//!
//! let mut game = Game::new(registry, &["Alice", "Bob"], GameConfig::default())?;
//! game.handle_event(DieEvent::Stable { die: DieId(0), face: 6 });
//! game.toggle_hold(DieId(0))?;
//! game.attempt_lock_category(Category::Sixes)?;
//! ```

pub mod dice;
pub mod game;
pub mod ledger;
pub mod scoring;
pub mod turn;

// Re-export commonly used types
pub use dice::{
    Blink, DiceController, DiceRegistry, DieColor, DieEvent, DieId, DieObservedState,
    LedCommand, Rgb,
};
pub use game::{
    setup_players, Game, GameResult, GameStatus, GameView, LockOutcome, LockRejection, NextTurn,
    ScoreRow, SetupError, DEFAULT_PLAYER_NAME,
};
pub use ledger::{LedgerError, LockedCategory, PlayerLedger};
pub use scoring::{score, Category, CATEGORY_COUNT, HAND_SIZE};
pub use turn::{
    DieSnapshot, HoldChange, RerollCycle, RollAnnouncement, SlotView, StableOutcome,
    TurnMachine, TurnPhase, TurnRejection, REQUIRED_DICE,
};
