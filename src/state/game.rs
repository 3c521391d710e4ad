//! Game orchestration.
//!
//! Wires the dice, the turn machine and the player ledgers into a full game:
//! begin turn, roll and reroll, lock a category, advance to the next player,
//! and produce results once every board is full.

use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::config::GameConfig;
use crate::state::dice::{DiceController, DieEvent, DieId};
use crate::state::ledger::{LedgerError, PlayerLedger};
use crate::state::scoring::{self, Category, HAND_SIZE};
use crate::state::turn::{
    HoldChange, RollAnnouncement, SlotView, StableOutcome, TurnMachine, TurnPhase, TurnRejection,
    REQUIRED_DICE,
};

/// Name used when setup supplies none.
pub const DEFAULT_PLAYER_NAME: &str = "Player 1";

/// Game state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    InProgress,
    /// Every player filled every category
    Finished,
    /// Torn down before completion
    Abandoned,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Finished => "finished",
            Self::Abandoned => "abandoned",
        }
    }

    /// Check if game is active (can receive actions).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Check if game is terminal (cannot change).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Abandoned)
    }
}

/// Final totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameResult {
    pub names: Vec<String>,
    pub totals: Vec<u32>,
    /// Indices of every player on the top total
    pub winners: Vec<usize>,
}

impl GameResult {
    pub fn from_ledgers(players: &[PlayerLedger]) -> Self {
        let names: Vec<String> = players.iter().map(|p| p.name.clone()).collect();
        let totals: Vec<u32> = players.iter().map(|p| p.total()).collect();
        let best = totals.iter().copied().max().unwrap_or(0);
        let winners = totals
            .iter()
            .enumerate()
            .filter_map(|(i, total)| (*total == best).then_some(i))
            .collect();
        Self {
            names,
            totals,
            winners,
        }
    }

    pub fn winner_names(&self) -> Vec<&str> {
        self.winners
            .iter()
            .filter_map(|&i| self.names.get(i))
            .map(String::as_str)
            .collect()
    }

    pub fn is_tie(&self) -> bool {
        self.winners.len() > 1
    }
}

/// Player setup errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("Too many players: {got} (max {max})")]
    TooManyPlayers { max: usize, got: usize },
    #[error("Duplicate player name: {0}")]
    DuplicateName(String),
    #[error("{0}")]
    Config(String),
}

/// Why a category could not be locked.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockRejection {
    #[error("The game is over")]
    GameOver,
    #[error("{0} is already filled in")]
    AlreadyLocked(Category),
    #[error(transparent)]
    Turn(#[from] TurnRejection),
}

impl From<LedgerError> for LockRejection {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AlreadyLocked(category) => Self::AlreadyLocked(category),
        }
    }
}

/// Who plays after a successful lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextTurn {
    Player(usize),
    GameComplete(GameResult),
}

/// A successful category lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOutcome {
    pub player: usize,
    pub category: Category,
    pub score: u16,
    pub next: NextTurn,
}

/// One scorecard row for the active player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreRow {
    pub category: Category,
    pub name: &'static str,
    pub locked: bool,
    /// Locked score, or the live preview while scoring is allowed
    pub score: Option<u16>,
    /// Locked faces, or the category's example faces while open
    pub faces: [u8; HAND_SIZE],
}

/// Read-only snapshot handed to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameView {
    pub status: GameStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub round: u32,
    pub current_player: String,
    pub current_player_index: usize,
    pub phase: TurnPhase,
    pub rerolls_left: u8,
    pub can_score: bool,
    /// User-facing reason scoring is blocked
    pub score_blocker: Option<String>,
    pub slots: [SlotView; REQUIRED_DICE],
    /// Phase of the missing-slot blink
    pub blink_on: bool,
    pub scorecard: Vec<ScoreRow>,
    pub result: Option<GameResult>,
}

/// Clean and validate player names.
///
/// Names are trimmed and blanks dropped; no names at all yields a single
/// default player.
pub fn setup_players<S: AsRef<str>>(
    names: &[S],
    max_players: usize,
) -> Result<Vec<String>, SetupError> {
    let names: Vec<String> = names
        .iter()
        .map(|n| n.as_ref().trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();

    if names.is_empty() {
        return Ok(vec![DEFAULT_PLAYER_NAME.to_string()]);
    }
    if names.len() > max_players {
        return Err(SetupError::TooManyPlayers {
            max: max_players,
            got: names.len(),
        });
    }

    let mut seen = HashSet::new();
    for name in &names {
        if !seen.insert(name.as_str()) {
            return Err(SetupError::DuplicateName(name.clone()));
        }
    }

    Ok(names)
}

/// A local multiplayer game driven by dice events.
#[derive(Debug)]
pub struct Game<C> {
    dice: C,
    config: GameConfig,

    /// Boards in turn order
    players: Vec<PlayerLedger>,

    current_player_index: usize,

    /// Current round (1-indexed)
    round: u32,

    turn: TurnMachine,

    status: GameStatus,

    result: Option<GameResult>,

    /// When game was created
    pub created_at: chrono::DateTime<chrono::Utc>,

    /// When game ended
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl<C: DiceController> Game<C> {
    /// Create a game and start the first player's turn.
    ///
    /// Fails on an invalid config or player list.
    pub fn new<S: AsRef<str>>(
        dice: C,
        names: &[S],
        config: GameConfig,
    ) -> Result<Self, SetupError> {
        config
            .validate()
            .map_err(|err| SetupError::Config(err.to_string()))?;
        let names = setup_players(names, config.max_players)?;
        let mut game = Self {
            dice,
            turn: TurnMachine::from_config(&config),
            config,
            players: names.into_iter().map(PlayerLedger::new).collect(),
            current_player_index: 0,
            round: 1,
            status: GameStatus::InProgress,
            result: None,
            created_at: chrono::Utc::now(),
            ended_at: None,
        };
        tracing::info!(players = ?game.player_names(), "game created");
        game.begin_turn();
        Ok(game)
    }

    pub fn dice(&self) -> &C {
        &self.dice
    }

    pub fn dice_mut(&mut self) -> &mut C {
        &mut self.dice
    }

    pub fn into_dice(self) -> C {
        self.dice
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn turn(&self) -> &TurnMachine {
        &self.turn
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn players(&self) -> &[PlayerLedger] {
        &self.players
    }

    pub fn player_names(&self) -> Vec<&str> {
        self.players.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn current_player_index(&self) -> usize {
        self.current_player_index
    }

    pub fn current_player(&self) -> &PlayerLedger {
        &self.players[self.current_player_index]
    }

    pub fn result(&self) -> Option<&GameResult> {
        self.result.as_ref()
    }

    /// Reset the turn for the current player.
    pub fn begin_turn(&mut self) {
        self.turn.begin_turn(&mut self.dice);
        tracing::debug!(
            player = %self.current_player().name,
            round = self.round,
            "turn begins"
        );
    }

    /// Feed one die event through the game.
    pub fn handle_event(&mut self, event: DieEvent) -> Option<StableOutcome> {
        self.handle_event_at(event, Instant::now())
    }

    /// Feed one die event with an explicit arrival time.
    pub fn handle_event_at(&mut self, event: DieEvent, now: Instant) -> Option<StableOutcome> {
        self.dice.observe(&event);

        if !self.status.is_active() {
            return None;
        }

        match event {
            DieEvent::Stable { die, face } => {
                return Some(self.turn.on_stable(&mut self.dice, die, face, now));
            }
            DieEvent::ColorChanged { die, color } => {
                self.turn.on_color_changed(die, color);
            }
            other if other.affects_membership() => {
                self.turn.sync_required_dice(&mut self.dice);
            }
            _ => {}
        }
        None
    }

    /// Hold or release a die bound to the turn.
    pub fn toggle_hold(&mut self, die: DieId) -> Result<HoldChange, TurnRejection> {
        if !self.status.is_active() {
            return Err(TurnRejection::GameOver);
        }
        let result = self.turn.toggle_hold(&mut self.dice, die);
        if let Err(reason) = &result {
            tracing::debug!(%die, %reason, "hold rejected");
        }
        result
    }

    /// Hold or release the die shown in a turn slot.
    pub fn toggle_hold_slot(&mut self, slot: usize) -> Option<Result<HoldChange, TurnRejection>> {
        let die = self.turn.required().get(slot).copied()?;
        Some(self.toggle_hold(die))
    }

    /// Lock `category` for the current player with the turn's dice.
    pub fn attempt_lock_category(
        &mut self,
        category: Category,
    ) -> Result<LockOutcome, LockRejection> {
        if !self.status.is_active() {
            return Err(LockRejection::GameOver);
        }
        if self.current_player().is_locked(category) {
            return Err(LockRejection::AlreadyLocked(category));
        }
        if let Some(reason) = self.turn.score_blocker() {
            tracing::debug!(%category, %reason, "lock rejected");
            return Err(reason.into());
        }
        let Some(snapshots) = self.turn.scoring_snapshots() else {
            return Err(TurnRejection::FinishInitialRoll.into());
        };

        let player = self.current_player_index;
        let score = self.players[player].lock(category, snapshots)?;
        tracing::info!(
            player = %self.players[player].name,
            %category,
            score,
            "category locked"
        );

        let next = if self.is_game_complete() {
            NextTurn::GameComplete(self.finish())
        } else {
            self.advance_to_next_player();
            NextTurn::Player(self.current_player_index)
        };

        Ok(LockOutcome {
            player,
            category,
            score,
            next,
        })
    }

    /// Move to the next player in turn order and start their turn.
    pub fn advance_to_next_player(&mut self) {
        self.current_player_index = (self.current_player_index + 1) % self.players.len();
        if self.current_player_index == 0 {
            self.round += 1;
        }
        self.begin_turn();
    }

    pub fn is_game_complete(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.is_complete())
    }

    /// Totals and winners as they stand.
    pub fn compute_results(&self) -> GameResult {
        GameResult::from_ledgers(&self.players)
    }

    fn finish(&mut self) -> GameResult {
        let result = self.compute_results();
        self.status = GameStatus::Finished;
        self.ended_at = Some(chrono::Utc::now());
        self.dice.turn_off_all_leds();
        self.result = Some(result.clone());
        tracing::info!(
            totals = ?result.totals,
            winners = ?result.winner_names(),
            "game finished"
        );
        result
    }

    /// Tear the game down: every LED off and an unfinished game is abandoned.
    pub fn shutdown(&mut self) {
        self.dice.turn_off_all_leds();
        if self.status.is_active() {
            self.status = GameStatus::Abandoned;
            self.ended_at = Some(chrono::Utc::now());
            tracing::info!("game abandoned");
        }
    }

    /// Blink every die still owed a roll. Returns how many were blinked.
    pub fn flash_owed_dice(&mut self) -> usize {
        if !self.status.is_active() {
            return 0;
        }
        self.turn.sync_required_dice(&mut self.dice);

        let blink = self.config.owed_roll_blink();
        let mut flashed = 0;
        for die in self.turn.dice_owed_roll() {
            if self.dice.is_connected(die) {
                self.dice.blink_led(die, blink);
                flashed += 1;
            }
        }
        flashed
    }

    pub fn rerolls_left(&self) -> u8 {
        self.turn.rerolls_left()
    }

    pub fn can_score_now(&self) -> bool {
        self.status.is_active() && self.turn.can_score_now()
    }

    pub fn turn_display_snapshots(&self) -> [SlotView; REQUIRED_DICE] {
        self.turn.slots()
    }

    pub fn take_announcement(&mut self) -> Option<RollAnnouncement> {
        self.turn.take_announcement()
    }

    fn scorecard(&self) -> Vec<ScoreRow> {
        let player = self.current_player();
        let faces = if self.can_score_now() {
            self.turn.scoring_faces()
        } else {
            None
        };

        Category::ALL
            .into_iter()
            .map(|category| match player.locked(category) {
                Some(locked) => ScoreRow {
                    category,
                    name: category.display_name(),
                    locked: true,
                    score: Some(locked.score),
                    faces: locked.faces(),
                },
                None => ScoreRow {
                    category,
                    name: category.display_name(),
                    locked: false,
                    score: faces.map(|f| scoring::score(category, &f)),
                    faces: category.placeholder_faces(),
                },
            })
            .collect()
    }

    /// Snapshot for rendering.
    pub fn view(&self, blink_on: bool) -> GameView {
        GameView {
            status: self.status,
            created_at: self.created_at,
            round: self.round,
            current_player: self.current_player().name.clone(),
            current_player_index: self.current_player_index,
            phase: self.turn.phase(),
            rerolls_left: self.turn.rerolls_left(),
            can_score: self.can_score_now(),
            score_blocker: self.turn.score_blocker().map(|r| r.to_string()),
            slots: self.turn.slots(),
            blink_on,
            scorecard: self.scorecard(),
            result: self.result.clone(),
        }
    }
}
