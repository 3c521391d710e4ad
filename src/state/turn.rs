//! Turn and reroll state machine.
//!
//! Reconciles per-die events into the state of one player's turn: which
//! five dice are bound to the turn, what each last rolled, which are held,
//! and whether a reroll is underway.
//!
//! # State Diagram
//!
//! ```text
//! ┌──────────────┐  5 dice connected   ┌─────────────┐
//! │ AwaitingDice │────────────────────▶│ InitialRoll │
//! └──────────────┘                     └──────┬──────┘
//!        ▲                                    │ every required die stable
//!        │ quorum lost                        ▼
//!        │ (from any state)            ┌─────────────┐  stable of a non-held die
//!        │                             │  Decision   │─────────────────────────┐
//!        │                             └─────────────┘                         │
//!        │                                    ▲                                ▼
//!        │                                    │ all targets stable     ┌─────────────┐
//!        │                                    └────────────────────────│  Rerolling  │
//!        │                                                             └──────┬──────┘
//!        │                                                                    │ last reroll
//!        │                                                                    ▼
//!        │                                                             ┌─────────────┐
//!        └─────────────────────────────────────────────────────────────│  Exhausted  │
//!                                                                      └─────────────┘
//! ```
//!
//! Every entry point runs to completion; callers serialize events (see
//! [`crate::runtime`]) so cycle completion fires exactly once.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::config::GameConfig;
use crate::state::dice::{DiceController, DieColor, DieId};
use crate::state::scoring::HAND_SIZE;

/// Dice bound to every turn.
pub const REQUIRED_DICE: usize = HAND_SIZE;

/// Default rerolls after the initial roll.
pub const DEFAULT_MAX_REROLLS: u8 = 2;

/// Face and colour a die showed when it last settled this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DieSnapshot {
    pub die: DieId,
    pub face: u8,
    pub color: Option<DieColor>,
}

/// One pass over the non-held dice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RerollCycle {
    target: BTreeSet<DieId>,
    rolled: BTreeSet<DieId>,
}

impl RerollCycle {
    pub fn target(&self) -> &BTreeSet<DieId> {
        &self.target
    }

    pub fn rolled(&self) -> &BTreeSet<DieId> {
        &self.rolled
    }

    /// Targets still owed a stable face.
    pub fn remaining(&self) -> impl Iterator<Item = DieId> + '_ {
        self.target.difference(&self.rolled).copied()
    }

    pub fn is_complete(&self) -> bool {
        !self.target.is_empty() && self.rolled.is_superset(&self.target)
    }
}

/// Where the turn stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TurnPhase {
    /// Fewer than five dice connected
    AwaitingDice { connected: usize },
    /// Collecting the first face of each required die
    InitialRoll { rolled: usize },
    /// All faces known; hold, lock or reroll
    Decision { rerolls_left: u8 },
    /// Collecting faces for the non-held dice
    Rerolling { rolled: usize, target: usize },
    /// No rerolls left; lock a category
    Exhausted,
}

impl TurnPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingDice { .. } => "awaiting_dice",
            Self::InitialRoll { .. } => "initial_roll",
            Self::Decision { .. } => "decision",
            Self::Rerolling { .. } => "rerolling",
            Self::Exhausted => "exhausted",
        }
    }
}

/// Why a hold, reroll or lock was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRejection {
    #[error("Connect five dice to play")]
    ConnectMoreDice,
    #[error("Roll all five dice first")]
    FinishInitialRoll,
    #[error("Wait for the reroll to finish")]
    WaitForReroll,
    #[error("No rerolls left, pick a category")]
    RerollsExhausted,
    #[error("{0} is not part of this turn")]
    DieNotInTurn(DieId),
    #[error("The game is over")]
    GameOver,
}

/// What a stable event did to the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StableOutcome {
    /// Stray, duplicate, held or out-of-window event
    Ignored,
    InitialRecorded,
    InitialRollComplete,
    RerollRecorded,
    RerollComplete { rerolls_used: u8 },
}

/// Result of a successful hold toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldChange {
    Held(DieId),
    Released(DieId),
}

/// Roll result queued for screen readers once all five faces are known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollAnnouncement {
    pub faces: Vec<u8>,
}

impl fmt::Display for RollAnnouncement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let faces: Vec<String> = self.faces.iter().map(|f| f.to_string()).collect();
        write!(f, "Rolled {}", faces.join(", "))
    }
}

/// Display state of one of the five turn slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SlotView {
    pub die: Option<DieId>,
    pub face: Option<u8>,
    pub color: Option<DieColor>,
    /// Die is bound to the turn but still owes a roll
    pub missing: bool,
    pub held: bool,
}

/// Turn-scoped state. Reset by [`TurnMachine::begin_turn`].
#[derive(Debug, Clone)]
pub struct TurnMachine {
    max_rerolls: u8,
    reroll_cooldown: Duration,

    /// Lowest-id connected dice, at most five
    required: Vec<DieId>,

    /// Last face per required die in the current roll phase
    snapshots: BTreeMap<DieId, DieSnapshot>,

    held: BTreeSet<DieId>,

    rerolls_used: u8,

    /// Some while a reroll is in progress
    reroll: Option<RerollCycle>,

    /// Stable events before this instant cannot start a reroll
    reroll_blocked_until: Option<Instant>,

    announcement: Option<RollAnnouncement>,
}

impl Default for TurnMachine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REROLLS, Duration::ZERO)
    }
}

impl TurnMachine {
    pub fn new(max_rerolls: u8, reroll_cooldown: Duration) -> Self {
        Self {
            max_rerolls,
            reroll_cooldown,
            required: Vec::with_capacity(REQUIRED_DICE),
            snapshots: BTreeMap::new(),
            held: BTreeSet::new(),
            rerolls_used: 0,
            reroll: None,
            reroll_blocked_until: None,
            announcement: None,
        }
    }

    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(config.max_rerolls, config.reroll_cooldown())
    }

    /// Reset for a new turn and bind the current lowest-id dice.
    pub fn begin_turn<C: DiceController + ?Sized>(&mut self, dice: &mut C) {
        self.required = Self::select_required(&*dice);
        self.snapshots.clear();
        self.held.clear();
        self.rerolls_used = 0;
        self.reroll = None;
        self.reroll_blocked_until = None;
        self.announcement = None;
        self.turn_off_required_leds(dice);
        tracing::debug!(required = ?self.required, "turn started");
    }

    fn select_required<C: DiceController + ?Sized>(dice: &C) -> Vec<DieId> {
        dice.connected_ids().into_iter().take(REQUIRED_DICE).collect()
    }

    /// Re-read which dice are bound to the turn.
    ///
    /// Data for dice that stay bound is kept; data for dice that leave is
    /// dropped, and a held die that leaves has its LED switched off. A reroll
    /// that can no longer finish is cancelled. Returns whether the bound set
    /// changed.
    pub fn sync_required_dice<C: DiceController + ?Sized>(&mut self, dice: &mut C) -> bool {
        let selected = Self::select_required(&*dice);
        if selected == self.required {
            return false;
        }

        tracing::info!(from = ?self.required, to = ?selected, "required dice changed");
        self.required = selected;

        let required: BTreeSet<DieId> = self.required.iter().copied().collect();
        self.snapshots.retain(|id, _| required.contains(id));
        let released: Vec<DieId> = self
            .held
            .iter()
            .copied()
            .filter(|id| !required.contains(id))
            .collect();
        for id in &released {
            self.held.remove(id);
            if dice.is_connected(*id) {
                dice.set_led(*id, false);
            }
            tracing::debug!(die = %id, "held die left the turn");
        }

        let held = &self.held;
        if let Some(cycle) = self.reroll.as_mut() {
            cycle.rolled.retain(|id| required.contains(id));
            cycle
                .target
                .retain(|id| required.contains(id) && !held.contains(id));
        }

        let below_quorum = self.required.len() < REQUIRED_DICE;
        let initial_complete = self.initial_roll_complete();

        // A die joining the turn never has a face yet, so a membership change
        // that keeps quorum still leaves the initial roll open.
        if let Some(cycle) = &self.reroll {
            if below_quorum || cycle.target.is_empty() || !initial_complete {
                tracing::warn!(
                    remaining = ?cycle.remaining().collect::<Vec<_>>(),
                    "reroll cancelled after dice changed"
                );
                self.reroll = None;
                self.reroll_blocked_until = None;
            }
        }

        if below_quorum {
            self.reroll_blocked_until = None;
        }

        true
    }

    /// Apply a stable face from one die.
    pub fn on_stable<C: DiceController + ?Sized>(
        &mut self,
        dice: &mut C,
        die: DieId,
        face: u8,
        now: Instant,
    ) -> StableOutcome {
        if !(1..=6).contains(&face) {
            tracing::warn!(%die, face, "dropping stable event with invalid face");
            return StableOutcome::Ignored;
        }

        self.sync_required_dice(&mut *dice);

        if !self.required.contains(&die) {
            tracing::trace!(%die, "stable event for die outside the turn");
            return StableOutcome::Ignored;
        }
        if self.held.contains(&die) {
            tracing::trace!(%die, "stable event for held die");
            return StableOutcome::Ignored;
        }

        let snapshot = DieSnapshot {
            die,
            face,
            color: dice.color(die),
        };

        if !self.initial_roll_complete() {
            if self.snapshots.contains_key(&die) {
                return StableOutcome::Ignored;
            }
            self.snapshots.insert(die, snapshot);
            if self.initial_roll_complete() {
                self.reroll_blocked_until = Some(now + self.reroll_cooldown);
                self.queue_announcement();
                tracing::info!(faces = ?self.faces_in_order(), "initial roll complete");
                return StableOutcome::InitialRollComplete;
            }
            return StableOutcome::InitialRecorded;
        }

        if self.rerolls_used >= self.max_rerolls {
            return StableOutcome::Ignored;
        }

        if self.reroll.is_none() {
            if self.reroll_blocked_until.is_some_and(|until| now < until) {
                tracing::debug!(%die, "stable event inside reroll cooldown");
                return StableOutcome::Ignored;
            }
            let target: BTreeSet<DieId> = self
                .required
                .iter()
                .copied()
                .filter(|id| !self.held.contains(id))
                .collect();
            if target.is_empty() {
                return StableOutcome::Ignored;
            }
            tracing::info!(target = ?target, "reroll started");
            self.reroll = Some(RerollCycle {
                target,
                rolled: BTreeSet::new(),
            });
        }

        let Some(cycle) = self.reroll.as_mut() else {
            return StableOutcome::Ignored;
        };
        if !cycle.target.contains(&die) || cycle.rolled.contains(&die) {
            return StableOutcome::Ignored;
        }

        cycle.rolled.insert(die);
        let done = cycle.is_complete();
        self.snapshots.insert(die, snapshot);

        if done {
            self.complete_reroll(dice, now);
            return StableOutcome::RerollComplete {
                rerolls_used: self.rerolls_used,
            };
        }
        StableOutcome::RerollRecorded
    }

    fn complete_reroll<C: DiceController + ?Sized>(&mut self, dice: &mut C, now: Instant) {
        if self.reroll.take().is_none() {
            return;
        }

        self.rerolls_used = (self.rerolls_used + 1).min(self.max_rerolls);
        self.held.clear();
        self.reroll_blocked_until = Some(now + self.reroll_cooldown);
        self.turn_off_required_leds(dice);
        self.queue_announcement();
        tracing::info!(
            rerolls_used = self.rerolls_used,
            faces = ?self.faces_in_order(),
            "reroll complete"
        );
    }

    /// Refresh the colour of a die's current snapshot. Held dice are frozen.
    pub fn on_color_changed(&mut self, die: DieId, color: DieColor) -> bool {
        if self.held.contains(&die) {
            return false;
        }
        match self.snapshots.get_mut(&die) {
            Some(snapshot) => {
                snapshot.color = Some(color);
                true
            }
            None => false,
        }
    }

    /// Hold or release one die, lighting its LED while held.
    pub fn toggle_hold<C: DiceController + ?Sized>(
        &mut self,
        dice: &mut C,
        die: DieId,
    ) -> Result<HoldChange, TurnRejection> {
        if !self.required.contains(&die) {
            return Err(TurnRejection::DieNotInTurn(die));
        }
        if self.reroll.is_some() {
            return Err(TurnRejection::WaitForReroll);
        }

        if self.held.remove(&die) {
            dice.set_led(die, false);
            tracing::debug!(%die, "die released");
            return Ok(HoldChange::Released(die));
        }

        if self.required.len() < REQUIRED_DICE {
            return Err(TurnRejection::ConnectMoreDice);
        }
        if !self.initial_roll_complete() || !self.snapshots.contains_key(&die) {
            return Err(TurnRejection::FinishInitialRoll);
        }
        if self.rerolls_used >= self.max_rerolls {
            return Err(TurnRejection::RerollsExhausted);
        }

        self.held.insert(die);
        dice.set_led(die, true);
        tracing::debug!(%die, "die held");
        Ok(HoldChange::Held(die))
    }

    /// Switch off the LEDs of the dice bound to the turn.
    pub fn turn_off_required_leds<C: DiceController + ?Sized>(&self, dice: &mut C) {
        for id in &self.required {
            if dice.is_connected(*id) {
                dice.set_led(*id, false);
            }
        }
    }

    fn queue_announcement(&mut self) {
        if let Some(faces) = self.faces_in_order() {
            self.announcement = Some(RollAnnouncement {
                faces: faces.to_vec(),
            });
        }
    }

    fn faces_in_order(&self) -> Option<[u8; REQUIRED_DICE]> {
        let snapshots = self.snapshots_in_order()?;
        Some(snapshots.map(|s| s.face))
    }

    fn snapshots_in_order(&self) -> Option<[DieSnapshot; REQUIRED_DICE]> {
        if self.required.len() < REQUIRED_DICE {
            return None;
        }
        let snapshots: Vec<DieSnapshot> = self
            .required
            .iter()
            .filter_map(|id| self.snapshots.get(id).copied())
            .collect();
        snapshots.try_into().ok()
    }

    // Queries

    pub fn required(&self) -> &[DieId] {
        &self.required
    }

    pub fn has_quorum(&self) -> bool {
        self.required.len() == REQUIRED_DICE
    }

    pub fn initial_roll_complete(&self) -> bool {
        self.has_quorum() && self.required.iter().all(|id| self.snapshots.contains_key(id))
    }

    pub fn reroll_in_progress(&self) -> bool {
        self.reroll.is_some()
    }

    pub fn reroll_cycle(&self) -> Option<&RerollCycle> {
        self.reroll.as_ref()
    }

    pub fn rerolls_used(&self) -> u8 {
        self.rerolls_used
    }

    pub fn rerolls_left(&self) -> u8 {
        self.max_rerolls.saturating_sub(self.rerolls_used)
    }

    pub fn max_rerolls(&self) -> u8 {
        self.max_rerolls
    }

    pub fn held(&self) -> &BTreeSet<DieId> {
        &self.held
    }

    pub fn is_held(&self, die: DieId) -> bool {
        self.held.contains(&die)
    }

    pub fn snapshot(&self, die: DieId) -> Option<&DieSnapshot> {
        self.snapshots.get(&die)
    }

    /// The reason scoring is blocked, if it is.
    pub fn score_blocker(&self) -> Option<TurnRejection> {
        if !self.has_quorum() {
            Some(TurnRejection::ConnectMoreDice)
        } else if self.reroll.is_some() {
            Some(TurnRejection::WaitForReroll)
        } else if !self.initial_roll_complete() {
            Some(TurnRejection::FinishInitialRoll)
        } else {
            None
        }
    }

    pub fn can_score_now(&self) -> bool {
        self.score_blocker().is_none()
    }

    /// The five snapshots in bound order, when scoring is allowed.
    pub fn scoring_snapshots(&self) -> Option<[DieSnapshot; REQUIRED_DICE]> {
        if !self.can_score_now() {
            return None;
        }
        self.snapshots_in_order()
    }

    pub fn scoring_faces(&self) -> Option<[u8; REQUIRED_DICE]> {
        self.scoring_snapshots().map(|s| s.map(|d| d.face))
    }

    pub fn phase(&self) -> TurnPhase {
        if !self.has_quorum() {
            return TurnPhase::AwaitingDice {
                connected: self.required.len(),
            };
        }
        if !self.initial_roll_complete() {
            return TurnPhase::InitialRoll {
                rolled: self
                    .required
                    .iter()
                    .filter(|id| self.snapshots.contains_key(id))
                    .count(),
            };
        }
        if let Some(cycle) = &self.reroll {
            return TurnPhase::Rerolling {
                rolled: cycle.rolled.len(),
                target: cycle.target.len(),
            };
        }
        if self.rerolls_used >= self.max_rerolls {
            TurnPhase::Exhausted
        } else {
            TurnPhase::Decision {
                rerolls_left: self.rerolls_left(),
            }
        }
    }

    /// Dice the LED timer should blink: bound, connected-quorum dice that
    /// still owe a stable face in the current roll phase.
    pub fn dice_owed_roll(&self) -> BTreeSet<DieId> {
        if !self.has_quorum() {
            return BTreeSet::new();
        }
        if !self.initial_roll_complete() {
            return self
                .required
                .iter()
                .copied()
                .filter(|id| !self.snapshots.contains_key(id))
                .collect();
        }
        match &self.reroll {
            Some(cycle) => cycle.remaining().collect(),
            None => BTreeSet::new(),
        }
    }

    fn is_missing(&self, die: DieId) -> bool {
        if !self.initial_roll_complete() {
            return !self.snapshots.contains_key(&die);
        }
        match &self.reroll {
            Some(cycle) => cycle.target.contains(&die) && !cycle.rolled.contains(&die),
            None => false,
        }
    }

    /// The five slots as the turn display shows them.
    pub fn slots(&self) -> [SlotView; REQUIRED_DICE] {
        std::array::from_fn(|index| {
            let Some(die) = self.required.get(index).copied() else {
                return SlotView::default();
            };
            let missing = self.is_missing(die);
            let snapshot = if missing {
                None
            } else {
                self.snapshots.get(&die)
            };
            SlotView {
                die: Some(die),
                face: snapshot.map(|s| s.face),
                color: snapshot.and_then(|s| s.color),
                missing,
                held: self.held.contains(&die),
            }
        })
    }

    /// Take the queued roll announcement, if any.
    pub fn take_announcement(&mut self) -> Option<RollAnnouncement> {
        self.announcement.take()
    }
}
