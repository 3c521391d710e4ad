//! Dice tracking.
//!
//! Identities, observed state and LED commands for the physical dice. The
//! game core never talks to hardware directly: it reads and commands dice
//! through [`DiceController`], which a Bluetooth adapter or the in-memory
//! [`DiceRegistry`] implements.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable die identity, assigned in first-seen order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DieId(pub u32);

impl fmt::Display for DieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "die#{}", self.0)
    }
}

/// Shell colour reported by a die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DieColor {
    Black,
    Red,
    Green,
    Blue,
    Yellow,
    Orange,
    Unknown,
}

impl DieColor {
    /// Map a GoDice SDK colour code.
    pub fn from_sdk_code(code: i32) -> Self {
        match code {
            0 => Self::Black,
            1 => Self::Red,
            2 => Self::Green,
            3 => Self::Blue,
            4 => Self::Yellow,
            5 => Self::Orange,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Black => "black",
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Yellow => "yellow",
            Self::Orange => "orange",
            Self::Unknown => "unknown",
        }
    }
}

/// 24-bit RGB LED colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rgb(pub u32);

/// A blink request sent to one die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blink {
    pub color: Rgb,
    pub on_ms: u32,
    pub off_ms: u32,
    pub count: u32,
}

/// Events produced by the dice, funnelled into the game in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DieEvent {
    /// A device with this address was seen during a scan.
    Discovered { address: String },
    Connected(DieId),
    Disconnected(DieId),
    /// The die settled on a face.
    Stable { die: DieId, face: u8 },
    Rolling(DieId),
    ColorChanged { die: DieId, color: DieColor },
    ChargingChanged { die: DieId, charging: bool },
    ChargeLevel { die: DieId, level: u8 },
    /// Something new showed up; identities may need re-reading.
    NewDieDetected,
}

impl DieEvent {
    /// The die this event is about, if any.
    pub fn die(&self) -> Option<DieId> {
        match self {
            Self::Connected(die)
            | Self::Disconnected(die)
            | Self::Rolling(die)
            | Self::Stable { die, .. }
            | Self::ColorChanged { die, .. }
            | Self::ChargingChanged { die, .. }
            | Self::ChargeLevel { die, .. } => Some(*die),
            Self::Discovered { .. } | Self::NewDieDetected => None,
        }
    }

    /// Whether this event can change which dice are bound to the turn.
    pub fn affects_membership(&self) -> bool {
        matches!(
            self,
            Self::Connected(_)
                | Self::Disconnected(_)
                | Self::Discovered { .. }
                | Self::NewDieDetected
        )
    }
}

/// Query and command surface the game core uses to reach the dice.
pub trait DiceController {
    /// Every known die, connected or not.
    fn dice_ids(&self) -> Vec<DieId>;

    fn is_connected(&self, die: DieId) -> bool;

    fn color(&self, die: DieId) -> Option<DieColor>;

    fn set_led(&mut self, die: DieId, on: bool);

    fn blink_led(&mut self, die: DieId, blink: Blink);

    /// Fold an event into the observed state before the game reacts to it.
    fn observe(&mut self, _event: &DieEvent) {}

    /// Ids of connected dice, lowest first.
    fn connected_ids(&self) -> Vec<DieId> {
        let mut ids: Vec<DieId> = self
            .dice_ids()
            .into_iter()
            .filter(|id| self.is_connected(*id))
            .collect();
        ids.sort();
        ids
    }

    /// Switch every connected die's LED off.
    fn turn_off_all_leds(&mut self) {
        for id in self.connected_ids() {
            self.set_led(id, false);
        }
    }
}

/// Last known state of one die.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DieObservedState {
    pub id: DieId,
    pub address: String,
    pub connected: bool,
    pub last_face: Option<u8>,
    pub color: Option<DieColor>,
    pub stable: Option<bool>,
    pub charging: bool,
    pub battery_level: Option<u8>,
}

impl DieObservedState {
    fn new(id: DieId, address: String) -> Self {
        Self {
            id,
            address,
            connected: false,
            last_face: None,
            color: None,
            stable: None,
            charging: false,
            battery_level: None,
        }
    }
}

/// An LED command that reached a connected die.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedCommand {
    Set { die: DieId, on: bool },
    Blink { die: DieId, blink: Blink },
}

/// In-memory dice registry.
///
/// Owns identity assignment and observed state. LED commands are recorded
/// rather than transmitted, which makes the registry usable both as the
/// state half of a hardware adapter and as a test double.
#[derive(Debug, Default)]
pub struct DiceRegistry {
    /// Observed state, indexed by id
    dice: Vec<DieObservedState>,

    /// Device address to id
    by_address: HashMap<String, DieId>,

    /// Commands that reached a connected die, oldest first
    led_log: Vec<LedCommand>,
}

impl DiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device address, returning its id and whether it is new.
    ///
    /// A known address keeps its id; ids are never handed out twice.
    pub fn discover(&mut self, address: &str) -> (DieId, bool) {
        if let Some(id) = self.by_address.get(address) {
            return (*id, false);
        }

        let id = DieId(self.dice.len() as u32);
        self.dice.push(DieObservedState::new(id, address.to_string()));
        self.by_address.insert(address.to_string(), id);
        tracing::debug!(%id, address, "discovered die");
        (id, true)
    }

    pub fn get(&self, die: DieId) -> Option<&DieObservedState> {
        self.dice.get(die.0 as usize)
    }

    fn get_mut(&mut self, die: DieId) -> Option<&mut DieObservedState> {
        self.dice.get_mut(die.0 as usize)
    }

    pub fn get_by_address(&self, address: &str) -> Option<&DieObservedState> {
        self.by_address.get(address).and_then(|id| self.get(*id))
    }

    pub fn dice(&self) -> impl Iterator<Item = &DieObservedState> {
        self.dice.iter()
    }

    pub fn count(&self) -> usize {
        self.dice.len()
    }

    pub fn connected_count(&self) -> usize {
        self.dice.iter().filter(|d| d.connected).count()
    }

    /// Commands recorded so far.
    pub fn led_log(&self) -> &[LedCommand] {
        &self.led_log
    }

    /// Drain the command log.
    pub fn take_led_log(&mut self) -> Vec<LedCommand> {
        std::mem::take(&mut self.led_log)
    }

    /// Current LED state per die, as implied by the last `Set` command.
    pub fn led_on(&self, die: DieId) -> bool {
        self.led_log
            .iter()
            .rev()
            .find_map(|cmd| match cmd {
                LedCommand::Set { die: d, on } if *d == die => Some(*on),
                _ => None,
            })
            .unwrap_or(false)
    }
}

impl DiceController for DiceRegistry {
    fn dice_ids(&self) -> Vec<DieId> {
        self.dice.iter().map(|d| d.id).collect()
    }

    fn is_connected(&self, die: DieId) -> bool {
        self.get(die).map(|d| d.connected).unwrap_or(false)
    }

    fn color(&self, die: DieId) -> Option<DieColor> {
        self.get(die).and_then(|d| d.color)
    }

    fn set_led(&mut self, die: DieId, on: bool) {
        if self.is_connected(die) {
            self.led_log.push(LedCommand::Set { die, on });
        }
    }

    fn blink_led(&mut self, die: DieId, blink: Blink) {
        if self.is_connected(die) {
            self.led_log.push(LedCommand::Blink { die, blink });
        }
    }

    fn observe(&mut self, event: &DieEvent) {
        if let DieEvent::Discovered { address } = event {
            self.discover(address);
            return;
        }

        let Some(state) = event.die().and_then(|id| self.get_mut(id)) else {
            if let Some(id) = event.die() {
                tracing::trace!(%id, "event for unknown die");
            }
            return;
        };

        match event {
            DieEvent::Connected(_) => state.connected = true,
            DieEvent::Disconnected(_) => {
                state.connected = false;
                state.stable = None;
            }
            DieEvent::Stable { face, .. } => {
                state.stable = Some(true);
                state.last_face = Some(*face);
            }
            DieEvent::Rolling(_) => state.stable = Some(false),
            DieEvent::ColorChanged { color, .. } => state.color = Some(*color),
            DieEvent::ChargingChanged { charging, .. } => state.charging = *charging,
            DieEvent::ChargeLevel { level, .. } => state.battery_level = Some(*level),
            DieEvent::Discovered { .. } | DieEvent::NewDieDetected => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected_registry(count: usize) -> DiceRegistry {
        let mut registry = DiceRegistry::new();
        for i in 0..count {
            let (id, _) = registry.discover(&format!("AA:{i:02}"));
            registry.observe(&DieEvent::Connected(id));
        }
        registry
    }

    #[test]
    fn test_ids_assigned_in_first_seen_order() {
        let mut registry = DiceRegistry::new();

        assert_eq!(registry.discover("AA:01"), (DieId(0), true));
        assert_eq!(registry.discover("AA:02"), (DieId(1), true));
        assert_eq!(registry.discover("AA:01"), (DieId(0), false));
        assert_eq!(registry.count(), 2);
        assert_eq!(registry.get_by_address("AA:02").unwrap().id, DieId(1));
    }

    #[test]
    fn test_reconnect_keeps_identity() {
        let mut registry = connected_registry(2);

        registry.observe(&DieEvent::Disconnected(DieId(0)));
        assert!(!registry.is_connected(DieId(0)));

        registry.observe(&DieEvent::Discovered {
            address: "AA:00".to_string(),
        });
        registry.observe(&DieEvent::Connected(DieId(0)));
        assert!(registry.is_connected(DieId(0)));
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_observe_updates_state() {
        let mut registry = connected_registry(1);
        let id = DieId(0);

        registry.observe(&DieEvent::Rolling(id));
        assert_eq!(registry.get(id).unwrap().stable, Some(false));

        registry.observe(&DieEvent::Stable { die: id, face: 4 });
        registry.observe(&DieEvent::ColorChanged {
            die: id,
            color: DieColor::Red,
        });
        registry.observe(&DieEvent::ChargeLevel { die: id, level: 80 });

        let state = registry.get(id).unwrap();
        assert_eq!(state.stable, Some(true));
        assert_eq!(state.last_face, Some(4));
        assert_eq!(state.color, Some(DieColor::Red));
        assert_eq!(state.battery_level, Some(80));
    }

    #[test]
    fn test_unknown_die_events_ignored() {
        let mut registry = connected_registry(1);
        registry.observe(&DieEvent::Connected(DieId(9)));
        assert_eq!(registry.count(), 1);
        assert!(!registry.is_connected(DieId(9)));
    }

    #[test]
    fn test_led_commands_only_reach_connected_dice() {
        let mut registry = connected_registry(2);
        registry.observe(&DieEvent::Disconnected(DieId(1)));

        registry.set_led(DieId(0), true);
        registry.set_led(DieId(1), true);

        assert_eq!(
            registry.led_log(),
            &[LedCommand::Set {
                die: DieId(0),
                on: true
            }]
        );
        assert!(registry.led_on(DieId(0)));
        assert!(!registry.led_on(DieId(1)));

        registry.turn_off_all_leds();
        assert!(!registry.led_on(DieId(0)));
    }

    #[test]
    fn test_connected_ids_sorted() {
        let mut registry = connected_registry(4);
        registry.observe(&DieEvent::Disconnected(DieId(1)));
        assert_eq!(
            registry.connected_ids(),
            vec![DieId(0), DieId(2), DieId(3)]
        );
    }

    #[test]
    fn test_sdk_colors() {
        assert_eq!(DieColor::from_sdk_code(3), DieColor::Blue);
        assert_eq!(DieColor::from_sdk_code(42), DieColor::Unknown);
        assert_eq!(DieColor::Orange.as_str(), "orange");
    }
}
