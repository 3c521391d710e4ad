//! Per-player category board.
//!
//! Once a category is locked for a player it never changes again.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::state::scoring::{self, Category, CATEGORY_COUNT, HAND_SIZE};
use crate::state::turn::DieSnapshot;

/// A category locked in with the dice that scored it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockedCategory {
    /// Sorted by face
    pub dice: [DieSnapshot; HAND_SIZE],
    pub score: u16,
}

impl LockedCategory {
    pub fn faces(&self) -> [u8; HAND_SIZE] {
        self.dice.map(|d| d.face)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{0} is already filled in")]
    AlreadyLocked(Category),
}

/// One player's scorecard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerLedger {
    pub name: String,
    locked: BTreeMap<Category, LockedCategory>,
}

impl PlayerLedger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locked: BTreeMap::new(),
        }
    }

    /// Lock `category` with these dice and return the score.
    pub fn lock(
        &mut self,
        category: Category,
        mut dice: [DieSnapshot; HAND_SIZE],
    ) -> Result<u16, LedgerError> {
        if self.locked.contains_key(&category) {
            return Err(LedgerError::AlreadyLocked(category));
        }

        dice.sort_by_key(|d| d.face);
        let score = scoring::score(category, &dice.map(|d| d.face));
        self.locked.insert(category, LockedCategory { dice, score });
        Ok(score)
    }

    pub fn is_locked(&self, category: Category) -> bool {
        self.locked.contains_key(&category)
    }

    pub fn locked(&self, category: Category) -> Option<&LockedCategory> {
        self.locked.get(&category)
    }

    pub fn score(&self, category: Category) -> Option<u16> {
        self.locked.get(&category).map(|l| l.score)
    }

    pub fn locked_count(&self) -> usize {
        self.locked.len()
    }

    pub fn is_complete(&self) -> bool {
        self.locked.len() == CATEGORY_COUNT
    }

    pub fn open_categories(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL
            .into_iter()
            .filter(|c| !self.locked.contains_key(c))
    }

    /// Sum of every locked score; open categories count as 0.
    pub fn total(&self) -> u32 {
        self.locked.values().map(|l| l.score as u32).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::dice::{DieColor, DieId};
    use pretty_assertions::assert_eq;

    fn hand(faces: [u8; 5]) -> [DieSnapshot; 5] {
        std::array::from_fn(|i| DieSnapshot {
            die: DieId(i as u32),
            face: faces[i],
            color: Some(DieColor::Blue),
        })
    }

    #[test]
    fn test_lock_scores_and_sorts() {
        let mut ledger = PlayerLedger::new("Alice");

        let score = ledger.lock(Category::ThreeOfAKind, hand([5, 1, 4, 1, 1])).unwrap();

        assert_eq!(score, 12);
        let locked = ledger.locked(Category::ThreeOfAKind).unwrap();
        assert_eq!(locked.faces(), [1, 1, 1, 4, 5]);
        // Die identity travels with its face.
        assert_eq!(locked.dice[4].die, DieId(0));
        assert_eq!(ledger.total(), 12);
    }

    #[test]
    fn test_lock_is_write_once() {
        let mut ledger = PlayerLedger::new("Bob");
        ledger.lock(Category::Yahtzee, hand([6, 6, 6, 6, 6])).unwrap();

        assert_eq!(
            ledger.lock(Category::Yahtzee, hand([1, 2, 3, 4, 5])),
            Err(LedgerError::AlreadyLocked(Category::Yahtzee))
        );
        assert_eq!(ledger.score(Category::Yahtzee), Some(50));
        assert_eq!(ledger.locked_count(), 1);
    }

    #[test]
    fn test_completion() {
        let mut ledger = PlayerLedger::new("Carol");
        for category in Category::ALL {
            assert!(!ledger.is_complete());
            ledger.lock(category, hand([2, 2, 2, 2, 2])).unwrap();
        }
        assert!(ledger.is_complete());
        assert_eq!(ledger.open_categories().count(), 0);
        // Twos 10, 3K 10, 4K 10, Yahtzee 50, Chance 10.
        assert_eq!(ledger.total(), 90);
    }

    #[test]
    fn test_open_categories_in_board_order() {
        let mut ledger = PlayerLedger::new("Dan");
        ledger.lock(Category::Ones, hand([1, 1, 1, 1, 1])).unwrap();
        let open: Vec<Category> = ledger.open_categories().take(2).collect();
        assert_eq!(open, vec![Category::Twos, Category::Threes]);
    }
}
