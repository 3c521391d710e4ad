//! Yahtzee scoring.
//!
//! Pure functions from a five-face hand to a category score. Nothing here
//! holds state; the turn machine and ledger call in with the faces they own.

use serde::{Deserialize, Serialize};

/// Number of dice in a hand.
pub const HAND_SIZE: usize = 5;

/// Number of scoring categories on a player's board.
pub const CATEGORY_COUNT: usize = 13;

/// Fixed bonus values for the lower section.
pub const FULL_HOUSE_SCORE: u16 = 25;
pub const SMALL_STRAIGHT_SCORE: u16 = 30;
pub const LARGE_STRAIGHT_SCORE: u16 = 40;
pub const YAHTZEE_SCORE: u16 = 50;

/// Scoring categories, in board order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Ones,
    Twos,
    Threes,
    Fours,
    Fives,
    Sixes,
    ThreeOfAKind,
    FourOfAKind,
    FullHouse,
    SmallStraight,
    LargeStraight,
    Yahtzee,
    Chance,
}

impl Category {
    pub const ALL: [Category; CATEGORY_COUNT] = [
        Category::Ones,
        Category::Twos,
        Category::Threes,
        Category::Fours,
        Category::Fives,
        Category::Sixes,
        Category::ThreeOfAKind,
        Category::FourOfAKind,
        Category::FullHouse,
        Category::SmallStraight,
        Category::LargeStraight,
        Category::Yahtzee,
        Category::Chance,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ones => "Ones",
            Self::Twos => "Twos",
            Self::Threes => "Threes",
            Self::Fours => "Fours",
            Self::Fives => "Fives",
            Self::Sixes => "Sixes",
            Self::ThreeOfAKind => "Three of a Kind",
            Self::FourOfAKind => "Four of a Kind",
            Self::FullHouse => "Full House",
            Self::SmallStraight => "Small Straight",
            Self::LargeStraight => "Large Straight",
            Self::Yahtzee => "Yahtzee",
            Self::Chance => "Chance",
        }
    }

    /// Face value counted by an upper-section category.
    pub fn upper_face(&self) -> Option<u8> {
        match self {
            Self::Ones => Some(1),
            Self::Twos => Some(2),
            Self::Threes => Some(3),
            Self::Fours => Some(4),
            Self::Fives => Some(5),
            Self::Sixes => Some(6),
            _ => None,
        }
    }

    pub fn is_upper(&self) -> bool {
        self.upper_face().is_some()
    }

    /// Example hand shown on the board while a category is still open.
    pub fn placeholder_faces(&self) -> [u8; HAND_SIZE] {
        match self {
            Self::Ones => [1; HAND_SIZE],
            Self::Twos => [2; HAND_SIZE],
            Self::Threes => [3; HAND_SIZE],
            Self::Fours => [4; HAND_SIZE],
            Self::Fives => [5; HAND_SIZE],
            Self::Sixes => [6; HAND_SIZE],
            Self::ThreeOfAKind => [3, 3, 3, 5, 6],
            Self::FourOfAKind => [4, 4, 4, 4, 2],
            Self::FullHouse => [5, 5, 5, 2, 2],
            Self::SmallStraight => [1, 2, 3, 4, 6],
            Self::LargeStraight => [2, 3, 4, 5, 6],
            Self::Yahtzee => [6; HAND_SIZE],
            Self::Chance => [1, 3, 4, 5, 6],
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Score `faces` in `category`.
///
/// Anything other than exactly five faces in 1..=6 scores 0.
pub fn score(category: Category, faces: &[u8]) -> u16 {
    if faces.len() != HAND_SIZE || faces.iter().any(|f| !(1..=6).contains(f)) {
        return 0;
    }

    let counts = face_counts(faces);
    let sum: u16 = faces.iter().map(|&f| f as u16).sum();

    match category {
        Category::Ones
        | Category::Twos
        | Category::Threes
        | Category::Fours
        | Category::Fives
        | Category::Sixes => {
            let face = category.upper_face().unwrap_or(0);
            counts[face as usize] as u16 * face as u16
        }
        Category::ThreeOfAKind => {
            if counts.iter().any(|&c| c >= 3) {
                sum
            } else {
                0
            }
        }
        Category::FourOfAKind => {
            if counts.iter().any(|&c| c >= 4) {
                sum
            } else {
                0
            }
        }
        Category::FullHouse => {
            // Strict pair + triple; five of a kind does not qualify.
            let mut multiplicities: Vec<u8> = counts.iter().copied().filter(|&c| c > 0).collect();
            multiplicities.sort_unstable();
            if multiplicities == [2, 3] {
                FULL_HOUSE_SCORE
            } else {
                0
            }
        }
        Category::SmallStraight => {
            if has_straight(faces, 4) {
                SMALL_STRAIGHT_SCORE
            } else {
                0
            }
        }
        Category::LargeStraight => {
            if has_straight(faces, 5) {
                LARGE_STRAIGHT_SCORE
            } else {
                0
            }
        }
        Category::Yahtzee => {
            if counts.iter().any(|&c| c as usize == HAND_SIZE) {
                YAHTZEE_SCORE
            } else {
                0
            }
        }
        Category::Chance => sum,
    }
}

/// Score `faces` in every category, in board order.
pub fn score_all(faces: &[u8]) -> [(Category, u16); CATEGORY_COUNT] {
    Category::ALL.map(|c| (c, score(c, faces)))
}

/// True if `len` consecutive distinct values appear among `faces`.
pub fn has_straight(faces: &[u8], len: usize) -> bool {
    if len == 0 {
        return true;
    }
    let mut distinct: Vec<u8> = faces.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    distinct
        .windows(len)
        .any(|w| w.windows(2).all(|pair| pair[1] == pair[0] + 1))
}

fn face_counts(faces: &[u8]) -> [u8; 7] {
    let mut counts = [0u8; 7];
    for &f in faces {
        counts[f as usize] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_upper_section() {
        assert_eq!(score(Category::Ones, &[1, 1, 2, 3, 1]), 3);
        assert_eq!(score(Category::Threes, &[3, 3, 2, 3, 1]), 9);
        assert_eq!(score(Category::Sixes, &[1, 2, 3, 4, 5]), 0);
        assert_eq!(score(Category::Sixes, &[6, 6, 6, 6, 6]), 30);
    }

    #[test]
    fn test_of_a_kind() {
        assert_eq!(score(Category::ThreeOfAKind, &[1, 1, 1, 4, 5]), 12);
        assert_eq!(score(Category::ThreeOfAKind, &[1, 1, 2, 4, 5]), 0);
        assert_eq!(score(Category::FourOfAKind, &[2, 2, 2, 2, 6]), 14);
        assert_eq!(score(Category::FourOfAKind, &[2, 2, 2, 5, 6]), 0);
        // Five of a kind satisfies both.
        assert_eq!(score(Category::ThreeOfAKind, &[4, 4, 4, 4, 4]), 20);
        assert_eq!(score(Category::FourOfAKind, &[4, 4, 4, 4, 4]), 20);
    }

    #[test]
    fn test_full_house_is_strict() {
        assert_eq!(score(Category::FullHouse, &[5, 5, 5, 2, 2]), 25);
        assert_eq!(score(Category::FullHouse, &[2, 5, 2, 5, 5]), 25);
        assert_eq!(score(Category::FullHouse, &[3, 3, 3, 3, 3]), 0);
        assert_eq!(score(Category::FullHouse, &[3, 3, 3, 3, 2]), 0);
        assert_eq!(score(Category::FullHouse, &[1, 2, 3, 4, 5]), 0);
    }

    #[test]
    fn test_straights() {
        assert_eq!(score(Category::SmallStraight, &[1, 2, 3, 4, 6]), 30);
        assert_eq!(score(Category::LargeStraight, &[1, 2, 3, 4, 6]), 0);
        assert_eq!(score(Category::LargeStraight, &[2, 3, 4, 5, 6]), 40);
        assert_eq!(score(Category::SmallStraight, &[3, 4, 3, 5, 6]), 30);
        assert_eq!(score(Category::SmallStraight, &[1, 2, 3, 5, 6]), 0);
        assert_eq!(score(Category::LargeStraight, &[6, 5, 4, 3, 2]), 40);
    }

    #[test]
    fn test_yahtzee_and_chance() {
        assert_eq!(score(Category::Yahtzee, &[6, 6, 6, 6, 6]), 50);
        assert_eq!(score(Category::Yahtzee, &[6, 6, 6, 6, 5]), 0);
        assert_eq!(score(Category::Chance, &[1, 3, 4, 5, 6]), 19);
    }

    #[test]
    fn test_malformed_hands_score_zero() {
        assert_eq!(score(Category::Chance, &[1, 2, 3, 4]), 0);
        assert_eq!(score(Category::Chance, &[1, 2, 3, 4, 5, 6]), 0);
        assert_eq!(score(Category::Chance, &[0, 2, 3, 4, 5]), 0);
        assert_eq!(score(Category::Yahtzee, &[7, 7, 7, 7, 7]), 0);
        assert_eq!(score(Category::Chance, &[]), 0);
    }

    #[test]
    fn test_placeholders_score_their_category() {
        for category in Category::ALL {
            let faces = category.placeholder_faces();
            assert!(score(category, &faces) > 0, "{category} placeholder scores 0");
        }
    }

    #[test]
    fn test_score_all_order() {
        let scores = score_all(&[1, 1, 1, 4, 5]);
        assert_eq!(scores[0], (Category::Ones, 3));
        assert_eq!(scores[6], (Category::ThreeOfAKind, 12));
        assert_eq!(scores[12], (Category::Chance, 12));
    }

    fn hand() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(1u8..=6, HAND_SIZE)
    }

    proptest! {
        #[test]
        fn prop_full_house_iff_pair_and_triple(faces in hand()) {
            let mut counts: Vec<usize> = (1..=6u8)
                .map(|v| faces.iter().filter(|&&f| f == v).count())
                .filter(|&c| c > 0)
                .collect();
            counts.sort_unstable();
            let expected: u16 = if counts == vec![2, 3] { 25 } else { 0 };
            prop_assert_eq!(score(Category::FullHouse, &faces), expected);
        }

        #[test]
        fn prop_yahtzee_iff_all_equal(faces in hand()) {
            let all_equal = faces.iter().all(|&f| f == faces[0]);
            prop_assert_eq!(score(Category::Yahtzee, &faces) == 50, all_equal);
        }

        #[test]
        fn prop_order_independent(faces in hand()) {
            let mut sorted = faces.clone();
            sorted.sort_unstable();
            for category in Category::ALL {
                prop_assert_eq!(score(category, &faces), score(category, &sorted));
            }
        }

        #[test]
        fn prop_large_straight_implies_small(faces in hand()) {
            if score(Category::LargeStraight, &faces) > 0 {
                prop_assert_eq!(score(Category::SmallStraight, &faces), 30);
            }
        }
    }
}
