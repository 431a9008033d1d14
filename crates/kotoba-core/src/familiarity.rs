//! The familiarity ladder: ten buckets, one step per answer.
//!
//! A correct answer moves an item one bucket up, an incorrect one moves it
//! one bucket down. Both ends saturate; there is no wrap-around and no
//! scheduling state beyond the bucket itself.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{BUCKET_COUNT, MASTERY_THRESHOLD, MAX_FAMILIARITY};

/// How well a learner knows one vocabulary item, `0..=9`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Familiarity(u8);

impl Familiarity {
    pub const MIN: Familiarity = Familiarity(0);
    pub const MAX: Familiarity = Familiarity(MAX_FAMILIARITY);

    /// Returns `None` for values above [`MAX_FAMILIARITY`].
    pub fn new(value: u8) -> Option<Self> {
        (value <= MAX_FAMILIARITY).then_some(Self(value))
    }

    /// Clamp an arbitrary integer into the ladder.
    pub fn saturating(value: i64) -> Self {
        Self(value.clamp(0, MAX_FAMILIARITY as i64) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Bucket index for weight lookups.
    pub fn bucket(self) -> usize {
        self.0 as usize
    }

    /// Familiarity after one answer.
    pub fn apply(self, correct: bool) -> Self {
        if correct {
            Self((self.0 + 1).min(MAX_FAMILIARITY))
        } else {
            Self(self.0.saturating_sub(1))
        }
    }

    pub fn is_mastered(self) -> bool {
        self.0 >= MASTERY_THRESHOLD
    }

    /// Every bucket in ascending order.
    pub fn all() -> impl Iterator<Item = Familiarity> {
        (0..BUCKET_COUNT as u8).map(Familiarity)
    }
}

impl TryFrom<u8> for Familiarity {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Familiarity::new(value)
            .ok_or_else(|| format!("familiarity {value} out of range 0..={MAX_FAMILIARITY}"))
    }
}

impl From<Familiarity> for u8 {
    fn from(f: Familiarity) -> u8 {
        f.0
    }
}

impl fmt::Display for Familiarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
