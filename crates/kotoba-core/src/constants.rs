/// Number of familiarity buckets (0 through 9).
pub const BUCKET_COUNT: usize = 10;

/// Highest familiarity an item can reach.
pub const MAX_FAMILIARITY: u8 = 9;

/// Familiarity at or above which an item counts as known.
/// A level is complete once every item in it reaches this.
pub const MASTERY_THRESHOLD: u8 = 5;

/// Level every freshly unlocked set starts at.
pub const FIRST_LEVEL: u32 = 1;

/// Default time a learner has to answer one question.
pub const DEFAULT_ANSWER_TIMEOUT_SECS: u64 = 20;

/// Tolerance when checking that bucket weights sum to one.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;
