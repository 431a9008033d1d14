//! Kotoba vocabulary quiz engine.
//!
//! Picks the next vocabulary item to ask from a learner's familiarity
//! history, moves familiarity up or down a ten-bucket ladder after each
//! answer, and levels a learner up through a set once every item at the
//! current level is known.
//!
//! Zero I/O. Storage sits behind [`VocabRepository`] and answer capture
//! behind [`AnswerCollector`].

pub mod constants;
pub mod engine;
pub mod error;
pub mod familiarity;
pub mod memory;
pub mod model;
pub mod progression;
pub mod repository;
pub mod selector;
pub mod session;

pub use constants::{BUCKET_COUNT, FIRST_LEVEL, MASTERY_THRESHOLD, MAX_FAMILIARITY};
pub use engine::{Answer, AnswerCollector, QuizEngine, RoundOutcome, RoundReport};
pub use error::{QuizError, Result};
pub use familiarity::Familiarity;
pub use memory::MemoryRepository;
pub use model::{
    ItemProgress, SetId, UserId, UserSetProgress, VocabId, VocabSet, VocabularyItem,
};
pub use progression::{
    LevelUpResult, check_level_up, evaluate_level_up, record_answer, unlock_set,
};
pub use repository::VocabRepository;
pub use selector::{BucketWeights, priority_permutation, select_question};
pub use session::{SessionGuard, SessionLease};
