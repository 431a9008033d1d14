//! Integration tests exercising the full quiz pipeline:
//! unlock → select → answer → level-up, across module boundaries.

use kotoba_core::{
    BucketWeights, Familiarity, LevelUpResult, MemoryRepository, QuizError, VocabRepository,
    VocabSet, VocabularyItem, check_level_up, evaluate_level_up, record_answer, select_question,
    unlock_set,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::SmallRng;

const LEARNER: i64 = 208_353_857_992_916_992;

fn rng() -> SmallRng {
    SmallRng::seed_from_u64(42)
}

/// Three-level hiragana set with vocab ids assigned in catalog order.
fn hiragana() -> MemoryRepository {
    const LEVELS: [&[(&str, &str)]; 3] = [
        &[("あ", "a"), ("い", "i"), ("う", "u"), ("え", "e"), ("お", "o")],
        &[("か", "ka"), ("き", "ki"), ("く", "ku")],
        &[("さ", "sa"), ("し", "shi/si")],
    ];
    let repo = MemoryRepository::new();
    repo.add_set(VocabSet {
        set_id: 2,
        name: "hiragana".to_string(),
        total_levels: LEVELS.len() as u32,
        unlock_description: Some("The basic Japanese syllabary".to_string()),
    });
    let mut vocab_id = 0;
    for (i, level) in LEVELS.iter().enumerate() {
        for (native, roman) in level.iter() {
            vocab_id += 1;
            repo.add_item(VocabularyItem {
                vocab_id,
                set_id: 2,
                level: i as u32 + 1,
                native_form: native.to_string(),
                romanization: roman.to_string(),
                definition: None,
                pronunciation_reference: None,
            })
            .unwrap();
        }
    }
    repo
}

/// Answer correctly until the current level completes.
fn master_current_level(repo: &MemoryRepository) -> LevelUpResult {
    let level = repo.current_level(LEARNER, 2).unwrap();
    let items = repo.items_at_level(2, level).unwrap();
    let mut last = LevelUpResult::none();
    for _ in 0..5 {
        for item in &items {
            last = record_answer(repo, LEARNER, item.vocab_id, true).unwrap();
            if last.leveled_up {
                return last;
            }
        }
    }
    last
}

#[test]
fn full_progression_through_every_level() {
    let repo = hiragana();
    assert_eq!(unlock_set(&repo, LEARNER, 2).unwrap(), 5);

    assert_eq!(master_current_level(&repo), LevelUpResult::reached(2));
    assert_eq!(repo.row_count(LEARNER), 8);

    assert_eq!(master_current_level(&repo), LevelUpResult::reached(3));
    assert_eq!(repo.row_count(LEARNER), 10);

    // Last level: mastering it changes nothing.
    assert_eq!(master_current_level(&repo), LevelUpResult::none());
    assert_eq!(repo.current_level(LEARNER, 2).unwrap(), 3);
    assert!(check_level_up(&repo, LEARNER).unwrap());
    assert_eq!(evaluate_level_up(&repo, LEARNER).unwrap(), LevelUpResult::none());
}

#[test]
fn selection_only_returns_unlocked_items() {
    let repo = hiragana();
    unlock_set(&repo, LEARNER, 2).unwrap();
    let mut rng = rng();
    for _ in 0..200 {
        let item = select_question(&repo, LEARNER, &BucketWeights::default(), &mut rng).unwrap();
        assert_eq!(item.level, 1, "level {} item leaked: {}", item.level, item.native_form);
    }
}

#[test]
fn selection_reaches_new_level_after_level_up() {
    let repo = hiragana();
    unlock_set(&repo, LEARNER, 2).unwrap();
    master_current_level(&repo);

    // New items sit at familiarity 0; weight only that bucket.
    let mut w = [0.0; 10];
    w[0] = 1.0;
    let weights = BucketWeights::new(&w).unwrap();
    let item = select_question(&repo, LEARNER, &weights, &mut rng()).unwrap();
    assert_eq!(item.level, 2);
}

#[test]
fn relock_after_level_up_keeps_rows() {
    let repo = hiragana();
    unlock_set(&repo, LEARNER, 2).unwrap();
    master_current_level(&repo);
    let before = repo.familiarity(LEARNER, 1).unwrap();

    assert_eq!(repo.unlock_level(LEARNER, 2, 1).unwrap(), 0);
    assert_eq!(unlock_set(&repo, LEARNER, 2).unwrap(), 0);
    assert_eq!(repo.familiarity(LEARNER, 1).unwrap(), before);
}

#[test]
fn unlock_level_stays_within_reached_levels() {
    let repo = hiragana();
    repo.add_user(LEARNER);
    assert!(matches!(
        repo.unlock_level(LEARNER, 2, 1),
        Err(QuizError::SetNotUnlocked { set_id: 2, .. })
    ));
    assert_eq!(repo.row_count(LEARNER), 0);

    unlock_set(&repo, LEARNER, 2).unwrap();
    assert!(matches!(
        repo.unlock_level(LEARNER, 2, 3),
        Err(QuizError::LevelNotReached { level: 3, current: 1, .. })
    ));
    assert_eq!(repo.row_count(LEARNER), 5);
    assert!(repo.item_progress(LEARNER, 9).is_err());
}

#[test]
fn active_set_must_be_unlocked() {
    let repo = hiragana();
    repo.add_user(LEARNER);
    assert!(matches!(
        repo.active_set(LEARNER),
        Err(QuizError::NoActiveSet(LEARNER))
    ));
    assert!(matches!(
        repo.set_active_set(LEARNER, 2),
        Err(QuizError::SetNotUnlocked { .. })
    ));
    unlock_set(&repo, LEARNER, 2).unwrap();
    repo.set_active_set(LEARNER, 2).unwrap();
    assert_eq!(repo.active_set(LEARNER).unwrap(), 2);
}

#[test]
fn unknown_set_is_rejected() {
    let repo = hiragana();
    assert!(matches!(
        unlock_set(&repo, LEARNER, 404),
        Err(QuizError::UnknownSet(404))
    ));
}

#[test]
fn familiarity_floor_after_many_misses() {
    let repo = hiragana();
    unlock_set(&repo, LEARNER, 2).unwrap();
    repo.seed_familiarity(LEARNER, 3, Familiarity::new(2).unwrap())
        .unwrap();
    for _ in 0..6 {
        record_answer(&repo, LEARNER, 3, false).unwrap();
    }
    let row = repo.item_progress(LEARNER, 3).unwrap();
    assert_eq!(row.familiarity, Familiarity::MIN);
    assert_eq!((row.times_shown, row.times_correct), (6, 0));
}

proptest! {
    #[test]
    fn current_level_never_decreases(
        answers in proptest::collection::vec((0usize..10, any::<bool>()), 0..300),
    ) {
        let repo = hiragana();
        unlock_set(&repo, LEARNER, 2).unwrap();
        let mut level = repo.current_level(LEARNER, 2).unwrap();

        for (pick, correct) in answers {
            let level_items = repo.items_at_level(2, level).unwrap();
            let item = &level_items[pick % level_items.len()];
            let result = record_answer(&repo, LEARNER, item.vocab_id, correct).unwrap();

            let now = repo.current_level(LEARNER, 2).unwrap();
            prop_assert!(now >= level);
            prop_assert!(now <= 3);
            if result.leveled_up {
                prop_assert_eq!(result.new_level, Some(now));
                prop_assert_eq!(now, level + 1);
            } else {
                prop_assert_eq!(now, level);
            }
            level = now;
        }
    }

    #[test]
    fn level_check_is_stable_without_answers(seed in any::<u64>()) {
        let repo = hiragana();
        unlock_set(&repo, LEARNER, 2).unwrap();
        let mut rng = SmallRng::seed_from_u64(seed);
        for _ in 0..10 {
            let item = select_question(&repo, LEARNER, &BucketWeights::uniform(), &mut rng).unwrap();
            record_answer(&repo, LEARNER, item.vocab_id, true).unwrap();
        }
        let first = check_level_up(&repo, LEARNER).unwrap();
        let second = check_level_up(&repo, LEARNER).unwrap();
        prop_assert_eq!(first, second);
    }
}
