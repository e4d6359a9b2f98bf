use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tessera::backend::{Database, InMemoryConfig, InMemoryDatabase};
use tessera::document::Document;
use tessera::error::TesseraError;
use tessera::postlist::weight::WeightingScheme;
use tessera::postlist::{AndPostList, CheckResult, OrPostList, PostingList, collect_docids};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 200 documents; each contains "red" and/or "blue" at random with wdf 1..=3.
fn random_db(seed: u64) -> Arc<dyn Database> {
    let mut rng = StdRng::seed_from_u64(seed);
    let db = InMemoryDatabase::with_config(InMemoryConfig::new(WeightingScheme::Wdf { factor: 1.0 }));
    for _ in 0..200 {
        let mut doc = Document::new();
        if rng.random_bool(0.3) {
            doc.add_term(b"red", rng.random_range(1..=3)).unwrap();
        }
        if rng.random_bool(0.5) {
            doc.add_term(b"blue", rng.random_range(1..=3)).unwrap();
        }
        doc.add_term(b"any", 1).unwrap();
        db.add_document(&doc).unwrap();
    }
    Arc::new(db)
}

fn open(db: &Arc<dyn Database>, term: &str) -> Box<dyn PostingList> {
    db.open_posting_list(term.as_bytes()).unwrap()
}

#[test]
fn test_absent_term_gives_terminated_cursor() {
    init_logger();
    let db = random_db(1);
    let mut pl = open(&db, "green");
    assert!(pl.at_end());
    assert_eq!(pl.estimate_max(), 0);
    pl.advance(0.0).unwrap();
    assert!(pl.at_end());
    assert!(matches!(pl.current_docid(), Err(TesseraError::InvalidOperation(_))));
}

#[test]
fn test_empty_term_is_rejected() {
    let db = random_db(1);
    assert!(matches!(
        db.open_posting_list(b""),
        Err(TesseraError::InvalidArgument(_))
    ));
    assert!(matches!(db.term_frequency(b""), Err(TesseraError::InvalidArgument(_))));
}

#[test]
fn test_estimates_are_ordered_and_never_grow() {
    init_logger();
    let db = random_db(2);
    let size = db.doc_count().unwrap();
    let mut cursors: Vec<Box<dyn PostingList>> = vec![
        open(&db, "red"),
        Box::new(AndPostList::new(open(&db, "red"), open(&db, "blue"), size)),
        Box::new(OrPostList::new(open(&db, "red"), open(&db, "blue"), size)),
    ];
    for pl in cursors.iter_mut() {
        let mut previous = (pl.estimate_min(), pl.estimate_max());
        assert!(pl.estimate_min() <= pl.estimate());
        assert!(pl.estimate() <= pl.estimate_max());
        pl.advance(0.0).unwrap();
        while !pl.at_end() {
            assert!(pl.estimate_min() <= pl.estimate());
            assert!(pl.estimate() <= pl.estimate_max());
            assert!(pl.estimate_max() <= previous.1, "{}", pl.description());
            previous = (pl.estimate_min(), pl.estimate_max());
            pl.advance(0.0).unwrap();
        }
    }
}

#[test]
fn test_docids_strictly_increase_and_match_statistics() {
    let db = random_db(3);
    let mut pl = open(&db, "blue");
    let docids = collect_docids(&mut pl, 0.0).unwrap();
    assert!(docids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(docids.len() as u32, db.term_frequency(b"blue").unwrap());
}

#[test]
fn test_skip_to_postcondition() {
    let db = random_db(4);
    let all = collect_docids(&mut open(&db, "red"), 0.0).unwrap();
    let last = *all.last().unwrap();

    let mut pl = open(&db, "red");
    let mut target = 1;
    while target <= last {
        pl.skip_to(target, 0.0).unwrap();
        let current = pl.current_docid().unwrap();
        assert!(current >= target);
        let expected = *all.iter().find(|&&d| d >= target).unwrap();
        assert_eq!(current, expected);
        // Skipping backwards never moves the cursor.
        pl.skip_to(target.saturating_sub(5).max(1), 0.0).unwrap();
        assert_eq!(pl.current_docid().unwrap(), current);
        target = current + 7;
    }
    pl.skip_to(last + 1, 0.0).unwrap();
    assert!(pl.at_end());
}

#[test]
fn test_at_end_is_absorbing() {
    let db = random_db(5);
    let mut pl = open(&db, "red");
    collect_docids(&mut pl, 0.0).unwrap();
    for _ in 0..3 {
        assert!(pl.at_end());
        pl.advance(0.0).unwrap();
        pl.skip_to(1, 0.0).unwrap();
    }
    assert!(pl.at_end());
}

#[test]
fn test_check_agrees_with_skip_to() {
    let db = random_db(6);
    let last = db.last_docid().unwrap();
    let size = db.doc_count().unwrap();

    for target in 1..=last {
        let mut checked = Box::new(AndPostList::new(open(&db, "red"), open(&db, "blue"), size));
        let mut skipped = Box::new(AndPostList::new(open(&db, "red"), open(&db, "blue"), size));

        skipped.skip_to(target, 0.0).unwrap();
        let skipped_hit = position(&*skipped) == Some(target);

        match checked.check(target, 0.0).unwrap() {
            CheckResult::Matched => {
                assert!(skipped_hit, "check matched {target}, skip_to did not");
                assert_eq!(checked.current_docid().unwrap(), target);
            }
            CheckResult::NotMatched => {
                assert!(!skipped_hit, "check rejected {target}");
                // A parked cursor resumes where skip_to would have landed.
                checked.advance(0.0).unwrap();
                assert_eq!(position(&*checked), position(&*skipped));
            }
            CheckResult::Unknown => {
                checked.skip_to(target, 0.0).unwrap();
                assert_eq!(position(&*checked), position(&*skipped));
            }
        }
    }
}

fn position(pl: &dyn PostingList) -> Option<u32> {
    if pl.at_end() {
        None
    } else {
        Some(pl.current_docid().unwrap())
    }
}

#[test]
fn test_and_or_match_set_operations() {
    let db = random_db(7);
    let size = db.doc_count().unwrap();
    let red = collect_docids(&mut open(&db, "red"), 0.0).unwrap();
    let blue = collect_docids(&mut open(&db, "blue"), 0.0).unwrap();

    let mut and = AndPostList::new(open(&db, "red"), open(&db, "blue"), size);
    let expected_and: Vec<u32> = red.iter().copied().filter(|d| blue.contains(d)).collect();
    assert_eq!(collect_docids(&mut and, 0.0).unwrap(), expected_and);

    let mut or = OrPostList::new(open(&db, "red"), open(&db, "blue"), size);
    let mut expected_or: Vec<u32> = red.iter().chain(blue.iter()).copied().collect();
    expected_or.sort_unstable();
    expected_or.dedup();
    assert_eq!(collect_docids(&mut or, 0.0).unwrap(), expected_or);
}

#[test]
fn test_weight_threshold_prunes() {
    let db = random_db(8);
    let mut pl = open(&db, "red");
    assert_eq!(pl.max_weight(), 3.0);

    pl.advance(2.5).unwrap();
    while !pl.at_end() {
        assert!(pl.current_weight().unwrap() >= 2.5);
        assert_eq!(pl.current_wdf().unwrap(), 3);
        pl.advance(2.5).unwrap();
    }

    // Nothing can reach a threshold above the bound.
    let mut pl = open(&db, "red");
    pl.advance(3.5).unwrap();
    assert!(pl.at_end());
}
