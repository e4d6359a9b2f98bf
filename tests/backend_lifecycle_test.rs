use std::sync::Arc;

use tempfile::tempdir;

use tessera::backend::{
    Database, DatabaseConfig, DatabaseFactory, DiskDatabase, DiskDatabaseConfig, InMemoryDatabase,
};
use tessera::document::Document;
use tessera::error::TesseraError;
use tessera::postlist::collect_docids;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn doc(terms: &[&str], data: &str) -> Document {
    let mut doc = Document::new();
    for (pos, term) in terms.iter().enumerate() {
        doc.add_posting(term.as_bytes(), pos as u32 + 1, 1).unwrap();
    }
    doc.set_data(data.as_bytes().to_vec());
    doc
}

fn docids(db: &dyn Database, term: &str) -> Vec<u32> {
    let mut pl = db.open_posting_list(term.as_bytes()).unwrap();
    collect_docids(&mut pl, 0.0).unwrap()
}

fn disk_config(path: &std::path::Path) -> DiskDatabaseConfig {
    DiskDatabaseConfig::new(path).sync_on_flush(false)
}

#[test]
fn test_statistics_and_lists() {
    init_logger();
    let db = InMemoryDatabase::new();
    db.add_document(&doc(&["quick", "brown", "fox"], "one")).unwrap();
    db.add_document(&doc(&["lazy", "dog"], "two")).unwrap();
    db.add_document(&doc(&["quick", "dog", "dog"], "three")).unwrap();

    assert_eq!(db.doc_count().unwrap(), 3);
    assert_eq!(db.last_docid().unwrap(), 3);
    assert_eq!(db.doc_length(3).unwrap(), 3);
    assert!((db.average_length().unwrap() - 8.0 / 3.0).abs() < 1e-9);
    assert_eq!(db.term_frequency(b"dog").unwrap(), 2);
    assert_eq!(db.collection_frequency(b"dog").unwrap(), 3);
    assert!(db.term_exists(b"fox").unwrap());
    assert!(!db.term_exists(b"cat").unwrap());
    assert!(db.doc_length(9).unwrap_err().is_not_found());

    let mut tl = db.open_term_list(3).unwrap();
    let mut terms = Vec::new();
    tl.advance().unwrap();
    while !tl.at_end() {
        terms.push((tl.current_term().unwrap().to_vec(), tl.current_wdf().unwrap()));
        tl.advance().unwrap();
    }
    assert_eq!(terms, vec![(b"dog".to_vec(), 2), (b"quick".to_vec(), 1)]);

    let positions: Vec<u32> = db.open_position_list(3, b"dog").unwrap().collect();
    assert_eq!(positions, vec![2, 3]);
    assert!(db.open_position_list(2, b"quick").unwrap().is_empty());

    let mut all = db.open_all_terms_with_prefix(b"d").unwrap();
    all.advance().unwrap();
    assert_eq!(all.current_term().unwrap(), b"dog");
    assert_eq!(all.current_term_frequency().unwrap(), 2);
    all.advance().unwrap();
    assert!(all.at_end());
}

#[test]
fn test_document_handles() {
    let db = InMemoryDatabase::new();
    let did = db.add_document(&doc(&["a"], "payload")).unwrap();

    let handle = db.open_document(did, false).unwrap();
    assert_eq!(handle.data().unwrap(), b"payload");

    assert!(matches!(db.open_document(42, false), Err(TesseraError::DocNotFound(42))));
    let lazy = db.open_document(42, true).unwrap();
    assert!(!lazy.is_loaded());
    assert!(lazy.probe().unwrap().is_none());
    assert!(matches!(lazy.data(), Err(TesseraError::DocNotFound(42))));

    // Request/collect on a local backend is the same as opening.
    db.request_document(did).unwrap();
    assert_eq!(db.collect_document(did).unwrap().data().unwrap(), b"payload");
}

#[test]
fn test_docids_are_never_reused() {
    let db = InMemoryDatabase::new();
    for _ in 0..3 {
        db.add_document(&doc(&["x"], "")).unwrap();
    }
    db.delete_document(3).unwrap();
    assert_eq!(db.add_document(&doc(&["x"], "")).unwrap(), 4);
    assert!(db.delete_document(3).unwrap_err().is_not_found());

    db.replace_document(10, &doc(&["y"], "ten")).unwrap();
    assert_eq!(db.last_docid().unwrap(), 10);
    assert_eq!(db.add_document(&doc(&["x"], "")).unwrap(), 11);
    assert_eq!(docids(&db, "x"), vec![1, 2, 4, 11]);
}

#[test]
fn test_transaction_lifecycle() {
    init_logger();
    let db = InMemoryDatabase::new();
    db.add_document(&doc(&["keep"], "")).unwrap();

    assert!(matches!(db.commit_transaction(), Err(TesseraError::InvalidOperation(_))));
    assert!(matches!(db.cancel_transaction(), Err(TesseraError::InvalidOperation(_))));

    db.begin_transaction().unwrap();
    assert!(matches!(db.begin_transaction(), Err(TesseraError::InvalidOperation(_))));
    assert!(matches!(db.flush(), Err(TesseraError::InvalidOperation(_))));
    db.add_document(&doc(&["drop"], "")).unwrap();
    db.delete_document(1).unwrap();
    db.cancel_transaction().unwrap();

    assert_eq!(db.doc_count().unwrap(), 1);
    assert_eq!(docids(&db, "keep"), vec![1]);
    assert!(docids(&db, "drop").is_empty());
    // The cancelled id stays burnt.
    assert_eq!(db.add_document(&doc(&["after"], "")).unwrap(), 3);

    db.begin_transaction().unwrap();
    db.add_document(&doc(&["kept"], "")).unwrap();
    db.commit_transaction().unwrap();
    assert_eq!(docids(&db, "kept"), vec![4]);
    db.flush().unwrap();
}

#[test]
fn test_cursors_survive_mutation() {
    let db = InMemoryDatabase::new();
    for _ in 0..3 {
        db.add_document(&doc(&["fox"], "")).unwrap();
    }
    let mut pl = db.open_posting_list(b"fox").unwrap();
    let lazy = db.open_document(2, true).unwrap();

    db.delete_document(2).unwrap();
    db.add_document(&doc(&["fox"], "")).unwrap();
    assert!(!db.reopen().unwrap());

    assert_eq!(collect_docids(&mut pl, 0.0).unwrap(), vec![1, 2, 3]);
    // A lazy handle loads from the live backend, not from open time.
    assert!(lazy.probe().unwrap().is_none());
    assert_eq!(docids(&db, "fox"), vec![1, 3, 4]);
}

#[test]
fn test_lazy_handle_sees_delete_before_first_read() {
    let db = InMemoryDatabase::new();
    let mut document = doc(&["a"], "payload");
    document.add_value(0, b"v".to_vec());
    let did = db.add_document(&document).unwrap();

    let lazy = db.open_document(did, true).unwrap();
    db.delete_document(did).unwrap();

    assert!(!lazy.is_loaded());
    assert!(matches!(lazy.value(0), Err(TesseraError::DocNotFound(1))));
    assert!(matches!(lazy.data(), Err(TesseraError::DocNotFound(1))));
}

#[test]
fn test_disk_lazy_handle_sees_delete_before_first_read() {
    let dir = tempdir().unwrap();
    let db = DiskDatabase::open(disk_config(dir.path())).unwrap();
    let did = db.add_document(&doc(&["a"], "payload")).unwrap();
    let lazy = db.open_document(did, true).unwrap();
    let eager = db.open_document(did, false).unwrap();

    db.delete_document(did).unwrap();

    assert!(lazy.data().unwrap_err().is_not_found());
    assert_eq!(eager.data().unwrap(), b"payload");
}

#[test]
fn test_closed_backend_rejects_everything() {
    let db = InMemoryDatabase::new();
    db.add_document(&doc(&["a"], "")).unwrap();
    db.close().unwrap();

    let err = db.doc_count().unwrap_err();
    assert!(matches!(err, TesseraError::Closed));
    assert!(err.is_fatal());
    assert!(db.open_posting_list(b"a").is_err());
    assert!(db.add_document(&doc(&["b"], "")).is_err());
}

#[test]
fn test_disk_round_trip_through_factory() {
    init_logger();
    let dir = tempdir().unwrap();
    let config = DatabaseConfig::Disk(disk_config(dir.path()));
    {
        let db = DatabaseFactory::open(&config).unwrap();
        db.add_document(&doc(&["alpha", "beta"], "first")).unwrap();
        db.add_document(&doc(&["beta"], "second")).unwrap();
        db.add_document(&doc(&["gamma"], "third")).unwrap();
        db.delete_document(3).unwrap();
        db.close().unwrap();
    }

    let db = DatabaseFactory::open(&config).unwrap();
    assert_eq!(db.doc_count().unwrap(), 2);
    assert_eq!(docids(&*db, "beta"), vec![1, 2]);
    assert_eq!(db.open_document(2, false).unwrap().data().unwrap(), b"second");
    assert_eq!(db.add_document(&doc(&["delta"], "")).unwrap(), 4);
}

#[test]
fn test_disk_snapshot_stability_across_reopen() {
    init_logger();
    let dir = tempdir().unwrap();
    let writer = DiskDatabase::open(disk_config(dir.path())).unwrap();
    for _ in 0..3 {
        writer.add_document(&doc(&["fox"], "")).unwrap();
    }
    writer.flush().unwrap();

    let reader = DiskDatabase::open_readonly(dir.path()).unwrap();
    let mut old = reader.open_posting_list(b"fox").unwrap();
    let snapshot = reader.snapshot().unwrap().unwrap();
    let pinned = snapshot.open_document(1, true).unwrap();
    let live = reader.open_document(1, true).unwrap();

    writer.add_document(&doc(&["fox"], "")).unwrap();
    writer.delete_document(1).unwrap();
    // Unflushed changes are invisible to readers.
    assert!(!reader.reopen().unwrap());
    writer.flush().unwrap();
    assert!(reader.reopen().unwrap());
    assert!(!reader.reopen().unwrap());

    assert_eq!(collect_docids(&mut old, 0.0).unwrap(), vec![1, 2, 3]);
    assert!(pinned.probe().unwrap().is_some());
    assert!(live.probe().unwrap().is_none());
    assert_eq!(docids(&*snapshot, "fox"), vec![1, 2, 3]);
    assert_eq!(docids(&reader, "fox"), vec![2, 3, 4]);
    assert_eq!(reader.doc_count().unwrap(), 3);
}

#[test]
fn test_disk_read_only_and_locking() {
    let dir = tempdir().unwrap();
    assert!(DiskDatabase::open_readonly(dir.path().join("missing")).is_err());

    let writer = DiskDatabase::open(disk_config(dir.path())).unwrap();
    assert!(writer.is_writable());
    assert!(matches!(
        DiskDatabase::open(disk_config(dir.path())),
        Err(TesseraError::InvalidOperation(_))
    ));

    let reader = DiskDatabase::open_readonly(dir.path()).unwrap();
    assert!(!reader.is_writable());
    for err in [
        reader.add_document(&Document::new()).unwrap_err(),
        reader.delete_document(1).unwrap_err(),
        reader.replace_document(1, &Document::new()).unwrap_err(),
        reader.begin_transaction().unwrap_err(),
        reader.flush().unwrap_err(),
    ] {
        assert!(matches!(err, TesseraError::Unsupported(_)));
        assert!(err.is_fatal());
    }

    drop(writer);
    let writer = DiskDatabase::open(disk_config(dir.path())).unwrap();
    writer.close().unwrap();
}

#[test]
fn test_disk_transactions() {
    let dir = tempdir().unwrap();
    let db = DiskDatabase::open(disk_config(dir.path())).unwrap();
    db.add_document(&doc(&["base"], "")).unwrap();

    db.begin_transaction().unwrap();
    db.add_document(&doc(&["tx"], "")).unwrap();
    let reader = DiskDatabase::open_readonly(dir.path()).unwrap();
    // Begin flushed the pending change, the transaction is still private.
    assert_eq!(docids(&reader, "base"), vec![1]);
    assert!(docids(&reader, "tx").is_empty());

    db.commit_transaction().unwrap();
    assert!(reader.reopen().unwrap());
    assert_eq!(docids(&reader, "tx"), vec![2]);

    db.begin_transaction().unwrap();
    db.add_document(&doc(&["gone"], "")).unwrap();
    db.cancel_transaction().unwrap();
    db.flush().unwrap();
    reader.reopen().unwrap();
    assert!(docids(&reader, "gone").is_empty());
    assert_eq!(reader.doc_count().unwrap(), 2);
}

#[test]
fn test_shared_backend_across_threads() {
    let db: Arc<dyn Database> = Arc::new(InMemoryDatabase::new());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let db = Arc::clone(&db);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    db.add_document(&doc(&["shared"], "")).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(db.doc_count().unwrap(), 100);
    assert_eq!(docids(&*db, "shared"), (1..=100).collect::<Vec<u32>>());
}
