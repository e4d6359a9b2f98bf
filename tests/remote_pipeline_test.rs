use std::sync::Arc;

use tempfile::tempdir;

use tessera::backend::{
    Database, DatabaseConfig, DatabaseFactory, DiskDatabase, DiskDatabaseConfig,
    InMemoryDatabase, LoopbackConnection, RemoteDatabase, RemoteDatabaseConfig,
};
use tessera::document::Document;
use tessera::error::TesseraError;
use tessera::postlist::{PostingList, ValueRangePostList, collect_docids};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn local_db(count: u32) -> Arc<InMemoryDatabase> {
    let db = InMemoryDatabase::new();
    for i in 1..=count {
        let mut doc = Document::new();
        doc.set_data(format!("document {i}").into_bytes());
        doc.add_value(0, format!("{i:03}").into_bytes());
        doc.add_posting(b"every", 1, 1).unwrap();
        if i % 2 == 0 {
            doc.add_posting(b"even", 2, 1).unwrap();
        }
        db.add_document(&doc).unwrap();
    }
    Arc::new(db)
}

fn remote(local: Arc<InMemoryDatabase>, max_pending: usize) -> (Arc<LoopbackConnection>, RemoteDatabase) {
    let connection = Arc::new(LoopbackConnection::new(local));
    let remote = RemoteDatabase::new(
        Arc::clone(&connection) as _,
        RemoteDatabaseConfig::new(max_pending),
    );
    (connection, remote)
}

#[test]
fn test_request_then_collect_matches_open() {
    init_logger();
    let local = local_db(10);
    let (connection, remote) = remote(Arc::clone(&local), 8);

    remote.request_document(7).unwrap();
    let collected = remote.collect_document(7).unwrap();
    let opened = local.open_document(7, false).unwrap();

    assert_eq!(collected.docid(), 7);
    assert_eq!(collected.data().unwrap(), opened.data().unwrap());
    assert_eq!(collected.values().unwrap(), opened.values().unwrap());
    assert_eq!(collected.serialise().unwrap(), opened.serialise().unwrap());
    assert_eq!(connection.fetch_count(), 1);
    assert_eq!(remote.pending_requests(), 0);
}

#[test]
fn test_many_requests_collected_out_of_order() {
    let (connection, remote) = remote(local_db(20), 32);
    for did in 1..=20 {
        remote.request_document(did).unwrap();
    }
    // Requesting twice does not fetch twice.
    remote.request_document(5).unwrap();
    assert_eq!(remote.pending_requests(), 20);

    for did in (1..=20).rev() {
        let handle = remote.collect_document(did).unwrap();
        assert_eq!(handle.data().unwrap(), format!("document {did}").into_bytes());
    }
    assert_eq!(remote.pending_requests(), 0);
    assert_eq!(connection.fetch_count(), 20);
}

#[test]
fn test_collect_without_request_fetches_directly() {
    let (connection, remote) = remote(local_db(3), 4);
    assert_eq!(remote.collect_document(2).unwrap().data().unwrap(), b"document 2");
    assert_eq!(connection.fetch_count(), 1);
    assert!(matches!(remote.collect_document(99), Err(TesseraError::DocNotFound(99))));
}

#[test]
fn test_missing_requested_document_is_not_found() {
    let local = local_db(3);
    local.delete_document(2).unwrap();
    let (_, remote) = remote(local, 4);
    remote.request_document(2).unwrap();
    assert!(remote.collect_document(2).unwrap_err().is_not_found());
}

#[test]
fn test_remote_reads_match_local() {
    let local = local_db(9);
    let (_, remote) = remote(Arc::clone(&local), 4);

    assert_eq!(remote.doc_count().unwrap(), 9);
    assert_eq!(remote.last_docid().unwrap(), 9);
    assert_eq!(remote.average_length().unwrap(), local.average_length().unwrap());
    assert_eq!(remote.term_frequency(b"even").unwrap(), 4);
    assert_eq!(remote.doc_length(4).unwrap(), 2);

    let mut pl = remote.open_posting_list(b"even").unwrap();
    assert_eq!(collect_docids(&mut pl, 0.0).unwrap(), vec![2, 4, 6, 8]);
    assert!(remote.open_posting_list(b"odd").unwrap().at_end());

    let positions: Vec<u32> = remote.open_position_list(4, b"even").unwrap().collect();
    assert_eq!(positions, vec![2]);

    let lazy = remote.open_document(3, true).unwrap();
    assert_eq!(lazy.value(0).unwrap(), Some(b"003".to_vec()));
}

#[test]
fn test_offline_connection_is_retryable() {
    let (connection, remote) = remote(local_db(3), 4);
    connection.set_online(false);

    let err = remote.doc_count().unwrap_err();
    assert!(err.is_retryable());
    assert!(!err.is_fatal());

    remote.request_document(1).unwrap();
    assert!(remote.collect_document(1).unwrap_err().is_retryable());
    assert!(remote.keep_alive().unwrap_err().is_retryable());

    connection.set_online(true);
    remote.keep_alive().unwrap();
    assert_eq!(connection.keep_alive_count(), 1);
    assert_eq!(remote.collect_document(1).unwrap().data().unwrap(), b"document 1");
}

#[test]
fn test_remote_sees_new_data_after_reopen() {
    let local = local_db(2);
    let (_, remote) = remote(Arc::clone(&local), 4);
    let mut before = remote.open_posting_list(b"every").unwrap();

    local.add_document(&Document::new()).unwrap();
    let mut doc = Document::new();
    doc.add_term(b"every", 1).unwrap();
    local.add_document(&doc).unwrap();
    remote.reopen().unwrap();

    assert_eq!(collect_docids(&mut before, 0.0).unwrap(), vec![1, 2]);
    let mut after = remote.open_posting_list(b"every").unwrap();
    assert_eq!(collect_docids(&mut after, 0.0).unwrap(), vec![1, 2, 4]);
}

#[test]
fn test_remote_through_factory() {
    let config = DatabaseConfig::from_json(r#"{"backend":"remote","max_pending_requests":2}"#).unwrap();
    let connection = Arc::new(LoopbackConnection::new(local_db(4)));
    let db = DatabaseFactory::connect(&config, connection).unwrap();

    assert!(db.is_remote());
    let remote = db.as_remote().unwrap();
    assert!(matches!(
        db.add_document(&Document::new()),
        Err(TesseraError::Unsupported(_))
    ));
    assert!(db.snapshot().unwrap().unwrap().is_remote());

    for did in 1..=4 {
        db.request_document(did).unwrap();
    }
    assert_eq!(remote.pending_requests(), 2);
    for did in 1..=4 {
        assert_eq!(db.collect_document(did).unwrap().docid(), did);
    }

    db.close().unwrap();
    assert!(matches!(db.doc_count(), Err(TesseraError::Closed)));
}

#[test]
fn test_remote_value_range_is_stable_across_reopen() {
    init_logger();
    let dir = tempdir().unwrap();
    let writer = DiskDatabase::open(DiskDatabaseConfig::new(dir.path()).sync_on_flush(false)).unwrap();
    for _ in 0..3 {
        let mut doc = Document::new();
        doc.add_value(0, b"150".to_vec());
        writer.add_document(&doc).unwrap();
    }
    writer.flush().unwrap();

    let reader = Arc::new(DiskDatabase::open_readonly(dir.path()).unwrap());
    let connection = Arc::new(LoopbackConnection::new(reader));
    let remote: Arc<dyn Database> =
        Arc::new(RemoteDatabase::new(connection, RemoteDatabaseConfig::new(4)));

    let mut pl =
        ValueRangePostList::new(Arc::clone(&remote), 0, b"100".to_vec(), b"200".to_vec()).unwrap();
    pl.advance(0.0).unwrap();
    assert_eq!(pl.current_docid().unwrap(), 1);

    writer.delete_document(2).unwrap();
    writer.delete_document(3).unwrap();
    writer.flush().unwrap();
    assert!(remote.reopen().unwrap());

    assert_eq!(collect_docids(&mut pl, 0.0).unwrap(), vec![2, 3]);
    let mut fresh =
        ValueRangePostList::new(Arc::clone(&remote), 0, b"100".to_vec(), b"200".to_vec()).unwrap();
    assert_eq!(collect_docids(&mut fresh, 0.0).unwrap(), vec![1]);
}
