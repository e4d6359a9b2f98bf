//! Transaction bookkeeping shared by the writable backends.

use std::sync::Arc;

use log::debug;
use uuid::Uuid;

use crate::backend::revision::Revision;
use crate::error::{Result, TesseraError};

#[derive(Debug)]
struct Transaction {
    id: Uuid,
    rollback: Arc<Revision>,
}

/// At most one open transaction and the revision to roll back to.
#[derive(Debug, Default)]
pub struct TransactionState {
    active: Option<Transaction>,
}

impl TransactionState {
    pub fn new() -> Self {
        TransactionState::default()
    }

    pub fn in_progress(&self) -> bool {
        self.active.is_some()
    }

    /// Open a transaction that `cancel` will roll back to `rollback`.
    pub fn begin(&mut self, rollback: Arc<Revision>) -> Result<Uuid> {
        if self.active.is_some() {
            return Err(TesseraError::invalid_operation(
                "cannot begin a transaction while one is in progress",
            ));
        }
        let id = Uuid::new_v4();
        debug!("transaction {id} began at revision {}", rollback.number());
        self.active = Some(Transaction { id, rollback });
        Ok(id)
    }

    pub fn commit(&mut self) -> Result<Uuid> {
        let txn = self.take("commit")?;
        debug!("transaction {} committed", txn.id);
        Ok(txn.id)
    }

    /// Close the transaction and build the revision to publish in its
    /// place: the rollback state, numbered after `current`, that still
    /// remembers every docid handed out meanwhile.
    pub fn cancel(&mut self, current: &Revision) -> Result<Revision> {
        let txn = self.take("cancel")?;
        let mut restored = (*txn.rollback).clone();
        restored.set_number(current.number() + 1);
        restored.raise_last_docid(current.last_docid());
        debug!(
            "transaction {} cancelled, back to revision {}",
            txn.id,
            txn.rollback.number()
        );
        Ok(restored)
    }

    /// Fail if a transaction is open; `flush` is not allowed inside one.
    pub fn ensure_idle(&self, operation: &str) -> Result<()> {
        match &self.active {
            Some(txn) => Err(TesseraError::invalid_operation(format!(
                "cannot {operation} inside transaction {}",
                txn.id
            ))),
            None => Ok(()),
        }
    }

    fn take(&mut self, operation: &str) -> Result<Transaction> {
        self.active.take().ok_or_else(|| {
            TesseraError::invalid_operation(format!("cannot {operation}: no transaction in progress"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    #[test]
    fn test_lifecycle() {
        let mut state = TransactionState::new();
        assert!(state.commit().is_err());
        assert!(state.ensure_idle("flush").is_ok());

        state.begin(Arc::new(Revision::new())).unwrap();
        assert!(state.in_progress());
        assert!(matches!(
            state.begin(Arc::new(Revision::new())),
            Err(TesseraError::InvalidOperation(_))
        ));
        assert!(state.ensure_idle("flush").is_err());
        state.commit().unwrap();
        assert!(!state.in_progress());
    }

    #[test]
    fn test_cancel_keeps_docid_high_water_mark() {
        let mut state = TransactionState::new();
        let before = Revision::new();
        state.begin(Arc::new(before)).unwrap();

        let mut during = Revision::new();
        during.add(Document::new()).unwrap();
        during.add(Document::new()).unwrap();
        during.set_number(7);

        let restored = state.cancel(&during).unwrap();
        assert_eq!(restored.doc_count(), 0);
        assert_eq!(restored.last_docid(), 2);
        assert_eq!(restored.number(), 8);
        assert!(state.cancel(&during).is_err());
    }
}
