//! JSON document store over sled
//!
//! Records live in the default tree keyed by their bech32 id; the id's
//! human-readable prefix namespaces record kinds, so listing a kind is a
//! prefix scan. Multi-record atomicity for aggregate creation goes through
//! [`sled::Tree::transaction`] on the same tree.

use crate::error::TargetError;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree};
use std::sync::Arc;

pub struct DocStore {
    db: Arc<sled::Db>,
}

impl DocStore {
    pub fn new(db: Arc<sled::Db>) -> Self {
        Self { db }
    }

    /// Handle to the underlying database, for transaction scopes.
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    pub fn put<T: Serialize>(&self, id: &str, doc: &T) -> Result<(), TargetError> {
        let bytes = serde_json::to_vec(doc)?;
        self.db.insert(id.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, id: &str) -> Result<Option<T>, TargetError> {
        match self.db.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    /// Fetch without binding to a record type, for expansion and generic
    /// document reads.
    pub fn get_raw(&self, id: &str) -> Result<Option<Value>, TargetError> {
        match self.db.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    pub fn remove(&self, id: &str) -> Result<bool, TargetError> {
        Ok(self.db.remove(id.as_bytes())?.is_some())
    }

    /// All records of one kind, in id order.
    pub fn scan_kind(&self, hrp: &str) -> Result<Vec<Value>, TargetError> {
        let mut docs = Vec::new();
        for item in self.db.scan_prefix(hrp.as_bytes()) {
            let (_, bytes) = item?;
            docs.push(serde_json::from_slice(bytes.as_ref())?);
        }
        Ok(docs)
    }
}

/// Insert a record inside a transaction scope, aborting on codec failure.
pub fn put_in_tx<T: Serialize>(
    tx: &TransactionalTree,
    id: &str,
    doc: &T,
) -> ConflictableTransactionResult<(), TargetError> {
    let bytes = serde_json::to_vec(doc)
        .map_err(|e| ConflictableTransactionError::Abort(TargetError::from(e)))?;
    tx.insert(id.as_bytes(), bytes)?;
    Ok(())
}

/// Abort the enclosing transaction with a domain error.
pub fn abort<T>(err: TargetError) -> ConflictableTransactionResult<T, TargetError> {
    Err(ConflictableTransactionError::Abort(err))
}
