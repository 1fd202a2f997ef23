//! Client-key directory interface and in-memory implementation.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{error::DirectoryResult, types::ClientKeyRecord};

/// Read-only lookup of client keys.
///
/// Implementations return `Ok(None)` for an unknown key. The authorizer
/// still compares the returned record's key with the presented one, so a
/// backend with looser lookup semantics (prefix or case folding) cannot
/// widen what is accepted.
#[async_trait]
pub trait ClientKeyDirectory: Send + Sync {
    /// Returns the record registered under `key`.
    async fn find_by_key(&self, key: &str) -> DirectoryResult<Option<ClientKeyRecord>>;
}

/// In-memory implementation of [`ClientKeyDirectory`].
///
/// # Examples
///
/// ```
/// use gatekeeper_directory::{ClientKeyDirectory, ClientKeyRecord, MemoryClientKeyDirectory};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let directory = MemoryClientKeyDirectory::new();
///     directory.insert(
///         ClientKeyRecord::builder()
///             .key("ck_live_123")
///             .owner("auth0|42")
///             .allowed_domains(vec!["*".to_owned()])
///             .build(),
///     );
///
///     assert!(directory.find_by_key("ck_live_123").await?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryClientKeyDirectory {
    records: Arc<RwLock<HashMap<String, ClientKeyRecord>>>,
}

impl MemoryClientKeyDirectory {
    /// Creates a new empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record under its own key, replacing any previous one.
    pub fn insert(&self, record: ClientKeyRecord) {
        let lookup_key = record.key.as_str().to_owned();
        self.records.write().insert(lookup_key, record);
    }

    /// Removes the record for `key`. Returns `true` if one was removed.
    pub fn remove(&self, key: &str) -> bool {
        self.records.write().remove(key).is_some()
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns `true` if the directory holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl ClientKeyDirectory for MemoryClientKeyDirectory {
    #[tracing::instrument(skip_all)]
    async fn find_by_key(&self, key: &str) -> DirectoryResult<Option<ClientKeyRecord>> {
        Ok(self.records.read().get(key).cloned())
    }
}
