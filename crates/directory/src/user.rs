//! User directory interface and in-memory implementation.
//!
//! The authorizer only reads from the directory. Production deployments back
//! [`UserDirectory`] with their identity provider's management API; the
//! [`MemoryUserDirectory`] serves tests and local development.
//!
//! # Usage
//!
//! ```no_run
//! use gatekeeper_directory::{DirectoryResult, UserDirectory, UserRecord};
//!
//! async fn candidates<D: UserDirectory>(
//!     directory: &D,
//!     email: &str,
//! ) -> DirectoryResult<Vec<UserRecord>> {
//!     directory.find_by_email(email).await
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{error::DirectoryResult, types::UserRecord};

/// Read-only lookup of user accounts.
///
/// # Ordering
///
/// [`find_by_email`](Self::find_by_email) must return records in a stable
/// directory order. The Basic scheme verifies candidates in that order and
/// stops at the first match.
///
/// # Error Handling
///
/// An unknown id or email is not an error: implementations return
/// `Ok(None)` or an empty list. Errors are reserved for backend failures.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns every account registered with the given email.
    ///
    /// # Arguments
    ///
    /// * `email` - Email address to match
    ///
    /// # Returns
    ///
    /// - `Ok(users)` in directory order (may be empty)
    /// - `Err(...)` if the backend failed
    async fn find_by_email(&self, email: &str) -> DirectoryResult<Vec<UserRecord>>;

    /// Returns the account with the given id.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(user))` if the account exists
    /// - `Ok(None)` if it doesn't
    /// - `Err(...)` if the backend failed
    async fn find_by_id(&self, user_id: &str) -> DirectoryResult<Option<UserRecord>>;
}

/// In-memory implementation of [`UserDirectory`].
///
/// Records are kept in insertion order, which is the directory order seen
/// by [`find_by_email`](UserDirectory::find_by_email). Email matching is
/// ASCII case-insensitive.
///
/// # Examples
///
/// ```
/// use gatekeeper_directory::{MemoryUserDirectory, UserDirectory, UserRecord};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let directory = MemoryUserDirectory::new();
///     directory.insert(UserRecord::builder().user_id("u-1").email("a@example.com").build());
///
///     let found = directory.find_by_email("A@example.com").await?;
///     assert_eq!(found.len(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryUserDirectory {
    users: Arc<RwLock<Vec<UserRecord>>>,
}

impl MemoryUserDirectory {
    /// Creates a new empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory holding the given users, in order.
    #[must_use]
    pub fn with_users(users: impl IntoIterator<Item = UserRecord>) -> Self {
        Self { users: Arc::new(RwLock::new(users.into_iter().collect())) }
    }

    /// Adds a user, replacing any record with the same id in place.
    pub fn insert(&self, user: UserRecord) {
        let mut users = self.users.write();
        match users.iter_mut().find(|existing| existing.user_id == user.user_id) {
            Some(existing) => *existing = user,
            None => users.push(user),
        }
    }

    /// Removes the user with the given id. Returns `true` if one was removed.
    pub fn remove(&self, user_id: &str) -> bool {
        let mut users = self.users.write();
        let before = users.len();
        users.retain(|user| user.user_id != user_id);
        users.len() != before
    }

    /// Returns the number of stored users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Returns `true` if the directory holds no users.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    #[tracing::instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> DirectoryResult<Vec<UserRecord>> {
        let users = self.users.read();
        Ok(users
            .iter()
            .filter(|user| user.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)))
            .cloned()
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, user_id: &str) -> DirectoryResult<Option<UserRecord>> {
        let users = self.users.read();
        Ok(users.iter().find(|user| user.user_id == user_id).cloned())
    }
}
