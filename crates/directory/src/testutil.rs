//! Shared test utilities for directory consumers.
//!
//! Feature-gated behind `testutil` so the helpers stay out of production
//! builds. Enable the feature in `[dev-dependencies]`:
//!
//! ```toml
//! [dev-dependencies]
//! gatekeeper-directory = { path = "../directory", features = ["testutil"] }
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    client_key::{ClientKeyDirectory, MemoryClientKeyDirectory},
    error::{DirectoryError, DirectoryResult},
    types::{AppMetadata, ClientKeyRecord, UserRecord},
    user::{MemoryUserDirectory, UserDirectory},
};

/// Builds a verified, unblocked user holding the given API key hash.
#[must_use]
pub fn api_key_user(user_id: &str, email: &str, api_key_hash: &str) -> UserRecord {
    UserRecord::builder()
        .user_id(user_id)
        .email(email)
        .email_verified(true)
        .app_metadata(AppMetadata::builder().api_key(api_key_hash).build())
        .build()
}

/// Assert that a [`DirectoryResult`] is a [`DirectoryError::NotFound`].
#[macro_export]
macro_rules! assert_directory_not_found {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::DirectoryError::NotFound { .. })),
            "expected DirectoryError::NotFound, got: {:?}",
            $result,
        );
    };
}

/// Assert that a [`DirectoryResult`] is `Ok` and return the inner value.
#[macro_export]
macro_rules! assert_directory_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got DirectoryError: {e:?}"),
        }
    };
}

/// User directory that can be switched into a failing state.
///
/// Delegates to a [`MemoryUserDirectory`] until [`set_failure`](Self::set_failure)
/// installs an error; every lookup then returns a clone of that error.
#[derive(Debug, Default)]
pub struct FailingUserDirectory {
    /// Backing directory used while no failure is installed.
    pub inner: MemoryUserDirectory,
    fail_with: Mutex<Option<DirectoryError>>,
}

impl FailingUserDirectory {
    /// Wraps an existing directory.
    #[must_use]
    pub fn new(inner: MemoryUserDirectory) -> Self {
        Self { inner, fail_with: Mutex::new(None) }
    }

    /// Installs (or clears, with `None`) the error returned by every lookup.
    pub fn set_failure(&self, error: Option<DirectoryError>) {
        *self.fail_with.lock() = error;
    }

    fn failure(&self) -> DirectoryResult<()> {
        match self.fail_with.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl UserDirectory for FailingUserDirectory {
    async fn find_by_email(&self, email: &str) -> DirectoryResult<Vec<UserRecord>> {
        self.failure()?;
        self.inner.find_by_email(email).await
    }

    async fn find_by_id(&self, user_id: &str) -> DirectoryResult<Option<UserRecord>> {
        self.failure()?;
        self.inner.find_by_id(user_id).await
    }
}

/// Client-key directory that can be switched into a failing state.
#[derive(Debug, Default)]
pub struct FailingClientKeyDirectory {
    /// Backing directory used while no failure is installed.
    pub inner: MemoryClientKeyDirectory,
    fail_with: Mutex<Option<DirectoryError>>,
}

impl FailingClientKeyDirectory {
    /// Wraps an existing directory.
    #[must_use]
    pub fn new(inner: MemoryClientKeyDirectory) -> Self {
        Self { inner, fail_with: Mutex::new(None) }
    }

    /// Installs (or clears, with `None`) the error returned by every lookup.
    pub fn set_failure(&self, error: Option<DirectoryError>) {
        *self.fail_with.lock() = error;
    }
}

#[async_trait]
impl ClientKeyDirectory for FailingClientKeyDirectory {
    async fn find_by_key(&self, key: &str) -> DirectoryResult<Option<ClientKeyRecord>> {
        if let Some(error) = self.fail_with.lock().clone() {
            return Err(error);
        }
        self.inner.find_by_key(key).await
    }
}
