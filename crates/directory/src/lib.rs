//! User and client-key directories for the gatekeeper authorizer.
//!
//! The authorizer never owns account data. It reads it through two
//! collaborator interfaces defined here:
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │              gatekeeper-authn                 │
//! │   BasicAuthorizer        ClientKeyAuthorizer  │
//! ├──────────────────────┬────────────────────────┤
//! │    UserDirectory     │   ClientKeyDirectory   │
//! │ (find_by_email/_id)  │     (find_by_key)      │
//! ├──────────────────────┼────────────────────────┤
//! │ MemoryUserDirectory  │ MemoryClientKeyDir...  │
//! │  (tests, dev)        │   (tests, dev)         │
//! └──────────────────────┴────────────────────────┘
//! ```
//!
//! Production backends implement the traits against their identity provider
//! and key table, mapping failures to [`DirectoryError`].
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with fixtures, failing
//!   directory wrappers and assertion macros.

#![deny(unsafe_code)]

pub mod client_key;
pub mod error;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
pub mod types;
pub mod user;

pub use client_key::{ClientKeyDirectory, MemoryClientKeyDirectory};
pub use error::{BoxError, DirectoryError, DirectoryResult, DirectoryResultExt};
pub use types::{AppMetadata, ClientKeyRecord, ORGANIZATION_OWNER_PREFIX, UserRecord};
pub use user::{MemoryUserDirectory, UserDirectory};
