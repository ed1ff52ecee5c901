//! Accounts and per-user report history.

mod auth;
mod firestore;
mod memory;
pub mod value;

use crate::session::SessionReport;
use futures::future::BoxFuture;

pub use auth::{AuthError, AuthSession, FirebaseAuth, DEFAULT_IDENTITY_BASE_URL};
pub use firestore::{FirestoreReportStore, UserProfile, DEFAULT_FIRESTORE_BASE_URL};
pub use memory::MemoryReportStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("http error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("firestore error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("document codec: {0}")]
    Codec(String),

    #[error("invalid store url: {0}")]
    Url(String),
}

/// Append-only history of reports, keyed by user id.
pub trait ReportStore: Send + Sync {
    /// Stores the report with a fresh `createdAt` and returns the assigned id.
    fn save<'a>(
        &'a self,
        uid: &'a str,
        report: &'a SessionReport,
    ) -> BoxFuture<'a, Result<String, StoreError>>;

    /// Most recent first.
    fn history<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, Result<Vec<SessionReport>, StoreError>>;

    /// Removes every report of the user and returns how many were removed.
    fn clear<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, Result<usize, StoreError>>;
}

pub(crate) fn newest_first(reports: &mut [SessionReport]) {
    reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
