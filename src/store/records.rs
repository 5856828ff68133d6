//! Account and job lookups.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from record queries.
#[derive(Debug, Error)]
pub enum RecordStoreError {
    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Backend is temporarily unavailable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// The subset of an account the notification flows read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: String,
    pub role: String,
    /// Registered push token, if any
    pub push_token: Option<String>,
}

impl AccountRecord {
    pub fn new(id: impl Into<String>, role: impl Into<String>, push_token: Option<&str>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            push_token: push_token.filter(|t| !t.is_empty()).map(str::to_string),
        }
    }
}

/// The subset of a job posting the application flow reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub provider_id: String,
    pub title: Option<String>,
}

impl JobRecord {
    pub fn new(id: impl Into<String>, provider_id: impl Into<String>, title: Option<&str>) -> Self {
        Self {
            id: id.into(),
            provider_id: provider_id.into(),
            title: title.map(str::to_string),
        }
    }
}

/// Queryable store of recipient and related records.
///
/// Implementations must be thread-safe: one store is shared by every
/// concurrently running invocation.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All accounts with the given role, in insertion order
    async fn accounts_with_role(&self, role: &str) -> Result<Vec<AccountRecord>, RecordStoreError>;

    /// Single account by identifier
    async fn account(&self, id: &str) -> Result<Option<AccountRecord>, RecordStoreError>;

    /// Single job posting by identifier
    async fn job(&self, id: &str) -> Result<Option<JobRecord>, RecordStoreError>;

    /// Backend type identifier
    fn backend_type(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_record_drops_empty_token() {
        let account = AccountRecord::new("a-1", "admin", Some(""));
        assert_eq!(account.push_token, None);

        let account = AccountRecord::new("a-2", "admin", Some("tok"));
        assert_eq!(account.push_token.as_deref(), Some("tok"));
    }
}
