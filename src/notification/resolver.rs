use std::sync::Arc;

use crate::store::{RecordStore, RecordStoreError};

use super::Recipient;

/// Target-selection rule for a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientCriteria {
    /// Every account with this role
    Role(String),
    /// One account by identifier
    Account(String),
}

/// Resolves criteria into recipients through the record store.
///
/// Recipients without a push token are kept: the log channel needs no
/// address. Use `push_targets` to narrow a list to the push channel.
pub struct RecipientResolver {
    records: Arc<dyn RecordStore>,
}

impl RecipientResolver {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// Resolve criteria to recipients, in store order.
    ///
    /// An empty list is a valid answer, not an error.
    #[tracing::instrument(name = "resolver.resolve", skip(self))]
    pub async fn resolve(
        &self,
        criteria: &RecipientCriteria,
    ) -> Result<Vec<Recipient>, RecordStoreError> {
        let recipients: Vec<Recipient> = match criteria {
            RecipientCriteria::Role(role) => self
                .records
                .accounts_with_role(role)
                .await?
                .into_iter()
                .map(|account| Recipient::new(account.id, account.push_token))
                .collect(),
            RecipientCriteria::Account(id) => self
                .records
                .account(id)
                .await?
                .map(|account| Recipient::new(account.id, account.push_token))
                .into_iter()
                .collect(),
        };

        tracing::debug!(
            recipient_count = recipients.len(),
            addressed = recipients.iter().filter(|r| r.has_address()).count(),
            "Resolved recipients"
        );

        Ok(recipients)
    }
}

/// Recipients that have a push address, order preserved
pub fn push_targets(recipients: &[Recipient]) -> Vec<Recipient> {
    recipients
        .iter()
        .filter(|r| r.has_address())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AccountRecord, MemoryRecordStore};

    fn resolver() -> RecipientResolver {
        let store = MemoryRecordStore::new();
        store.upsert_account(AccountRecord::new("admin-1", "admin", Some("tok-1")));
        store.upsert_account(AccountRecord::new("seeker-1", "job_seeker", Some("tok-s")));
        store.upsert_account(AccountRecord::new("admin-2", "admin", None));
        store.upsert_account(AccountRecord::new("admin-3", "admin", Some("tok-3")));
        RecipientResolver::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_resolve_role_keeps_unaddressed() {
        let recipients = resolver()
            .resolve(&RecipientCriteria::Role("admin".into()))
            .await
            .unwrap();

        let ids: Vec<&str> = recipients.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["admin-1", "admin-2", "admin-3"]);

        let targets = push_targets(&recipients);
        let addresses: Vec<&str> = targets.iter().filter_map(|r| r.address.as_deref()).collect();
        assert_eq!(addresses, vec!["tok-1", "tok-3"]);
    }

    #[tokio::test]
    async fn test_resolve_single_account() {
        let resolver = resolver();

        let found = resolver
            .resolve(&RecipientCriteria::Account("seeker-1".into()))
            .await
            .unwrap();
        assert_eq!(found, vec![Recipient::new("seeker-1", Some("tok-s".into()))]);

        let missing = resolver
            .resolve(&RecipientCriteria::Account("ghost".into()))
            .await
            .unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_empty_role_is_not_an_error() {
        let recipients = resolver()
            .resolve(&RecipientCriteria::Role("moderator".into()))
            .await
            .unwrap();
        assert!(recipients.is_empty());
    }
}
