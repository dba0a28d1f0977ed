// Copyright (C) 2020-2026  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Storage of credentials and of the sharing history.
//!
//! The wallet only talks to its persistence through these traits; how the
//! records are encrypted and laid out on the device is up to the
//! implementation.

use std::{future::Future, sync::Mutex};

use uuid::Uuid;

use crate::{CredentialRecord, Result, SharingHistoryEntry};

/// Storage of the credentials held by the wallet.
pub trait CredentialStore: Sync {
    /// Persist a new record.
    fn save(&self, record: CredentialRecord) -> impl Future<Output = Result<()>> + Send;

    /// The record with the given `id`, if any.
    fn get(&self, id: &Uuid) -> impl Future<Output = Result<Option<CredentialRecord>>> + Send;

    /// All records, in insertion order.
    fn list(&self) -> impl Future<Output = Result<Vec<CredentialRecord>>> + Send;

    /// Delete the record with the given `id`, returning whether there was
    /// one.
    fn delete(&self, id: &Uuid) -> impl Future<Output = Result<bool>> + Send;
}

/// Append-only log of the presentations made by the wallet.
pub trait SharingHistoryStore: Sync {
    /// Append an entry.
    fn append(&self, entry: SharingHistoryEntry) -> impl Future<Output = Result<()>> + Send;

    /// All entries, oldest first.
    fn entries(&self) -> impl Future<Output = Result<Vec<SharingHistoryEntry>>> + Send;
}

/// [`CredentialStore`] keeping the records in memory.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    records: Mutex<Vec<CredentialRecord>>,
}

impl InMemoryCredentialStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CredentialRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for InMemoryCredentialStore {
    async fn save(&self, record: CredentialRecord) -> Result<()> {
        self.lock().push(record);
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<CredentialRecord>> {
        Ok(self.lock().iter().find(|record| record.id == *id).cloned())
    }

    async fn list(&self) -> Result<Vec<CredentialRecord>> {
        Ok(self.lock().clone())
    }

    async fn delete(&self, id: &Uuid) -> Result<bool> {
        let mut records = self.lock();
        let count = records.len();
        records.retain(|record| record.id != *id);
        Ok(records.len() != count)
    }
}

/// [`SharingHistoryStore`] keeping the entries in memory.
#[derive(Debug, Default)]
pub struct InMemorySharingHistoryStore {
    entries: Mutex<Vec<SharingHistoryEntry>>,
}

impl InMemorySharingHistoryStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SharingHistoryStore for InMemorySharingHistoryStore {
    async fn append(&self, entry: SharingHistoryEntry) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<SharingHistoryEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{record::tests::record, StoredCredential};

    fn jwt_vc_record() -> CredentialRecord {
        record(StoredCredential::JwtVcJson {
            raw: "a.b.c".to_owned(),
            types: vec!["VerifiableCredential".to_owned()],
        })
    }

    #[tokio::test]
    async fn records_are_kept_until_deleted() {
        let store = InMemoryCredentialStore::new();
        let first = jwt_vc_record();
        let second = jwt_vc_record();

        store.save(first.clone()).await.unwrap();
        store.save(second.clone()).await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec![first.clone(), second.clone()]);
        assert_eq!(store.get(&second.id).await.unwrap(), Some(second.clone()));

        assert!(store.delete(&first.id).await.unwrap());
        assert!(!store.delete(&first.id).await.unwrap());
        assert_eq!(store.get(&first.id).await.unwrap(), None);
        assert_eq!(store.list().await.unwrap(), vec![second]);
    }

    #[tokio::test]
    async fn history_is_append_only() {
        let store = InMemorySharingHistoryStore::new();
        let entry = |relying_party: &str| SharingHistoryEntry {
            relying_party: relying_party.to_owned(),
            account_index: 0,
            created_at: Utc::now(),
            disclosed_claims: vec!["$.given_name".to_owned()],
            credential_id: Uuid::new_v4(),
        };
        let first = entry("https://verifier-a.example");
        let second = entry("https://verifier-b.example");

        store.append(first.clone()).await.unwrap();
        store.append(second.clone()).await.unwrap();

        assert_eq!(store.entries().await.unwrap(), vec![first, second]);
    }
}
