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

use std::{collections::HashMap, future::Future, sync::Mutex};

use bherror::{Error, Result};

use crate::PairwiseError;

/// The result of binding a relying party to an account index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// The relying party has just been bound to the index.
    New(u32),
    /// The relying party was already bound to the index.
    Existing(u32),
}

impl Binding {
    /// The bound index.
    pub fn index(self) -> u32 {
        match self {
            Binding::New(index) | Binding::Existing(index) => index,
        }
    }
}

/// Persistent, append-only map of relying parties to account indices.
///
/// Indices are handed out consecutively starting from `0`, and a relying
/// party keeps its index forever.  Implementations must make
/// [`AccountBindingStore::bind`] atomic, so that concurrent callers never get
/// the same index for different relying parties.
pub trait AccountBindingStore: Sync {
    /// The index bound to the relying party, if any.
    fn bound_index(
        &self,
        relying_party: &str,
    ) -> impl Future<Output = Result<Option<u32>, PairwiseError>> + Send;

    /// Bind the relying party to the next free index, unless it is bound
    /// already.
    fn bind(&self, relying_party: &str) -> impl Future<Output = Result<Binding, PairwiseError>> + Send;

    /// The index the next binding would get.
    fn next_index(&self) -> impl Future<Output = Result<u32, PairwiseError>> + Send;
}

/// [`AccountBindingStore`] keeping the bindings in memory.
#[derive(Debug, Default)]
pub struct InMemoryAccountBindingStore {
    bindings: Mutex<HashMap<String, u32>>,
}

impl InMemoryAccountBindingStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, u32>> {
        // Bindings are only ever inserted whole.
        self.bindings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn next_free_index(bindings: &HashMap<String, u32>) -> Result<u32, PairwiseError> {
    u32::try_from(bindings.len()).map_err(|_| Error::root(PairwiseError::Store))
}

impl AccountBindingStore for InMemoryAccountBindingStore {
    async fn bound_index(&self, relying_party: &str) -> Result<Option<u32>, PairwiseError> {
        Ok(self.lock().get(relying_party).copied())
    }

    async fn bind(&self, relying_party: &str) -> Result<Binding, PairwiseError> {
        let mut bindings = self.lock();

        if let Some(index) = bindings.get(relying_party) {
            return Ok(Binding::Existing(*index));
        }

        let index = next_free_index(&bindings)?;
        bindings.insert(relying_party.to_owned(), index);
        Ok(Binding::New(index))
    }

    async fn next_index(&self) -> Result<u32, PairwiseError> {
        next_free_index(&self.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn indices_are_consecutive_and_stable() {
        let store = InMemoryAccountBindingStore::new();

        assert_eq!(store.next_index().await.unwrap(), 0);
        assert_eq!(store.bind("rpA").await.unwrap(), Binding::New(0));
        assert_eq!(store.bind("rpB").await.unwrap(), Binding::New(1));
        assert_eq!(store.bind("rpA").await.unwrap(), Binding::Existing(0));
        assert_eq!(store.next_index().await.unwrap(), 2);

        assert_eq!(store.bound_index("rpB").await.unwrap(), Some(1));
        assert_eq!(store.bound_index("rpC").await.unwrap(), None);
    }
}
