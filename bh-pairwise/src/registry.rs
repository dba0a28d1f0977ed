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

use bherror::{traits::ErrorContext as _, Error, Result};

use crate::{
    slip10::ExtendedPrivateKey, Account, AccountBindingStore, Binding, MasterSeed, PairwiseError,
};

/// Hands out a distinct [`Account`] to every relying party.
///
/// Keys are derived from the master seed on demand; only the relying party to
/// index bindings are persisted, in the [`AccountBindingStore`].
#[derive(Debug)]
pub struct AccountRegistry<S> {
    master: ExtendedPrivateKey,
    store: S,
}

impl<S: AccountBindingStore> AccountRegistry<S> {
    /// Construct a registry deriving accounts from `seed`, with the bindings
    /// kept in `store`.
    pub fn new(seed: &MasterSeed, store: S) -> Result<Self, PairwiseError> {
        Ok(Self {
            master: ExtendedPrivateKey::master(seed)?,
            store,
        })
    }

    /// The binding store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The account of the relying party, binding the next free index to it
    /// if it has none yet.
    pub async fn derive_account(&self, relying_party: &str) -> Result<Account, PairwiseError> {
        let binding = self.store.bind(relying_party).await?;
        if let Binding::New(index) = binding {
            tracing::info!(index, "bound new account");
        }

        self.account_at(binding.index())
    }

    /// Bind a fresh account to the relying party.
    ///
    /// Fails with [`PairwiseError::AccountAlreadyBound`] if the relying party
    /// already has an account.
    pub async fn new_account(&self, relying_party: &str) -> Result<Account, PairwiseError> {
        match self.store.bind(relying_party).await? {
            Binding::New(index) => {
                tracing::info!(index, "bound new account");
                self.account_at(index)
            }
            Binding::Existing(_) => Err(Error::root(PairwiseError::AccountAlreadyBound))
                .ctx(|| format!("relying party {relying_party}")),
        }
    }

    /// The account the next binding would get.  Nothing is persisted.
    pub async fn next_account(&self) -> Result<Account, PairwiseError> {
        let index = self.store.next_index().await?;
        self.account_at(index)
    }

    /// Re-derive the account with the given index.
    pub fn account_at(&self, index: u32) -> Result<Account, PairwiseError> {
        let child = self.master.derive_hardened(index)?;
        Account::new(index, &child.key)
    }
}
