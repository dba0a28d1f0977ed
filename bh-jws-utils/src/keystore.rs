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

//! Holder key storage.
//!
//! Wallet keys are only ever referred to by alias.  Private key material
//! stays inside the [`KeyStore`], which signs on the caller's behalf.

use std::{collections::HashMap, future::Future, sync::Mutex};

use bherror::{
    traits::{ErrorContext as _, PropagateError as _},
    Error, Result,
};

use crate::{
    error::KeyStoreError, sign_jwt, EcCurve, EcSigner, JsonObject, JwkPublic, JwtHeader,
};

/// Platform storage of the wallet's signing keys.
///
/// Implementations backed by secure hardware may ask the user to authorize
/// the use of a key, in which case a declined request is reported as
/// [`KeyStoreError::Cancelled`].
pub trait KeyStore: Sync {
    /// Return the public key stored under `alias`, generating a new key
    /// first if there is none.
    fn ensure_key(
        &self,
        alias: &str,
    ) -> impl Future<Output = Result<JwkPublic, KeyStoreError>> + Send;

    /// Return the public key stored under `alias`.
    fn public_jwk(
        &self,
        alias: &str,
    ) -> impl Future<Output = Result<JwkPublic, KeyStoreError>> + Send;

    /// Sign `claims` as a compact JWS with the key stored under `alias`.
    ///
    /// The `alg` header parameter is set by the key store.
    fn sign_jwt(
        &self,
        alias: &str,
        header: JwtHeader,
        claims: &JsonObject,
    ) -> impl Future<Output = Result<String, KeyStoreError>> + Send;
}

/// [`KeyStore`] keeping software keys in memory.
///
/// Keys are lost when the store is dropped.
#[derive(Debug)]
pub struct InMemoryKeyStore {
    curve: EcCurve,
    keys: Mutex<HashMap<String, EcSigner>>,
}

impl Default for InMemoryKeyStore {
    fn default() -> Self {
        Self::new(EcCurve::P256)
    }
}

impl InMemoryKeyStore {
    /// Construct an empty store generating keys on the given `curve`.
    pub fn new(curve: EcCurve) -> Self {
        Self {
            curve,
            keys: Mutex::default(),
        }
    }

    /// Store an existing signer under `alias`, replacing any previous key.
    pub fn insert(&self, alias: impl Into<String>, signer: EcSigner) {
        self.lock().insert(alias.into(), signer);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, EcSigner>> {
        // A panic while holding the lock cannot leave a map entry half-written.
        self.keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyStore for InMemoryKeyStore {
    async fn ensure_key(&self, alias: &str) -> Result<JwkPublic, KeyStoreError> {
        let mut keys = self.lock();

        if !keys.contains_key(alias) {
            tracing::debug!(alias, "generating new key");
            let signer = EcSigner::generate(self.curve, None)
                .with_err(|| KeyStoreError::KeyGeneration)?;
            keys.insert(alias.to_owned(), signer);
        }

        public_jwk(&keys, alias)
    }

    async fn public_jwk(&self, alias: &str) -> Result<JwkPublic, KeyStoreError> {
        public_jwk(&self.lock(), alias)
    }

    async fn sign_jwt(
        &self,
        alias: &str,
        header: JwtHeader,
        claims: &JsonObject,
    ) -> Result<String, KeyStoreError> {
        let keys = self.lock();
        let signer = keys
            .get(alias)
            .ok_or_else(|| Error::root(KeyStoreError::UnknownAlias(alias.to_owned())))?;

        sign_jwt(signer, header, claims).with_err(|| KeyStoreError::Signing)
    }
}

fn public_jwk(keys: &HashMap<String, EcSigner>, alias: &str) -> Result<JwkPublic, KeyStoreError> {
    keys.get(alias)
        .ok_or_else(|| Error::root(KeyStoreError::UnknownAlias(alias.to_owned())))?
        .public_jwk()
        .with_err(|| KeyStoreError::KeyGeneration)
        .ctx(|| format!("cannot export public key {alias}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode_and_verify, json_object, SigningAlgorithm};

    #[tokio::test]
    async fn key_is_generated_once() {
        let store = InMemoryKeyStore::default();

        let first = store.ensure_key("holder").await.unwrap();
        let second = store.ensure_key("holder").await.unwrap();
        let other = store.ensure_key("other").await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(store.public_jwk("holder").await.unwrap(), first);
        assert!(!first.contains_key("d"));
    }

    #[tokio::test]
    async fn unknown_alias_is_reported() {
        let store = InMemoryKeyStore::default();

        assert_eq!(
            store.public_jwk("missing").await.unwrap_err().error,
            KeyStoreError::UnknownAlias("missing".to_owned())
        );
        assert_eq!(
            store
                .sign_jwt("missing", JwtHeader::new(SigningAlgorithm::Es256), &JsonObject::new())
                .await
                .unwrap_err()
                .error,
            KeyStoreError::UnknownAlias("missing".to_owned())
        );
    }

    #[tokio::test]
    async fn signs_with_the_stored_key() {
        let store = InMemoryKeyStore::new(EcCurve::Secp256k1);
        let public_jwk = store.ensure_key("holder").await.unwrap();
        let claims = json_object!({ "nonce": "abc" });

        let token = store
            .sign_jwt(
                "holder",
                JwtHeader::new(SigningAlgorithm::Es256).with_typ("kb+jwt"),
                &claims,
            )
            .await
            .unwrap();

        let jwt = decode_and_verify(&token, &public_jwk).unwrap();
        assert_eq!(jwt.header().alg, "ES256K");
        assert_eq!(jwt.header().typ.as_deref(), Some("kb+jwt"));
        assert_eq!(jwt.payload(), &claims);
    }

    #[tokio::test]
    async fn inserted_signer_is_used() {
        let signer = EcSigner::generate(EcCurve::P256, Some("pairwise-3".to_owned())).unwrap();
        let expected = signer.public_jwk().unwrap();
        let store = InMemoryKeyStore::default();

        store.insert("pairwise", signer);

        assert_eq!(store.ensure_key("pairwise").await.unwrap(), expected);
    }
}
