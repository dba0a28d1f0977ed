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

use bh_jws_utils::KeyStore;
use bherror::traits::ErrorContext as _;

use crate::{
    build_proof, credential_request_body, decode_credential, request_credential, request_token,
    CredentialOffer, CredentialRecord, CredentialStore, HttpClient, IssuerMetadata, Result,
    WalletConfig, WalletError,
};

/// Steps of an [`IssuanceFlow`].
#[derive(Debug, Clone, PartialEq)]
pub enum IssuanceState {
    /// Not started.
    Idle,
    /// Discovering the issuer metadata.
    MetadataFetching,
    /// Exchanging the pre-authorized code for an access token.
    TokenRequested,
    /// Signing a key proof, if the issuer asked for one.
    ProofGenerationIfRequired,
    /// Waiting for the credential.
    CredentialRequested,
    /// The offered credentials are stored.
    Stored,
    /// The flow failed with the given error.
    Failed(WalletError),
}

/// Receiving the credentials of a [`CredentialOffer`] with the
/// Pre-Authorized Code Flow of [OpenID4VCI].
///
/// The flow does not retry.  After a failure, e.g. because of a mistyped
/// transaction code, a new flow can be started for the same offer.  Nothing
/// is stored unless all offered credentials are received.
///
/// [OpenID4VCI]: https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0-13.html#name-pre-authorized-code-flow
#[derive(Debug)]
pub struct IssuanceFlow<'a, C, K, S> {
    config: &'a WalletConfig,
    http_client: &'a C,
    key_store: &'a K,
    credential_store: &'a S,
    offer: CredentialOffer,
    state: IssuanceState,
    transitions: Vec<IssuanceState>,
}

impl<'a, C, K, S> IssuanceFlow<'a, C, K, S>
where
    C: HttpClient,
    K: KeyStore,
    S: CredentialStore,
{
    /// Prepare the flow for the `offer`.
    pub fn new(
        config: &'a WalletConfig,
        http_client: &'a C,
        key_store: &'a K,
        credential_store: &'a S,
        offer: CredentialOffer,
    ) -> Self {
        Self {
            config,
            http_client,
            key_store,
            credential_store,
            offer,
            state: IssuanceState::Idle,
            transitions: vec![IssuanceState::Idle],
        }
    }

    /// The offer being accepted.
    pub fn offer(&self) -> &CredentialOffer {
        &self.offer
    }

    /// The current state.
    pub fn state(&self) -> &IssuanceState {
        &self.state
    }

    /// Every state the flow has been in, oldest first.
    pub fn transitions(&self) -> &[IssuanceState] {
        &self.transitions
    }

    /// Run the flow to completion, returning the stored records.
    ///
    /// The `tx_code` is required if the offer asks for a transaction code.
    pub async fn run(&mut self, tx_code: Option<&str>) -> Result<Vec<CredentialRecord>> {
        let result = self.execute(tx_code).await;

        match &result {
            Ok(_) => self.transition(IssuanceState::Stored),
            Err(error) => self.transition(IssuanceState::Failed(error.error.clone())),
        }

        result
    }

    async fn execute(&mut self, tx_code: Option<&str>) -> Result<Vec<CredentialRecord>> {
        if self.state != IssuanceState::Idle {
            return Err(bherror::Error::root(WalletError::InvalidOffer(
                "the offer has already been used".to_owned(),
            )));
        }
        if self.offer.grant.requires_tx_code() && tx_code.is_none() {
            return Err(bherror::Error::root(WalletError::InvalidOffer(
                "transaction code required".to_owned(),
            )));
        }

        self.transition(IssuanceState::MetadataFetching);
        let metadata =
            IssuerMetadata::discover(self.http_client, &self.offer.credential_issuer).await?;

        // Fail before redeeming the code if anything offered is unusable.
        let mut requests = Vec::with_capacity(self.offer.credentials.len());
        for configuration_id in &self.offer.credentials {
            let snapshot = metadata.snapshot(configuration_id)?;
            credential_request_body(&snapshot.configuration, None)?;
            requests.push(snapshot);
        }

        self.transition(IssuanceState::TokenRequested);
        let token = request_token(
            self.http_client,
            &metadata.authorization_server.token_endpoint,
            &self.offer.grant,
            tx_code,
        )
        .await?;

        let mut c_nonce = token.c_nonce;
        let mut records = Vec::with_capacity(requests.len());

        for snapshot in requests {
            self.transition(IssuanceState::ProofGenerationIfRequired);
            let proof = match &c_nonce {
                Some(nonce) => Some(
                    build_proof(
                        self.key_store,
                        &self.config.proof_key_alias,
                        &self.config.client_id,
                        &metadata.credential_issuer.credential_issuer,
                        nonce,
                    )
                    .await?,
                ),
                None => None,
            };

            self.transition(IssuanceState::CredentialRequested);
            let body = credential_request_body(&snapshot.configuration, proof.as_ref())?;
            let response = request_credential(
                self.http_client,
                &metadata.credential_issuer.credential_endpoint,
                &token.access_token,
                &body,
            )
            .await
            .ctx(|| format!("credential {}", snapshot.configuration_id))?;

            if let Some(next_nonce) = response.c_nonce.clone() {
                c_nonce = Some(next_nonce);
            }

            let raw = response.into_credential()?;
            records.push(decode_credential(raw, snapshot)?);
        }

        for record in &records {
            self.credential_store
                .save(record.clone())
                .await
                .ctx(|| "cannot store credential")?;
            tracing::info!(
                id = %record.id,
                format = %record.format(),
                "credential stored"
            );
        }

        Ok(records)
    }

    fn transition(&mut self, state: IssuanceState) {
        match &state {
            IssuanceState::Failed(error) => {
                tracing::warn!(from = ?self.state, %error, "issuance failed")
            }
            state => tracing::debug!(from = ?self.state, to = ?state, "issuance state changed"),
        }

        self.transitions.push(state.clone());
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use assert_matches::assert_matches;
    use bh_jws_utils::{decode_and_verify, Jwt};
    use serde_json::{json, Value};

    use super::*;
    use crate::{
        issuance::{
            credential::tests::{employee_jwt_vc, identity_sd_jwt},
            metadata::tests::{issuer_client, CREDENTIAL_ENDPOINT, ISSUER, TOKEN_ENDPOINT},
            proof::tests::CountingKeyStore,
        },
        test_utils::{RecordedRequest, StubHttpClient},
        InMemoryCredentialStore, StoredCredential, PROOF_JWT_TYP,
    };

    fn offer(credentials: &[&str], tx_code: Value) -> CredentialOffer {
        CredentialOffer::from_json(
            &json!({
                "credential_issuer": ISSUER,
                "credentials": credentials,
                "grants": { "pre-authorized_code": "abc", "tx_code": tx_code }
            })
            .to_string(),
        )
        .unwrap()
    }

    fn client(token: Value, credential: Value) -> StubHttpClient {
        issuer_client()
            .route(TOKEN_ENDPOINT, 200, token)
            .route(CREDENTIAL_ENDPOINT, 200, credential)
    }

    fn credential_requests(client: &StubHttpClient) -> Vec<RecordedRequest> {
        client
            .requests()
            .into_iter()
            .filter(|request| request.url() == CREDENTIAL_ENDPOINT)
            .collect()
    }

    #[tokio::test]
    async fn credential_is_issued_without_proof_when_no_nonce_is_given() {
        let config = WalletConfig::default();
        let client = client(
            json!({ "access_token": "tok", "c_nonce": null }),
            json!({ "credential": employee_jwt_vc() }),
        );
        let key_store = CountingKeyStore::default();
        let store = InMemoryCredentialStore::new();

        let mut flow = IssuanceFlow::new(
            &config,
            &client,
            &key_store,
            &store,
            offer(&["EmployeeCredential"], Value::Null),
        );
        let records = flow.run(None).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].credential_type(), Some("EmployeeCredential"));
        assert_eq!(store.list().await.unwrap(), records);
        assert_eq!(key_store.signatures.load(Ordering::SeqCst), 0);

        let requests = credential_requests(&client);
        assert_eq!(requests.len(), 1);
        assert!(requests[0].json_body().unwrap().get("proof").is_none());

        assert_eq!(flow.state(), &IssuanceState::Stored);
        assert_eq!(
            flow.transitions(),
            [
                IssuanceState::Idle,
                IssuanceState::MetadataFetching,
                IssuanceState::TokenRequested,
                IssuanceState::ProofGenerationIfRequired,
                IssuanceState::CredentialRequested,
                IssuanceState::Stored,
            ]
        );
    }

    #[tokio::test]
    async fn exactly_one_proof_is_sent_when_a_nonce_is_given() {
        let config = WalletConfig::default();
        let client = client(
            json!({ "access_token": "tok", "c_nonce": "n1" }),
            json!({ "credential": employee_jwt_vc() }),
        );
        let key_store = CountingKeyStore::default();
        let store = InMemoryCredentialStore::new();

        let mut flow = IssuanceFlow::new(
            &config,
            &client,
            &key_store,
            &store,
            offer(&["EmployeeCredential"], Value::Null),
        );
        flow.run(None).await.unwrap();

        assert_eq!(key_store.signatures.load(Ordering::SeqCst), 1);

        let requests = credential_requests(&client);
        assert_eq!(requests.len(), 1);
        let body = requests[0].json_body().unwrap();
        assert_eq!(body["proof"]["proof_type"], "jwt");

        let proof = body["proof"]["jwt"].as_str().unwrap();
        let holder_key = key_store.public_jwk(&config.proof_key_alias).await.unwrap();
        let proof = decode_and_verify(proof, &holder_key).unwrap();
        assert_eq!(proof.header().typ.as_deref(), Some(PROOF_JWT_TYP));
        assert_eq!(proof.payload()["nonce"], "n1");
        assert_eq!(proof.payload()["aud"], ISSUER);
        assert_eq!(proof.payload()["iss"], config.client_id.as_str());

        // The proof precedes the credential request it is part of.
        let urls: Vec<_> = client
            .requests()
            .iter()
            .map(|request| request.url().to_owned())
            .collect();
        assert_eq!(urls[urls.len() - 2], TOKEN_ENDPOINT);
        assert_eq!(urls[urls.len() - 1], CREDENTIAL_ENDPOINT);
    }

    #[tokio::test]
    async fn sd_jwt_credential_is_stored_with_its_metadata() {
        let config = WalletConfig::default();
        let client = client(
            json!({ "access_token": "tok" }),
            json!({ "credential": identity_sd_jwt() }),
        );
        let key_store = CountingKeyStore::default();
        let store = InMemoryCredentialStore::new();

        let mut flow = IssuanceFlow::new(
            &config,
            &client,
            &key_store,
            &store,
            offer(&["IdentityCredential"], Value::Null),
        );
        let records = flow.run(None).await.unwrap();

        assert_matches!(
            &records[0].credential,
            StoredCredential::SdJwtVc { vct, .. } if vct == "https://credentials.example/identity"
        );
        assert_eq!(records[0].issuer_metadata.configuration_id, "IdentityCredential");
        assert_eq!(
            credential_requests(&client)[0].json_body().unwrap()["vct"],
            "https://credentials.example/identity"
        );
    }

    #[tokio::test]
    async fn rejected_token_request_fails_the_flow_and_stores_nothing() {
        let config = WalletConfig::default();
        let client = issuer_client().route(
            TOKEN_ENDPOINT,
            400,
            json!({ "error": "invalid_grant", "error_description": "wrong transaction code" }),
        );
        let key_store = CountingKeyStore::default();
        let store = InMemoryCredentialStore::new();

        let mut flow = IssuanceFlow::new(
            &config,
            &client,
            &key_store,
            &store,
            offer(&["EmployeeCredential"], json!({ "length": 4 })),
        );
        let error = flow.run(Some("0000")).await.unwrap_err();

        let expected = WalletError::TokenErrorResponse {
            error: "invalid_grant".to_owned(),
            error_description: Some("wrong transaction code".to_owned()),
        };
        assert_eq!(error.error, expected);
        assert_eq!(flow.state(), &IssuanceState::Failed(expected));
        assert!(store.list().await.unwrap().is_empty());
        assert!(credential_requests(&client).is_empty());
    }

    #[tokio::test]
    async fn missing_tx_code_fails_before_any_request() {
        let config = WalletConfig::default();
        let client = StubHttpClient::new();
        let key_store = CountingKeyStore::default();
        let store = InMemoryCredentialStore::new();

        let mut flow = IssuanceFlow::new(
            &config,
            &client,
            &key_store,
            &store,
            offer(&["EmployeeCredential"], json!({ "length": 4 })),
        );

        assert_matches!(
            flow.run(None).await.unwrap_err().error,
            WalletError::InvalidOffer(_)
        );
        assert!(client.requests().is_empty());
        assert_matches!(flow.state(), IssuanceState::Failed(WalletError::InvalidOffer(_)));
    }

    #[tokio::test]
    async fn unknown_configuration_fails_before_redeeming_the_code() {
        let config = WalletConfig::default();
        let client = client(json!({ "access_token": "tok" }), json!({}));
        let key_store = CountingKeyStore::default();
        let store = InMemoryCredentialStore::new();

        let mut flow = IssuanceFlow::new(
            &config,
            &client,
            &key_store,
            &store,
            offer(&["EmployeeCredential", "Unknown"], Value::Null),
        );

        assert_matches!(
            flow.run(None).await.unwrap_err().error,
            WalletError::MetadataDiscovery(_)
        );
        assert!(client
            .requests()
            .iter()
            .all(|request| request.url() != TOKEN_ENDPOINT));
    }

    #[tokio::test]
    async fn undecodable_credential_fails_the_flow() {
        let config = WalletConfig::default();
        let client = client(
            json!({ "access_token": "tok" }),
            json!({ "credential": "garbage" }),
        );
        let key_store = CountingKeyStore::default();
        let store = InMemoryCredentialStore::new();

        let mut flow = IssuanceFlow::new(
            &config,
            &client,
            &key_store,
            &store,
            offer(&["EmployeeCredential"], Value::Null),
        );

        assert_eq!(
            flow.run(None).await.unwrap_err().error,
            WalletError::CredentialDecoding
        );
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn declined_proof_cancels_the_flow() {
        let config = WalletConfig::default();
        let client = client(
            json!({ "access_token": "tok", "c_nonce": "n1" }),
            json!({ "credential": employee_jwt_vc() }),
        );
        let key_store = CountingKeyStore {
            decline: true,
            ..Default::default()
        };
        let store = InMemoryCredentialStore::new();

        let mut flow = IssuanceFlow::new(
            &config,
            &client,
            &key_store,
            &store,
            offer(&["EmployeeCredential"], Value::Null),
        );

        assert_eq!(flow.run(None).await.unwrap_err().error, WalletError::Cancelled);
        assert_eq!(flow.state(), &IssuanceState::Failed(WalletError::Cancelled));
        assert!(credential_requests(&client).is_empty());
    }

    #[tokio::test]
    async fn offer_cannot_be_redeemed_twice_by_the_same_flow() {
        let config = WalletConfig::default();
        let client = client(
            json!({ "access_token": "tok" }),
            json!({ "credential": employee_jwt_vc() }),
        );
        let key_store = CountingKeyStore::default();
        let store = InMemoryCredentialStore::new();

        let mut flow = IssuanceFlow::new(
            &config,
            &client,
            &key_store,
            &store,
            offer(&["EmployeeCredential"], Value::Null),
        );
        flow.run(None).await.unwrap();

        assert_matches!(
            flow.run(None).await.unwrap_err().error,
            WalletError::InvalidOffer(_)
        );
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn every_offered_credential_gets_its_own_proof() {
        let config = WalletConfig::default();
        let client = client(
            json!({ "access_token": "tok", "c_nonce": "n1" }),
            json!({ "credential": employee_jwt_vc(), "c_nonce": "n2" }),
        );
        let key_store = CountingKeyStore::default();
        let store = InMemoryCredentialStore::new();

        let mut flow = IssuanceFlow::new(
            &config,
            &client,
            &key_store,
            &store,
            offer(&["EmployeeCredential", "EmployeeCredential"], Value::Null),
        );
        let records = flow.run(None).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(key_store.signatures.load(Ordering::SeqCst), 2);

        let nonces: Vec<_> = credential_requests(&client)
            .iter()
            .map(|request| {
                let proof = request.json_body().unwrap()["proof"]["jwt"].as_str().unwrap();
                Jwt::decode(proof).unwrap().payload()["nonce"].clone()
            })
            .collect();
        assert_eq!(nonces, [json!("n1"), json!("n2")]);
    }
}
