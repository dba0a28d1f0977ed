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

use bh_jws_utils::{
    json_object, jwk_sha256_thumbprint, sign_jwt, unix_now, JsonObject, JwkPublic, Jwt, JwtHeader,
    KeyStore, SigningAlgorithm,
};
use bh_pairwise::{Account, AccountBindingStore, AccountRegistry};
use bh_pex::{ClaimPath, DescriptorMapping, PresentationDefinition, PresentationSubmission};
use bh_sd_jwt::{
    key_binding_claims, key_binding_header, sd_hash, Disclosure, KeyBindingChallenge, SdJwt,
    SdJwtError,
};
use bherror::{
    traits::{ErrorContext as _, ForeignError as _, PropagateError as _},
    Error,
};
use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    credential_satisfies, AuthorizationRequest, CredentialFormat, CredentialRecord, HttpClient,
    ResponseMode, Result, SharingHistoryEntry, SharingHistoryStore, StoredCredential,
    WalletConfig, WalletError,
};

/// `typ` header parameter of the VP Token and the ID Token.
pub const JWT_TYP: &str = "JWT";

/// Claim format designation of a JWT-secured Verifiable Presentation.
pub const FORMAT_JWT_VP_JSON: &str = "jwt_vp_json";

/// Type of a Verifiable Presentation.
pub const VERIFIABLE_PRESENTATION_TYPE: &str = "VerifiablePresentation";

const CREDENTIALS_CONTEXT_V1: &str = "https://www.w3.org/2018/credentials/v1";

/// The Authorization Response to a verifier.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentationResponse {
    /// The presented credential: an SD-JWT with a Key Binding JWT, or a
    /// JWT-secured Verifiable Presentation.
    pub vp_token: Option<String>,
    /// Self-Issued ID Token of the holder's pairwise account.
    pub id_token: Option<String>,
    /// How the `vp_token` satisfies the presentation definition.
    pub presentation_submission: Option<PresentationSubmission>,
    /// The `state` of the request.
    pub state: Option<String>,
}

impl PresentationResponse {
    /// The response parameters, as sent in a form or a redirect.
    pub fn parameters(&self) -> Result<Vec<(&'static str, String)>> {
        let mut parameters = Vec::with_capacity(4);

        if let Some(vp_token) = &self.vp_token {
            parameters.push(("vp_token", vp_token.clone()));
        }
        if let Some(submission) = &self.presentation_submission {
            let submission = serde_json::to_string(submission).foreign_err(|| {
                WalletError::Transport("cannot encode presentation submission".to_owned())
            })?;
            parameters.push(("presentation_submission", submission));
        }
        if let Some(id_token) = &self.id_token {
            parameters.push(("id_token", id_token.clone()));
        }
        if let Some(state) = &self.state {
            parameters.push(("state", state.clone()));
        }

        Ok(parameters)
    }

    /// Deliver the response as asked for by the `request`.
    ///
    /// A `direct_post` response is sent to the `response_uri`; the verifier
    /// may answer with a `redirect_uri` to continue at, which is returned.
    /// For the other response modes nothing is sent, and the `redirect_uri`
    /// carrying the response is returned instead.
    pub async fn submit<C: HttpClient>(
        &self,
        client: &C,
        request: &AuthorizationRequest,
    ) -> Result<Option<String>> {
        let parameters = self.parameters()?;

        match request.response_mode {
            ResponseMode::DirectPost => {
                let response_uri = request.response_uri.as_deref().ok_or_else(|| {
                    Error::root(WalletError::InvalidPresentationRequest(
                        "missing `response_uri`".to_owned(),
                    ))
                })?;
                post_response(client, response_uri, &parameters).await
            }
            ResponseMode::Fragment | ResponseMode::Query => {
                let redirect_uri = request.redirect_uri.as_deref().ok_or_else(|| {
                    Error::root(WalletError::InvalidPresentationRequest(
                        "missing `redirect_uri`".to_owned(),
                    ))
                })?;
                redirect(redirect_uri, request.response_mode, &parameters).map(Some)
            }
        }
    }
}

#[derive(Deserialize)]
struct DirectPostResponse {
    #[serde(default)]
    redirect_uri: Option<String>,
}

async fn post_response<C: HttpClient>(
    client: &C,
    response_uri: &str,
    parameters: &[(&'static str, String)],
) -> Result<Option<String>> {
    let form: Vec<(&str, &str)> = parameters
        .iter()
        .map(|(name, value)| (*name, value.as_str()))
        .collect();

    let response = client
        .post_form(response_uri, &form)
        .await
        .foreign_err(|| WalletError::Transport(format!("POST {response_uri} failed")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::root(WalletError::Transport(format!(
            "verifier responded with {status}"
        ))));
    }

    let body = response
        .text()
        .await
        .foreign_err(|| WalletError::Transport("cannot read response body".to_owned()))?;
    if body.trim().is_empty() {
        return Ok(None);
    }

    let body: DirectPostResponse = serde_json::from_str(&body).match_foreign_err(|error| {
        WalletError::Transport(format!("unexpected response body: {error}"))
    })?;
    Ok(body.redirect_uri)
}

fn redirect(
    redirect_uri: &str,
    response_mode: ResponseMode,
    parameters: &[(&'static str, String)],
) -> Result<String> {
    let mut url = Url::parse(redirect_uri).match_foreign_err(|error| {
        WalletError::InvalidPresentationRequest(format!("invalid `redirect_uri`: {error}"))
    })?;

    if response_mode == ResponseMode::Query {
        url.query_pairs_mut().extend_pairs(parameters);
    } else {
        let mut encoded = url.clone();
        encoded.set_query(None);
        encoded.query_pairs_mut().extend_pairs(parameters);
        url.set_fragment(encoded.query());
    }

    Ok(url.into())
}

/// Presents credentials to verifiers, holder-bound to the pairwise account
/// of each verifier.
///
/// An SD-JWT whose `cnf` names the issuance proof key instead is bound with
/// that key, through the [`KeyStore`].
///
/// Every presentation is recorded in the [`SharingHistoryStore`] once the
/// response is built.  The record stays even if the response never reaches
/// the verifier.
#[derive(Debug)]
pub struct PresentationBuilder<'a, A, K, H> {
    config: &'a WalletConfig,
    accounts: &'a AccountRegistry<A>,
    key_store: &'a K,
    history: &'a H,
}

struct VpToken {
    token: String,
    account: Account,
    disclosed_claims: Vec<String>,
}

impl<'a, A, K, H> PresentationBuilder<'a, A, K, H>
where
    A: AccountBindingStore,
    K: KeyStore,
    H: SharingHistoryStore,
{
    /// Construct a builder signing with the `accounts` or the proof key in
    /// the `key_store`, and recording into the `history`.
    pub fn new(
        config: &'a WalletConfig,
        accounts: &'a AccountRegistry<A>,
        key_store: &'a K,
        history: &'a H,
    ) -> Self {
        Self {
            config,
            accounts,
            key_store,
            history,
        }
    }

    /// Build the response presenting the `credential` for the `request`,
    /// with an ID Token too if one is requested.
    ///
    /// An SD-JWT is presented with only the disclosures the presentation
    /// definition asks for, optional fields included according to
    /// [`WalletConfig::disclose_optional_fields`].
    pub async fn build(
        &self,
        request: &AuthorizationRequest,
        credential: &CredentialRecord,
    ) -> Result<PresentationResponse> {
        let definition = match &request.presentation_definition {
            Some(definition) if request.response_type.vp_token => definition,
            _ => {
                return Err(Error::root(WalletError::InvalidPresentationRequest(
                    "no VP Token requested".to_owned(),
                )))
            }
        };

        let now = unix_now();
        let vp_token = match &credential.credential {
            StoredCredential::SdJwtVc { raw, .. } => {
                self.present_sd_jwt(raw, definition, request, now).await?
            }
            StoredCredential::JwtVcJson { raw, .. } => {
                self.present_jwt_vc(credential, raw, definition, request, now)
                    .await?
            }
        };

        let id_token = if request.response_type.id_token {
            Some(self.id_token(&vp_token.account, request, now)?)
        } else {
            None
        };

        let response = PresentationResponse {
            vp_token: Some(vp_token.token),
            id_token,
            presentation_submission: Some(presentation_submission(
                definition,
                credential.format(),
            )),
            state: request.state.clone(),
        };

        self.history
            .append(SharingHistoryEntry {
                relying_party: request.client_id.clone(),
                account_index: vp_token.account.index(),
                created_at: Utc::now(),
                disclosed_claims: vp_token.disclosed_claims,
                credential_id: credential.id,
            })
            .await
            .ctx(|| "cannot record the presentation")?;

        tracing::info!(
            relying_party = %request.client_id,
            account = vp_token.account.index(),
            credential = %credential.id,
            "presentation built"
        );

        Ok(response)
    }

    /// Build a response carrying only a Self-Issued ID Token, authenticating
    /// the holder with the pairwise account of the verifier.
    ///
    /// Nothing is disclosed, so nothing is recorded in the history.
    pub async fn authenticate(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<PresentationResponse> {
        if request.response_type.vp_token || !request.response_type.id_token {
            return Err(Error::root(WalletError::InvalidPresentationRequest(
                "only an ID Token can be requested".to_owned(),
            )));
        }

        let account = self.account_for(&request.client_id).await?;
        let id_token = self.id_token(&account, request, unix_now())?;

        Ok(PresentationResponse {
            vp_token: None,
            id_token: Some(id_token),
            presentation_submission: None,
            state: request.state.clone(),
        })
    }

    async fn account_for(&self, relying_party: &str) -> Result<Account> {
        self.accounts
            .derive_account(relying_party)
            .await
            .match_err(|error| WalletError::from(error))
            .ctx(|| "cannot derive the pairwise account")
    }

    async fn present_sd_jwt(
        &self,
        raw: &str,
        definition: &PresentationDefinition,
        request: &AuthorizationRequest,
        now: u64,
    ) -> Result<VpToken> {
        let sd_jwt = SdJwt::parse(raw).with_err(|| WalletError::CredentialDecoding)?;
        let selected = sd_jwt
            .select_disclosures(definition, self.config.disclose_optional_fields)
            .match_err(|error| match error {
                SdJwtError::InvalidPresentationDefinition => {
                    WalletError::InvalidPresentationRequest(error.to_string())
                }
                _ => WalletError::CredentialDecoding,
            })?
            .filter(|selected| !selected.is_empty())
            .ok_or_else(|| Error::root(WalletError::NoSatisfyingCredential))?;
        let disclosed_claims = disclosed_claim_paths(&sd_jwt, &selected)?;

        let account = self.account_for(&request.client_id).await?;
        let challenge = KeyBindingChallenge {
            aud: request.client_id.clone(),
            nonce: request.nonce.clone(),
        };
        let token = match sd_jwt.holder_public_key() {
            Some(holder_key) if !same_key(holder_key, account.public_jwk())? => {
                self.present_with_proof_key(&sd_jwt, &selected, holder_key, &challenge, now)
                    .await?
            }
            _ => sd_jwt
                .present(&selected, &challenge, now, account.signer())
                .with_err(|| WalletError::Signing)
                .ctx(|| "cannot sign the Key Binding JWT")?,
        };

        Ok(VpToken {
            token,
            account,
            disclosed_claims,
        })
    }

    /// Bind the presentation with the key the credential was issued to.
    async fn present_with_proof_key(
        &self,
        sd_jwt: &SdJwt,
        selected: &[&Disclosure],
        holder_key: &JwkPublic,
        challenge: &KeyBindingChallenge,
        now: u64,
    ) -> Result<String> {
        let alias = &self.config.proof_key_alias;
        let proof_key = self
            .key_store
            .public_jwk(alias)
            .await
            .match_err(|error| WalletError::from(error))
            .ctx(|| "the credential is bound to a key the wallet does not hold")?;
        if !same_key(&proof_key, holder_key)? {
            return Err(Error::root(WalletError::Signing))
                .ctx(|| "the credential is bound to a key the wallet does not hold");
        }

        let hashing_algorithm = sd_jwt
            .hashing_algorithm()
            .with_err(|| WalletError::CredentialDecoding)?;
        let mut presentation = sd_jwt.presentation(selected);
        let claims = key_binding_claims(challenge, now, sd_hash(hashing_algorithm, &presentation));

        // The key store sets the `alg` of the key it signs with.
        let key_binding_jwt = self
            .key_store
            .sign_jwt(alias, key_binding_header(SigningAlgorithm::Es256), &claims)
            .await
            .match_err(|error| WalletError::from(error))
            .ctx(|| "cannot sign the Key Binding JWT")?;
        presentation.push_str(&key_binding_jwt);

        Ok(presentation)
    }

    async fn present_jwt_vc(
        &self,
        credential: &CredentialRecord,
        raw: &str,
        definition: &PresentationDefinition,
        request: &AuthorizationRequest,
        now: u64,
    ) -> Result<VpToken> {
        if !credential_satisfies(credential, definition) {
            return Err(Error::root(WalletError::NoSatisfyingCredential));
        }
        let disclosed_claims = credential_subject_paths(raw)?;

        let account = self.account_for(&request.client_id).await?;
        let claims = json_object!({
            "iss": account.thumbprint(),
            "aud": request.client_id,
            "nonce": request.nonce,
            "nbf": now,
            "iat": now,
            "exp": now.saturating_add(self.config.vp_validity_secs),
            "jti": format!("urn:uuid:{}", Uuid::new_v4()),
            "vp": {
                "@context": [CREDENTIALS_CONTEXT_V1],
                "type": [VERIFIABLE_PRESENTATION_TYPE],
                "verifiableCredential": [raw],
            },
        });
        let token = sign_holder_jwt(&account, &claims).ctx(|| "cannot sign the VP Token")?;

        Ok(VpToken {
            token,
            account,
            disclosed_claims,
        })
    }

    fn id_token(
        &self,
        account: &Account,
        request: &AuthorizationRequest,
        now: u64,
    ) -> Result<String> {
        let claims = json_object!({
            "iss": account.thumbprint(),
            "sub": account.thumbprint(),
            "sub_jwk": account.public_jwk(),
            "aud": request.client_id,
            "nonce": request.nonce,
            "iat": now,
            "exp": now.saturating_add(self.config.vp_validity_secs),
        });

        sign_holder_jwt(account, &claims).ctx(|| "cannot sign the ID Token")
    }
}

fn sign_holder_jwt(account: &Account, claims: &JsonObject) -> Result<String> {
    let header = JwtHeader::new(SigningAlgorithm::Es256)
        .with_typ(JWT_TYP)
        .with_jwk(account.public_jwk().clone());

    sign_jwt(account.signer(), header, claims).with_err(|| WalletError::Signing)
}

/// Whether two public keys are the same, by their RFC 7638 thumbprints.
fn same_key(a: &JwkPublic, b: &JwkPublic) -> Result<bool> {
    let thumbprint = |jwk: &JwkPublic| {
        jwk_sha256_thumbprint(jwk)
            .with_err(|| WalletError::CredentialDecoding)
            .ctx(|| "invalid holder key")
    };

    Ok(thumbprint(a)? == thumbprint(b)?)
}

/// Locations of the claims the selected disclosures reveal.
fn disclosed_claim_paths(sd_jwt: &SdJwt, selected: &[&Disclosure]) -> Result<Vec<String>> {
    let decoded = sd_jwt
        .decode_claims()
        .with_err(|| WalletError::CredentialDecoding)?;

    Ok(sd_jwt
        .disclosures()
        .iter()
        .zip(&decoded.disclosure_paths)
        .filter(|(disclosure, _)| {
            selected
                .iter()
                .any(|chosen| std::ptr::eq(*chosen, *disclosure))
        })
        .map(|(_, path)| path.to_string())
        .collect())
}

/// A JWT-VC is presented whole, so all of its subject claims are disclosed.
fn credential_subject_paths(raw: &str) -> Result<Vec<String>> {
    let payload = Jwt::decode(raw)
        .with_err(|| WalletError::CredentialDecoding)?
        .into_payload();
    let subject_path = ClaimPath::root().key("vc").key("credentialSubject");

    let paths = match payload
        .get("vc")
        .and_then(|vc| vc.get("credentialSubject"))
    {
        Some(Value::Object(subject)) => subject
            .keys()
            .map(|name| subject_path.key(name).to_string())
            .collect(),
        _ => Vec::new(),
    };

    Ok(paths)
}

/// The submission mapping every input descriptor to the single presented
/// credential.
fn presentation_submission(
    definition: &PresentationDefinition,
    format: CredentialFormat,
) -> PresentationSubmission {
    let mapping = |id: &str| match format {
        CredentialFormat::SdJwtVc => DescriptorMapping {
            id: id.to_owned(),
            format: format.to_string(),
            path: "$".to_owned(),
            path_nested: None,
        },
        CredentialFormat::JwtVcJson => DescriptorMapping {
            id: id.to_owned(),
            format: FORMAT_JWT_VP_JSON.to_owned(),
            path: "$".to_owned(),
            path_nested: Some(Box::new(DescriptorMapping {
                id: id.to_owned(),
                format: format.to_string(),
                path: "$.vp.verifiableCredential[0]".to_owned(),
                path_nested: None,
            })),
        },
    };

    PresentationSubmission {
        id: Uuid::new_v4().to_string(),
        definition_id: definition.id.clone(),
        descriptor_map: definition
            .input_descriptors
            .iter()
            .map(|descriptor| mapping(&descriptor.id))
            .collect(),
    }
}
