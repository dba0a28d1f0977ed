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

use bh_jws_utils::{JsonObject, Jwt};
use bh_sd_jwt::SdJwt;
use bherror::{
    traits::{ErrorContext as _, ForeignError as _, PropagateError as _},
    Error,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    http::read_json_response, CredentialConfiguration, CredentialRecord, HttpClient,
    IssuerMetadataSnapshot, Proof, Result, StoredCredential, WalletError,
};

/// The body of a credential request for the given configuration.
///
/// Only `vc+sd-jwt` and `jwt_vc_json` credentials can be requested.
pub fn credential_request_body(
    configuration: &CredentialConfiguration,
    proof: Option<&Proof>,
) -> Result<Value> {
    let format = configuration.format();
    let mut body = match configuration {
        CredentialConfiguration::VcSdJwt(configuration) => json!({
            "format": format,
            "vct": configuration.vct,
        }),
        CredentialConfiguration::JwtVcJson(configuration) => json!({
            "format": format,
            "credential_definition": {
                "type": configuration.credential_definition.types,
                "credentialSubject": {},
            },
        }),
        CredentialConfiguration::LdpVc(_) => {
            return Err(Error::root(WalletError::UnsupportedFormat(
                format.to_owned(),
            )))
        }
    };

    if let (Some(proof), Value::Object(body)) = (proof, &mut body) {
        body.insert(
            "proof".to_owned(),
            json!({ "proof_type": proof.proof_type, "jwt": proof.jwt }),
        );
    }

    Ok(body)
}

/// Response of the credential endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CredentialResponse {
    /// The issued credential.
    #[serde(default)]
    pub credential: Option<Value>,
    /// The issued credentials, as returned by issuers batching them.
    #[serde(default)]
    pub credentials: Option<Vec<Value>>,
    /// Identifier of a deferred issuance.
    #[serde(default)]
    pub transaction_id: Option<String>,
    /// Nonce for the key proof of the next credential request.
    #[serde(default)]
    pub c_nonce: Option<String>,
    /// Lifetime of the `c_nonce` in seconds.
    #[serde(default)]
    pub c_nonce_expires_in: Option<u64>,
    /// Identifier for notifying the issuer about the credential.
    #[serde(default)]
    pub notification_id: Option<String>,
}

impl CredentialResponse {
    /// The issued credential, in its compact serialization.
    ///
    /// Deferred issuance is not supported.
    pub fn into_credential(self) -> Result<String> {
        let credential = self.credential.or_else(|| {
            self.credentials
                .and_then(|credentials| credentials.into_iter().next())
                .map(|credential| match credential {
                    Value::Object(mut object) => {
                        object.remove("credential").unwrap_or(Value::Object(object))
                    }
                    credential => credential,
                })
        });

        match (credential, self.transaction_id) {
            (Some(Value::String(credential)), _) => Ok(credential),
            (Some(_), _) => Err(Error::root(WalletError::CredentialDecoding))
                .ctx(|| "credential is not in a compact serialization"),
            (None, Some(_)) => Err(Error::root(WalletError::CredentialRequest {
                error: "issuance_pending".to_owned(),
                error_description: Some("deferred issuance is not supported".to_owned()),
            })),
            (None, None) => Err(Error::root(WalletError::CredentialRequest {
                error: "invalid_credential_response".to_owned(),
                error_description: Some("no credential in the response".to_owned()),
            })),
        }
    }
}

/// Send a credential request authorized with the `access_token`.
pub async fn request_credential<C: HttpClient>(
    client: &C,
    credential_endpoint: &str,
    access_token: &str,
    body: &Value,
) -> Result<CredentialResponse> {
    let response = client
        .post_json(credential_endpoint, body, Some(access_token))
        .await
        .foreign_err(|| WalletError::Transport(format!("POST {credential_endpoint} failed")))?;

    match read_json_response::<CredentialResponse>(response)
        .await
        .ctx(|| "invalid credential response")?
    {
        Ok(credential_response) => Ok(credential_response),
        Err(error_response) => Err(Error::root(WalletError::CredentialRequest {
            error: error_response.error,
            error_description: error_response.error_description,
        })),
    }
}

/// Decode the envelope of an issued credential into a record.
///
/// Only the issuer-signed part of an SD-JWT VC is looked at.  The issuer
/// signature is not verified here; it is the verifier's to check.
pub fn decode_credential(
    raw: String,
    snapshot: IssuerMetadataSnapshot,
) -> Result<CredentialRecord> {
    let (payload, credential) = match &snapshot.configuration {
        CredentialConfiguration::VcSdJwt(configuration) => {
            let sd_jwt = SdJwt::parse(&raw)
                .with_err(|| WalletError::CredentialDecoding)
                .ctx(|| "invalid SD-JWT")?;
            let payload = sd_jwt.issuer_jwt().payload().clone();

            let vct = string_claim(&payload, "vct")?;
            if vct != configuration.vct {
                tracing::warn!(
                    vct = %vct,
                    expected = %configuration.vct,
                    "unexpected credential type"
                );
            }

            (payload, StoredCredential::SdJwtVc { raw, vct })
        }
        CredentialConfiguration::JwtVcJson(_) => {
            let payload = Jwt::decode(&raw)
                .with_err(|| WalletError::CredentialDecoding)
                .ctx(|| "invalid JWT")?
                .into_payload();

            let types = credential_types(&payload)?;

            (payload, StoredCredential::JwtVcJson { raw, types })
        }
        CredentialConfiguration::LdpVc(_) => {
            return Err(Error::root(WalletError::UnsupportedFormat(
                snapshot.configuration.format().to_owned(),
            )))
        }
    };

    let issuer = match payload.get("iss") {
        Some(_) => string_claim(&payload, "iss")?,
        None => w3c_issuer(&payload)?,
    };

    Ok(CredentialRecord {
        id: Uuid::new_v4(),
        issuer,
        issued_at: timestamp_claim(&payload, "iat")?.or(timestamp_claim(&payload, "nbf")?),
        expires_at: timestamp_claim(&payload, "exp")?,
        credential,
        issuer_metadata: snapshot,
    })
}

fn string_claim(payload: &JsonObject, name: &str) -> Result<String> {
    payload
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| Error::root(WalletError::CredentialDecoding))
        .ctx(|| format!("missing `{name}` claim"))
}

fn timestamp_claim(payload: &JsonObject, name: &str) -> Result<Option<DateTime<Utc>>> {
    let Some(value) = payload.get(name) else {
        return Ok(None);
    };

    value
        .as_i64()
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
        .map(Some)
        .ok_or_else(|| Error::root(WalletError::CredentialDecoding))
        .ctx(|| format!("invalid `{name}` claim"))
}

fn credential_types(payload: &JsonObject) -> Result<Vec<String>> {
    let types = payload
        .get("vc")
        .and_then(|vc| vc.get("type"))
        .ok_or_else(|| Error::root(WalletError::CredentialDecoding))
        .ctx(|| "missing `vc.type` claim")?;

    match types {
        Value::String(credential_type) => Ok(vec![credential_type.clone()]),
        Value::Array(types) => types
            .iter()
            .map(|credential_type| {
                credential_type
                    .as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| Error::root(WalletError::CredentialDecoding))
            })
            .collect::<Result<Vec<_>>>()
            .ctx(|| "invalid `vc.type` claim"),
        _ => Err(Error::root(WalletError::CredentialDecoding)).ctx(|| "invalid `vc.type` claim"),
    }
}

// The W3C data model names the issuer in the credential itself, either as a
// string or as an object with an `id`.
fn w3c_issuer(payload: &JsonObject) -> Result<String> {
    let issuer = payload.get("vc").and_then(|vc| vc.get("issuer"));

    issuer
        .and_then(Value::as_str)
        .or_else(|| issuer.and_then(|issuer| issuer.get("id")).and_then(Value::as_str))
        .map(str::to_owned)
        .ok_or_else(|| Error::root(WalletError::CredentialDecoding))
        .ctx(|| "missing issuer")
}

#[cfg(test)]
pub(crate) mod tests {
    use assert_matches::assert_matches;
    use bh_jws_utils::{json_object, sign_jwt, EcCurve, EcSigner, JwtHeader, SigningAlgorithm};
    use bh_pex::claim_path;
    use bh_sd_jwt::test_utils::SdJwtIssuer;

    use super::*;
    use crate::{issuance::metadata::tests::issuer_metadata_json, test_utils::StubHttpClient};

    pub(crate) fn snapshot(configuration_id: &str) -> IssuerMetadataSnapshot {
        IssuerMetadataSnapshot {
            credential_issuer: "https://issuer.example".to_owned(),
            display: vec![],
            configuration_id: configuration_id.to_owned(),
            configuration: serde_json::from_value(
                issuer_metadata_json()["credential_configurations_supported"][configuration_id]
                    .clone(),
            )
            .unwrap(),
        }
    }

    pub(crate) fn issue_jwt_vc(claims: JsonObject) -> String {
        let signer = EcSigner::generate(EcCurve::P256, None).unwrap();
        sign_jwt(&signer, JwtHeader::new(SigningAlgorithm::Es256), &claims).unwrap()
    }

    pub(crate) fn employee_jwt_vc() -> String {
        issue_jwt_vc(json_object!({
            "iss": "https://issuer.example",
            "iat": 1_700_000_000,
            "exp": 1_800_000_000,
            "vc": {
                "@context": ["https://www.w3.org/2018/credentials/v1"],
                "type": ["VerifiableCredential", "EmployeeCredential"],
                "credentialSubject": { "given_name": "Erika", "department": "R&D" }
            }
        }))
    }

    pub(crate) fn identity_sd_jwt() -> String {
        SdJwtIssuer::generate()
            .unwrap()
            .issue(
                json_object!({
                    "iss": "https://issuer.example",
                    "iat": 1_700_000_000,
                    "vct": "https://credentials.example/identity",
                    "organization_name": "Example Corp",
                    "family_name": "Mustermann",
                    "given_name": "Erika",
                }),
                &[
                    claim_path!["organization_name"],
                    claim_path!["family_name"],
                    claim_path!["given_name"],
                ],
                None,
            )
            .unwrap()
    }

    #[test]
    fn request_carries_the_format_specific_type() {
        let proof = Proof {
            proof_type: "jwt".to_owned(),
            jwt: "a.b.c".to_owned(),
        };

        assert_eq!(
            credential_request_body(&snapshot("IdentityCredential").configuration, Some(&proof))
                .unwrap(),
            json!({
                "format": "vc+sd-jwt",
                "vct": "https://credentials.example/identity",
                "proof": { "proof_type": "jwt", "jwt": "a.b.c" }
            })
        );
        assert_eq!(
            credential_request_body(&snapshot("EmployeeCredential").configuration, None).unwrap(),
            json!({
                "format": "jwt_vc_json",
                "credential_definition": {
                    "type": ["VerifiableCredential", "EmployeeCredential"],
                    "credentialSubject": {}
                }
            })
        );
        assert_matches!(
            credential_request_body(&snapshot("UniversityDegree").configuration, None)
                .unwrap_err()
                .error,
            WalletError::UnsupportedFormat(_)
        );
    }

    #[test]
    fn jwt_vc_envelope_is_decoded() {
        let raw = employee_jwt_vc();

        let record = decode_credential(raw.clone(), snapshot("EmployeeCredential")).unwrap();

        assert_eq!(record.issuer, "https://issuer.example");
        assert_eq!(record.issued_at.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(record.expires_at.unwrap().timestamp(), 1_800_000_000);
        assert_eq!(record.raw_credential(), raw);
        assert_eq!(record.credential_type(), Some("EmployeeCredential"));
        assert_eq!(record.issuer_metadata.configuration_id, "EmployeeCredential");
    }

    #[test]
    fn sd_jwt_envelope_is_decoded() {
        let raw = identity_sd_jwt();

        let record = decode_credential(raw.clone(), snapshot("IdentityCredential")).unwrap();

        assert_eq!(record.issuer, "https://issuer.example");
        assert_eq!(record.expires_at, None);
        assert_eq!(
            record.credential,
            StoredCredential::SdJwtVc {
                raw,
                vct: "https://credentials.example/identity".to_owned()
            }
        );
    }

    #[test]
    fn issuer_may_be_named_in_the_credential() {
        let raw = issue_jwt_vc(json_object!({
            "vc": {
                "issuer": { "id": "did:example:issuer" },
                "type": "VerifiableCredential"
            }
        }));

        let record = decode_credential(raw, snapshot("EmployeeCredential")).unwrap();

        assert_eq!(record.issuer, "did:example:issuer");
        assert_eq!(record.issued_at, None);
        assert_eq!(record.credential_type(), Some("VerifiableCredential"));
    }

    #[test]
    fn undecodable_credentials_are_rejected() {
        let cases = [
            ("not a jwt".to_owned(), "EmployeeCredential"),
            (
                issue_jwt_vc(json_object!({ "iss": "https://issuer.example" })),
                "EmployeeCredential",
            ),
            (
                issue_jwt_vc(json_object!({
                    "iss": "https://issuer.example",
                    "exp": "tomorrow",
                    "vc": { "type": ["VerifiableCredential"] }
                })),
                "EmployeeCredential",
            ),
            (
                issue_jwt_vc(json_object!({ "vc": { "type": [1, 2] } })),
                "EmployeeCredential",
            ),
            (
                issue_jwt_vc(json_object!({ "vc": { "type": ["VerifiableCredential"] } })),
                "EmployeeCredential",
            ),
            (employee_jwt_vc(), "IdentityCredential"),
            ("~~".to_owned(), "IdentityCredential"),
        ];

        for (raw, configuration_id) in cases {
            assert_eq!(
                decode_credential(raw.clone(), snapshot(configuration_id))
                    .unwrap_err()
                    .error,
                WalletError::CredentialDecoding,
                "{raw}"
            );
        }
    }

    #[test]
    fn credential_is_taken_from_the_response() {
        let response: CredentialResponse =
            serde_json::from_value(json!({ "credential": "a.b.c", "c_nonce": "n2" })).unwrap();
        assert_eq!(response.c_nonce.as_deref(), Some("n2"));
        assert_eq!(response.into_credential().unwrap(), "a.b.c");

        let response: CredentialResponse =
            serde_json::from_value(json!({ "credentials": [{ "credential": "d.e.f" }] })).unwrap();
        assert_eq!(response.into_credential().unwrap(), "d.e.f");

        let response: CredentialResponse =
            serde_json::from_value(json!({ "transaction_id": "8xLOxBtZp8" })).unwrap();
        assert_matches!(
            response.into_credential().unwrap_err().error,
            WalletError::CredentialRequest { error, .. } if error == "issuance_pending"
        );

        let response: CredentialResponse =
            serde_json::from_value(json!({ "credential": { "@context": [] } })).unwrap();
        assert_eq!(
            response.into_credential().unwrap_err().error,
            WalletError::CredentialDecoding
        );
    }

    #[tokio::test]
    async fn credential_request_is_authorized_with_the_access_token() {
        let endpoint = "https://issuer.example/credential";
        let client = StubHttpClient::new().route(endpoint, 200, json!({ "credential": "a.b.c" }));
        let body = json!({ "format": "jwt_vc_json" });

        let response = request_credential(&client, endpoint, "tok", &body)
            .await
            .unwrap();

        assert_eq!(response.credential, Some(json!("a.b.c")));
        assert_eq!(
            client.requests(),
            vec![crate::test_utils::RecordedRequest::Json {
                url: endpoint.to_owned(),
                body,
                bearer_token: Some("tok".to_owned()),
            }]
        );
    }

    #[tokio::test]
    async fn credential_error_is_surfaced_with_its_fields() {
        let endpoint = "https://issuer.example/credential";
        let client = StubHttpClient::new().route(
            endpoint,
            400,
            json!({ "error": "invalid_proof", "error_description": "stale nonce" }),
        );

        let error = request_credential(&client, endpoint, "tok", &json!({}))
            .await
            .unwrap_err();

        assert_eq!(
            error.error,
            WalletError::CredentialRequest {
                error: "invalid_proof".to_owned(),
                error_description: Some("stale nonce".to_owned()),
            }
        );
    }
}
