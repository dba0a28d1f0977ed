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

//! Persisted wallet data.

use bh_pex::{FORMAT_JWT_VC_JSON, FORMAT_VC_SD_JWT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::issuance::{CredentialConfiguration, LocalizedDisplay};

/// The `type` every W3C Verifiable Credential carries, besides its specific
/// type.
pub const VERIFIABLE_CREDENTIAL_TYPE: &str = "VerifiableCredential";

/// Formats of the credentials the wallet stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialFormat {
    /// SD-JWT VC, `vc+sd-jwt`.
    #[serde(rename = "vc+sd-jwt")]
    SdJwtVc,
    /// W3C Verifiable Credential secured as a JWT, `jwt_vc_json`.
    #[serde(rename = "jwt_vc_json")]
    JwtVcJson,
}

impl CredentialFormat {
    /// The format identifier used in OpenID4VC and Presentation Exchange
    /// messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SdJwtVc => FORMAT_VC_SD_JWT,
            Self::JwtVcJson => FORMAT_JWT_VC_JSON,
        }
    }
}

impl std::fmt::Display for CredentialFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The credential as received from the issuer, with the type information
/// of its format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format")]
pub enum StoredCredential {
    /// An SD-JWT VC, in its issuance serialization with all disclosures.
    #[serde(rename = "vc+sd-jwt")]
    SdJwtVc {
        /// The compact serialization.
        raw: String,
        /// The `vct` claim.
        vct: String,
    },
    /// A JWT-secured W3C Verifiable Credential.
    #[serde(rename = "jwt_vc_json")]
    JwtVcJson {
        /// The compact JWT.
        raw: String,
        /// The `type` of the credential, e.g.
        /// `["VerifiableCredential", "EmployeeCredential"]`.
        types: Vec<String>,
    },
}

/// The part of the issuer metadata describing a stored credential.
///
/// Snapshotted at issuance, so that the credential can be rendered without
/// contacting the issuer again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuerMetadataSnapshot {
    /// Identifier of the credential issuer.
    pub credential_issuer: String,
    /// Localized display properties of the issuer.
    #[serde(default)]
    pub display: Vec<LocalizedDisplay>,
    /// Identifier of the credential configuration the credential was issued
    /// under.
    pub configuration_id: String,
    /// The credential configuration.
    pub configuration: CredentialConfiguration,
}

/// A credential held by the wallet.
///
/// Records are created at the end of a successful issuance and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Random identifier of the record.
    pub id: Uuid,
    /// The `iss` of the credential.
    pub issuer: String,
    /// The `iat` of the credential.
    pub issued_at: Option<DateTime<Utc>>,
    /// The `exp` of the credential, absent for credentials which do not
    /// expire.
    pub expires_at: Option<DateTime<Utc>>,
    /// The credential itself.
    pub credential: StoredCredential,
    /// How the issuer describes the credential.
    pub issuer_metadata: IssuerMetadataSnapshot,
}

impl CredentialRecord {
    /// The credential format.
    pub fn format(&self) -> CredentialFormat {
        match self.credential {
            StoredCredential::SdJwtVc { .. } => CredentialFormat::SdJwtVc,
            StoredCredential::JwtVcJson { .. } => CredentialFormat::JwtVcJson,
        }
    }

    /// The credential as received from the issuer.
    pub fn raw_credential(&self) -> &str {
        match &self.credential {
            StoredCredential::SdJwtVc { raw, .. } | StoredCredential::JwtVcJson { raw, .. } => raw,
        }
    }

    /// The type of the credential: the `vct` of an SD-JWT VC, and the most
    /// specific `type` of a W3C credential.
    pub fn credential_type(&self) -> Option<&str> {
        match &self.credential {
            StoredCredential::SdJwtVc { vct, .. } => Some(vct),
            StoredCredential::JwtVcJson { types, .. } => types
                .iter()
                .rev()
                .find(|credential_type| *credential_type != VERIFIABLE_CREDENTIAL_TYPE)
                .or(types.first())
                .map(String::as_str),
        }
    }

    /// Whether the credential has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// A record of a presentation made to a relying party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharingHistoryEntry {
    /// The `client_id` of the verifier.
    pub relying_party: String,
    /// Index of the pairwise account presented to the verifier.
    pub account_index: u32,
    /// When the presentation was made.
    pub created_at: DateTime<Utc>,
    /// Locations of the claims disclosed, e.g. `$.address.street_address`.
    pub disclosed_claims: Vec<String>,
    /// The presented credential.
    pub credential_id: Uuid,
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::TimeZone as _;
    use serde_json::json;

    use super::*;

    pub(crate) fn jwt_vc_configuration() -> CredentialConfiguration {
        serde_json::from_value(json!({
            "format": "jwt_vc_json",
            "credential_definition": {
                "type": ["VerifiableCredential", "EmployeeCredential"]
            }
        }))
        .unwrap()
    }

    pub(crate) fn record(credential: StoredCredential) -> CredentialRecord {
        CredentialRecord {
            id: Uuid::new_v4(),
            issuer: "https://issuer.example".to_owned(),
            issued_at: None,
            expires_at: None,
            credential,
            issuer_metadata: IssuerMetadataSnapshot {
                credential_issuer: "https://issuer.example".to_owned(),
                display: vec![],
                configuration_id: "EmployeeCredential".to_owned(),
                configuration: jwt_vc_configuration(),
            },
        }
    }

    #[test]
    fn most_specific_type_is_the_credential_type() {
        let jwt_vc = record(StoredCredential::JwtVcJson {
            raw: "a.b.c".to_owned(),
            types: vec![
                VERIFIABLE_CREDENTIAL_TYPE.to_owned(),
                "EmployeeCredential".to_owned(),
            ],
        });
        assert_eq!(jwt_vc.format(), CredentialFormat::JwtVcJson);
        assert_eq!(jwt_vc.credential_type(), Some("EmployeeCredential"));
        assert_eq!(jwt_vc.raw_credential(), "a.b.c");

        let plain = record(StoredCredential::JwtVcJson {
            raw: "a.b.c".to_owned(),
            types: vec![VERIFIABLE_CREDENTIAL_TYPE.to_owned()],
        });
        assert_eq!(plain.credential_type(), Some(VERIFIABLE_CREDENTIAL_TYPE));

        let sd_jwt = record(StoredCredential::SdJwtVc {
            raw: "a.b.c~".to_owned(),
            vct: "https://credentials.example/identity".to_owned(),
        });
        assert_eq!(sd_jwt.format(), CredentialFormat::SdJwtVc);
        assert_eq!(
            sd_jwt.credential_type(),
            Some("https://credentials.example/identity")
        );
    }

    #[test]
    fn credential_is_stored_with_its_format() {
        let credential = StoredCredential::SdJwtVc {
            raw: "a.b.c~".to_owned(),
            vct: "Identity".to_owned(),
        };

        let serialized = serde_json::to_value(&credential).unwrap();

        assert_eq!(
            serialized,
            json!({ "format": "vc+sd-jwt", "raw": "a.b.c~", "vct": "Identity" })
        );
        assert_eq!(
            serde_json::from_value::<StoredCredential>(serialized).unwrap(),
            credential
        );
    }

    #[test]
    fn expiry_is_checked_against_exp() {
        let mut record = record(StoredCredential::JwtVcJson {
            raw: "a.b.c".to_owned(),
            types: vec![],
        });
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        assert!(!record.is_expired(now));

        record.expires_at = Some(Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap());
        assert!(record.is_expired(now));
    }
}
