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

use bh_jws_utils::{HttpGetClient, JsonObject};
use bherror::{
    traits::{ErrorContext as _, ForeignError as _},
    Error,
};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::{http::fetch_json_document, Result, WalletError};

/// URI scheme of credential offer deep links.
pub const CREDENTIAL_OFFER_SCHEME: &str = "openid-credential-offer";

/// Query parameter of a deep link carrying the offer by value.
pub const CREDENTIAL_OFFER_PARAM: &str = "credential_offer";

/// Query parameter of a deep link carrying the offer by reference.
pub const CREDENTIAL_OFFER_URI_PARAM: &str = "credential_offer_uri";

/// Grant type of the Pre-Authorized Code Flow.
pub const PRE_AUTHORIZED_CODE_GRANT_TYPE: &str =
    "urn:ietf:params:oauth:grant-type:pre-authorized_code";

const PRE_AUTHORIZED_CODE: &str = "pre-authorized_code";

/// Credential Offer of an issuer, as specified in [OpenID4VCI].
///
/// Only offers usable with the Pre-Authorized Code Flow are accepted.
///
/// [OpenID4VCI]: https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0-13.html#name-credential-offer-parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "CredentialOfferUnverified")]
pub struct CredentialOffer {
    /// URL of the credential issuer.
    pub credential_issuer: String,
    /// Identifiers of the offered credential configurations.
    pub credentials: Vec<String>,
    /// The pre-authorized code grant.
    pub grant: PreAuthorizedCodeGrant,
}

/// Parameters of the pre-authorized code grant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PreAuthorizedCodeGrant {
    /// The code to exchange for an access token.
    #[serde(rename = "pre-authorized_code")]
    pub pre_authorized_code: String,
    /// Present if the issuer expects a transaction code along with the
    /// pre-authorized code.
    #[serde(default)]
    pub tx_code: Option<TxCode>,
    /// The earlier way of requiring a transaction code.
    #[serde(default)]
    pub user_pin_required: bool,
}

impl PreAuthorizedCodeGrant {
    /// Whether the token request must carry a transaction code.
    pub fn requires_tx_code(&self) -> bool {
        self.tx_code.is_some() || self.user_pin_required
    }
}

/// How the transaction code is to be entered by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TxCode {
    /// Either `numeric` or `text`.
    #[serde(default)]
    pub input_mode: Option<String>,
    /// The length of the code.
    #[serde(default)]
    pub length: Option<u32>,
    /// Guidance for the user on where to find the code.
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Deserialize)]
struct CredentialOfferUnverified {
    credential_issuer: String,
    #[serde(alias = "credential_configuration_ids")]
    credentials: Vec<String>,
    #[serde(default)]
    grants: JsonObject,
}

impl TryFrom<CredentialOfferUnverified> for CredentialOffer {
    type Error = String;

    fn try_from(value: CredentialOfferUnverified) -> std::result::Result<Self, Self::Error> {
        check_credential_issuer(&value.credential_issuer)?;

        if value.credentials.is_empty() {
            return Err("no credentials offered".to_owned());
        }
        if value.credentials.iter().any(String::is_empty) {
            return Err("empty credential configuration identifier".to_owned());
        }

        Ok(Self {
            credential_issuer: value.credential_issuer,
            credentials: value.credentials,
            grant: pre_authorized_code_grant(&value.grants)?,
        })
    }
}

fn check_credential_issuer(credential_issuer: &str) -> std::result::Result<(), String> {
    let url = Url::parse(credential_issuer)
        .map_err(|error| format!("invalid `credential_issuer` {credential_issuer}: {error}"))?;

    if url.scheme() != "https" {
        return Err("`credential_issuer` scheme should be https".to_owned());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("`credential_issuer` should not contain query or fragment parts".to_owned());
    }

    Ok(())
}

fn pre_authorized_code_grant(
    grants: &JsonObject,
) -> std::result::Result<PreAuthorizedCodeGrant, String> {
    let grant = match grants.get(PRE_AUTHORIZED_CODE_GRANT_TYPE) {
        Some(grant) => grant.clone(),
        // Abbreviated offers list the grant parameters directly.
        None if grants.contains_key(PRE_AUTHORIZED_CODE) => Value::Object(grants.clone()),
        None => return Err("missing pre-authorized code grant".to_owned()),
    };

    let grant: PreAuthorizedCodeGrant = serde_json::from_value(grant)
        .map_err(|error| format!("invalid pre-authorized code grant: {error}"))?;
    if grant.pre_authorized_code.is_empty() {
        return Err("empty pre-authorized code".to_owned());
    }

    Ok(grant)
}

impl CredentialOffer {
    /// Parse an offer passed by value.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .match_foreign_err(|error| WalletError::InvalidOffer(error.to_string()))
    }

    /// Parse an `openid-credential-offer://?credential_offer=...` deep link.
    ///
    /// Offers passed by reference are rejected; use [`Self::fetch`] for
    /// those.
    pub fn from_uri(uri: &str) -> Result<Self> {
        match OfferParameter::from_uri(uri)? {
            OfferParameter::Value(json) => Self::from_json(&json),
            OfferParameter::Reference(_) => Err(Error::root(WalletError::InvalidOffer(
                "offer passed by reference".to_owned(),
            ))),
        }
    }

    /// Parse a deep link, fetching the offer first if it is passed by
    /// reference.
    pub async fn fetch<C: HttpGetClient>(client: &C, uri: &str) -> Result<Self> {
        let offer_uri = match OfferParameter::from_uri(uri)? {
            OfferParameter::Value(json) => return Self::from_json(&json),
            OfferParameter::Reference(offer_uri) => offer_uri,
        };

        let document = fetch_json_document(client, &offer_uri)
            .await
            .ctx(|| "cannot fetch credential offer")?
            .ok_or_else(|| {
                Error::root(WalletError::InvalidOffer(format!(
                    "no credential offer at {offer_uri}"
                )))
            })?;

        serde_json::from_value(document)
            .match_foreign_err(|error| WalletError::InvalidOffer(error.to_string()))
    }
}

enum OfferParameter {
    Value(String),
    Reference(String),
}

impl OfferParameter {
    fn from_uri(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)
            .match_foreign_err(|error| WalletError::InvalidOffer(error.to_string()))
            .ctx(|| "invalid credential offer URI")?;

        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                CREDENTIAL_OFFER_PARAM => return Ok(Self::Value(value.into_owned())),
                CREDENTIAL_OFFER_URI_PARAM => return Ok(Self::Reference(value.into_owned())),
                _ => {}
            }
        }

        Err(Error::root(WalletError::InvalidOffer(format!(
            "neither `{CREDENTIAL_OFFER_PARAM}` nor `{CREDENTIAL_OFFER_URI_PARAM}` present"
        ))))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::test_utils::StubHttpClient;

    fn offer_json() -> Value {
        json!({
            "credential_issuer": "https://issuer.example",
            "credential_configuration_ids": ["EmployeeCredential"],
            "grants": {
                "urn:ietf:params:oauth:grant-type:pre-authorized_code": {
                    "pre-authorized_code": "abc",
                    "tx_code": {
                        "input_mode": "numeric",
                        "length": 4,
                        "description": "Check your e-mail"
                    }
                }
            }
        })
    }

    #[test]
    fn offer_with_pre_authorized_code_is_parsed() {
        let offer = CredentialOffer::from_json(&offer_json().to_string()).unwrap();

        assert_eq!(offer.credential_issuer, "https://issuer.example");
        assert_eq!(offer.credentials, vec!["EmployeeCredential"]);
        assert_eq!(offer.grant.pre_authorized_code, "abc");
        assert!(offer.grant.requires_tx_code());
        assert_eq!(
            offer.grant.tx_code,
            Some(TxCode {
                input_mode: Some("numeric".to_owned()),
                length: Some(4),
                description: Some("Check your e-mail".to_owned()),
            })
        );
    }

    #[test]
    fn abbreviated_grant_is_accepted() {
        let offer = CredentialOffer::from_json(
            &json!({
                "credential_issuer": "https://issuer.example",
                "credentials": ["EmployeeCredential"],
                "grants": { "pre-authorized_code": "abc", "tx_code": null }
            })
            .to_string(),
        )
        .unwrap();

        assert_eq!(offer.grant.pre_authorized_code, "abc");
        assert!(!offer.grant.requires_tx_code());
    }

    #[test]
    fn legacy_user_pin_requires_tx_code() {
        let offer = CredentialOffer::from_json(
            &json!({
                "credential_issuer": "https://issuer.example",
                "credentials": ["EmployeeCredential"],
                "grants": {
                    "urn:ietf:params:oauth:grant-type:pre-authorized_code": {
                        "pre-authorized_code": "abc",
                        "user_pin_required": true
                    }
                }
            })
            .to_string(),
        )
        .unwrap();

        assert!(offer.grant.requires_tx_code());
    }

    #[test]
    fn invalid_offers_are_rejected() {
        let mut cases = Vec::new();

        let mut offer = offer_json();
        offer.as_object_mut().unwrap().remove("credential_issuer");
        cases.push(offer);

        let mut offer = offer_json();
        offer["credential_issuer"] = json!("http://issuer.example");
        cases.push(offer);

        let mut offer = offer_json();
        offer["credential_issuer"] = json!("https://issuer.example?tenant=1");
        cases.push(offer);

        let mut offer = offer_json();
        offer["credential_configuration_ids"] = json!([]);
        cases.push(offer);

        let mut offer = offer_json();
        offer["credential_configuration_ids"] = json!([""]);
        cases.push(offer);

        let mut offer = offer_json();
        offer["grants"] = json!({ "authorization_code": { "issuer_state": "xyz" } });
        cases.push(offer);

        let mut offer = offer_json();
        offer.as_object_mut().unwrap().remove("grants");
        cases.push(offer);

        let mut offer = offer_json();
        offer["grants"][PRE_AUTHORIZED_CODE_GRANT_TYPE]["pre-authorized_code"] = json!("");
        cases.push(offer);

        for offer in cases {
            assert_matches!(
                CredentialOffer::from_json(&offer.to_string()).unwrap_err().error,
                WalletError::InvalidOffer(_),
                "{offer}"
            );
        }
    }

    #[test]
    fn offer_is_read_from_deep_link() {
        let mut uri = Url::parse("openid-credential-offer://").unwrap();
        uri.query_pairs_mut()
            .append_pair(CREDENTIAL_OFFER_PARAM, &offer_json().to_string());

        let offer = CredentialOffer::from_uri(uri.as_str()).unwrap();

        assert_eq!(offer, CredentialOffer::from_json(&offer_json().to_string()).unwrap());
    }

    #[test]
    fn deep_link_without_offer_is_rejected() {
        for uri in [
            "openid-credential-offer://?foo=bar",
            "not a uri",
            "openid-credential-offer://?credential_offer=%7B%7D",
            "openid-credential-offer://?credential_offer_uri=https%3A%2F%2Fissuer.example%2Foffer",
        ] {
            assert_matches!(
                CredentialOffer::from_uri(uri).unwrap_err().error,
                WalletError::InvalidOffer(_),
                "{uri}"
            );
        }
    }

    #[tokio::test]
    async fn offer_by_reference_is_fetched() {
        let client =
            StubHttpClient::new().route("https://issuer.example/offer/1", 200, offer_json());

        let offer = CredentialOffer::fetch(
            &client,
            "openid-credential-offer://?credential_offer_uri=https%3A%2F%2Fissuer.example%2Foffer%2F1",
        )
        .await
        .unwrap();

        assert_eq!(offer.grant.pre_authorized_code, "abc");

        let missing = CredentialOffer::fetch(
            &client,
            "openid-credential-offer://?credential_offer_uri=https%3A%2F%2Fissuer.example%2Foffer%2F2",
        )
        .await
        .unwrap_err();
        assert_matches!(missing.error, WalletError::InvalidOffer(_));
    }
}
