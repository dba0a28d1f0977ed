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

use bh_jws_utils::JsonObject;
use bh_pex::PresentationDefinition;
use bherror::{
    traits::{ErrorContext as _, ForeignError as _},
    Error,
};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::{Result, WalletError};

/// URI schemes of presentation requests the wallet handles.
pub const AUTHORIZATION_REQUEST_SCHEMES: [&str; 4] = ["openid4vp", "siopv2", "openid", "https"];

const PRESENTATION_DEFINITION_PARAM: &str = "presentation_definition";

/// Parameters which would require fetching a part of the request first.
const BY_REFERENCE_PARAMS: [&str; 3] = ["request_uri", "presentation_definition_uri", "request"];

/// What the verifier asks to be returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseType {
    /// A Verifiable Presentation is requested.
    pub vp_token: bool,
    /// A Self-Issued ID Token is requested.
    pub id_token: bool,
}

impl ResponseType {
    fn parse(response_type: &str) -> std::result::Result<Self, String> {
        let mut parsed = Self {
            vp_token: false,
            id_token: false,
        };

        for value in response_type.split_whitespace() {
            match value {
                "vp_token" => parsed.vp_token = true,
                "id_token" => parsed.id_token = true,
                other => return Err(format!("unsupported response type {other}")),
            }
        }

        if !parsed.vp_token && !parsed.id_token {
            return Err("empty `response_type`".to_owned());
        }
        Ok(parsed)
    }
}

/// How the response is delivered to the verifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Parameters in the fragment of the `redirect_uri`.
    #[default]
    Fragment,
    /// Parameters in the query of the `redirect_uri`.
    Query,
    /// Form POST to the `response_uri`.
    DirectPost,
}

/// An [OpenID4VP] / [SIOPv2] Authorization Request of a verifier.
///
/// Signed request objects and parameters passed by reference are not
/// supported.
///
/// [OpenID4VP]: https://openid.net/specs/openid-4-verifiable-presentations-1_0-20.html#name-authorization-request
/// [SIOPv2]: https://openid.net/specs/openid-connect-self-issued-v2-1_0.html#name-self-issued-openid-provider-a
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "AuthorizationRequestUnverified")]
pub struct AuthorizationRequest {
    /// Identifier of the verifier.  It is the audience of everything
    /// presented, and the relying party the holder key is derived for.
    pub client_id: String,
    /// Freshness challenge of the verifier.
    pub nonce: String,
    /// The requested tokens.
    pub response_type: ResponseType,
    /// How the response is delivered.
    pub response_mode: ResponseMode,
    /// Where a `direct_post` response is sent.
    pub response_uri: Option<String>,
    /// Where the user agent is sent with the response.
    pub redirect_uri: Option<String>,
    /// Opaque value echoed in the response.
    pub state: Option<String>,
    /// The required credentials.  Present if a VP Token is requested.
    pub presentation_definition: Option<PresentationDefinition>,
}

#[derive(Deserialize)]
struct AuthorizationRequestUnverified {
    client_id: String,
    nonce: String,
    response_type: String,
    #[serde(default)]
    response_mode: Option<ResponseMode>,
    #[serde(default)]
    response_uri: Option<String>,
    #[serde(default)]
    redirect_uri: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    presentation_definition: Option<Value>,
}

impl TryFrom<AuthorizationRequestUnverified> for AuthorizationRequest {
    type Error = String;

    fn try_from(value: AuthorizationRequestUnverified) -> std::result::Result<Self, Self::Error> {
        if value.client_id.is_empty() {
            return Err("empty `client_id`".to_owned());
        }
        if value.nonce.is_empty() {
            return Err("empty `nonce`".to_owned());
        }

        let response_type = ResponseType::parse(&value.response_type)?;

        let presentation_definition = value
            .presentation_definition
            .map(|definition| {
                PresentationDefinition::from_json(&definition)
                    .map_err(|error| format!("invalid presentation definition: {error}"))
            })
            .transpose()?;
        if response_type.vp_token && presentation_definition.is_none() {
            return Err("VP Token requested without a presentation definition".to_owned());
        }

        let response_mode = value.response_mode.unwrap_or_default();
        match response_mode {
            ResponseMode::DirectPost if value.response_uri.is_none() => {
                return Err("`direct_post` without a `response_uri`".to_owned());
            }
            ResponseMode::Fragment | ResponseMode::Query if value.redirect_uri.is_none() => {
                return Err("missing `redirect_uri`".to_owned());
            }
            _ => {}
        }

        Ok(Self {
            client_id: value.client_id,
            nonce: value.nonce,
            response_type,
            response_mode,
            response_uri: value.response_uri,
            redirect_uri: value.redirect_uri,
            state: value.state,
            presentation_definition,
        })
    }
}

impl AuthorizationRequest {
    /// Parse a request passed as JSON, e.g. the payload of a request object.
    pub fn from_json(json: &Value) -> Result<Self> {
        let Value::Object(parameters) = json else {
            return Err(Error::root(WalletError::InvalidPresentationRequest(
                "request is not a JSON object".to_owned(),
            )));
        };
        reject_by_reference(parameters)?;

        serde_json::from_value(json.clone())
            .match_foreign_err(|error| WalletError::InvalidPresentationRequest(error.to_string()))
    }

    /// Parse a request passed by value in the query of an `openid4vp://`,
    /// `siopv2://`, `openid://` or `https` URI.
    ///
    /// The `presentation_definition` parameter holds the definition as a
    /// JSON string.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)
            .match_foreign_err(|error| WalletError::InvalidPresentationRequest(error.to_string()))
            .ctx(|| "invalid presentation request URI")?;

        if !AUTHORIZATION_REQUEST_SCHEMES.contains(&url.scheme()) {
            return Err(Error::root(WalletError::InvalidPresentationRequest(format!(
                "unsupported scheme {}",
                url.scheme()
            ))));
        }

        let mut parameters = JsonObject::new();
        for (name, value) in url.query_pairs() {
            let value = if name == PRESENTATION_DEFINITION_PARAM {
                serde_json::from_str(&value)
                    .match_foreign_err(|error| {
                        WalletError::InvalidPresentationRequest(error.to_string())
                    })
                    .ctx(|| "invalid presentation definition")?
            } else {
                Value::String(value.into_owned())
            };
            parameters.insert(name.into_owned(), value);
        }

        Self::from_json(&Value::Object(parameters))
    }
}

fn reject_by_reference(parameters: &JsonObject) -> Result<()> {
    match BY_REFERENCE_PARAMS
        .iter()
        .find(|name| parameters.contains_key(**name))
    {
        Some(name) => Err(Error::root(WalletError::InvalidPresentationRequest(
            format!("`{name}` is not supported"),
        ))),
        None => Ok(()),
    }
}
