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

//! HTTP access of the protocol flows.

use std::future::Future;

use bh_jws_utils::HttpGetClient;
use bherror::{
    traits::{ErrorContext as _, ForeignError as _},
    Error,
};
use reqwest::{Client, ClientBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use crate::{Result, WalletError};

/// Client for the requests the wallet sends to issuers and verifiers.
///
/// Besides plain `GET`s, used for metadata discovery, the OAuth token and
/// the `direct_post` endpoints are sent forms, and the credential endpoint a
/// JSON body authorized with a bearer access token.
pub trait HttpClient: HttpGetClient {
    /// Performs a HTTP POST request with an `application/x-www-form-urlencoded`
    /// body.
    fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> impl Future<Output = std::result::Result<reqwest::Response, Self::Err>> + Send;

    /// Performs a HTTP POST request with a JSON body, authorized with the
    /// `bearer_token` if one is given.
    fn post_json(
        &self,
        url: &str,
        body: &Value,
        bearer_token: Option<&str>,
    ) -> impl Future<Output = std::result::Result<reqwest::Response, Self::Err>> + Send;
}

/// [`HttpClient`] implementation using the [`reqwest`] crate.
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient(Client);

impl ReqwestHttpClient {
    /// Construct [`ReqwestHttpClient`] from [`Client`].
    pub fn new(client: Client) -> Self {
        Self(client)
    }

    /// Construct [`ReqwestHttpClient`] from [`ClientBuilder`].
    pub fn from_builder(builder: ClientBuilder) -> reqwest::Result<Self> {
        Ok(Self(builder.build()?))
    }
}

impl HttpGetClient for ReqwestHttpClient {
    type Err = reqwest::Error;

    fn get(&self, url: &str) -> impl Future<Output = reqwest::Result<reqwest::Response>> + Send {
        self.0.get(url).send()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> impl Future<Output = reqwest::Result<reqwest::Response>> + Send {
        self.0.post(url).form(form).send()
    }

    fn post_json(
        &self,
        url: &str,
        body: &Value,
        bearer_token: Option<&str>,
    ) -> impl Future<Output = reqwest::Result<reqwest::Response>> + Send {
        let mut request = self.0.post(url).json(body);
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }
        request.send()
    }
}

/// OAuth 2.0 error response, as returned by the token and the credential
/// endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct OAuthErrorResponse {
    pub(crate) error: String,
    #[serde(default)]
    pub(crate) error_description: Option<String>,
}

/// Read a JSON response, telling a protocol error apart from a transport
/// failure.
///
/// A successful response must deserialize into `T`.  An unsuccessful one is
/// returned as `Ok(Err(_))` if it carries an OAuth error body, and as a
/// [`WalletError::Transport`] error otherwise.
pub(crate) async fn read_json_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<std::result::Result<T, OAuthErrorResponse>> {
    let status = response.status();
    let body = response
        .text()
        .await
        .foreign_err(|| WalletError::Transport("cannot read response body".to_owned()))?;

    if status.is_success() {
        return serde_json::from_str(&body)
            .match_foreign_err(|error| {
                WalletError::Transport(format!("unexpected response body: {error}"))
            })
            .map(Ok);
    }

    match serde_json::from_str::<OAuthErrorResponse>(&body) {
        Ok(error_response) => Ok(Err(error_response)),
        Err(_) => Err(Error::root(WalletError::Transport(format!(
            "unexpected response status {status}"
        )))),
    }
}

/// Fetch a JSON document, treating an unsuccessful response as an absent
/// document.
pub(crate) async fn fetch_json_document<C: HttpGetClient>(
    client: &C,
    url: &str,
) -> Result<Option<Value>> {
    let response = client
        .get(url)
        .await
        .foreign_err(|| WalletError::Transport(format!("GET {url} failed")))?;

    let status = response.status();
    if !status.is_success() {
        tracing::debug!(url, %status, "document not found");
        return Ok(None);
    }

    let document = response
        .json()
        .await
        .match_foreign_err(|error| WalletError::MetadataDiscovery(error.to_string()))
        .ctx(|| format!("invalid JSON document at {url}"))?;

    Ok(Some(document))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::test_utils::{json_response, StubHttpClient};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Greeting {
        hello: String,
    }

    #[tokio::test]
    async fn successful_response_is_deserialized() {
        let response = json_response(200, json!({ "hello": "world" }));

        let greeting = read_json_response::<Greeting>(response).await.unwrap();

        assert_eq!(
            greeting,
            Ok(Greeting {
                hello: "world".to_owned()
            })
        );
    }

    #[tokio::test]
    async fn oauth_error_is_returned_as_value() {
        let response = json_response(
            400,
            json!({ "error": "invalid_grant", "error_description": "code expired" }),
        );

        let error = read_json_response::<Greeting>(response)
            .await
            .unwrap()
            .unwrap_err();

        assert_eq!(error.error, "invalid_grant");
        assert_eq!(error.error_description.as_deref(), Some("code expired"));
    }

    #[tokio::test]
    async fn unexpected_bodies_are_transport_errors() {
        let response = json_response(500, json!("internal"));
        assert_matches!(
            read_json_response::<Greeting>(response).await.unwrap_err().error,
            WalletError::Transport(_)
        );

        let response = json_response(200, json!({ "bye": "world" }));
        assert_matches!(
            read_json_response::<Greeting>(response).await.unwrap_err().error,
            WalletError::Transport(_)
        );
    }

    #[tokio::test]
    async fn missing_document_is_absent() {
        let client = StubHttpClient::new().route(
            "https://issuer.example/metadata",
            200,
            json!({ "issuer": "https://issuer.example" }),
        );

        assert_eq!(
            fetch_json_document(&client, "https://issuer.example/metadata")
                .await
                .unwrap(),
            Some(json!({ "issuer": "https://issuer.example" }))
        );
        assert_eq!(
            fetch_json_document(&client, "https://issuer.example/other")
                .await
                .unwrap(),
            None
        );
    }
}
