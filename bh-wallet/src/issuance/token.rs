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

use bherror::{
    traits::{ErrorContext as _, ForeignError as _},
    Error,
};
use serde::Deserialize;

use crate::{
    http::read_json_response, issuance::PRE_AUTHORIZED_CODE_GRANT_TYPE, HttpClient,
    PreAuthorizedCodeGrant, Result, WalletError,
};

/// Response of the token endpoint.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    /// The access token for the credential endpoint.
    pub access_token: String,
    /// Type of the access token, usually `Bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Nonce the key proof of the credential request must be bound to.  A
    /// proof is required if and only if it is present.
    #[serde(default)]
    pub c_nonce: Option<String>,
    /// Lifetime of the `c_nonce` in seconds.
    #[serde(default)]
    pub c_nonce_expires_in: Option<u64>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("c_nonce", &self.c_nonce)
            .field("c_nonce_expires_in", &self.c_nonce_expires_in)
            .finish()
    }
}

/// Exchange the pre-authorized code for an access token.
///
/// The `tx_code` is sent only if the grant requires one, in which case it
/// must be provided.
pub async fn request_token<C: HttpClient>(
    client: &C,
    token_endpoint: &str,
    grant: &PreAuthorizedCodeGrant,
    tx_code: Option<&str>,
) -> Result<TokenResponse> {
    let mut form = vec![
        ("grant_type", PRE_AUTHORIZED_CODE_GRANT_TYPE),
        ("pre-authorized_code", grant.pre_authorized_code.as_str()),
    ];

    if grant.requires_tx_code() {
        let Some(tx_code) = tx_code else {
            return Err(Error::root(WalletError::InvalidOffer(
                "transaction code required".to_owned(),
            )));
        };
        // Issuers still using `user_pin_required` expect the earlier name.
        let name = if grant.tx_code.is_some() {
            "tx_code"
        } else {
            "user_pin"
        };
        form.push((name, tx_code));
    }

    let response = client
        .post_form(token_endpoint, &form)
        .await
        .foreign_err(|| WalletError::Transport(format!("POST {token_endpoint} failed")))?;

    match read_json_response::<TokenResponse>(response)
        .await
        .ctx(|| "invalid token response")?
    {
        Ok(token) => {
            tracing::debug!(
                proof_required = token.c_nonce.is_some(),
                "access token received"
            );
            Ok(token)
        }
        Err(error_response) => Err(Error::root(WalletError::TokenErrorResponse {
            error: error_response.error,
            error_description: error_response.error_description,
        })),
    }
}
