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
    traits::{ForeignError as _, PropagateError as _},
    Error, Result,
};
use bhx5chain::{TrustPolicy, X5Chain};
use reqwest::{StatusCode, Url};

use crate::{
    error::JwtError, jwk::strip_private_members, public_jwk_from_pkey, HttpGetClient, JwkPublic,
    JwkSet, JwtHeader,
};

const HTTPS: &str = "https";

/// Resolves the public key which a JWT is to be verified with, out of its
/// header.
///
/// The key sources are tried in the following order, and the first one
/// present in the header is used exclusively:
///
/// 1. `x5c`: the embedded certificate chain is validated against the
///    configured [`TrustPolicy`] and the leaf's key is used;
/// 2. `x5u`: the PEM certificate chain is fetched over HTTPS and then handled
///    as `x5c`;
/// 3. `jwk`: the embedded key is used as is;
/// 4. `kid`: the key is looked up in the configured JWK Set, which is either
///    given up front or fetched from the configured URL.
pub struct KeyResolver<C: HttpGetClient> {
    client: C,
    trust: TrustPolicy,
    jwks: Option<JwkSet>,
    jwks_uri: Option<String>,
}

impl<C: HttpGetClient> KeyResolver<C> {
    /// Construct a [`KeyResolver`] validating certificate chains with the
    /// given `trust` policy.
    pub fn new(client: C, trust: TrustPolicy) -> Self {
        Self {
            client,
            trust,
            jwks: None,
            jwks_uri: None,
        }
    }

    /// Resolve `kid`s in the given JWK Set.
    pub fn with_jwks(mut self, jwks: JwkSet) -> Self {
        self.jwks = Some(jwks);
        self
    }

    /// Resolve `kid`s in the JWK Set served at the given URL.
    ///
    /// Ignored if a JWK Set is also given with [`KeyResolver::with_jwks`].
    pub fn with_jwks_uri(mut self, jwks_uri: impl Into<String>) -> Self {
        self.jwks_uri = Some(jwks_uri.into());
        self
    }

    /// The policy certificate chains are validated with.
    pub fn trust(&self) -> &TrustPolicy {
        &self.trust
    }

    /// Resolve the verification key for a JWT with the given `header`.
    pub async fn resolve(&self, header: &JwtHeader) -> Result<JwkPublic, JwtError> {
        if let Some(x5c) = &header.x5c {
            tracing::debug!("resolving key from x5c");
            let x5chain = X5Chain::try_from(x5c.clone())
                .with_err(|| JwtError::KeyResolution("invalid x5c".to_owned()))?;
            return self.leaf_key(&x5chain);
        }

        if let Some(x5u) = &header.x5u {
            tracing::debug!(x5u, "resolving key from x5u");
            let x5chain = self.fetch_x5chain(x5u).await?;
            return self.leaf_key(&x5chain);
        }

        if let Some(jwk) = &header.jwk {
            tracing::debug!("using key embedded in the header");
            return Ok(strip_private_members(jwk));
        }

        if let Some(kid) = &header.kid {
            tracing::debug!(kid, "resolving key by kid");
            return self.find_by_kid(kid).await;
        }

        Err(Error::root(JwtError::KeyResolution(
            "header has none of x5c, x5u, jwk and kid".to_owned(),
        )))
    }

    fn leaf_key(&self, x5chain: &X5Chain) -> Result<JwkPublic, JwtError> {
        x5chain
            .verify(&self.trust)
            .with_err(|| JwtError::KeyResolution("certificate chain not trusted".to_owned()))?;

        let leaf_key = x5chain
            .leaf_certificate_key()
            .with_err(|| JwtError::KeyResolution("invalid leaf certificate key".to_owned()))?;

        public_jwk_from_pkey(&leaf_key)
            .with_err(|| JwtError::KeyResolution("unsupported leaf certificate key".to_owned()))
    }

    async fn fetch_x5chain(&self, x5u: &str) -> Result<X5Chain, JwtError> {
        let url = Url::parse(x5u)
            .foreign_err(|| JwtError::KeyResolution(format!("invalid x5u: {x5u}")))?;
        if url.scheme() != HTTPS {
            return Err(Error::root(JwtError::KeyResolution(format!(
                "x5u must be an https URL, got {x5u}"
            ))));
        }

        let response = self
            .client
            .get(url.as_str())
            .await
            .foreign_err(|| JwtError::KeyResolution(format!("could not get {x5u}")))?;
        check_successful_response(&response)?;

        let pem = response
            .bytes()
            .await
            .foreign_err(|| JwtError::KeyResolution(format!("could not read {x5u}")))?;

        X5Chain::from_pem_bundle(&pem)
            .with_err(|| JwtError::KeyResolution(format!("invalid certificate chain at {x5u}")))
    }

    async fn find_by_kid(&self, kid: &str) -> Result<JwkPublic, JwtError> {
        let fetched;
        let jwks = match (&self.jwks, &self.jwks_uri) {
            (Some(jwks), _) => jwks,
            (None, Some(jwks_uri)) => {
                let response = self.client.get(jwks_uri).await.foreign_err(|| {
                    JwtError::KeyResolution(format!("could not get {jwks_uri}"))
                })?;
                check_successful_response(&response)?;

                fetched = response.json::<JwkSet>().await.foreign_err(|| {
                    JwtError::KeyResolution(format!("{jwks_uri} is not a JWK Set"))
                })?;
                &fetched
            }
            (None, None) => {
                return Err(Error::root(JwtError::KeyResolution(format!(
                    "no key set configured to look up kid {kid}"
                ))))
            }
        };

        jwks.find_by_kid(kid)
            .map(strip_private_members)
            .ok_or_else(|| Error::root(JwtError::KeyResolution(format!("unknown kid {kid}"))))
    }
}

fn check_successful_response(response: &reqwest::Response) -> Result<(), JwtError> {
    if response.status() != StatusCode::OK {
        return Err(Error::root(JwtError::KeyResolution(format!(
            "response status code was {}, expected 200 OK",
            response.status()
        ))));
    }
    Ok(())
}
