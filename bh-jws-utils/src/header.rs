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

use bherror::Error;
use bhx5chain::JwtX5Chain;
use serde::{Deserialize, Serialize};

use crate::{error::JwtError, JsonObject, JwkPublic, SigningAlgorithm};

/// The JOSE header of a compact JWS.
///
/// Only the parameters used to pick the verification key are modelled
/// explicitly; everything else is kept in [`JwtHeader::extra`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtHeader {
    /// The `alg` parameter, as found in the token.
    ///
    /// It is kept as a string so that tokens with unsupported algorithms can
    /// still be decoded; see [`JwtHeader::algorithm`].
    pub alg: String,
    /// The `typ` parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// The `kid` parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// The `jwk` parameter, i.e. an embedded public key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<JwkPublic>,
    /// The `x5c` parameter, i.e. an embedded certificate chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5c: Option<JwtX5Chain>,
    /// The `x5u` parameter, i.e. a URL of a PEM certificate chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5u: Option<String>,
    /// All other header parameters.
    #[serde(flatten)]
    pub extra: JsonObject,
}

impl JwtHeader {
    /// A header with only the `alg` parameter set.
    pub fn new(alg: SigningAlgorithm) -> Self {
        Self {
            alg: alg.to_string(),
            typ: None,
            kid: None,
            jwk: None,
            x5c: None,
            x5u: None,
            extra: JsonObject::new(),
        }
    }

    /// Set the `typ` parameter.
    pub fn with_typ(mut self, typ: impl Into<String>) -> Self {
        self.typ = Some(typ.into());
        self
    }

    /// Set the `kid` parameter.
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Embed a public key as the `jwk` parameter.
    pub fn with_jwk(mut self, jwk: JwkPublic) -> Self {
        self.jwk = Some(jwk);
        self
    }

    /// The parsed `alg` parameter.
    ///
    /// Fails with [`JwtError::UnsupportedAlgorithm`] for anything other than
    /// `RS256`, `ES256` and `ES256K`.
    pub fn algorithm(&self) -> Result<SigningAlgorithm, Error<JwtError>> {
        self.alg.parse()
    }
}
