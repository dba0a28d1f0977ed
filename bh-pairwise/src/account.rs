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

use bh_jws_utils::{base64_url_encode, jwk_sha256_thumbprint_bytes, EcCurve, EcSigner, JwkPublic};
use bherror::{
    traits::{ErrorContext as _, PropagateError as _},
    Result,
};

use crate::PairwiseError;

/// A holder identity shared with a single relying party.
///
/// The key is the hardened child `m/index'` of the wallet's master key, so an
/// account can always be re-derived from its index.
#[derive(Debug)]
pub struct Account {
    index: u32,
    signer: EcSigner,
    public_jwk: JwkPublic,
    thumbprint: String,
    correlation_hash: u32,
}

impl Account {
    pub(crate) fn new(index: u32, secret_scalar: &[u8]) -> Result<Self, PairwiseError> {
        let signer = EcSigner::from_secret_scalar(EcCurve::P256, secret_scalar, None)
            .with_err(|| PairwiseError::Derivation)
            .ctx(|| format!("account {index}"))?;
        let public_jwk = signer.public_jwk().with_err(|| PairwiseError::Derivation)?;

        let digest =
            jwk_sha256_thumbprint_bytes(&public_jwk).with_err(|| PairwiseError::Derivation)?;
        let correlation_hash = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);

        Ok(Self {
            index,
            signer,
            public_jwk,
            thumbprint: base64_url_encode(digest),
            correlation_hash,
        })
    }

    /// The derivation index of the account.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The ES256 signer of the account key.
    pub fn signer(&self) -> &EcSigner {
        &self.signer
    }

    /// The public key of the account.
    pub fn public_jwk(&self) -> &JwkPublic {
        &self.public_jwk
    }

    /// The account key as a JWK including the private `d` member.
    ///
    /// Treat the output as secret material.
    pub fn private_jwk(&self) -> Result<JwkPublic, PairwiseError> {
        self.signer
            .private_jwk()
            .with_err(|| PairwiseError::Derivation)
    }

    /// The RFC 7638 SHA-256 thumbprint of the public key, `base64url`-encoded.
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    /// A short value users can compare to recognize the account.
    ///
    /// It is the first four bytes of the thumbprint digest, read as a
    /// big-endian integer.  It is meant for display only.
    pub fn correlation_hash(&self) -> u32 {
        self.correlation_hash
    }
}
