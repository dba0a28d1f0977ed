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

use std::str::FromStr;

use bh_jws_utils::base64_url_encode;
use bherror::Error;
use serde::{Deserialize, Serialize};

use crate::DecodingError;

/// The hash algorithm identifier for `SHA-256` as specified in the
/// "*Hash Name String*" column of the *IANA* [Named Information Hash Algorithm
/// Registry].
///
/// [Named Information Hash Algorithm Registry]: https://www.iana.org/assignments/named-information/named-information.xhtml
pub const SHA_256_ALG_NAME: &str = "sha-256";

/// The algorithm used for computing disclosure digests, as named by the
/// `_sd_alg` claim.
///
/// The default algorithm is `SHA-256`, as specified [here].  It is also the
/// only one supported.
///
/// [here]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-07#name-hash-function-claim
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashingAlgorithm {
    /// SHA-256 algorithm for hashing.
    #[serde(rename = "sha-256")]
    #[default]
    Sha256,
}

impl HashingAlgorithm {
    /// Returns the string value of the algorithm, as used in `_sd_alg`.
    pub fn as_str(&self) -> &'static str {
        match self {
            HashingAlgorithm::Sha256 => SHA_256_ALG_NAME,
        }
    }

    /// Computes the hash digest of the given `input`.
    pub fn digest(&self, input: &[u8]) -> Vec<u8> {
        match self {
            HashingAlgorithm::Sha256 => openssl::sha::sha256(input).to_vec(),
        }
    }

    /// Returns the `base64url`-encoded hash digest of the given `input`.
    pub fn base64_url_digest(&self, input: &[u8]) -> String {
        base64_url_encode(self.digest(input))
    }
}

impl FromStr for HashingAlgorithm {
    type Err = bherror::Error<DecodingError>;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            SHA_256_ALG_NAME => Ok(Self::Sha256),
            _ => Err(Error::root(DecodingError::InvalidHashAlgorithmName(
                value.to_owned(),
            ))),
        }
    }
}

impl std::fmt::Display for HashingAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_sha_256_is_supported() {
        assert_eq!("sha-256".parse::<HashingAlgorithm>().unwrap(), HashingAlgorithm::Sha256);

        for name in ["sha-384", "SHA-256", "sha256", ""] {
            assert_eq!(
                name.parse::<HashingAlgorithm>().unwrap_err().error,
                DecodingError::InvalidHashAlgorithmName(name.to_owned())
            );
        }
    }

    #[test]
    fn disclosure_digest() {
        // https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-07#section-5.2.3
        let disclosure = "WyI2cU1RdlJMNWhhaiIsICJmYW1pbHlfbmFtZSIsICJNw7ZiaXVzIl0";

        assert_eq!(
            HashingAlgorithm::Sha256.base64_url_digest(disclosure.as_bytes()),
            "uutlBuYeMDyjLLTpf6Jxi7yNkEF35jdyWMn9U7b_RYY"
        );
    }
}
