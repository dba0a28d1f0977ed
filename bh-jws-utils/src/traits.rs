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

use bherror::Error;
use serde::{Deserialize, Serialize};

use crate::{error::JwtError, utils::BoxError, JwkPublic};

/// Signature algorithms supported by the wallet.
///
/// These are the JOSE asymmetric algorithms credential issuers and verifiers
/// in the wild use with the wallet: RSA with PKCS#1 v1.5 padding, and ECDSA on
/// the NIST P-256 and the `secp256k1` curves.
///
/// For more details see [RFC7518] and [RFC8812].
///
/// [RFC7518]: https://datatracker.ietf.org/doc/html/rfc7518#section-3.1
/// [RFC8812]: https://datatracker.ietf.org/doc/html/rfc8812#section-3.2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SigningAlgorithm {
    /// ECDSA over P-256 with SHA-256
    Es256,
    /// ECDSA over secp256k1 with SHA-256
    Es256k,
    /// RSASSA-PKCS1-v1_5 with SHA-256
    Rs256,
}

/// JWS `"alg"` header parameter value for digital signature algorithm
/// **ECDSA using P-256 and SHA-256**, as specified in [RFC7518].
///
/// [RFC7518]: https://datatracker.ietf.org/doc/html/rfc7518#section-3.1
pub const SIGNING_ALG_ES256: &str = "ES256";
/// JWS `"alg"` header parameter value for digital signature algorithm
/// **ECDSA using secp256k1 and SHA-256**, as specified in [RFC8812].
///
/// [RFC8812]: https://datatracker.ietf.org/doc/html/rfc8812#section-3.2
pub const SIGNING_ALG_ES256K: &str = "ES256K";
/// JWS `"alg"` header parameter value for digital signature algorithm
/// **RSASSA-PKCS1-v1_5 using SHA-256**, as specified in [RFC7518].
///
/// [RFC7518]: https://datatracker.ietf.org/doc/html/rfc7518#section-3.1
pub const SIGNING_ALG_RS256: &str = "RS256";

impl FromStr for SigningAlgorithm {
    type Err = Error<JwtError>;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            SIGNING_ALG_ES256 => Ok(SigningAlgorithm::Es256),
            SIGNING_ALG_ES256K => Ok(SigningAlgorithm::Es256k),
            SIGNING_ALG_RS256 => Ok(SigningAlgorithm::Rs256),
            _ => Err(Error::root(JwtError::UnsupportedAlgorithm(value.to_string()))),
        }
    }
}

impl TryFrom<String> for SigningAlgorithm {
    type Error = Error<JwtError>;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SigningAlgorithm> for String {
    fn from(value: SigningAlgorithm) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for SigningAlgorithm {
    // This trait requires `fmt` with this exact signature.
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let message = match self {
            Self::Es256 => SIGNING_ALG_ES256,
            Self::Es256k => SIGNING_ALG_ES256K,
            Self::Rs256 => SIGNING_ALG_RS256,
        };
        write!(f, "{}", message)
    }
}

/// An external signing backend, to be used for computing a JWS signature.
///
/// The output of the signer, regardless of the algorithm, must be a valid **JWS signature**.
/// See step 5 in [section 5.1 of RFC7515](https://www.rfc-editor.org/rfc/rfc7515.html#section-5.1)
/// for more information.
pub trait Signer {
    /// The algorithm this signer uses. Must be a constant function.
    fn algorithm(&self) -> SigningAlgorithm;

    /// Produce a JWS signature as a byte array, not yet base64url-encoded.
    ///
    /// The `message` is guaranteed to be a valid JWS signing input.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, BoxError>;

    /// The public counterpart of the signing key, as a JWK.
    fn public_jwk(&self) -> Result<JwkPublic, BoxError>;

    /// The `kid` parameter of the associated JWK, if any. It is used as the
    /// `kid` header parameter when signing a JWT.
    ///
    /// See [section 4.5 of RFC7517](https://datatracker.ietf.org/doc/html/rfc7517#section-4.5)
    /// for more details.
    fn kid(&self) -> Option<&str> {
        None
    }
}

/// An external backend for signature verification, to be used for verifying
/// JWS signatures.
pub trait SignatureVerifier: Sync {
    /// The algorithm used for the signature verification.
    fn algorithm(&self) -> SigningAlgorithm;

    /// Verifies the signature of the message, against the provided public key.
    ///
    /// # Return
    /// Method returns `Ok(true)` if the signature if valid for the given
    /// message, `Ok(false)` if it isn't (but there was no issue with the
    /// verifier itself), and `Err(_)` when the verifier itself encounters an
    /// error for any other reason.
    fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &JwkPublic,
    ) -> Result<bool, BoxError>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn signing_algorithms_serialize_correctly() {
        struct TestCase<'a> {
            alg: SigningAlgorithm,
            alg_str: &'a str,
        }

        let test_cases: &[TestCase] = &[
            TestCase {
                alg: SigningAlgorithm::Es256,
                alg_str: SIGNING_ALG_ES256,
            },
            TestCase {
                alg: SigningAlgorithm::Es256k,
                alg_str: SIGNING_ALG_ES256K,
            },
            TestCase {
                alg: SigningAlgorithm::Rs256,
                alg_str: SIGNING_ALG_RS256,
            },
        ];

        for TestCase { alg, alg_str } in test_cases {
            let serialized = serde_json::to_string(alg).unwrap();
            let expected = format!("\"{}\"", alg_str);
            assert_eq!(expected, serialized);

            let deserialized_serde: SigningAlgorithm = serde_json::from_str(&expected).unwrap();
            assert_eq!(alg, &deserialized_serde);

            let deserialized_str = SigningAlgorithm::from_str(alg_str).unwrap();
            assert_eq!(alg, &deserialized_str);
        }
    }

    #[test]
    fn unknown_algorithms_are_unsupported() {
        for alg in ["none", "HS256", "ES384", "es256", ""] {
            let error = SigningAlgorithm::from_str(alg).unwrap_err();
            assert_eq!(error.error, JwtError::UnsupportedAlgorithm(alg.to_owned()));
        }
    }
}
