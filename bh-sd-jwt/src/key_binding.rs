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

use bh_jws_utils::{sign_jwt, JsonObject, Jwt, JwkPublic, JwtError, JwtHeader, Signer, SigningAlgorithm};
use bherror::{traits::PropagateError as _, Error};
use serde_json::Value;

use crate::{HashingAlgorithm, KeyBindingError, Result};

/// The required value of the Key Binding `JWT` header `typ` element, as
/// specified [here].
///
/// [here]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-07#section-5.3-3.1.2.1
pub const KB_JWT_HEADER_TYP: &str = "kb+jwt";

/// A maximum difference of the time when the Key Binding `JWT` was received by
/// the Verifier and the time when it was created by the Holder, expressed in
/// seconds.
pub const KB_JWT_EXPIRATION_OFFSET: u64 = 5 * 60;

/// Claim carrying the digest over the presented SD-JWT.
pub const SD_HASH_CLAIM: &str = "_sd_hash";

/// The challenge of the relying party. It ensures the freshness of the key
/// binding signature, as well as the proper audience.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindingChallenge {
    /// The intended receiver of the Key Binding `JWT`, i.e. the verifier's
    /// `client_id`.
    pub aud: String,
    /// A value used to ensure the freshness of the signature.
    pub nonce: String,
}

/// Computes the `_sd_hash` over the presented SD-JWT without its Key Binding
/// JWT, i.e. over `<issuer-jwt>~<disclosure>~...~<disclosure>~`.
pub fn sd_hash(hashing_algorithm: HashingAlgorithm, presentation: &str) -> String {
    hashing_algorithm.base64_url_digest(presentation.as_bytes())
}

/// The header of a Key Binding JWT signed with `alg`.
pub fn key_binding_header(alg: SigningAlgorithm) -> JwtHeader {
    JwtHeader::new(alg).with_typ(KB_JWT_HEADER_TYP)
}

/// The claims of a Key Binding JWT.
pub fn key_binding_claims(challenge: &KeyBindingChallenge, iat: u64, sd_hash: String) -> JsonObject {
    let mut claims = JsonObject::new();
    claims.insert("aud".to_owned(), challenge.aud.clone().into());
    claims.insert("iat".to_owned(), iat.into());
    claims.insert("nonce".to_owned(), challenge.nonce.clone().into());
    claims.insert(SD_HASH_CLAIM.to_owned(), sd_hash.into());
    claims
}

/// Sign a Key Binding JWT over the `presentation` (which must end with `~`)
/// with the holder's `signer`.
pub fn sign_key_binding_jwt<S: Signer + ?Sized>(
    presentation: &str,
    hashing_algorithm: HashingAlgorithm,
    challenge: &KeyBindingChallenge,
    iat: u64,
    signer: &S,
) -> Result<String, KeyBindingError> {
    let claims = key_binding_claims(challenge, iat, sd_hash(hashing_algorithm, presentation));

    sign_jwt(signer, key_binding_header(signer.algorithm()), &claims)
        .with_err(|| KeyBindingError::Signing)
}

/// A decoded Key Binding JWT.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBindingJwt(Jwt);

impl KeyBindingJwt {
    /// Decode the Key Binding JWT, without verifying it.
    pub fn decode(compact: &str) -> Result<Self, KeyBindingError> {
        Jwt::decode(compact)
            .with_err(|| KeyBindingError::InvalidSyntax)
            .map(Self)
    }

    /// The underlying JWT.
    pub fn jwt(&self) -> &Jwt {
        &self.0
    }

    /// Verify the Key Binding JWT against the holder's public key and the
    /// expected challenge, returning its claims.
    ///
    /// The `expected_sd_hash` is the [`sd_hash`] of the presentation the Key
    /// Binding JWT was attached to.  The `iat` may be at most
    /// [`KB_JWT_EXPIRATION_OFFSET`] seconds away from `current_time`.
    pub fn verify(
        &self,
        holder_public_key: &JwkPublic,
        challenge: &KeyBindingChallenge,
        expected_sd_hash: &str,
        current_time: u64,
    ) -> Result<&JsonObject, KeyBindingError> {
        let typ = self.0.header().typ.as_deref().unwrap_or_default();
        if typ != KB_JWT_HEADER_TYP {
            return Err(Error::root(KeyBindingError::InvalidType(typ.to_owned())));
        }

        let claims = self
            .0
            .verify_with_key(holder_public_key)
            .match_err(|error| match error {
                JwtError::MalformedToken(_) => KeyBindingError::InvalidSyntax,
                _ => KeyBindingError::InvalidSignature,
            })?;

        let iat = claims
            .get("iat")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::root(KeyBindingError::InvalidClaim("iat")))?;
        if iat.abs_diff(current_time) > KB_JWT_EXPIRATION_OFFSET {
            return Err(Error::root(KeyBindingError::Expired(
                iat,
                KB_JWT_EXPIRATION_OFFSET,
                current_time,
            )));
        }

        let nonce = string_claim(claims, "nonce")?;
        if nonce != challenge.nonce {
            return Err(Error::root(KeyBindingError::InvalidNonce(nonce.to_owned())));
        }

        let aud = string_claim(claims, "aud")?;
        if aud != challenge.aud {
            return Err(Error::root(KeyBindingError::InvalidAud(
                aud.to_owned(),
                challenge.aud.clone(),
            )));
        }

        let provided_sd_hash = string_claim(claims, SD_HASH_CLAIM)?;
        if provided_sd_hash != expected_sd_hash {
            return Err(Error::root(KeyBindingError::InvalidSdHash(
                expected_sd_hash.to_owned(),
                provided_sd_hash.to_owned(),
            )));
        }

        Ok(claims)
    }
}

fn string_claim<'a>(claims: &'a JsonObject, name: &'static str) -> Result<&'a str, KeyBindingError> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::root(KeyBindingError::InvalidClaim(name)))
}
