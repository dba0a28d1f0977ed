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

//! Compact JWS codec: decoding, signature verification and signing.

use bherror::{
    traits::{ForeignBoxed as _, ForeignError as _},
    Error, Result,
};
use serde_json::Value;

use crate::{
    error::JwtError,
    utils::{base64_url_decode, base64_url_encode, construct_jws_payload},
    HttpGetClient, JsonObject, JwkPublic, JwtHeader, KeyResolver, Signer, SigningAlgorithm,
};

/// Claims of a JWT whose signature has been verified.
pub type VerifiedClaims = JsonObject;

/// A decoded, but not necessarily verified, compact JWS with a JSON object
/// payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Jwt {
    header: JwtHeader,
    payload: JsonObject,
    signature: Vec<u8>,
    signing_input: String,
}

impl Jwt {
    /// Decode a compact JWS.
    ///
    /// The token must consist of exactly three `base64url` segments, the
    /// first two of which decode to a JSON header with an `alg` parameter and a
    /// JSON object payload, respectively.  No signature check is done here.
    pub fn decode(compact: &str) -> Result<Self, JwtError> {
        let segments: Vec<&str> = compact.split('.').collect();
        let [header_b64, payload_b64, signature_b64] = segments[..] else {
            return Err(Error::root(JwtError::MalformedToken(format!(
                "expected 3 segments, found {}",
                segments.len()
            ))));
        };

        let header_bytes = base64_url_decode(header_b64)
            .foreign_err(|| JwtError::MalformedToken("header is not base64url".to_owned()))?;
        let header: JwtHeader = serde_json::from_slice(&header_bytes)
            .foreign_err(|| JwtError::MalformedToken("invalid header".to_owned()))?;

        let payload_bytes = base64_url_decode(payload_b64)
            .foreign_err(|| JwtError::MalformedToken("payload is not base64url".to_owned()))?;
        let payload: JsonObject = serde_json::from_slice(&payload_bytes).foreign_err(|| {
            JwtError::MalformedToken("payload is not a JSON object".to_owned())
        })?;

        let signature = base64_url_decode(signature_b64)
            .foreign_err(|| JwtError::MalformedToken("signature is not base64url".to_owned()))?;

        Ok(Self {
            header,
            payload,
            signature,
            signing_input: construct_jws_payload(header_b64, payload_b64),
        })
    }

    /// The JOSE header.
    pub fn header(&self) -> &JwtHeader {
        &self.header
    }

    /// The claims, regardless of whether they were verified.
    pub fn payload(&self) -> &JsonObject {
        &self.payload
    }

    /// Consume the token, returning its claims.
    pub fn into_payload(self) -> JsonObject {
        self.payload
    }

    /// The raw signature bytes.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// The `<header>.<payload>` part of the token, exactly as received.
    pub fn signing_input(&self) -> &str {
        &self.signing_input
    }

    /// Verify the signature with a known public key.
    ///
    /// The header `alg` must be supported and must be the algorithm the key is
    /// meant for, otherwise [`JwtError::UnsupportedAlgorithm`] is returned.
    pub fn verify_with_key(&self, public_key: &JwkPublic) -> Result<&VerifiedClaims, JwtError> {
        let alg = self.header.algorithm()?;
        verify_signature(
            alg,
            self.signing_input.as_bytes(),
            &self.signature,
            public_key,
        )?;
        Ok(&self.payload)
    }

    /// Resolve the verification key from the header and verify the signature
    /// with it.
    ///
    /// See [`KeyResolver::resolve`] for the order in which key sources are
    /// tried.
    pub async fn verify<C: HttpGetClient>(
        &self,
        resolver: &KeyResolver<C>,
    ) -> Result<&VerifiedClaims, JwtError> {
        // Checked before any network round trip.
        self.header.algorithm()?;

        let public_key = resolver.resolve(&self.header).await?;
        self.verify_with_key(&public_key)
    }
}

/// Verify a JWS `signature` over `signing_input` with `public_key`.
pub fn verify_signature(
    alg: SigningAlgorithm,
    signing_input: &[u8],
    signature: &[u8],
    public_key: &JwkPublic,
) -> Result<(), JwtError> {
    let Some(key_alg) = crate::jwk_signing_algorithm(public_key) else {
        return Err(Error::root(JwtError::UnsupportedAlgorithm(format!(
            "{alg} with a key of unsupported type"
        ))));
    };
    if key_alg != alg {
        return Err(Error::root(JwtError::UnsupportedAlgorithm(format!(
            "{alg} with a {key_alg} key"
        ))));
    }
    if let Some(jwk_alg) = public_key.get("alg").and_then(Value::as_str) {
        if jwk_alg != alg.to_string() {
            return Err(Error::root(JwtError::UnsupportedAlgorithm(format!(
                "{alg} with a key restricted to {jwk_alg}"
            ))));
        }
    }

    let verified = crate::verifier_for(alg)
        .verify(signing_input, signature, public_key)
        .foreign_boxed_err(|| JwtError::Verification)?;

    if !verified {
        return Err(Error::root(JwtError::Verification));
    }
    Ok(())
}

/// Sign `claims` into a compact JWS.
///
/// The `alg` of the `header` is overwritten with the signer's algorithm, and
/// the signer's `kid`, if any, is used when the header doesn't set one.
pub fn sign_jwt<S: Signer + ?Sized>(
    signer: &S,
    mut header: JwtHeader,
    claims: &JsonObject,
) -> Result<String, JwtError> {
    header.alg = signer.algorithm().to_string();
    if header.kid.is_none() {
        header.kid = signer.kid().map(ToOwned::to_owned);
    }

    let header = serde_json::to_vec(&header).foreign_err(|| JwtError::Signing)?;
    let claims = serde_json::to_vec(claims).foreign_err(|| JwtError::Signing)?;
    let signing_input = construct_jws_payload(&base64_url_encode(header), &base64_url_encode(claims));

    let signature = signer
        .sign(signing_input.as_bytes())
        .foreign_boxed_err(|| JwtError::Signing)?;

    Ok(construct_jws_payload(
        &signing_input,
        &base64_url_encode(signature),
    ))
}

/// Decode a compact JWS and verify it with a known public key in one go.
pub fn decode_and_verify(compact: &str, public_key: &JwkPublic) -> Result<Jwt, JwtError> {
    let jwt = Jwt::decode(compact)?;
    jwt.verify_with_key(public_key)?;
    Ok(jwt)
}
