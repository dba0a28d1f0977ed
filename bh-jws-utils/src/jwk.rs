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

use std::collections::HashSet;

use bherror::{traits::ForeignError as _, Error};
use openssl::sha::sha256;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{utils::base64_url_encode, FormatError};

/// A JSON object meant to represent a public JWK.
///
/// Since this is a type alias, no aspects of the schema are enforced; this is
/// left to any end-consumers of the public key, such as
/// [`SignatureVerifier`](crate::SignatureVerifier).
pub type JwkPublic = Map<String, Value>;

/// Models JWK Set. A JSON object that represents a set of JWKs.
///
/// If any of the JWKs in the JWK Set have parameter `kid` then all of them
/// should have `kid` parameter and different keys within the JWK Set SHOULD use
/// distinct `kid` values.
///
/// NOTE: The notion of different keys can be somewhat subtle. The [RFC] gives
/// the following example - different keys might use the same `kid` value if
/// they have different "kty" (key type) values but are considered to be
/// equivalent alternatives by the application using them. This implementation
/// currently does not support this example, uniqueness of keys is checked if
/// they contain `kid` values and equality between them is checked using only
/// `kid` values.
///
/// For more details see [RFC7517][RFC].
///
/// [RFC]: https://datatracker.ietf.org/doc/html/rfc7517#section-5
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(try_from = "JwkSetUnverified")]
pub struct JwkSet {
    /// Underlying representation of the JWK Set.
    pub keys: Vec<JwkPublic>,
}

impl JwkSet {
    /// Create empty `JwkSet`.
    pub fn empty() -> Self {
        JwkSet { keys: vec![] }
    }

    /// Find the key with the given `kid` parameter.
    pub fn find_by_kid(&self, kid: &str) -> Option<&JwkPublic> {
        self.keys
            .iter()
            .find(|jwk| jwk.get("kid").and_then(Value::as_str) == Some(kid))
    }
}

/// Compute the _JWK SHA-256 Thumbprint_ of the provided public JWK, returned
/// as raw digest bytes.
///
/// The thumbprint is computed over the required members of the key type only,
/// in lexicographic order and without whitespace, as per [RFC 7638][1]. Member
/// order is fixed here, as the iteration order of a [`Map`] depends on the
/// `preserve_order` feature of [`serde_json`].
///
/// [1]: <https://www.rfc-editor.org/rfc/rfc7638#section-3.2>
pub fn jwk_sha256_thumbprint_bytes(jwk: &JwkPublic) -> bherror::Result<[u8; 32], FormatError> {
    let kty = required_member(jwk, "kty")?;

    let members: &[&str] = match kty {
        "EC" => &["crv", "kty", "x", "y"],
        "RSA" => &["e", "kty", "n"],
        "OKP" => &["crv", "kty", "x"],
        _ => {
            return Err(Error::root(FormatError::JwkParsingFailed(format!(
                "unsupported key type {kty}"
            ))))
        }
    };

    let mut canonical = String::from("{");
    for (i, member) in members.iter().enumerate() {
        if i > 0 {
            canonical.push(',');
        }
        let value = required_member(jwk, member)?;
        let value = serde_json::to_string(value)
            .foreign_err(|| FormatError::JwkParsingFailed("unserializable member".to_owned()))?;
        canonical.push_str(&format!("\"{member}\":{value}"));
    }
    canonical.push('}');

    Ok(sha256(canonical.as_bytes()))
}

/// Compute the _JWK SHA-256 Thumbprint_ of the provided public JWK, as a
/// `base64url`-encoded string without padding.
pub fn jwk_sha256_thumbprint(jwk: &JwkPublic) -> bherror::Result<String, FormatError> {
    jwk_sha256_thumbprint_bytes(jwk).map(base64_url_encode)
}

/// Returns `jwk` without its private members.
///
/// Useful when a JWK of unknown provenance is about to be published, e.g. in
/// a JOSE header.
pub fn strip_private_members(jwk: &JwkPublic) -> JwkPublic {
    const PRIVATE_MEMBERS: &[&str] = &["d", "p", "q", "dp", "dq", "qi", "oth", "k"];

    jwk.iter()
        .filter(|(name, _)| !PRIVATE_MEMBERS.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn required_member<'a>(jwk: &'a JwkPublic, member: &str) -> bherror::Result<&'a str, FormatError> {
    jwk.get(member).and_then(Value::as_str).ok_or_else(|| {
        Error::root(FormatError::JwkParsingFailed(format!(
            "missing \"{member}\" member"
        )))
    })
}

/// This is a "shadow" type whose sole purpose of existence is to be able to
/// verify validity of deserialized [JwkSet] without writing deserialization
/// manually. This is achieved with misuse of `TryFrom` trait. For more info see
/// this [github issue].
///
/// [github issue]: https://github.com/serde-rs/serde/issues/642
#[derive(Deserialize, Debug)]
struct JwkSetUnverified {
    keys: Vec<JwkPublic>,
}

impl TryFrom<JwkSetUnverified> for JwkSet {
    type Error = &'static str;

    fn try_from(value: JwkSetUnverified) -> std::result::Result<Self, Self::Error> {
        let keys = value.keys;
        let jwk_with_kid_cnt = keys.iter().filter(|jwk| jwk.contains_key("kid")).count();

        if jwk_with_kid_cnt == 0 {
            return Ok(JwkSet { keys });
        }
        if jwk_with_kid_cnt != keys.len() {
            return Err("Some of the provided JWKs contain kid parameter values and some don't");
        }

        let mut uniq = HashSet::new();
        for key in keys.iter() {
            let kid = key
                .get("kid")
                .and_then(Value::as_str)
                .ok_or("JWK contains a `kid` parameter that is not a string")?;
            if !uniq.insert(kid) {
                return Err("Provided JWKs contain duplicate kid parameter values");
            }
        }

        Ok(JwkSet { keys })
    }
}
