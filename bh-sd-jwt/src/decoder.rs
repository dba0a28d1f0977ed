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

//! Reconstruction of the claims of an SD-JWT out of the issuer-signed payload
//! and the disclosures.

use std::collections::{HashMap, HashSet};

use bh_jws_utils::JsonObject;
use bh_pex::ClaimPath;
use bherror::Error;
use serde_json::Value;

use crate::{
    utils::{ELLIPSIS, RESERVED_CLAIM_NAMES, SD, SD_ALG},
    DecodingError, Disclosure, DisclosureData, HashingAlgorithm, Result,
};

/// Claims reconstructed from an SD-JWT.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedClaims {
    /// The claims with every disclosure substituted in, and with the `_sd`,
    /// `_sd_alg` and undisclosed `...` entries removed.
    pub claims: JsonObject,
    /// The location in [`DecodedClaims::claims`] of each disclosure, in the
    /// order of the disclosures.
    pub disclosure_paths: Vec<ClaimPath>,
}

/// Substitute the `disclosures` into the issuer-signed `payload`.
///
/// Fails if any disclosure is malformed, referenced from the wrong kind of
/// container, referenced more than once, or not referenced at all.  Digests
/// without a matching disclosure stand for undisclosed claims and are dropped.
pub(crate) fn decode_disclosed_claims(
    payload: &JsonObject,
    disclosures: &[Disclosure],
    hashing_algorithm: HashingAlgorithm,
) -> Result<DecodedClaims, DecodingError> {
    let mut by_digest = HashMap::with_capacity(disclosures.len());
    for (index, disclosure) in disclosures.iter().enumerate() {
        if by_digest
            .insert(disclosure.digest(hashing_algorithm), index)
            .is_some()
        {
            return Err(Error::root(DecodingError::DisclosureDigestCollision));
        }
    }

    let mut decoder = Decoder {
        disclosures,
        by_digest,
        processed_digests: HashSet::new(),
        paths: vec![None; disclosures.len()],
    };

    let claims = decoder.decode_object(payload, &ClaimPath::root(), true)?;
    let disclosure_paths = decoder.finish()?;

    Ok(DecodedClaims {
        claims,
        disclosure_paths,
    })
}

struct Decoder<'d> {
    disclosures: &'d [Disclosure],
    by_digest: HashMap<String, usize>,
    processed_digests: HashSet<String>,
    paths: Vec<Option<ClaimPath>>,
}

impl<'d> Decoder<'d> {
    /// Look up the disclosure with the given digest, marking both as used.
    fn take(&mut self, digest: &Value) -> Result<Option<(usize, &'d Disclosure)>, DecodingError> {
        let Value::String(digest) = digest else {
            return Err(Error::root(DecodingError::MalformedDigest(format!(
                "digest is not a string: {digest}"
            ))));
        };

        if !self.processed_digests.insert(digest.clone()) {
            return Err(Error::root(DecodingError::DuplicateDigest(digest.clone())));
        }

        let disclosures = self.disclosures;
        Ok(self
            .by_digest
            .remove(digest)
            .map(|index| (index, &disclosures[index])))
    }

    fn decode_object(
        &mut self,
        object: &JsonObject,
        path: &ClaimPath,
        top_level: bool,
    ) -> Result<JsonObject, DecodingError> {
        let mut decoded = JsonObject::new();

        for (key, value) in object {
            if key == SD || (top_level && key == SD_ALG) {
                continue;
            }
            self.insert_claim(&mut decoded, key, value, path)?;
        }

        if let Some(digests) = object.get(SD) {
            let Value::Array(digests) = digests else {
                return Err(Error::root(DecodingError::MalformedDigest(format!(
                    "`{SD}` is not an array"
                ))));
            };

            for digest in digests {
                let Some((index, disclosure)) = self.take(digest)? else {
                    continue;
                };
                let DisclosureData::KeyValue { key, value, .. } = disclosure.data() else {
                    return Err(Error::root(DecodingError::MismatchedDisclosureFormat));
                };

                self.paths[index] = Some(path.key(key));
                self.insert_claim(&mut decoded, key, value, path)?;
            }
        }

        Ok(decoded)
    }

    fn insert_claim(
        &mut self,
        decoded: &mut JsonObject,
        key: &str,
        value: &Value,
        path: &ClaimPath,
    ) -> Result<(), DecodingError> {
        if let Some(reserved) = RESERVED_CLAIM_NAMES.iter().find(|name| **name == key) {
            return Err(Error::root(DecodingError::ReservedKeyName(*reserved)));
        }
        if decoded.contains_key(key) {
            return Err(Error::root(DecodingError::DuplicateClaimName(
                key.to_owned(),
            )));
        }

        let value = self.decode_value(value, &path.key(key))?;
        decoded.insert(key.to_owned(), value);
        Ok(())
    }

    fn decode_array(
        &mut self,
        array: &[Value],
        path: &ClaimPath,
    ) -> Result<Vec<Value>, DecodingError> {
        let mut decoded = Vec::with_capacity(array.len());

        for element in array {
            let digest = match element {
                Value::Object(object) if object.contains_key(ELLIPSIS) => {
                    if object.len() != 1 {
                        return Err(Error::root(DecodingError::MalformedDigest(format!(
                            "array element digest object has extra keys: {element}"
                        ))));
                    }
                    &object[ELLIPSIS]
                }
                _ => {
                    let element = self.decode_value(element, &path.index(decoded.len()))?;
                    decoded.push(element);
                    continue;
                }
            };

            let Some((index, disclosure)) = self.take(digest)? else {
                continue;
            };
            let DisclosureData::ArrayElement { value, .. } = disclosure.data() else {
                return Err(Error::root(DecodingError::MismatchedDisclosureFormat));
            };

            let element_path = path.index(decoded.len());
            let element = self.decode_value(value, &element_path)?;
            self.paths[index] = Some(element_path);
            decoded.push(element);
        }

        Ok(decoded)
    }

    fn decode_value(&mut self, value: &Value, path: &ClaimPath) -> Result<Value, DecodingError> {
        Ok(match value {
            Value::Object(object) => Value::Object(self.decode_object(object, path, false)?),
            Value::Array(array) => Value::Array(self.decode_array(array, path)?),
            _ => value.clone(),
        })
    }

    fn finish(self) -> Result<Vec<ClaimPath>, DecodingError> {
        if !self.by_digest.is_empty() {
            let mut unused: Vec<_> = self
                .by_digest
                .values()
                .map(|index| self.disclosures[*index].as_str())
                .collect();
            unused.sort_unstable();
            return Err(Error::root(DecodingError::UnusedDisclosures(
                unused.join(", "),
            )));
        }

        self.paths
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::root(DecodingError::UnusedDisclosures(String::new())))
    }
}
