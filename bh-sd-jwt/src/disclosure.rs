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

use std::fmt;

use bh_jws_utils::{base64_url_decode, base64_url_encode};
use bherror::{
    traits::{ErrorContext as _, ForeignError as _},
    Error,
};
use serde_json::Value;

use crate::{DecodingError, HashingAlgorithm, Result};

/// A disclosure of a single claim, in both parsed form and the original
/// serialized form.
///
/// The serialized form is kept verbatim, since digests are computed over the
/// exact string the issuer produced.
#[derive(Debug, PartialEq, Clone)]
pub struct Disclosure {
    data: DisclosureData,
    serialized: String,
}

/// Parsed form of a disclosure.
#[derive(Debug, PartialEq, Clone)]
pub enum DisclosureData {
    /// An object property, i.e. `[salt, name, value]`.
    KeyValue {
        /// Disclosure hash salt.
        salt: String,
        /// Key (claim name) of the disclosure.
        key: String,
        /// Value of the disclosure.
        value: Value,
    },
    /// An array element, i.e. `[salt, value]`.
    ArrayElement {
        /// Disclosure hash salt.
        salt: String,
        /// Value of the disclosure.
        value: Value,
    },
}

impl Disclosure {
    /// Construct a new [`Disclosure`] from the given `salt`, `claim_name` and
    /// `claim_value`.
    ///
    /// A disclosure without a claim name discloses an array element.
    pub fn new(salt: String, claim_name: Option<String>, claim_value: Value) -> Self {
        // `Value`'s `Display` is compact JSON with proper string escaping.
        let salt_json = Value::from(salt.as_str());
        let input = match &claim_name {
            Some(name) => format!("[{}, {}, {}]", salt_json, Value::from(name.as_str()), claim_value),
            None => format!("[{}, {}]", salt_json, claim_value),
        };

        let data = match claim_name {
            Some(key) => DisclosureData::KeyValue {
                salt,
                key,
                value: claim_value,
            },
            None => DisclosureData::ArrayElement {
                salt,
                value: claim_value,
            },
        };

        Self {
            data,
            serialized: base64_url_encode(input),
        }
    }

    /// Parse a `base64url`-encoded disclosure.
    pub fn parse(serialized: &str) -> Result<Self, DecodingError> {
        serialized.to_owned().try_into()
    }

    /// The parsed disclosure.
    pub fn data(&self) -> &DisclosureData {
        &self.data
    }

    /// Disclosure data value.
    pub fn value(&self) -> &Value {
        match &self.data {
            DisclosureData::KeyValue { value, .. } => value,
            DisclosureData::ArrayElement { value, .. } => value,
        }
    }

    /// Disclosure data key, i.e. claim name.
    pub fn claim_name(&self) -> Option<&str> {
        match &self.data {
            DisclosureData::KeyValue { key, .. } => Some(key),
            DisclosureData::ArrayElement { .. } => None,
        }
    }

    /// Disclosure salt.
    pub fn salt(&self) -> &str {
        match &self.data {
            DisclosureData::KeyValue { salt, .. } => salt,
            DisclosureData::ArrayElement { salt, .. } => salt,
        }
    }

    /// The digest of the disclosure, as it appears in `_sd` arrays and `...`
    /// array elements.
    pub fn digest(&self, hashing_algorithm: HashingAlgorithm) -> String {
        hashing_algorithm.base64_url_digest(self.serialized.as_bytes())
    }

    /// Serialized form of [`Self`]
    pub fn as_str(&self) -> &str {
        &self.serialized
    }

    /// Serialize [`Self`] into an owned [`String`].
    pub fn into_string(self) -> String {
        self.serialized
    }
}

impl TryFrom<String> for Disclosure {
    type Error = Error<DecodingError>;

    fn try_from(serialized: String) -> std::result::Result<Self, Self::Error> {
        let decoded = base64_url_decode(&serialized)
            .foreign_err(|| {
                DecodingError::InvalidDisclosure("provided string is not base64url".to_owned())
            })
            .ctx(|| serialized.clone())?;

        let array: Vec<Value> = serde_json::from_slice(&decoded)
            .foreign_err(|| {
                DecodingError::InvalidDisclosure("decoded string is not a JSON array".to_owned())
            })
            .ctx(|| serialized.clone())?;

        let data = match <[Value; 3]>::try_from(array) {
            Ok([salt, key, value]) => key_value_data(salt, key, value),
            Err(array) => match <[Value; 2]>::try_from(array) {
                Ok([salt, value]) => array_element_data(salt, value),
                Err(array) => Err(Error::root(DecodingError::InvalidDisclosure(format!(
                    "deserialized disclosure array has invalid length {}",
                    array.len(),
                )))),
            },
        }
        .ctx(|| serialized.clone())?;

        Ok(Self { data, serialized })
    }
}

fn key_value_data(salt: Value, key: Value, value: Value) -> Result<DisclosureData, DecodingError> {
    let Value::String(salt) = salt else {
        return Err(Error::root(DecodingError::InvalidDisclosure(
            "salt value is not a string".to_owned(),
        )));
    };
    let Value::String(key) = key else {
        return Err(Error::root(DecodingError::InvalidDisclosure(
            "key value is not a string".to_owned(),
        )));
    };

    Ok(DisclosureData::KeyValue { salt, key, value })
}

fn array_element_data(salt: Value, value: Value) -> Result<DisclosureData, DecodingError> {
    let Value::String(salt) = salt else {
        return Err(Error::root(DecodingError::InvalidDisclosure(
            "salt value is not a string".to_owned(),
        )));
    };

    Ok(DisclosureData::ArrayElement { salt, value })
}

impl fmt::Display for Disclosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialized)
    }
}
