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

use serde_json::Value;
use serde_json_path::{NormalizedPath, PathElement};

/// A segment of a [`ClaimPath`], either an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClaimPathSegment {
    /// Object key path segment.
    Key(String),
    /// Array index path segment.
    Index(usize),
}

impl From<&str> for ClaimPathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

impl From<usize> for ClaimPathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Location of a single node within a claims object, as a list of segments
/// to follow starting from the root.
///
/// Not to be confused with the JSONPath query syntax; a claim path always
/// points at exactly one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClaimPath(Vec<ClaimPathSegment>);

/// Utility macro for writing [`ClaimPath`] literals more ergonomically.
///
/// ```
/// let path = bh_pex::claim_path!["address", "street_address"];
/// assert_eq!(path.to_string(), "$.address.street_address");
///
/// let path = bh_pex::claim_path!["nationalities", 1usize];
/// assert_eq!(path.to_string(), "$.nationalities[1]");
/// ```
#[macro_export]
macro_rules! claim_path {
    [ $( $segment:expr ),* ] => {
        $crate::ClaimPath::from_segments(vec![ $( $crate::ClaimPathSegment::from($segment) ),* ])
    };
}

impl ClaimPath {
    /// The path of the root node.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Construct a path out of its segments.
    pub fn from_segments(segments: Vec<ClaimPathSegment>) -> Self {
        Self(segments)
    }

    /// The segments of the path.
    pub fn segments(&self) -> &[ClaimPathSegment] {
        &self.0
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The path of the object member `key` of this node.
    pub fn key(&self, key: &str) -> Self {
        self.child(ClaimPathSegment::Key(key.to_owned()))
    }

    /// The path of the array element `index` of this node.
    pub fn index(&self, index: usize) -> Self {
        self.child(ClaimPathSegment::Index(index))
    }

    fn child(&self, segment: ClaimPathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    /// Whether this path is `other` or one of its ancestors.
    pub fn is_prefix_of(&self, other: &ClaimPath) -> bool {
        other.0.starts_with(&self.0)
    }

    /// The node at this path within `value`, if any.
    pub fn resolve<'v>(&self, mut value: &'v Value) -> Option<&'v Value> {
        for segment in &self.0 {
            value = match (value, segment) {
                (Value::Object(object), ClaimPathSegment::Key(key)) => object.get(key)?,
                (Value::Array(array), ClaimPathSegment::Index(index)) => array.get(*index)?,
                _ => return None,
            };
        }
        Some(value)
    }
}

impl From<&NormalizedPath<'_>> for ClaimPath {
    fn from(path: &NormalizedPath<'_>) -> Self {
        Self(
            path.iter()
                .map(|element| match element {
                    PathElement::Name(name) => ClaimPathSegment::Key((*name).to_owned()),
                    PathElement::Index(index) => ClaimPathSegment::Index(*index),
                })
                .collect(),
        )
    }
}

impl std::fmt::Display for ClaimPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "$")?;
        for segment in &self.0 {
            match segment {
                // Note: keys containing dots are not escaped.
                ClaimPathSegment::Key(key) => write!(f, ".{}", key)?,
                ClaimPathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::claim_path;

    #[test]
    fn prefixes() {
        let address = claim_path!["address"];
        let street = address.key("street_address");

        assert!(ClaimPath::root().is_prefix_of(&street));
        assert!(address.is_prefix_of(&street));
        assert!(street.is_prefix_of(&street));
        assert!(!street.is_prefix_of(&address));
        assert!(!claim_path!["addr"].is_prefix_of(&street));
    }

    #[test]
    fn resolves_nodes() {
        let claims = json!({ "address": { "country": "DE" }, "nationalities": ["DE", "AT"] });

        assert_eq!(
            claim_path!["address", "country"].resolve(&claims),
            Some(&json!("DE"))
        );
        assert_eq!(
            claim_path!["nationalities"].index(1).resolve(&claims),
            Some(&json!("AT"))
        );
        assert_eq!(claim_path!["nationalities", "0"].resolve(&claims), None);
        assert_eq!(ClaimPath::root().resolve(&claims), Some(&claims));
    }

    #[test]
    fn converts_normalized_paths() {
        let claims = json!({ "a": [{ "b": 1 }] });
        let query = serde_json_path::JsonPath::parse("$.a[0].b").unwrap();
        let located = query.query_located(&claims).all();

        assert_eq!(
            ClaimPath::from(located[0].location()),
            claim_path!["a", 0usize, "b"]
        );
    }
}
