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

//! Evaluation of the JSON Schema subset used in field filters.

use bherror::{traits::ForeignError as _, Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::PexError;

/// A field filter: a JSON Schema fragment a claim value must satisfy.
///
/// The supported keywords are `type`, `const`, `enum`, `pattern`, `minimum`,
/// `maximum`, `exclusiveMinimum`, `exclusiveMaximum`, `minLength`,
/// `maxLength` and `contains`.  Other keywords are ignored.  As in JSON
/// Schema, keywords only constrain values of the type they apply to, e.g.
/// `pattern` says nothing about a number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(Map<String, Value>);

impl From<Map<String, Value>> for Filter {
    fn from(schema: Map<String, Value>) -> Self {
        Self(schema)
    }
}

impl Filter {
    /// The schema as a JSON object.
    pub fn as_object(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Check that every supported keyword is well formed, so that
    /// [`Filter::matches`] cannot fail.
    pub fn validate(&self) -> Result<(), PexError> {
        let schema = &self.0;

        if let Some(types) = schema.get("type") {
            let valid = match types {
                Value::String(_) => true,
                Value::Array(types) => types.iter().all(Value::is_string),
                _ => false,
            };
            if !valid {
                return Err(invalid_filter("`type` must be a string or a list of strings"));
            }
        }
        if let Some(pattern) = schema.get("pattern") {
            compile_pattern(pattern)?;
        }
        for keyword in ["minimum", "maximum"] {
            if schema.get(keyword).is_some_and(|bound| !bound.is_number()) {
                return Err(invalid_filter(&format!("`{keyword}` must be a number")));
            }
        }
        for keyword in ["exclusiveMinimum", "exclusiveMaximum"] {
            if schema
                .get(keyword)
                .is_some_and(|bound| !bound.is_number() && !bound.is_boolean())
            {
                return Err(invalid_filter(&format!(
                    "`{keyword}` must be a number or a boolean"
                )));
            }
        }
        for keyword in ["minLength", "maxLength"] {
            if schema.get(keyword).is_some_and(|bound| !bound.is_u64()) {
                return Err(invalid_filter(&format!(
                    "`{keyword}` must be a non-negative integer"
                )));
            }
        }
        if schema.get("enum").is_some_and(|values| !values.is_array()) {
            return Err(invalid_filter("`enum` must be a list"));
        }
        if let Some(contains) = schema.get("contains") {
            nested_filter(contains)?.validate()?;
        }

        Ok(())
    }

    /// Whether `value` satisfies the filter.
    pub fn matches(&self, value: &Value) -> Result<bool, PexError> {
        let schema = &self.0;

        if let Some(types) = schema.get("type") {
            let type_matches = match types {
                Value::String(type_name) => has_type(value, type_name),
                Value::Array(types) => types
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|type_name| has_type(value, type_name)),
                _ => return Err(invalid_filter("`type` must be a string or a list of strings")),
            };
            if !type_matches {
                return Ok(false);
            }
        }

        if schema.get("const").is_some_and(|expected| expected != value) {
            return Ok(false);
        }

        if let Some(allowed) = schema.get("enum") {
            let Value::Array(allowed) = allowed else {
                return Err(invalid_filter("`enum` must be a list"));
            };
            if !allowed.contains(value) {
                return Ok(false);
            }
        }

        let matches = match value {
            Value::String(string) => self.matches_string(string)?,
            Value::Number(_) => self.matches_number(value.as_f64())?,
            Value::Array(array) => self.matches_array(array)?,
            _ => true,
        };
        Ok(matches)
    }

    fn matches_string(&self, string: &str) -> Result<bool, PexError> {
        let schema = &self.0;

        if let Some(pattern) = schema.get("pattern") {
            if !compile_pattern(pattern)?.is_match(string) {
                return Ok(false);
            }
        }

        let length = string.chars().count() as u64;
        if schema
            .get("minLength")
            .and_then(Value::as_u64)
            .is_some_and(|min| length < min)
        {
            return Ok(false);
        }
        if schema
            .get("maxLength")
            .and_then(Value::as_u64)
            .is_some_and(|max| length > max)
        {
            return Ok(false);
        }

        Ok(true)
    }

    fn matches_number(&self, number: Option<f64>) -> Result<bool, PexError> {
        let schema = &self.0;
        let Some(number) = number else {
            return Ok(false);
        };
        let bound = |keyword: &str| schema.get(keyword).and_then(Value::as_f64);

        // Draft 4 spells exclusive bounds as booleans next to `minimum` and
        // `maximum`; later drafts as numbers of their own.
        let exclusive_minimum = schema.get("exclusiveMinimum").and_then(Value::as_bool) == Some(true);
        let exclusive_maximum = schema.get("exclusiveMaximum").and_then(Value::as_bool) == Some(true);

        if let Some(minimum) = bound("minimum") {
            if number < minimum || (exclusive_minimum && number == minimum) {
                return Ok(false);
            }
        }
        if let Some(maximum) = bound("maximum") {
            if number > maximum || (exclusive_maximum && number == maximum) {
                return Ok(false);
            }
        }
        if bound("exclusiveMinimum").is_some_and(|minimum| number <= minimum) {
            return Ok(false);
        }
        if bound("exclusiveMaximum").is_some_and(|maximum| number >= maximum) {
            return Ok(false);
        }

        Ok(true)
    }

    fn matches_array(&self, array: &[Value]) -> Result<bool, PexError> {
        let Some(contains) = self.0.get("contains") else {
            return Ok(true);
        };
        let contains = nested_filter(contains)?;

        for element in array {
            if contains.matches(element)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn has_type(value: &Value, type_name: &str) -> bool {
    match type_name {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().is_some_and(|number| number.fract() == 0.0)
        }
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => false,
    }
}

fn compile_pattern(pattern: &Value) -> Result<Regex, PexError> {
    let Value::String(pattern) = pattern else {
        return Err(invalid_filter("`pattern` must be a string"));
    };
    Regex::new(pattern).match_foreign_err(|error| PexError::InvalidFilter(error.to_string()))
}

fn nested_filter(schema: &Value) -> Result<Filter, PexError> {
    match schema {
        Value::Object(schema) => Ok(Filter(schema.clone())),
        _ => Err(invalid_filter("`contains` must be an object")),
    }
}

fn invalid_filter(reason: &str) -> Error<PexError> {
    Error::root(PexError::InvalidFilter(reason.to_owned()))
}
