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

use std::collections::{BTreeMap, HashSet};

use bherror::{
    traits::{ErrorContext as _, ForeignError as _},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Filter, PexError};

/// Claim format designations, e.g. `jwt_vc_json` or `vc+sd-jwt`, mapped to
/// their format-specific parameters such as accepted signing algorithms.
pub type ClaimFormatMap = BTreeMap<String, Value>;

/// Claim format designation of SD-JWT VCs.
pub const FORMAT_VC_SD_JWT: &str = "vc+sd-jwt";
/// Claim format designation of JWT-secured W3C VCs.
pub const FORMAT_JWT_VC_JSON: &str = "jwt_vc_json";

/// A verifier's description of the proofs it requires.
///
/// See [DIF Presentation Exchange 2.0][1].
///
/// [1]: https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationDefinition {
    /// Identifier of the definition.
    pub id: String,
    /// The credentials required, one per descriptor.
    pub input_descriptors: Vec<InputDescriptor>,
    /// Rules for combining the input descriptors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_requirements: Option<Vec<SubmissionRequirement>>,
    /// Human-friendly name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Why the verifier asks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    /// Claim formats accepted for every descriptor which doesn't override it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ClaimFormatMap>,
}

/// Requirements on a single credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDescriptor {
    /// Identifier, unique within the definition.
    pub id: String,
    /// Human-friendly name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Why the verifier asks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    /// Claim formats accepted for this descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ClaimFormatMap>,
    /// Groups referenced from submission requirements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Vec<String>>,
    /// Constraints on the claims of the credential.
    #[serde(default)]
    pub constraints: Constraints,
}

/// Constraints of an [`InputDescriptor`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Claims which need to be present.
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Whether only the claims referenced by `fields` may be disclosed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_disclosure: Option<LimitDisclosure>,
}

/// The `limit_disclosure` property of [`Constraints`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitDisclosure {
    /// Only the referenced claims may be disclosed.
    Required,
    /// Only the referenced claims should be disclosed.
    Preferred,
}

/// A claim constraint: a list of JSONPath queries, the first node of which
/// passing the optional filter satisfies the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// JSONPath queries, tried in order.
    pub path: Vec<String>,
    /// Identifier of the field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-friendly name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Why the verifier asks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    /// Whether the descriptor is satisfied even without this field.
    #[serde(default)]
    pub optional: bool,
    /// JSON Schema the claim value has to satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
}

/// Rule of a [`SubmissionRequirement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionRule {
    /// All descriptors of the group are required.
    All,
    /// A number of the descriptors of the group are required.
    Pick,
}

/// Combination rule for input descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRequirement {
    /// Human-friendly name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Why the verifier asks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    /// The rule.
    pub rule: SubmissionRule,
    /// The group of input descriptors the rule applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Nested requirements the rule applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_nested: Option<Vec<SubmissionRequirement>>,
    /// Exact number to pick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Minimum number to pick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<usize>,
    /// Maximum number to pick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
}

/// The holder's description of how a presentation satisfies a
/// [`PresentationDefinition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationSubmission {
    /// Identifier of the submission.
    pub id: String,
    /// The `id` of the definition this submission is for.
    pub definition_id: String,
    /// Where to find the credential of each input descriptor.
    pub descriptor_map: Vec<DescriptorMapping>,
}

/// An entry of [`PresentationSubmission::descriptor_map`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorMapping {
    /// The `id` of the input descriptor.
    pub id: String,
    /// Claim format designation of the presented credential.
    pub format: String,
    /// JSONPath to the credential within the presentation.
    pub path: String,
    /// Path into a credential nested inside the one found at `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_nested: Option<Box<DescriptorMapping>>,
}

impl PresentationDefinition {
    /// Deserialize and [validate](Self::validate) a definition.
    pub fn from_json(json: &Value) -> Result<Self, PexError> {
        let definition: Self = serde_json::from_value(json.clone())
            .match_foreign_err(|error| PexError::InvalidDefinition(error.to_string()))?;
        definition.validate()?;
        Ok(definition)
    }

    /// Check that the definition can be evaluated: there is at least one
    /// input descriptor, descriptor ids are unique, every path is a valid
    /// JSONPath query and every filter is well formed.
    pub fn validate(&self) -> Result<(), PexError> {
        if self.input_descriptors.is_empty() {
            return Err(Error::root(PexError::InvalidDefinition(
                "no input descriptors".to_owned(),
            )));
        }

        let mut ids = HashSet::new();
        for descriptor in &self.input_descriptors {
            if !ids.insert(descriptor.id.as_str()) {
                return Err(Error::root(PexError::InvalidDefinition(format!(
                    "duplicate input descriptor id {}",
                    descriptor.id
                ))));
            }

            for field in &descriptor.constraints.fields {
                field
                    .validate()
                    .ctx(|| format!("in input descriptor {}", descriptor.id))?;
            }
        }

        Ok(())
    }

    /// Whether a credential of the given claim `format` may be presented for
    /// `descriptor`.
    ///
    /// The descriptor's `format` takes precedence over the definition's, and
    /// the absence of both accepts any format.
    pub fn accepts_format(&self, descriptor: &InputDescriptor, format: &str) -> bool {
        match descriptor.format.as_ref().or(self.format.as_ref()) {
            Some(formats) => formats.contains_key(format),
            None => true,
        }
    }
}

impl InputDescriptor {
    /// Whether `limit_disclosure` is `required`.
    pub fn requires_limited_disclosure(&self) -> bool {
        self.constraints.limit_disclosure == Some(LimitDisclosure::Required)
    }
}

impl Field {
    /// Check that all paths parse and the filter is well formed.
    pub fn validate(&self) -> Result<(), PexError> {
        if self.path.is_empty() {
            return Err(Error::root(PexError::InvalidDefinition(
                "field without a path".to_owned(),
            )));
        }
        for path in &self.path {
            crate::evaluate::parse_path(path)?;
        }
        if let Some(filter) = &self.filter {
            filter.validate()?;
        }
        Ok(())
    }
}
