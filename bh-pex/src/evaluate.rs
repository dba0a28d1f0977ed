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

//! Evaluation of presentation definitions against decoded claims.

use bherror::{traits::ForeignError as _, Result};
use serde_json::Value;
use serde_json_path::JsonPath;

use crate::{ClaimPath, Field, InputDescriptor, PexError, PresentationDefinition, SubmissionRule};

/// A claim satisfying a [`Field`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch<'d, 'v> {
    /// The satisfied field.
    pub field: &'d Field,
    /// Location of the matched claim.
    pub path: ClaimPath,
    /// The matched claim.
    pub value: &'v Value,
}

/// The claims satisfying an [`InputDescriptor`].
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorMatch<'d, 'v> {
    /// The satisfied descriptor.
    pub descriptor: &'d InputDescriptor,
    /// A match for every required field, and for the optional fields that
    /// could be satisfied.
    pub fields: Vec<FieldMatch<'d, 'v>>,
}

impl DescriptorMatch<'_, '_> {
    /// The matched locations, optionally including those of optional fields.
    pub fn paths(&self, include_optional: bool) -> impl Iterator<Item = &ClaimPath> {
        self.fields
            .iter()
            .filter(move |field_match| include_optional || !field_match.field.optional)
            .map(|field_match| &field_match.path)
    }
}

pub(crate) fn parse_path(path: &str) -> Result<JsonPath, PexError> {
    JsonPath::parse(path)
        .match_foreign_err(|error| PexError::InvalidPath(format!("{path}: {error}")))
}

impl Field {
    /// Find the first claim satisfying the field.
    ///
    /// The paths are tried in order, and within a path the nodes in document
    /// order; the first node passing the filter wins.  Without a filter, any
    /// node does.
    pub fn evaluate<'v>(
        &self,
        claims: &'v Value,
    ) -> Result<Option<(ClaimPath, &'v Value)>, PexError> {
        for path in &self.path {
            let query = parse_path(path)?;

            for node in query.query_located(claims).all() {
                let passes = match &self.filter {
                    Some(filter) => filter.matches(node.node())?,
                    None => true,
                };
                if passes {
                    return Ok(Some((ClaimPath::from(node.location()), node.node())));
                }
            }
        }

        Ok(None)
    }
}

impl InputDescriptor {
    /// Evaluate the descriptor's fields against `claims`.
    ///
    /// Returns [`None`] if a required field is not satisfied.
    pub fn evaluate<'d, 'v>(
        &'d self,
        claims: &'v Value,
    ) -> Result<Option<DescriptorMatch<'d, 'v>>, PexError> {
        let mut fields = Vec::with_capacity(self.constraints.fields.len());

        for field in &self.constraints.fields {
            match field.evaluate(claims)? {
                Some((path, value)) => fields.push(FieldMatch { field, path, value }),
                None if field.optional => {}
                None => {
                    tracing::debug!(
                        descriptor = %self.id,
                        paths = ?field.path,
                        "required field not satisfied"
                    );
                    return Ok(None);
                }
            }
        }

        Ok(Some(DescriptorMatch {
            descriptor: self,
            fields,
        }))
    }
}

impl PresentationDefinition {
    /// Evaluate every input descriptor against the same `claims`.
    ///
    /// Returns [`None`] unless all descriptors are satisfied.  Submission
    /// requirements are not used to relax this: a `pick` rule is evaluated as
    /// if it required every descriptor.
    pub fn evaluate<'d, 'v>(
        &'d self,
        claims: &'v Value,
    ) -> Result<Option<Vec<DescriptorMatch<'d, 'v>>>, PexError> {
        if self
            .submission_requirements
            .iter()
            .flatten()
            .any(|requirement| requirement.rule == SubmissionRule::Pick)
        {
            tracing::warn!(
                definition = %self.id,
                "`pick` submission requirements are evaluated as requiring all descriptors"
            );
        }

        let mut matches = Vec::with_capacity(self.input_descriptors.len());
        for descriptor in &self.input_descriptors {
            match descriptor.evaluate(claims)? {
                Some(descriptor_match) => matches.push(descriptor_match),
                None => return Ok(None),
            }
        }

        Ok(Some(matches))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::claim_path;

    fn definition(fields: Value) -> PresentationDefinition {
        PresentationDefinition::from_json(&json!({
            "id": "definition",
            "input_descriptors": [{ "id": "descriptor", "constraints": { "fields": fields } }]
        }))
        .unwrap()
    }

    fn employee_claims() -> Value {
        json!({
            "vct": "EmployeeCredential",
            "organization_name": "TBTL",
            "family_name": "Möbius",
            "address": { "country": "DE", "locality": "Berlin" },
            "nationalities": ["AT", "DE"],
        })
    }

    #[test]
    fn required_and_optional_fields() {
        let definition = definition(json!([
            { "path": ["$.vct"], "filter": { "type": "string", "const": "EmployeeCredential" } },
            { "path": ["$.organization_name"] },
            { "path": ["$.given_name"], "optional": true },
            { "path": ["$.family_name"], "optional": true },
        ]));
        let claims = employee_claims();

        let matches = definition.evaluate(&claims).unwrap().unwrap();
        let paths: Vec<_> = matches[0].paths(true).cloned().collect();
        assert_eq!(
            paths,
            vec![
                claim_path!["vct"],
                claim_path!["organization_name"],
                claim_path!["family_name"]
            ]
        );

        let required: Vec<_> = matches[0].paths(false).cloned().collect();
        assert_eq!(required, vec![claim_path!["vct"], claim_path!["organization_name"]]);
    }

    #[test]
    fn missing_required_field_fails_the_definition() {
        let definition = definition(json!([
            { "path": ["$.vct"] },
            { "path": ["$.given_name"] },
        ]));

        assert_eq!(definition.evaluate(&employee_claims()).unwrap(), None);
    }

    #[test]
    fn filter_failure_is_not_a_match() {
        let definition = definition(json!([
            { "path": ["$.vct"], "filter": { "const": "UniversityDegree" } },
        ]));

        assert_eq!(definition.evaluate(&employee_claims()).unwrap(), None);
    }

    #[test]
    fn paths_are_tried_in_order() {
        let definition = definition(json!([
            { "path": ["$.vc.credentialSubject.country", "$.address.country"] },
        ]));
        let claims = employee_claims();

        let matches = definition.evaluate(&claims).unwrap().unwrap();
        assert_eq!(matches[0].fields[0].path, claim_path!["address", "country"]);
        assert_eq!(matches[0].fields[0].value, &json!("DE"));
    }

    #[test]
    fn first_node_passing_the_filter_wins() {
        let definition = definition(json!([
            { "path": ["$.nationalities[*]"], "filter": { "const": "DE" } },
        ]));
        let claims = employee_claims();

        let matches = definition.evaluate(&claims).unwrap().unwrap();
        assert_eq!(matches[0].fields[0].path, claim_path!["nationalities", 1usize]);
    }

    #[test]
    fn all_descriptors_are_required() {
        let definition = PresentationDefinition::from_json(&json!({
            "id": "definition",
            "submission_requirements": [{ "rule": "pick", "count": 1, "from": "A" }],
            "input_descriptors": [
                { "id": "employee", "group": ["A"], "constraints": { "fields": [{ "path": ["$.vct"] }] } },
                { "id": "student", "group": ["A"], "constraints": { "fields": [{ "path": ["$.university"] }] } },
            ]
        }))
        .unwrap();

        assert_eq!(definition.evaluate(&employee_claims()).unwrap(), None);
    }

    #[test]
    fn descriptor_without_fields_is_satisfied() {
        let definition = PresentationDefinition::from_json(&json!({
            "id": "definition",
            "input_descriptors": [{ "id": "anything" }]
        }))
        .unwrap();

        let claims = employee_claims();
        let matches = definition.evaluate(&claims).unwrap().unwrap();
        assert!(matches[0].fields.is_empty());
    }

    #[test]
    fn unparsable_path_is_an_error() {
        let field = Field {
            path: vec!["$.[".to_owned()],
            id: None,
            name: None,
            purpose: None,
            optional: false,
            filter: None,
        };

        assert_matches!(
            field.evaluate(&employee_claims()).unwrap_err().error,
            PexError::InvalidPath(_)
        );
    }
}
