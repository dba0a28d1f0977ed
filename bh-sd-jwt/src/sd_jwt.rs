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

//! Parsing, verification and presentation of SD-JWTs.

use std::{fmt, str::FromStr};

use bh_jws_utils::{HttpGetClient, Jwt, JwkPublic, KeyResolver, Signer};
use bh_pex::{ClaimPath, PresentationDefinition};
use bherror::{
    traits::{ErrorContext as _, PropagateError as _},
    Error,
};
use serde_json::Value;

use crate::{
    decoder::decode_disclosed_claims,
    key_binding::{sd_hash, sign_key_binding_jwt},
    utils::{SD_ALG, SD_JWT_DELIMITER},
    DecodedClaims, Disclosure, HashingAlgorithm, KeyBindingChallenge, KeyBindingError,
    KeyBindingJwt, Result, SdJwtError,
};

/// An SD-JWT, optionally with a Key Binding JWT attached.
///
/// Its compact serialization is the issuer-signed JWT, a `~`, and zero or
/// more disclosures each followed by a `~`, optionally followed by a Key
/// Binding JWT:
///
/// `<Issuer-signed JWT>~<Disclosure 1>~...~<Disclosure N>~[<KB-JWT>]`
#[derive(Debug, Clone, PartialEq)]
pub struct SdJwt {
    issuer_jwt: Jwt,
    issuer_signed_jwt: String,
    disclosures: Vec<Disclosure>,
    key_binding_jwt: Option<String>,
}

impl SdJwt {
    /// Parse the compact serialization of an SD-JWT.
    ///
    /// Empty disclosure segments are skipped.  Nothing is verified here; see
    /// [`SdJwt::verify`].
    pub fn parse(value: &str) -> Result<Self, SdJwtError> {
        let mut segments = value.split(SD_JWT_DELIMITER);
        let issuer_signed_jwt = segments.next().unwrap_or_default();

        let issuer_jwt = Jwt::decode(issuer_signed_jwt).match_err(|error| {
            SdJwtError::MalformedSdJwt(format!("issuer-signed JWT: {error}"))
        })?;

        let mut rest: Vec<&str> = segments.collect();
        let key_binding_jwt = match rest.pop() {
            Some(last) if !last.is_empty() => {
                Jwt::decode(last).match_err(|error| {
                    SdJwtError::MalformedSdJwt(format!("key binding JWT: {error}"))
                })?;
                Some(last.to_owned())
            }
            _ => None,
        };

        let disclosures = rest
            .into_iter()
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                Disclosure::parse(segment)
                    .match_err(|error| SdJwtError::MalformedSdJwt(error.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            issuer_jwt,
            issuer_signed_jwt: issuer_signed_jwt.to_owned(),
            disclosures,
            key_binding_jwt,
        })
    }

    /// The decoded issuer-signed JWT.
    pub fn issuer_jwt(&self) -> &Jwt {
        &self.issuer_jwt
    }

    /// The issuer-signed JWT, exactly as received.
    pub fn issuer_signed_jwt(&self) -> &str {
        &self.issuer_signed_jwt
    }

    /// All the disclosures, in the original order.
    pub fn disclosures(&self) -> &[Disclosure] {
        &self.disclosures
    }

    /// The attached Key Binding JWT, if any.
    pub fn key_binding_jwt(&self) -> Option<&str> {
        self.key_binding_jwt.as_deref()
    }

    /// The hash algorithm named by `_sd_alg`, defaulting to `sha-256`.
    pub fn hashing_algorithm(&self) -> Result<HashingAlgorithm, SdJwtError> {
        match self.issuer_jwt.payload().get(SD_ALG) {
            None => Ok(HashingAlgorithm::default()),
            Some(Value::String(name)) => name
                .parse::<HashingAlgorithm>()
                .match_err(|error| SdJwtError::MalformedSdJwt(error.to_string())),
            Some(other) => Err(Error::root(SdJwtError::MalformedSdJwt(format!(
                "`{SD_ALG}` is not a string: {other}"
            )))),
        }
    }

    /// The holder's public key from the `cnf` claim, if any.
    pub fn holder_public_key(&self) -> Option<&JwkPublic> {
        self.issuer_jwt
            .payload()
            .get("cnf")?
            .get("jwk")?
            .as_object()
    }

    /// Substitute the disclosures into the issuer-signed payload.
    ///
    /// The issuer signature is **not** checked here.
    pub fn decode_claims(&self) -> Result<DecodedClaims, SdJwtError> {
        let hashing_algorithm = self.hashing_algorithm()?;

        decode_disclosed_claims(self.issuer_jwt.payload(), &self.disclosures, hashing_algorithm)
            .match_err(|error| SdJwtError::MalformedSdJwt(error.to_string()))
    }

    /// The claims a verifier sees when only the `selected` disclosures are
    /// presented.
    fn decode_selected(&self, selected: &[&Disclosure]) -> Result<DecodedClaims, SdJwtError> {
        let hashing_algorithm = self.hashing_algorithm()?;
        let disclosures: Vec<Disclosure> = selected.iter().copied().cloned().collect();

        decode_disclosed_claims(self.issuer_jwt.payload(), &disclosures, hashing_algorithm)
            .match_err(|error| SdJwtError::MalformedSdJwt(error.to_string()))
    }

    /// Verify the issuer signature with a known key, then decode the claims.
    pub fn verify_with_key(&self, issuer_public_key: &JwkPublic) -> Result<DecodedClaims, SdJwtError> {
        self.issuer_jwt
            .verify_with_key(issuer_public_key)
            .with_err(|| SdJwtError::InvalidIssuerJwt)?;

        self.decode_claims()
    }

    /// Resolve the issuer key from the JWT header, verify the issuer
    /// signature, then decode the claims.
    pub async fn verify<C: HttpGetClient>(
        &self,
        resolver: &KeyResolver<C>,
    ) -> Result<DecodedClaims, SdJwtError> {
        self.issuer_jwt
            .verify(resolver)
            .await
            .with_err(|| SdJwtError::InvalidIssuerJwt)?;

        self.decode_claims()
    }

    /// Pick the disclosures needed to satisfy the presentation `definition`.
    ///
    /// Returns [`None`] when a required field of any input descriptor cannot
    /// be satisfied by the fully decoded claims.  Otherwise the disclosures on
    /// the way to a matched claim are returned, i.e. those of the claim itself
    /// and of its ancestors.  Disclosures nested inside a matched claim are
    /// added only when its field carries a filter, since the filter was
    /// checked against the fully disclosed value; without one, a matched
    /// object is presented with only its always-visible members.  The
    /// original disclosure order is kept.
    ///
    /// The definition is evaluated once more against what the selection
    /// reveals, and [`None`] is returned if that no longer satisfies it.
    ///
    /// Matches of optional fields are only taken into account with
    /// `include_optional`.
    pub fn select_disclosures(
        &self,
        definition: &PresentationDefinition,
        include_optional: bool,
    ) -> Result<Option<Vec<&Disclosure>>, SdJwtError> {
        let decoded = self.decode_claims()?;
        let claims = Value::Object(decoded.claims);

        let Some(matches) = definition
            .evaluate(&claims)
            .with_err(|| SdJwtError::InvalidPresentationDefinition)?
        else {
            tracing::debug!(definition = %definition.id, "definition not satisfied");
            return Ok(None);
        };

        // Matched locations, and whether the whole value has to be revealed.
        let matched_paths: Vec<(&ClaimPath, bool)> = matches
            .iter()
            .flat_map(|descriptor_match| &descriptor_match.fields)
            .filter(|field_match| include_optional || !field_match.field.optional)
            .map(|field_match| (&field_match.path, field_match.field.filter.is_some()))
            .collect();

        let selected = self
            .disclosures
            .iter()
            .zip(&decoded.disclosure_paths)
            .filter(|(_, disclosure_path)| {
                matched_paths.iter().any(|(matched, filtered)| {
                    disclosure_path.is_prefix_of(matched)
                        || (*filtered && matched.is_prefix_of(disclosure_path))
                })
            })
            .map(|(disclosure, _)| disclosure)
            .collect::<Vec<_>>();

        let revealed = Value::Object(self.decode_selected(&selected)?.claims);
        let still_satisfied = definition
            .evaluate(&revealed)
            .with_err(|| SdJwtError::InvalidPresentationDefinition)?
            .is_some();
        if !still_satisfied {
            tracing::warn!(
                definition = %definition.id,
                "selected disclosures do not satisfy the definition"
            );
            return Ok(None);
        }

        tracing::debug!(
            definition = %definition.id,
            selected = selected.len(),
            total = self.disclosures.len(),
            "selected disclosures"
        );

        Ok(Some(selected))
    }

    /// The compact serialization of the issuer-signed JWT with the given
    /// disclosures, without a Key Binding JWT, i.e. ending with `~`.
    pub fn presentation(&self, disclosures: &[&Disclosure]) -> String {
        let mut presentation = self.issuer_signed_jwt.clone();
        presentation.push(SD_JWT_DELIMITER);
        for disclosure in disclosures {
            presentation.push_str(disclosure.as_str());
            presentation.push(SD_JWT_DELIMITER);
        }
        presentation
    }

    /// Present the given disclosures with a Key Binding JWT signed by the
    /// holder, i.e. `<Issuer-signed JWT>~<Disclosure>~...~<KB-JWT>`.
    pub fn present<S: Signer + ?Sized>(
        &self,
        disclosures: &[&Disclosure],
        challenge: &KeyBindingChallenge,
        iat: u64,
        signer: &S,
    ) -> Result<String, KeyBindingError> {
        let hashing_algorithm = self
            .hashing_algorithm()
            .with_err(|| KeyBindingError::Signing)
            .ctx(|| "unsupported hash algorithm")?;

        let mut presentation = self.presentation(disclosures);
        let key_binding_jwt =
            sign_key_binding_jwt(&presentation, hashing_algorithm, challenge, iat, signer)?;
        presentation.push_str(&key_binding_jwt);

        Ok(presentation)
    }

    /// Verify the attached Key Binding JWT against the `cnf` holder key and
    /// the expected `challenge`.
    pub fn verify_key_binding(
        &self,
        challenge: &KeyBindingChallenge,
        current_time: u64,
    ) -> Result<(), KeyBindingError> {
        let key_binding_jwt = self
            .key_binding_jwt
            .as_deref()
            .ok_or_else(|| Error::root(KeyBindingError::MissingKeyBinding))?;
        let holder_public_key = self
            .holder_public_key()
            .ok_or_else(|| Error::root(KeyBindingError::MissingHolderKey))?;
        let hashing_algorithm = self
            .hashing_algorithm()
            .with_err(|| KeyBindingError::InvalidSyntax)?;

        let disclosures: Vec<&Disclosure> = self.disclosures.iter().collect();
        let expected_sd_hash = sd_hash(hashing_algorithm, &self.presentation(&disclosures));

        KeyBindingJwt::decode(key_binding_jwt)?.verify(
            holder_public_key,
            challenge,
            &expected_sd_hash,
            current_time,
        )?;

        Ok(())
    }
}

impl FromStr for SdJwt {
    type Err = Error<SdJwtError>;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for SdJwt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let disclosures: Vec<&Disclosure> = self.disclosures.iter().collect();
        f.write_str(&self.presentation(&disclosures))?;
        if let Some(key_binding_jwt) = &self.key_binding_jwt {
            f.write_str(key_binding_jwt)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use bh_jws_utils::{json_object, EcCurve, EcSigner, ReqwestGetClient, Signer as _};
    use bh_pex::claim_path;
    use bhx5chain::{test_utils::TestChain, JwtX5Chain, TrustPolicy};
    use serde_json::json;

    use super::*;
    use crate::test_utils::SdJwtIssuer;

    // Issuer-signed JWT and some of the disclosures out of the SD-JWT draft,
    // appendix A.
    const DRAFT_ISSUER_JWT: &str = "\
        eyJhbGciOiAiRVMyNTYiLCAidHlwIjogInZjK3NkLWp3dCJ9.eyJfc2QiOiBbIjBIWm1\
        uU0lQejMzN2tTV2U3QzM0bC0tODhnekppLWVCSjJWel9ISndBVGciLCAiOVpicGxDN1R\
        kRVc3cWFsNkJCWmxNdHFKZG1lRU9pWGV2ZEpsb1hWSmRSUSIsICJJMDBmY0ZVb0RYQ3V\
        jcDV5eTJ1anFQc3NEVkdhV05pVWxpTnpfYXdEMGdjIiwgIklFQllTSkdOaFhJbHJRbzU\
        4eWtYbTJaeDN5bGw5WmxUdFRvUG8xN1FRaVkiLCAiTGFpNklVNmQ3R1FhZ1hSN0F2R1R\
        yblhnU2xkM3o4RUlnX2Z2M2ZPWjFXZyIsICJodkRYaHdtR2NKUXNCQ0EyT3RqdUxBY3d\
        BTXBEc2FVMG5rb3ZjS09xV05FIiwgImlrdXVyOFE0azhxM1ZjeUE3ZEMtbU5qWkJrUmV\
        EVFUtQ0c0bmlURTdPVFUiLCAicXZ6TkxqMnZoOW80U0VYT2ZNaVlEdXZUeWtkc1dDTmc\
        wd1RkbHIwQUVJTSIsICJ3elcxNWJoQ2t2a3N4VnZ1SjhSRjN4aThpNjRsbjFqb183NkJ\
        DMm9hMXVnIiwgInpPZUJYaHh2SVM0WnptUWNMbHhLdUVBT0dHQnlqT3FhMXoySW9WeF9\
        ZRFEiXSwgImlzcyI6ICJodHRwczovL2lzc3Vlci5leGFtcGxlLmNvbSIsICJpYXQiOiA\
        xNjgzMDAwMDAwLCAiZXhwIjogMTg4MzAwMDAwMCwgInZjdCI6ICJodHRwczovL2JtaS5\
        idW5kLmV4YW1wbGUvY3JlZGVudGlhbC9waWQvMS4wIiwgImFnZV9lcXVhbF9vcl9vdmV\
        yIjogeyJfc2QiOiBbIkZjOElfMDdMT2NnUHdyREpLUXlJR085N3dWc09wbE1Makh2UkM\
        0UjQtV2ciLCAiWEx0TGphZFVXYzl6Tl85aE1KUm9xeTQ2VXNDS2IxSXNoWnV1cVVGS1N\
        DQSIsICJhb0NDenNDN3A0cWhaSUFoX2lkUkNTQ2E2NDF1eWNuYzh6UGZOV3o4bngwIiw\
        gImYxLVAwQTJkS1dhdnYxdUZuTVgyQTctRVh4dmhveHY1YUhodUVJTi1XNjQiLCAiazV\
        oeTJyMDE4dnJzSmpvLVZqZDZnNnl0N0Fhb25Lb25uaXVKOXplbDNqbyIsICJxcDdaX0t\
        5MVlpcDBzWWdETzN6VnVnMk1GdVBOakh4a3NCRG5KWjRhSS1jIl19LCAiX3NkX2FsZyI\
        6ICJzaGEtMjU2IiwgImNuZiI6IHsiandrIjogeyJrdHkiOiAiRUMiLCAiY3J2IjogIlA\
        tMjU2IiwgIngiOiAiVENBRVIxOVp2dTNPSEY0ajRXNHZmU1ZvSElQMUlMaWxEbHM3dkN\
        lR2VtYyIsICJ5IjogIlp4amlXV2JaTVFHSFZXS1ZRNGhiU0lpcnNWZnVlY0NFNnQ0alQ\
        5RjJIWlEifX19.jeF9GjGbjCr0NND0SbkV4HeSpsysixALFScJl4bYkIykXhF6cRtqni\
        64_d7X6Ef8Rx80rfsgXe0H7TdiSoIJOw";

    const DRAFT_ISSUER_X: &str = "b28d4MwZMjw8-00CG4xfnn9SLMVMM19SlqZpVb_uNtQ";
    const DRAFT_ISSUER_Y: &str = "Xv5zWwuoaTgdS6hV43yI6gBwTnjukmFQQnJ_kCxzqk8";

    fn draft_issuer_key() -> JwkPublic {
        json_object!({ "kty": "EC", "crv": "P-256", "x": DRAFT_ISSUER_X, "y": DRAFT_ISSUER_Y })
    }

    fn employee_definition() -> PresentationDefinition {
        PresentationDefinition::from_json(&json!({
            "id": "employee",
            "input_descriptors": [{
                "id": "employee-credential",
                "constraints": {
                    "limit_disclosure": "required",
                    "fields": [
                        { "path": ["$.vct"], "filter": { "type": "string", "const": "EmployeeCredential" } },
                        { "path": ["$.organization_name"] },
                        { "path": ["$.family_name"] },
                        { "path": ["$.given_name"], "optional": true },
                    ],
                },
            }],
        }))
        .unwrap()
    }

    fn employee_sd_jwt(issuer: &SdJwtIssuer) -> SdJwt {
        let claims = json_object!({
            "iss": "https://issuer.example.com",
            "vct": "EmployeeCredential",
            "organization_name": "TBTL",
            "family_name": "Mustermann",
            "given_name": "Erika",
            "birthdate": "1963-08-12",
            "address": { "street_address": "Heidestraße 17", "locality": "Köln" },
        });
        let disclosable = [
            claim_path!["organization_name"],
            claim_path!["family_name"],
            claim_path!["given_name"],
            claim_path!["birthdate"],
            claim_path!["address"],
            claim_path!["address", "street_address"],
        ];

        issuer.issue(claims, &disclosable, None).unwrap().parse().unwrap()
    }

    fn claim_names<'a>(disclosures: &[&'a Disclosure]) -> Vec<&'a str> {
        disclosures
            .iter()
            .filter_map(|disclosure| disclosure.claim_name())
            .collect()
    }

    #[test]
    fn parse_without_disclosures() {
        let sd_jwt = SdJwt::parse(&format!("{DRAFT_ISSUER_JWT}~")).unwrap();

        assert!(sd_jwt.disclosures().is_empty());
        assert_eq!(sd_jwt.key_binding_jwt(), None);
        assert_eq!(sd_jwt.to_string(), format!("{DRAFT_ISSUER_JWT}~"));
    }

    #[test]
    fn decode_draft_example_without_disclosures() {
        let sd_jwt = SdJwt::parse(&format!("{DRAFT_ISSUER_JWT}~~")).unwrap();

        assert!(sd_jwt.disclosures().is_empty());
        assert_eq!(sd_jwt.hashing_algorithm().unwrap(), HashingAlgorithm::Sha256);
        assert_eq!(
            sd_jwt.holder_public_key().unwrap()["x"],
            "TCAER19Zvu3OHF4j4W4vfSVoHIP1ILilDls7vCeGemc"
        );

        let decoded = sd_jwt.verify_with_key(&draft_issuer_key()).unwrap();

        // Every digest stays undisclosed.
        assert_eq!(
            Value::Object(decoded.claims),
            json!({
                "iss": "https://issuer.example.com",
                "iat": 1683000000,
                "exp": 1883000000,
                "vct": "https://bmi.bund.example/credential/pid/1.0",
                "age_equal_or_over": {},
                "cnf": {
                    "jwk": {
                        "kty": "EC",
                        "crv": "P-256",
                        "x": "TCAER19Zvu3OHF4j4W4vfSVoHIP1ILilDls7vCeGemc",
                        "y": "ZxjiWWbZMQGHVWKVQ4hbSIirsVfuecCE6t4jT9F2HZQ",
                    },
                },
            })
        );
        assert!(decoded.disclosure_paths.is_empty());
    }

    #[test]
    fn reject_forged_issuer_signature() {
        let sd_jwt = SdJwt::parse(&format!("{DRAFT_ISSUER_JWT}~")).unwrap();
        let other_key = EcSigner::generate(EcCurve::P256, None)
            .unwrap()
            .public_jwk()
            .unwrap();

        let error = sd_jwt.verify_with_key(&other_key).unwrap_err();

        assert_eq!(error.error, SdJwtError::InvalidIssuerJwt);
    }

    #[test]
    fn reject_malformed_sd_jwts() {
        let cases = [
            "".to_owned(),
            "~".to_owned(),
            "not.a.jwt~".to_owned(),
            format!("{DRAFT_ISSUER_JWT}~not-a-disclosure~"),
            format!("{DRAFT_ISSUER_JWT}~~not-a-kb-jwt"),
        ];

        for case in cases {
            assert_matches!(
                SdJwt::parse(&case).unwrap_err().error,
                SdJwtError::MalformedSdJwt(_),
                "{case}"
            );
        }
    }

    #[test]
    fn unsupported_hash_algorithm_is_malformed() {
        let signer = EcSigner::generate(EcCurve::P256, None).unwrap();
        let jwt = bh_jws_utils::sign_jwt(
            &signer,
            bh_jws_utils::JwtHeader::new(signer.algorithm()),
            &json_object!({ "_sd_alg": "sha-512", "_sd": [] }),
        )
        .unwrap();

        let error = SdJwt::parse(&format!("{jwt}~")).unwrap().decode_claims().unwrap_err();

        assert_matches!(error.error, SdJwtError::MalformedSdJwt(_));
    }

    #[test]
    fn select_only_the_matched_disclosures() {
        let issuer = SdJwtIssuer::generate().unwrap();
        let sd_jwt = employee_sd_jwt(&issuer);
        let definition = employee_definition();

        let selected = sd_jwt.select_disclosures(&definition, false).unwrap().unwrap();
        assert_eq!(claim_names(&selected), ["organization_name", "family_name"]);

        let selected = sd_jwt.select_disclosures(&definition, true).unwrap().unwrap();
        assert_eq!(
            claim_names(&selected),
            ["organization_name", "family_name", "given_name"]
        );
    }

    #[test]
    fn select_the_matched_claim_and_its_ancestors() {
        let issuer = SdJwtIssuer::generate().unwrap();
        let sd_jwt = employee_sd_jwt(&issuer);

        let street = PresentationDefinition::from_json(&json!({
            "id": "street",
            "input_descriptors": [{
                "id": "street",
                "constraints": { "fields": [{ "path": ["$.address.street_address"] }] },
            }],
        }))
        .unwrap();
        let selected = sd_jwt.select_disclosures(&street, true).unwrap().unwrap();
        assert_eq!(claim_names(&selected), ["address", "street_address"]);

        let address = PresentationDefinition::from_json(&json!({
            "id": "address",
            "input_descriptors": [{
                "id": "address",
                "constraints": { "fields": [{ "path": ["$.address"] }] },
            }],
        }))
        .unwrap();
        let selected = sd_jwt.select_disclosures(&address, true).unwrap().unwrap();
        assert_eq!(claim_names(&selected), ["address"]);
    }

    fn single_field_definition(field: Value) -> PresentationDefinition {
        PresentationDefinition::from_json(&json!({
            "id": "definition",
            "input_descriptors": [{ "id": "descriptor", "constraints": { "fields": [field] } }],
        }))
        .unwrap()
    }

    fn revealed_claims(sd_jwt: &SdJwt, selected: &[&Disclosure]) -> Value {
        let presented = SdJwt::parse(&sd_jwt.presentation(selected)).unwrap();
        Value::Object(presented.decode_claims().unwrap().claims)
    }

    #[test]
    fn filtered_array_reveals_its_disclosable_elements() {
        let issuer = SdJwtIssuer::generate().unwrap();
        let sd_jwt: SdJwt = issuer
            .issue(
                json_object!({ "vct": "X", "nationalities": ["AT", "DE"] }),
                &[claim_path!["nationalities", 0usize], claim_path!["nationalities", 1usize]],
                None,
            )
            .unwrap()
            .parse()
            .unwrap();
        let definition = single_field_definition(json!({
            "path": ["$.nationalities"],
            "filter": { "type": "array", "contains": { "const": "DE" } },
        }));

        let selected = sd_jwt.select_disclosures(&definition, true).unwrap().unwrap();
        assert_eq!(selected.len(), 2);

        let revealed = revealed_claims(&sd_jwt, &selected);
        assert_eq!(revealed["nationalities"], json!(["AT", "DE"]));
        assert!(definition.evaluate(&revealed).unwrap().is_some());
    }

    #[test]
    fn filtered_object_reveals_its_disclosable_members() {
        let issuer = SdJwtIssuer::generate().unwrap();
        let sd_jwt = employee_sd_jwt(&issuer);
        let definition = single_field_definition(json!({
            "path": ["$.address"],
            "filter": {
                "type": "object",
                "const": { "street_address": "Heidestraße 17", "locality": "Köln" },
            },
        }));

        let selected = sd_jwt.select_disclosures(&definition, true).unwrap().unwrap();
        assert_eq!(claim_names(&selected), ["address", "street_address"]);

        let revealed = revealed_claims(&sd_jwt, &selected);
        assert!(definition.evaluate(&revealed).unwrap().is_some());
    }

    #[test]
    fn selection_not_satisfying_the_definition_once_presented_is_rejected() {
        let issuer = SdJwtIssuer::generate().unwrap();
        let sd_jwt: SdJwt = issuer
            .issue(
                json_object!({ "vct": "X", "nationalities": ["AT", "DE"] }),
                &[claim_path!["nationalities", 0usize]],
                None,
            )
            .unwrap()
            .parse()
            .unwrap();
        // Withholding the first element shifts "DE" to index 0.
        let definition = single_field_definition(json!({ "path": ["$.nationalities[1]"] }));

        assert_eq!(sd_jwt.select_disclosures(&definition, true).unwrap(), None);
    }

    #[test]
    fn unsatisfied_definition_selects_nothing() {
        let issuer = SdJwtIssuer::generate().unwrap();
        let sd_jwt = employee_sd_jwt(&issuer);
        let definition = PresentationDefinition::from_json(&json!({
            "id": "pid",
            "input_descriptors": [{
                "id": "pid",
                "constraints": { "fields": [{ "path": ["$.nationality"] }] },
            }],
        }))
        .unwrap();

        assert_eq!(sd_jwt.select_disclosures(&definition, true).unwrap(), None);
    }

    #[test]
    fn presentation_with_key_binding() {
        let issuer = SdJwtIssuer::generate().unwrap();
        let holder = EcSigner::generate(EcCurve::P256, None).unwrap();
        let sd_jwt: SdJwt = issuer
            .issue(
                json_object!({ "vct": "EmployeeCredential", "family_name": "Mustermann", "given_name": "Erika" }),
                &[claim_path!["family_name"], claim_path!["given_name"]],
                Some(&holder.public_jwk().unwrap()),
            )
            .unwrap()
            .parse()
            .unwrap();
        let challenge = KeyBindingChallenge {
            aud: "https://verifier.example.org".to_owned(),
            nonce: "1234".to_owned(),
        };
        let selected: Vec<_> = sd_jwt
            .disclosures()
            .iter()
            .filter(|disclosure| disclosure.claim_name() == Some("family_name"))
            .collect();

        let presented = sd_jwt.present(&selected, &challenge, 1_700_000_000, &holder).unwrap();
        let received = SdJwt::parse(&presented).unwrap();

        assert_eq!(received.to_string(), presented);
        assert_eq!(received.disclosures().len(), 1);
        received.verify_key_binding(&challenge, 1_700_000_060).unwrap();

        let decoded = received.verify_with_key(&issuer.public_jwk()).unwrap();
        assert_eq!(decoded.claims["family_name"], "Mustermann");
        assert!(!decoded.claims.contains_key("given_name"));

        let wrong_challenge = KeyBindingChallenge {
            nonce: "5678".to_owned(),
            ..challenge
        };
        assert_matches!(
            received.verify_key_binding(&wrong_challenge, 1_700_000_060).unwrap_err().error,
            KeyBindingError::InvalidNonce(_)
        );
    }

    #[test]
    fn key_binding_must_be_attached() {
        let sd_jwt = SdJwt::parse(&format!("{DRAFT_ISSUER_JWT}~")).unwrap();
        let challenge = KeyBindingChallenge {
            aud: "aud".to_owned(),
            nonce: "nonce".to_owned(),
        };

        assert_eq!(
            sd_jwt.verify_key_binding(&challenge, 0).unwrap_err().error,
            KeyBindingError::MissingKeyBinding
        );
    }

    #[tokio::test]
    async fn verify_with_resolved_x5c_key() {
        let chain = TestChain::generate().unwrap();
        let leaf_key = chain.leaf_key.ec_key().unwrap().private_key_to_pem().unwrap();
        let signer = EcSigner::from_private_key_pem(&leaf_key, None).unwrap();

        let mut header = bh_jws_utils::JwtHeader::new(signer.algorithm());
        header.x5c = Some(JwtX5Chain::try_from(&chain.x5chain(false)).unwrap());
        let issuer = SdJwtIssuer::from_signer(signer).unwrap().with_header(header);

        let sd_jwt: SdJwt = issuer
            .issue(json_object!({ "given_name": "Erika" }), &[claim_path!["given_name"]], None)
            .unwrap()
            .parse()
            .unwrap();

        let trusted = KeyResolver::new(
            ReqwestGetClient::default(),
            TrustPolicy::TrustedRoots(chain.trust()),
        );
        let decoded = sd_jwt.verify(&trusted).await.unwrap();
        assert_eq!(decoded.claims["given_name"], "Erika");

        let untrusted = KeyResolver::new(ReqwestGetClient::default(), TrustPolicy::default());
        assert_eq!(
            sd_jwt.verify(&untrusted).await.unwrap_err().error,
            SdJwtError::InvalidIssuerJwt
        );
    }
}
