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

//! Issuer-side SD-JWT creation, for tests.
//!
//! Do NOT use this module for production code.  A wallet never issues
//! SD-JWTs; this exists so that holder-side code can be exercised against
//! credentials with freshly generated keys and salts.

use bh_jws_utils::{
    base64_url_encode, sign_jwt, CryptoError, EcCurve, EcSigner, JsonObject, JwkPublic, JwtHeader,
    Signer as _,
};
use bh_pex::{ClaimPath, ClaimPathSegment};
use bherror::{traits::PropagateError as _, Error};
use rand::RngCore as _;
use serde_json::{json, Value};

use crate::{
    utils::{ELLIPSIS, SD, SD_ALG, SD_JWT_DELIMITER},
    Disclosure, HashingAlgorithm, Result, SdJwtError,
};

/// The `typ` header of issuer-signed SD-JWT VCs.
pub const SD_JWT_VC_TYP: &str = "vc+sd-jwt";

const SALT_LENGTH: usize = 16;

/// An SD-JWT issuer with a P-256 key.
#[derive(Debug)]
pub struct SdJwtIssuer {
    signer: EcSigner,
    public_jwk: JwkPublic,
    header: JwtHeader,
}

impl SdJwtIssuer {
    /// An issuer with a freshly generated key.
    pub fn generate() -> bherror::Result<Self, CryptoError> {
        Self::from_signer(EcSigner::generate(EcCurve::P256, Some("issuer-key".to_owned()))?)
    }

    /// An issuer signing with the given key.
    pub fn from_signer(signer: EcSigner) -> bherror::Result<Self, CryptoError> {
        let public_jwk = signer.public_jwk()?;
        let header = JwtHeader::new(signer.algorithm()).with_typ(SD_JWT_VC_TYP);
        Ok(Self {
            signer,
            public_jwk,
            header,
        })
    }

    /// Use the given header for the issuer-signed JWT, e.g. to carry an `x5c`
    /// chain.  The `alg` is always overwritten with the signing algorithm.
    pub fn with_header(mut self, header: JwtHeader) -> Self {
        self.header = header;
        self
    }

    /// The issuer's public key.
    pub fn public_jwk(&self) -> JwkPublic {
        self.public_jwk.clone()
    }

    /// Issue an SD-JWT with the claims at the `disclosable` paths made
    /// selectively disclosable, and bound to the `holder_jwk` if given.
    ///
    /// Paths may be nested inside other disclosable claims.  The disclosures
    /// follow the order of `disclosable`.
    pub fn issue(
        &self,
        claims: JsonObject,
        disclosable: &[ClaimPath],
        holder_jwk: Option<&JwkPublic>,
    ) -> Result<String, SdJwtError> {
        let mut payload = Value::Object(claims);

        // Deepest first, so that nested digests end up inside the disclosed
        // values of their ancestors.
        let mut order: Vec<usize> = (0..disclosable.len()).collect();
        order.sort_by_key(|index| std::cmp::Reverse(disclosable[*index].len()));

        let mut disclosures = vec![None; disclosable.len()];
        for index in order {
            disclosures[index] = Some(conceal(&mut payload, &disclosable[index])?);
        }

        let Value::Object(mut payload) = payload else {
            return Err(Error::root(SdJwtError::MalformedSdJwt(
                "claims are not an object".to_owned(),
            )));
        };
        payload.insert(SD_ALG.to_owned(), HashingAlgorithm::Sha256.as_str().into());
        if let Some(holder_jwk) = holder_jwk {
            payload.insert("cnf".to_owned(), json!({ "jwk": holder_jwk }));
        }

        let mut sd_jwt = sign_jwt(&self.signer, self.header.clone(), &payload)
            .with_err(|| SdJwtError::Signing)?;
        sd_jwt.push(SD_JWT_DELIMITER);
        for disclosure in disclosures.into_iter().flatten() {
            sd_jwt.push_str(disclosure.as_str());
            sd_jwt.push(SD_JWT_DELIMITER);
        }

        Ok(sd_jwt)
    }
}

fn new_salt() -> String {
    let mut salt = [0u8; SALT_LENGTH];
    rand::rng().fill_bytes(&mut salt);
    base64_url_encode(salt)
}

fn conceal(payload: &mut Value, path: &ClaimPath) -> Result<Disclosure, SdJwtError> {
    let cannot_conceal = || Error::root(SdJwtError::MalformedSdJwt(format!("no claim at {path}")));

    let Some((last, parent_path)) = path.segments().split_last() else {
        return Err(cannot_conceal());
    };

    let mut parent = payload;
    for segment in parent_path {
        parent = match (parent, segment) {
            (Value::Object(object), ClaimPathSegment::Key(key)) => object.get_mut(key),
            (Value::Array(array), ClaimPathSegment::Index(index)) => array.get_mut(*index),
            _ => None,
        }
        .ok_or_else(cannot_conceal)?;
    }

    match (parent, last) {
        (Value::Object(object), ClaimPathSegment::Key(key)) => {
            let value = object.remove(key).ok_or_else(cannot_conceal)?;
            let disclosure = Disclosure::new(new_salt(), Some(key.clone()), value);

            let digests = object
                .entry(SD)
                .or_insert_with(|| Value::Array(Vec::new()));
            let Value::Array(digests) = digests else {
                return Err(cannot_conceal());
            };
            digests.push(disclosure.digest(HashingAlgorithm::Sha256).into());
            // Sorted, so that the digest order doesn't reveal the claim order.
            digests.sort_by(|a, b| a.as_str().cmp(&b.as_str()));

            Ok(disclosure)
        }
        (Value::Array(array), ClaimPathSegment::Index(index)) => {
            let element = array.get_mut(*index).ok_or_else(cannot_conceal)?;
            let disclosure = Disclosure::new(new_salt(), None, element.take());
            *element = json!({ ELLIPSIS: disclosure.digest(HashingAlgorithm::Sha256) });

            Ok(disclosure)
        }
        _ => Err(cannot_conceal()),
    }
}

#[cfg(test)]
mod tests {
    use bh_jws_utils::json_object;
    use bh_pex::claim_path;

    use super::*;
    use crate::SdJwt;

    #[test]
    fn issued_sd_jwt_decodes_to_the_original_claims() {
        let issuer = SdJwtIssuer::generate().unwrap();
        let claims = json_object!({
            "iss": "https://issuer.example.com",
            "given_name": "Erika",
            "address": { "locality": "Köln", "country": "DE" },
            "nationalities": ["DE", "FR"],
        });

        let issued = issuer
            .issue(
                claims.clone(),
                &[
                    claim_path!["given_name"],
                    claim_path!["address"],
                    claim_path!["address", "locality"],
                    claim_path!["nationalities", 1usize],
                ],
                None,
            )
            .unwrap();
        let sd_jwt = SdJwt::parse(&issued).unwrap();

        assert_eq!(sd_jwt.issuer_jwt().header().typ.as_deref(), Some(SD_JWT_VC_TYP));
        assert_eq!(sd_jwt.disclosures().len(), 4);
        assert!(!sd_jwt.issuer_jwt().payload().contains_key("given_name"));

        let decoded = sd_jwt.verify_with_key(&issuer.public_jwk()).unwrap();
        assert_eq!(Value::Object(decoded.claims), Value::Object(claims));
        assert_eq!(
            decoded.disclosure_paths,
            vec![
                claim_path!["given_name"],
                claim_path!["address"],
                claim_path!["address", "locality"],
                claim_path!["nationalities", 1usize],
            ]
        );
    }

    #[test]
    fn missing_claims_cannot_be_concealed() {
        let issuer = SdJwtIssuer::generate().unwrap();

        for path in [claim_path![], claim_path!["missing"], claim_path!["list", 3usize]] {
            let error = issuer
                .issue(json_object!({ "list": [1] }), &[path], None)
                .unwrap_err();
            assert!(matches!(error.error, SdJwtError::MalformedSdJwt(_)));
        }
    }
}
