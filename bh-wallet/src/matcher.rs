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

//! Finding the stored credentials which satisfy a verifier's
//! [`PresentationDefinition`].

use bh_jws_utils::Jwt;
use bh_pex::PresentationDefinition;
use bh_sd_jwt::SdJwt;
use bherror::Error;
use serde_json::Value;

use crate::{CredentialRecord, CredentialStore, Result, StoredCredential, WalletError};

/// Whether the `credential` can be presented for every input descriptor of
/// the `definition`.
///
/// An SD-JWT satisfies the definition if a non-empty set of disclosures can
/// be selected for it, optional fields included.  A JWT-VC is evaluated
/// against its decoded payload; it never satisfies a descriptor which
/// requires limited disclosure.  In both cases the format has to be accepted
/// by every descriptor.
///
/// A credential which cannot be decoded does not satisfy anything.
pub fn credential_satisfies(
    credential: &CredentialRecord,
    definition: &PresentationDefinition,
) -> bool {
    let format = credential.format().as_str();
    if !definition
        .input_descriptors
        .iter()
        .all(|descriptor| definition.accepts_format(descriptor, format))
    {
        tracing::debug!(id = %credential.id, %format, "format not accepted");
        return false;
    }

    match &credential.credential {
        StoredCredential::SdJwtVc { raw, .. } => sd_jwt_satisfies(credential, raw, definition),
        StoredCredential::JwtVcJson { raw, .. } => jwt_vc_satisfies(credential, raw, definition),
    }
}

fn sd_jwt_satisfies(
    credential: &CredentialRecord,
    raw: &str,
    definition: &PresentationDefinition,
) -> bool {
    let sd_jwt = match SdJwt::parse(raw) {
        Ok(sd_jwt) => sd_jwt,
        Err(error) => {
            tracing::warn!(id = %credential.id, %error, "skipping undecodable SD-JWT");
            return false;
        }
    };

    match sd_jwt.select_disclosures(definition, true) {
        Ok(Some(selected)) => !selected.is_empty(),
        Ok(None) => false,
        Err(error) => {
            tracing::warn!(id = %credential.id, %error, "cannot evaluate SD-JWT");
            false
        }
    }
}

fn jwt_vc_satisfies(
    credential: &CredentialRecord,
    raw: &str,
    definition: &PresentationDefinition,
) -> bool {
    if definition
        .input_descriptors
        .iter()
        .any(|descriptor| descriptor.requires_limited_disclosure())
    {
        tracing::debug!(id = %credential.id, "JWT-VC cannot limit disclosure");
        return false;
    }

    let payload = match Jwt::decode(raw) {
        Ok(jwt) => Value::Object(jwt.into_payload()),
        Err(error) => {
            tracing::warn!(id = %credential.id, %error, "skipping undecodable JWT-VC");
            return false;
        }
    };

    match definition.evaluate(&payload) {
        Ok(matches) => matches.is_some(),
        Err(error) => {
            tracing::warn!(id = %credential.id, %error, "cannot evaluate JWT-VC");
            false
        }
    }
}

/// All stored credentials satisfying the `definition`, in storage order.
///
/// Fails with [`WalletError::NoSatisfyingCredential`] if there are none.
pub async fn find_satisfying<S: CredentialStore>(
    store: &S,
    definition: &PresentationDefinition,
) -> Result<Vec<CredentialRecord>> {
    let candidates = store.list().await?;
    let total = candidates.len();

    let satisfying: Vec<_> = candidates
        .into_iter()
        .filter(|candidate| credential_satisfies(candidate, definition))
        .collect();

    tracing::debug!(
        definition = %definition.id,
        satisfying = satisfying.len(),
        total,
        "matched stored credentials"
    );

    if satisfying.is_empty() {
        return Err(Error::root(WalletError::NoSatisfyingCredential));
    }

    Ok(satisfying)
}
