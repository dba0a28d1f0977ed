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

use bh_jws_utils::{json_object, unix_now, JsonObject, JwtHeader, KeyStore, SigningAlgorithm};
use bherror::traits::{ErrorContext as _, PropagateError as _};
use serde::Serialize;

use crate::{Result, WalletError};

/// `typ` header parameter of key proofs.
pub const PROOF_JWT_TYP: &str = "openid4vci-proof+jwt";

/// The `proof_type` of JWT key proofs.
pub const PROOF_TYPE_JWT: &str = "jwt";

/// Key proof of a credential request, demonstrating possession of the key
/// the credential is to be bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Proof {
    /// Always `jwt`.
    pub proof_type: String,
    /// The signed proof JWT.
    pub jwt: String,
}

/// Claims of a proof JWT.
pub fn proof_claims(client_id: &str, credential_issuer: &str, iat: u64, nonce: &str) -> JsonObject {
    json_object!({
        "iss": client_id,
        "aud": credential_issuer,
        "iat": iat,
        "nonce": nonce,
    })
}

/// Sign a proof JWT for `credential_issuer` with the holder-binding key
/// stored under `key_alias`, generating the key if it does not exist yet.
///
/// The public key is put in the `jwk` header parameter.
pub async fn build_proof<K: KeyStore>(
    key_store: &K,
    key_alias: &str,
    client_id: &str,
    credential_issuer: &str,
    nonce: &str,
) -> Result<Proof> {
    let public_jwk = key_store
        .ensure_key(key_alias)
        .await
        .match_err(|error| WalletError::from(error))
        .ctx(|| "cannot obtain holder-binding key")?;

    // The key store sets the `alg` of the key it signs with.
    let header = JwtHeader::new(SigningAlgorithm::Es256)
        .with_typ(PROOF_JWT_TYP)
        .with_jwk(public_jwk);
    let claims = proof_claims(client_id, credential_issuer, unix_now(), nonce);

    let jwt = key_store
        .sign_jwt(key_alias, header, &claims)
        .await
        .match_err(|error| WalletError::from(error))
        .ctx(|| "cannot sign key proof")?;

    Ok(Proof {
        proof_type: PROOF_TYPE_JWT.to_owned(),
        jwt,
    })
}
