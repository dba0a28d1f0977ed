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

use bherror::traits::ForeignError as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, WalletError};

/// Default `client_id` the wallet identifies itself with towards issuers.
pub const DEFAULT_CLIENT_ID: &str = "bh-wallet";

/// Default alias of the holder-binding key used for issuance proofs.
pub const DEFAULT_PROOF_KEY_ALIAS: &str = "holder-binding";

/// Default validity of a Verifiable Presentation JWT, two hours.
pub const DEFAULT_VP_VALIDITY_SECS: u64 = 2 * 60 * 60;

/// Wallet settings.
///
/// Every field has a default, so a configuration document only needs to
/// contain the values it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// The OAuth `client_id` of the wallet, used as the `iss` of issuance
    /// proofs.
    pub client_id: String,
    /// Alias in the key store of the key credentials are bound to.
    pub proof_key_alias: String,
    /// Validity of the presentation and ID tokens, in seconds.
    pub vp_validity_secs: u64,
    /// Whether claims requested by optional fields are disclosed.
    pub disclose_optional_fields: bool,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_owned(),
            proof_key_alias: DEFAULT_PROOF_KEY_ALIAS.to_owned(),
            vp_validity_secs: DEFAULT_VP_VALIDITY_SECS,
            disclose_optional_fields: true,
        }
    }
}

impl WalletConfig {
    /// Parse a JSON configuration document, which must be an object.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(json)
            .match_foreign_err(|error| WalletError::InvalidConfiguration(error.to_string()))?;
        if !document.is_object() {
            return Err(bherror::Error::root(WalletError::InvalidConfiguration(
                "configuration is not a JSON object".to_owned(),
            )));
        }

        let config: Self = serde_json::from_value(document)
            .match_foreign_err(|error| WalletError::InvalidConfiguration(error.to_string()))?;

        if config.client_id.is_empty() {
            return Err(bherror::Error::root(WalletError::InvalidConfiguration(
                "empty `client_id`".to_owned(),
            )));
        }
        if config.proof_key_alias.is_empty() {
            return Err(bherror::Error::root(WalletError::InvalidConfiguration(
                "empty `proof_key_alias`".to_owned(),
            )));
        }

        Ok(config)
    }
}
