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

use bh_jws_utils::KeyStoreError;
use bh_pairwise::PairwiseError;

/// Errors of the wallet protocol flows.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum WalletError {
    /// The configuration could not be parsed.
    #[strum(to_string = "Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The credential offer is malformed, or misses a required parameter.
    #[strum(to_string = "Invalid credential offer: {0}")]
    InvalidOffer(String),

    /// Neither the credential issuer nor its authorization server published
    /// usable metadata.
    #[strum(to_string = "Metadata discovery failed: {0}")]
    MetadataDiscovery(String),

    /// The token endpoint answered with an OAuth error.
    #[strum(to_string = "Token request rejected: {error}")]
    TokenErrorResponse {
        /// The OAuth `error` code.
        error: String,
        /// The human-readable `error_description`, if any.
        error_description: Option<String>,
    },

    /// A request could not be sent, or its response could not be read.
    #[strum(to_string = "Transport error: {0}")]
    Transport(String),

    /// The credential endpoint rejected the request, or answered in a way
    /// the wallet does not support.
    #[strum(to_string = "Credential request rejected: {error}")]
    CredentialRequest {
        /// The OAuth `error` code.
        error: String,
        /// The human-readable `error_description`, if any.
        error_description: Option<String>,
    },

    /// The issued credential could not be decoded.
    #[strum(to_string = "Credential decoding failed")]
    CredentialDecoding,

    /// The credential format is not supported by the wallet.
    #[strum(to_string = "Unsupported credential format: {0}")]
    UnsupportedFormat(String),

    /// No stored credential satisfies the presentation definition.
    #[strum(to_string = "No credential satisfies the presentation definition")]
    NoSatisfyingCredential,

    /// The authorization request of the verifier is malformed.
    #[strum(to_string = "Invalid presentation request: {0}")]
    InvalidPresentationRequest(String),

    /// A credential or sharing history store failed.
    #[strum(to_string = "Store failed")]
    Store,

    /// Producing a signature failed.
    #[strum(to_string = "Signing failed")]
    Signing,

    /// The user declined the use of the holder key.
    #[strum(to_string = "Operation cancelled")]
    Cancelled,

    /// The relying party already has a pairwise account.
    #[strum(to_string = "already shared account")]
    AccountAlreadyBound,

    /// The pairwise account could not be derived.
    #[strum(to_string = "Account derivation failed")]
    AccountDerivation,
}

impl bherror::BhError for WalletError {}

impl From<&KeyStoreError> for WalletError {
    fn from(error: &KeyStoreError) -> Self {
        match error {
            KeyStoreError::Cancelled => Self::Cancelled,
            _ => Self::Signing,
        }
    }
}

impl From<&PairwiseError> for WalletError {
    fn from(error: &PairwiseError) -> Self {
        match error {
            PairwiseError::AccountAlreadyBound => Self::AccountAlreadyBound,
            PairwiseError::Store => Self::Store,
            _ => Self::AccountDerivation,
        }
    }
}

/// Convenience alias for results of this crate.
pub type Result<T, E = WalletError> = bherror::Result<T, E>;
