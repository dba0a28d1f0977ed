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

/// Errors of the pairwise key derivation.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum PairwiseError {
    /// The seed cannot be used for key derivation.
    #[strum(to_string = "Invalid seed: {0}")]
    InvalidSeed(String),

    /// The cryptographic backend failed to derive a key.
    #[strum(to_string = "Key derivation failed")]
    Derivation,

    /// The account index is outside the hardened derivation range.
    #[strum(to_string = "Account index {0} out of range")]
    IndexOutOfRange(u32),

    /// The relying party already has an account.
    #[strum(to_string = "already shared account")]
    AccountAlreadyBound,

    /// The account binding store failed.
    #[strum(to_string = "Account binding store failed")]
    Store,
}

impl bherror::BhError for PairwiseError {}
