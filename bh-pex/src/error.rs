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

/// Errors of the presentation definition model.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum PexError {
    /// A field `path` is not a valid JSONPath query.
    #[strum(to_string = "Invalid JSONPath: {0}")]
    InvalidPath(String),
    /// A field `filter` cannot be evaluated, e.g. because of an invalid
    /// `pattern`.
    #[strum(to_string = "Invalid filter: {0}")]
    InvalidFilter(String),
    /// The presentation definition is structurally invalid.
    #[strum(to_string = "Invalid presentation definition: {0}")]
    InvalidDefinition(String),
}

impl bherror::BhError for PexError {}
