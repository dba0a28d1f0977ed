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

//! Receiving credentials with the Pre-Authorized Code Flow of [OpenID4VCI].
//!
//! [OpenID4VCI]: https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0-13.html

mod credential;
mod flow;
mod metadata;
mod offer;
mod proof;
mod token;

pub use credential::*;
pub use flow::*;
pub use metadata::*;
pub use offer::*;
pub use proof::*;
pub use token::*;
