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

/// The name of the array of digests of the disclosable properties of an
/// object, as specified [here].
///
/// [here]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-07#section-5.2.4.1
pub(crate) const SD: &str = "_sd";

/// The field name of the hash algorithm used to hide the claims, as specified [here].
///
/// [here]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-07#name-hash-function-claim
pub(crate) const SD_ALG: &str = "_sd_alg";

/// The key of the digest of a disclosable array element, as specified [here].
///
/// [here]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-07#section-5.2.4.2
pub(crate) const ELLIPSIS: &str = "...";

/// Claim names which must not be disclosed or used as plain claims anywhere in
/// the decoded payload.
pub(crate) const RESERVED_CLAIM_NAMES: [&str; 2] = [SD, ELLIPSIS];

/// Separator of the SD-JWT components.
pub(crate) const SD_JWT_DELIMITER: char = '~';
