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

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! This crate provides functions and types for working with an ordered array
//! of X.509 certificates (`x5chain`) as carried by the `x5c` and `x5u` JOSE
//! header parameters of [RFC 7515][1].
//!
//! [1]: <https://datatracker.ietf.org/doc/html/rfc7515#section-4.1.5>
//!
//! # Details
//!
//! The primary API this crate offers is the [`X5Chain`] struct, which is
//! validated against a [`TrustPolicy`]: either a set of trusted roots
//! ([`X509Trust`]), or the self-signed certificate the chain itself ends with.
//!
//! We also have a [`JwtX5Chain`] type which mirrors the JSON representation
//! of the `x5c` header. It is only a "wrapper" type around [`X5Chain`], and as
//! such isn't meant for any manipulation of the `x5chain` itself.
//!
//! # Examples
//!
//! ```ignore
//! // Deserialized out of a JWT header
//! let jwt_x5chain: bhx5chain::JwtX5Chain = serde_json::from_value(header["x5c"].clone())?;
//! let x5chain = bhx5chain::X5Chain::try_from(jwt_x5chain)?;
//!
//! let trust = bhx5chain::X509Trust::new(vec![trusted_root_certificate]);
//! x5chain.verify(&bhx5chain::TrustPolicy::TrustedRoots(trust))?;
//!
//! let leaf_key = x5chain.leaf_certificate_key()?;
//! ```

mod error;
mod jwt;
mod x5chain;

#[cfg(any(feature = "test-utils", test))]
pub mod test_utils;

pub use error::*;
pub use jwt::*;
pub use x5chain::*;
