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

//! This crate provides the model of [DIF Presentation Exchange 2.0][1]
//! presentation definitions, and their evaluation against the claims of a
//! credential.
//!
//! [1]: https://identity.foundation/presentation-exchange/spec/v2.0.0/
//!
//! # Details
//!
//! A [`PresentationDefinition`] lists [`InputDescriptor`]s, each of which
//! constrains a credential through a list of [`Field`]s.  A field is
//! satisfied by the first claim found by one of its JSONPath queries which
//! passes its [`Filter`], a subset of JSON Schema.
//!
//! Evaluation reports where every match was found as a [`ClaimPath`], which
//! lets selective disclosure formats reveal exactly the matched claims.
//!
//! # Examples
//!
//! ```
//! use bh_pex::{claim_path, PresentationDefinition};
//! use serde_json::json;
//!
//! let definition = PresentationDefinition::from_json(&json!({
//!     "id": "employment",
//!     "input_descriptors": [{
//!         "id": "employee",
//!         "constraints": {
//!             "fields": [
//!                 { "path": ["$.vct"], "filter": { "const": "EmployeeCredential" } },
//!                 { "path": ["$.address.country"] }
//!             ]
//!         }
//!     }]
//! }))
//! .unwrap();
//!
//! let claims = json!({
//!     "vct": "EmployeeCredential",
//!     "address": { "country": "DE" }
//! });
//!
//! let matches = definition.evaluate(&claims).unwrap().unwrap();
//! assert_eq!(matches[0].fields[1].path, claim_path!["address", "country"]);
//! ```

mod error;
mod evaluate;
mod filter;
mod models;
mod path;

pub use error::*;
pub use evaluate::*;
pub use filter::*;
pub use models::*;
pub use path::*;
