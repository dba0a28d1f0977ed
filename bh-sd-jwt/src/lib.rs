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

//! This crate implements the holder side of Selective Disclosure JSON Web
//! Tokens.
//!
//! It provides functionality to parse and verify SD-JWT credentials, to pick
//! the disclosures a relying party asks for, and to present them with a Key
//! Binding JWT, in accordance with the IETF drafts [Selective Disclosure for
//! JWTs (SD-JWT)][1] & [SD-JWT-based Verifiable Credentials (SD-JWT VC)][2].
//!
//! [1]: <https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt>
//! [2]: <https://datatracker.ietf.org/doc/html/draft-ietf-oauth-sd-jwt-vc>
//!
//! # Details
//!
//! The main components of this crate are the following.
//!
//! * [`SdJwt`] -- Parses the compact serialization, verifies the issuer
//!   signature and reconstructs the disclosed claims.
//! * [`SdJwt::select_disclosures`] -- Picks the minimal set of disclosures
//!   satisfying a [`bh_pex::PresentationDefinition`].
//! * [`SdJwt::present`] & [`KeyBindingJwt`] -- Create and verify Key Binding
//!   JWTs over a presentation.
//!
//! # Examples
//!
//! ```
//! use bh_jws_utils::{json_object, EcCurve, EcSigner};
//! use bh_pex::{claim_path, PresentationDefinition};
//! use bh_sd_jwt::{test_utils::SdJwtIssuer, KeyBindingChallenge, SdJwt};
//!
//! let issuer = SdJwtIssuer::generate().unwrap();
//! let holder = EcSigner::generate(EcCurve::P256, None).unwrap();
//!
//! let issued = issuer
//!     .issue(
//!         json_object!({ "vct": "PID", "given_name": "Erika", "family_name": "Mustermann" }),
//!         &[claim_path!["given_name"], claim_path!["family_name"]],
//!         Some(&holder.public_jwk().unwrap()),
//!     )
//!     .unwrap();
//! let sd_jwt: SdJwt = issued.parse().unwrap();
//!
//! let definition = PresentationDefinition::from_json(&serde_json::json!({
//!     "id": "pid",
//!     "input_descriptors": [{
//!         "id": "pid",
//!         "constraints": { "fields": [{ "path": ["$.family_name"] }] }
//!     }]
//! }))
//! .unwrap();
//!
//! let selected = sd_jwt.select_disclosures(&definition, true).unwrap().unwrap();
//! assert_eq!(selected.len(), 1);
//!
//! let challenge = KeyBindingChallenge {
//!     aud: "https://verifier.example.org".to_owned(),
//!     nonce: "nonce".to_owned(),
//! };
//! let presented = sd_jwt.present(&selected, &challenge, 1_700_000_000, &holder).unwrap();
//!
//! let received: SdJwt = presented.parse().unwrap();
//! received.verify_key_binding(&challenge, 1_700_000_000).unwrap();
//! let claims = received.verify_with_key(&issuer.public_jwk()).unwrap().claims;
//! assert_eq!(claims["family_name"], "Mustermann");
//! assert!(!claims.contains_key("given_name"));
//! ```

// Re-export the `bh-jws-utils` crate
pub use bh_jws_utils;

mod decoder;
mod disclosure;
mod error;
mod hasher;
mod key_binding;
mod sd_jwt;
#[cfg(any(feature = "test-utils", test))]
pub mod test_utils;
mod utils;

pub use decoder::DecodedClaims;
pub use disclosure::*;
pub use error::*;
pub use hasher::*;
pub use key_binding::*;
pub use sd_jwt::SdJwt;
