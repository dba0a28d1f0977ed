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

//! This crate provides functions and types for working with compact [JSON Web
//! Signatures (JWS)][1] as used by verifiable credential wallets.
//!
//! [1]: https://datatracker.ietf.org/doc/html/rfc7515
//!
//! # Details
//!
//! A token is decoded with [`Jwt::decode`] and its signature checked either
//! with a known key ([`Jwt::verify_with_key`]) or with a key found through the
//! header ([`Jwt::verify`]), in which case a [`KeyResolver`] looks at the
//! `x5c`, `x5u`, `jwk` and `kid` header parameters, in that order.
//!
//! The supported algorithms are `ES256`, `ES256K` and `RS256`, see
//! [`SigningAlgorithm`].  Signatures are produced and checked by the
//! [`openssl`] backed implementations of the [`Signer`] and
//! [`SignatureVerifier`] traits, e.g. [`EcSigner`] and [`EcVerifier`].
//!
//! Holder keys are kept in a [`KeyStore`], which only ever hands out public
//! keys and signed tokens.
//!
//! # Examples
//!
//! ## Sign and verify a JWT
//!
//! ```
//! use bh_jws_utils::{
//!     json_object, sign_jwt, EcCurve, EcSigner, Jwt, JwtHeader, SigningAlgorithm,
//! };
//!
//! // Construct a new signer
//! let signer = EcSigner::generate(EcCurve::P256, Some("dummy-kid".to_string())).unwrap();
//!
//! // Construct the claims
//! let claims = json_object!({
//!    "sub": "1234567890",
//!    "name": "John Doe",
//!    "iat": 1516239022
//! });
//!
//! // Sign the JWT
//! let signed_jwt = sign_jwt(&signer, JwtHeader::new(SigningAlgorithm::Es256), &claims).unwrap();
//!
//! // Get the public JWK for verification
//! let public_jwk = signer.public_jwk().unwrap();
//!
//! // Verify the JWT
//! let jwt = Jwt::decode(&signed_jwt).unwrap();
//! let verified = jwt.verify_with_key(&public_jwk).unwrap();
//! assert_eq!(verified["name"], "John Doe");
//! ```

mod error;
mod header;
mod http_client;
mod jwk;
mod jwt;
mod keystore;
mod openssl_impl;
mod resolve;
mod traits;
mod utils;

pub use error::*;
pub use header::*;
pub use http_client::*;
pub use jwk::*;
pub use jwt::*;
pub use keystore::*;
pub use openssl_impl::*;
pub use resolve::*;
pub use traits::*;
pub use utils::*;

/// Helper macro with the same syntax as [`serde_json::json`] specialized for
/// constructing JSON objects.
///
/// It will construct a more specific type ([`serde_json::Map<String,Value>`])
/// than just [`serde_json::Value`] when constructing an object, and panic if
/// the syntax is valid JSON but not an object.
#[macro_export]
macro_rules! json_object {
    ($stuff:tt) => {
        match ::serde_json::json!($stuff) {
            ::serde_json::Value::Object(o) => o,
            _ => unreachable!("JSON literal wasn't an object"),
        }
    };
}
