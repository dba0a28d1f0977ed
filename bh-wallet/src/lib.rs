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

//! This crate provides the protocol engine of a verifiable credential wallet:
//! receiving credentials over [OpenID4VCI], and presenting them to verifiers
//! over [OpenID4VP] and [SIOPv2].
//!
//! [OpenID4VCI]: https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0-13.html
//! [OpenID4VP]: https://openid.net/specs/openid-4-verifiable-presentations-1_0-20.html
//! [SIOPv2]: https://openid.net/specs/openid-connect-self-issued-v2-1_0.html
//!
//! # Details
//!
//! Credentials are received with an [`IssuanceFlow`], which accepts a
//! [`CredentialOffer`] using the Pre-Authorized Code Flow.  The credential
//! formats supported are SD-JWT VCs (`vc+sd-jwt`) and JWT-secured W3C VCs
//! (`jwt_vc_json`).  Received credentials are kept as [`CredentialRecord`]s in
//! a [`CredentialStore`].
//!
//! An [`AuthorizationRequest`] of a verifier carries a presentation
//! definition.  The credentials satisfying it are found with
//! [`find_satisfying`], and one of them is presented with a
//! [`PresentationBuilder`].  The holder key of a presentation is the pairwise
//! account of the verifier, so verifiers cannot correlate the holder by key.
//! An SD-JWT bound to the issuance proof key is the exception: its Key
//! Binding JWT has to be signed with the key named in its `cnf` claim.
//! Every presentation is recorded in a [`SharingHistoryStore`].
//!
//! The stores, the key store and the HTTP client are passed in by the
//! application; in-memory stores and a [`reqwest`] based client are provided.
//!
//! # Examples
//!
//! ```no_run
//! use bh_jws_utils::InMemoryKeyStore;
//! use bh_pairwise::{AccountRegistry, InMemoryAccountBindingStore, MasterSeed};
//! use bh_wallet::{
//!     find_satisfying, AuthorizationRequest, CredentialOffer, InMemoryCredentialStore,
//!     InMemorySharingHistoryStore, IssuanceFlow, PresentationBuilder, ReqwestHttpClient,
//!     WalletConfig,
//! };
//!
//! # async fn example() {
//! let config = WalletConfig::default();
//! let http_client = ReqwestHttpClient::default();
//! let key_store = InMemoryKeyStore::default();
//! let credentials = InMemoryCredentialStore::new();
//!
//! // Receive the credentials offered through a QR code.
//! let offer_uri = "openid-credential-offer://?credential_offer_uri=https%3A%2F%2Fi.example%2F1";
//! let offer = CredentialOffer::fetch(&http_client, offer_uri).await.unwrap();
//! let mut flow = IssuanceFlow::new(&config, &http_client, &key_store, &credentials, offer);
//! flow.run(Some("493536")).await.unwrap();
//!
//! // Present one of them to a verifier.
//! let mnemonic = "legal winner thank year wave sausage worth useful legal winner thank yellow";
//! let seed = MasterSeed::from_mnemonic(mnemonic, "").unwrap();
//! let accounts = AccountRegistry::new(&seed, InMemoryAccountBindingStore::new()).unwrap();
//! let history = InMemorySharingHistoryStore::new();
//!
//! let request = AuthorizationRequest::from_uri("openid4vp://?client_id=...").unwrap();
//! let definition = request.presentation_definition.as_ref().unwrap();
//! let satisfying = find_satisfying(&credentials, definition).await.unwrap();
//!
//! let response = PresentationBuilder::new(&config, &accounts, &key_store, &history)
//!     .build(&request, &satisfying[0])
//!     .await
//!     .unwrap();
//! response.submit(&http_client, &request).await.unwrap();
//! # }
//! ```

mod config;
mod error;
mod http;
mod issuance;
mod matcher;
mod presentation;
mod record;
mod store;

#[cfg(test)]
mod test_utils;

pub use config::*;
pub use error::*;
pub use http::*;
pub use issuance::*;
pub use matcher::*;
pub use presentation::*;
pub use record::*;
pub use store::*;
