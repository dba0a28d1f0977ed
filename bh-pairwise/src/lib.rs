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

//! This crate derives a separate holder key for every relying party a wallet
//! talks to, so that presentations to different verifiers cannot be linked
//! through the holder key.
//!
//! # Details
//!
//! Keys are NIST P-256 keys derived from a single [`MasterSeed`] along the
//! hardened path `m/index'`, as specified by [SLIP-0010].  The seed itself can
//! be obtained from a BIP-39 mnemonic.  The [`AccountRegistry`] assigns the
//! indices, keeping the relying party to index map in an
//! [`AccountBindingStore`].
//!
//! [SLIP-0010]: https://github.com/satoshilabs/slips/blob/master/slip-0010.md
//!
//! # Examples
//!
//! ```
//! use bh_pairwise::{AccountRegistry, InMemoryAccountBindingStore, MasterSeed};
//!
//! # tokio_test();
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn tokio_test() {
//! let seed = MasterSeed::from_bytes(&[7; 32]).unwrap();
//! let registry = AccountRegistry::new(&seed, InMemoryAccountBindingStore::new()).unwrap();
//!
//! let verifier = registry.derive_account("https://verifier.example").await.unwrap();
//! let other = registry.derive_account("https://other.example").await.unwrap();
//! assert_ne!(verifier.thumbprint(), other.thumbprint());
//!
//! // The same relying party always gets the same account back.
//! let again = registry.derive_account("https://verifier.example").await.unwrap();
//! assert_eq!(again.public_jwk(), verifier.public_jwk());
//! # }
//! ```

mod account;
mod error;
mod registry;
mod seed;
mod slip10;
mod store;

pub use account::*;
pub use error::*;
pub use registry::*;
pub use seed::*;
pub use store::*;
