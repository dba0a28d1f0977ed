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

use std::fmt;

use bherror::{traits::ForeignError as _, Error, Result};
use openssl::{hash::MessageDigest, pkcs5::pbkdf2_hmac};

use crate::PairwiseError;

const SEED_LEN: usize = 64;
const PBKDF2_ROUNDS: usize = 2048;
const SALT_PREFIX: &str = "mnemonic";

/// Shortest seed accepted by [`MasterSeed::from_bytes`], in bytes.
pub const MIN_SEED_LEN: usize = 16;

/// The secret every account key is derived from.
///
/// The seed is never printed; its [`Debug`](fmt::Debug) output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterSeed(Vec<u8>);

impl MasterSeed {
    /// Derive the seed out of a BIP-39 mnemonic sentence and an optional
    /// passphrase, as
    /// `PBKDF2-HMAC-SHA512(mnemonic, "mnemonic" + passphrase, 2048)`.
    ///
    /// The words are used as given.  They are neither checked against a
    /// word list nor normalized.
    pub fn from_mnemonic(mnemonic: &str, passphrase: &str) -> Result<Self, PairwiseError> {
        if mnemonic.trim().is_empty() {
            return Err(Error::root(PairwiseError::InvalidSeed(
                "empty mnemonic".to_owned(),
            )));
        }

        let salt = format!("{SALT_PREFIX}{passphrase}");
        let mut seed = vec![0u8; SEED_LEN];
        pbkdf2_hmac(
            mnemonic.as_bytes(),
            salt.as_bytes(),
            PBKDF2_ROUNDS,
            MessageDigest::sha512(),
            &mut seed,
        )
        .foreign_err(|| PairwiseError::Derivation)?;

        Ok(Self(seed))
    }

    /// Use raw seed bytes, e.g. ones kept by the platform key store.
    pub fn from_bytes(seed: &[u8]) -> Result<Self, PairwiseError> {
        if !(MIN_SEED_LEN..=SEED_LEN).contains(&seed.len()) {
            return Err(Error::root(PairwiseError::InvalidSeed(format!(
                "seed must be {MIN_SEED_LEN} to {SEED_LEN} bytes long, was {}",
                seed.len()
            ))));
        }
        Ok(Self(seed.to_vec()))
    }

    /// The seed bytes.
    ///
    /// Treat the output as secret material.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for MasterSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSeed(..)")
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn bip39_seed() {
        // https://github.com/trezor/python-mnemonic/blob/master/vectors.json
        let mnemonic = "abandon abandon abandon abandon abandon abandon abandon abandon abandon \
                        abandon abandon about";

        let seed = MasterSeed::from_mnemonic(mnemonic, "TREZOR").unwrap();

        assert_eq!(
            hex::encode(seed.as_bytes()),
            "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e5349553\
             1f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04"
        );
    }

    #[test]
    fn passphrase_changes_the_seed() {
        let mnemonic = "legal winner thank year wave sausage worth useful legal winner thank yellow";

        assert_ne!(
            MasterSeed::from_mnemonic(mnemonic, "").unwrap(),
            MasterSeed::from_mnemonic(mnemonic, "secret").unwrap()
        );
    }

    #[test]
    fn reject_invalid_seeds() {
        assert_matches!(
            MasterSeed::from_mnemonic("  ", "").unwrap_err().error,
            PairwiseError::InvalidSeed(_)
        );
        assert_matches!(
            MasterSeed::from_bytes(&[0; 15]).unwrap_err().error,
            PairwiseError::InvalidSeed(_)
        );
        assert_matches!(
            MasterSeed::from_bytes(&[0; 65]).unwrap_err().error,
            PairwiseError::InvalidSeed(_)
        );
        assert!(MasterSeed::from_bytes(&[0; 16]).is_ok());
    }

    #[test]
    fn debug_output_is_redacted() {
        let seed = MasterSeed::from_bytes(&[0xab; 32]).unwrap();

        assert_eq!(format!("{seed:?}"), "MasterSeed(..)");
    }
}
