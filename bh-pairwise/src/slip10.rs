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

//! [SLIP-0010] hierarchical deterministic derivation of NIST P-256 private
//! keys.  Only hardened derivation is supported, as only private keys are
//! ever derived.
//!
//! [SLIP-0010]: https://github.com/satoshilabs/slips/blob/master/slip-0010.md

use std::cmp::Ordering;

use bherror::{traits::ForeignError as _, Error, Result};
use openssl::{
    bn::{BigNum, BigNumContext},
    ec::EcGroup,
    hash::MessageDigest,
    nid::Nid,
    pkey::PKey,
    sign::Signer,
};

use crate::{MasterSeed, PairwiseError};

const CURVE_KEY: &[u8] = b"Nist256p1 seed";
const HARDENED_OFFSET: u32 = 1 << 31;
const KEY_LEN: usize = 32;

/// A private key together with its chain code.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct ExtendedPrivateKey {
    pub(crate) key: [u8; KEY_LEN],
    chain_code: [u8; KEY_LEN],
}

impl std::fmt::Debug for ExtendedPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExtendedPrivateKey(..)")
    }
}

impl ExtendedPrivateKey {
    /// The master key `m`.
    pub(crate) fn master(seed: &MasterSeed) -> Result<Self, PairwiseError> {
        let order = curve_order()?;

        let mut i = hmac_sha512(CURVE_KEY, seed.as_bytes())?;
        loop {
            let (il, ir) = i.split_at(KEY_LEN);
            let il_number = BigNum::from_slice(il).foreign_err(|| PairwiseError::Derivation)?;

            if il_number.num_bits() != 0 && il_number.ucmp(&order) == Ordering::Less {
                return Ok(Self {
                    key: to_key_bytes(il)?,
                    chain_code: to_key_bytes(ir)?,
                });
            }
            i = hmac_sha512(CURVE_KEY, &i)?;
        }
    }

    /// The hardened child `index'`.
    pub(crate) fn derive_hardened(&self, index: u32) -> Result<Self, PairwiseError> {
        if index >= HARDENED_OFFSET {
            return Err(Error::root(PairwiseError::IndexOutOfRange(index)));
        }
        let child_number = (index | HARDENED_OFFSET).to_be_bytes();

        let order = curve_order()?;
        let parent_key = BigNum::from_slice(&self.key).foreign_err(|| PairwiseError::Derivation)?;
        let mut ctx = BigNumContext::new().foreign_err(|| PairwiseError::Derivation)?;

        let mut data = Vec::with_capacity(1 + KEY_LEN + child_number.len());
        data.push(0x00);
        data.extend_from_slice(&self.key);
        data.extend_from_slice(&child_number);

        loop {
            let i = hmac_sha512(&self.chain_code, &data)?;
            let (il, ir) = i.split_at(KEY_LEN);
            let il_number = BigNum::from_slice(il).foreign_err(|| PairwiseError::Derivation)?;

            let mut child_key = BigNum::new().foreign_err(|| PairwiseError::Derivation)?;
            child_key
                .mod_add(&il_number, &parent_key, &order, &mut ctx)
                .foreign_err(|| PairwiseError::Derivation)?;

            if il_number.ucmp(&order) == Ordering::Less && child_key.num_bits() != 0 {
                let key = child_key
                    .to_vec_padded(KEY_LEN as i32)
                    .foreign_err(|| PairwiseError::Derivation)?;
                return Ok(Self {
                    key: to_key_bytes(&key)?,
                    chain_code: to_key_bytes(ir)?,
                });
            }

            // Out of range, retry with `0x01 || IR || ser32(i)`.
            data.clear();
            data.push(0x01);
            data.extend_from_slice(ir);
            data.extend_from_slice(&child_number);
        }
    }
}

fn curve_order() -> Result<BigNum, PairwiseError> {
    let group =
        EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).foreign_err(|| PairwiseError::Derivation)?;
    let mut ctx = BigNumContext::new().foreign_err(|| PairwiseError::Derivation)?;
    let mut order = BigNum::new().foreign_err(|| PairwiseError::Derivation)?;
    group
        .order(&mut order, &mut ctx)
        .foreign_err(|| PairwiseError::Derivation)?;
    Ok(order)
}

fn hmac_sha512(key: &[u8], data: &[u8]) -> Result<Vec<u8>, PairwiseError> {
    let key = PKey::hmac(key).foreign_err(|| PairwiseError::Derivation)?;
    let mut signer =
        Signer::new(MessageDigest::sha512(), &key).foreign_err(|| PairwiseError::Derivation)?;
    signer
        .update(data)
        .foreign_err(|| PairwiseError::Derivation)?;
    signer.sign_to_vec().foreign_err(|| PairwiseError::Derivation)
}

fn to_key_bytes(bytes: &[u8]) -> Result<[u8; KEY_LEN], PairwiseError> {
    bytes
        .try_into()
        .map_err(|_| Error::root(PairwiseError::Derivation))
}
