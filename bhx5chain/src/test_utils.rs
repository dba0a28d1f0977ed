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

//! Runtime generation of short certificate chains for tests.
//!
//! Do NOT use this module for production code. It is a convenience for
//! getting a valid `root -> intermediate -> leaf` hierarchy without shelling
//! out to the `openssl` tool, and without embedding certificates which expire.

use bherror::traits::{ErrorContext as _, ForeignError as _};
use openssl::{
    asn1::{Asn1Integer, Asn1Time},
    bn::BigNum,
    ec::{EcGroup, EcKey},
    hash::MessageDigest,
    nid::Nid,
    pkey::{HasPublic, PKey, PKeyRef, Private},
    x509::{
        extension::{AuthorityKeyIdentifier, BasicConstraints, KeyUsage, SubjectKeyIdentifier},
        X509Name, X509NameBuilder, X509,
    },
};
use rand::RngCore as _;

use crate::{Error, Result, X509Trust, X5Chain};

/// X.509v3
const VERSION: i32 = 2;

const VALIDITY_PERIOD_IN_DAYS: u32 = 30;

/// A freshly generated `root -> intermediate -> leaf` hierarchy.
#[derive(Debug)]
pub struct TestChain {
    /// The self-signed root certificate.
    pub root: X509,
    /// The intermediate CA certificate, issued by [`TestChain::root`].
    pub intermediate: X509,
    /// The end-entity certificate, issued by [`TestChain::intermediate`].
    pub leaf: X509,
    /// The private key certified by [`TestChain::leaf`].
    pub leaf_key: PKey<Private>,
}

impl TestChain {
    /// Generate a chain whose leaf certifies a fresh P-256 key.
    pub fn generate() -> Result<Self> {
        Self::generate_for(generate_p256_key()?)
    }

    /// Generate a chain whose leaf certifies the given key.
    pub fn generate_for(leaf_key: PKey<Private>) -> Result<Self> {
        let root_key = generate_p256_key()?;
        let root_name = name("test root")?;
        let root = issue(
            &root_key,
            &root_name,
            None,
            &root_key,
            &root_name,
            CertificateKind::Ca,
        )
        .ctx(|| "couldn't issue root certificate")?;

        let intermediate_key = generate_p256_key()?;
        let intermediate_name = name("test intermediate")?;
        let intermediate = issue(
            &intermediate_key,
            &intermediate_name,
            Some(&root),
            &root_key,
            &root_name,
            CertificateKind::Ca,
        )
        .ctx(|| "couldn't issue intermediate certificate")?;

        let leaf = issue(
            &leaf_key,
            &name("test leaf")?,
            Some(&intermediate),
            &intermediate_key,
            &intermediate_name,
            CertificateKind::EndEntity,
        )
        .ctx(|| "couldn't issue leaf certificate")?;

        Ok(Self {
            root,
            intermediate,
            leaf,
            leaf_key,
        })
    }

    /// The chain as it would appear in a JOSE header, optionally carrying the
    /// root certificate at the end.
    pub fn x5chain(&self, include_root: bool) -> X5Chain {
        let mut certs = vec![self.leaf.clone(), self.intermediate.clone()];
        if include_root {
            certs.push(self.root.clone());
        }
        // Generated in order, so this cannot fail.
        X5Chain::new(certs).unwrap()
    }

    /// Trust anchors containing only this chain's root.
    pub fn trust(&self) -> X509Trust {
        X509Trust::new(vec![self.root.clone()])
    }

    /// The full chain as concatenated PEM, as served from an `x5u` URL.
    pub fn pem_bundle(&self) -> Vec<u8> {
        [&self.leaf, &self.intermediate, &self.root]
            .into_iter()
            .flat_map(|cert| cert.to_pem().unwrap())
            .collect()
    }
}

enum CertificateKind {
    Ca,
    EndEntity,
}

fn generate_p256_key() -> Result<PKey<Private>> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).foreign_err(|| Error::Builder)?;
    let key = EcKey::generate(&group).foreign_err(|| Error::Builder)?;
    PKey::from_ec_key(key).foreign_err(|| Error::Builder)
}

fn name(common_name: &str) -> Result<X509Name> {
    let mut builder = X509NameBuilder::new().foreign_err(|| Error::Builder)?;
    builder
        .append_entry_by_text("O", "TBTL")
        .foreign_err(|| Error::Builder)?;
    builder
        .append_entry_by_text("CN", common_name)
        .foreign_err(|| Error::Builder)?;
    Ok(builder.build())
}

fn random_serial_number() -> Result<Asn1Integer> {
    let mut bytes = [0u8; 19];
    rand::rng().fill_bytes(&mut bytes);
    // Positive, and never zero.
    bytes[0] = (bytes[0] & 0x7f) | 0x01;

    BigNum::from_slice(&bytes)
        .and_then(|serial| serial.to_asn1_integer())
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot create serial number")
}

fn issue<T: HasPublic>(
    subject_key: &PKeyRef<T>,
    subject_name: &X509Name,
    issuer_cert: Option<&X509>,
    issuer_key: &PKey<Private>,
    issuer_name: &X509Name,
    kind: CertificateKind,
) -> Result<X509> {
    let mut cert_builder = X509::builder().foreign_err(|| Error::Builder)?;
    cert_builder
        .set_version(VERSION)
        .foreign_err(|| Error::Builder)?;
    let serial_number = random_serial_number()?;
    cert_builder
        .set_serial_number(&serial_number)
        .foreign_err(|| Error::Builder)?;

    cert_builder
        .set_pubkey(subject_key)
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot set public key")?;
    cert_builder
        .set_subject_name(subject_name)
        .foreign_err(|| Error::Builder)?;
    cert_builder
        .set_issuer_name(issuer_name)
        .foreign_err(|| Error::Builder)?;

    let not_before = Asn1Time::days_from_now(0).foreign_err(|| Error::Builder)?;
    cert_builder
        .set_not_before(&not_before)
        .foreign_err(|| Error::Builder)?;
    let not_after = Asn1Time::days_from_now(VALIDITY_PERIOD_IN_DAYS).foreign_err(|| Error::Builder)?;
    cert_builder
        .set_not_after(&not_after)
        .foreign_err(|| Error::Builder)?;

    let (basic_constraints, key_usage) = match kind {
        CertificateKind::Ca => (
            BasicConstraints::new().critical().ca().build(),
            KeyUsage::new().critical().key_cert_sign().crl_sign().build(),
        ),
        CertificateKind::EndEntity => (
            BasicConstraints::new().build(),
            KeyUsage::new()
                .critical()
                .digital_signature()
                .non_repudiation()
                .build(),
        ),
    };
    cert_builder
        .append_extension(basic_constraints.foreign_err(|| Error::Builder)?)
        .foreign_err(|| Error::Builder)?;
    cert_builder
        .append_extension(key_usage.foreign_err(|| Error::Builder)?)
        .foreign_err(|| Error::Builder)?;

    let subject_key_identifier = SubjectKeyIdentifier::new()
        .build(&cert_builder.x509v3_context(issuer_cert.map(|cert| cert.as_ref()), None))
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot create subject_key_identifier")?;
    cert_builder
        .append_extension(subject_key_identifier)
        .foreign_err(|| Error::Builder)?;

    // Self-signed roots may omit the authority key identifier.
    if let Some(issuer_cert) = issuer_cert {
        let authority_key_identifier = AuthorityKeyIdentifier::new()
            .keyid(false)
            .issuer(false)
            .build(&cert_builder.x509v3_context(Some(issuer_cert.as_ref()), None))
            .foreign_err(|| Error::Builder)
            .ctx(|| "Cannot create authority_key_identifier")?;
        cert_builder
            .append_extension(authority_key_identifier)
            .foreign_err(|| Error::Builder)?;
    }

    cert_builder
        .sign(issuer_key, MessageDigest::sha256())
        .foreign_err(|| Error::Builder)
        .ctx(|| "Cannot sign certificate")?;

    Ok(cert_builder.build())
}
