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

use bherror::traits::{ErrorContext as _, ForeignError as _};
use openssl::{
    base64,
    error::ErrorStack,
    pkey::{PKey, Public},
    stack::Stack,
    x509::{
        store::{X509Store, X509StoreBuilder},
        verify::X509VerifyFlags,
        X509StoreContext, X509VerifyResult, X509,
    },
};

use crate::{Error, JwtX5Chain, Result};

/// The `x5chain` as carried by the `x5c` and `x5u` JOSE header parameters.
///
/// The certificates are ordered starting with the certificate containing the
/// end-entity key followed by the certificate that signed it, and so on, as
/// stated in [RFC 7515][1].
///
/// [1]: <https://datatracker.ietf.org/doc/html/rfc7515#section-4.1.6>
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct X5Chain {
    leaf: X509,
    intermediates: Vec<X509>,
}

impl X5Chain {
    /// Create a new [`X5Chain`].
    ///
    /// The chain **MUST BE** ordered in such a way that the leaf certificate is
    /// at first place, then goes its parent, and so on.
    ///
    /// # Warning
    ///
    /// The chain is at this point **NOT VALIDATED** against any trust anchor.
    /// Use [`X5Chain::verify`] for that.
    pub fn new(chain: Vec<X509>) -> Result<Self> {
        validate_chain_order(&chain)?;

        let mut chain = chain.into_iter();
        let Some(leaf) = chain.next() else {
            return Err(bherror::Error::root(Error::X5Chain).ctx("chain is empty"));
        };
        let intermediates = chain.collect();

        Ok(Self {
            leaf,
            intermediates,
        })
    }

    /// Constructs a [`X5Chain`] from DER encoded certificates, leaf first.
    pub fn from_raw_bytes(bytes: &[Vec<u8>]) -> Result<Self> {
        let certs = bytes
            .iter()
            .enumerate()
            .map(|(i, der)| X509::from_der(der).foreign_err(|| Error::X5Chain).ctx(|| i))
            .collect::<Result<_>>()
            .ctx(|| "invalid X509 certificate")?;

        Self::new(certs)
    }

    /// Constructs a [`X5Chain`] from a bundle of concatenated PEM
    /// certificates, leaf first.
    ///
    /// This is the representation served from an `x5u` URL, see [RFC 7515][1].
    ///
    /// [1]: <https://datatracker.ietf.org/doc/html/rfc7515#section-4.1.5>
    pub fn from_pem_bundle(pem: &[u8]) -> Result<Self> {
        let certs = X509::stack_from_pem(pem)
            .foreign_err(|| Error::X5Chain)
            .ctx(|| "invalid PEM certificate bundle")?;

        Self::new(certs)
    }

    /// Verify the [`X5Chain`] according to the given [`TrustPolicy`].
    pub fn verify(&self, policy: &TrustPolicy) -> Result<()> {
        match policy {
            TrustPolicy::TrustedRoots(trust) => self.verify_against_trusted_roots(trust),
            TrustPolicy::AllowSelfSigned => {
                let root = self.top_certificate();

                if !is_self_signed(root)? {
                    return Err(bherror::Error::root(Error::Untrusted)
                        .ctx("chain does not end with a self-signed certificate"));
                }

                tracing::debug!("accepting x5chain anchored in its own self-signed root");
                self.verify_against_trusted_roots(&X509Trust::new(vec![root.clone()]))
            }
        }
    }

    /// Verify the [`X5Chain`] against trusted root certificates.
    ///
    /// The root certificate may be in chain, but it **MUST BE** found in
    /// `trust` as well.
    pub fn verify_against_trusted_roots(&self, trust: &X509Trust) -> Result<()> {
        let intermediates = chain_to_stack(self.intermediates.clone())?;
        let trust = certs_to_store(trust.0.clone())?;

        // The store context treats the intermediates as untrusted helpers for
        // building a path from the leaf to one of the anchors in `trust`.
        let mut context = X509StoreContext::new().foreign_err(|| Error::X5Chain)?;
        let is_valid = context
            .init(&trust, &self.leaf, &intermediates, |ctx| {
                clean_up_after_openssl(|| ctx.verify_cert())
            })
            .foreign_err(|| Error::X5Chain)?;

        if !is_valid {
            return Err(bherror::Error::root(Error::Untrusted)
                .ctx("Chain validation against trusted root certificates failed")
                .ctx(format!(
                    "OpenSSL error on depth {}: {}",
                    context.error_depth(),
                    context.error()
                )));
        };

        Ok(())
    }

    /// Convert the chain into a list of DER encoded certificates.
    pub fn as_bytes(&self) -> Result<Vec<Vec<u8>>> {
        std::iter::once(&self.leaf)
            .chain(self.intermediates.iter())
            .map(|cert| cert.to_der().foreign_err(|| Error::X5Chain))
            .collect()
    }

    /// Returns the public key from the leaf certificate.
    pub fn leaf_certificate_key(&self) -> Result<PKey<Public>> {
        self.leaf_certificate()
            .public_key()
            .foreign_err(|| Error::X5Chain)
            .ctx(|| "Failed to access X509 public key")
    }

    /// Returns the leaf certificate.
    pub fn leaf_certificate(&self) -> &X509 {
        &self.leaf
    }

    /// Number of certificates in the chain, including the leaf.
    pub fn len(&self) -> usize {
        self.intermediates.len() + 1
    }

    /// Always `false`, as a chain holds at least the leaf certificate.
    pub fn is_empty(&self) -> bool {
        false
    }

    fn top_certificate(&self) -> &X509 {
        self.intermediates.last().unwrap_or(&self.leaf)
    }
}

/// A collection of [`X509`] trusted root certificates.
///
/// This is used to verify the authenticity of the [`X5Chain`].
#[derive(Debug, Clone, Default)]
pub struct X509Trust(Vec<X509>);

impl X509Trust {
    /// Create a new [`X509Trust`].
    pub fn new(trust: Vec<X509>) -> Self {
        Self(trust)
    }

    /// Load the trust anchors from a bundle of concatenated PEM certificates.
    pub fn from_pem_bundle(pem: &[u8]) -> Result<Self> {
        let certs = X509::stack_from_pem(pem)
            .foreign_err(|| Error::X5Chain)
            .ctx(|| "invalid PEM trust bundle")?;

        Ok(Self(certs))
    }

    /// Returns `true` if there are no trust anchors.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How the root of an [`X5Chain`] is trusted.
#[derive(Debug, Clone)]
pub enum TrustPolicy {
    /// The chain must lead to one of the configured root certificates.
    TrustedRoots(X509Trust),
    /// The chain must end with a self-signed certificate, which is then used
    /// as the only trust anchor.
    ///
    /// This authenticates the chain itself, not its origin; the caller is
    /// expected to pin the issuer by other means.
    AllowSelfSigned,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self::TrustedRoots(X509Trust::default())
    }
}

/// Helper method for converting certificates to `Stack<x509>`.
fn chain_to_stack(chain: impl IntoIterator<Item = X509>) -> Result<Stack<X509>> {
    let mut intermediates = Stack::new().foreign_err(|| Error::X5Chain)?;

    for cert in chain {
        intermediates.push(cert).foreign_err(|| Error::X5Chain)?;
    }

    Ok(intermediates)
}

/// Helper method for converting certificates to `X509Store`.
fn certs_to_store(certificates: impl IntoIterator<Item = X509>) -> Result<X509Store> {
    let mut builder = X509StoreBuilder::new().foreign_err(|| Error::X5Chain)?;
    builder
        .set_flags(X509VerifyFlags::X509_STRICT | X509VerifyFlags::CHECK_SS_SIGNATURE)
        .foreign_err(|| Error::X5Chain)?;

    for cert in certificates {
        builder.add_cert(cert).foreign_err(|| Error::X5Chain)?;
    }

    Ok(builder.build())
}

fn is_self_signed(cert: &X509) -> Result<bool> {
    if cert.issued(cert) != X509VerifyResult::OK {
        return Ok(false);
    }

    clean_up_after_openssl(|| cert.verify(cert.public_key()?.as_ref()))
        .foreign_err(|| Error::X5Chain)
}

/// Validates that the certificates in a chain are in order.
///
/// The chain must be ordered in such a way that the leaf certificate is at the
/// first place, then goes its parent, and so on.
///
/// # Note
///
/// This check is not provided through [`X509StoreContext`]. Without this check,
/// chains in reversed order would seem valid, even though they are not.
fn validate_chain_order(chain: &[X509]) -> Result<()> {
    if chain.is_empty() {
        return Err(bherror::Error::root(Error::X5Chain).ctx("chain is empty"));
    }

    let is_ordered = chain
        .windows(2)
        .try_fold(true, |acc, cert_pair| {
            let child = &cert_pair[0];
            let parent = &cert_pair[1];

            let is_child = clean_up_after_openssl(|| child.verify(parent.public_key()?.as_ref()))?;

            Ok::<_, ErrorStack>(acc && is_child)
        })
        .foreign_err(|| Error::X5Chain)?;

    if !is_ordered {
        return Err(bherror::Error::root(Error::X5Chain).ctx("invalid chain order"));
    }

    Ok(())
}

impl TryFrom<JwtX5Chain> for X5Chain {
    type Error = bherror::Error<Error>;

    fn try_from(jwt_x5chain: JwtX5Chain) -> Result<Self> {
        let der_certs: Vec<Vec<u8>> = jwt_x5chain
            .into_base64_ders()
            .iter()
            .enumerate()
            .map(|(i, base64_der)| {
                base64::decode_block(base64_der)
                    .foreign_err(|| Error::X5Chain)
                    .ctx(|| i)
            })
            .collect::<Result<_>>()
            .ctx(|| "invalid base64 string")?;

        X5Chain::from_raw_bytes(&der_certs)
    }
}

/// Wrap a closure calling OpenSSL with low-level cleanup to make it safer in an async context.
///
/// Usage: wrap an `openssl` call in a closure and call this function with it.
/// Try to make the closure as small as possible.
pub(crate) fn clean_up_after_openssl<T>(
    f: impl FnOnce() -> std::result::Result<T, ErrorStack>,
) -> std::result::Result<T, ErrorStack> {
    let return_value = f()?;

    // The call succeeded, so anything left on the error stack is stale.
    drop(ErrorStack::get());

    Ok(return_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestChain;

    fn assert_empty_error_stack() {
        assert!(ErrorStack::get().errors().is_empty());
    }

    #[test]
    fn chain_verifies_against_its_root() {
        let chain = TestChain::generate().unwrap();

        chain
            .x5chain(false)
            .verify(&TrustPolicy::TrustedRoots(chain.trust()))
            .unwrap();
        assert_empty_error_stack();
    }

    #[test]
    fn chain_with_root_included_verifies() {
        let chain = TestChain::generate().unwrap();
        let x5chain = chain.x5chain(true);

        assert_eq!(x5chain.len(), 3);
        x5chain
            .verify(&TrustPolicy::TrustedRoots(chain.trust()))
            .unwrap();
    }

    #[test]
    fn chain_rejected_by_foreign_root() {
        let chain = TestChain::generate().unwrap();
        let other = TestChain::generate().unwrap();

        let error = chain
            .x5chain(false)
            .verify(&TrustPolicy::TrustedRoots(other.trust()))
            .unwrap_err();

        assert_eq!(error.error, Error::Untrusted);
    }

    #[test]
    fn empty_trust_rejects_everything() {
        let chain = TestChain::generate().unwrap();

        let error = chain
            .x5chain(true)
            .verify(&TrustPolicy::default())
            .unwrap_err();

        assert_eq!(error.error, Error::Untrusted);
    }

    #[test]
    fn self_signed_policy_requires_root_in_chain() {
        let chain = TestChain::generate().unwrap();

        chain
            .x5chain(true)
            .verify(&TrustPolicy::AllowSelfSigned)
            .unwrap();

        let error = chain
            .x5chain(false)
            .verify(&TrustPolicy::AllowSelfSigned)
            .unwrap_err();
        assert_eq!(error.error, Error::Untrusted);
    }

    #[test]
    fn reversed_chain_is_invalid() {
        let chain = TestChain::generate().unwrap();

        let error = X5Chain::new(vec![
            chain.root.clone(),
            chain.intermediate.clone(),
            chain.leaf.clone(),
        ])
        .unwrap_err();

        assert_eq!(error.error, Error::X5Chain);
    }

    #[test]
    fn empty_chain_is_invalid() {
        assert_eq!(X5Chain::new(vec![]).unwrap_err().error, Error::X5Chain);
    }

    #[test]
    fn pem_bundle_round_trip() {
        let chain = TestChain::generate().unwrap();

        let x5chain = X5Chain::from_pem_bundle(&chain.pem_bundle()).unwrap();

        assert_eq!(x5chain, chain.x5chain(true));
        assert_eq!(
            x5chain.leaf_certificate_key().unwrap().public_key_to_der().unwrap(),
            chain.leaf_key.public_key_to_der().unwrap()
        );
    }

    #[test]
    fn der_round_trip() {
        let x5chain = TestChain::generate().unwrap().x5chain(false);

        let bytes = x5chain.as_bytes().unwrap();

        assert_eq!(X5Chain::from_raw_bytes(&bytes).unwrap(), x5chain);
    }

    #[test]
    fn garbage_pem_is_rejected() {
        let error = X5Chain::from_pem_bundle(b"not a certificate").unwrap_err();

        assert_eq!(error.error, Error::X5Chain);
    }
}
