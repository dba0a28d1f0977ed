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

use std::result::Result as StdResult;

use bherror::{
    traits::{ErrorContext, ForeignError, PropagateError as _},
    Error, Result,
};
use openssl::{
    bn::{BigNum, BigNumContext},
    ec::{EcGroup, EcKey, EcPoint},
    ecdsa::EcdsaSig,
    hash::MessageDigest,
    nid::Nid,
    pkey::{Id, PKey, PKeyRef, Private, Public},
    rsa::Rsa,
    sha::sha256,
};
use serde_json::Value;

use crate::{
    error::{CryptoError, FormatError},
    utils::{base64_url_decode, base64_url_encode},
    BoxError, JwkPublic, SignatureVerifier, Signer, SigningAlgorithm,
};

type EcPrivate = EcKey<Private>;
type EcPublic = EcKey<Public>;

/// Length in bytes of a coordinate, a private scalar, and each of the `r` and
/// `s` halves of a JWS signature, on both supported curves.
const COORDINATE_LEN: usize = 32;

const KTY_EC: &str = "EC";
const KTY_RSA: &str = "RSA";

/// Elliptic curves supported for ECDSA signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcCurve {
    /// NIST P-256, a.k.a. `secp256r1` or `prime256v1`.
    P256,
    /// The `secp256k1` Koblitz curve.
    Secp256k1,
}

impl EcCurve {
    fn nid(self) -> Nid {
        match self {
            // X9_62_PRIME256V1 is the ANSI X9.62 name of secp256r1, i.e. NIST P-256
            Self::P256 => Nid::X9_62_PRIME256V1,
            Self::Secp256k1 => Nid::SECP256K1,
        }
    }

    fn from_nid(nid: Nid) -> Option<Self> {
        match nid {
            Nid::X9_62_PRIME256V1 => Some(Self::P256),
            Nid::SECP256K1 => Some(Self::Secp256k1),
            _ => None,
        }
    }

    /// The `crv` parameter of a JWK on this curve.
    pub fn jwk_crv(self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::Secp256k1 => "secp256k1",
        }
    }

    /// Parse the `crv` parameter of a JWK.
    pub fn from_jwk_crv(crv: &str) -> Option<Self> {
        match crv {
            "P-256" => Some(Self::P256),
            "secp256k1" => Some(Self::Secp256k1),
            _ => None,
        }
    }

    /// The JWS algorithm using this curve.
    pub fn algorithm(self) -> SigningAlgorithm {
        match self {
            Self::P256 => SigningAlgorithm::Es256,
            Self::Secp256k1 => SigningAlgorithm::Es256k,
        }
    }

    /// The OpenSSL group of this curve.
    pub fn group(self) -> Result<EcGroup, CryptoError> {
        EcGroup::from_curve_name(self.nid()).foreign_err(|| CryptoError::CryptoBackend)
    }
}

/// Returns the `base64url`-encoded affine coordinates of the public key.
fn ec_affine_coords<T: openssl::pkey::HasPublic>(
    key: &EcKey<T>,
) -> Result<(String, String), CryptoError> {
    let mut x = BigNum::new().foreign_err(|| CryptoError::CryptoBackend)?;
    let mut y = BigNum::new().foreign_err(|| CryptoError::CryptoBackend)?;
    let mut ctx = BigNumContext::new().foreign_err(|| CryptoError::CryptoBackend)?;
    key.public_key()
        .affine_coordinates(key.group(), &mut x, &mut y, &mut ctx)
        .foreign_err(|| CryptoError::CryptoBackend)?;

    let x = x
        .to_vec_padded(COORDINATE_LEN as i32)
        .foreign_err(|| CryptoError::CryptoBackend)?;
    let y = y
        .to_vec_padded(COORDINATE_LEN as i32)
        .foreign_err(|| CryptoError::CryptoBackend)?;
    Ok((base64_url_encode(x), base64_url_encode(y)))
}

fn ec_public_jwk<T: openssl::pkey::HasPublic>(
    key: &EcKey<T>,
    curve: EcCurve,
    kid: Option<&str>,
) -> Result<JwkPublic, CryptoError> {
    let (x, y) = ec_affine_coords(key)?;

    let mut jwk = crate::json_object!({
        "kty": KTY_EC,
        "crv": curve.jwk_crv(),
        "x": x,
        "y": y,
    });

    if let Some(kid) = kid {
        jwk.insert("kid".to_owned(), Value::String(kid.to_owned()));
    }

    Ok(jwk)
}

/// [`Signer`] implementation for ECDSA with SHA-256, on either of the
/// [`EcCurve`]s, i.e. the `ES256` and `ES256K` algorithms.
pub struct EcSigner {
    private_key: EcPrivate,
    curve: EcCurve,
    kid: Option<String>,
}

impl std::fmt::Debug for EcSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcSigner")
            .field("curve", &self.curve)
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

impl EcSigner {
    /// Generate a fresh key on the given curve.
    pub fn generate(curve: EcCurve, kid: Option<String>) -> Result<Self, CryptoError> {
        let group = curve.group()?;
        let private_key = EcPrivate::generate(group.as_ref())
            .foreign_err(|| CryptoError::KeyGenerationFailed)?;

        Ok(Self {
            private_key,
            curve,
            kid,
        })
    }

    /// Create a signer from a private key in the PEM format. The curve is
    /// taken from the key.
    pub fn from_private_key_pem(
        private_key_pem: &[u8],
        kid: Option<String>,
    ) -> Result<Self, CryptoError> {
        let private_key = EcPrivate::private_key_from_pem(private_key_pem)
            .foreign_err(|| CryptoError::InvalidKey)?;

        let curve = private_key
            .group()
            .curve_name()
            .and_then(EcCurve::from_nid)
            .ok_or_else(|| Error::root(CryptoError::Unsupported("EC curve".to_owned())))?;

        Ok(Self {
            private_key,
            curve,
            kid,
        })
    }

    /// Create a signer from a big-endian private scalar.
    ///
    /// The scalar must be in the range `[1, n)`, where `n` is the order of the
    /// curve.
    pub fn from_secret_scalar(
        curve: EcCurve,
        scalar: &[u8],
        kid: Option<String>,
    ) -> Result<Self, CryptoError> {
        let group = curve.group()?;
        let private_number = BigNum::from_slice(scalar).foreign_err(|| CryptoError::InvalidKey)?;
        let ctx = BigNumContext::new().foreign_err(|| CryptoError::CryptoBackend)?;

        let mut public_point =
            EcPoint::new(group.as_ref()).foreign_err(|| CryptoError::CryptoBackend)?;
        public_point
            .mul_generator(group.as_ref(), &private_number, &ctx)
            .foreign_err(|| CryptoError::InvalidKey)?;

        let private_key =
            EcPrivate::from_private_components(group.as_ref(), &private_number, &public_point)
                .foreign_err(|| CryptoError::InvalidKey)?;
        private_key
            .check_key()
            .foreign_err(|| CryptoError::InvalidKey)
            .ctx(|| "scalar is not a valid private key")?;

        Ok(Self {
            private_key,
            curve,
            kid,
        })
    }

    /// The curve of the key.
    pub fn curve(&self) -> EcCurve {
        self.curve
    }

    /// Construct a JWK JSON object for the public counterpart of this key,
    /// with the `kid` set at construction, if any.
    pub fn public_jwk(&self) -> Result<JwkPublic, CryptoError> {
        ec_public_jwk(&self.private_key, self.curve, self.kid.as_deref())
    }

    /// Construct a JWK JSON object for this key, including the private `d`
    /// member.
    ///
    /// Treat the output as secret material.
    pub fn private_jwk(&self) -> Result<JwkPublic, CryptoError> {
        let d = self
            .private_key
            .private_key()
            .to_vec_padded(COORDINATE_LEN as i32)
            .foreign_err(|| CryptoError::CryptoBackend)?;

        let mut jwk = self.public_jwk()?;
        jwk.insert("d".to_owned(), Value::String(base64_url_encode(d)));
        Ok(jwk)
    }
}

impl Signer for EcSigner {
    fn algorithm(&self) -> SigningAlgorithm {
        self.curve.algorithm()
    }

    fn sign(&self, message: &[u8]) -> StdResult<Vec<u8>, BoxError> {
        let digest = sha256(message);
        let signature = EcdsaSig::sign(&digest, self.private_key.as_ref())?;

        let mut jws = signature.r().to_vec_padded(COORDINATE_LEN as i32)?;
        jws.extend(signature.s().to_vec_padded(COORDINATE_LEN as i32)?);
        Ok(jws)
    }

    fn public_jwk(&self) -> StdResult<JwkPublic, BoxError> {
        Ok(self.public_jwk()?)
    }

    fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }
}

/// [`Signer`] implementation supporting the `RS256` algorithm.
pub struct Rs256Signer {
    private_key: PKey<Private>,
    kid: Option<String>,
}

impl std::fmt::Debug for Rs256Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rs256Signer")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

/// Minimum RSA modulus size accepted for signing, in bits.
const RSA_MIN_BITS: u32 = 2048;

impl Rs256Signer {
    /// Generate a fresh RSA key with a modulus of `bits` bits.
    pub fn generate(bits: u32, kid: Option<String>) -> Result<Self, CryptoError> {
        if bits < RSA_MIN_BITS {
            return Err(Error::root(CryptoError::Unsupported(format!(
                "RSA modulus of {bits} bits"
            ))));
        }

        let rsa = Rsa::generate(bits).foreign_err(|| CryptoError::KeyGenerationFailed)?;
        let private_key = PKey::from_rsa(rsa).foreign_err(|| CryptoError::CryptoBackend)?;

        Ok(Self { private_key, kid })
    }

    /// Create a signer from a private RSA key in the PEM format.
    pub fn from_private_key_pem(
        private_key_pem: &[u8],
        kid: Option<String>,
    ) -> Result<Self, CryptoError> {
        let rsa =
            Rsa::private_key_from_pem(private_key_pem).foreign_err(|| CryptoError::InvalidKey)?;
        let private_key = PKey::from_rsa(rsa).foreign_err(|| CryptoError::CryptoBackend)?;

        Ok(Self { private_key, kid })
    }

    /// The private key, for issuing test certificates over it.
    pub fn private_key(&self) -> &PKeyRef<Private> {
        &self.private_key
    }
}

impl Signer for Rs256Signer {
    fn algorithm(&self) -> SigningAlgorithm {
        SigningAlgorithm::Rs256
    }

    fn sign(&self, message: &[u8]) -> StdResult<Vec<u8>, BoxError> {
        let mut signer = openssl::sign::Signer::new(MessageDigest::sha256(), &self.private_key)?;
        signer.update(message)?;
        Ok(signer.sign_to_vec()?)
    }

    fn public_jwk(&self) -> StdResult<JwkPublic, BoxError> {
        let rsa = self.private_key.rsa()?;
        let mut jwk = rsa_public_jwk(rsa.n(), rsa.e());
        if let Some(kid) = &self.kid {
            jwk.insert("kid".to_owned(), Value::String(kid.clone()));
        }
        Ok(jwk)
    }

    fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }
}

fn rsa_public_jwk(n: &openssl::bn::BigNumRef, e: &openssl::bn::BigNumRef) -> JwkPublic {
    crate::json_object!({
        "kty": KTY_RSA,
        "n": base64_url_encode(n.to_vec()),
        "e": base64_url_encode(e.to_vec()),
    })
}

/// [`SignatureVerifier`] implementation for ECDSA with SHA-256 on the given
/// curve.
#[derive(Debug, Clone, Copy)]
pub struct EcVerifier(pub EcCurve);

impl SignatureVerifier for EcVerifier {
    fn algorithm(&self) -> SigningAlgorithm {
        self.0.algorithm()
    }

    fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &JwkPublic,
    ) -> StdResult<bool, BoxError> {
        let public_key = ec_public_key_from_jwk(public_key, self.0)?;

        if signature.len() != 2 * COORDINATE_LEN {
            return Ok(false);
        }
        let (r, s) = signature.split_at(COORDINATE_LEN);
        let r = BigNum::from_slice(r)?;
        let s = BigNum::from_slice(s)?;
        let ecdsa_sig = EcdsaSig::from_private_components(r, s)?;

        let digest = sha256(message);

        Ok(ecdsa_sig.verify(&digest, public_key.as_ref())?)
    }
}

/// [`SignatureVerifier`] implementation supporting the `RS256` algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rs256Verifier;

impl SignatureVerifier for Rs256Verifier {
    fn algorithm(&self) -> SigningAlgorithm {
        SigningAlgorithm::Rs256
    }

    fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &JwkPublic,
    ) -> StdResult<bool, BoxError> {
        let public_key = PKey::from_rsa(rsa_public_key_from_jwk(public_key)?)?;

        let mut verifier = openssl::sign::Verifier::new(MessageDigest::sha256(), &public_key)?;
        verifier.update(message)?;
        // A signature of the wrong length is reported as an error by OpenSSL.
        Ok(verifier.verify(signature).unwrap_or(false))
    }
}

/// The [`SignatureVerifier`] for the given algorithm.
pub fn verifier_for(alg: SigningAlgorithm) -> &'static dyn SignatureVerifier {
    const ES256: EcVerifier = EcVerifier(EcCurve::P256);
    const ES256K: EcVerifier = EcVerifier(EcCurve::Secp256k1);

    match alg {
        SigningAlgorithm::Es256 => &ES256,
        SigningAlgorithm::Es256k => &ES256K,
        SigningAlgorithm::Rs256 => &Rs256Verifier,
    }
}

/// The only [`SigningAlgorithm`] the given public JWK can be used with.
///
/// Returns [`None`] for key types and curves which none of the supported
/// algorithms use.
pub fn jwk_signing_algorithm(jwk: &JwkPublic) -> Option<SigningAlgorithm> {
    match jwk.get("kty").and_then(Value::as_str)? {
        KTY_EC => jwk
            .get("crv")
            .and_then(Value::as_str)
            .and_then(EcCurve::from_jwk_crv)
            .map(EcCurve::algorithm),
        KTY_RSA => Some(SigningAlgorithm::Rs256),
        _ => None,
    }
}

/// Convert an OpenSSL public key, e.g. out of a certificate, to a public JWK.
pub fn public_jwk_from_pkey(pkey: &PKeyRef<Public>) -> Result<JwkPublic, CryptoError> {
    match pkey.id() {
        Id::EC => {
            let ec_key = pkey.ec_key().foreign_err(|| CryptoError::CryptoBackend)?;
            let curve = ec_key
                .group()
                .curve_name()
                .and_then(EcCurve::from_nid)
                .ok_or_else(|| Error::root(CryptoError::Unsupported("EC curve".to_owned())))?;
            ec_public_jwk(&ec_key, curve, None)
        }
        Id::RSA => {
            let rsa = pkey.rsa().foreign_err(|| CryptoError::CryptoBackend)?;
            Ok(rsa_public_jwk(rsa.n(), rsa.e()))
        }
        id => Err(Error::root(CryptoError::Unsupported(format!(
            "key type {:?}",
            id
        )))),
    }
}

pub(crate) fn ec_public_key_from_jwk(
    public_key: &JwkPublic,
    curve: EcCurve,
) -> Result<EcPublic, FormatError> {
    check_jwk_field(public_key, "kty", KTY_EC)?;
    check_jwk_field(public_key, "crv", curve.jwk_crv())?;

    let x = parse_base64_member(public_key, "x")?;
    let x = BigNum::from_slice(check_len(&x)?)
        .foreign_err(|| FormatError::JwkParsingFailed("Failed to construct BigNum".to_string()))?;
    let y = parse_base64_member(public_key, "y")?;
    let y = BigNum::from_slice(check_len(&y)?)
        .foreign_err(|| FormatError::JwkParsingFailed("Failed to construct BigNum".to_string()))?;

    let group = curve
        .group()
        .with_err(|| FormatError::JwkParsingFailed("unavailable curve".to_string()))?;
    EcPublic::from_public_key_affine_coordinates(group.as_ref(), x.as_ref(), y.as_ref())
        .foreign_err(|| FormatError::JwkParsingFailed("coordinate construction failed".to_string()))
}

pub(crate) fn rsa_public_key_from_jwk(public_key: &JwkPublic) -> Result<Rsa<Public>, FormatError> {
    check_jwk_field(public_key, "kty", KTY_RSA)?;

    let n = parse_base64_member(public_key, "n")?;
    let e = parse_base64_member(public_key, "e")?;
    let to_bignum = |bytes: &[u8]| {
        BigNum::from_slice(bytes).foreign_err(|| {
            FormatError::JwkParsingFailed("Failed to construct BigNum".to_string())
        })
    };

    Rsa::from_public_components(to_bignum(&n)?, to_bignum(&e)?)
        .foreign_err(|| FormatError::JwkParsingFailed("invalid RSA public key".to_string()))
}

fn check_len(coord: &[u8]) -> Result<&[u8], FormatError> {
    if coord.len() != COORDINATE_LEN {
        return Err(Error::root(FormatError::JwkParsingFailed(
            "parsing coord failed".to_string(),
        )))
        .ctx(|| format!("coordinate has {} bytes", coord.len()));
    }
    Ok(coord)
}

fn check_jwk_field(
    public_key: &JwkPublic,
    field: &str,
    expected_value: &str,
) -> Result<(), FormatError> {
    let error = |message| Error::root(FormatError::JwkParsingFailed(message));

    let value = public_key
        .get(field)
        .ok_or_else(|| error(format!("missing \"{}\" field", field)))?;

    if value == expected_value {
        return Ok(());
    }

    Err(error(format!("incorrect value on \"{}\" field", field))).ctx(|| {
        format!(
            "value on field \"{}\" was {}, expected {}",
            field, value, expected_value
        )
    })
}

fn parse_base64_member(public_key: &JwkPublic, member: &str) -> Result<Vec<u8>, FormatError> {
    let error = |message| Error::root(FormatError::JwkParsingFailed(message));

    let value = public_key
        .get(member)
        .ok_or_else(|| error(format!("missing \"{}\" field", member)))?;
    let base64_value = value
        .as_str()
        .ok_or_else(|| error(format!("\"{}\" field is not a string", member)))?;
    base64_url_decode(base64_value)
        .foreign_err(|| FormatError::JwkParsingFailed(format!("decoding \"{}\" failed", member)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verify_setup(signer: &dyn Signer) -> (JwkPublic, &'static [u8], Vec<u8>) {
        let public_jwk = signer.public_jwk().unwrap();

        let message = b"Test message to be signed";
        let signature = signer.sign(message).unwrap();

        (public_jwk, message, signature)
    }

    #[test]
    fn sign_verify_bytes_all_algorithms() {
        struct TestCase {
            signer: Box<dyn Signer>,
            alg: SigningAlgorithm,
        }

        let test_cases = [
            TestCase {
                signer: Box::new(EcSigner::generate(EcCurve::P256, None).unwrap()),
                alg: SigningAlgorithm::Es256,
            },
            TestCase {
                signer: Box::new(EcSigner::generate(EcCurve::Secp256k1, None).unwrap()),
                alg: SigningAlgorithm::Es256k,
            },
            TestCase {
                signer: Box::new(Rs256Signer::generate(2048, None).unwrap()),
                alg: SigningAlgorithm::Rs256,
            },
        ];

        for TestCase { signer, alg } in test_cases {
            assert_eq!(signer.algorithm(), alg);
            let (public_jwk, message, signature) = verify_setup(signer.as_ref());

            assert_eq!(jwk_signing_algorithm(&public_jwk), Some(alg));
            assert!(verifier_for(alg)
                .verify(message, &signature, &public_jwk)
                .unwrap());
            assert!(!verifier_for(alg)
                .verify(b"another message", &signature, &public_jwk)
                .unwrap());
        }
    }

    #[test]
    fn es256_signature_is_raw_r_s() {
        let signer = EcSigner::generate(EcCurve::P256, None).unwrap();

        let signature = Signer::sign(&signer, b"message").unwrap();

        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn ec_verifier_rejects_key_on_other_curve() {
        let signer = EcSigner::generate(EcCurve::Secp256k1, None).unwrap();
        let (public_jwk, message, signature) = verify_setup(&signer);

        let error = EcVerifier(EcCurve::P256)
            .verify(message, &signature, &public_jwk)
            .unwrap_err();

        assert_eq!(
            error.downcast::<Error<FormatError>>().unwrap().error,
            FormatError::JwkParsingFailed("incorrect value on \"crv\" field".to_string())
        );
    }

    #[test]
    fn ec_verifier_invalid_jwk_missing_kty_field() {
        let signer = EcSigner::generate(EcCurve::P256, None).unwrap();
        let (mut public_jwk, message, signature) = verify_setup(&signer);

        public_jwk.remove("kty");

        let error = EcVerifier(EcCurve::P256)
            .verify(message, &signature, &public_jwk)
            .unwrap_err();

        assert_eq!(
            error.downcast::<Error<FormatError>>().unwrap().error,
            FormatError::JwkParsingFailed("missing \"kty\" field".to_string())
        );
    }

    #[test]
    fn rs256_verifier_rejects_truncated_signature() {
        let signer = Rs256Signer::generate(2048, None).unwrap();
        let (public_jwk, message, mut signature) = verify_setup(&signer);

        signature.truncate(100);

        assert!(!Rs256Verifier
            .verify(message, &signature, &public_jwk)
            .unwrap());
    }

    #[test]
    fn small_rsa_keys_are_refused() {
        let error = Rs256Signer::generate(1024, None).unwrap_err();

        assert_eq!(
            error.error,
            CryptoError::Unsupported("RSA modulus of 1024 bits".to_owned())
        );
    }

    #[test]
    fn secret_scalar_is_deterministic() {
        let scalar = [7u8; 32];

        let first = EcSigner::from_secret_scalar(EcCurve::P256, &scalar, None).unwrap();
        let second = EcSigner::from_secret_scalar(EcCurve::P256, &scalar, None).unwrap();

        assert_eq!(first.public_jwk().unwrap(), second.public_jwk().unwrap());
        assert_eq!(
            first.private_jwk().unwrap()["d"],
            base64_url_encode(scalar)
        );
    }

    #[test]
    fn zero_scalar_is_rejected() {
        let error = EcSigner::from_secret_scalar(EcCurve::P256, &[0u8; 32], None).unwrap_err();

        assert_eq!(error.error, CryptoError::InvalidKey);
    }

    #[test]
    fn pem_round_trip_keeps_curve() {
        let group = EcCurve::Secp256k1.group().unwrap();
        let key = EcKey::generate(&group).unwrap();
        let pem = key.private_key_to_pem().unwrap();

        let signer = EcSigner::from_private_key_pem(&pem, Some("k1".to_owned())).unwrap();

        assert_eq!(signer.curve(), EcCurve::Secp256k1);
        assert_eq!(signer.public_jwk().unwrap()["kid"], "k1");
    }

    #[test]
    fn pkey_conversion_matches_signer_jwk() {
        let signer = EcSigner::generate(EcCurve::P256, None).unwrap();
        let der = signer.private_key.public_key_to_der().unwrap();
        let pkey = PKey::public_key_from_der(&der).unwrap();

        assert_eq!(
            public_jwk_from_pkey(&pkey).unwrap(),
            signer.public_jwk().unwrap()
        );
    }
}
