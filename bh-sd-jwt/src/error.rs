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

/// Top-level error type for the SD-JWT crate.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum SdJwtError {
    /// The SD-JWT cannot be parsed or its disclosures cannot be decoded into
    /// the issuer's claims.
    #[strum(to_string = "Malformed SD-JWT: {0}")]
    MalformedSdJwt(String),

    /// The issuer-signed JWT failed verification.
    #[strum(to_string = "Invalid issuer-signed JWT")]
    InvalidIssuerJwt,

    /// The presentation definition cannot be evaluated.
    #[strum(to_string = "Invalid presentation definition")]
    InvalidPresentationDefinition,

    /// Signing the issuer JWT failed.
    #[strum(to_string = "Issuer JWT signing failed")]
    Signing,
}

impl bherror::BhError for SdJwtError {}

/// Errors which occur while reconstructing the claims of an SD-JWT out of its
/// disclosures.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum DecodingError {
    /// The disclosure is not a `base64url`-encoded JSON array of the right
    /// shape.
    #[strum(to_string = "Invalid disclosure: {0}")]
    InvalidDisclosure(String),

    /// An object property disclosure is referenced from an array, or vice
    /// versa.
    #[strum(to_string = "Mismatched disclosure format")]
    MismatchedDisclosureFormat,

    /// A reserved key name is used as a claim name.
    #[strum(to_string = "Reserved key name {0} usage")]
    ReservedKeyName(&'static str),

    /// A digest is not a string, or is in a malformed array element.
    #[strum(to_string = "Malformed digest: {0}")]
    MalformedDigest(String),

    /// Two disclosures have the same digest.
    #[strum(to_string = "Disclosure digest collision")]
    DisclosureDigestCollision,

    /// The same digest appears more than once.
    #[strum(to_string = "Duplicated digest: {0}")]
    DuplicateDigest(String),

    /// Some disclosures are not referenced from anywhere.
    #[strum(to_string = "Unused disclosures: {0}")]
    UnusedDisclosures(String),

    /// A disclosed claim name clashes with another claim of the same object.
    #[strum(to_string = "Duplicate claim name: {0}")]
    DuplicateClaimName(String),

    /// The `_sd_alg` value is not a supported hash algorithm.
    #[strum(to_string = "Invalid hash algorithm name: {0}")]
    InvalidHashAlgorithmName(String),
}

impl bherror::BhError for DecodingError {}

/// Errors related to Key Binding JWT operations.
#[derive(strum_macros::Display, PartialEq, Debug, Clone)]
pub enum KeyBindingError {
    /// The presentation has no Key Binding JWT.
    #[strum(to_string = "Missing key binding")]
    MissingKeyBinding,

    /// The SD-JWT has no `cnf.jwk` holder key to verify the Key Binding JWT
    /// with.
    #[strum(to_string = "Missing holder public key")]
    MissingHolderKey,

    /// The Key Binding JWT is not a well-formed JWT.
    #[strum(to_string = "Invalid KB-JWT syntax")]
    InvalidSyntax,

    /// The Key Binding JWT signature is invalid.
    #[strum(to_string = "Invalid KB-JWT signature")]
    InvalidSignature,

    /// The `typ` header is not `kb+jwt`.
    #[strum(to_string = "Invalid KB-JWT type {0}")]
    InvalidType(String),

    /// A required claim is missing or has the wrong type.
    #[strum(to_string = "Invalid KB-JWT claim {0}")]
    InvalidClaim(&'static str),

    /// The Key Binding JWT is too old.
    #[strum(to_string = "KB-JWT expired: iat is {0}, expiration offset {1} and current time {2}")]
    Expired(u64, u64, u64),

    /// The `nonce` differs from the expected one.
    #[strum(to_string = "Invalid KB-JWT nonce. Provided nonce was {0}")]
    InvalidNonce(String),

    /// The `aud` differs from the expected one.
    #[strum(to_string = "Invalid KB-JWT aud. Provided aud was `{0}`; expected `{1}`")]
    InvalidAud(String, String),

    /// The `_sd_hash` does not match the presented SD-JWT.
    #[strum(to_string = "Invalid KB-JWT hash. Claims hash was {0}, provided was {1}")]
    InvalidSdHash(String, String),

    /// Signing the Key Binding JWT failed.
    #[strum(to_string = "KB-JWT signing failed")]
    Signing,
}

impl bherror::BhError for KeyBindingError {}

/// Result type used across the crate.
pub type Result<T, E> = bherror::Result<T, E>;
