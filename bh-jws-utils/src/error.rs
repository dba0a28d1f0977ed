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

/// Error in JWK format
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum FormatError {
    /// Error that occurs when JWK parsing failed
    #[strum(to_string = "JWK parsing failed: {0}")]
    JwkParsingFailed(String),
}

impl bherror::BhError for FormatError {}

/// Errors of the compact JWT codec.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum JwtError {
    /// The token is not a compact JWS of three `base64url` segments carrying a
    /// JSON header and a JSON object payload.
    #[strum(to_string = "Malformed token: {0}")]
    MalformedToken(String),

    /// The `alg` is not supported, or it cannot be used with the resolved key.
    #[strum(to_string = "Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The signature does not verify against the resolved key.
    #[strum(to_string = "Signature verification failed")]
    Verification,

    /// No verification key could be resolved from the header, or the
    /// certificate chain / key set it points to is invalid or untrusted.
    #[strum(to_string = "Verification key resolution failed: {0}")]
    KeyResolution(String),

    /// The signing backend failed.
    #[strum(to_string = "Signing failed")]
    Signing,
}

impl bherror::BhError for JwtError {}

/// Cryptographic error
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum CryptoError {
    /// Error that occurs when key generation failed
    #[strum(to_string = "Key generation failed")]
    KeyGenerationFailed,
    /// Error that occurs when the cryptographic backend
    /// unexpectedly failed
    #[strum(to_string = "Crypto backend failed")]
    CryptoBackend,
    /// Error that occurs when the key type or curve is unsupported
    #[strum(to_string = "Unsupported: {0}")]
    Unsupported(String),
    /// Error that occurs when a key is incorrectly formatted or
    /// otherwise not valid.
    #[strum(to_string = "Invalid key")]
    InvalidKey,
}

impl bherror::BhError for CryptoError {}

/// Errors of a [`KeyStore`](crate::KeyStore).
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum KeyStoreError {
    /// There is no key stored under the alias.
    #[strum(to_string = "No key stored under alias {0}")]
    UnknownAlias(String),
    /// The user, or the platform on their behalf, declined the use of the key.
    #[strum(to_string = "Key operation cancelled")]
    Cancelled,
    /// The key could not be generated.
    #[strum(to_string = "Key generation failed")]
    KeyGeneration,
    /// Producing the JWT failed.
    #[strum(to_string = "Signing failed")]
    Signing,
}

impl bherror::BhError for KeyStoreError {}
