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

//! Credential issuer and authorization server metadata.

use std::collections::BTreeMap;

use bh_jws_utils::{HttpGetClient, JsonObject};
use bh_pex::{FORMAT_JWT_VC_JSON, FORMAT_VC_SD_JWT};
use bh_uri_utils::UriPathExtensions as _;
use bherror::{
    traits::{ErrorContext as _, ForeignError as _, PropagateError as _},
    Error,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{http::fetch_json_document, IssuerMetadataSnapshot, Result, WalletError};

/// Path of the credential issuer metadata, relative to the issuer
/// identifier.
pub const CREDENTIAL_ISSUER_METADATA_PATH: &str = "/.well-known/openid-credential-issuer";

/// Path of the OAuth 2.0 authorization server metadata, inserted in front of
/// the path of the issuer identifier as per [RFC8414].
///
/// [RFC8414]: https://datatracker.ietf.org/doc/html/rfc8414#section-3.1
pub const OAUTH_AUTHORIZATION_SERVER_METADATA_PATH: &str =
    "/.well-known/oauth-authorization-server";

/// Path of the OpenID Provider configuration, relative to the issuer
/// identifier.
pub const OPENID_CONFIGURATION_PATH: &str = "/.well-known/openid-configuration";

/// Claim format of W3C credentials secured with Data Integrity proofs.
pub const FORMAT_LDP_VC: &str = "ldp_vc";

/// Localized display properties of an issuer, a credential or a claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedDisplay {
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// BCP 47 language tag of the values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Logo to show.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<Logo>,
    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Background color, as a CSS color value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    /// Text color, as a CSS color value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
}

/// A logo of a [`LocalizedDisplay`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Logo {
    /// Where to fetch the logo from.
    #[serde(alias = "url")]
    pub uri: String,
    /// Alternative text of the logo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

/// Pick the display best matching the `locale`: an exact match, then one of
/// the same language, then the first one.
pub fn display_for_locale<'a>(
    displays: &'a [LocalizedDisplay],
    locale: &str,
) -> Option<&'a LocalizedDisplay> {
    let language = locale.split('-').next().unwrap_or(locale);

    displays
        .iter()
        .find(|display| display.locale.as_deref() == Some(locale))
        .or_else(|| {
            displays.iter().find(|display| {
                display
                    .locale
                    .as_deref()
                    .is_some_and(|locale| locale.split('-').next() == Some(language))
            })
        })
        .or(displays.first())
}

/// Metadata of a claim of an offered credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimMetadata {
    /// Whether the issuer always includes the claim.
    #[serde(default)]
    pub mandatory: bool,
    /// Type of the claim value, e.g. `string` or `number`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    /// Localized names of the claim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub display: Vec<LocalizedDisplay>,
}

/// Claims of an offered credential, by name.
pub type IssuerCredentialSubject = BTreeMap<String, ClaimMetadata>;

/// Properties shared by the credential configurations of all formats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationProperties {
    /// OAuth scope for requesting the credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// How the credential can be bound to the holder, e.g. `jwk`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cryptographic_binding_methods_supported: Vec<String>,
    /// Algorithms the issuer signs the credential with.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credential_signing_alg_values_supported: Vec<String>,
    /// Accepted key proofs, by proof type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_types_supported: Option<JsonObject>,
    /// Localized display properties of the credential.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub display: Vec<LocalizedDisplay>,
}

/// Type and claims of a W3C credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialDefinition {
    /// The `type` values of the credential.
    #[serde(rename = "type")]
    pub types: Vec<String>,
    /// Claims of the credential subject.
    #[serde(
        rename = "credentialSubject",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub credential_subject: Option<IssuerCredentialSubject>,
}

/// Configuration of a `jwt_vc_json` credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtVcJsonConfiguration {
    /// Format independent properties.
    #[serde(flatten)]
    pub properties: ConfigurationProperties,
    /// Type and claims.
    pub credential_definition: CredentialDefinition,
}

/// Configuration of a `vc+sd-jwt` credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdJwtVcConfiguration {
    /// Format independent properties.
    #[serde(flatten)]
    pub properties: ConfigurationProperties,
    /// The credential type.
    pub vct: String,
    /// Claims of the credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<IssuerCredentialSubject>,
}

/// Type, context and claims of a Data Integrity secured W3C credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LdpCredentialDefinition {
    /// JSON-LD context of the credential.
    #[serde(rename = "@context")]
    pub context: Vec<Value>,
    /// Type and claims.
    #[serde(flatten)]
    pub definition: CredentialDefinition,
}

/// Configuration of an `ldp_vc` credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LdpVcConfiguration {
    /// Format independent properties.
    #[serde(flatten)]
    pub properties: ConfigurationProperties,
    /// Type, context and claims.
    pub credential_definition: LdpCredentialDefinition,
}

/// A credential the issuer is able to issue, described per format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format")]
pub enum CredentialConfiguration {
    /// A JWT-secured W3C credential.
    #[serde(rename = "jwt_vc_json")]
    JwtVcJson(JwtVcJsonConfiguration),
    /// An SD-JWT VC.
    #[serde(rename = "vc+sd-jwt")]
    VcSdJwt(SdJwtVcConfiguration),
    /// A Data Integrity secured W3C credential.  Listed for display only,
    /// the wallet cannot request it.
    #[serde(rename = "ldp_vc")]
    LdpVc(LdpVcConfiguration),
}

impl CredentialConfiguration {
    /// The claim format identifier.
    pub fn format(&self) -> &'static str {
        match self {
            Self::JwtVcJson(_) => FORMAT_JWT_VC_JSON,
            Self::VcSdJwt(_) => FORMAT_VC_SD_JWT,
            Self::LdpVc(_) => FORMAT_LDP_VC,
        }
    }

    /// The format independent properties.
    pub fn properties(&self) -> &ConfigurationProperties {
        match self {
            Self::JwtVcJson(configuration) => &configuration.properties,
            Self::VcSdJwt(configuration) => &configuration.properties,
            Self::LdpVc(configuration) => &configuration.properties,
        }
    }

    /// Localized display properties of the credential.
    pub fn display(&self) -> &[LocalizedDisplay] {
        &self.properties().display
    }

    /// The claims the issuer describes.
    pub fn claims(&self) -> Option<&IssuerCredentialSubject> {
        match self {
            Self::JwtVcJson(configuration) => configuration
                .credential_definition
                .credential_subject
                .as_ref(),
            Self::VcSdJwt(configuration) => configuration.claims.as_ref(),
            Self::LdpVc(configuration) => configuration
                .credential_definition
                .definition
                .credential_subject
                .as_ref(),
        }
    }

    fn is_known_format(format: &str) -> bool {
        [FORMAT_JWT_VC_JSON, FORMAT_VC_SD_JWT, FORMAT_LDP_VC].contains(&format)
    }
}

/// Metadata published by a credential issuer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "CredentialIssuerMetadataUnverified")]
pub struct CredentialIssuerMetadata {
    /// The credential issuer identifier.
    pub credential_issuer: String,
    /// Identifiers of the authorization servers the issuer relies on.  Empty
    /// if the issuer is its own authorization server.
    pub authorization_servers: Vec<String>,
    /// URL of the credential endpoint.
    pub credential_endpoint: String,
    /// Localized display properties of the issuer.
    pub display: Vec<LocalizedDisplay>,
    /// The credentials the issuer is able to issue, by configuration
    /// identifier.  Configurations of formats unknown to the wallet are left
    /// out.
    pub credential_configurations_supported: BTreeMap<String, CredentialConfiguration>,
}

#[derive(Deserialize)]
struct CredentialIssuerMetadataUnverified {
    credential_issuer: String,
    #[serde(default)]
    authorization_servers: Vec<String>,
    // Single authorization server, as published by earlier issuers.
    #[serde(default)]
    authorization_server: Option<String>,
    credential_endpoint: String,
    #[serde(default)]
    display: Vec<LocalizedDisplay>,
    #[serde(default, alias = "credentials_supported")]
    credential_configurations_supported: JsonObject,
}

impl TryFrom<CredentialIssuerMetadataUnverified> for CredentialIssuerMetadata {
    type Error = String;

    fn try_from(value: CredentialIssuerMetadataUnverified) -> std::result::Result<Self, String> {
        let mut configurations = BTreeMap::new();

        for (id, configuration) in value.credential_configurations_supported {
            let format = configuration
                .get("format")
                .and_then(Value::as_str)
                .ok_or_else(|| format!("credential configuration {id} without a format"))?;

            if !CredentialConfiguration::is_known_format(format) {
                tracing::debug!(id = %id, format, "skipping credential configuration");
                continue;
            }

            let configuration = serde_json::from_value(configuration)
                .map_err(|error| format!("invalid credential configuration {id}: {error}"))?;
            configurations.insert(id, configuration);
        }

        let mut authorization_servers = value.authorization_servers;
        if authorization_servers.is_empty() {
            authorization_servers.extend(value.authorization_server);
        }

        Ok(Self {
            credential_issuer: value.credential_issuer,
            authorization_servers,
            credential_endpoint: value.credential_endpoint,
            display: value.display,
            credential_configurations_supported: configurations,
        })
    }
}

/// Metadata of an OAuth 2.0 authorization server, as per [RFC8414].
///
/// [RFC8414]: https://datatracker.ietf.org/doc/html/rfc8414#section-2
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorizationServerMetadata {
    /// The authorization server identifier.
    #[serde(default)]
    pub issuer: Option<String>,
    /// URL of the authorization endpoint.
    pub authorization_endpoint: String,
    /// URL of the token endpoint.
    pub token_endpoint: String,
    /// Whether the token endpoint accepts pre-authorized codes without client
    /// authentication.
    #[serde(default, rename = "pre-authorized_grant_anonymous_access_supported")]
    pub pre_authorized_grant_anonymous_access_supported: bool,
}

/// Everything the wallet needs to know about an issuer before requesting a
/// credential.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuerMetadata {
    /// Metadata of the credential issuer.
    pub credential_issuer: CredentialIssuerMetadata,
    /// Metadata of the authorization server issuing the access tokens.
    pub authorization_server: AuthorizationServerMetadata,
}

impl IssuerMetadata {
    /// Discover the metadata of `credential_issuer`.
    ///
    /// The credential issuer metadata is fetched from the well-known
    /// location.  If the issuer does not publish it, its authorization
    /// server metadata is expected to carry the credential issuer parameters
    /// as well.  The authorization server is the first one the issuer
    /// declares, or the issuer itself; its metadata is looked up at the
    /// [RFC8414] location first, and at the OpenID Provider configuration
    /// location second.
    ///
    /// [RFC8414]: https://datatracker.ietf.org/doc/html/rfc8414#section-3.1
    pub async fn discover<C: HttpGetClient>(client: &C, credential_issuer: &str) -> Result<Self> {
        let issuer_url = parse_url(credential_issuer)?;
        let issuer_metadata_url = issuer_url
            .add_path_suffix(CREDENTIAL_ISSUER_METADATA_PATH)
            .with_err(|| WalletError::MetadataDiscovery("invalid issuer URL".to_owned()))?;

        let issuer_metadata = match fetch_json_document(client, issuer_metadata_url.as_str())
            .await?
        {
            Some(document) => Some(parse_issuer_metadata(document)?),
            None => {
                tracing::info!(
                    credential_issuer,
                    "issuer metadata not found, using authorization server metadata"
                );
                None
            }
        };

        let authorization_server = issuer_metadata
            .as_ref()
            .and_then(|metadata| metadata.authorization_servers.first())
            .filter(|server| !same_identifier(server, credential_issuer))
            .map(String::as_str)
            .unwrap_or(credential_issuer);

        let Some(authorization_server_document) =
            fetch_authorization_server_document(client, authorization_server).await?
        else {
            return Err(Error::root(WalletError::MetadataDiscovery(format!(
                "no authorization server metadata for {authorization_server}"
            ))));
        };

        let issuer_metadata = match issuer_metadata {
            Some(issuer_metadata) => issuer_metadata,
            None => {
                let mut document = authorization_server_document.clone();
                if let Value::Object(parameters) = &mut document {
                    parameters
                        .entry("credential_issuer")
                        .or_insert_with(|| Value::String(credential_issuer.to_owned()));
                }
                parse_issuer_metadata(document)
                    .ctx(|| "authorization server metadata without credential issuer parameters")?
            }
        };

        if !same_identifier(&issuer_metadata.credential_issuer, credential_issuer) {
            return Err(Error::root(WalletError::MetadataDiscovery(format!(
                "metadata of {} published for {credential_issuer}",
                issuer_metadata.credential_issuer
            ))));
        }

        let authorization_server = serde_json::from_value(authorization_server_document)
            .match_foreign_err(|error| WalletError::MetadataDiscovery(error.to_string()))
            .ctx(|| "invalid authorization server metadata")?;

        Ok(Self {
            credential_issuer: issuer_metadata,
            authorization_server,
        })
    }

    /// The configuration with the given identifier.
    pub fn configuration(&self, configuration_id: &str) -> Result<&CredentialConfiguration> {
        self.credential_issuer
            .credential_configurations_supported
            .get(configuration_id)
            .ok_or_else(|| {
                Error::root(WalletError::MetadataDiscovery(format!(
                    "credential configuration {configuration_id} not supported by the issuer"
                )))
            })
    }

    /// What is kept of the metadata along with a credential issued under
    /// the given configuration.
    pub fn snapshot(&self, configuration_id: &str) -> Result<IssuerMetadataSnapshot> {
        Ok(IssuerMetadataSnapshot {
            credential_issuer: self.credential_issuer.credential_issuer.clone(),
            display: self.credential_issuer.display.clone(),
            configuration_id: configuration_id.to_owned(),
            configuration: self.configuration(configuration_id)?.clone(),
        })
    }
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).match_foreign_err(|error| {
        WalletError::MetadataDiscovery(format!("invalid URL {url}: {error}"))
    })
}

fn same_identifier(left: &str, right: &str) -> bool {
    left.trim_end_matches('/') == right.trim_end_matches('/')
}

fn parse_issuer_metadata(document: Value) -> Result<CredentialIssuerMetadata> {
    serde_json::from_value(document)
        .match_foreign_err(|error| WalletError::MetadataDiscovery(error.to_string()))
        .ctx(|| "invalid credential issuer metadata")
}

async fn fetch_authorization_server_document<C: HttpGetClient>(
    client: &C,
    authorization_server: &str,
) -> Result<Option<Value>> {
    let url = parse_url(authorization_server)?;

    let oauth_url = url
        .clone()
        .add_path_prefix(OAUTH_AUTHORIZATION_SERVER_METADATA_PATH)
        .with_err(|| {
            WalletError::MetadataDiscovery("invalid authorization server URL".to_owned())
        })?;
    if let Some(document) = fetch_json_document(client, oauth_url.as_str()).await? {
        return Ok(Some(document));
    }

    tracing::debug!(
        authorization_server,
        "OAuth metadata not found, trying the OpenID configuration"
    );
    let openid_url = url
        .add_path_suffix(OPENID_CONFIGURATION_PATH)
        .with_err(|| {
            WalletError::MetadataDiscovery("invalid authorization server URL".to_owned())
        })?;
    fetch_json_document(client, openid_url.as_str()).await
}
