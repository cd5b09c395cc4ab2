//! Identity provider metadata and signing certificate loading.
//!
//! Both are read once while the service is being configured. The signing
//! certificate is injected into the metadata as a `signing` key descriptor,
//! which makes it the trusted key for response signature checks.

use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD};
use openssl::x509::X509;
use samael::metadata::{EntityDescriptor, KeyDescriptor};
use url::Url;

use crate::config::{AzureIdpConfig, ConfigError};

/// IdP token signing certificate, held as DER.
#[derive(Clone)]
pub struct SigningCertificate {
    der: Vec<u8>,
}

impl std::fmt::Debug for SigningCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCertificate")
            .field("der_len", &self.der.len())
            .finish()
    }
}

impl SigningCertificate {
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ConfigError::Io(e, path.to_path_buf()))?;
        Self::from_bytes(&bytes)
    }

    /// Parse a PEM or DER encoded X.509 certificate.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let is_pem = bytes
            .windows(PEM_MARKER.len())
            .any(|window| window == PEM_MARKER);

        let cert = if is_pem {
            X509::from_pem(bytes)
        } else {
            X509::from_der(bytes)
        }
        .map_err(|e| ConfigError::Certificate(format!("failed to parse certificate: {e}")))?;

        let der = cert
            .to_der()
            .map_err(|e| ConfigError::Certificate(format!("failed to encode certificate: {e}")))?;

        Ok(Self { der })
    }

    /// Base64 DER body, as carried in `<ds:X509Certificate>`.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.der)
    }

    /// A `use="signing"` key descriptor carrying this certificate.
    pub fn key_descriptor(&self) -> Result<KeyDescriptor, ConfigError> {
        // Parsed through a minimal IdP document so samael builds the
        // descriptor with its own namespace handling.
        let xml = format!(
            r#"<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="urn:signing-key">
    <md:IDPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
        <md:KeyDescriptor use="signing">
            <ds:KeyInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
                <ds:X509Data>
                    <ds:X509Certificate>{}</ds:X509Certificate>
                </ds:X509Data>
            </ds:KeyInfo>
        </md:KeyDescriptor>
        <md:SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="urn:signing-key"/>
    </md:IDPSSODescriptor>
</md:EntityDescriptor>"#,
            self.to_base64()
        );

        let descriptor = parse_metadata(&xml)?;
        descriptor
            .idp_sso_descriptors
            .into_iter()
            .flatten()
            .flat_map(|idp| idp.key_descriptors)
            .next()
            .ok_or_else(|| {
                ConfigError::Certificate("failed to build signing key descriptor".into())
            })
    }
}

const PEM_MARKER: &[u8] = b"-----BEGIN";

/// Parse a SAML metadata document.
pub fn parse_metadata(xml: &str) -> Result<EntityDescriptor, ConfigError> {
    samael::metadata::de::from_str(xml)
        .map_err(|e| ConfigError::Metadata(format!("failed to parse IdP metadata: {e}")))
}

/// Download and parse a SAML metadata document.
pub async fn fetch_metadata(
    client: &reqwest::Client,
    url: &Url,
) -> Result<EntityDescriptor, ConfigError> {
    tracing::debug!(url = %url, "Fetching SAML IdP metadata");

    let response = client.get(url.clone()).send().await.map_err(|e| {
        tracing::error!(error = %e, url = %url, "Failed to fetch SAML metadata");
        ConfigError::Metadata(format!("failed to fetch IdP metadata from {url}: {e}"))
    })?;

    if !response.status().is_success() {
        let status = response.status();
        tracing::error!(status = %status, url = %url, "SAML metadata endpoint returned error");
        return Err(ConfigError::Metadata(format!(
            "IdP metadata endpoint {url} returned {status}"
        )));
    }

    let xml = response.text().await.map_err(|e| {
        ConfigError::Metadata(format!("failed to read IdP metadata from {url}: {e}"))
    })?;

    parse_metadata(&xml)
}

/// Append the signing key to the first IdP SSO descriptor.
pub fn inject_signing_key(
    metadata: &mut EntityDescriptor,
    certificate: &SigningCertificate,
) -> Result<(), ConfigError> {
    let descriptor = metadata
        .idp_sso_descriptors
        .as_mut()
        .and_then(|descriptors| descriptors.first_mut())
        .ok_or_else(|| {
            ConfigError::Metadata("IdP metadata has no IDPSSODescriptor".into())
        })?;

    descriptor.key_descriptors.push(certificate.key_descriptor()?);
    Ok(())
}

/// A fully loaded identity provider: metadata with the trusted signing key
/// injected, plus the values derived from its configuration.
#[derive(Debug, Clone)]
pub struct IdentityProvider {
    /// Sign-in portal link shown on the login form.
    pub login_url: String,

    /// Set when the metadata was downloaded rather than read from disk.
    pub metadata_url: Option<Url>,

    pub metadata: EntityDescriptor,

    /// SP entity ID, if explicitly configured.
    pub entity_id: Option<String>,

    /// ACS URLs, one service provider binding each.
    pub acs_urls: Vec<String>,
}

impl IdentityProvider {
    /// Load metadata and the signing certificate for an Azure AD application.
    ///
    /// `config` must already be validated.
    pub async fn load(
        config: &AzureIdpConfig,
        client: &reqwest::Client,
    ) -> Result<Self, ConfigError> {
        let certificate = SigningCertificate::from_file(&config.idp_sign_cert_location).await?;

        let location = config.metadata_location();
        let (mut metadata, metadata_url) = if location.starts_with("http") {
            let url = Url::parse(location).map_err(|e| {
                ConfigError::Metadata(format!("invalid IdP metadata URL '{location}': {e}"))
            })?;
            (fetch_metadata(client, &url).await?, Some(url))
        } else {
            let xml = tokio::fs::read_to_string(location)
                .await
                .map_err(|e| ConfigError::Io(e, location.into()))?;
            (parse_metadata(&xml)?, None)
        };

        inject_signing_key(&mut metadata, &certificate)?;

        tracing::info!(
            idp_entity_id = metadata.entity_id.as_deref().unwrap_or_default(),
            source = location,
            "Loaded Azure AD IdP metadata"
        );

        Ok(Self {
            login_url: config.login_url(),
            metadata_url,
            metadata,
            entity_id: config.entity_id.clone().filter(|id| !id.is_empty()),
            acs_urls: config.acs_urls.clone(),
        })
    }

    /// Entity ID the service provider bindings present: the configured one,
    /// else the metadata URL.
    pub fn sp_entity_id(&self) -> Option<String> {
        self.entity_id
            .clone()
            .or_else(|| self.metadata_url.as_ref().map(Url::to_string))
    }
}
