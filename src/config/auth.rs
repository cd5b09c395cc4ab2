use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ConfigError, UiConfig};

/// Environment variable consulted when `jwt.token_secret` is not set.
pub const TOKEN_SECRET_ENV: &str = "JWT_TOKEN_SECRET";

/// Liveness endpoint, reserved next to the authentication endpoint.
pub const HEALTH_PATH: &str = "/health";

/// SAML authentication provider configuration.
///
/// Mirrors the settings an operator provides for an HTTP-POST binding
/// assertion consumer: where the form lives, how tokens are issued, and
/// which identity provider is trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamlProviderConfig {
    /// Path the login form and the assertion consumer are served on.
    #[serde(default)]
    pub auth_url_path: String,

    /// Path users are sent to after a successful sign-in.
    #[serde(default)]
    pub success_url_path: Option<String>,

    /// Token issuance settings.
    #[serde(default)]
    pub jwt: TokenConfig,

    /// Azure AD (enterprise directory) identity provider.
    #[serde(default)]
    pub azure: Option<AzureIdpConfig>,

    /// Login form settings.
    #[serde(default)]
    pub ui: UiConfig,

    /// Start even when built without the `xmlsec` feature, accepting
    /// responses whose XML signatures cannot be checked. Test setups only.
    #[serde(default)]
    pub allow_unverified_signatures: bool,
}

impl SamlProviderConfig {
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.auth_url_path.is_empty() {
            return Err(ConfigError::Validation(
                "authentication endpoint cannot be empty, try setting auth_url_path to /saml"
                    .into(),
            ));
        }
        if !self.auth_url_path.starts_with('/') || self.auth_url_path == HEALTH_PATH {
            return Err(ConfigError::Validation(format!(
                "auth_url_path '{}' must be an absolute path other than {HEALTH_PATH}",
                self.auth_url_path
            )));
        }

        self.jwt.validate()?;

        let mut idp_count = 0;
        if let Some(azure) = &mut self.azure {
            azure.validate()?;
            idp_count += 1;
        }
        if idp_count == 0 {
            return Err(ConfigError::Validation(
                "no valid IdP configuration found".into(),
            ));
        }

        self.ui.validate()?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Token Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters for the locally issued session token.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    /// Name under which the token is known to downstream consumers.
    #[serde(default = "default_token_name")]
    pub token_name: String,

    /// HMAC secret. Falls back to the `JWT_TOKEN_SECRET` environment variable.
    #[serde(default, skip_serializing)]
    pub token_secret: Option<String>,

    /// Value written to the `iss` claim. Defaults to `localhost`.
    #[serde(default)]
    pub token_issuer: String,

    /// Token lifetime when the assertion carries no `MaxSessionDuration`.
    #[serde(default = "default_token_lifetime_secs")]
    pub token_lifetime_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            token_name: default_token_name(),
            token_secret: None,
            token_issuer: String::new(),
            token_lifetime_secs: default_token_lifetime_secs(),
        }
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("token_name", &self.token_name)
            .field("token_secret", &self.token_secret.as_ref().map(|_| "<redacted>"))
            .field("token_issuer", &self.token_issuer)
            .field("token_lifetime_secs", &self.token_lifetime_secs)
            .finish()
    }
}

impl TokenConfig {
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.token_name.is_empty() {
            self.token_name = default_token_name();
        }
        tracing::info!(jwt.token_name = %self.token_name, "found JWT token name");

        if self.token_secret.as_deref().is_none_or(str::is_empty) {
            match std::env::var(TOKEN_SECRET_ENV) {
                Ok(secret) if !secret.is_empty() => self.token_secret = Some(secret),
                _ => {
                    return Err(ConfigError::Validation(format!(
                        "jwt token secret must be defined either via {TOKEN_SECRET_ENV} \
                         environment variable or via jwt.token_secret configuration element"
                    )));
                }
            }
        }

        if self.token_issuer.is_empty() {
            tracing::warn!(
                jwt.token_issuer = "localhost",
                "JWT token issuer not found, using default"
            );
            self.token_issuer = "localhost".to_string();
        }

        if self.token_lifetime_secs == 0 {
            return Err(ConfigError::Validation(
                "jwt.token_lifetime_secs must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// The configured secret. Empty until [`TokenConfig::validate`] has run.
    pub fn secret(&self) -> &str {
        self.token_secret.as_deref().unwrap_or_default()
    }
}

fn default_token_name() -> String {
    "JWT_TOKEN".to_string()
}

fn default_token_lifetime_secs() -> u64 {
    900
}

// ─────────────────────────────────────────────────────────────────────────────
// Azure AD Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Azure AD Enterprise Application acting as the SAML identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AzureIdpConfig {
    /// Directory (tenant) ID.
    #[serde(default)]
    pub tenant_id: String,

    /// Enterprise application ID.
    #[serde(default)]
    pub application_id: String,

    /// Enterprise application name, as shown in the sign-in portal URL.
    #[serde(default)]
    pub application_name: String,

    /// Federation metadata location, either an `http(s)` URL or a local path.
    /// Defaults to the tenant's federation metadata document.
    #[serde(default)]
    pub idp_metadata_location: Option<String>,

    /// Path to the IdP token signing certificate (PEM or DER).
    #[serde(default)]
    pub idp_sign_cert_location: String,

    /// The "Identifier (Entity ID)" configured in "Set up Single Sign-On with
    /// SAML" for the enterprise application.
    #[serde(default)]
    pub entity_id: Option<String>,

    /// Assertion Consumer Service URLs this instance listens on. A site
    /// reachable as both `https://app.example.com` and `https://10.0.0.5`
    /// needs one entry per address.
    #[serde(default)]
    pub acs_urls: Vec<String>,
}

impl AzureIdpConfig {
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.acs_urls.is_empty() {
            return Err(ConfigError::Validation("ACS URLs are missing".into()));
        }
        for acs_url in &self.acs_urls {
            url::Url::parse(acs_url).map_err(|e| {
                ConfigError::Validation(format!("ACS URL '{acs_url}' is invalid: {e}"))
            })?;
        }

        if self.tenant_id.is_empty() {
            return Err(ConfigError::Validation("Azure AD Tenant ID not found".into()));
        }
        tracing::info!(tenant_id = %self.tenant_id, "validating Azure AD Tenant ID");

        if self.application_id.is_empty() {
            return Err(ConfigError::Validation(
                "Azure AD Application ID not found".into(),
            ));
        }
        tracing::info!(application_id = %self.application_id, "validating Azure AD Application ID");

        if self.application_name.is_empty() {
            return Err(ConfigError::Validation(
                "Azure AD Application Name not found".into(),
            ));
        }
        tracing::info!(
            application_name = %self.application_name,
            "validating Azure AD Application Name"
        );

        if self.idp_metadata_location.as_deref().is_none_or(str::is_empty) {
            self.idp_metadata_location = Some(default_metadata_location(&self.tenant_id));
        }
        tracing::info!(
            idp_metadata_location = self.metadata_location(),
            "validating Azure AD IdP Metadata Location"
        );

        if self.idp_sign_cert_location.is_empty() {
            return Err(ConfigError::Validation(
                "Azure AD IdP Signing Certificate not found".into(),
            ));
        }
        tracing::info!(
            idp_signing_cert = %self.idp_sign_cert_location,
            "validating Azure AD IdP Signing Certificate"
        );

        if let Some(entity_id) = self.entity_id.as_deref().filter(|e| !e.is_empty()) {
            url::Url::parse(entity_id).map_err(|e| {
                ConfigError::Validation(format!("entity_id '{entity_id}' is invalid: {e}"))
            })?;
        }

        tracing::info!(login_url = %self.login_url(), "validating Azure AD Login URL");
        Ok(())
    }

    /// Metadata location after defaults have been applied.
    pub fn metadata_location(&self) -> &str {
        self.idp_metadata_location.as_deref().unwrap_or_default()
    }

    /// Link to the Azure AD sign-in portal for this application.
    pub fn login_url(&self) -> String {
        format!(
            "https://account.activedirectory.windowsazure.com/applications/signin/{}/{}?tenantId={}",
            self.application_name, self.application_id, self.tenant_id
        )
    }
}

fn default_metadata_location(tenant_id: &str) -> String {
    format!(
        "https://login.microsoftonline.com/{tenant_id}/federationmetadata/2007-06/federationmetadata.xml"
    )
}
