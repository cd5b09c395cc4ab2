//! The authentication endpoint.
//!
//! Every request renders the login form. A POST that came from the IdP
//! additionally runs validation, claims mapping and token issuance, and the
//! outcome decides which authorization header accompanies the form.

use std::sync::Arc;

use chrono::TimeDelta;
use http::{HeaderMap, HeaderValue, Method, Response, header};

use super::{
    claims::{ClaimsMapper, UserClaims},
    error::AuthError,
    identity::AuthenticatedUser,
    jwt::TokenIssuer,
    metadata::IdentityProvider,
    saml::AssertionValidator,
    saml_registry::ServiceProviderRegistry,
};
use crate::{
    config::{ConfigError, SamlProviderConfig},
    ui::{LoginFormArgs, LoginFormLink, LoginFormRenderer, render_response, renderer_from_config},
};

/// Decides whether a POST is an IdP-initiated sign-in at all.
///
/// Matching is by substring of the `Origin` and `Referer` headers.
#[derive(Debug, Clone)]
pub struct IdpOriginGate {
    origins: Vec<String>,
    referers: Vec<String>,
}

impl IdpOriginGate {
    /// Azure AD posts from `login.microsoftonline.com`, or from the
    /// `windowsazure.com` application portal.
    pub fn azure() -> Self {
        Self {
            origins: vec!["login.microsoftonline.com".to_string()],
            referers: vec!["windowsazure.com".to_string()],
        }
    }

    pub fn is_eligible(&self, method: &Method, headers: &HeaderMap) -> bool {
        if method != Method::POST {
            return false;
        }

        let header_matches = |name: header::HeaderName, patterns: &[String]| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| patterns.iter().any(|p| value.contains(p.as_str())))
        };

        header_matches(header::ORIGIN, &self.origins)
            || header_matches(header::REFERER, &self.referers)
    }
}

/// Refuse to start when XML signatures cannot be verified, unless the
/// operator explicitly accepted that.
fn check_signature_verification(config: &SamlProviderConfig) -> Result<(), ConfigError> {
    if cfg!(feature = "xmlsec") {
        return Ok(());
    }
    if !config.allow_unverified_signatures {
        return Err(ConfigError::Validation(
            "built without the `xmlsec` feature, so SAML response signatures cannot be \
             verified; rebuild with `--features xmlsec` or set \
             saml.allow_unverified_signatures = true"
                .into(),
        ));
    }
    tracing::warn!(
        "Built without the `xmlsec` feature: SAML response signatures are NOT verified"
    );
    Ok(())
}

/// Result of one pass through the authentication endpoint.
#[derive(Debug)]
pub enum AuthenticationOutcome {
    Authenticated {
        user: AuthenticatedUser,
        token: String,
    },
    /// `reason` is `None` when the request was not a sign-in attempt.
    Rejected { reason: Option<AuthError> },
}

impl AuthenticationOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

/// The outcome together with the rendered HTTP response.
#[derive(Debug)]
pub struct AuthenticationResponse {
    pub outcome: AuthenticationOutcome,
    pub response: Response<String>,
}

/// SAML HTTP-POST authentication provider.
///
/// Built once at startup; shared read-only by all requests.
#[derive(Clone)]
pub struct SamlAuthProvider {
    gate: IdpOriginGate,
    validator: AssertionValidator,
    mapper: ClaimsMapper,
    issuer: TokenIssuer,
    renderer: Arc<dyn LoginFormRenderer>,
    form: LoginFormArgs,
}

impl std::fmt::Debug for SamlAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamlAuthProvider")
            .field("gate", &self.gate)
            .field("validator", &self.validator)
            .field("issuer", &self.issuer)
            .field("auth_endpoint", &self.form.auth_endpoint)
            .finish()
    }
}

impl SamlAuthProvider {
    /// Load IdP metadata and build the provider from validated config.
    pub async fn from_config(
        config: &SamlProviderConfig,
        client: &reqwest::Client,
    ) -> Result<Self, ConfigError> {
        let azure = config
            .azure
            .as_ref()
            .ok_or_else(|| ConfigError::Validation("no valid IdP configuration found".into()))?;

        check_signature_verification(config)?;

        let renderer = renderer_from_config(&config.ui).await?;
        let idp = IdentityProvider::load(azure, client).await?;
        let registry = ServiceProviderRegistry::from_identity_provider(&idp)?;

        Self::new(config, Some(idp.login_url), registry, renderer)
    }

    pub fn new(
        config: &SamlProviderConfig,
        idp_login_url: Option<String>,
        registry: ServiceProviderRegistry,
        renderer: Arc<dyn LoginFormRenderer>,
    ) -> Result<Self, ConfigError> {
        let lifetime = i64::try_from(config.jwt.token_lifetime_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| {
                ConfigError::Validation("jwt.token_lifetime_secs is out of range".into())
            })?;

        let links = idp_login_url
            .into_iter()
            .map(|link| LoginFormLink {
                link,
                title: "Office 365".to_string(),
                style: "fa-windows".to_string(),
            })
            .collect();

        Ok(Self {
            gate: IdpOriginGate::azure(),
            validator: AssertionValidator::new(registry),
            mapper: ClaimsMapper::new(Some(config.jwt.token_issuer.clone()), lifetime),
            issuer: TokenIssuer::from_config(&config.jwt),
            renderer,
            form: LoginFormArgs::from_config(
                &config.ui,
                &config.auth_url_path,
                config.success_url_path.as_deref(),
                links,
            ),
        })
    }

    pub fn auth_endpoint(&self) -> &str {
        &self.form.auth_endpoint
    }

    pub fn binding_count(&self) -> usize {
        self.validator.registry().len()
    }

    pub fn token_issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Handle one request to the authentication endpoint.
    ///
    /// Always renders the form. Failures never escape: they become a
    /// rejected outcome with the reason shown on the form.
    #[tracing::instrument(skip_all, fields(method = %method))]
    pub fn authenticate(
        &self,
        method: &Method,
        headers: &HeaderMap,
        body: &[u8],
    ) -> AuthenticationResponse {
        let mut args = self.form.clone();

        let outcome = if self.gate.is_eligible(method, headers) {
            let content_type = headers
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok());

            match self.sign_in(content_type, body) {
                Ok((claims, token)) => {
                    tracing::info!(user = %claims.email, roles = claims.roles.len(), "SAML sign-in succeeded");
                    args = args.with_authenticated(claims.roles.clone());
                    AuthenticationOutcome::Authenticated {
                        user: AuthenticatedUser::from(&claims),
                        token,
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, kind = e.kind(), "SAML sign-in rejected");
                    args = args.with_error(e.to_string());
                    AuthenticationOutcome::Rejected { reason: Some(e) }
                }
            }
        } else {
            AuthenticationOutcome::Rejected { reason: None }
        };

        let mut response = render_response(self.renderer.as_ref(), &args);

        match &outcome {
            AuthenticationOutcome::Authenticated { token, .. } => {
                match HeaderValue::try_from(format!("Bearer {token}")) {
                    Ok(value) => {
                        response.headers_mut().insert(header::AUTHORIZATION, value);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Issued token is not a valid header value")
                    }
                }
            }
            AuthenticationOutcome::Rejected { .. } => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
        }

        AuthenticationResponse { outcome, response }
    }

    fn sign_in(
        &self,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<(UserClaims, String), AuthError> {
        let assertion = self.validator.validate(content_type, body)?;
        let claims = self.mapper.map(&assertion)?;
        let token = self.issuer.issue(&claims)?;
        Ok((claims, token))
    }
}
