//! Mapping of SAML attribute statements to session token claims.
//!
//! Azure AD publishes claims under long URI names such as
//! `http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress`.
//! Attributes are matched by suffix, so the namespace prefix does not matter.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::{
    error::{AuthError, ValidationError},
    saml::ParsedAssertion,
};

const MAX_SESSION_DURATION_SUFFIX: &str = "Attributes/MaxSessionDuration";
const DISPLAY_NAME_SUFFIX: &str = "identity/claims/displayname";
const EMAIL_SUFFIX: &str = "identity/claims/emailaddress";
const IDENTITY_PROVIDER_SUFFIX: &str = "identity/claims/identityprovider";
const NAME_SUFFIX: &str = "identity/claims/name";
const ROLE_SUFFIX: &str = "Attributes/Role";

/// Token lifetime used when the assertion does not carry `MaxSessionDuration`.
pub const DEFAULT_TOKEN_LIFETIME: TimeDelta = TimeDelta::seconds(900);

/// Claims carried by the issued session token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Token issuer
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub iss: String,

    /// Subject (`identity/claims/name`), optional
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sub: String,

    /// Display name (`identity/claims/displayname`)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Email address, also the identity key
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,

    /// Identity provider that authenticated the user
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub origin: String,

    /// Application roles, in assertion order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

/// Builds [`UserClaims`] from a validated assertion.
#[derive(Debug, Clone)]
pub struct ClaimsMapper {
    token_issuer: Option<String>,
    default_lifetime: TimeDelta,
}

impl Default for ClaimsMapper {
    fn default() -> Self {
        Self {
            token_issuer: None,
            default_lifetime: DEFAULT_TOKEN_LIFETIME,
        }
    }
}

impl ClaimsMapper {
    pub fn new(token_issuer: Option<String>, default_lifetime: TimeDelta) -> Self {
        Self {
            token_issuer: token_issuer.filter(|issuer| !issuer.is_empty()),
            default_lifetime,
        }
    }

    pub fn map(&self, assertion: &ParsedAssertion) -> Result<UserClaims, AuthError> {
        self.map_at(assertion, Utc::now())
    }

    /// Map attributes with `now` as the issuance time.
    ///
    /// Attributes are scanned in document order and later values overwrite
    /// earlier ones, except roles, which accumulate.
    pub fn map_at(
        &self,
        assertion: &ParsedAssertion,
        now: DateTime<Utc>,
    ) -> Result<UserClaims, AuthError> {
        let mut claims = UserClaims {
            exp: (now + self.default_lifetime).timestamp(),
            ..UserClaims::default()
        };

        for attribute in assertion.attributes() {
            let Some(first) = attribute.values.first() else {
                continue;
            };
            let name = attribute.name.as_str();

            if name.ends_with(MAX_SESSION_DURATION_SUFFIX) {
                match session_expiry(now, first) {
                    Some(exp) => claims.exp = exp,
                    None => tracing::error!(
                        value = %first,
                        "Failed parsing Attributes/MaxSessionDuration"
                    ),
                }
            } else if name.ends_with(DISPLAY_NAME_SUFFIX) {
                claims.name = first.clone();
            } else if name.ends_with(EMAIL_SUFFIX) {
                claims.email = first.clone();
            } else if name.ends_with(IDENTITY_PROVIDER_SUFFIX) {
                claims.origin = first.clone();
            } else if name.ends_with(NAME_SUFFIX) {
                claims.sub = first.clone();
            } else if name.ends_with(ROLE_SUFFIX) {
                claims.roles.extend(attribute.values.iter().cloned());
            }
        }

        if claims.email.is_empty() || claims.name.is_empty() {
            return Err(ValidationError::MissingMandatoryAttributes {
                claims: Box::new(claims),
            }
            .into());
        }

        if let Some(issuer) = &self.token_issuer {
            claims.iss = issuer.clone();
        }

        Ok(claims)
    }
}

/// `now + value` seconds, or `None` when the value is not an integer or the
/// result is out of range.
fn session_expiry(now: DateTime<Utc>, value: &str) -> Option<i64> {
    let seconds: i64 = value.trim().parse().ok()?;
    let duration = TimeDelta::try_seconds(seconds)?;
    now.checked_add_signed(duration).map(|exp| exp.timestamp())
}
