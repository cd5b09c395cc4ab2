use super::claims::UserClaims;

/// Per-request authentication failure.
///
/// Every variant is converted into a rejection at the provider boundary;
/// the `Display` text is what the login form shows to the user.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Malformed or incomplete POST request.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The SAML response or its attributes did not check out.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The session token could not be produced.
    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl AuthError {
    /// Short machine-readable class, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Protocol(_) => "protocol_error",
            AuthError::Validation(_) => "validation_error",
            AuthError::Signing(_) => "signing_error",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("The authorization POST request is not application/x-www-form-urlencoded")]
    WrongContentType { content_type: Option<String> },

    #[error("The authorization POST request has no SAMLResponse")]
    MissingSamlResponse,

    #[error("The authorization POST request with SAMLResponse failed base64 decoding: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("The authorization POST request with SAMLResponse is not valid UTF-8")]
    InvalidUtf8,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// No service provider binding accepted the response. One entry per
    /// binding, in registration order.
    #[error("The SAML response validation failures: {}", failures.join(", "))]
    NoBindingMatched { failures: Vec<String> },

    /// The assertion validated but lacked the email or display name attribute.
    /// Carries whatever was extracted, for diagnostics.
    #[error("The authorization failed, mandatory attributes not found: {claims:?}")]
    MissingMandatoryAttributes { claims: Box<UserClaims> },
}

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("Failed to issue JWT token: token secret is empty")]
    EmptySecret,

    #[error("Failed to issue JWT token: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}
