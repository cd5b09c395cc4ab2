mod claims;
mod error;
mod identity;
pub mod jwt;
pub mod metadata;
mod provider;
pub mod saml;
pub mod saml_registry;

pub use claims::{ClaimsMapper, DEFAULT_TOKEN_LIFETIME, UserClaims};
pub use error::{AuthError, ProtocolError, SigningError, ValidationError};
pub use identity::AuthenticatedUser;
pub use jwt::TokenIssuer;
pub use metadata::{IdentityProvider, SigningCertificate};
pub use provider::{
    AuthenticationOutcome, AuthenticationResponse, IdpOriginGate, SamlAuthProvider,
};
pub use saml::{AssertionValidator, ParsedAssertion};
pub use saml_registry::{AssertionVerifier, ServiceProviderBinding, ServiceProviderRegistry};
