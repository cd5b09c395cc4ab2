//! HS512 session tokens.
//!
//! Tokens are stateless: anyone holding the shared secret can verify them,
//! and validity ends at the `exp` claim.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use super::{claims::UserClaims, error::SigningError};
use crate::config::TokenConfig;

/// Signs and verifies [`UserClaims`] with a shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Vec<u8>,
    issuer: Option<String>,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl TokenIssuer {
    pub fn new(secret: impl Into<Vec<u8>>, issuer: Option<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.filter(|issuer| !issuer.is_empty()),
        }
    }

    pub fn from_config(config: &TokenConfig) -> Self {
        Self::new(config.secret(), Some(config.token_issuer.clone()))
    }

    /// Sign `claims` as a compact JWS.
    pub fn issue(&self, claims: &UserClaims) -> Result<String, SigningError> {
        if self.secret.is_empty() {
            return Err(SigningError::EmptySecret);
        }

        let token = encode(
            &Header::new(Algorithm::HS512),
            claims,
            &EncodingKey::from_secret(&self.secret),
        )?;
        Ok(token)
    }

    /// Check signature, expiry and (when configured) issuer of `token`.
    pub fn verify(&self, token: &str) -> Result<UserClaims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.set_required_spec_claims(&["exp"]);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        let data = decode::<UserClaims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &validation,
        )?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use jsonwebtoken::errors::ErrorKind;

    use super::*;

    fn sample_claims() -> UserClaims {
        UserClaims {
            exp: Utc::now().timestamp() + 900,
            iss: "gatekeeper".to_string(),
            sub: "jdoe".to_string(),
            name: "Jane Doe".to_string(),
            email: "a@b.com".to_string(),
            origin: "https://sts.windows.net/tenant-1/".to_string(),
            roles: vec!["admin".to_string(), "user".to_string()],
        }
    }

    #[test]
    fn test_round_trip() {
        let issuer = TokenIssuer::new("s3cret", Some("gatekeeper".to_string()));
        let claims = sample_claims();

        let token = issuer.issue(&claims).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let verified = issuer.verify(&token).unwrap();
        assert_eq!(verified, claims);
    }

    #[test]
    fn test_header_is_hs512() {
        let issuer = TokenIssuer::new("s3cret", None);
        let token = issuer.issue(&sample_claims()).unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS512);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenIssuer::new("s3cret", None)
            .issue(&sample_claims())
            .unwrap();

        let err = TokenIssuer::new("other", None).verify(&token).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidSignature);
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = TokenIssuer::new("s3cret", None);
        let claims = UserClaims {
            exp: Utc::now().timestamp() - 3600,
            ..sample_claims()
        };

        let token = issuer.issue(&claims).unwrap();
        let err = issuer.verify(&token).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ExpiredSignature);
    }

    #[test]
    fn test_issuer_mismatch_rejected() {
        let token = TokenIssuer::new("s3cret", None)
            .issue(&UserClaims {
                iss: "someone-else".to_string(),
                ..sample_claims()
            })
            .unwrap();

        let err = TokenIssuer::new("s3cret", Some("gatekeeper".to_string()))
            .verify(&token)
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidIssuer);
    }

    #[test]
    fn test_empty_secret_refused() {
        let err = TokenIssuer::new("", None).issue(&sample_claims()).unwrap_err();
        assert!(matches!(err, SigningError::EmptySecret));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let issuer = TokenIssuer::new("s3cret", None);
        let debug = format!("{issuer:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
