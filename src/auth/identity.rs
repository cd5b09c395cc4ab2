use std::collections::BTreeMap;

use super::claims::UserClaims;

/// The user handed to the hosting application after a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Stable identity key (email address)
    pub id: String,

    /// `name`, `email` and space-separated `roles`
    pub metadata: BTreeMap<String, String>,
}

impl From<&UserClaims> for AuthenticatedUser {
    fn from(claims: &UserClaims) -> Self {
        let metadata = BTreeMap::from([
            ("name".to_string(), claims.name.clone()),
            ("email".to_string(), claims.email.clone()),
            ("roles".to_string(), claims.roles.join(" ")),
        ]);

        Self {
            id: claims.email.clone(),
            metadata,
        }
    }
}
