//! Service provider bindings, one per Assertion Consumer Service URL.
//!
//! A site reachable under several addresses receives responses addressed to
//! each of them. Every address gets its own binding against the same IdP
//! metadata, and an incoming response is offered to the bindings in
//! registration order until one accepts it.

use std::sync::Arc;

use samael::{
    schema::Response,
    service_provider::{ServiceProvider, ServiceProviderBuilder},
};

use super::{metadata::IdentityProvider, saml::ParsedAssertion};
use crate::config::ConfigError;

/// Something that can verify a decoded SAML response for one ACS endpoint.
pub trait AssertionVerifier: Send + Sync {
    /// The ACS URL this verifier expects responses to be addressed to.
    fn acs_url(&self) -> &str;

    /// Verify signature, conditions and destination of a SAML response.
    /// The error is a human-readable reason.
    fn verify(&self, response_xml: &str) -> Result<ParsedAssertion, String>;
}

/// A samael service provider bound to one ACS URL.
pub struct ServiceProviderBinding {
    acs_url: String,
    provider: ServiceProvider,
}

impl ServiceProviderBinding {
    pub fn new(idp: &IdentityProvider, acs_url: &str) -> Result<Self, ConfigError> {
        let mut builder = ServiceProviderBuilder::default();
        builder
            .acs_url(acs_url.to_string())
            .idp_metadata(idp.metadata.clone())
            .allow_idp_initiated(true);

        if let Some(entity_id) = idp.sp_entity_id() {
            builder.entity_id(entity_id.clone()).metadata_url(entity_id);
        }

        let provider = builder.build().map_err(|e| {
            ConfigError::Metadata(format!(
                "failed to build service provider for ACS URL '{acs_url}': {e}"
            ))
        })?;

        Ok(Self {
            acs_url: acs_url.to_string(),
            provider,
        })
    }
}

impl AssertionVerifier for ServiceProviderBinding {
    fn acs_url(&self) -> &str {
        &self.acs_url
    }

    fn verify(&self, response_xml: &str) -> Result<ParsedAssertion, String> {
        require_signature(response_xml)?;

        // IdP-initiated responses answer no request, so there is no
        // InResponseTo to match.
        self.provider
            .parse_xml_response(response_xml, None)
            .map(ParsedAssertion::from)
            .map_err(|e| e.to_string())
    }
}

/// Either the response or its assertion must carry an XML signature.
fn require_signature(response_xml: &str) -> Result<(), String> {
    let response: Response = response_xml
        .parse()
        .map_err(|e| format!("Failed to parse SAML response: {e}"))?;

    let assertion_signed = response
        .assertion
        .as_ref()
        .is_some_and(|assertion| assertion.signature.is_some());

    if response.signature.is_none() && !assertion_signed {
        return Err("SAML response and assertion are both unsigned".to_string());
    }
    Ok(())
}

impl std::fmt::Debug for ServiceProviderBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProviderBinding")
            .field("acs_url", &self.acs_url)
            .field("entity_id", &self.provider.entity_id)
            .finish()
    }
}

/// Ordered, immutable set of verifiers.
#[derive(Clone)]
pub struct ServiceProviderRegistry {
    bindings: Vec<Arc<dyn AssertionVerifier>>,
}

impl ServiceProviderRegistry {
    /// Build one [`ServiceProviderBinding`] per ACS URL of `idp`.
    pub fn from_identity_provider(idp: &IdentityProvider) -> Result<Self, ConfigError> {
        let bindings = idp
            .acs_urls
            .iter()
            .map(|acs_url| {
                ServiceProviderBinding::new(idp, acs_url)
                    .map(|binding| Arc::new(binding) as Arc<dyn AssertionVerifier>)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let registry = Self::from_verifiers(bindings)?;
        tracing::info!(
            bindings = registry.len(),
            entity_id = idp.sp_entity_id().as_deref().unwrap_or_default(),
            "Registered SAML service provider bindings"
        );
        Ok(registry)
    }

    pub fn from_verifiers(bindings: Vec<Arc<dyn AssertionVerifier>>) -> Result<Self, ConfigError> {
        if bindings.is_empty() {
            return Err(ConfigError::Validation("ACS URLs are missing".into()));
        }
        Ok(Self { bindings })
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn acs_urls(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|binding| binding.acs_url())
    }

    /// Offer `response_xml` to each binding in order and return the first
    /// assertion that verifies. On total failure, returns every binding's
    /// reason in registration order.
    pub fn verify_first(&self, response_xml: &str) -> Result<ParsedAssertion, Vec<String>> {
        let mut failures = Vec::with_capacity(self.bindings.len());

        for binding in &self.bindings {
            match binding.verify(response_xml) {
                Ok(assertion) => {
                    tracing::debug!(
                        acs_url = binding.acs_url(),
                        rejected_by = failures.len(),
                        "SAML response accepted"
                    );
                    return Ok(assertion);
                }
                Err(reason) => {
                    tracing::debug!(
                        acs_url = binding.acs_url(),
                        reason = %reason,
                        "SAML response rejected by binding"
                    );
                    failures.push(reason);
                }
            }
        }

        Err(failures)
    }
}

impl std::fmt::Debug for ServiceProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.acs_urls()).finish()
    }
}


#[cfg(test)]
mod tests {
    use super::{fixtures::*, *};
    use crate::auth::{
        metadata::{
            SigningCertificate,
            fixtures::{generate_test_certificate, idp_metadata_xml},
            inject_signing_key, parse_metadata,
        },
        saml::{AssertionAttribute, AttributeStatement},
    };

    fn identity_provider(acs_urls: &[&str], entity_id: Option<&str>) -> IdentityProvider {
        let (pem, _) = generate_test_certificate();
        let cert = SigningCertificate::from_bytes(pem.as_bytes()).unwrap();
        let mut metadata = parse_metadata(&idp_metadata_xml("tenant-1")).unwrap();
        inject_signing_key(&mut metadata, &cert).unwrap();

        IdentityProvider {
            login_url: "https://account.activedirectory.windowsazure.com/applications/signin/Gatekeeper/app-1?tenantId=tenant-1".to_string(),
            metadata_url: None,
            metadata,
            entity_id: entity_id.map(str::to_string),
            acs_urls: acs_urls.iter().map(|u| u.to_string()).collect(),
        }
    }

    fn sample_assertion(email: &str) -> ParsedAssertion {
        ParsedAssertion {
            attribute_statements: vec![AttributeStatement {
                attributes: vec![AssertionAttribute {
                    name: "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress"
                        .to_string(),
                    values: vec![email.to_string()],
                }],
            }],
        }
    }

    #[test]
    fn test_one_binding_per_acs_url() {
        let idp = identity_provider(
            &["https://app.example.com/saml", "https://10.0.0.5/saml"],
            Some("urn:gatekeeper:app"),
        );

        let registry = ServiceProviderRegistry::from_identity_provider(&idp).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.acs_urls().collect::<Vec<_>>(),
            vec!["https://app.example.com/saml", "https://10.0.0.5/saml"]
        );
    }

    #[test]
    fn test_binding_carries_entity_id_and_idp_initiated() {
        let idp = identity_provider(&["https://app.example.com/saml"], Some("urn:gatekeeper:app"));

        let binding = ServiceProviderBinding::new(&idp, "https://app.example.com/saml").unwrap();

        assert!(binding.provider.allow_idp_initiated);
        assert_eq!(
            binding.provider.acs_url.as_deref(),
            Some("https://app.example.com/saml")
        );
        assert_eq!(binding.provider.entity_id.as_deref(), Some("urn:gatekeeper:app"));
        assert_eq!(
            binding.provider.metadata_url.as_deref(),
            Some("urn:gatekeeper:app")
        );
    }

    #[test]
    fn test_no_acs_urls_rejected() {
        let idp = identity_provider(&[], None);
        let result = ServiceProviderRegistry::from_identity_provider(&idp);
        assert!(matches!(result, Err(ConfigError::Validation(msg)) if msg.contains("ACS URLs")));
    }

    #[test]
    fn test_samael_binding_rejects_garbage() {
        let idp = identity_provider(&["https://app.example.com/saml"], None);
        let registry = ServiceProviderRegistry::from_identity_provider(&idp).unwrap();

        let failures = registry.verify_first("this is not xml at all!").unwrap_err();
        assert_eq!(failures.len(), 1);
        assert!(!failures[0].is_empty());
    }

    const IDP_ENTITY_ID: &str = "https://sts.windows.net/tenant-1/";
    const SP_ENTITY_ID: &str = "urn:gatekeeper:app";
    const FIRST_ACS: &str = "https://app.example.com/saml";
    const SECOND_ACS: &str = "https://10.0.0.5/saml";

    fn two_binding_registry() -> ServiceProviderRegistry {
        let idp = identity_provider(&[FIRST_ACS, SECOND_ACS], Some(SP_ENTITY_ID));
        ServiceProviderRegistry::from_identity_provider(&idp).unwrap()
    }

    fn response_to(destination: &str, signed: bool) -> String {
        ResponseFixture {
            destination,
            idp_entity_id: IDP_ENTITY_ID,
            audience: SP_ENTITY_ID,
            signed,
        }
        .to_xml()
    }

    #[test]
    fn test_unsigned_response_rejected_by_every_binding() {
        let failures = two_binding_registry()
            .verify_first(&response_to(SECOND_ACS, false))
            .unwrap_err();

        assert_eq!(failures.len(), 2);
        for failure in &failures {
            assert!(failure.contains("unsigned"), "unexpected failure: {failure}");
        }
    }

    #[cfg(not(feature = "xmlsec"))]
    #[test]
    fn test_real_bindings_match_on_destination() {
        let registry = two_binding_registry();
        let xml = response_to(SECOND_ACS, true);

        let idp = identity_provider(&[FIRST_ACS], Some(SP_ENTITY_ID));
        let first = ServiceProviderBinding::new(&idp, FIRST_ACS).unwrap();
        let reason = first.verify(&xml).unwrap_err();
        assert!(
            reason.to_lowercase().contains("destination"),
            "unexpected failure: {reason}"
        );

        let assertion = registry.verify_first(&xml).unwrap();
        let attributes: Vec<_> = assertion.attributes().collect();
        assert_eq!(attributes.len(), 5);
        assert_eq!(
            attributes[0].name,
            "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress"
        );
        assert_eq!(attributes[0].values, vec!["jdoe@example.com"]);
        assert_eq!(attributes[3].name, "https://aws.amazon.com/SAML/Attributes/Role");
        assert_eq!(attributes[3].values, vec!["admin", "user"]);
        assert_eq!(attributes[4].name, "department");
        assert_eq!(attributes[4].values, vec!["Engineering"]);

        let claims = crate::auth::ClaimsMapper::default().map(&assertion).unwrap();
        assert_eq!(claims.email, "jdoe@example.com");
        assert_eq!(claims.name, "Jane Doe");
        assert_eq!(claims.sub, "jdoe");
        assert_eq!(claims.roles, vec!["admin", "user"]);
    }

    #[cfg(not(feature = "xmlsec"))]
    #[test]
    fn test_real_binding_rejects_foreign_destination() {
        let failures = two_binding_registry()
            .verify_first(&response_to("https://elsewhere.example.com/saml", true))
            .unwrap_err();

        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|f| f.to_lowercase().contains("destination")));
    }

    #[cfg(feature = "xmlsec")]
    #[test]
    fn test_forged_signature_rejected() {
        let failures = two_binding_registry()
            .verify_first(&response_to(SECOND_ACS, true))
            .unwrap_err();
        assert_eq!(failures.len(), 2);
    }

    #[test]
    fn test_second_binding_wins_after_first_fails() {
        let first = StubVerifier::rejecting("https://a.example.com/saml", "wrong destination");
        let second = StubVerifier::accepting("https://b.example.com/saml", sample_assertion("a@b.com"));
        let third = StubVerifier::accepting("https://c.example.com/saml", sample_assertion("c@d.com"));
        let (first_calls, third_calls) = (first.calls.clone(), third.calls.clone());

        let registry = ServiceProviderRegistry::from_verifiers(vec![
            Arc::new(first),
            Arc::new(second),
            Arc::new(third),
        ])
        .unwrap();

        let assertion = registry.verify_first("<Response/>").unwrap();

        assert_eq!(assertion, sample_assertion("a@b.com"));
        assert_eq!(calls(&first_calls), 1);
        assert_eq!(calls(&third_calls), 0);
    }

    #[test]
    fn test_all_failures_collected_in_order() {
        let registry = ServiceProviderRegistry::from_verifiers(vec![
            Arc::new(StubVerifier::rejecting("https://a.example.com/saml", "bad signature")),
            Arc::new(StubVerifier::rejecting("https://b.example.com/saml", "wrong audience")),
        ])
        .unwrap();

        let failures = registry.verify_first("<Response/>").unwrap_err();
        assert_eq!(failures, vec!["bad signature", "wrong audience"]);
    }

    #[test]
    fn test_empty_verifier_list_rejected() {
        let result = ServiceProviderRegistry::from_verifiers(Vec::new());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
