//! SAML 2.0 HTTP-POST binding.
//!
//! Extracts the `SAMLResponse` form field from an IdP-initiated POST and
//! hands the decoded XML to the service provider registry.

use base64::{Engine, engine::general_purpose::STANDARD};
use samael::schema::Assertion;

use super::{
    error::{AuthError, ProtocolError, ValidationError},
    saml_registry::ServiceProviderRegistry,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const SAML_RESPONSE_FIELD: &str = "SAMLResponse";

/// The parts of a verified assertion the claims mapper needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAssertion {
    pub attribute_statements: Vec<AttributeStatement>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeStatement {
    pub attributes: Vec<AssertionAttribute>,
}

/// A named attribute with its values in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssertionAttribute {
    pub name: String,
    pub values: Vec<String>,
}

impl ParsedAssertion {
    /// Every attribute of every statement, in document order.
    pub fn attributes(&self) -> impl Iterator<Item = &AssertionAttribute> {
        self.attribute_statements
            .iter()
            .flat_map(|statement| statement.attributes.iter())
    }
}

impl From<Assertion> for ParsedAssertion {
    fn from(assertion: Assertion) -> Self {
        let attribute_statements = assertion
            .attribute_statements
            .unwrap_or_default()
            .into_iter()
            .map(|statement| AttributeStatement {
                attributes: statement
                    .attributes
                    .into_iter()
                    .filter_map(|attr| {
                        // Unnamed attributes cannot be matched, drop them here.
                        let name = attr.name.or(attr.friendly_name)?;
                        let values = attr
                            .values
                            .into_iter()
                            .map(|v| v.value.unwrap_or_default())
                            .collect();
                        Some(AssertionAttribute { name, values })
                    })
                    .collect(),
            })
            .collect();

        Self { attribute_statements }
    }
}

/// Validates `SAMLResponse` POST bodies against the registered bindings.
#[derive(Debug, Clone)]
pub struct AssertionValidator {
    registry: ServiceProviderRegistry,
}

impl AssertionValidator {
    pub fn new(registry: ServiceProviderRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ServiceProviderRegistry {
        &self.registry
    }

    /// Validate a form-encoded POST body.
    ///
    /// The first binding that accepts the response wins. When none does,
    /// the error carries every binding's reason.
    pub fn validate(
        &self,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<ParsedAssertion, AuthError> {
        if !is_form_content_type(content_type) {
            return Err(ProtocolError::WrongContentType {
                content_type: content_type.map(str::to_string),
            }
            .into());
        }

        let encoded = saml_response_field(body).ok_or(ProtocolError::MissingSamlResponse)?;
        let decoded = STANDARD.decode(encoded.as_bytes()).map_err(ProtocolError::from)?;
        let response_xml = String::from_utf8(decoded).map_err(|_| ProtocolError::InvalidUtf8)?;

        tracing::debug!(xml_len = response_xml.len(), "Parsing SAML response");

        self.registry
            .verify_first(&response_xml)
            .map_err(|failures| ValidationError::NoBindingMatched { failures }.into())
    }
}

/// `application/x-www-form-urlencoded`, parameters such as `charset` allowed.
fn is_form_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

/// First non-empty `SAMLResponse` value of a form body.
fn saml_response_field(body: &[u8]) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(key, _)| key == SAML_RESPONSE_FIELD)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
