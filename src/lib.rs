//! SAML 2.0 HTTP-POST assertion consumer.
//!
//! Accepts IdP-initiated SAML responses from Azure AD, validates them
//! against one service provider binding per ACS URL, maps the asserted
//! attributes to claims and issues an HS512 session token. The login form
//! is rendered on every request to the authentication endpoint.

pub mod auth;
pub mod config;
#[cfg(feature = "server")]
pub mod observability;
pub mod routes;
pub mod ui;
