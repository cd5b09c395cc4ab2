//! Login form rendering.
//!
//! Every visit to the authentication endpoint renders the form, whether or
//! not a sign-in was attempted, so this module is a plain sink: it takes
//! [`LoginFormArgs`] and produces an HTML response.

use std::sync::Arc;

use askama::Template;
use http::{HeaderValue, Response, StatusCode, header};
use serde::Serialize;

use crate::config::{ConfigError, UiConfig};

/// A sign-in link shown on the form, e.g. the IdP portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginFormLink {
    pub link: String,
    pub title: String,
    /// Font Awesome icon class.
    pub style: String,
}

/// Values the login template is rendered with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoginFormArgs {
    pub title: String,
    pub logo_url: String,
    pub logo_description: String,
    pub auth_endpoint: String,
    pub message: String,
    pub message_type: String,
    pub links: Vec<LoginFormLink>,
    pub local_auth_enabled: bool,
    pub authenticated: bool,
    pub success_url_path: String,
    pub allow_role_selection: bool,
    pub roles: Vec<String>,
}

impl LoginFormArgs {
    /// Base arguments for a form served on `auth_endpoint`.
    pub fn from_config(
        ui: &UiConfig,
        auth_endpoint: &str,
        success_url_path: Option<&str>,
        links: Vec<LoginFormLink>,
    ) -> Self {
        Self {
            title: ui.title.clone(),
            logo_url: ui.logo_url.clone().unwrap_or_default(),
            logo_description: ui.logo_description.clone(),
            auth_endpoint: auth_endpoint.to_string(),
            links,
            local_auth_enabled: ui.local_auth_enabled,
            success_url_path: success_url_path.unwrap_or_default().to_string(),
            allow_role_selection: ui.allow_role_selection,
            ..Self::default()
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self.message_type = "error".to_string();
        self
    }

    pub fn with_authenticated(mut self, roles: Vec<String>) -> Self {
        self.authenticated = true;
        self.roles = roles;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to render login form: {0}")]
    Template(#[from] askama::Error),

    #[error("failed to render custom login form: {0}")]
    Custom(#[from] minijinja::Error),
}

/// Turns [`LoginFormArgs`] into HTML.
pub trait LoginFormRenderer: Send + Sync {
    fn render(&self, args: &LoginFormArgs) -> Result<String, RenderError>;
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginPage<'a> {
    args: &'a LoginFormArgs,
}

/// Renders the built-in `login.html` template.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLoginForm;

impl LoginFormRenderer for DefaultLoginForm {
    fn render(&self, args: &LoginFormArgs) -> Result<String, RenderError> {
        Ok(LoginPage { args }.render()?)
    }
}

/// Renders an operator-supplied template, compiled once at startup.
#[derive(Debug)]
pub struct CustomLoginForm {
    env: minijinja::Environment<'static>,
}

impl CustomLoginForm {
    // The `.html` suffix turns on HTML auto-escaping.
    const TEMPLATE_NAME: &'static str = "login.html";

    pub fn from_source(source: String) -> Result<Self, ConfigError> {
        let mut env = minijinja::Environment::new();
        env.add_template_owned(Self::TEMPLATE_NAME, source)
            .map_err(|e| ConfigError::Template(e.to_string()))?;
        Ok(Self { env })
    }

    pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Io(e, path.into()))?;
        Self::from_source(source)
    }
}

impl LoginFormRenderer for CustomLoginForm {
    fn render(&self, args: &LoginFormArgs) -> Result<String, RenderError> {
        let template = self.env.get_template(Self::TEMPLATE_NAME)?;
        Ok(template.render(minijinja::context! { args => args })?)
    }
}

/// The configured template when `ui.template_location` is set, the built-in
/// form otherwise.
pub async fn renderer_from_config(ui: &UiConfig) -> Result<Arc<dyn LoginFormRenderer>, ConfigError> {
    match ui.template_location.as_deref() {
        Some(path) => {
            let renderer = CustomLoginForm::from_file(path).await?;
            tracing::info!(template_location = path, "Loaded login form template");
            Ok(Arc::new(renderer))
        }
        None => Ok(Arc::new(DefaultLoginForm)),
    }
}

/// Render the form into an uncacheable HTML response.
///
/// A render failure yields a bare 500 and is logged; it never propagates.
pub fn render_response(renderer: &dyn LoginFormRenderer, args: &LoginFormArgs) -> Response<String> {
    match renderer.render(args) {
        Ok(html) => {
            let mut response = Response::new(html);
            let headers = response.headers_mut();
            headers.insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache, no-store, must-revalidate"),
            );
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
            response
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to render login form");
            let mut response = Response::new("Internal Server Error".to_string());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}


#[cfg(test)]
mod tests {
    use super::{fixtures::FailingRenderer, *};

    fn office_link() -> LoginFormLink {
        LoginFormLink {
            link: "https://account.activedirectory.windowsazure.com/applications/signin/Gatekeeper/app-1?tenantId=tenant-1".to_string(),
            title: "Office 365".to_string(),
            style: "fa-windows".to_string(),
        }
    }

    fn base_args() -> LoginFormArgs {
        LoginFormArgs::from_config(&UiConfig::default(), "/saml", Some("/app"), vec![office_link()])
    }

    #[test]
    fn test_from_config() {
        let ui = UiConfig {
            logo_url: Some("https://example.com/logo.png".to_string()),
            logo_description: "Example".to_string(),
            local_auth_enabled: true,
            ..UiConfig::default()
        };

        let args = LoginFormArgs::from_config(&ui, "/saml", None, vec![]);

        assert_eq!(args.title, "Sign In");
        assert_eq!(args.logo_url, "https://example.com/logo.png");
        assert_eq!(args.auth_endpoint, "/saml");
        assert!(args.local_auth_enabled);
        assert!(args.message.is_empty());
        assert!(!args.authenticated);
        assert!(args.success_url_path.is_empty());
    }

    #[test]
    fn test_render_links_without_message() {
        let html = DefaultLoginForm.render(&base_args()).unwrap();

        assert!(html.contains("<title>Sign In</title>"));
        assert!(html.contains("Office 365"));
        assert!(html.contains("fa-windows"));
        assert!(!html.contains("role=\"alert\""));
    }

    #[test]
    fn test_render_error_message_escaped() {
        let args = base_args().with_error("bad <signature>");
        let html = DefaultLoginForm.render(&args).unwrap();

        assert!(html.contains("message-error"));
        assert!(html.contains("bad &lt;signature&gt;"));
        assert!(!html.contains("bad <signature>"));
    }

    #[test]
    fn test_render_authenticated_hides_links() {
        let args = base_args().with_authenticated(vec!["admin".to_string()]);
        let html = DefaultLoginForm.render(&args).unwrap();

        assert!(html.contains("You are signed in."));
        assert!(html.contains("Continue"));
        assert!(!html.contains("Office 365"));
    }

    #[test]
    fn test_render_role_selection() {
        let mut args = base_args().with_authenticated(vec!["admin".to_string(), "user".to_string()]);
        args.allow_role_selection = true;

        let html = DefaultLoginForm.render(&args).unwrap();

        assert!(html.contains("<option value=\"admin\">admin</option>"));
        assert!(html.contains("<option value=\"user\">user</option>"));
    }

    #[test]
    fn test_render_local_auth_form() {
        let mut args = base_args();
        args.local_auth_enabled = true;

        let html = DefaultLoginForm.render(&args).unwrap();
        assert!(html.contains("name=\"username\""));
        assert!(html.contains("name=\"password\""));
    }

    #[test]
    fn test_render_response_headers() {
        let response = render_response(&DefaultLoginForm, &base_args());

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "no-cache, no-store, must-revalidate"
        );
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        assert!(response.body().contains("Sign In"));
    }

    const CUSTOM_TEMPLATE: &str = r#"<h1>{{ args.title }}</h1>
{% if args.message %}<p class="{{ args.message_type }}">{{ args.message }}</p>{% endif %}
{% for link in args.links %}<a class="{{ link.style }}">{{ link.title }}</a>{% endfor %}"#;

    fn template_file(contents: &str) -> tempfile::NamedTempFile {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".html").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_custom_template_from_config() {
        let file = template_file(CUSTOM_TEMPLATE);
        let ui = UiConfig {
            template_location: Some(file.path().to_string_lossy().to_string()),
            ..UiConfig::default()
        };

        let renderer = renderer_from_config(&ui).await.unwrap();
        let html = renderer.render(&base_args().with_error("bad <signature>")).unwrap();

        assert!(html.contains("<h1>Sign In</h1>"));
        assert!(html.contains("<p class=\"error\">bad &lt;signature&gt;</p>"));
        assert!(html.contains("<a class=\"fa-windows\">Office 365</a>"));
        assert!(!html.contains("You are signed in."));
    }

    #[tokio::test]
    async fn test_builtin_template_without_location() {
        let renderer = renderer_from_config(&UiConfig::default()).await.unwrap();
        let html = renderer.render(&base_args()).unwrap();
        assert!(html.contains("<title>Sign In</title>"));
    }

    #[tokio::test]
    async fn test_custom_template_missing_file() {
        let ui = UiConfig {
            template_location: Some("/nonexistent/login.html".to_string()),
            ..UiConfig::default()
        };

        let result = renderer_from_config(&ui).await;
        assert!(matches!(result, Err(ConfigError::Io(_, _))));
    }

    #[tokio::test]
    async fn test_custom_template_syntax_error() {
        let file = template_file("<h1>{% if args.title %}{{ args.title }}</h1>");

        let result = CustomLoginForm::from_file(&file.path().to_string_lossy()).await;
        assert!(matches!(result, Err(ConfigError::Template(_))));
    }

    #[test]
    fn test_render_failure_is_500() {
        let response = render_response(&FailingRenderer, &base_args());

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body(), "Internal Server Error");
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
    }
}
