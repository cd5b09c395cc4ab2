use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Login form configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UiConfig {
    /// Page title.
    #[serde(default = "default_title")]
    pub title: String,

    /// Logo shown above the form.
    #[serde(default)]
    pub logo_url: Option<String>,

    /// Alt text for the logo.
    #[serde(default)]
    pub logo_description: String,

    /// Show the local username/password form next to the IdP links.
    #[serde(default)]
    pub local_auth_enabled: bool,

    /// Let users pick one of their roles after sign-in.
    #[serde(default)]
    pub allow_role_selection: bool,

    /// Jinja template file replacing the built-in form. Rendered with a
    /// single `args` variable.
    #[serde(default)]
    pub template_location: Option<String>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            logo_url: None,
            logo_description: String::new(),
            local_auth_enabled: false,
            allow_role_selection: false,
            template_location: None,
        }
    }
}

impl UiConfig {
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.title.is_empty() {
            self.title = default_title();
        }
        if let Some(logo_url) = self.logo_url.as_deref()
            && logo_url.is_empty()
        {
            self.logo_url = None;
        }
        if self.template_location.as_deref().is_some_and(str::is_empty) {
            self.template_location = None;
        }
        Ok(())
    }
}

fn default_title() -> String {
    "Sign In".to_string()
}
