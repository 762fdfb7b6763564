//! Selector registry: the single source of truth mapping semantic element
//! roles to page lookup expressions.
//!
//! VOOM's DOM changes often; everything volatile lives here as data so that
//! adapting to a page redesign is a registry update, not a logic change. The
//! registry can be loaded from a YAML file (role name → CSS expression) and
//! every expression is syntax-checked at load time, so a bad remediation
//! file fails fast instead of mid-extraction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The closed set of semantic element roles the extraction session needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorRole {
    /// Container holding the post's text body.
    PostTextContainer,
    /// Image elements inside the post's media area.
    ImageElement,
    /// The "show more" control that expands a truncated text preview.
    ShowMoreControl,
    /// Marker present when navigation landed on a login/consent surface.
    LoginMarker,
}

impl SelectorRole {
    pub const ALL: [SelectorRole; 4] = [
        SelectorRole::PostTextContainer,
        SelectorRole::ImageElement,
        SelectorRole::ShowMoreControl,
        SelectorRole::LoginMarker,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SelectorRole::PostTextContainer => "PostTextContainer",
            SelectorRole::ImageElement => "ImageElement",
            SelectorRole::ShowMoreControl => "ShowMoreControl",
            SelectorRole::LoginMarker => "LoginMarker",
        }
    }
}

impl std::fmt::Display for SelectorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    /// A role was requested that the loaded registry does not cover.
    /// Roles are a closed set, so this is a programmer/config error,
    /// never a page-content condition.
    #[error("no selector registered for role {0}")]
    UnknownRole(SelectorRole),

    #[error("invalid selector expression for {role}: {detail}")]
    InvalidExpression { role: String, detail: String },

    #[error("selector registry file is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Role → lookup-expression mapping with no behavior beyond lookup.
#[derive(Debug, Clone)]
pub struct SelectorRegistry {
    expressions: HashMap<SelectorRole, String>,
}

impl Default for SelectorRegistry {
    /// Expressions mirroring the VOOM DOM as currently observed.
    fn default() -> Self {
        let expressions = HashMap::from([
            (
                SelectorRole::PostTextContainer,
                ".post_text_view, .vw_post_text".to_string(),
            ),
            (
                SelectorRole::ImageElement,
                ".media_layout img.media_image, .media_layout img[src*='line-scdn']".to_string(),
            ),
            (
                SelectorRole::ShowMoreControl,
                "button.text_more_button".to_string(),
            ),
            (
                SelectorRole::LoginMarker,
                ".login_main_area, .vw_login_wrap".to_string(),
            ),
        ]);
        Self { expressions }
    }
}

impl SelectorRegistry {
    /// Build a registry from an explicit role → expression map, validating
    /// each expression's CSS syntax.
    pub fn from_map(map: HashMap<SelectorRole, String>) -> Result<Self, RegistryError> {
        for (role, expression) in &map {
            scraper::Selector::parse(expression).map_err(|e| RegistryError::InvalidExpression {
                role: role.name().to_string(),
                detail: format!("{expression}: {e}"),
            })?;
        }
        Ok(Self { expressions: map })
    }

    /// Parse a YAML registry file. Unknown role names are rejected by serde;
    /// roles absent from the file are simply unregistered.
    pub fn from_yaml(yaml: &str) -> Result<Self, RegistryError> {
        let map: HashMap<SelectorRole, String> = serde_yaml::from_str(yaml)?;
        Self::from_map(map)
    }

    /// Look up the expression for a role.
    pub fn resolve(&self, role: SelectorRole) -> Result<&str, RegistryError> {
        self.expressions
            .get(&role)
            .map(String::as_str)
            .ok_or(RegistryError::UnknownRole(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_covers_every_role() {
        let registry = SelectorRegistry::default();
        for role in SelectorRole::ALL {
            assert!(registry.resolve(role).is_ok(), "missing {role}");
        }
    }

    #[test]
    fn test_default_expressions_are_valid_css() {
        let registry = SelectorRegistry::default();
        for role in SelectorRole::ALL {
            let expression = registry.resolve(role).unwrap();
            assert!(scraper::Selector::parse(expression).is_ok());
        }
    }

    #[test]
    fn test_yaml_load_overrides_expressions() {
        let yaml = r#"
post_text_container: ".redesigned_text"
image_element: ".redesigned_media img"
show_more_control: "button.more"
login_marker: ".login"
"#;
        let registry = SelectorRegistry::from_yaml(yaml).unwrap();
        assert_eq!(
            registry.resolve(SelectorRole::PostTextContainer).unwrap(),
            ".redesigned_text"
        );
    }

    #[test]
    fn test_yaml_rejects_unknown_role_names() {
        let yaml = "mystery_role: \".x\"\n";
        assert!(matches!(
            SelectorRegistry::from_yaml(yaml),
            Err(RegistryError::Yaml(_))
        ));
    }

    #[test]
    fn test_invalid_expression_fails_at_load() {
        let yaml = "image_element: \"[[[\"\n";
        assert!(matches!(
            SelectorRegistry::from_yaml(yaml),
            Err(RegistryError::InvalidExpression { .. })
        ));
    }

    #[test]
    fn test_missing_role_is_unknown_role() {
        let yaml = "image_element: \"img\"\n";
        let registry = SelectorRegistry::from_yaml(yaml).unwrap();
        assert!(matches!(
            registry.resolve(SelectorRole::LoginMarker),
            Err(RegistryError::UnknownRole(SelectorRole::LoginMarker))
        ));
    }
}
