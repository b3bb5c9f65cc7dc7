//! Caller identity resolved from trusted request headers.

use serde::Serialize;
use utoipa::ToSchema;

/// Authenticated caller as forwarded by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    /// Stable identifier from `x-user-id`.
    pub id: String,
    /// Display name, when forwarded.
    pub name: Option<String>,
    /// Email address, when forwarded.
    pub email: Option<String>,
}

impl CurrentUser {
    /// Caller known only by id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: None,
        }
    }

    /// Name shown on contents and battles: the display name, else the local
    /// part of the email, else the id.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|name| !name.is_empty()) {
            return name.to_owned();
        }
        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .map(str::trim)
            .filter(|local| !local.is_empty())
            .unwrap_or(&self.id)
            .to_owned()
    }
}
