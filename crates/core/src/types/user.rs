//! Account identity returned by the BookHub API.

use serde::{Deserialize, Serialize};

use crate::{Email, Role, UserId};

/// A BookHub account.
///
/// The API returns the id as either `id` or `_id`; both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Server-issued account id.
    #[serde(alias = "_id")]
    pub id: UserId,
    /// Account email.
    pub email: Email,
    /// Display name.
    #[serde(default)]
    pub full_name: String,
    /// Account role.
    pub role: Role,
    /// Contact phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl User {
    /// Whether this account is a back-office administrator.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Name to greet the user with, falling back to the email.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            self.email.as_str()
        } else {
            &self.full_name
        }
    }
}
