//! Role and status enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account role as reported by the BookHub API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular member who browses, rents and buys books.
    #[default]
    User,
    /// Back-office administrator.
    Admin,
}

impl Role {
    /// Login route a session of this role is sent to when it ends.
    #[must_use]
    pub const fn login_route(self) -> &'static str {
        match self {
            Self::User => "/login",
            Self::Admin => "/admin/login",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// Client-side view of where a rental stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    /// Borrowed and still within the rental period.
    Active,
    /// Borrowed and past its due date.
    Overdue,
    /// Handed back.
    Returned,
}

impl RentalStatus {
    /// Derive the status from the server's rental fields.
    #[must_use]
    pub fn derive(is_returned: bool, due_date: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if is_returned {
            Self::Returned
        } else if due_date < now {
            Self::Overdue
        } else {
            Self::Active
        }
    }
}

impl std::fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Overdue => write!(f, "overdue"),
            Self::Returned => write!(f, "returned"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let role: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, Role::User);
    }

    #[test]
    fn test_role_login_routes_differ() {
        assert_eq!(Role::User.login_route(), "/login");
        assert_eq!(Role::Admin.login_route(), "/admin/login");
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_rental_status_derive() {
        let now = Utc::now();
        let past = now - Duration::days(1);
        let future = now + Duration::days(1);

        assert_eq!(RentalStatus::derive(true, past, now), RentalStatus::Returned);
        assert_eq!(RentalStatus::derive(false, past, now), RentalStatus::Overdue);
        assert_eq!(RentalStatus::derive(false, future, now), RentalStatus::Active);
    }
}
