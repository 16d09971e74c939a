//! Common types shared across models: roles, log status, capabilities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// System-wide user role. The role alone determines which capabilities a
/// session can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Teacher,
    Head,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "Teacher",
            Role::Head => "Head",
            Role::Admin => "Admin",
        }
    }

    /// Head and Admin may approve or reject DTR entries.
    pub fn is_reviewer(&self) -> bool {
        matches!(self, Role::Head | Role::Admin)
    }

    /// Ordered capability descriptors for this role. The client builds its
    /// navigation from this list once per session instead of branching on the
    /// role string.
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut caps = vec![Capability::new("home", "Dashboard", Role::Teacher)];
        match self {
            Role::Teacher => {
                caps.push(Capability::new("entry", "Submit DTR", Role::Teacher));
                caps.push(Capability::new("history", "My History", Role::Teacher));
            }
            Role::Head => {
                caps.push(Capability::new("approval", "Approvals", Role::Head));
                caps.push(Capability::new("reports", "Dept. Reports", Role::Head));
            }
            Role::Admin => {
                caps.push(Capability::new("users", "Manage Users", Role::Admin));
                caps.push(Capability::new("approval", "Approvals", Role::Head));
                caps.push(Capability::new("reports", "Reports & Export", Role::Head));
            }
        }
        caps
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Teacher" => Ok(Role::Teacher),
            "Head" => Ok(Role::Head),
            "Admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Review state of a DTR entry. Pending is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogStatus {
    Pending,
    Approved,
    Rejected,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Pending => "Pending",
            LogStatus::Approved => "Approved",
            LogStatus::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(LogStatus::Pending),
            "Approved" => Ok(LogStatus::Approved),
            "Rejected" => Ok(LogStatus::Rejected),
            other => Err(format!("Unknown log status: {}", other)),
        }
    }
}

/// A UI capability reachable by a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub id: String,
    pub label: String,
    pub required_role: Role,
}

impl Capability {
    fn new(id: &str, label: &str, required_role: Role) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            required_role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Teacher, Role::Head, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("Janitor".parse::<Role>().is_err());
    }

    #[test]
    fn test_reviewer_roles() {
        assert!(!Role::Teacher.is_reviewer());
        assert!(Role::Head.is_reviewer());
        assert!(Role::Admin.is_reviewer());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [LogStatus::Pending, LogStatus::Approved, LogStatus::Rejected] {
            assert_eq!(status.as_str().parse::<LogStatus>().unwrap(), status);
        }
        assert!("Draft".parse::<LogStatus>().is_err());
    }

    #[test]
    fn test_capabilities_per_role() {
        let teacher: Vec<String> = Role::Teacher
            .capabilities()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(teacher, vec!["home", "entry", "history"]);

        let admin: Vec<String> = Role::Admin
            .capabilities()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(admin, vec!["home", "users", "approval", "reports"]);

        // Only teachers submit; only admins manage users.
        assert!(!Role::Head.capabilities().iter().any(|c| c.id == "entry"));
        assert!(!Role::Head.capabilities().iter().any(|c| c.id == "users"));
    }
}
