use core::str::FromStr;

use serde::{Deserialize, Serialize};

use doctrack_core::DomainError;

/// Permission tier of a user account.
///
/// The set is closed; the wire/storage spelling is the lower-case Spanish name.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "administrador")]
    Administrator,
    #[serde(rename = "preparador")]
    Preparer,
    /// Lowest-privilege tier; subject to contract scoping.
    #[serde(rename = "cliente")]
    Client,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Administrator, Role::Preparer, Role::Client];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrador",
            Role::Preparer => "preparador",
            Role::Client => "cliente",
        }
    }
}

/// Trim + lower-case, the comparison form for role names.
pub fn normalize_role(raw: &str) -> String {
    raw.trim().to_lowercase()
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_role(s);
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == normalized)
            .ok_or_else(|| {
                DomainError::validation("rol must be one of: administrador, preparador, cliente")
            })
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_and_whitespace_insensitive() {
        assert_eq!(" Administrador ".parse::<Role>().unwrap(), Role::Administrator);
        assert_eq!("PREPARADOR".parse::<Role>().unwrap(), Role::Preparer);
        assert_eq!("cliente\n".parse::<Role>().unwrap(), Role::Client);
    }

    #[test]
    fn unknown_role_is_a_validation_error() {
        assert!(matches!("admin".parse::<Role>(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn serializes_with_spanish_names() {
        assert_eq!(serde_json::to_string(&Role::Preparer).unwrap(), "\"preparador\"");
    }
}
