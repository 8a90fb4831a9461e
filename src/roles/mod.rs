use log::{ info, warn };

pub const DEFAULT_ROLES: [&str; 2] = ["Executive", "DataAnalyst"];

/// Closed set of personas a request may answer as.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    roles: Vec<String>,
}

impl RoleRegistry {
    /// Builds a registry from configured names, dropping blanks and repeats.
    pub fn new<I, S>(names: I) -> Self where I: IntoIterator<Item = S>, S: AsRef<str> {
        let mut roles: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() || roles.iter().any(|r| r == name) {
                continue;
            }
            roles.push(name.to_string());
        }
        Self { roles }
    }

    pub fn list_roles(&self) -> &[String] {
        info!("Returning {} available roles", self.roles.len());
        &self.roles
    }

    pub fn is_valid(&self, role: &str) -> bool {
        let valid = self.roles.iter().any(|r| r == role);
        if !valid {
            warn!("Invalid role requested: {}", role);
        }
        valid
    }
}

impl Default for RoleRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_ROLES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_knows_builtin_roles() {
        let registry = RoleRegistry::default();
        assert!(registry.is_valid("Executive"));
        assert!(registry.is_valid("DataAnalyst"));
        assert!(!registry.is_valid("Pirate"));
        assert_eq!(registry.list_roles(), &["Executive".to_string(), "DataAnalyst".to_string()]);
    }

    #[test]
    fn membership_is_case_sensitive() {
        let registry = RoleRegistry::default();
        assert!(!registry.is_valid("executive"));
        assert!(!registry.is_valid(""));
    }

    #[test]
    fn configured_names_are_trimmed_and_deduplicated() {
        let registry = RoleRegistry::new(["CFO", " Analyst ", "", "CFO"]);
        assert_eq!(registry.list_roles(), &["CFO".to_string(), "Analyst".to_string()]);
        assert!(registry.is_valid("Analyst"));
    }
}
