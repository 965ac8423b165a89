//! Reference-data lookups.
//!
//! Document types map to an SOP-number acronym and a storage folder;
//! departments map to their supervisor. Administration of this data happens
//! elsewhere; the engine only reads it through [`ReferenceData`].

use crate::config::VaultConfig;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supervisor {
    pub name: String,
    pub email: Option<String>,
}

pub trait ReferenceData {
    fn doc_type_acronym(&self, doc_type: &str) -> Option<String>;
    fn doc_type_folder(&self, doc_type: &str) -> Option<String>;
    fn department_supervisor(&self, department: &str) -> Option<Supervisor>;
}

/// Lookup tables built from configuration. Keys match case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    acronyms: HashMap<String, String>,
    folders: HashMap<String, String>,
    supervisors: HashMap<String, Supervisor>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &VaultConfig) -> Self {
        let mut dir = Self::new();
        for (name, doc_type) in config.doc_types() {
            if let Some(acronym) = doc_type.acronym {
                dir = dir.with_acronym(&name, acronym);
            }
            if let Some(folder) = doc_type.folder {
                dir = dir.with_folder(&name, folder);
            }
        }
        for (department, sup) in config.supervisors() {
            dir = dir.with_supervisor(&department, sup.name, sup.email);
        }
        dir
    }

    pub fn with_acronym(mut self, doc_type: &str, acronym: impl Into<String>) -> Self {
        self.acronyms.insert(key(doc_type), acronym.into());
        self
    }

    pub fn with_folder(mut self, doc_type: &str, folder: impl Into<String>) -> Self {
        self.folders.insert(key(doc_type), folder.into());
        self
    }

    pub fn with_supervisor(
        mut self,
        department: &str,
        name: impl Into<String>,
        email: Option<String>,
    ) -> Self {
        self.supervisors.insert(
            key(department),
            Supervisor {
                name: name.into(),
                email,
            },
        );
        self
    }
}

fn key(s: &str) -> String {
    s.trim().to_lowercase()
}

impl ReferenceData for StaticDirectory {
    fn doc_type_acronym(&self, doc_type: &str) -> Option<String> {
        self.acronyms.get(&key(doc_type)).cloned()
    }

    fn doc_type_folder(&self, doc_type: &str) -> Option<String> {
        self.folders.get(&key(doc_type)).cloned()
    }

    fn department_supervisor(&self, department: &str) -> Option<Supervisor> {
        self.supervisors.get(&key(department)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DocTypeConfig, SupervisorConfig};

    #[test]
    fn builds_from_config() {
        let mut doc_types = HashMap::new();
        doc_types.insert(
            "Work Instruction".to_string(),
            DocTypeConfig {
                acronym: Some("WI".into()),
                folder: None,
            },
        );
        let mut supervisors = HashMap::new();
        supervisors.insert(
            "Quality".to_string(),
            SupervisorConfig {
                name: "Dana".into(),
                email: Some("dana@example.com".into()),
            },
        );
        let config = VaultConfig {
            doc_types: Some(doc_types),
            supervisors: Some(supervisors),
            ..Default::default()
        };

        let dir = StaticDirectory::from_config(&config);
        assert_eq!(dir.doc_type_acronym("work instruction").as_deref(), Some("WI"));
        assert_eq!(dir.doc_type_folder("Work Instruction"), None);
        assert_eq!(dir.department_supervisor("QUALITY").unwrap().name, "Dana");
        assert!(dir.department_supervisor("Sales").is_none());
    }
}
