//! Vendor directory
//!
//! Read-only lookup of vendor contact details, loaded once at startup from a
//! JSON file. Conversations reference vendors by numeric id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("failed to read vendor directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse vendor directory: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Contact details for one vendor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorProfile {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub company_name: String,
    pub email: String,
}

impl VendorProfile {
    /// Company name when known, otherwise the contact's full name
    pub fn display_name(&self) -> String {
        if !self.company_name.is_empty() {
            self.company_name.clone()
        } else if self.last_name.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.last_name)
        }
    }
}

/// In-memory directory backed by a JSON file of vendor profiles
#[derive(Debug, Clone, Default)]
pub struct JsonVendorDirectory {
    vendors: HashMap<i64, VendorProfile>,
}

impl JsonVendorDirectory {
    /// Load the directory from a JSON array of vendor profiles
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DirectoryError> {
        let raw = std::fs::read_to_string(path)?;
        let profiles: Vec<VendorProfile> = serde_json::from_str(&raw)?;
        Ok(Self {
            vendors: profiles.into_iter().map(|v| (v.id, v)).collect(),
        })
    }

    /// An empty directory, used when no vendor file is configured
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn get(&self, id: i64) -> Option<&VendorProfile> {
        self.vendors.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_profiles_from_json_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"id": 1, "name": "Ada", "last_name": "Lovelace",
                  "company_name": "Analytical Supplies", "email": "ada@example.com"}},
                {{"id": 2, "name": "Grace", "email": "grace@example.com"}}
            ]"#
        )
        .unwrap();

        let dir = JsonVendorDirectory::load(file.path()).unwrap();
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.get(1).unwrap().display_name(), "Analytical Supplies");
        // Missing fields default to empty
        assert_eq!(dir.get(2).unwrap().display_name(), "Grace");
        assert!(dir.get(3).is_none());
    }

    #[test]
    fn rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(matches!(
            JsonVendorDirectory::load(file.path()),
            Err(DirectoryError::Parse(_))
        ));
    }

    #[test]
    fn display_name_falls_back_to_full_name() {
        let vendor = VendorProfile {
            id: 7,
            name: "Edsger".to_string(),
            last_name: "Dijkstra".to_string(),
            company_name: String::new(),
            email: "ewd@example.com".to_string(),
        };
        assert_eq!(vendor.display_name(), "Edsger Dijkstra");
    }
}
