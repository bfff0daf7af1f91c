//! Production-readiness checklist with persisted check marks.
//!
//! The checklist itself is plain text: lines containing `☑` are items, other
//! non-blank lines start a new section. Which items are ticked is kept in a
//! small JSON object mapping item names to booleans.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{error::Result, note_store::replace_file};

const ITEM_MARKER: char = '☑';

pub const PRODUCTION_READINESS: &str = "
Common Checklist
☑ Clean Code
☑ Documentation
☑ Architecture
☑ Testing
☑ Error Handling
☑ Logging
☑ Validation
☑ DevOps
☑ Application Monitoring
☑ Support Channels

Common (Optional)
☑ Feature Flags
☑ Profiling
☑ Mapping

Server Checklist
☑ Configuration
☑ Data Storage
☑ Data Seeding
☑ Querying
☑ Analytics
☑ Abuse

Server (Optional)
☑ Email
☑ Identity
☑ Exporting
☑ File Storage
☑ Background Services
☑ Real Time Communication
☑ Audit Trails

Client Checklist
☑ Localization
☑ Application Icons
☑ Service Access
☑ Responsive Interface
☑ Accessibility
☑ Forms
☑ Regulations
☑ Shell Integration
☑ Web Support

Client (Optional)
☑ Offline
☑ Data Virtualization
☑ Themes
☑ Printing
☑ SPA Support
☑ Third-Party Clients
";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub title: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checklist {
    sections: Vec<Section>,
}

impl Checklist {
    /// Parse a checklist definition.
    ///
    /// The word "Checklist" is dropped from section titles, so
    /// "Server Checklist" becomes "Server". Items that appear before any
    /// section land in an untitled one.
    pub fn parse(text: &str) -> Self {
        let mut sections: Vec<Section> = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if line.contains(ITEM_MARKER) {
                let item = line.replace(ITEM_MARKER, "").trim().to_string();
                if item.is_empty() {
                    continue;
                }
                if sections.is_empty() {
                    sections.push(Section {
                        title: String::new(),
                        items: Vec::new(),
                    });
                }
                if let Some(section) = sections.last_mut() {
                    section.items.push(item);
                }
            } else {
                sections.push(Section {
                    title: line.replace("Checklist", "").trim().to_string(),
                    items: Vec::new(),
                });
            }
        }

        Self { sections }
    }

    pub fn production_readiness() -> Self {
        Self::parse(PRODUCTION_READINESS)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.sections
            .iter()
            .flat_map(|s| s.items.iter().map(String::as_str))
    }

    /// Find an item by name, ignoring case and surrounding whitespace.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let wanted = name.trim();
        self.items().find(|item| item.eq_ignore_ascii_case(wanted))
    }
}

/// Check marks for checklist items, persisted as `{"item": true}`.
#[derive(Debug, Clone)]
pub struct ChecklistStatus {
    path: PathBuf,
    checked: BTreeMap<String, bool>,
}

impl ChecklistStatus {
    /// Load check marks from `path`. A missing or malformed file means
    /// nothing is checked yet.
    pub fn load(path: &Path) -> Self {
        let checked = std::fs::read_to_string(path)
            .ok()
            .and_then(|raw| {
                serde_json::from_str::<BTreeMap<String, bool>>(&raw)
                    .inspect_err(|e| {
                        tracing::debug!(path = %path.display(), error = %e, "ignoring malformed checklist status");
                    })
                    .ok()
            })
            .unwrap_or_default()
            .into_iter()
            .map(|(item, done)| (item.trim().to_string(), done))
            .collect();

        Self {
            path: path.to_path_buf(),
            checked,
        }
    }

    pub fn is_checked(&self, item: &str) -> bool {
        self.checked.get(item).copied().unwrap_or(false)
    }

    pub fn set(&mut self, item: &str, checked: bool) {
        self.checked.insert(item.to_string(), checked);
    }

    pub fn checked_count(&self, checklist: &Checklist) -> usize {
        checklist.items().filter(|i| self.is_checked(i)).count()
    }

    /// Persist the marks. The file is replaced through a rename, so a
    /// crash mid-write leaves the previous marks intact.
    pub fn save(&self) -> Result<()> {
        replace_file(&self.path, &serde_json::to_vec(&self.checked)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_and_items() {
        let list = Checklist::parse(
            "\nServer Checklist\n☑ Email\n☑ Identity\n\nClient (Optional)\n☑ Themes\n",
        );

        let sections = list.sections();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "Server");
        assert_eq!(sections[0].items, vec!["Email", "Identity"]);
        assert_eq!(sections[1].title, "Client (Optional)");
        assert_eq!(sections[1].items, vec!["Themes"]);
    }

    #[test]
    fn items_before_any_heading_get_untitled_section() {
        let list = Checklist::parse("☑ Loose\nLater\n☑ Tight");
        assert_eq!(list.sections()[0].title, "");
        assert_eq!(list.sections()[0].items, vec!["Loose"]);
        assert_eq!(list.items().collect::<Vec<_>>(), vec!["Loose", "Tight"]);
    }

    #[test]
    fn production_readiness_has_all_groups() {
        let list = Checklist::production_readiness();
        assert_eq!(list.sections().len(), 6);
        assert_eq!(list.items().count(), 41);
        assert_eq!(list.sections()[0].title, "Common");
        assert_eq!(list.resolve("clean code"), Some("Clean Code"));
        assert_eq!(list.resolve("  Third-Party Clients "), Some("Third-Party Clients"));
        assert_eq!(list.resolve("Quantum Readiness"), None);
    }

    #[test]
    fn missing_status_file_means_unchecked() {
        let tmp = tempfile::tempdir().unwrap();
        let status = ChecklistStatus::load(&tmp.path().join("checklist.json"));
        assert!(!status.is_checked("Logging"));
    }

    #[test]
    fn status_roundtrips_through_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("checklist.json");

        let mut status = ChecklistStatus::load(&path);
        status.set("Logging", true);
        status.set("Testing", false);
        status.save().unwrap();

        let reloaded = ChecklistStatus::load(&path);
        assert!(reloaded.is_checked("Logging"));
        assert!(!reloaded.is_checked("Testing"));

        let list = Checklist::production_readiness();
        assert_eq!(reloaded.checked_count(&list), 1);
    }

    #[test]
    fn legacy_keys_with_padding_are_trimmed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("checklist.json");
        std::fs::write(&path, r#"{" Clean Code": true, " Logging": false}"#)
            .unwrap();

        let status = ChecklistStatus::load(&path);
        assert!(status.is_checked("Clean Code"));
        assert!(!status.is_checked("Logging"));
    }

    #[test]
    fn malformed_status_file_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("checklist.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let status = ChecklistStatus::load(&path);
        assert!(!status.is_checked("Clean Code"));
    }

    #[test]
    fn save_replaces_file_without_leftovers() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("checklist.json");

        let mut status = ChecklistStatus::load(&path);
        status.set("Logging", true);
        status.save().unwrap();
        status.set("Logging", false);
        status.set("Testing", true);
        status.save().unwrap();

        let reloaded = ChecklistStatus::load(&path);
        assert!(!reloaded.is_checked("Logging"));
        assert!(reloaded.is_checked("Testing"));
        assert!(!tmp.path().join("nested").join("checklist.json.tmp").exists());
    }
}
