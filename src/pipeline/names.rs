//! Country-name resolution.
//!
//! Classification, conflict and monthly-detail sources are keyed on free-text
//! country names. Every name is routed through one resolver so that spelling
//! divergences are fixed by an explicit alias table, never by fuzzy matching.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct CountryNames {
    aliases: BTreeMap<String, String>,
}

impl CountryNames {
    pub fn new(aliases: &BTreeMap<String, String>) -> Self {
        Self {
            aliases: aliases
                .iter()
                .map(|(from, to)| (from.trim().to_string(), to.trim().to_string()))
                .collect(),
        }
    }

    /// The canonical spelling of a source name.
    pub fn canonical(&self, name: &str) -> String {
        let name = name.trim();
        self.aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}
