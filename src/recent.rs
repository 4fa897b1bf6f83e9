//! Recently entered free-text values, per field, for autofill suggestions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::recent;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentValues {
    fields: BTreeMap<String, Vec<String>>,
}

impl RecentValues {
    /// Record `value` for `field`, most recent first. Returns whether the
    /// list changed. Blank values and fields outside [`recent::ALL`] are
    /// ignored; a repeated value is moved to the front.
    pub fn remember(&mut self, field: &str, value: &str, limit: usize) -> bool {
        let value = value.trim();
        if value.is_empty() || !recent::ALL.contains(&field) {
            return false;
        }
        let entries = self.fields.entry(field.to_string()).or_default();
        if entries.first().map(String::as_str) == Some(value) {
            return false;
        }
        entries.retain(|v| v != value);
        entries.insert(0, value.to_string());
        entries.truncate(limit);
        true
    }

    pub fn suggestions(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}
