//! Label scheme and selectors
//!
//! Units are owned by the Function whose labels they carry. The same label
//! set is stamped onto new units and used as the list selector, so the two
//! must always come from [`labels_for_function`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Application marker label key
pub const APP_LABEL: &str = "app";

/// Application marker label value
pub const APP_LABEL_VALUE: &str = "function";

/// Label key carrying the owning Function's name
pub const FUNCTION_LABEL: &str = "function";

/// Labels stamped onto every unit of the named Function
pub fn labels_for_function(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (APP_LABEL.to_string(), APP_LABEL_VALUE.to_string()),
        (FUNCTION_LABEL.to_string(), name.to_string()),
    ])
}

/// Equality-based label selector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    pub fn new(match_labels: BTreeMap<String, String>) -> Self {
        Self { match_labels }
    }

    /// Selector matching every unit of the named Function
    pub fn for_function(name: &str) -> Self {
        Self::new(labels_for_function(name))
    }

    /// True when every selector label is present with the same value
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
    }
}

/// Canonical string form: `key=value` pairs sorted by key, comma-joined
impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.match_labels {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}={}", key, value)?;
            first = false;
        }
        Ok(())
    }
}
