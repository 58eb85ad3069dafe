use serde::{Deserialize, Serialize};

/// A single hit returned by the search collaborator.
///
/// Providers may omit any field; missing values render as placeholders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SearchRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

impl SearchRecord {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            snippet: snippet.into(),
        }
    }

    pub fn title_or_placeholder(&self) -> &str {
        non_empty_or(&self.title, "No title")
    }

    pub fn link_or_placeholder(&self) -> &str {
        non_empty_or(&self.link, "No link")
    }

    pub fn snippet_or_placeholder(&self) -> &str {
        non_empty_or(&self.snippet, "No snippet")
    }
}

fn non_empty_or<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}

/// Per-expert search record stored under `<expert>_search`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SearchEntry {
    Completed {
        queries: Vec<String>,
        results: Vec<SearchRecord>,
    },
    Failed {
        error: String,
    },
}

impl SearchEntry {
    pub fn queries(&self) -> &[String] {
        match self {
            SearchEntry::Completed { queries, .. } => queries,
            SearchEntry::Failed { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            SearchEntry::Completed { .. } => None,
            SearchEntry::Failed { error } => Some(error),
        }
    }
}

/// State key under which an expert's search entry is stored.
pub fn search_key(expert_name: &str) -> String {
    format!("{expert_name}_search")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_default_to_empty() {
        let record: SearchRecord = serde_json::from_str(r#"{"title": "VN-Index"}"#).unwrap();
        assert_eq!(record.title, "VN-Index");
        assert_eq!(record.link_or_placeholder(), "No link");
        assert_eq!(record.snippet_or_placeholder(), "No snippet");
    }

    #[test]
    fn entry_serializes_untagged() {
        let ok = SearchEntry::Completed {
            queries: vec!["vietnam bank credit growth".to_string()],
            results: vec![],
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert!(json.get("queries").is_some());
        assert!(json.get("results").is_some());

        let failed = SearchEntry::Failed {
            error: "rate limited".to_string(),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json, serde_json::json!({"error": "rate limited"}));
    }

    #[test]
    fn entry_deserializes_either_shape() {
        let failed: SearchEntry = serde_json::from_str(r#"{"error": "boom"}"#).unwrap();
        assert_eq!(failed.error(), Some("boom"));
        assert!(failed.queries().is_empty());

        let ok: SearchEntry =
            serde_json::from_str(r#"{"queries": ["q1"], "results": [{"title": "t"}]}"#).unwrap();
        assert_eq!(ok.queries(), ["q1".to_string()]);
    }

    #[test]
    fn search_key_appends_suffix() {
        assert_eq!(search_key("valuation_expert"), "valuation_expert_search");
    }
}
