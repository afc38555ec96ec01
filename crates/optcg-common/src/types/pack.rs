//! Packs (card sets) and their display titles

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static LABEL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\]").expect("label pattern is valid"));

#[allow(clippy::expect_used)]
static PREFIX_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)-.*?-").expect("prefix pattern is valid"));

#[allow(clippy::expect_used)]
static ESCAPED_TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&lt;.*?&gt;").expect("escaped tag pattern is valid"));

/// Decomposed pack title.
///
/// `"BOOSTER PACK -ROMANCE DAWN- [OP-01]"` becomes prefix `BOOSTER PACK`,
/// title `ROMANCE DAWN`, label `OP-01`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleParts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A pack discovered on the card list index page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pack {
    /// Source-assigned series identifier (e.g., "569101")
    pub id: String,

    /// Title as shown in the series selector
    pub raw_title: String,

    pub title_parts: TitleParts,
}

impl Pack {
    /// Build a pack, decomposing its raw title
    pub fn from_raw_title(id: impl Into<String>, raw_title: impl Into<String>) -> Self {
        let raw_title = raw_title.into();
        let title_parts = process_title_parts(&raw_title);
        Self {
            id: id.into(),
            raw_title,
            title_parts,
        }
    }

    /// Title used in file names and log lines, falling back to the raw title
    pub fn display_title(&self) -> &str {
        if self.title_parts.title.is_empty() {
            &self.raw_title
        } else {
            &self.title_parts.title
        }
    }
}

/// Split a raw pack title into prefix, title and bracketed label
pub fn process_title_parts(raw_title: &str) -> TitleParts {
    let mut processed = raw_title.to_string();

    let label = LABEL_PATTERN
        .captures(raw_title)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|l| !l.is_empty());

    if let Some(ref label) = label {
        processed = processed
            .replacen(&format!("[{}]", label), "", 1)
            .trim()
            .to_string();
    }

    let prefix = PREFIX_PATTERN
        .captures(raw_title)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|p| !p.is_empty());

    if let Some(ref prefix) = prefix {
        processed = processed.replacen(prefix.as_str(), "", 1);
    }

    let mut title = processed.as_str();
    if let Some(rest) = title.strip_prefix('-') {
        title = rest;
    }
    if let Some(rest) = title.strip_suffix('-') {
        title = rest;
    }

    TitleParts {
        prefix: prefix
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        title: title.trim().to_string(),
        label,
    }
}

/// Remove escaped markup runs (`&lt;br&gt;`) from an option's inner HTML
pub fn flatten_title(inner_html: &str) -> String {
    ESCAPED_TAG_PATTERN.replace_all(inner_html, "").into_owned()
}
