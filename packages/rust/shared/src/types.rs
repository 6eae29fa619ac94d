//! Core domain types for BudgetLens.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BudgetLensError, Result};

/// Score written when the relevance classifier fails or answers out of range.
pub const UNKNOWN_SCORE: u8 = 0;

/// Funding-source code written when the classifier fails or picks no candidate.
pub const UNKNOWN_FUNDING_SOURCE: &str = "unknown";

/// Lowest and highest valid relevance score.
pub const SCORE_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// One candidate budget line extracted from a source document.
///
/// Every field except `name` is optional so that partial records are valid at
/// every stage before the corresponding enrichment runs. Field names follow the
/// client schema; the legacy names `sub_kind_item`, `source` and `parent` are
/// accepted on input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Stable identifier assigned at extraction time (UUID v7).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Extracted text.
    #[serde(default)]
    pub name: String,
    /// Slash-delimited ancestor chain, e.g. `/2/6/1/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_path: Option<String>,
    /// Relevance label in `[1, 10]`, or [`UNKNOWN_SCORE`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    /// Budget classification codes. An empty set is the failure sentinel.
    #[serde(
        default,
        alias = "sub_kind_item",
        skip_serializing_if = "Option::is_none"
    )]
    pub category_codes: Option<Vec<String>>,
    /// Funding-source code, or [`UNKNOWN_FUNDING_SOURCE`].
    #[serde(default, alias = "source", skip_serializing_if = "Option::is_none")]
    pub funding_source: Option<String>,
    /// Name of the parent item in the same batch; empty when none was found.
    #[serde(default, alias = "parent", skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
}

impl Item {
    /// Create a freshly extracted item with a new time-sortable id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Some(Uuid::now_v7().to_string()),
            name: name.into(),
            order_path: None,
            score: None,
            category_codes: None,
            funding_source: None,
            parent_name: None,
        }
    }

    /// Identity used by the session merge: `id` when present, else `name`.
    ///
    /// Returns `None` for records carrying neither.
    pub fn identity_key(&self) -> Option<&str> {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => Some(id),
            _ if !self.name.is_empty() => Some(self.name.as_str()),
            _ => None,
        }
    }

    /// Score with a missing value read as [`UNKNOWN_SCORE`].
    pub fn score_or_unknown(&self) -> u8 {
        self.score.unwrap_or(UNKNOWN_SCORE)
    }
}

/// Parse a client-submitted item payload.
///
/// Accepts a bare JSON array or an object with a `tasks` array. `null` and a
/// missing `tasks` key both mean "no items". Any other shape is rejected so
/// that callers fail before touching the session store.
pub fn parse_item_list(value: serde_json::Value) -> Result<Vec<Item>> {
    let list = match value {
        serde_json::Value::Null => return Ok(Vec::new()),
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(mut map) => match map.remove("tasks") {
            None | Some(serde_json::Value::Null) => return Ok(Vec::new()),
            Some(tasks @ serde_json::Value::Array(_)) => tasks,
            Some(_) => {
                return Err(BudgetLensError::validation("`tasks` must be a list"));
            }
        },
        _ => return Err(BudgetLensError::validation("item payload must be a list")),
    };

    serde_json::from_value(list)
        .map_err(|e| BudgetLensError::validation(format!("malformed item: {e}")))
}

// ---------------------------------------------------------------------------
// SourceFormat
// ---------------------------------------------------------------------------

/// Declared format of an uploaded source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// `.xlsx` / `.xls` workbooks; every sheet is one grid.
    Spreadsheet,
    /// `.pdf`; every detected table region is one grid.
    TableDocument,
    /// `.png` / `.jpg` / `.jpeg`; OCR'd into a single synthetic grid.
    Image,
}

impl SourceFormat {
    /// Map a file name to its format by extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "xlsx" | "xls" => Some(Self::Spreadsheet),
            "pdf" => Some(Self::TableDocument),
            "png" | "jpg" | "jpeg" => Some(Self::Image),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spreadsheet => "spreadsheet",
            Self::TableDocument => "table_document",
            Self::Image => "image",
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
