//! Problem and pattern dataset records.
//!
//! Datasets are opaque to the core: only `record_text` is ever interpreted,
//! and only by the record parser.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemRecord {
    pub id: String,
    pub title: String,
    /// The raw game-record text for this problem.
    pub record_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_label: Option<String>,
}
