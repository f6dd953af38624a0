use crate::model::codes::{ProgressStatus, ProgressType};
use crate::model::timestamp::{iso8601, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Progress snapshot for one remote task, as posted back by a worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressInfo {
    pub id: String,
    pub category: String,
    pub moniker: String,
    pub ptype: ProgressType,
    /// Range bounds as the worker sent them, string or number.
    pub range_min: Value,
    pub range_max: Value,
    /// String-encoded numeric or ordinal position within the range.
    pub position: String,
    pub status: ProgressStatus,
    #[serde(with = "iso8601")]
    pub when: Timestamp,
    /// Free-form worker payload. Encoded as `{}` when absent.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Map<String, Value>,
}

impl ProgressInfo {
    /// Decode a postback body.
    pub fn from_json_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}
