use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const BID_HEAD_KEY: &str = "bidHead";
pub const BID_ACCOUNT_KEY: &str = "bidAcct";

/// Deal document as served by the deal backend. The structure belongs to
/// the backend; only the bid header and bid account sections are read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DealRecord(pub Value);

impl DealRecord {
    pub fn bid_head(&self) -> Option<&Map<String, Value>> {
        self.0.get(BID_HEAD_KEY).and_then(first_object)
    }

    /// `bidAcct` is an object in most documents; when it is a list the
    /// first account is used.
    pub fn bid_account(&self) -> Option<&Map<String, Value>> {
        self.0.get(BID_ACCOUNT_KEY).and_then(first_object)
    }

    pub fn header_fields(&self) -> Vec<(String, String)> {
        self.bid_head().map(scalar_fields).unwrap_or_default()
    }

    pub fn account_fields(&self) -> Vec<(String, String)> {
        self.bid_account().map(scalar_fields).unwrap_or_default()
    }

    pub fn has_bid_sections(&self) -> bool {
        self.bid_head().is_some() || self.bid_account().is_some()
    }
}

fn first_object(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::Array(items) => items.iter().find_map(Value::as_object),
        _ => None,
    }
}

/// Scalar entries of a section in document order. Nested objects and
/// arrays are skipped, as are nulls and blank strings.
fn scalar_fields(section: &Map<String, Value>) -> Vec<(String, String)> {
    section
        .iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                Value::String(text) if !text.trim().is_empty() => text.trim().to_string(),
                Value::Number(number) => number.to_string(),
                Value::Bool(flag) => flag.to_string(),
                _ => return None,
            };
            Some((key.clone(), rendered))
        })
        .collect()
}
