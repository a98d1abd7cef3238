//! Turns a sales backend answer into customer matches.

use std::collections::HashSet;
use std::sync::LazyLock;

use dealdesk_core::{CustomerId, CustomerMatch};
use regex::Regex;
use serde_json::{Map, Value};

const LIST_KEYS: &[&str] = &["customers", "matches", "data", "results"];
const ID_KEYS: &[&str] = &["id", "customer_id", "Customer_ID"];
const NAME_KEYS: &[&str] = &["company_name", "Company_Name", "name"];

static ID_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)customer[_ ]?id\**(?:\s+for\s+([^\n:=*]+?))?\s*(?:\bis\b\s*|[:=]\s*)\**\s*(\d+)",
    )
    .expect("id marker regex")
});

static COMPANY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)company(?:[_ ]?name)?\**\s*[:=]\s*\**\s*([^\n|,;*]+)")
        .expect("company marker regex")
});

/// Every customer the payload names, de-duplicated by id in first-seen order.
///
/// Structured payloads (an array of customer objects, bare or under a list
/// key) are preferred; otherwise the `response` text is scanned for
/// `Customer ID: <n>` markers, each paired with the next `Company: <name>`.
/// Prose such as `The Customer ID for Acme is 7` is read the same way.
pub fn parse_customer_matches(payload: &Value) -> Vec<CustomerMatch> {
    let found: Vec<CustomerMatch> = match structured_entries(payload) {
        Some(entries) => {
            entries.iter().filter_map(Value::as_object).filter_map(from_object).collect()
        }
        None => payload
            .get("response")
            .and_then(Value::as_str)
            .map(from_text)
            .unwrap_or_default(),
    };

    let mut seen = HashSet::new();
    found.into_iter().filter(|found| seen.insert(found.id)).collect()
}

fn structured_entries(payload: &Value) -> Option<Vec<Value>> {
    match payload {
        Value::Array(entries) => Some(entries.clone()),
        Value::Object(object) => {
            if let Some(entries) = LIST_KEYS.iter().find_map(|key| object.get(*key)?.as_array()) {
                return Some(entries.clone());
            }
            if let Some(entries) = object.get("response").and_then(Value::as_array) {
                return Some(entries.clone());
            }
            from_object(object).is_some().then(|| vec![payload.clone()])
        }
        _ => None,
    }
}

fn from_object(object: &Map<String, Value>) -> Option<CustomerMatch> {
    let raw = ID_KEYS.iter().find_map(|key| match object.get(*key)? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    })?;
    let id = CustomerId::new(raw).ok()?;
    let company_name = NAME_KEYS
        .iter()
        .find_map(|key| object.get(*key)?.as_str())
        .map(|name| name.trim().to_string())
        .unwrap_or_default();

    Some(CustomerMatch { id, company_name })
}

fn from_text(text: &str) -> Vec<CustomerMatch> {
    let markers: Vec<_> = ID_MARKER.captures_iter(text).collect();

    markers
        .iter()
        .enumerate()
        .filter_map(|(index, captures)| {
            let whole = captures.get(0)?;
            let raw: i64 = captures.get(2)?.as_str().parse().ok()?;
            let id = CustomerId::new(raw).ok()?;

            let segment_end = markers
                .get(index + 1)
                .and_then(|next| next.get(0))
                .map_or(text.len(), |next| next.start());
            let segment = &text[whole.end()..segment_end];
            let company_name = COMPANY_MARKER
                .captures(segment)
                .and_then(|company| company.get(1))
                .or_else(|| captures.get(1))
                .map(|name| name.as_str().trim().trim_end_matches('.').trim_matches('"'))
                .unwrap_or_default()
                .to_string();

            Some(CustomerMatch { id, company_name })
        })
        .collect()
}
