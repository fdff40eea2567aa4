//! Decoding of Stays.net list responses.
//!
//! The external API is not consistent about how it wraps collections: the
//! same endpoint has been observed returning a bare array, an object keyed by
//! the entity name, or an object with a `data` array. Every call site decodes
//! through [`EntityList`] so the accepted shapes are listed in one place.

use rendizy_core::{SyncError, SyncResult};
use serde_json::Value;

/// A decoded list response, tagged with the shape it arrived in.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityList {
    /// `[...]`
    Bare(Vec<Value>),
    /// `{"<entity>": [...]}`
    Keyed(Vec<Value>),
    /// `{"data": [...]}`
    Wrapped(Vec<Value>),
    /// `null` or no payload at all.
    Empty,
}

impl EntityList {
    /// Decode `data` for an entity whose keyed form may use any of
    /// `entity_keys`. Shapes outside the documented three are an error.
    pub fn decode(data: Option<&Value>, entity_keys: &[&str]) -> SyncResult<Self> {
        match data {
            None | Some(Value::Null) => Ok(EntityList::Empty),
            Some(Value::Array(items)) => Ok(EntityList::Bare(items.clone())),
            Some(Value::Object(map)) => {
                for key in entity_keys {
                    if let Some(Value::Array(items)) = map.get(*key) {
                        return Ok(EntityList::Keyed(items.clone()));
                    }
                }
                match map.get("data") {
                    Some(Value::Array(items)) => Ok(EntityList::Wrapped(items.clone())),
                    _ => Err(SyncError::Mapping(format!(
                        "unexpected response shape: expected array, {{{}: [...]}} or {{data: [...]}}, got object with keys [{}]",
                        entity_keys.join("|"),
                        map.keys().cloned().collect::<Vec<_>>().join(", ")
                    ))),
                }
            }
            Some(other) => Err(SyncError::Mapping(format!(
                "unexpected response shape: {}",
                value_kind(other)
            ))),
        }
    }

    pub fn into_items(self) -> Vec<Value> {
        match self {
            EntityList::Bare(items) | EntityList::Keyed(items) | EntityList::Wrapped(items) => items,
            EntityList::Empty => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EntityList::Bare(items) | EntityList::Keyed(items) | EntityList::Wrapped(items) => {
                items.len()
            }
            EntityList::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items() -> Vec<Value> {
        vec![json!({"_id": "a"}), json!({"_id": "b"})]
    }

    #[test]
    fn test_three_shapes_yield_same_items() {
        let bare = json!([{"_id": "a"}, {"_id": "b"}]);
        let keyed = json!({"clients": [{"_id": "a"}, {"_id": "b"}]});
        let wrapped = json!({"data": [{"_id": "a"}, {"_id": "b"}], "total": 2});

        let bare = EntityList::decode(Some(&bare), &["clients"]).unwrap();
        let keyed = EntityList::decode(Some(&keyed), &["clients"]).unwrap();
        let wrapped = EntityList::decode(Some(&wrapped), &["clients"]).unwrap();

        assert!(matches!(bare, EntityList::Bare(_)));
        assert!(matches!(keyed, EntityList::Keyed(_)));
        assert!(matches!(wrapped, EntityList::Wrapped(_)));
        assert_eq!(bare.into_items(), items());
        assert_eq!(keyed.into_items(), items());
        assert_eq!(wrapped.into_items(), items());
    }

    #[test]
    fn test_entity_key_wins_over_data() {
        let value = json!({"listings": [{"_id": "x"}], "data": []});
        let list = EntityList::decode(Some(&value), &["listings"]).unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_null_is_empty() {
        let list = EntityList::decode(Some(&Value::Null), &["owners"]).unwrap();
        assert!(list.is_empty());
        assert_eq!(EntityList::decode(None, &["owners"]).unwrap(), EntityList::Empty);
    }

    #[test]
    fn test_unknown_shape_is_rejected() {
        let value = json!({"items": []});
        let err = EntityList::decode(Some(&value), &["owners"]).unwrap_err();
        assert!(err.to_string().contains("unexpected response shape"));

        let err = EntityList::decode(Some(&json!("oops")), &["owners"]).unwrap_err();
        assert!(err.to_string().contains("string"));
    }
}
