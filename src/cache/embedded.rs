//! Locating company copies inside cached payloads.
//!
//! A company is embedded wherever an object sits under a `company` field, as
//! an element of a `companies` array, or as the whole payload of a
//! [`QueryKind::Company`] entry. Each copy is addressed by a JSON pointer
//! (RFC 6901) so it can be rewritten without knowing the payload's type.

use serde_json::{Map, Value};
use uuid::Uuid;

use super::key::QueryKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedRef {
    pub company_id: Uuid,
    pub pointer: String,
}

pub fn scan(kind: QueryKind, payload: &Value) -> Vec<EmbeddedRef> {
    let mut refs = Vec::new();
    if kind == QueryKind::Company {
        if let Some(company_id) = object_id(payload) {
            refs.push(EmbeddedRef {
                company_id,
                pointer: String::new(),
            });
        }
        return refs;
    }
    walk(payload, &mut String::new(), &mut refs);
    refs
}

fn walk(value: &Value, pointer: &mut String, refs: &mut Vec<EmbeddedRef>) {
    match value {
        Value::Object(map) => {
            for (field, child) in map {
                let len = pointer.len();
                pointer.push('/');
                pointer.push_str(&escape(field));

                match (field.as_str(), child) {
                    ("company", Value::Object(_)) => push_ref(child, pointer, refs),
                    ("companies", Value::Array(items)) => {
                        for (index, item) in items.iter().enumerate() {
                            let len = pointer.len();
                            pointer.push('/');
                            pointer.push_str(&index.to_string());
                            push_ref(item, pointer, refs);
                            pointer.truncate(len);
                        }
                    }
                    _ => walk(child, pointer, refs),
                }

                pointer.truncate(len);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                let len = pointer.len();
                pointer.push('/');
                pointer.push_str(&index.to_string());
                walk(item, pointer, refs);
                pointer.truncate(len);
            }
        }
        _ => {}
    }
}

fn push_ref(value: &Value, pointer: &str, refs: &mut Vec<EmbeddedRef>) {
    if let Some(company_id) = object_id(value) {
        refs.push(EmbeddedRef {
            company_id,
            pointer: pointer.to_string(),
        });
    }
}

fn object_id(value: &Value) -> Option<Uuid> {
    value
        .as_object()?
        .get("id")?
        .as_str()
        .and_then(|id| Uuid::parse_str(id).ok())
}

fn escape(field: &str) -> String {
    field.replace('~', "~0").replace('/', "~1")
}

/// Shallow-merge `fields` over the object at `pointer`. Returns whether
/// anything changed.
pub fn merge_at(payload: &mut Value, pointer: &str, fields: &Map<String, Value>) -> bool {
    let Some(Value::Object(target)) = payload.pointer_mut(pointer) else {
        return false;
    };

    let mut changed = false;
    for (field, value) in fields {
        if target.get(field) != Some(value) {
            target.insert(field.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

/// Replace the object at `pointer` wholesale. Returns whether anything changed.
pub fn replace_at(payload: &mut Value, pointer: &str, replacement: &Value) -> bool {
    match payload.pointer_mut(pointer) {
        Some(target) if target != replacement => {
            *target = replacement.clone();
            true
        }
        _ => false,
    }
}
