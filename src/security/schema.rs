//! Named request-body schemas.
//!
//! Backs the `schema` admission predicate: a handler names a schema, the
//! registry checks the request body against it. Unknown schema names fail
//! closed.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

/// Expected JSON type of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Bool,
    Object,
    Array,
    Any,
}

impl FieldType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
            FieldType::Any => true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    ty: FieldType,
    required: bool,
}

/// One schema: per-field type expectations, some fields required.
/// Extra body keys are allowed here; `accepted-fields` exists to forbid
/// them.
#[derive(Debug, Clone, Default)]
pub struct SchemaDef {
    fields: BTreeMap<String, FieldSpec>,
}

impl SchemaDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.insert(name.into(), FieldSpec { ty, required: false });
        self
    }

    pub fn required(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.insert(name.into(), FieldSpec { ty, required: true });
        self
    }

    pub fn check(&self, body: Option<&Map<String, Value>>) -> bool {
        let empty = Map::new();
        let body = body.unwrap_or(&empty);
        self.fields.iter().all(|(name, spec)| match body.get(name) {
            Some(value) => spec.ty.matches(value),
            None => !spec.required,
        })
    }
}

/// App-level registry of named schemas. Populated at boot, read-only while
/// serving.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, SchemaDef>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, schema: SchemaDef) {
        self.schemas.insert(name.into(), schema);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Validate `body` against the named schema. An unregistered name never
    /// validates.
    pub fn validate(&self, name: &str, body: Option<&Map<String, Value>>) -> bool {
        self.schemas
            .get(name)
            .map(|schema| schema.check(body))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn required_and_typed_fields() {
        let mut registry = SchemaRegistry::new();
        registry.register(
            "signup",
            SchemaDef::new()
                .required("name", FieldType::String)
                .required("age", FieldType::Number)
                .field("admin", FieldType::Bool),
        );

        assert!(registry.validate("signup", Some(&body(json!({"name": "a", "age": 3})))));
        assert!(!registry.validate("signup", Some(&body(json!({"name": "a"})))));
        assert!(!registry.validate("signup", Some(&body(json!({"name": "a", "age": "3"})))));
        // Optional field, wrong type.
        assert!(!registry.validate(
            "signup",
            Some(&body(json!({"name": "a", "age": 3, "admin": "yes"})))
        ));
        // Extra keys pass; accepted-fields polices those.
        assert!(registry.validate(
            "signup",
            Some(&body(json!({"name": "a", "age": 3, "extra": 1})))
        ));
    }

    #[test]
    fn unknown_schema_fails_closed() {
        let registry = SchemaRegistry::new();
        assert!(!registry.validate("missing", None));
    }
}
