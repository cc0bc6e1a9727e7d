//! Typed, validated construction of simulator objects against an externally
//! supplied schema.
//!
//! The schema is an opaque JSON document. Class definitions are discovered
//! anywhere inside it as objects carrying a string `"class"` member; every
//! sibling member that is itself an object with a `"type"` member is a field
//! definition:
//!
//! ```json
//! { "MaleCircumcision": {
//!     "class": "MaleCircumcision",
//!     "Circumcision_Reduced_Acquire": { "type": "float", "min": 0, "max": 1, "default": 0.6 },
//!     "Distributed_Event_Trigger": { "type": "string", "default": "" } } }
//! ```
//!
//! A field without a `"default"` is required.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::AuthoringError;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Bool,
    Integer,
    Float,
    String,
    Enum(Vec<String>),
    Vector,
    Object,
    Any,
}

impl FieldType {
    fn from_schema(type_name: &str, definition: &Map<String, Value>) -> Self {
        let lower = type_name.to_ascii_lowercase();
        match lower.as_str() {
            "bool" | "boolean" => FieldType::Bool,
            "integer" | "int" | "uint32_t" | "uint64_t" | "int32_t" => FieldType::Integer,
            "float" | "double" => FieldType::Float,
            "string" | "constrained string" | "jsonconfigurable::constrainedstring" => {
                FieldType::String
            }
            "enum" => {
                let values = definition
                    .get("enum")
                    .or_else(|| definition.get("possible_values"))
                    .and_then(Value::as_array)
                    .map(|values| {
                        values
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                FieldType::Enum(values)
            }
            "object" => FieldType::Object,
            _ if lower.starts_with("vector") => FieldType::Vector,
            // idmType:* members are nested objects or arrays depending on the type.
            _ => FieldType::Any,
        }
    }

    fn describe(&self) -> String {
        match self {
            FieldType::Bool => "a boolean".to_string(),
            FieldType::Integer => "an integer".to_string(),
            FieldType::Float => "a number".to_string(),
            FieldType::String => "a string".to_string(),
            FieldType::Enum(values) => format!("one of {values:?}"),
            FieldType::Vector => "an array".to_string(),
            FieldType::Object => "an object".to_string(),
            FieldType::Any => "any value".to_string(),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            // The simulator reads 0/1 as booleans.
            FieldType::Bool => {
                value.is_boolean() || matches!(value.as_u64(), Some(0 | 1))
            }
            FieldType::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|v| v.fract() == 0.0)
            }
            FieldType::Float => value.is_number(),
            FieldType::String => value.is_string(),
            FieldType::Enum(values) => value
                .as_str()
                .is_some_and(|v| values.is_empty() || values.iter().any(|p| p == v)),
            FieldType::Vector => value.is_array(),
            FieldType::Object => value.is_object(),
            FieldType::Any => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub field_type: FieldType,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub default: Option<Value>,
}

impl FieldDef {
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    fn check(&self, class: &str, field: &str, value: &Value) -> Result<(), AuthoringError> {
        if !self.field_type.accepts(value) {
            return Err(AuthoringError::Type {
                class: class.to_string(),
                field: field.to_string(),
                expected: self.field_type.describe(),
                value: value.to_string(),
            });
        }
        let numbers: Vec<f64> = match value {
            Value::Number(n) => n.as_f64().into_iter().collect(),
            Value::Array(items) => items.iter().filter_map(Value::as_f64).collect(),
            _ => Vec::new(),
        };
        let min = self.min.unwrap_or(f64::MIN);
        let max = self.max.unwrap_or(f64::MAX);
        for number in numbers {
            if number < min || number > max {
                return Err(AuthoringError::range(
                    format!("{class}.{field}"),
                    number,
                    min,
                    max,
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub fields: IndexMap<String, FieldDef>,
}

impl ClassDef {
    fn field(&self, field: &str) -> Result<&FieldDef, AuthoringError> {
        self.fields
            .get(field)
            .ok_or_else(|| AuthoringError::FieldUnknown {
                class: self.name.clone(),
                field: field.to_string(),
            })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    classes: IndexMap<String, ClassDef>,
}

impl Schema {
    /// Loads a schema document from `path`.
    ///
    /// # Errors
    /// - If the file cannot be opened or is not JSON
    /// - If the document declares no classes
    pub fn from_file(path: &Path) -> Result<Self, AuthoringError> {
        let reader = BufReader::new(File::open(path)?);
        let document: Value = serde_json::from_reader(reader)?;
        Self::from_value(&document)
    }

    /// # Errors
    /// If the document declares no classes.
    pub fn from_value(document: &Value) -> Result<Self, AuthoringError> {
        let mut schema = Schema::default();
        schema.collect_classes(document);
        if schema.classes.is_empty() {
            return Err(AuthoringError::Schema(
                "schema document does not declare any class".to_string(),
            ));
        }
        log::debug!("loaded schema with {} classes", schema.classes.len());
        Ok(schema)
    }

    fn collect_classes(&mut self, node: &Value) {
        match node {
            Value::Object(object) => {
                if let Some(Value::String(class_name)) = object.get("class") {
                    let fields: IndexMap<String, FieldDef> = object
                        .iter()
                        .filter_map(|(key, value)| {
                            let definition = value.as_object()?;
                            let type_name = definition.get("type")?.as_str()?;
                            Some((
                                key.clone(),
                                FieldDef {
                                    field_type: FieldType::from_schema(type_name, definition),
                                    min: definition.get("min").and_then(Value::as_f64),
                                    max: definition.get("max").and_then(Value::as_f64),
                                    default: definition.get("default").cloned(),
                                },
                            ))
                        })
                        .collect();
                    self.classes
                        .entry(class_name.clone())
                        .or_insert_with(|| ClassDef {
                            name: class_name.clone(),
                            fields: IndexMap::new(),
                        })
                        .fields
                        .extend(fields);
                }
                for value in object.values() {
                    self.collect_classes(value);
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.collect_classes(item);
                }
            }
            _ => {}
        }
    }

    #[must_use]
    pub fn has_class(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }

    /// # Errors
    /// [`AuthoringError::Schema`] if the class is unknown.
    pub fn class(&self, class_name: &str) -> Result<&ClassDef, AuthoringError> {
        self.classes
            .get(class_name)
            .ok_or_else(|| AuthoringError::Schema(format!("unknown class '{class_name}'")))
    }

    /// Obtains a blank builder for `class_name`.
    ///
    /// # Errors
    /// [`AuthoringError::Schema`] if the class is unknown.
    pub fn acquire(&self, class_name: &str) -> Result<ObjectBuilder<'_>, AuthoringError> {
        Ok(ObjectBuilder {
            class: self.class(class_name)?,
            values: Map::new(),
        })
    }

    /// Checks every object in `fragment` that names a class: the class must be known,
    /// every member a declared field with a valid value, and every required field present.
    ///
    /// # Errors
    /// The first violation found, in document order.
    pub fn validate(&self, fragment: &Value) -> Result<(), AuthoringError> {
        match fragment {
            Value::Object(object) => {
                if let Some(Value::String(class_name)) = object.get("class") {
                    let class = self.class(class_name)?;
                    for (key, value) in object {
                        if key == "class" {
                            continue;
                        }
                        class.field(key)?.check(class_name, key, value)?;
                    }
                    let missing: Vec<String> = class
                        .fields
                        .iter()
                        .filter(|(name, def)| def.is_required() && !object.contains_key(*name))
                        .map(|(name, _)| name.clone())
                        .collect();
                    if !missing.is_empty() {
                        return Err(AuthoringError::IncompleteObject {
                            class: class_name.clone(),
                            missing,
                        });
                    }
                }
                for value in object.values() {
                    self.validate(value)?;
                }
                Ok(())
            }
            Value::Array(items) => items.iter().try_for_each(|item| self.validate(item)),
            _ => Ok(()),
        }
    }
}

/// A blank object of a schema class being filled in.
#[derive(Debug)]
pub struct ObjectBuilder<'a> {
    class: &'a ClassDef,
    values: Map<String, Value>,
}

impl ObjectBuilder<'_> {
    /// # Errors
    /// - [`AuthoringError::FieldUnknown`] if the class does not declare `field`
    /// - [`AuthoringError::Type`] if the value has the wrong shape
    /// - [`AuthoringError::Range`] if a declared `min`/`max` is violated
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self, AuthoringError> {
        let value = value.into();
        self.class
            .field(field)?
            .check(&self.class.name, field, &value)?;
        self.values.insert(field.to_string(), value);
        Ok(self)
    }

    /// Freezes the object, filling unset fields from their schema defaults.
    ///
    /// # Errors
    /// [`AuthoringError::IncompleteObject`] if a required field was never set.
    pub fn finalize(self) -> Result<SchemaObject, AuthoringError> {
        let mut missing = Vec::new();
        let mut fields = Map::new();
        for (name, def) in &self.class.fields {
            match (self.values.get(name), &def.default) {
                (Some(value), _) => {
                    fields.insert(name.clone(), value.clone());
                }
                (None, Some(default)) => {
                    fields.insert(name.clone(), default.clone());
                }
                (None, None) => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(AuthoringError::IncompleteObject {
                class: self.class.name.clone(),
                missing,
            });
        }
        Ok(SchemaObject {
            class: self.class.name.clone(),
            fields,
        })
    }
}

/// A finalized, immutable schema object.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaObject {
    class: String,
    fields: Map<String, Value>,
}

impl SchemaObject {
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("class".to_string(), Value::String(self.class.clone()));
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use serde_json::{json, Value};
    use tempfile::NamedTempFile;

    use super::Schema;
    use crate::error::AuthoringError;

    fn test_schema_document() -> Value {
        json!({
            "interventions": {
                "IndividualIntervention": {
                    "MaleCircumcision": {
                        "class": "MaleCircumcision",
                        "Circumcision_Reduced_Acquire": {"type": "float", "min": 0, "max": 1, "default": 0.6},
                        "Apply_If_Higher_Reduced_Acquire": {"type": "bool", "default": 0},
                        "Distributed_Event_Trigger": {"type": "string", "default": ""},
                        "Intervention_Name": {"type": "string", "default": "MaleCircumcision"}
                    },
                    "PMTCT": {
                        "class": "PMTCT",
                        "Efficacy": {"type": "float", "min": 0, "max": 1},
                        "Dont_Allow_Duplicates": {"type": "bool", "default": 0}
                    },
                    "SetSexualDebutAge": {
                        "class": "SetSexualDebutAge",
                        "Setting_Type": {"type": "enum", "enum": ["CURRENT_AGE", "USER_SPECIFIED"], "default": "CURRENT_AGE"},
                        "Age_Years": {"type": "float", "min": 0, "max": 3.40282e38, "default": 125}
                    }
                }
            }
        })
    }

    #[test]
    fn test_acquire_unknown_class() {
        let schema = Schema::from_value(&test_schema_document()).unwrap();
        assert!(matches!(
            schema.acquire("Vaccine"),
            Err(AuthoringError::Schema(_))
        ));
    }

    #[test]
    fn test_set_unknown_field() {
        let schema = Schema::from_value(&test_schema_document()).unwrap();
        let mut builder = schema.acquire("MaleCircumcision").unwrap();
        assert!(matches!(
            builder.set("Efficacy", 0.5),
            Err(AuthoringError::FieldUnknown { .. })
        ));
    }

    #[test]
    fn test_set_out_of_range() {
        let schema = Schema::from_value(&test_schema_document()).unwrap();
        let mut builder = schema.acquire("MaleCircumcision").unwrap();
        assert!(matches!(
            builder.set("Circumcision_Reduced_Acquire", 1.5),
            Err(AuthoringError::Range { .. })
        ));
    }

    #[test]
    fn test_set_wrong_type() {
        let schema = Schema::from_value(&test_schema_document()).unwrap();
        let mut builder = schema.acquire("SetSexualDebutAge").unwrap();
        assert!(matches!(
            builder.set("Setting_Type", "SOMETIMES"),
            Err(AuthoringError::Type { .. })
        ));
        assert!(matches!(
            builder.set("Age_Years", "fifteen"),
            Err(AuthoringError::Type { .. })
        ));
    }

    #[test]
    fn test_finalize_fills_defaults() {
        let schema = Schema::from_value(&test_schema_document()).unwrap();
        let mut builder = schema.acquire("MaleCircumcision").unwrap();
        builder.set("Circumcision_Reduced_Acquire", 0.7).unwrap();
        let object = builder.finalize().unwrap();
        assert_eq!(
            object.to_json(),
            json!({
                "class": "MaleCircumcision",
                "Circumcision_Reduced_Acquire": 0.7,
                "Apply_If_Higher_Reduced_Acquire": 0,
                "Distributed_Event_Trigger": "",
                "Intervention_Name": "MaleCircumcision"
            })
        );
    }

    #[test]
    fn test_finalize_incomplete() {
        let schema = Schema::from_value(&test_schema_document()).unwrap();
        let builder = schema.acquire("PMTCT").unwrap();
        match builder.finalize() {
            Err(AuthoringError::IncompleteObject { class, missing }) => {
                assert_eq!(class, "PMTCT");
                assert_eq!(missing, vec!["Efficacy".to_string()]);
            }
            other => panic!("expected an incomplete object error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_nested_fragment() {
        let schema = Schema::from_value(&test_schema_document()).unwrap();
        let good = json!({"Intervention_Config": {"class": "PMTCT", "Efficacy": 0.5}});
        schema.validate(&good).unwrap();
        let bad = json!([{"class": "PMTCT", "Efficacy": 0.5, "Bogus": 1}]);
        assert!(matches!(
            schema.validate(&bad),
            Err(AuthoringError::FieldUnknown { .. })
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(test_schema_document().to_string().as_bytes())
            .unwrap();
        let schema = Schema::from_file(file.path()).unwrap();
        assert!(schema.has_class("SetSexualDebutAge"));
    }

    #[test]
    fn test_empty_schema_rejected() {
        assert!(Schema::from_value(&json!({"idmTypes": {}})).is_err());
    }
}
