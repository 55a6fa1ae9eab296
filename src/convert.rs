//! Value conversion to declared types
//!
//! Configuration usually arrives as strings; constructors and properties
//! declare typed parameters. A [`TypeConverter`] bridges the two. The factory
//! ships [`DefaultTypeConverter`] and accepts any other implementation through
//! [`ObjectFactoryBuilder`](crate::ObjectFactoryBuilder).

use crate::types::ParamType;
use crate::value::Value;
use crate::{FactoryError, Result};

/// Converts a resolved value to a declared parameter type.
pub trait TypeConverter: Send + Sync {
    /// Convert `value` so that `required.accepts(&result)` holds, or fail
    /// with [`FactoryError::TypeMismatch`].
    fn convert(&self, value: Value, required: &ParamType) -> Result<Value>;
}

/// Primitive parsing, numeric widening and collection shaping.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTypeConverter;

impl DefaultTypeConverter {
    pub fn new() -> Self {
        Self
    }

    fn mismatch(value: &Value, required: &ParamType, message: Option<String>) -> FactoryError {
        FactoryError::TypeMismatch {
            property: None,
            required: required.to_string(),
            actual: value.type_name(),
            message,
        }
    }

    fn convert_primitive(&self, value: Value, required: &ParamType) -> Result<Value> {
        match (required, &value) {
            (ParamType::Int, Value::Str(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| Self::mismatch(&value, required, Some(e.to_string()))),
            (ParamType::Int, Value::Float(f)) if f.fract() == 0.0 => Ok(Value::Int(*f as i64)),
            (ParamType::Float, Value::Str(s)) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| Self::mismatch(&value, required, Some(e.to_string()))),
            (ParamType::Float, Value::Int(i)) => Ok(Value::Float(*i as f64)),
            (ParamType::Bool, Value::Str(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
                _ => Err(Self::mismatch(&value, required, None)),
            },
            (ParamType::Str, Value::Int(i)) => Ok(Value::Str(i.to_string())),
            (ParamType::Str, Value::Float(f)) => Ok(Value::Str(f.to_string())),
            (ParamType::Str, Value::Bool(b)) => Ok(Value::Str(b.to_string())),
            _ => Err(Self::mismatch(&value, required, None)),
        }
    }

    fn convert_collection(&self, value: Value, required: &ParamType, element: &ParamType) -> Result<Value> {
        let items = match value {
            Value::List(items) => items,
            Value::Str(s) if element.is_simple() => s
                .split(',')
                .map(|part| Value::Str(part.trim().to_string()))
                .filter(|v| v.as_str().is_some_and(|s| !s.is_empty()))
                .collect(),
            single => vec![single],
        };

        let mut converted = Vec::with_capacity(items.len());
        for item in items {
            let item = self.convert(item, element)?;
            if matches!(required, ParamType::Set(_)) && converted.contains(&item) {
                continue;
            }
            converted.push(item);
        }
        Ok(Value::List(converted))
    }
}

impl TypeConverter for DefaultTypeConverter {
    fn convert(&self, value: Value, required: &ParamType) -> Result<Value> {
        // sets still need their duplicates removed
        let dedup = matches!(required, ParamType::Set(_)) && matches!(value, Value::List(_));
        if !dedup && required.accepts(&value) {
            return Ok(value);
        }

        match required {
            ParamType::Bool | ParamType::Int | ParamType::Float | ParamType::Str => {
                self.convert_primitive(value, required)
            }
            ParamType::Array(e) | ParamType::List(e) | ParamType::Set(e) => {
                self.convert_collection(value, required, e)
            }
            ParamType::Map(e) => match value {
                Value::Map(entries) => {
                    let mut converted = Vec::with_capacity(entries.len());
                    for (key, v) in entries {
                        converted.push((key, self.convert(v, e)?));
                    }
                    Ok(Value::Map(converted))
                }
                other => Err(Self::mismatch(&other, required, None)),
            },
            ParamType::Any | ParamType::Object(_) | ParamType::Interface(_) => {
                Err(Self::mismatch(&value, required, None))
            }
        }
    }
}
