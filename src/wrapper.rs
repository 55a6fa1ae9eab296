//! Property access by name on a live object

use crate::convert::TypeConverter;
use crate::types::{ParamType, PropertyInfo};
use crate::value::{ObjectRef, Value};
use crate::{FactoryError, Result};

/// Get/set-by-name view over an object, converting values to the declared
/// property type on the way in.
pub struct ObjectWrapper<'a> {
    target: &'a ObjectRef,
    converter: &'a dyn TypeConverter,
}

impl<'a> ObjectWrapper<'a> {
    pub fn new(target: &'a ObjectRef, converter: &'a dyn TypeConverter) -> Self {
        Self { target, converter }
    }

    #[inline]
    pub fn target(&self) -> &ObjectRef {
        self.target
    }

    fn property(&self, name: &str) -> Result<&'a PropertyInfo> {
        let target: &'a ObjectRef = self.target;
        target.type_handle().property(name).ok_or_else(|| FactoryError::TypeMismatch {
            property: Some(name.to_string()),
            required: "writable property".into(),
            actual: target.type_name().to_string(),
            message: Some(format!(
                "type '{}' declares no property named '{name}'",
                target.type_name()
            )),
        })
    }

    /// Declared type of a property
    pub fn property_type(&self, name: &str) -> Option<&ParamType> {
        self.target.type_handle().property(name).map(PropertyInfo::ty)
    }

    pub fn is_writable(&self, name: &str) -> bool {
        self.target
            .type_handle()
            .property(name)
            .is_some_and(PropertyInfo::is_writable)
    }

    /// All writable properties in declaration order
    pub fn writable_properties(&self) -> impl Iterator<Item = &PropertyInfo> {
        self.target
            .type_handle()
            .properties()
            .iter()
            .filter(|p| p.is_writable())
    }

    pub fn get_property(&self, name: &str) -> Result<Value> {
        self.property(name)?.get(self.target.instance())
    }

    /// Convert `value` to the property's type and set it
    pub fn set_property(&self, name: &str, value: Value) -> Result<()> {
        let property = self.property(name)?;
        let converted = self.converter.convert(value, property.ty()).map_err(|e| match e {
            FactoryError::TypeMismatch {
                required,
                actual,
                message,
                ..
            } => FactoryError::TypeMismatch {
                property: Some(name.to_string()),
                required,
                actual,
                message,
            },
            other => other,
        })?;
        property.set(self.target.instance(), converted)
    }
}
