//! Turning a chosen constructor or factory method into an instance

use crate::definition::RootObjectDefinition;
use crate::types::{Arguments, ConstructorInfo, MethodInfo, TypeHandle};
use crate::value::{ObjectRef, Value};
use crate::{FactoryError, Result};

/// Creates raw instances once the constructor or factory method and its
/// arguments are known.
pub trait InstantiationStrategy: Send + Sync {
    /// Instantiate through the type's zero-argument constructor
    fn instantiate(&self, definition: &RootObjectDefinition, name: &str, ty: &TypeHandle) -> Result<ObjectRef>;

    fn instantiate_with_constructor(
        &self,
        definition: &RootObjectDefinition,
        name: &str,
        ty: &TypeHandle,
        constructor: &ConstructorInfo,
        args: &Arguments,
    ) -> Result<ObjectRef>;

    /// Call a factory method; `target` is `None` for static methods. The
    /// method must produce an object.
    fn instantiate_with_factory_method(
        &self,
        definition: &RootObjectDefinition,
        name: &str,
        target: Option<&ObjectRef>,
        method: &MethodInfo,
        type_args: &[String],
        args: &Arguments,
    ) -> Result<ObjectRef>;
}

/// Direct invocation of descriptor members
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleInstantiationStrategy;

impl InstantiationStrategy for SimpleInstantiationStrategy {
    fn instantiate(&self, definition: &RootObjectDefinition, name: &str, ty: &TypeHandle) -> Result<ObjectRef> {
        let constructor = ty.default_constructor().ok_or_else(|| {
            FactoryError::creation(
                name,
                definition.resource_description(),
                format!("type '{}' has no default constructor", ty.name()),
            )
        })?;
        self.instantiate_with_constructor(definition, name, ty, constructor, &Arguments::default())
    }

    fn instantiate_with_constructor(
        &self,
        definition: &RootObjectDefinition,
        name: &str,
        ty: &TypeHandle,
        constructor: &ConstructorInfo,
        args: &Arguments,
    ) -> Result<ObjectRef> {
        constructor
            .invoke(args)
            .map(|instance| ObjectRef::from_instance(instance, ty.clone()))
            .map_err(|e| {
                FactoryError::creation_caused_by(
                    name,
                    definition.resource_description(),
                    format!("instantiation of '{}' via constructor {} failed", ty.name(), constructor.signature()),
                    e,
                )
            })
    }

    fn instantiate_with_factory_method(
        &self,
        definition: &RootObjectDefinition,
        name: &str,
        target: Option<&ObjectRef>,
        method: &MethodInfo,
        type_args: &[String],
        args: &Arguments,
    ) -> Result<ObjectRef> {
        let produced = method
            .invoke(target.map(ObjectRef::instance), type_args, args)
            .map_err(|e| {
                FactoryError::creation_caused_by(
                    name,
                    definition.resource_description(),
                    format!("factory method '{}' threw an error", method.signature()),
                    e,
                )
            })?;

        match produced {
            Value::Object(object) => Ok(object),
            Value::Null => Err(FactoryError::creation(
                name,
                definition.resource_description(),
                format!("factory method '{}' returned null", method.signature()),
            )),
            other => Err(FactoryError::creation(
                name,
                definition.resource_description(),
                format!(
                    "factory method '{}' must produce an object but returned a {}",
                    method.signature(),
                    other.type_name()
                ),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ObjectDefinition;
    use crate::types::{ParamType, TypeBuilder};

    struct Point {
        x: i64,
    }

    fn point_type() -> TypeHandle {
        TypeBuilder::<Point>::new("Point")
            .default_constructor(|| Point { x: 0 })
            .constructor(&[("x", ParamType::Int)], |args| Ok(Point { x: args.int(0)? }))
            .static_method("Number", &[], None, |_| Ok(Value::Int(3)))
            .build()
    }

    #[test]
    fn test_default_and_chosen_constructor() {
        let ty = point_type();
        let def = RootObjectDefinition::new(ObjectDefinition::of_type(&ty));
        let strategy = SimpleInstantiationStrategy;

        let p = strategy.instantiate(&def, "p", &ty).unwrap();
        assert_eq!(p.downcast_ref::<Point>().unwrap().x, 0);

        let ctor = &ty.constructors()[1];
        let p = strategy
            .instantiate_with_constructor(&def, "p", &ty, ctor, &Arguments::new(vec![Value::Int(9)]))
            .unwrap();
        assert_eq!(p.downcast_ref::<Point>().unwrap().x, 9);

        let err = strategy
            .instantiate_with_constructor(&def, "p", &ty, ctor, &Arguments::default())
            .unwrap_err();
        assert!(matches!(err, FactoryError::ObjectCreation { .. }));
    }

    #[test]
    fn test_factory_method_must_produce_object() {
        let ty = point_type();
        let def = RootObjectDefinition::new(ObjectDefinition::of_type(&ty).with_factory_method("Number"));
        let method = ty.methods()[0].clone();
        let err = SimpleInstantiationStrategy
            .instantiate_with_factory_method(&def, "n", None, &method, &[], &Arguments::default())
            .unwrap_err();
        assert!(err.to_string().contains("must produce an object"));
    }
}
