//! Property population and event wiring
//!
//! Runs between instantiation and initialization: post-processor veto,
//! by-name or by-type autowiring of unset properties, post-processor
//! rewriting of the values, dependency checking, then property injection and
//! event handler subscription.

use crate::autowire::DependencyDescriptor;
use crate::context::CreationContext;
use crate::definition::{AutowireMode, ConfigValue, DependencyCheck, PropertyValues, RootObjectDefinition};
use crate::types::{EventSubscription, ParamType, PropertyInfo};
use crate::value::{ObjectRef, Value};
use crate::wrapper::ObjectWrapper;
use crate::{FactoryError, ObjectFactory, Result};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

impl ObjectFactory {
    /// Populate `object` with the property values of its definition
    pub(crate) fn populate_object(
        &self,
        name: &str,
        root: &RootObjectDefinition,
        object: &ObjectRef,
        ctx: &mut CreationContext,
    ) -> Result<()> {
        for pp in self.post_processors() {
            if !pp.after_instantiation(object, name)? {
                #[cfg(feature = "logging")]
                trace!(target: "object_factory", object = name, "Property population vetoed by post-processor");

                return Ok(());
            }
        }

        let mut properties = root.properties().clone();
        match root.resolved_autowire_mode(Some(object.type_handle())) {
            AutowireMode::ByName => self.autowire_by_name(name, root, object, &mut properties, ctx)?,
            AutowireMode::ByType => self.autowire_by_type(name, root, object, &mut properties, ctx)?,
            _ => {}
        }

        for pp in self.post_processors() {
            properties = match pp.process_property_values(properties, object, name)? {
                Some(p) => p,
                None => return Ok(()),
            };
        }

        self.check_dependencies(name, root, object, &properties)?;
        self.apply_property_values(name, root, object, &properties, ctx)?;
        self.wire_events(name, root, object, ctx)
    }

    /// Writable object-typed properties with no configured value
    fn unsatisfied_non_simple_properties<'o>(
        &self,
        object: &'o ObjectRef,
        properties: &PropertyValues,
    ) -> Vec<&'o PropertyInfo> {
        object
            .type_handle()
            .properties()
            .iter()
            .filter(|p| p.is_writable() && !p.ty().is_simple() && !properties.contains(p.name()))
            .filter(|p| !self.is_ignored_property_type(p.ty()))
            .collect()
    }

    fn is_ignored_property_type(&self, ty: &ParamType) -> bool {
        dependency_type_name(ty).is_some_and(|t| {
            self.inner
                .config
                .ignored_dependency_types
                .iter()
                .any(|ignored| ignored == t)
        })
    }

    fn autowire_by_name(
        &self,
        name: &str,
        root: &RootObjectDefinition,
        object: &ObjectRef,
        properties: &mut PropertyValues,
        ctx: &mut CreationContext,
    ) -> Result<()> {
        for property in self.unsatisfied_non_simple_properties(object, properties) {
            let property_name = property.name();
            if !self.contains_object(property_name) {
                #[cfg(feature = "logging")]
                trace!(target: "object_factory", object = name, property = property_name, "Not autowiring property by name: no matching object");

                continue;
            }
            let dependency = self.do_get_object(property_name, None, None, ctx).map_err(|e| {
                FactoryError::unsatisfied(
                    name,
                    root.resource_description(),
                    format!("property '{property_name}'"),
                    e.to_string(),
                    Some(e),
                )
            })?;
            self.register_dependent(&self.transformed_name(property_name), name);
            properties.add(property_name, ConfigValue::Value(Value::Object(dependency)));

            #[cfg(feature = "logging")]
            debug!(target: "object_factory", object = name, property = property_name, "Added autowiring by name");
        }
        Ok(())
    }

    fn autowire_by_type(
        &self,
        name: &str,
        root: &RootObjectDefinition,
        object: &ObjectRef,
        properties: &mut PropertyValues,
        ctx: &mut CreationContext,
    ) -> Result<()> {
        for property in self.unsatisfied_non_simple_properties(object, properties) {
            let property_name = property.name();
            let descriptor = DependencyDescriptor::new(property.ty().clone())
                .with_name(property_name)
                .optional();
            let mut autowired = Vec::new();

            let resolved = match self.resolve_dependency(&descriptor, Some(name), &mut autowired, ctx) {
                Ok(resolved) => resolved,
                Err(FactoryError::NoUniqueDefinition { type_name, names, .. }) => {
                    return Err(FactoryError::unsatisfied(
                        name,
                        root.resource_description(),
                        format!("property '{property_name}'"),
                        format!(
                            "there are {} objects of type '{type_name}' for autowire by type, when there should have been just 1 to be able to autowire property '{property_name}' of object '{name}'",
                            names.len()
                        ),
                        None,
                    ));
                }
                Err(e) => {
                    return Err(FactoryError::unsatisfied(
                        name,
                        root.resource_description(),
                        format!("property '{property_name}'"),
                        e.to_string(),
                        Some(e),
                    ));
                }
            };

            let Some(value) = resolved else {
                continue;
            };
            for dependency in &autowired {
                self.register_dependent(dependency, name);
            }
            properties.add(property_name, ConfigValue::Value(value));

            #[cfg(feature = "logging")]
            debug!(target: "object_factory", object = name, property = property_name, "Autowiring by type");
        }
        Ok(())
    }

    fn check_dependencies(
        &self,
        name: &str,
        root: &RootObjectDefinition,
        object: &ObjectRef,
        properties: &PropertyValues,
    ) -> Result<()> {
        let check = root.dependency_check();
        if check == DependencyCheck::None {
            return Ok(());
        }

        for property in object.type_handle().properties() {
            if !property.is_writable()
                || properties.contains(property.name())
                || self.is_ignored_property_type(property.ty())
            {
                continue;
            }
            let simple = property.ty().is_simple();
            let unsatisfied = match check {
                DependencyCheck::All => true,
                DependencyCheck::Simple => simple,
                DependencyCheck::Objects => !simple,
                DependencyCheck::None => false,
            };
            if unsatisfied {
                return Err(FactoryError::unsatisfied(
                    name,
                    root.resource_description(),
                    format!("property '{}'", property.name()),
                    "Set this property value or disable dependency checking for this object.",
                    None,
                ));
            }
        }
        Ok(())
    }

    fn apply_property_values(
        &self,
        name: &str,
        root: &RootObjectDefinition,
        object: &ObjectRef,
        properties: &PropertyValues,
        ctx: &mut CreationContext,
    ) -> Result<()> {
        if properties.is_empty() {
            return Ok(());
        }
        let wrapper = ObjectWrapper::new(object, self.inner.converter.as_ref());

        for pv in properties.iter() {
            let label = format!("property '{}'", pv.name);
            let value = self.resolve_value(name, root, &label, &pv.value, ctx)?;
            wrapper.set_property(&pv.name, value).map_err(|e| {
                FactoryError::creation_caused_by(
                    name,
                    root.resource_description(),
                    format!("error setting {label}"),
                    e,
                )
            })?;
        }
        Ok(())
    }

    fn wire_events(
        &self,
        name: &str,
        root: &RootObjectDefinition,
        object: &ObjectRef,
        ctx: &mut CreationContext,
    ) -> Result<()> {
        for handler in root.event_handlers() {
            let label = format!("event handler for '{}'", handler.event_name);
            let source = match self.resolve_value(name, root, &label, &handler.source, ctx)? {
                Value::Object(source) => source,
                other => {
                    return Err(FactoryError::creation(
                        name,
                        root.resource_description(),
                        format!("event source for '{}' must be an object, got {}", handler.event_name, other.type_name()),
                    ));
                }
            };

            let source_type = source.type_handle();
            let event = source_type.event(&handler.event_name).ok_or_else(|| {
                FactoryError::creation(
                    name,
                    root.resource_description(),
                    format!("type '{}' has no event named '{}'", source_type.name(), handler.event_name),
                )
            })?;
            if object
                .type_handle()
                .instance_methods(&handler.method_name)
                .next()
                .is_none()
            {
                return Err(FactoryError::creation(
                    name,
                    root.resource_description(),
                    format!(
                        "handler method '{}' not found on type '{}'",
                        handler.method_name,
                        object.type_name()
                    ),
                ));
            }

            let subscription = EventSubscription {
                handler: object.clone(),
                method: handler.method_name.clone(),
            };
            event.subscribe(source.instance(), subscription).map_err(|e| {
                FactoryError::creation_caused_by(
                    name,
                    root.resource_description(),
                    format!("could not subscribe to event '{}'", handler.event_name),
                    e,
                )
            })?;

            #[cfg(feature = "logging")]
            debug!(target: "object_factory", object = name, event = %handler.event_name, method = %handler.method_name, "Wired event handler");
        }
        Ok(())
    }
}

/// The object type a property wants injected, looking through collections
fn dependency_type_name(ty: &ParamType) -> Option<&str> {
    ty.object_type_name()
        .or_else(|| ty.element_type().and_then(ParamType::object_type_name))
}
