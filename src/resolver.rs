//! Resolution of configured values into runtime values
//!
//! Literals pass through, references become objects (recording the
//! dependency), inner definitions are created on the spot, expressions go to
//! the configured evaluator and managed collections are resolved element by
//! element.

use crate::context::CreationContext;
use crate::definition::{ConfigValue, InnerDefinition, ObjectReference, RootObjectDefinition};
use crate::value::Value;
use crate::{FactoryError, ObjectFactory, Result};
use std::sync::atomic::Ordering;

#[cfg(feature = "logging")]
use tracing::trace;

/// Prefix of generated inner object names
pub const INNER_OBJECT_PREFIX: &str = "(inner object)";

/// Evaluates expression values in definitions
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, factory: &ObjectFactory) -> Result<Value>;
}

impl ObjectFactory {
    /// Resolve one configured value on behalf of `owner`; `label` names the
    /// position in error messages
    pub(crate) fn resolve_value(
        &self,
        owner: &str,
        root: &RootObjectDefinition,
        label: &str,
        value: &ConfigValue,
        ctx: &mut CreationContext,
    ) -> Result<Value> {
        match value {
            ConfigValue::Value(v) => Ok(v.clone()),
            ConfigValue::Reference(reference) => self.resolve_reference(owner, root, label, reference, ctx),
            ConfigValue::Inner(inner) => self.resolve_inner(owner, root, label, inner, ctx),
            ConfigValue::Expression(expression) => self.evaluate_expression(owner, root, label, expression),
            ConfigValue::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.resolve_value(owner, root, &format!("{label} with key [{i}]"), item, ctx))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            ConfigValue::Map(entries) => entries
                .iter()
                .map(|(key, item)| {
                    self.resolve_value(owner, root, &format!("{label} with key [{key}]"), item, ctx)
                        .map(|v| (key.clone(), v))
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::Map),
        }
    }

    fn resolve_reference(
        &self,
        owner: &str,
        root: &RootObjectDefinition,
        label: &str,
        reference: &ObjectReference,
        ctx: &mut CreationContext,
    ) -> Result<Value> {
        let wrap = |e: FactoryError| {
            FactoryError::creation_caused_by(
                owner,
                root.resource_description(),
                format!("cannot resolve reference to object '{}' while setting {label}", reference.name),
                e,
            )
        };

        if reference.to_parent {
            let parent = self.inner.parent.as_ref().ok_or_else(|| {
                FactoryError::creation(
                    owner,
                    root.resource_description(),
                    format!(
                        "cannot resolve reference to object '{}' in parent factory: no parent factory available",
                        reference.name
                    ),
                )
            })?;
            return parent.get_object(&reference.name).map(Value::Object).map_err(wrap);
        }

        let object = self
            .do_get_object(&reference.name, None, None, ctx)
            .map_err(wrap)?;
        self.register_dependent(&self.transformed_name(&reference.name), owner);

        #[cfg(feature = "logging")]
        trace!(target: "object_factory", object = owner, reference = %reference.name, "Resolved object reference");

        Ok(Value::Object(object))
    }

    fn resolve_inner(
        &self,
        owner: &str,
        root: &RootObjectDefinition,
        label: &str,
        inner: &InnerDefinition,
        ctx: &mut CreationContext,
    ) -> Result<Value> {
        let inner_name = match &inner.name {
            Some(name) => name.clone(),
            None => format!(
                "{INNER_OBJECT_PREFIX}#{}",
                self.inner.inner_counter.fetch_add(1, Ordering::Relaxed)
            ),
        };
        let wrap = |e: FactoryError| {
            FactoryError::creation_caused_by(
                owner,
                root.resource_description(),
                format!("cannot create inner object '{inner_name}' while setting {label}"),
                e,
            )
        };

        let merged = self
            .merged_inner_definition(&inner_name, &inner.definition, root)
            .map_err(wrap)?;
        let raw = self
            .create_object_internal(&inner_name, &merged, None, ctx)
            .map_err(wrap)?;
        if root.is_singleton() && merged.is_singleton() {
            self.inner.singletons.register_contained(owner, &inner_name);
        }
        self.object_for_instance(raw, &inner_name, &inner_name)
            .map(Value::Object)
            .map_err(wrap)
    }

    fn evaluate_expression(
        &self,
        owner: &str,
        root: &RootObjectDefinition,
        label: &str,
        expression: &str,
    ) -> Result<Value> {
        let evaluator = self.inner.evaluator.as_ref().ok_or_else(|| {
            FactoryError::creation(
                owner,
                root.resource_description(),
                format!("no expression evaluator configured for expression '{expression}' in {label}"),
            )
        })?;
        evaluator.evaluate(expression, self).map_err(|e| {
            FactoryError::creation_caused_by(
                owner,
                root.resource_description(),
                format!("error evaluating expression '{expression}' in {label}"),
                e,
            )
        })
    }
}
