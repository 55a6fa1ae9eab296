//! Factory configuration and builder

use crate::convert::{DefaultTypeConverter, TypeConverter};
use crate::instantiation::{InstantiationStrategy, SimpleInstantiationStrategy};
use crate::resolver::ExpressionEvaluator;
use crate::ObjectFactory;
use std::sync::Arc;

/// Behavioural switches of an [`ObjectFactory`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryConfig {
    /// Re-registering a name replaces the definition instead of failing
    pub allow_definition_overriding: bool,
    /// Expose raw singletons before population so property cycles resolve
    pub allow_circular_references: bool,
    /// Compare names and aliases exactly, or ignoring ASCII case
    pub case_sensitive: bool,
    /// Type names never autowired nor dependency-checked
    pub ignored_dependency_types: Vec<String>,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            allow_definition_overriding: true,
            allow_circular_references: true,
            case_sensitive: true,
            ignored_dependency_types: Vec::new(),
        }
    }
}

impl FactoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_definition_overriding(mut self, allow: bool) -> Self {
        self.allow_definition_overriding = allow;
        self
    }

    pub fn allow_circular_references(mut self, allow: bool) -> Self {
        self.allow_circular_references = allow;
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn ignore_dependency_type(mut self, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        if !self.ignored_dependency_types.contains(&type_name) {
            self.ignored_dependency_types.push(type_name);
        }
        self
    }
}

/// Builder for factories with custom collaborators.
///
/// # Examples
///
/// ```rust
/// use object_factory::{FactoryConfig, ObjectFactoryBuilder};
///
/// let root = ObjectFactoryBuilder::new().build();
/// let factory = ObjectFactoryBuilder::new()
///     .config(FactoryConfig::new().allow_definition_overriding(false))
///     .parent(root)
///     .build();
/// assert!(factory.parent().is_some());
/// ```
#[derive(Default)]
pub struct ObjectFactoryBuilder {
    pub(crate) config: FactoryConfig,
    pub(crate) converter: Option<Arc<dyn TypeConverter>>,
    pub(crate) instantiation: Option<Arc<dyn InstantiationStrategy>>,
    pub(crate) evaluator: Option<Arc<dyn ExpressionEvaluator>>,
    pub(crate) parent: Option<ObjectFactory>,
}

impl ObjectFactoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: FactoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn type_converter(mut self, converter: Arc<dyn TypeConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn instantiation_strategy(mut self, strategy: Arc<dyn InstantiationStrategy>) -> Self {
        self.instantiation = Some(strategy);
        self
    }

    pub fn expression_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Fall back to `parent` for names not defined locally
    pub fn parent(mut self, parent: ObjectFactory) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn build(self) -> ObjectFactory {
        ObjectFactory::from_parts(
            self.config,
            self.converter
                .unwrap_or_else(|| Arc::new(DefaultTypeConverter::new())),
            self.instantiation
                .unwrap_or_else(|| Arc::new(SimpleInstantiationStrategy)),
            self.evaluator,
            self.parent,
        )
    }
}
