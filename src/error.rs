//! Error types for the object factory

use thiserror::Error;

/// Errors that can occur while registering, creating or configuring objects
#[derive(Error, Debug, Clone)]
pub enum FactoryError {
    /// No definition (or manually registered singleton) exists for the name
    #[error("No object named '{name}' is defined{}", suffix(.message))]
    NoSuchDefinition {
        name: String,
        message: Option<String>,
    },

    /// A by-type lookup found no candidate at all
    #[error("No object of type '{type_name}' is defined{}", suffix(.message))]
    NoSuchType {
        type_name: String,
        message: Option<String>,
    },

    /// A by-type lookup found several candidates where one was expected
    #[error(
        "No unique object of type '{type_name}' is defined: expected single matching object but found {}: {}",
        .names.len(),
        .names.join(", ")
    )]
    NoUniqueDefinition {
        type_name: String,
        names: Vec<String>,
        message: Option<String>,
    },

    /// A definition is malformed (unknown parent, parent cycle, missing type)
    #[error("Invalid object definition '{name}'{}: {message}", defined_in(.resource))]
    DefinitionStore {
        name: String,
        resource: Option<String>,
        message: String,
    },

    /// A definition failed validation at registration time
    #[error("Validation of object definition '{name}' failed: {message}")]
    DefinitionValidation { name: String, message: String },

    /// A definition already exists and overriding is disabled
    #[error("Cannot register object definition for '{name}': there is already a definition bound and overriding is disabled")]
    DefinitionOverride { name: String },

    /// An alias clashes with an existing alias or definition
    #[error("Cannot register alias '{alias}' for name '{name}': {message}")]
    AliasConflict {
        name: String,
        alias: String,
        message: String,
    },

    /// Instantiation, configuration or initialization of an object failed
    #[error("Error creating object '{name}'{}: {message}", defined_in(.resource))]
    ObjectCreation {
        name: String,
        resource: Option<String>,
        message: String,
        #[source]
        source: Option<Box<FactoryError>>,
    },

    /// A constructor argument or property could not be satisfied
    #[error("Error creating object '{name}'{}: unsatisfied dependency expressed through {member}: {message}", defined_in(.resource))]
    UnsatisfiedDependency {
        name: String,
        resource: Option<String>,
        member: String,
        message: String,
        #[source]
        source: Option<Box<FactoryError>>,
    },

    /// The object is already being created on this resolution path
    #[error("Error creating object '{name}': requested object is currently in creation: is there an unresolvable circular reference?")]
    CurrentlyInCreation { name: String },

    /// An abstract (template) definition was asked for an instance
    #[error("Object definition '{name}' is abstract and cannot be instantiated")]
    ObjectIsAbstract { name: String },

    /// A produced instance does not satisfy the requested type
    #[error("Object named '{name}' must be of type '{required}', but was actually of type '{actual}'")]
    NotOfRequiredType {
        name: String,
        required: String,
        actual: String,
    },

    /// A type name could not be resolved against the type registry
    #[error("Cannot resolve type '{type_name}' for object definition '{name}'")]
    CannotLoadType { name: String, type_name: String },

    /// A value could not be converted to the declared type
    #[error("Failed to convert value of type '{actual}' to required type '{required}'{}{}", for_property(.property), suffix(.message))]
    TypeMismatch {
        property: Option<String>,
        required: String,
        actual: String,
        message: Option<String>,
    },

    /// Objects were requested while the factory tears its singletons down
    #[error("Singleton creation of '{name}' not allowed while singletons of this factory are in destruction")]
    DestructionInProgress { name: String },

    /// User code (constructor, setter, method) reported a failure
    #[error("Invocation of '{member}' failed: {reason}")]
    Invocation { member: String, reason: String },
}

fn suffix(message: &Option<String>) -> String {
    message.as_ref().map(|m| format!(": {m}")).unwrap_or_default()
}

fn defined_in(resource: &Option<String>) -> String {
    resource
        .as_ref()
        .map(|r| format!(" defined in {r}"))
        .unwrap_or_default()
}

fn for_property(property: &Option<String>) -> String {
    property
        .as_ref()
        .map(|p| format!(" for property '{p}'"))
        .unwrap_or_default()
}

impl FactoryError {
    /// Create a NoSuchDefinition error for a name
    #[inline]
    pub fn no_such_definition(name: impl Into<String>) -> Self {
        Self::NoSuchDefinition {
            name: name.into(),
            message: None,
        }
    }

    /// Create an ObjectCreation error without an inner cause
    #[inline]
    pub fn creation(
        name: impl Into<String>,
        resource: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self::ObjectCreation {
            name: name.into(),
            resource: resource.map(str::to_string),
            message: message.into(),
            source: None,
        }
    }

    /// Create an ObjectCreation error wrapping an inner cause
    #[inline]
    pub fn creation_caused_by(
        name: impl Into<String>,
        resource: Option<&str>,
        message: impl Into<String>,
        cause: FactoryError,
    ) -> Self {
        Self::ObjectCreation {
            name: name.into(),
            resource: resource.map(str::to_string),
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// Create an UnsatisfiedDependency error
    #[inline]
    pub fn unsatisfied(
        name: impl Into<String>,
        resource: Option<&str>,
        member: impl Into<String>,
        message: impl Into<String>,
        cause: Option<FactoryError>,
    ) -> Self {
        Self::UnsatisfiedDependency {
            name: name.into(),
            resource: resource.map(str::to_string),
            member: member.into(),
            message: message.into(),
            source: cause.map(Box::new),
        }
    }

    /// Create an Invocation error, used by constructors and setters
    #[inline]
    pub fn invocation(member: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invocation {
            member: member.into(),
            reason: reason.into(),
        }
    }

    /// The wrapped cause, if this error wraps one
    pub fn cause(&self) -> Option<&FactoryError> {
        match self {
            Self::ObjectCreation { source, .. } | Self::UnsatisfiedDependency { source, .. } => {
                source.as_deref()
            }
            _ => None,
        }
    }

    /// The innermost error of the cause chain
    pub fn root_cause(&self) -> &FactoryError {
        let mut current = self;
        while let Some(next) = current.cause() {
            current = next;
        }
        current
    }

    /// Whether any error in the cause chain reports a circular reference
    pub fn is_currently_in_creation(&self) -> bool {
        let mut current = Some(self);
        while let Some(err) = current {
            if matches!(err, Self::CurrentlyInCreation { .. }) {
                return true;
            }
            current = err.cause();
        }
        false
    }

    /// Object name the error is about, when it carries one
    pub fn object_name(&self) -> Option<&str> {
        match self {
            Self::NoSuchDefinition { name, .. }
            | Self::DefinitionStore { name, .. }
            | Self::DefinitionValidation { name, .. }
            | Self::DefinitionOverride { name }
            | Self::AliasConflict { name, .. }
            | Self::ObjectCreation { name, .. }
            | Self::UnsatisfiedDependency { name, .. }
            | Self::CurrentlyInCreation { name }
            | Self::ObjectIsAbstract { name }
            | Self::NotOfRequiredType { name, .. }
            | Self::CannotLoadType { name, .. }
            | Self::DestructionInProgress { name } => Some(name),
            Self::NoSuchType { .. }
            | Self::NoUniqueDefinition { .. }
            | Self::TypeMismatch { .. }
            | Self::Invocation { .. } => None,
        }
    }
}

/// Result type alias for factory operations
pub type Result<T> = std::result::Result<T, FactoryError>;
