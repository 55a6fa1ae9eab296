//! Constructor and factory-method resolution
//!
//! Candidates are tried greediest first. For each one an argument array is
//! assembled from the configured arguments (by name, then position, then
//! generic holders) or, when autowiring, from the container. Satisfiable
//! candidates are ranked by their type-difference weight; the lowest weight
//! wins and ties keep the candidate found first.

use crate::autowire::DependencyDescriptor;
use crate::context::CreationContext;
use crate::definition::{ArgumentSlot, AutowireMode, ResolvedArguments, RootObjectDefinition};
use crate::types::{Arguments, ConstructorInfo, MethodInfo, ParamType, ParameterInfo, TypeDescriptor, TypeHandle};
use crate::value::{ObjectRef, Value, ancestor_count};
use crate::{FactoryError, ObjectFactory, Result};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Subtracted from the weight computed against unconverted arguments, so a
/// candidate whose parameters take the configured values as-is is preferred
/// over one that needs conversion.
pub const RAW_WEIGHT_BIAS: i32 = 1024;

/// Arguments prepared for one candidate
#[derive(Debug, Default)]
pub(crate) struct ArgumentsHolder {
    converted: Vec<Value>,
    raw: Vec<Value>,
    autowired: Vec<String>,
}

impl ArgumentsHolder {
    fn type_difference_weight(&self, params: &[ParamType]) -> i32 {
        let converted = type_difference_weight(params, &self.converted);
        let raw = type_difference_weight(params, &self.raw).saturating_sub(RAW_WEIGHT_BIAS);
        converted.min(raw)
    }
}

/// Outcome of assembling arguments for one candidate
#[derive(Debug)]
pub(crate) enum ArgumentMatch {
    Matched(ArgumentsHolder),
    /// The candidate cannot be satisfied; the next one is tried
    Rejected(FactoryError),
}

/// How far `args` are from `params`: 0 for exact types, +2 per base-type step,
/// +1 for interface parameters, `i32::MAX` when an argument is not assignable.
pub fn type_difference_weight(params: &[ParamType], args: &[Value]) -> i32 {
    let mut result: i32 = 0;
    for (param, arg) in params.iter().zip(args) {
        if !param.accepts(arg) {
            return i32::MAX;
        }
        match (param, arg) {
            (ParamType::Object(name) | ParamType::Interface(name), Value::Object(obj)) => {
                let mut current = obj.type_handle().base().cloned();
                while let Some(base) = current {
                    if base.name() == name {
                        result += 2;
                        break;
                    } else if base.is_assignable_to(name) {
                        result += 2;
                        current = base.base().cloned();
                    } else {
                        break;
                    }
                }
                if matches!(param, ParamType::Interface(_)) {
                    result += 1;
                }
            }
            (ParamType::Any, Value::Object(obj)) => {
                result += 2 * (ancestor_count(obj.type_handle()) + 1);
            }
            (ParamType::Any, Value::Null) => {}
            (ParamType::Any, _) => result += 2,
            _ => {}
        }
    }
    result
}

/// Split `Name<T1, T2>` into the method name and its generic arguments
pub(crate) fn parse_generic_method_name(spec: &str) -> Option<(String, Vec<String>)> {
    match spec.find('<') {
        None => Some((spec.trim().to_string(), Vec::new())),
        Some(open) => {
            let inner = spec[open + 1..].trim_end().strip_suffix('>')?;
            let args: Vec<String> = inner
                .split(',')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect();
            if args.is_empty() {
                return None;
            }
            Some((spec[..open].trim().to_string(), args))
        }
    }
}

/// Chooses and invokes constructors and factory methods for one factory
pub(crate) struct ConstructorResolver<'f> {
    factory: &'f ObjectFactory,
}

/// A constructor or a factory method, tried uniformly
trait Candidate {
    fn params(&self) -> &[ParameterInfo];
    fn describe(&self) -> String;
}

impl Candidate for ConstructorInfo {
    fn params(&self) -> &[ParameterInfo] {
        ConstructorInfo::params(self)
    }

    fn describe(&self) -> String {
        format!("constructor {}", self.signature())
    }
}

impl Candidate for MethodInfo {
    fn params(&self) -> &[ParameterInfo] {
        MethodInfo::params(self)
    }

    fn describe(&self) -> String {
        format!("factory method {}", self.signature())
    }
}

impl<'f> ConstructorResolver<'f> {
    pub(crate) fn new(factory: &'f ObjectFactory) -> Self {
        Self { factory }
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    /// Instantiate `ty` through the best matching constructor.
    ///
    /// `chosen` restricts the candidates (post-processor choice);
    /// `explicit_args` replaces the configured arguments.
    pub(crate) fn autowire_constructor(
        &self,
        name: &str,
        root: &RootObjectDefinition,
        ty: &TypeHandle,
        chosen: Option<Vec<ConstructorInfo>>,
        explicit_args: Option<&[Value]>,
        ctx: &mut CreationContext,
    ) -> Result<ObjectRef> {
        let autowiring =
            chosen.is_some() || root.resolved_autowire_mode(Some(ty)) == AutowireMode::Constructor;
        let candidates = chosen.unwrap_or_else(|| ty.constructors().to_vec());

        let (ctor, holder) = self
            .select(name, root, candidates, autowiring, explicit_args, ctx)?
            .ok_or_else(|| {
                FactoryError::creation(
                    name,
                    root.resource_description(),
                    format!(
                        "could not resolve matching constructor on type '{}' (hint: specify index/type/name arguments for simple parameters to avoid type ambiguities)",
                        ty.name()
                    ),
                )
            })?;

        #[cfg(feature = "logging")]
        debug!(target: "object_factory", object = name, constructor = %ctor.signature(), "Resolved constructor");

        self.register_autowired(name, &holder);
        self.factory.inner.instantiation.instantiate_with_constructor(
            root,
            name,
            ty,
            &ctor,
            &Arguments::new(holder.converted),
        )
    }

    // =========================================================================
    // Factory methods
    // =========================================================================

    /// Instantiate through the definition's factory method
    pub(crate) fn instantiate_using_factory_method(
        &self,
        name: &str,
        root: &RootObjectDefinition,
        explicit_args: Option<&[Value]>,
        ctx: &mut CreationContext,
    ) -> Result<ObjectRef> {
        let spec = root.factory_method_name().unwrap_or_default();
        let (method_name, type_args) = parse_generic_method_name(spec).ok_or_else(|| {
            FactoryError::DefinitionStore {
                name: name.to_string(),
                resource: root.resource_description().map(str::to_string),
                message: format!("malformed generic factory method name '{spec}'"),
            }
        })?;

        let (target, factory_type) = match root.factory_object_name() {
            Some(factory_name) => {
                if self.factory.transformed_name(factory_name) == name {
                    return Err(FactoryError::DefinitionStore {
                        name: name.to_string(),
                        resource: root.resource_description().map(str::to_string),
                        message: "factory object reference points back to the same definition".into(),
                    });
                }
                let target = self.factory.do_get_object(factory_name, None, None, ctx)?;
                self.factory
                    .register_dependent(&self.factory.transformed_name(factory_name), name);
                let ty = target.type_handle().clone();
                (Some(target), ty)
            }
            None => {
                let ty = self.factory.resolve_type(name, root)?.ok_or_else(|| {
                    FactoryError::DefinitionStore {
                        name: name.to_string(),
                        resource: root.resource_description().map(str::to_string),
                        message: "a static factory method requires the definition to declare a type".into(),
                    }
                })?;
                (None, ty)
            }
        };

        let is_static = target.is_none();
        let candidates: Vec<MethodInfo> = factory_type
            .methods()
            .iter()
            .filter(|m| {
                m.is_static() == is_static
                    && m.name() == method_name
                    && m.generic_arity() == type_args.len()
            })
            .cloned()
            .collect();

        let autowiring = root.resolved_autowire_mode(None) == AutowireMode::Constructor;
        let (method, holder) = self
            .select(name, root, candidates, autowiring, explicit_args, ctx)?
            .ok_or_else(|| {
                FactoryError::creation(
                    name,
                    root.resource_description(),
                    format!(
                        "could not resolve matching {} factory method '{spec}' on type '{}'",
                        if is_static { "static" } else { "instance" },
                        factory_type.name()
                    ),
                )
            })?;

        let accepted = method
            .params()
            .iter()
            .zip(&holder.converted)
            .all(|(p, v)| p.ty.accepts(v));
        if !accepted {
            return Err(FactoryError::creation(
                name,
                root.resource_description(),
                format!(
                    "factory method '{}' does not accept the resolved arguments",
                    method.signature()
                ),
            ));
        }

        #[cfg(feature = "logging")]
        debug!(target: "object_factory", object = name, method = %method.signature(), "Resolved factory method");

        self.register_autowired(name, &holder);
        self.factory.inner.instantiation.instantiate_with_factory_method(
            root,
            name,
            target.as_ref(),
            &method,
            &type_args,
            &Arguments::new(holder.converted),
        )
    }

    /// Common declared return type of every candidate factory method, or
    /// `None` when it cannot be determined up front
    pub(crate) fn predict_factory_method_type(&self, name: &str, root: &RootObjectDefinition) -> Result<Option<TypeHandle>> {
        let Some((method_name, type_args)) = root.factory_method_name().and_then(parse_generic_method_name) else {
            return Ok(None);
        };
        let (factory_type, is_static) = match root.factory_object_name() {
            Some(factory_name) => match self.factory.get_type(factory_name)? {
                Some(ty) => (ty, false),
                None => return Ok(None),
            },
            None => match self.factory.resolve_type(name, root)? {
                Some(ty) => (ty, true),
                None => return Ok(None),
            },
        };

        let mut predicted: Option<&str> = None;
        for method in factory_type.methods().iter().filter(|m| {
            m.is_static() == is_static && m.name() == method_name && m.generic_arity() == type_args.len()
        }) {
            match (predicted, method.return_type()) {
                (_, None) => return Ok(None),
                (None, Some(r)) => predicted = Some(r),
                (Some(p), Some(r)) if p != r => return Ok(None),
                _ => {}
            }
        }

        Ok(predicted.map(|n| {
            self.factory
                .lookup_type(n)
                .unwrap_or_else(|| TypeDescriptor::named(n))
        }))
    }

    // =========================================================================
    // Candidate selection
    // =========================================================================

    fn select<C: Candidate + Clone>(
        &self,
        name: &str,
        root: &RootObjectDefinition,
        mut candidates: Vec<C>,
        autowiring: bool,
        explicit_args: Option<&[Value]>,
        ctx: &mut CreationContext,
    ) -> Result<Option<(C, ArgumentsHolder)>> {
        let (min_nr_of_args, resolved) = match explicit_args {
            Some(args) => (args.len(), None),
            None => (
                root.constructor_args().min_required(),
                Some(self.resolve_arguments(name, root, ctx)?),
            ),
        };

        // greediest first, discovery order among equals
        candidates.sort_by(|a, b| b.params().len().cmp(&a.params().len()));

        let mut best: Option<(C, ArgumentsHolder)> = None;
        let mut min_weight = i32::MAX;
        let count = candidates.len();

        for (i, candidate) in candidates.into_iter().enumerate() {
            let param_count = candidate.params().len();
            if let Some((_, holder)) = &best {
                if holder.converted.len() > param_count {
                    break;
                }
            }
            if param_count < min_nr_of_args {
                continue;
            }

            let matched = match (explicit_args, &resolved) {
                (Some(args), _) => {
                    if param_count != args.len() {
                        continue;
                    }
                    self.convert_explicit(name, root, &candidate, args)
                }
                (None, Some(resolved)) => {
                    self.create_argument_array(name, root, resolved, &candidate, autowiring, ctx)?
                }
                (None, None) => continue,
            };

            let holder = match matched {
                ArgumentMatch::Matched(holder) => holder,
                ArgumentMatch::Rejected(err) => {
                    if i == count - 1 && best.is_none() {
                        return Err(err);
                    }

                    #[cfg(feature = "logging")]
                    trace!(target: "object_factory", object = name, candidate = %candidate.describe(), error = %err, "Ignoring unsatisfiable candidate");

                    continue;
                }
            };

            let param_types: Vec<ParamType> = candidate.params().iter().map(|p| p.ty.clone()).collect();
            let weight = holder.type_difference_weight(&param_types);
            if weight < min_weight {
                min_weight = weight;
                best = Some((candidate, holder));
            }
        }

        Ok(best)
    }

    fn resolve_arguments(&self, name: &str, root: &RootObjectDefinition, ctx: &mut CreationContext) -> Result<ResolvedArguments> {
        root.constructor_args().try_map(|slot, arg_name, value| {
            let label = match (slot, arg_name) {
                (_, Some(n)) => format!("constructor argument '{n}'"),
                (ArgumentSlot::Indexed(i), None) => format!("constructor argument with index {i}"),
                _ => "constructor argument".to_string(),
            };
            self.factory.resolve_value(name, root, &label, value, ctx)
        })
    }

    fn convert_explicit<C: Candidate>(
        &self,
        name: &str,
        root: &RootObjectDefinition,
        candidate: &C,
        args: &[Value],
    ) -> ArgumentMatch {
        let mut holder = ArgumentsHolder::default();
        for (index, (param, arg)) in candidate.params().iter().zip(args).enumerate() {
            match self.factory.inner.converter.convert(arg.clone(), &param.ty) {
                Ok(converted) => {
                    holder.converted.push(converted);
                    holder.raw.push(arg.clone());
                }
                Err(e) => {
                    return ArgumentMatch::Rejected(FactoryError::unsatisfied(
                        name,
                        root.resource_description(),
                        member(candidate, index, param),
                        "explicit argument does not match the parameter type",
                        Some(e),
                    ));
                }
            }
        }
        ArgumentMatch::Matched(holder)
    }

    fn create_argument_array<C: Candidate>(
        &self,
        name: &str,
        root: &RootObjectDefinition,
        resolved: &ResolvedArguments,
        candidate: &C,
        autowiring: bool,
        ctx: &mut CreationContext,
    ) -> Result<ArgumentMatch> {
        let mut holder = ArgumentsHolder::default();
        let mut used = Vec::new();

        for (index, param) in candidate.params().iter().enumerate() {
            let found = resolved
                .find(index, &param.name, &param.ty, &used)
                .or_else(|| {
                    if autowiring {
                        None
                    } else {
                        resolved.next_generic(&used)
                    }
                });

            if let Some((slot, value_holder)) = found {
                used.push(slot);
                let raw = value_holder.value.clone();
                match self.factory.inner.converter.convert(raw.clone(), &param.ty) {
                    Ok(converted) => {
                        holder.converted.push(converted);
                        holder.raw.push(raw);
                    }
                    Err(e) => {
                        return Ok(ArgumentMatch::Rejected(FactoryError::unsatisfied(
                            name,
                            root.resource_description(),
                            member(candidate, index, param),
                            format!(
                                "could not convert argument value of type [{}] to required type [{}]",
                                raw.type_name(),
                                param.ty
                            ),
                            Some(e),
                        )));
                    }
                }
                continue;
            }

            if !autowiring {
                return Ok(ArgumentMatch::Rejected(FactoryError::unsatisfied(
                    name,
                    root.resource_description(),
                    member(candidate, index, param),
                    format!(
                        "ambiguous argument values for parameter of type [{}]: did you specify the correct object references as arguments?",
                        param.ty
                    ),
                    None,
                )));
            }

            let descriptor = DependencyDescriptor::new(param.ty.clone())
                .with_name(param.name.clone());
            match self
                .factory
                .resolve_dependency(&descriptor, Some(name), &mut holder.autowired, ctx)
            {
                Ok(Some(value)) => {
                    holder.raw.push(value.clone());
                    holder.converted.push(value);
                }
                Ok(None) => {
                    return Ok(ArgumentMatch::Rejected(FactoryError::unsatisfied(
                        name,
                        root.resource_description(),
                        member(candidate, index, param),
                        format!("no autowirable value of type [{}]", param.ty),
                        None,
                    )));
                }
                Err(e) => {
                    return Ok(ArgumentMatch::Rejected(FactoryError::unsatisfied(
                        name,
                        root.resource_description(),
                        member(candidate, index, param),
                        e.to_string(),
                        Some(e),
                    )));
                }
            }
        }

        Ok(ArgumentMatch::Matched(holder))
    }

    fn register_autowired(&self, name: &str, holder: &ArgumentsHolder) {
        for autowired in &holder.autowired {
            self.factory.register_dependent(autowired, name);

            #[cfg(feature = "logging")]
            debug!(target: "object_factory", object = name, dependency = %autowired, "Autowiring by type via constructor");
        }
    }
}

fn member<C: Candidate>(candidate: &C, index: usize, param: &ParameterInfo) -> String {
    format!(
        "parameter {index} ('{}') of {}",
        param.name,
        candidate.describe()
    )
}
