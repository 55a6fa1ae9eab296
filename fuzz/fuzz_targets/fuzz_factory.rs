#![no_main]

//! Fuzz target for definition registration, merging and resolution
//!
//! Random definitions over a small name space produce parent chains,
//! reference cycles, alias chains and depends-on loops. Every operation must
//! fail cleanly instead of panicking or deadlocking.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use object_factory::{
    ConfigValue, ObjectDefinition, ObjectFactory, ObjectScope, ParamType, TypeBuilder, Value,
};
use std::sync::Mutex;

const NAMES: [&str; 5] = ["a", "b", "c", "d", "e"];

fn name(index: u8) -> &'static str {
    NAMES[index as usize % NAMES.len()]
}

#[derive(Default)]
struct Node {
    peer: Mutex<Option<Value>>,
}

#[derive(Debug, Arbitrary)]
enum Link {
    None,
    Property(u8),
    Constructor(u8),
    Inner,
}

#[derive(Debug, Arbitrary)]
struct Definition {
    parent: Option<u8>,
    prototype: bool,
    is_abstract: bool,
    lazy: bool,
    link: Link,
    depends_on: Option<u8>,
}

#[derive(Debug, Arbitrary)]
enum FactoryOp {
    Register(u8, Definition),
    Remove(u8),
    Alias(u8, u8),
    Get(u8),
    GetTwice(u8),
    Merge(u8),
    IsSingleton(u8),
    PreInstantiate,
    DestroySingleton(u8),
    DestroyAll,
}

fn definition(def: &Definition) -> ObjectDefinition {
    let mut d = match def.parent {
        Some(p) => ObjectDefinition::child_of(name(p)),
        None => ObjectDefinition::of_type_name("Node"),
    };
    if def.prototype {
        d = d.with_scope(ObjectScope::Prototype);
    } else if def.lazy {
        d = d.with_lazy_init(true);
    }
    d = d.with_abstract(def.is_abstract);
    d = match def.link {
        Link::None => d,
        Link::Property(target) => d.with_property("Peer", ConfigValue::reference(name(target))),
        Link::Constructor(target) => d.with_indexed_arg(0, ConfigValue::reference(name(target))),
        Link::Inner => d.with_property("Peer", ConfigValue::inner(ObjectDefinition::of_type_name("Node"))),
    };
    if let Some(dep) = def.depends_on {
        d = d.with_depends_on(name(dep));
    }
    d
}

fuzz_target!(|ops: Vec<FactoryOp>| {
    let factory = ObjectFactory::new();
    factory.register_type(
        TypeBuilder::<Node>::new("Node")
            .default_constructor(Node::default)
            .constructor(&[("peer", ParamType::object("Node"))], |args| {
                Ok(Node {
                    peer: Mutex::new(args.get(0).cloned()),
                })
            })
            .property("Peer", ParamType::object("Node"), |n, v| {
                *n.peer.lock().unwrap() = Some(v);
                Ok(())
            })
            .build(),
    );

    for op in ops.into_iter().take(64) {
        match op {
            FactoryOp::Register(n, def) => {
                let _ = factory.register_definition(name(n), definition(&def));
            }
            FactoryOp::Remove(n) => {
                let _ = factory.remove_definition(name(n));
            }
            FactoryOp::Alias(n, alias) => {
                let _ = factory.register_alias(name(n), name(alias));
            }
            FactoryOp::Get(n) => {
                let _ = factory.get_object(name(n));
                assert!(!factory.is_currently_in_creation(name(n)));
            }
            FactoryOp::GetTwice(n) => {
                if let (Ok(first), Ok(second)) = (factory.get_object(name(n)), factory.get_object(name(n))) {
                    if factory.is_singleton(name(n)).unwrap_or(false) {
                        assert!(first.ptr_eq(&second));
                    }
                }
            }
            FactoryOp::Merge(n) => {
                let _ = factory.merged_definition(name(n));
            }
            FactoryOp::IsSingleton(n) => {
                let _ = factory.is_singleton(name(n));
                let _ = factory.is_prototype(name(n));
            }
            FactoryOp::PreInstantiate => {
                if factory.pre_instantiate_singletons().is_err() {
                    assert_eq!(factory.singleton_count(), 0);
                }
            }
            FactoryOp::DestroySingleton(n) => {
                factory.destroy_singleton(name(n));
            }
            FactoryOp::DestroyAll => {
                factory.destroy_singletons();
                assert_eq!(factory.singleton_count(), 0);
            }
        }
    }
});
