//! Mutability classification of types, bindings and fields

use crate::ast::{FieldDecl, Name, Type};
use std::fmt;

/// Object-type facts the classifiers need.
pub trait TypeEnv {
    /// The object type is declared `readonly`.
    fn is_readonly_object(&self, name: &Name) -> bool;
    /// The object type is (declared or currently inferred as) isolated.
    fn is_isolated_object(&self, name: &Name) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Immutable,
    Mutable,
}

impl fmt::Display for Mutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutability::Immutable => write!(f, "immutable"),
            Mutability::Mutable => write!(f, "mutable"),
        }
    }
}

/// Classify a type. Immutable means all transitively reachable state is
/// frozen at construction.
pub fn classify<E: TypeEnv + ?Sized>(ty: &Type, env: &E) -> Mutability {
    if is_immutable(ty, env) {
        Mutability::Immutable
    } else {
        Mutability::Mutable
    }
}

pub fn is_immutable<E: TypeEnv + ?Sized>(ty: &Type, env: &E) -> bool {
    match ty {
        Type::Int | Type::Float | Type::Bool | Type::Str | Type::Nil | Type::Function => true,
        Type::Readonly(_) => true,
        Type::Object(name) => env.is_readonly_object(name),
        Type::Union(members) => members.iter().all(|m| is_immutable(m, env)),
        Type::Array(_) | Type::Map(_) | Type::Record(_) | Type::Any => false,
    }
}

pub fn is_isolated_object_type<E: TypeEnv + ?Sized>(ty: &Type, env: &E) -> bool {
    match ty {
        Type::Object(name) => env.is_isolated_object(name),
        _ => false,
    }
}

/// Values of the type may be shared between strands without a lock.
pub fn is_shareable<E: TypeEnv + ?Sized>(ty: &Type, env: &E) -> bool {
    is_immutable(ty, env) || is_isolated_object_type(ty, env)
}

/// A binding is immutable when it is final and its type is immutable.
pub fn is_immutable_binding<E: TypeEnv + ?Sized>(is_final: bool, ty: &Type, env: &E) -> bool {
    is_final && is_immutable(ty, env)
}

/// A field is mutable unless it is final and shareable.
pub fn is_mutable_field<E: TypeEnv + ?Sized>(field: &FieldDecl, env: &E) -> bool {
    !(field.is_final && is_shareable(&field.ty, env))
}
