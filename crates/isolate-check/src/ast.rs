//! Typed program model consumed by the checker
//!
//! The checker does not parse source text. An external front-end hands over a
//! fully typed declaration graph: module-level bindings, functions and object
//! types whose bodies are statements over typed expressions. Every node derives
//! `serde` so the graph can be exchanged as JSON.

mod types;
pub use types::*;
mod expr;
pub use expr::*;
mod stmt;
pub use stmt::*;
mod decl;
pub use decl::*;

pub mod build;

use ecow::EcoString;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Name = EcoString;

/// Where a named storage location lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    Local,
    Parameter,
    ModuleLevel,
    ObjectField,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BindingKind::Local => write!(f, "local"),
            BindingKind::Parameter => write!(f, "parameter"),
            BindingKind::ModuleLevel => write!(f, "module-level"),
            BindingKind::ObjectField => write!(f, "object field"),
        }
    }
}

/// Identifies a function or a method of an object type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FnId {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Name>,
    pub name: Name,
}

impl FnId {
    pub fn function(name: impl Into<Name>) -> Self {
        Self {
            object: None,
            name: name.into(),
        }
    }

    pub fn method(object: impl Into<Name>, name: impl Into<Name>) -> Self {
        Self {
            object: Some(object.into()),
            name: name.into(),
        }
    }

    pub fn is_method(&self) -> bool {
        self.object.is_some()
    }
}

impl From<&Callee> for FnId {
    fn from(callee: &Callee) -> Self {
        match callee {
            Callee::Function { name } => FnId::function(name.clone()),
            Callee::Method { object, method } => FnId::method(object.clone(), method.clone()),
        }
    }
}

impl fmt::Display for FnId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.object {
            Some(object) => write!(f, "{}.{}", object, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Source text the front-end parsed, carried along so diagnostics can show
/// snippets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceText {
    pub name: String,
    pub text: String,
}

/// A whole module as handed over by the front-end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub name: Name,
    #[serde(default)]
    pub source: Option<SourceText>,
    #[serde(default)]
    pub bindings: Vec<BindingDecl>,
    #[serde(default)]
    pub functions: Vec<FnDecl>,
    #[serde(default)]
    pub objects: Vec<ObjectDecl>,
}

impl Program {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_binding(mut self, binding: BindingDecl) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn with_function(mut self, function: FnDecl) -> Self {
        self.functions.push(function);
        self
    }

    pub fn with_object(mut self, object: ObjectDecl) -> Self {
        self.objects.push(object);
        self
    }

    pub fn binding(&self, name: &str) -> Option<&BindingDecl> {
        self.bindings.iter().find(|b| b.name.as_str() == name)
    }

    pub fn function(&self, name: &str) -> Option<&FnDecl> {
        self.functions.iter().find(|f| f.name.as_str() == name)
    }

    pub fn object(&self, name: &str) -> Option<&ObjectDecl> {
        self.objects.iter().find(|o| o.name.as_str() == name)
    }

    /// Look up a function or method by id.
    pub fn resolve(&self, id: &FnId) -> Option<&FnDecl> {
        match &id.object {
            Some(object) => self.object(object)?.get_method(&id.name),
            None => self.function(&id.name),
        }
    }
}
