use super::Name;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Static type of an expression or binding, as resolved by the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum Type {
    Int,
    Float,
    Bool,
    Str,
    Nil,
    Function,
    Any,
    Array(Box<Type>),
    Map(Box<Type>),
    Record(Vec<FieldType>),
    Object(Name),
    /// Intersection with `readonly`: the value and everything reachable from
    /// it is frozen at construction.
    Readonly(Box<Type>),
    Union(Vec<Type>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldType {
    pub name: Name,
    pub ty: Type,
}

impl Type {
    pub fn array(elem: Type) -> Self {
        Type::Array(Box::new(elem))
    }

    pub fn map(elem: Type) -> Self {
        Type::Map(Box::new(elem))
    }

    pub fn readonly(of: Type) -> Self {
        match of {
            Type::Readonly(_) => of,
            other => Type::Readonly(Box::new(other)),
        }
    }

    pub fn object(name: impl Into<Name>) -> Self {
        Type::Object(name.into())
    }

    /// Element type of an indexable type, `Any` when unknown.
    pub fn element(&self) -> Type {
        match self {
            Type::Array(elem) | Type::Map(elem) => (**elem).clone(),
            Type::Readonly(inner) => Type::readonly(inner.element()),
            _ => Type::Any,
        }
    }

    /// Name of the object type, looking through `readonly`.
    pub fn object_name(&self) -> Option<&Name> {
        match self {
            Type::Object(name) => Some(name),
            Type::Readonly(inner) => inner.object_name(),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Bool => write!(f, "boolean"),
            Type::Str => write!(f, "string"),
            Type::Nil => write!(f, "()"),
            Type::Function => write!(f, "function"),
            Type::Any => write!(f, "any"),
            Type::Array(elem) => write!(f, "{}[]", elem),
            Type::Map(elem) => write!(f, "map<{}>", elem),
            Type::Record(fields) => {
                write!(f, "record {{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {} {}", field.ty, field.name)?;
                }
                write!(f, " }}")
            }
            Type::Object(name) => write!(f, "{}", name),
            Type::Readonly(inner) => write!(f, "readonly & {}", inner),
            Type::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{}", member)?;
                }
                Ok(())
            }
        }
    }
}
