use super::{Name, Type};
use crate::pos::Pos;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A typed expression node. Isolation is never stored on the node: it is
/// recomputed per occurrence because it depends on the surrounding region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    #[serde(default)]
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum ExprKind {
    Literal {
        #[serde(default)]
        text: Name,
    },
    Var {
        name: Name,
    },
    /// List or mapping constructor building a new aggregate value.
    Construct {
        elems: Vec<Expr>,
    },
    Field {
        base: Box<Expr>,
        name: Name,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Callee,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// Asynchronous call that may run on another strand.
    Start {
        callee: Callee,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// Deep copy producing a fresh, unaliased value.
    Clone {
        operand: Box<Expr>,
    },
    /// Deep copy frozen into an immutable value.
    CloneReadonly {
        operand: Box<Expr>,
    },
    Binary {
        op: Name,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// Target of a call. Methods take their receiver as `args[0]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Callee {
    Function { name: Name },
    Method { object: Name, method: Name },
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type) -> Self {
        Self {
            kind,
            ty,
            pos: Pos::default(),
        }
    }

    pub fn at(mut self, pos: Pos) -> Self {
        self.pos = pos;
        self
    }

    /// Name of the variable if this is a bare variable reference.
    pub fn as_var(&self) -> Option<&Name> {
        match &self.kind {
            ExprKind::Var { name } => Some(name),
            _ => None,
        }
    }

    /// Innermost base of a chain of field/index accesses.
    pub fn place_root(&self) -> &Expr {
        match &self.kind {
            ExprKind::Field { base, .. } | ExprKind::Index { base, .. } => base.place_root(),
            _ => self,
        }
    }

    /// Direct sub-expressions in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Literal { .. } | ExprKind::Var { .. } => Vec::new(),
            ExprKind::Construct { elems } => elems.iter().collect(),
            ExprKind::Field { base, .. } => vec![&**base],
            ExprKind::Index { base, index } => vec![&**base, &**index],
            ExprKind::Call { args, .. } | ExprKind::Start { args, .. } => args.iter().collect(),
            ExprKind::Clone { operand } | ExprKind::CloneReadonly { operand } => vec![&**operand],
            ExprKind::Binary { lhs, rhs, .. } => vec![&**lhs, &**rhs],
        }
    }
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Callee::Function { name } => write!(f, "{}", name),
            Callee::Method { object, method } => write!(f, "{}.{}", object, method),
        }
    }
}

fn write_args(f: &mut fmt::Formatter, args: &[Expr]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", arg)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal { text } => write!(f, "{}", text),
            ExprKind::Var { name } => write!(f, "{}", name),
            ExprKind::Construct { elems } => {
                write!(f, "[")?;
                write_args(f, elems)?;
                write!(f, "]")
            }
            ExprKind::Field { base, name } => write!(f, "{}.{}", base, name),
            ExprKind::Index { base, index } => write!(f, "{}[{}]", base, index),
            ExprKind::Call { callee, args } => {
                write!(f, "{}(", callee)?;
                write_args(f, args)?;
                write!(f, ")")
            }
            ExprKind::Start { callee, args } => {
                write!(f, "start {}(", callee)?;
                write_args(f, args)?;
                write!(f, ")")
            }
            ExprKind::Clone { operand } => write!(f, "{}.clone()", operand),
            ExprKind::CloneReadonly { operand } => write!(f, "{}.cloneReadOnly()", operand),
            ExprKind::Binary { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::build::*;
    use crate::ast::Type;

    #[test]
    fn test_expr_display() {
        let a = var("a", Type::array(Type::Int));
        let e = list(vec![list(vec![int(1), int(3)]), clone(a), list(vec![int(4)])]);
        assert_eq!(e.to_string(), "[[1, 3], a.clone(), [4]]");
    }

    #[test]
    fn test_place_root() {
        let b = var("b", Type::array(Type::array(Type::Int)));
        let e = index(index(b, 0), 1);
        assert_eq!(e.place_root().as_var().map(|n| n.as_str()), Some("b"));
    }
}
