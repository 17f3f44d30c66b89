use super::{Expr, Name, Stmt, Type};
use crate::pos::Pos;
use serde::{Deserialize, Serialize};

/// Module-level variable declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingDecl {
    pub name: Name,
    pub ty: Type,
    pub init: Expr,
    /// Assigned exactly once.
    #[serde(default)]
    pub is_final: bool,
    /// Declared with the `isolated` qualifier.
    #[serde(default)]
    pub isolated: bool,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub pos: Pos,
}

impl BindingDecl {
    pub fn new(name: impl Into<Name>, ty: Type, init: Expr) -> Self {
        Self {
            name: name.into(),
            ty,
            init,
            is_final: false,
            isolated: false,
            public: false,
            pos: Pos::default(),
        }
    }

    pub fn isolated(mut self) -> Self {
        self.isolated = true;
        self
    }

    pub fn final_(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    pub fn at(mut self, pos: Pos) -> Self {
        self.pos = pos;
        self
    }
}

/// Function parameters are final.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: Name,
    pub ty: Type,
}

impl Param {
    pub fn new(name: impl Into<Name>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Function or method declaration. Methods list their parameters without
/// `self`; the checker binds `self` as an explicit first parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FnDecl {
    pub name: Name,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default = "nil_type")]
    pub ret: Type,
    /// `None` for functions implemented outside the analysed module.
    #[serde(default)]
    pub body: Option<Vec<Stmt>>,
    #[serde(default)]
    pub isolated: bool,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub pos: Pos,
}

fn nil_type() -> Type {
    Type::Nil
}

impl FnDecl {
    pub fn new(name: impl Into<Name>, body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            ret: Type::Nil,
            body: Some(body),
            isolated: false,
            public: false,
            pos: Pos::default(),
        }
    }

    /// A function whose body lives outside the analysed module.
    pub fn external(name: impl Into<Name>) -> Self {
        Self {
            body: None,
            ..Self::new(name, Vec::new())
        }
    }

    pub fn isolated(mut self) -> Self {
        self.isolated = true;
        self
    }

    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    pub fn param(mut self, name: impl Into<Name>, ty: Type) -> Self {
        self.params.push(Param::new(name, ty));
        self
    }

    pub fn returns(mut self, ty: Type) -> Self {
        self.ret = ty;
        self
    }

    pub fn at(mut self, pos: Pos) -> Self {
        self.pos = pos;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: Name,
    pub ty: Type,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub init: Option<Expr>,
    #[serde(default)]
    pub pos: Pos,
}

impl FieldDecl {
    pub fn new(name: impl Into<Name>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            is_final: false,
            private: false,
            init: None,
            pos: Pos::default(),
        }
    }

    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    pub fn final_(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn init(mut self, init: Expr) -> Self {
        self.init = Some(init);
        self
    }

    pub fn at(mut self, pos: Pos) -> Self {
        self.pos = pos;
        self
    }
}

/// Object (class) type declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDecl {
    pub name: Name,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub methods: Vec<FnDecl>,
    #[serde(default)]
    pub isolated: bool,
    /// Every field is final and immutable; values of the type are frozen.
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub pos: Pos,
}

impl ObjectDecl {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            methods: Vec::new(),
            isolated: false,
            readonly: false,
            pos: Pos::default(),
        }
    }

    pub fn isolated(mut self) -> Self {
        self.isolated = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: FnDecl) -> Self {
        self.methods.push(method);
        self
    }

    pub fn at(mut self, pos: Pos) -> Self {
        self.pos = pos;
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name.as_str() == name)
    }

    pub fn get_method(&self, name: &str) -> Option<&FnDecl> {
        self.methods.iter().find(|m| m.name.as_str() == name)
    }
}
