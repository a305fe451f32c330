//! The AST: a closed sum with a discriminator field, grounded in
//! `original_source/include/parser/Ast.h`'s class hierarchy but reshaped
//! into plain `enum`s with `Box`/`Vec`-owned children instead of a
//! `shared_ptr`-based object graph.

use glint_common::{Span, TokenKind, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Default,
    Private,
    Internal,
    Public,
    External,
}

pub fn visibility_from_token(tok: TokenKind) -> Option<Visibility> {
    match tok {
        TokenKind::Private => Some(Visibility::Private),
        TokenKind::Internal => Some(Visibility::Internal),
        TokenKind::Public => Some(Visibility::Public),
        TokenKind::External => Some(Visibility::External),
        _ => None,
    }
}

/// An elementary type name: the keyword token plus, for `intM`/`uintM`
/// forms, the explicit bit width (`int8`..`int256`).
#[derive(Debug, Clone)]
pub struct TypeName {
    pub token: TokenKind,
    pub width: Option<u16>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone)]
pub enum Item {
    Function(FunctionDef),
    VariableDef(VariableDef),
    StructDef(StructDef),
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<VariableDef>,
    pub visibility: Visibility,
    pub return_type: Option<TypeName>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub members: Vec<VariableDef>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum VariableDef {
    Plain {
        name: String,
        ty: TypeName,
        init: Option<Expr>,
        span: Span,
    },
    Array {
        name: String,
        ty: TypeName,
        size: Box<Expr>,
        init: Option<Expr>,
        span: Span,
    },
}

impl VariableDef {
    pub fn name(&self) -> &str {
        match self {
            VariableDef::Plain { name, .. } | VariableDef::Array { name, .. } => name,
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            VariableDef::Plain { span, .. } | VariableDef::Array { span, .. } => span,
        }
    }
}

pub type Block = Vec<Stmt>;

#[derive(Debug, Clone)]
pub enum Stmt {
    VariableDef(VariableDef),
    StructDef(StructDef),
    Return {
        expr: Option<Expr>,
        span: Span,
    },
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
        span: Span,
    },
    DoWhile {
        body: Box<Stmt>,
        condition: Expr,
        span: Span,
    },
    Break(Span),
    Continue(Span),
    Expr(Expr),
    Block(Block),
    Empty(Span),
}

/// Type decoration filled in by the analyzer: `natural_type` is the type
/// the expression would have on its own, `cast_type` is what its parent
/// context coerces it to. `cast_type == natural_type` until the analyzer
/// says otherwise.
#[derive(Debug, Clone, Default)]
pub struct TypeDecoration {
    pub natural_type: Option<Type>,
    pub cast_type: Option<Type>,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Identifier {
        name: String,
        decoration: TypeDecoration,
        span: Span,
    },
    BooleanLiteral {
        value: bool,
        decoration: TypeDecoration,
        span: Span,
    },
    StringLiteral {
        value: String,
        decoration: TypeDecoration,
        span: Span,
    },
    NumberLiteral {
        text: String,
        is_float: bool,
        decoration: TypeDecoration,
        span: Span,
    },
    Assignment {
        lhs: Box<Expr>,
        op: TokenKind,
        rhs: Box<Expr>,
        decoration: TypeDecoration,
        span: Span,
    },
    BinaryOp {
        lhs: Box<Expr>,
        op: TokenKind,
        rhs: Box<Expr>,
        decoration: TypeDecoration,
        span: Span,
    },
    UnaryOp {
        op: TokenKind,
        expr: Box<Expr>,
        is_prefix: bool,
        decoration: TypeDecoration,
        span: Span,
    },
    IndexAccess {
        expr: Box<Expr>,
        index: Box<Expr>,
        decoration: TypeDecoration,
        span: Span,
    },
    FunctionCall {
        callee: Box<Expr>,
        args: Vec<Expr>,
        decoration: TypeDecoration,
        span: Span,
    },
    MemberAccess {
        expr: Box<Expr>,
        member: String,
        decoration: TypeDecoration,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> &Span {
        match self {
            Expr::Identifier { span, .. }
            | Expr::BooleanLiteral { span, .. }
            | Expr::StringLiteral { span, .. }
            | Expr::NumberLiteral { span, .. }
            | Expr::Assignment { span, .. }
            | Expr::BinaryOp { span, .. }
            | Expr::UnaryOp { span, .. }
            | Expr::IndexAccess { span, .. }
            | Expr::FunctionCall { span, .. }
            | Expr::MemberAccess { span, .. } => span,
        }
    }

    pub fn decoration(&self) -> &TypeDecoration {
        match self {
            Expr::Identifier { decoration, .. }
            | Expr::BooleanLiteral { decoration, .. }
            | Expr::StringLiteral { decoration, .. }
            | Expr::NumberLiteral { decoration, .. }
            | Expr::Assignment { decoration, .. }
            | Expr::BinaryOp { decoration, .. }
            | Expr::UnaryOp { decoration, .. }
            | Expr::IndexAccess { decoration, .. }
            | Expr::FunctionCall { decoration, .. }
            | Expr::MemberAccess { decoration, .. } => decoration,
        }
    }

    pub fn decoration_mut(&mut self) -> &mut TypeDecoration {
        match self {
            Expr::Identifier { decoration, .. }
            | Expr::BooleanLiteral { decoration, .. }
            | Expr::StringLiteral { decoration, .. }
            | Expr::NumberLiteral { decoration, .. }
            | Expr::Assignment { decoration, .. }
            | Expr::BinaryOp { decoration, .. }
            | Expr::UnaryOp { decoration, .. }
            | Expr::IndexAccess { decoration, .. }
            | Expr::FunctionCall { decoration, .. }
            | Expr::MemberAccess { decoration, .. } => decoration,
        }
    }
}
