//! Lexically-scoped type analyzer, grounded in `original_source`'s type-check
//! pass but reshaped around a plain `Vec<FxHashMap<String, Type>>` scope
//! stack (the teacher's `mesh-typeck` scope-stack idiom, simplified to a
//! fixed six-member type algebra instead of Hindley-Milner inference: this
//! front end never unifies type variables, so there is nothing for a
//! `TyVar`/union-find layer to do).
//!
//! Most type errors are recoverable: the offending node is decorated
//! `unknown` (or left with its natural type) and every diagnostic is
//! collected as a warning, so one root cause does not cascade into a wall of
//! derived errors and the driver can still emit code around it. Same-scope
//! redefinition (of a variable or a function) is the one class that is
//! fatal, since there is no sound binding left to check the rest of the
//! scope against.

use rustc_hash::FxHashMap;

use glint_common::error::{CompileError, Stage};
use glint_common::{Diagnostic, Span, TokenKind, Type};
use glint_parser::ast::{Expr, FunctionDef, Item, SourceUnit, Stmt, TypeDecoration, TypeName, VariableDef};

/// A function's checked shape: parameter types in declaration order and the
/// declared return type (`None` for a function with no `returns` clause).
#[derive(Debug, Clone)]
struct FunctionSignature {
    params: Vec<Type>,
    return_type: Option<Type>,
    /// True for the host intrinsics (`printf`, `scanf`): any number of
    /// arguments past `params` is accepted, and argument types beyond the
    /// declared prefix go unchecked.
    variadic: bool,
}

pub struct TypeAnalyzer {
    functions: FxHashMap<String, FunctionSignature>,
    scopes: Vec<FxHashMap<String, Type>>,
    diagnostics: Vec<CompileError>,
}

impl TypeAnalyzer {
    /// Type-check a whole source unit, decorating every `Expr` node in
    /// place with its `natural_type`/`cast_type` and returning every
    /// diagnostic collected along the way.
    pub fn analyze(unit: &mut SourceUnit) -> Vec<CompileError> {
        let mut analyzer = TypeAnalyzer {
            functions: builtin_functions(),
            scopes: vec![FxHashMap::default()],
            diagnostics: Vec::new(),
        };
        analyzer.register_functions(unit);
        for item in &mut unit.items {
            analyzer.check_item(item);
        }
        analyzer.diagnostics
    }

    fn register_functions(&mut self, unit: &SourceUnit) {
        for item in &unit.items {
            if let Item::Function(f) = item {
                let sig = FunctionSignature {
                    params: f.params.iter().map(type_of_variable_def).collect(),
                    return_type: f.return_type.as_ref().and_then(type_of_type_name),
                    variadic: false,
                };
                if self.functions.insert(f.name.clone(), sig).is_some() {
                    self.error(f.span.clone(), format!("function `{}` is already defined", f.name), "duplicate definition");
                }
            }
        }
    }

    fn check_item(&mut self, item: &mut Item) {
        match item {
            Item::Function(f) => self.check_function(f),
            Item::VariableDef(v) => self.check_variable_def(v),
            Item::StructDef(_) => {}
        }
    }

    fn check_function(&mut self, f: &mut FunctionDef) {
        let return_type = f.return_type.as_ref().and_then(type_of_type_name);
        self.push_scope();
        for param in &mut f.params {
            self.check_variable_def(param);
        }
        for stmt in &mut f.body {
            self.check_stmt(stmt, return_type);
        }
        self.pop_scope();
    }

    fn check_stmt(&mut self, stmt: &mut Stmt, return_type: Option<Type>) {
        match stmt {
            Stmt::VariableDef(v) => self.check_variable_def(v),
            Stmt::StructDef(_) => {}
            Stmt::Return { expr, span } => {
                let actual = expr.as_mut().map(|e| self.check_expr(e));
                match (return_type, actual) {
                    (None, Some(t)) if t != Type::Unknown => {
                        self.warn(span.clone(), "a void function cannot return a value", "unexpected return value");
                    }
                    (Some(expected), None) => {
                        self.warn(span.clone(), format!("expected a return value of type {expected}"), "missing return value");
                    }
                    (Some(expected), Some(actual)) if actual != Type::Unknown && !assignable(expected, actual) => {
                        self.warn(span.clone(), format!("cannot return {actual} from a function declared to return {expected}"), "mismatched return type");
                    }
                    _ => {}
                }
            }
            Stmt::If { condition, then_branch, else_branch, .. } => {
                self.require_boolean(condition);
                self.push_scope();
                self.check_stmt(then_branch, return_type);
                self.pop_scope();
                if let Some(else_branch) = else_branch {
                    self.push_scope();
                    self.check_stmt(else_branch, return_type);
                    self.pop_scope();
                }
            }
            Stmt::While { condition, body, .. } => {
                self.require_boolean(condition);
                self.push_scope();
                self.check_stmt(body, return_type);
                self.pop_scope();
            }
            Stmt::For { init, condition, update, body, .. } => {
                self.push_scope();
                if let Some(init) = init {
                    self.check_stmt(init, return_type);
                }
                if let Some(condition) = condition {
                    self.require_boolean(condition);
                }
                if let Some(update) = update {
                    self.check_expr(update);
                }
                self.check_stmt(body, return_type);
                self.pop_scope();
            }
            Stmt::DoWhile { body, condition, .. } => {
                self.push_scope();
                self.check_stmt(body, return_type);
                self.pop_scope();
                self.require_boolean(condition);
            }
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty(_) => {}
            Stmt::Block(stmts) => {
                self.push_scope();
                for stmt in stmts {
                    self.check_stmt(stmt, return_type);
                }
                self.pop_scope();
            }
            Stmt::Expr(expr) => {
                self.check_expr(expr);
            }
        }
    }

    fn require_boolean(&mut self, condition: &mut Expr) {
        let ty = self.check_expr(condition);
        if ty != Type::Boolean && ty != Type::Unknown {
            self.warn(condition.span().clone(), format!("condition must be boolean, found {ty}"), "expected a boolean expression");
        }
    }

    fn check_variable_def(&mut self, v: &mut VariableDef) {
        match v {
            VariableDef::Plain { name, ty, init, span } => {
                let declared = type_of_type_name(ty).unwrap_or(Type::Unknown);
                if let Some(init) = init {
                    let init_ty = self.check_expr(init);
                    if declared != Type::Unknown && init_ty != Type::Unknown && !assignable(declared, init_ty) {
                        self.warn(span.clone(), format!("cannot initialize `{name}` of type {declared} with {init_ty}"), "type mismatch");
                    }
                    init.decoration_mut().cast_type = Some(declared);
                }
                self.declare(span.clone(), name.clone(), declared);
            }
            VariableDef::Array { name, ty, size, init, span } => {
                let declared = type_of_type_name(ty).unwrap_or(Type::Unknown);
                let size_ty = self.check_expr(size);
                if size_ty != Type::Integer && size_ty != Type::Unknown {
                    self.warn(size.span().clone(), "array size must be an integer", "expected an integer literal");
                }
                if let Some(init) = init {
                    let init_ty = self.check_expr(init);
                    if declared != Type::Unknown && init_ty != Type::Unknown && !assignable(declared, init_ty) {
                        self.warn(span.clone(), format!("cannot initialize `{name}` of type {declared} with {init_ty}"), "type mismatch");
                    }
                    init.decoration_mut().cast_type = Some(declared);
                }
                self.declare(span.clone(), name.clone(), declared);
            }
        }
    }

    fn check_expr(&mut self, expr: &mut Expr) -> Type {
        match expr {
            Expr::Identifier { name, decoration, span } => match self.lookup(name) {
                Some(ty) => decorate(decoration, ty),
                None => {
                    self.warn(span.clone(), format!("use of undeclared identifier `{name}`"), "not found in this scope");
                    decorate(decoration, Type::Unknown)
                }
            },
            Expr::BooleanLiteral { decoration, .. } => decorate(decoration, Type::Boolean),
            Expr::StringLiteral { decoration, .. } => decorate(decoration, Type::String),
            Expr::NumberLiteral { is_float, decoration, .. } => {
                decorate(decoration, if *is_float { Type::Double } else { Type::Integer })
            }
            Expr::Assignment { lhs, op, rhs, decoration, span } => {
                let lhs_ty = self.check_expr(lhs);
                let rhs_ty = self.check_expr(rhs);
                if !matches!(lhs.as_ref(), Expr::Identifier { .. } | Expr::IndexAccess { .. }) {
                    self.warn(span.clone(), "assignment target must be a variable or array element", "invalid assignment target");
                }
                if lhs_ty != Type::Unknown && rhs_ty != Type::Unknown && !assignable(lhs_ty, rhs_ty) {
                    self.warn(span.clone(), format!("cannot assign {rhs_ty} to a value of type {lhs_ty}"), format!("`{op:?}` requires a compatible right-hand side"));
                }
                rhs.decoration_mut().cast_type = Some(lhs_ty);
                decorate(decoration, lhs_ty)
            }
            Expr::BinaryOp { lhs, op, rhs, decoration, span } => {
                let lhs_ty = self.check_expr(lhs);
                let rhs_ty = self.check_expr(rhs);
                let result = self.check_binary_op(*op, lhs.as_mut(), rhs.as_mut(), lhs_ty, rhs_ty, span);
                decorate(decoration, result)
            }
            Expr::UnaryOp { op, expr: sub, is_prefix: _, decoration, span } => {
                let sub_ty = self.check_expr(sub);
                let result = self.check_unary_op(*op, sub, sub_ty, span);
                decorate(decoration, result)
            }
            Expr::IndexAccess { expr: base, index, decoration, span } => {
                let base_ty = self.check_expr(base);
                let index_ty = self.check_expr(index);
                if index_ty != Type::Integer && index_ty != Type::Unknown {
                    self.warn(span.clone(), format!("array index must be an integer, found {index_ty}"), "expected an integer index");
                }
                decorate(decoration, base_ty)
            }
            Expr::FunctionCall { callee, args, decoration, span } => {
                let result = self.check_call(callee, args, span);
                decorate(decoration, result)
            }
            Expr::MemberAccess { expr: base, decoration, .. } => {
                // Struct field types fall outside the six-member type algebra,
                // so member access always decorates `unknown` without error.
                self.check_expr(base);
                decorate(decoration, Type::Unknown)
            }
        }
    }

    fn check_call(&mut self, callee: &mut Expr, args: &mut [Expr], span: &Span) -> Type {
        let Expr::Identifier { name, .. } = callee else {
            self.check_expr(callee);
            for arg in args.iter_mut() {
                self.check_expr(arg);
            }
            self.warn(span.clone(), "only direct calls to a named function are supported", "expected a function name");
            return Type::Unknown;
        };
        let name = name.clone();
        let Some(sig) = self.functions.get(&name).cloned() else {
            for arg in args.iter_mut() {
                self.check_expr(arg);
            }
            self.warn(span.clone(), format!("call to undefined function `{name}`"), "not found in this scope");
            return Type::Unknown;
        };
        if sig.params.len() != args.len() && !(sig.variadic && args.len() >= sig.params.len()) {
            self.warn(
                span.clone(),
                format!("`{name}` expects {} argument(s), found {}", sig.params.len(), args.len()),
                "argument count mismatch",
            );
        }
        for (i, arg) in args.iter_mut().enumerate() {
            let arg_ty = self.check_expr(arg);
            // Arguments past the declared prefix of a variadic function (the
            // `...` in `printf`/`scanf`) are passed through unchecked.
            if let Some(&expected) = sig.params.get(i) {
                if expected != Type::Unknown && arg_ty != Type::Unknown && !assignable(expected, arg_ty) {
                    self.warn(
                        arg.span().clone(),
                        format!("argument {} to `{name}` has type {arg_ty}, expected {expected}", i + 1),
                        "argument type mismatch",
                    );
                }
                arg.decoration_mut().cast_type = Some(expected);
            }
        }
        sig.return_type.unwrap_or(Type::Unknown)
    }

    fn check_binary_op(&mut self, op: TokenKind, lhs: &mut Expr, rhs: &mut Expr, lhs_ty: Type, rhs_ty: Type, span: &Span) -> Type {
        use TokenKind::*;
        match op {
            Or | And => self.check_logical_pair(lhs, rhs, lhs_ty, rhs_ty, span),
            Eq | NotEq | Lt | Gt | LtEq | GtEq => {
                let ok = (lhs_ty == Type::String && rhs_ty == Type::String)
                    || (lhs_ty.is_numeric() && rhs_ty.is_numeric())
                    || (lhs_ty == Type::Boolean && rhs_ty == Type::Boolean);
                if !ok && lhs_ty != Type::Unknown && rhs_ty != Type::Unknown {
                    self.warn(span.clone(), format!("cannot compare {lhs_ty} with {rhs_ty}"), "incompatible operand types");
                }
                Type::Boolean
            }
            BitOr | BitXor | BitAnd | Shl | Sar | Shr => {
                if lhs_ty != Type::Integer && lhs_ty != Type::Unknown {
                    self.warn(lhs.span().clone(), format!("bitwise operator requires an integer, found {lhs_ty}"), "expected integer");
                }
                if rhs_ty != Type::Integer && rhs_ty != Type::Unknown {
                    self.warn(rhs.span().clone(), format!("bitwise operator requires an integer, found {rhs_ty}"), "expected integer");
                }
                Type::Integer
            }
            Add | Sub | Mul | Div | Exp => self.check_arithmetic_pair(lhs, rhs, lhs_ty, rhs_ty, span),
            Mod => {
                if lhs_ty != Type::Integer && lhs_ty != Type::Unknown {
                    self.warn(lhs.span().clone(), format!("`%` requires an integer, found {lhs_ty}"), "expected integer");
                }
                if rhs_ty != Type::Integer && rhs_ty != Type::Unknown {
                    self.warn(rhs.span().clone(), format!("`%` requires an integer, found {rhs_ty}"), "expected integer");
                }
                Type::Integer
            }
            // Below the parser's minimum binary precedence; never actually produced.
            CommaOp => Type::Unknown,
            _ => Type::Unknown,
        }
    }

    fn check_logical_pair(&mut self, lhs: &mut Expr, rhs: &mut Expr, lhs_ty: Type, rhs_ty: Type, span: &Span) -> Type {
        for (operand, ty) in [(lhs, lhs_ty), (rhs, rhs_ty)] {
            if ty == Type::String {
                self.warn(span.clone(), format!("logical operator cannot take a {ty} operand"), "expected a non-string operand");
            } else if ty != Type::Boolean && ty != Type::Unknown {
                operand.decoration_mut().cast_type = Some(Type::Boolean);
            }
        }
        Type::Boolean
    }

    fn check_arithmetic_pair(&mut self, lhs: &mut Expr, rhs: &mut Expr, lhs_ty: Type, rhs_ty: Type, span: &Span) -> Type {
        if lhs_ty == Type::Unknown || rhs_ty == Type::Unknown {
            return Type::Unknown;
        }
        match promote(lhs_ty, rhs_ty) {
            Some(result) => {
                if lhs_ty != result {
                    lhs.decoration_mut().cast_type = Some(result);
                }
                if rhs_ty != result {
                    rhs.decoration_mut().cast_type = Some(result);
                }
                result
            }
            None => {
                self.warn(span.clone(), format!("arithmetic between {lhs_ty} and {rhs_ty} is not allowed"), "expected numeric operands");
                Type::Unknown
            }
        }
    }

    fn check_unary_op(&mut self, op: TokenKind, sub: &mut Expr, sub_ty: Type, span: &Span) -> Type {
        use TokenKind::*;
        match op {
            Not => {
                if sub_ty == Type::String {
                    self.warn(span.clone(), format!("`!` cannot take a {sub_ty} operand"), "expected a non-string operand");
                } else if sub_ty != Type::Boolean && sub_ty != Type::Unknown {
                    sub.decoration_mut().cast_type = Some(Type::Boolean);
                }
                Type::Boolean
            }
            BitNot => {
                if sub_ty != Type::Integer && sub_ty != Type::Unknown {
                    self.warn(span.clone(), format!("`~` requires an integer, found {sub_ty}"), "expected integer");
                    return Type::Unknown;
                }
                Type::Integer
            }
            Inc | Dec | Sub => {
                if !sub_ty.is_numeric() && sub_ty != Type::Unknown {
                    self.warn(span.clone(), format!("operator requires a numeric operand, found {sub_ty}"), "expected a numeric operand");
                    return Type::Unknown;
                }
                sub_ty
            }
            // `delete` is tokenized but carries no defined type-check rule.
            _ => Type::Unknown,
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, span: Span, name: String, ty: Type) {
        let scope = self.scopes.last_mut().expect("at least the global scope is always present");
        if scope.contains_key(&name) {
            self.error(span, format!("`{name}` is already defined in this scope"), "duplicate definition");
            return;
        }
        scope.insert(name, ty);
    }

    fn lookup(&self, name: &str) -> Option<Type> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name).copied())
    }

    /// Fatal: the run must stop here. Reserved for same-scope redefinition
    /// (of a variable or a function), the only Type-stage error class that
    /// leaves no sound way to keep checking or emitting code.
    fn error(&mut self, span: Span, message: impl Into<String>, label: impl Into<String>) {
        self.diagnostics.push(CompileError::new(Stage::TypeCheck, Diagnostic::error(span, message, label)));
    }

    /// Recoverable: the offending node is decorated `unknown` (or left with
    /// its natural type) and checking continues. The driver prints these and
    /// still emits code, skipping only the store/use the bad node would have
    /// produced.
    fn warn(&mut self, span: Span, message: impl Into<String>, label: impl Into<String>) {
        self.diagnostics.push(CompileError::new(Stage::TypeCheck, Diagnostic::warning(span, message, label)));
    }
}

/// The host intrinsics the emitter declares with C linkage (see
/// `glint-codegen`'s `intrinsics` module): known to the analyzer as
/// variadic functions so calls to them by name type-check without a
/// corresponding user-level declaration.
fn builtin_functions() -> FxHashMap<String, FunctionSignature> {
    let mut functions = FxHashMap::default();
    functions.insert(
        "printf".to_string(),
        FunctionSignature { params: vec![Type::String], return_type: Some(Type::Integer), variadic: true },
    );
    functions.insert(
        "scanf".to_string(),
        FunctionSignature { params: vec![Type::String], return_type: Some(Type::Integer), variadic: true },
    );
    functions
}

fn decorate(decoration: &mut TypeDecoration, ty: Type) -> Type {
    decoration.natural_type = Some(ty);
    decoration.cast_type = Some(ty);
    ty
}

fn type_of_type_name(ty: &TypeName) -> Option<Type> {
    match ty.token {
        TokenKind::Int | TokenKind::UInt | TokenKind::IntM | TokenKind::UIntM => Some(Type::Integer),
        TokenKind::Bool => Some(Type::Boolean),
        TokenKind::Float => Some(Type::Float),
        TokenKind::Double => Some(Type::Double),
        TokenKind::StringType => Some(Type::String),
        _ => None,
    }
}

fn type_of_variable_def(v: &VariableDef) -> Type {
    let ty = match v {
        VariableDef::Plain { ty, .. } | VariableDef::Array { ty, .. } => ty,
    };
    type_of_type_name(ty).unwrap_or(Type::Unknown)
}

/// Promotion lattice for arithmetic: narrower numeric side is promoted to
/// the wider one; non-numeric pairs have no promotion.
fn promote(a: Type, b: Type) -> Option<Type> {
    use Type::*;
    match (a, b) {
        (Integer, Integer) => Some(Integer),
        (Integer, Float) | (Float, Integer) => Some(Float),
        (Integer, Double) | (Double, Integer) => Some(Double),
        (Float, Double) | (Double, Float) => Some(Double),
        (Float, Float) => Some(Float),
        (Double, Double) => Some(Double),
        _ => None,
    }
}

/// Is a value of type `from` assignable into a slot of type `to` under the
/// promotion lattice? Exact matches always are; otherwise both sides must be
/// numeric (implicit widening/narrowing), matching spec's assignment rule.
fn assignable(to: Type, from: Type) -> bool {
    to == from || (to.is_numeric() && from.is_numeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_common::Severity;
    use glint_lexer::Lexer;
    use glint_parser::Parser;
    use std::path::PathBuf;

    fn analyze(src: &str) -> (SourceUnit, Vec<CompileError>) {
        let line = glint_common::Line::new(format!("{src}\n"), PathBuf::from("t.sol"), 1, None);
        let stream = glint_common::CharStream::new(vec![line]);
        let tokens = Lexer::tokenize(&stream).unwrap();
        let mut unit = Parser::parse_source_unit(&tokens).unwrap();
        let diagnostics = TypeAnalyzer::analyze(&mut unit);
        (unit, diagnostics)
    }

    #[test]
    fn integer_plus_double_promotes_to_double() {
        let (unit, diags) = analyze("function f() { double x; x = 1 + 2.0; }");
        assert!(diags.is_empty(), "{diags:?}");
        let Item::Function(f) = &unit.items[0] else { panic!() };
        let Stmt::Expr(Expr::Assignment { rhs, .. }) = &f.body[1] else { panic!() };
        assert_eq!(rhs.decoration().natural_type, Some(Type::Double));
    }

    #[test]
    fn boolean_arithmetic_is_an_error() {
        let (_, diags) = analyze("function f() { bool b; int x; x = b + 1; }");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn undeclared_identifier_is_an_error_and_does_not_cascade() {
        let (unit, diags) = analyze("function f() { int x; x = y + 1; }");
        assert_eq!(diags.len(), 1);
        let Item::Function(f) = &unit.items[0] else { panic!() };
        let Stmt::Expr(Expr::Assignment { rhs, .. }) = &f.body[1] else { panic!() };
        assert_eq!(rhs.decoration().natural_type, Some(Type::Unknown));
    }

    #[test]
    fn if_condition_must_be_boolean() {
        let (_, diags) = analyze("function f() { if (1) { } }");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn non_boolean_logical_operand_gets_a_boolean_cast() {
        let (unit, diags) = analyze("function f() { int x; bool b; b = x || true; }");
        assert!(diags.is_empty(), "{diags:?}");
        let Item::Function(f) = &unit.items[0] else { panic!() };
        let Stmt::Expr(Expr::Assignment { rhs, .. }) = &f.body[2] else { panic!() };
        let Expr::BinaryOp { lhs, .. } = rhs.as_ref() else { panic!() };
        assert_eq!(lhs.decoration().cast_type, Some(Type::Boolean));
    }

    #[test]
    fn function_call_argument_types_are_checked() {
        let (_, diags) = analyze("function g(int a) { } function f() { bool b; g(b); }");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn function_call_argument_count_is_checked() {
        let (_, diags) = analyze("function g(int a) { } function f() { g(); }");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn void_function_cannot_return_a_value() {
        let (_, diags) = analyze("function f() { return 1; }");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn unary_minus_requires_numeric_operand() {
        let (_, diags) = analyze("function f() { string s; s = -s; }");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn same_scope_variable_redefinition_is_fatal() {
        let (_, diags) = analyze("function f() { int x; bool x; }");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].diagnostic.severity, Severity::Error);
    }

    #[test]
    fn a_recoverable_error_is_a_warning_not_a_fatal_error() {
        let (_, diags) = analyze("function f() { bool b; int x; x = b + 1; }");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].diagnostic.severity, Severity::Warning);
    }
}
