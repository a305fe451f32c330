//! AST dump for `--dump-ast`, grounded in `original_source/include/parser/Ast.h`'s
//! `Dump`/`printIndent`/`astColor` tree-printing, reshaped into a `Display`
//! impl over an explicit `Vec<bool>` "is this ancestor the last child"
//! stack instead of the original's bitmask.

use std::fmt;

use crate::ast::*;

const COLORS: [&str; 5] = [
    "\x1b[32m", // green
    "\x1b[33m", // yellow
    "\x1b[34m", // blue
    "\x1b[35m", // magenta
    "\x1b[36m", // cyan
];
const RESET: &str = "\x1b[0m";

pub struct Dump<'a>(pub &'a SourceUnit);

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = Printer { f, depth: 0, ancestors_open: Vec::new() };
        printer.node("SourceUnit", "")?;
        let n = self.0.items.len();
        for (i, item) in self.0.items.iter().enumerate() {
            printer.child(i + 1 == n, |p| p.item(item))?;
        }
        Ok(())
    }
}

struct Printer<'a, 'b> {
    f: &'a mut fmt::Formatter<'b>,
    depth: usize,
    ancestors_open: Vec<bool>,
}

impl Printer<'_, '_> {
    fn node(&mut self, label: &str, detail: &str) -> fmt::Result {
        let color = COLORS[self.depth % COLORS.len()];
        for (i, open) in self.ancestors_open.iter().enumerate() {
            if i + 1 == self.ancestors_open.len() {
                write!(self.f, "{}", if *open { "├─" } else { "└─" })?;
            } else {
                write!(self.f, "{}", if *open { "│ " } else { "  " })?;
            }
        }
        if detail.is_empty() {
            writeln!(self.f, "{color}{label}{RESET}")
        } else {
            writeln!(self.f, "{color}{label}{RESET} {detail}")
        }
    }

    fn child(&mut self, is_last: bool, body: impl FnOnce(&mut Self) -> fmt::Result) -> fmt::Result {
        self.ancestors_open.push(!is_last);
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        self.ancestors_open.pop();
        result
    }

    fn item(&mut self, item: &Item) -> fmt::Result {
        match item {
            Item::Function(f) => self.function_def(f),
            Item::VariableDef(v) => self.variable_def(v),
            Item::StructDef(s) => self.struct_def(s),
        }
    }

    fn function_def(&mut self, f: &FunctionDef) -> fmt::Result {
        self.node("FunctionDef", &format!("{} {:?}", f.name, f.visibility))?;
        let n = f.params.len() + f.body.len();
        let mut i = 0;
        for param in &f.params {
            i += 1;
            self.child(i != n, |p| p.variable_def(param))?;
        }
        for stmt in &f.body {
            i += 1;
            self.child(i != n, |p| p.stmt(stmt))?;
        }
        Ok(())
    }

    fn struct_def(&mut self, s: &StructDef) -> fmt::Result {
        self.node("StructDef", &s.name)?;
        let n = s.members.len();
        for (i, member) in s.members.iter().enumerate() {
            self.child(i + 1 != n, |p| p.variable_def(member))?;
        }
        Ok(())
    }

    fn variable_def(&mut self, v: &VariableDef) -> fmt::Result {
        match v {
            VariableDef::Plain { name, ty, init, .. } => {
                self.node("VariableDef", &format!("{name}: {:?}", ty.token))?;
                if let Some(init) = init {
                    self.child(false, |p| p.expr(init))?;
                }
            }
            VariableDef::Array { name, ty, size, init, .. } => {
                self.node("ArrayVariableDef", &format!("{name}: {:?}[]", ty.token))?;
                let has_init = init.is_some();
                self.child(has_init, |p| p.expr(size))?;
                if let Some(init) = init {
                    self.child(false, |p| p.expr(init))?;
                }
            }
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> fmt::Result {
        match stmt {
            Stmt::VariableDef(v) => self.variable_def(v),
            Stmt::StructDef(s) => self.struct_def(s),
            Stmt::Return { expr, .. } => {
                self.node("ReturnStatement", "")?;
                if let Some(expr) = expr {
                    self.child(false, |p| p.expr(expr))?;
                }
                Ok(())
            }
            Stmt::If { condition, then_branch, else_branch, .. } => {
                self.node("IfStatement", "")?;
                let has_else = else_branch.is_some();
                self.child(true, |p| p.expr(condition))?;
                self.child(has_else, |p| p.stmt(then_branch))?;
                if let Some(else_branch) = else_branch {
                    self.child(false, |p| p.stmt(else_branch))?;
                }
                Ok(())
            }
            Stmt::While { condition, body, .. } => {
                self.node("WhileStatement", "")?;
                self.child(true, |p| p.expr(condition))?;
                self.child(false, |p| p.stmt(body))
            }
            Stmt::For { init, condition, update, body, .. } => {
                self.node("ForStatement", "")?;
                if let Some(init) = init {
                    self.child(true, |p| p.stmt(init))?;
                }
                if let Some(condition) = condition {
                    self.child(true, |p| p.expr(condition))?;
                }
                if let Some(update) = update {
                    self.child(true, |p| p.expr(update))?;
                }
                self.child(false, |p| p.stmt(body))
            }
            Stmt::DoWhile { body, condition, .. } => {
                self.node("DoWhileStatement", "")?;
                self.child(true, |p| p.stmt(body))?;
                self.child(false, |p| p.expr(condition))
            }
            Stmt::Break(_) => self.node("BreakStatement", ""),
            Stmt::Continue(_) => self.node("ContinueStatement", ""),
            Stmt::Empty(_) => self.node("EmptyStatement", ""),
            Stmt::Block(stmts) => {
                self.node("Block", "")?;
                let n = stmts.len();
                for (i, s) in stmts.iter().enumerate() {
                    self.child(i + 1 != n, |p| p.stmt(s))?;
                }
                Ok(())
            }
            Stmt::Expr(e) => {
                self.node("ExpressionStatement", "")?;
                self.child(false, |p| p.expr(e))
            }
        }
    }

    fn expr(&mut self, expr: &Expr) -> fmt::Result {
        match expr {
            Expr::Identifier { name, .. } => self.node("Identifier", name),
            Expr::BooleanLiteral { value, .. } => self.node("BooleanLiteral", &value.to_string()),
            Expr::StringLiteral { value, .. } => self.node("StringLiteral", value),
            Expr::NumberLiteral { text, .. } => self.node("NumberLiteral", text),
            Expr::Assignment { lhs, op, rhs, .. } => {
                self.node("Assignment", &format!("{op:?}"))?;
                self.child(true, |p| p.expr(lhs))?;
                self.child(false, |p| p.expr(rhs))
            }
            Expr::BinaryOp { lhs, op, rhs, .. } => {
                self.node("BinaryOp", &format!("{op:?}"))?;
                self.child(true, |p| p.expr(lhs))?;
                self.child(false, |p| p.expr(rhs))
            }
            Expr::UnaryOp { op, expr, is_prefix, .. } => {
                self.node("UnaryOp", &format!("{op:?} prefix={is_prefix}"))?;
                self.child(false, |p| p.expr(expr))
            }
            Expr::IndexAccess { expr, index, .. } => {
                self.node("IndexAccess", "")?;
                self.child(true, |p| p.expr(expr))?;
                self.child(false, |p| p.expr(index))
            }
            Expr::FunctionCall { callee, args, .. } => {
                self.node("FunctionCall", "")?;
                let n = args.len();
                self.child(n != 0, |p| p.expr(callee))?;
                for (i, arg) in args.iter().enumerate() {
                    self.child(i + 1 != n, |p| p.expr(arg))?;
                }
                Ok(())
            }
            Expr::MemberAccess { expr, member, .. } => {
                self.node("MemberAccess", member)?;
                self.child(false, |p| p.expr(expr))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_lexer::Lexer;
    use std::path::PathBuf;

    #[test]
    fn dump_renders_nested_structure() {
        let line = glint_common::Line::new("function f() { int x = 1 + 2; }\n".into(), PathBuf::from("t.sol"), 1, None);
        let stream = glint_common::CharStream::new(vec![line]);
        let tokens = Lexer::tokenize(&stream).unwrap();
        let unit = crate::Parser::parse_source_unit(&tokens).unwrap();
        let rendered = format!("{}", Dump(&unit));
        assert!(rendered.contains("FunctionDef"));
        assert!(rendered.contains("BinaryOp"));
        assert!(rendered.contains("├─") || rendered.contains("└─"));
    }
}
