//! Statement and function emission, grounded in `mesh-codegen/src/codegen/mod.rs`'s
//! `compile_function`/terminator-fixup discipline, but reshaped around plain
//! structured control flow (if/while/for/do-while) instead of expression-based
//! MIR blocks.

use inkwell::types::{BasicMetadataTypeEnum, BasicType};

use glint_common::error::Result;
use glint_common::{TokenKind, Type};
use glint_parser::ast::{FunctionDef, Item, SourceUnit, Stmt, TypeName, VariableDef};

use crate::types::{llvm_type, zero_value};
use crate::CodeGen;

/// Resolve a surface type name to the closed `Type` lattice. Unrecognized
/// tokens fall back to `Unknown`; by the time codegen runs the analyzer has
/// already reported any such case as a diagnostic, so this is unreachable in
/// a program free of type errors.
fn resolve_type(ty: &TypeName) -> Type {
    match ty.token {
        TokenKind::Int | TokenKind::UInt | TokenKind::IntM | TokenKind::UIntM => Type::Integer,
        TokenKind::Bool => Type::Boolean,
        TokenKind::Float => Type::Float,
        TokenKind::Double => Type::Double,
        TokenKind::StringType => Type::String,
        _ => Type::Unknown,
    }
}

impl<'ctx> CodeGen<'ctx> {
    /// Forward-declare every function so calls can resolve regardless of
    /// definition order (including mutual recursion). A name collision was
    /// already reported by the analyzer; codegen just keeps the first
    /// declaration and moves on.
    pub(crate) fn declare_functions(&mut self, unit: &SourceUnit) -> Result<()> {
        for item in &unit.items {
            let Item::Function(f) = item else { continue };
            if self.functions.contains_key(&f.name) {
                continue;
            }
            let param_types: Vec<BasicMetadataTypeEnum> = f
                .params
                .iter()
                .map(|p| llvm_type(self.context, resolve_type(type_name_of(p))).into())
                .collect();
            let fn_type = match f.return_type.as_ref() {
                Some(ty) => llvm_type(self.context, resolve_type(ty)).fn_type(&param_types, false),
                None => self.context.void_type().fn_type(&param_types, false),
            };
            let function = self.module.add_function(&f.name, fn_type, None);
            for (param, def) in function.get_param_iter().zip(&f.params) {
                param.set_name(def.name());
            }
            self.functions.insert(f.name.clone(), function);
        }
        Ok(())
    }

    pub(crate) fn emit_function(&mut self, f: &FunctionDef) -> Result<()> {
        let function = *self.functions.get(&f.name).expect("declare_functions ran before emit_function");
        self.current_function = Some(function);
        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);
        self.push_frame();

        for (param, def) in function.get_param_iter().zip(&f.params) {
            let ty = resolve_type(type_name_of(def));
            let llvm_ty = llvm_type(self.context, ty);
            let ptr = self
                .builder
                .build_alloca(llvm_ty, def.name())
                .map_err(|e| self.codegen_error(def.span(), e.to_string(), "failed to allocate parameter"))?;
            self.builder
                .build_store(ptr, param)
                .map_err(|e| self.codegen_error(def.span(), e.to_string(), "failed to store parameter"))?;
            self.declare(def.name().to_string(), ptr, llvm_ty);
        }

        for stmt in &f.body {
            self.emit_stmt(stmt)?;
        }

        let current_block = self.builder.get_insert_block().expect("a block is always active while emitting a function body");
        if current_block.get_terminator().is_none() {
            match f.return_type.as_ref() {
                None => {
                    self.builder.build_return(None).map_err(|e| self.codegen_error(&f.span, e.to_string(), "failed to emit return"))?;
                }
                Some(ty) => {
                    let fallback = zero_value(self.context, resolve_type(ty));
                    self.builder
                        .build_return(Some(&fallback))
                        .map_err(|e| self.codegen_error(&f.span, e.to_string(), "failed to emit return"))?;
                }
            }
        }

        self.pop_frame();
        self.current_function = None;
        if !function.verify(false) {
            tracing::warn!(function = %f.name, "generated function failed LLVM verification");
        }
        Ok(())
    }

    pub(crate) fn emit_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::VariableDef(v) => self.emit_variable_def(v),
            Stmt::StructDef(s) => {
                tracing::warn!(name = %s.name, "struct definitions do not lower to IR");
                Ok(())
            }
            Stmt::Return { expr, .. } => {
                match expr {
                    Some(e) => {
                        let value = self.emit_expr(e)?;
                        self.set_return_value(value);
                        self.builder.build_return(Some(&value))
                    }
                    None => self.builder.build_return(None),
                }
                .map_err(|e| self.codegen_error(stmt_span(stmt), e.to_string(), "failed to emit return"))?;
                Ok(())
            }
            Stmt::If { condition, then_branch, else_branch, span } => self.emit_if(condition, then_branch, else_branch.as_deref(), span),
            Stmt::While { condition, body, span } => self.emit_while(condition, body, span),
            Stmt::For { init, condition, update, body, span } => self.emit_for(init.as_deref(), condition.as_ref(), update.as_ref(), body, span),
            Stmt::DoWhile { body, condition, span } => self.emit_do_while(body, condition, span),
            Stmt::Break(span) => {
                let (_, break_target) = *self.loop_stack.last().ok_or_else(|| self.codegen_error(span, "`break` outside a loop", "not inside a loop"))?;
                self.builder.build_unconditional_branch(break_target).map_err(|e| self.codegen_error(span, e.to_string(), "failed to emit break"))?;
                Ok(())
            }
            Stmt::Continue(span) => {
                let (continue_target, _) = *self.loop_stack.last().ok_or_else(|| self.codegen_error(span, "`continue` outside a loop", "not inside a loop"))?;
                self.builder.build_unconditional_branch(continue_target).map_err(|e| self.codegen_error(span, e.to_string(), "failed to emit continue"))?;
                Ok(())
            }
            Stmt::Expr(e) => {
                self.emit_expr(e)?;
                Ok(())
            }
            Stmt::Block(stmts) => {
                self.push_frame();
                for inner in stmts {
                    self.emit_stmt(inner)?;
                }
                self.pop_frame();
                Ok(())
            }
            Stmt::Empty(_) => Ok(()),
        }
    }

    fn emit_variable_def(&mut self, v: &VariableDef) -> Result<()> {
        match v {
            VariableDef::Plain { name, ty, init, span } => {
                let resolved = resolve_type(ty);
                let llvm_ty = llvm_type(self.context, resolved);
                let ptr = self.builder.build_alloca(llvm_ty, name).map_err(|e| self.codegen_error(span, e.to_string(), "failed to allocate"))?;
                let value = match init {
                    Some(expr) => self.emit_expr(expr)?,
                    None => zero_value(self.context, resolved),
                };
                self.builder.build_store(ptr, value).map_err(|e| self.codegen_error(span, e.to_string(), "failed to store initializer"))?;
                self.declare(name.clone(), ptr, llvm_ty);
                Ok(())
            }
            VariableDef::Array { name, ty, size, init, span } => {
                let resolved = resolve_type(ty);
                let elem_ty = llvm_type(self.context, resolved);
                let size_value = self.emit_expr(size)?.into_int_value();
                let ptr = self
                    .builder
                    .build_array_alloca(elem_ty, size_value, name)
                    .map_err(|e| self.codegen_error(span, e.to_string(), "failed to allocate array"))?;
                // `init`, when present, initializes element 0 only; glint has
                // no array-literal syntax for a full-array initializer.
                if let Some(expr) = init {
                    let value = self.emit_expr(expr)?;
                    self.builder.build_store(ptr, value).map_err(|e| self.codegen_error(span, e.to_string(), "failed to store initializer"))?;
                }
                self.declare(name.clone(), ptr, elem_ty);
                Ok(())
            }
        }
    }

    fn emit_if(&mut self, condition: &glint_parser::ast::Expr, then_branch: &Stmt, else_branch: Option<&Stmt>, span: &glint_common::Span) -> Result<()> {
        let function = self.current_function.expect("`if` only appears inside a function body");
        let cond_value = self.emit_expr(condition)?.into_int_value();

        let then_block = self.context.append_basic_block(function, "if.then");
        let else_block = self.context.append_basic_block(function, "if.else");
        let merge_block = self.context.append_basic_block(function, "if.merge");

        self.builder
            .build_conditional_branch(cond_value, then_block, else_block)
            .map_err(|e| self.codegen_error(span, e.to_string(), "failed to branch"))?;

        self.builder.position_at_end(then_block);
        self.emit_stmt(then_branch)?;
        if self.builder.get_insert_block().unwrap().get_terminator().is_none() {
            self.builder.build_unconditional_branch(merge_block).map_err(|e| self.codegen_error(span, e.to_string(), "failed to branch"))?;
        }

        self.builder.position_at_end(else_block);
        if let Some(else_branch) = else_branch {
            self.emit_stmt(else_branch)?;
        }
        if self.builder.get_insert_block().unwrap().get_terminator().is_none() {
            self.builder.build_unconditional_branch(merge_block).map_err(|e| self.codegen_error(span, e.to_string(), "failed to branch"))?;
        }

        self.builder.position_at_end(merge_block);
        Ok(())
    }

    fn emit_while(&mut self, condition: &glint_parser::ast::Expr, body: &Stmt, span: &glint_common::Span) -> Result<()> {
        let function = self.current_function.expect("`while` only appears inside a function body");
        let cond_block = self.context.append_basic_block(function, "while.cond");
        let body_block = self.context.append_basic_block(function, "while.body");
        let after_block = self.context.append_basic_block(function, "while.after");

        self.builder.build_unconditional_branch(cond_block).map_err(|e| self.codegen_error(span, e.to_string(), "failed to branch"))?;

        self.builder.position_at_end(cond_block);
        let cond_value = self.emit_expr(condition)?.into_int_value();
        self.builder
            .build_conditional_branch(cond_value, body_block, after_block)
            .map_err(|e| self.codegen_error(span, e.to_string(), "failed to branch"))?;

        self.loop_stack.push((cond_block, after_block));
        self.builder.position_at_end(body_block);
        self.emit_stmt(body)?;
        if self.builder.get_insert_block().unwrap().get_terminator().is_none() {
            self.builder.build_unconditional_branch(cond_block).map_err(|e| self.codegen_error(span, e.to_string(), "failed to branch"))?;
        }
        self.loop_stack.pop();

        self.builder.position_at_end(after_block);
        Ok(())
    }

    fn emit_for(
        &mut self,
        init: Option<&Stmt>,
        condition: Option<&glint_parser::ast::Expr>,
        update: Option<&glint_parser::ast::Expr>,
        body: &Stmt,
        span: &glint_common::Span,
    ) -> Result<()> {
        let function = self.current_function.expect("`for` only appears inside a function body");
        self.push_frame();
        if let Some(init) = init {
            self.emit_stmt(init)?;
        }

        let cond_block = self.context.append_basic_block(function, "for.cond");
        let body_block = self.context.append_basic_block(function, "for.body");
        let update_block = self.context.append_basic_block(function, "for.update");
        let after_block = self.context.append_basic_block(function, "for.after");

        self.builder.build_unconditional_branch(cond_block).map_err(|e| self.codegen_error(span, e.to_string(), "failed to branch"))?;

        self.builder.position_at_end(cond_block);
        match condition {
            Some(condition) => {
                let cond_value = self.emit_expr(condition)?.into_int_value();
                self.builder
                    .build_conditional_branch(cond_value, body_block, after_block)
                    .map_err(|e| self.codegen_error(span, e.to_string(), "failed to branch"))?;
            }
            None => {
                self.builder.build_unconditional_branch(body_block).map_err(|e| self.codegen_error(span, e.to_string(), "failed to branch"))?;
            }
        }

        self.loop_stack.push((update_block, after_block));
        self.builder.position_at_end(body_block);
        self.emit_stmt(body)?;
        if self.builder.get_insert_block().unwrap().get_terminator().is_none() {
            self.builder.build_unconditional_branch(update_block).map_err(|e| self.codegen_error(span, e.to_string(), "failed to branch"))?;
        }
        self.loop_stack.pop();

        self.builder.position_at_end(update_block);
        if let Some(update) = update {
            self.emit_expr(update)?;
        }
        self.builder.build_unconditional_branch(cond_block).map_err(|e| self.codegen_error(span, e.to_string(), "failed to branch"))?;

        self.builder.position_at_end(after_block);
        self.pop_frame();
        Ok(())
    }

    fn emit_do_while(&mut self, body: &Stmt, condition: &glint_parser::ast::Expr, span: &glint_common::Span) -> Result<()> {
        let function = self.current_function.expect("`do`/`while` only appears inside a function body");
        let body_block = self.context.append_basic_block(function, "dowhile.body");
        let cond_block = self.context.append_basic_block(function, "dowhile.cond");
        let after_block = self.context.append_basic_block(function, "dowhile.after");

        self.builder.build_unconditional_branch(body_block).map_err(|e| self.codegen_error(span, e.to_string(), "failed to branch"))?;

        self.loop_stack.push((cond_block, after_block));
        self.builder.position_at_end(body_block);
        self.emit_stmt(body)?;
        if self.builder.get_insert_block().unwrap().get_terminator().is_none() {
            self.builder.build_unconditional_branch(cond_block).map_err(|e| self.codegen_error(span, e.to_string(), "failed to branch"))?;
        }
        self.loop_stack.pop();

        self.builder.position_at_end(cond_block);
        let cond_value = self.emit_expr(condition)?.into_int_value();
        self.builder
            .build_conditional_branch(cond_value, body_block, after_block)
            .map_err(|e| self.codegen_error(span, e.to_string(), "failed to branch"))?;

        self.builder.position_at_end(after_block);
        Ok(())
    }
}

fn type_name_of(v: &VariableDef) -> &TypeName {
    match v {
        VariableDef::Plain { ty, .. } | VariableDef::Array { ty, .. } => ty,
    }
}

fn stmt_span(stmt: &Stmt) -> &glint_common::Span {
    match stmt {
        Stmt::VariableDef(v) => v.span(),
        Stmt::StructDef(s) => &s.span,
        Stmt::Return { span, .. }
        | Stmt::If { span, .. }
        | Stmt::While { span, .. }
        | Stmt::For { span, .. }
        | Stmt::DoWhile { span, .. } => span,
        Stmt::Break(span) | Stmt::Continue(span) | Stmt::Empty(span) => span,
        Stmt::Expr(e) => e.span(),
        Stmt::Block(stmts) => stmts.first().map(stmt_span).unwrap_or_else(|| panic!("an empty block has no span to report")),
    }
}
