//! LLVM IR emission, grounded in `mesh-codegen/src/codegen/mod.rs`'s
//! `CodeGen<'ctx>` architecture (context/module/builder owned for the run's
//! lifetime, a frame stack, cached function table) but reshaped to this
//! system's much smaller surface: no MIR layer, no target machine, no object
//! file emission — just a `.ll` textual module built directly from the
//! decorated AST.

mod expr;
mod intrinsics;
mod stmt;
pub mod types;

use std::path::Path;

use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::types::BasicTypeEnum;
use inkwell::values::{BasicValueEnum, FunctionValue, PointerValue};
use rustc_hash::FxHashMap;

use glint_common::error::{CompileError, Result, Stage};
use glint_common::{Diagnostic, Span};
use glint_parser::ast::SourceUnit;

/// One lexical codegen frame: the addresses and pointee types of the names
/// visible in it, plus the last return value emitted (kept for diagnostic
/// use). Struct definitions are never lowered — see [`stmt`]'s handling of
/// `StructDef` — so no struct layout table is tracked here.
#[derive(Default)]
struct Frame<'ctx> {
    locals: FxHashMap<String, PointerValue<'ctx>>,
    types: FxHashMap<String, BasicTypeEnum<'ctx>>,
    return_value: Option<BasicValueEnum<'ctx>>,
}

/// Owns the run's LLVM context, module, and builder, and drives IR emission
/// over a whole [`SourceUnit`].
pub struct CodeGen<'ctx> {
    context: &'ctx Context,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
    functions: FxHashMap<String, FunctionValue<'ctx>>,
    frames: Vec<Frame<'ctx>>,
    current_function: Option<FunctionValue<'ctx>>,
    /// `(continue_target, break_target)` pairs, innermost loop last, grounded
    /// in `mesh-codegen`'s own `loop_stack` field.
    loop_stack: Vec<(BasicBlock<'ctx>, BasicBlock<'ctx>)>,
}

impl<'ctx> CodeGen<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str) -> Self {
        let module = context.create_module(module_name);
        let builder = context.create_builder();
        intrinsics::declare_intrinsics(&module);
        let mut functions = FxHashMap::default();
        for name in ["printf", "scanf"] {
            if let Some(function) = module.get_function(name) {
                functions.insert(name.to_string(), function);
            }
        }
        CodeGen {
            context,
            module,
            builder,
            functions,
            frames: Vec::new(),
            current_function: None,
            loop_stack: Vec::new(),
        }
    }

    /// Emit the whole unit: forward-declare every function (so mutually
    /// recursive calls resolve), then compile each body, then verify the
    /// module.
    pub fn compile(&mut self, unit: &SourceUnit) -> Result<()> {
        self.declare_functions(unit)?;
        for item in &unit.items {
            if let glint_parser::ast::Item::Function(f) = item {
                self.emit_function(f)?;
            }
        }
        self.module.verify().map_err(|e| {
            CompileError::new(
                Stage::Codegen,
                Diagnostic::error(first_span(unit), format!("module verification failed: {e}"), "invalid IR"),
            )
        })
    }

    /// Serialize the module to `ll_path` verbatim.
    pub fn emit_to_file(&self, ll_path: &Path) -> Result<()> {
        self.module.print_to_file(ll_path).map_err(|e| {
            CompileError::new(
                Stage::Codegen,
                Diagnostic::error(
                    dummy_span(),
                    format!("failed to write {}: {e}", ll_path.display()),
                    "IR serialization failed",
                ),
            )
        })
    }

    pub fn ir_text(&self) -> String {
        self.module.print_to_string().to_string()
    }

    fn push_frame(&mut self) {
        self.frames.push(Frame::default());
    }

    fn pop_frame(&mut self) -> Frame<'ctx> {
        self.frames.pop().expect("frame stack underflow: push/pop must be balanced")
    }

    fn declare(&mut self, name: String, ptr: PointerValue<'ctx>, ty: BasicTypeEnum<'ctx>) {
        let frame = self.frames.last_mut().expect("at least one frame is active while compiling a function body");
        frame.locals.insert(name.clone(), ptr);
        frame.types.insert(name, ty);
    }

    fn lookup_local(&self, name: &str) -> Option<PointerValue<'ctx>> {
        self.frames.iter().rev().find_map(|frame| frame.locals.get(name).copied())
    }

    fn set_return_value(&mut self, value: BasicValueEnum<'ctx>) {
        if let Some(frame) = self.frames.last_mut() {
            frame.return_value = Some(value);
        }
    }

    fn placeholder(&self) -> BasicValueEnum<'ctx> {
        self.context.i32_type().const_zero().into()
    }

    fn codegen_error(&self, span: &Span, message: impl Into<String>, label: impl Into<String>) -> CompileError {
        CompileError::new(Stage::Codegen, Diagnostic::error(span.clone(), message, label))
    }
}

fn first_span(unit: &SourceUnit) -> Span {
    match unit.items.first() {
        Some(glint_parser::ast::Item::Function(f)) => f.span.clone(),
        Some(glint_parser::ast::Item::StructDef(s)) => s.span.clone(),
        Some(glint_parser::ast::Item::VariableDef(v)) => v.span().clone(),
        None => dummy_span(),
    }
}

/// A placeholder span for module-level diagnostics that have no single
/// source token to point at (e.g. verification failures).
fn dummy_span() -> Span {
    let line = glint_common::Line::new(String::new(), std::path::PathBuf::from("<module>"), 1, None);
    Span::new(line, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_lexer::Lexer;
    use glint_parser::Parser;
    use glint_typeck::TypeAnalyzer;
    use std::path::PathBuf;

    /// Lex, parse, type-check, and emit `src`, returning the rendered IR.
    /// Panics (failing the test) on any compile error, mirroring the
    /// straight-line pipeline a caller with no errors would drive.
    fn compile(src: &str) -> String {
        let line = glint_common::Line::new(format!("{src}\n"), PathBuf::from("t.sol"), 1, None);
        let stream = glint_common::CharStream::new(vec![line]);
        let tokens = Lexer::tokenize(&stream).unwrap();
        let mut unit = Parser::parse_source_unit(&tokens).unwrap();
        let diagnostics = TypeAnalyzer::analyze(&mut unit);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");

        let context = Context::create();
        let mut codegen = CodeGen::new(&context, "t");
        codegen.compile(&unit).unwrap();
        codegen.ir_text()
    }

    #[test]
    fn declares_a_function_with_its_parameters_and_return_type() {
        let ir = compile("function add(int a, int b) returns (int) { return a + b; }");
        assert!(ir.contains("define i32 @add(i32 %a, i32 %b)"), "{ir}");
        assert!(ir.contains("add i32"), "{ir}");
    }

    #[test]
    fn variable_def_without_initializer_stores_a_zero_value() {
        let ir = compile("function f() { int x; }");
        assert!(ir.contains("store i32 0"), "{ir}");
    }

    #[test]
    fn integer_comparison_uses_unsigned_predicates() {
        let ir = compile("function f() { int a; int b; bool c; c = a < b; }");
        assert!(ir.contains("icmp ult"), "{ir}");
    }

    #[test]
    fn integer_division_is_unsigned() {
        let ir = compile("function f() returns (int) { int a; int b; return a / b; }");
        assert!(ir.contains("udiv"), "{ir}");
    }

    #[test]
    fn short_circuit_and_branches_instead_of_always_evaluating_the_rhs() {
        let ir = compile("function f() { bool a; bool b; bool c; c = a && b; }");
        assert!(ir.contains("logic.rhs"), "{ir}");
        assert!(ir.contains("br i1"), "{ir}");
    }

    #[test]
    fn if_without_an_else_still_builds_a_merge_block() {
        let ir = compile("function f() { bool c; if (c) { } }");
        assert!(ir.contains("if.then"), "{ir}");
        assert!(ir.contains("if.merge"), "{ir}");
    }

    #[test]
    fn while_loop_reevaluates_its_condition_at_the_back_edge() {
        let ir = compile("function f() { int i; while (i < 10) { i = i + 1; } }");
        assert!(ir.contains("while.cond"), "{ir}");
        assert!(ir.contains("while.body"), "{ir}");
    }

    #[test]
    fn exponentiation_lowers_to_the_pow_intrinsic() {
        let ir = compile("function f() returns (int) { int a; int b; return a ** b; }");
        assert!(ir.contains("call double @llvm.pow.f64"), "{ir}");
    }

    #[test]
    fn struct_definitions_are_not_lowered() {
        let ir = compile("struct Point { int x; int y; }; function f() { }");
        assert!(!ir.to_lowercase().contains("%point"), "{ir}");
    }

    #[test]
    fn assignment_to_a_failed_subtree_emits_no_store() {
        // `y` is undeclared, so the analyzer decorates the rhs `unknown` but
        // still leaves `cast_type` set to the lhs's type (int) -- codegen
        // must key its skip-the-store decision off `natural_type`, not
        // `cast_type`, or this would wrongly emit a store of garbage.
        let line = glint_common::Line::new("function f() { int x; x = y + 1; }\n".to_string(), PathBuf::from("t.sol"), 1, None);
        let stream = glint_common::CharStream::new(vec![line]);
        let tokens = Lexer::tokenize(&stream).unwrap();
        let mut unit = Parser::parse_source_unit(&tokens).unwrap();
        let diagnostics = TypeAnalyzer::analyze(&mut unit);
        assert_eq!(diagnostics.len(), 1);

        let context = Context::create();
        let mut codegen = CodeGen::new(&context, "t");
        codegen.compile(&unit).unwrap();
        let ir = codegen.ir_text();
        // Exactly one store: `x`'s own zero-value initializer. The failed
        // assignment must not contribute a second one.
        assert_eq!(ir.matches("store i32").count(), 1, "{ir}");
    }

    #[test]
    fn variadic_call_to_printf_is_accepted() {
        let ir = compile(r#"function f() { printf("hi"); }"#);
        assert!(ir.contains("call i32 (i8*, ...) @printf"), "{ir}");
    }

    #[test]
    fn string_literal_constant_excludes_the_quote_delimiters() {
        let ir = compile(r#"function f() { printf("hi\n"); }"#);
        assert!(ir.contains(r#"c"hi\0A\00""#), "{ir}");
        assert!(!ir.contains(r#"\22"#), "{ir}");
    }
}
