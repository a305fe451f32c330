//! Type-to-LLVM-type mapping, grounded in `mesh-codegen/src/codegen/types.rs`'s
//! `llvm_type` table but over the six-member `glint_common::Type` lattice
//! instead of `MirType`.

use inkwell::context::Context;
use inkwell::types::BasicTypeEnum;
use inkwell::values::BasicValueEnum;
use inkwell::AddressSpace;

use glint_common::Type;

/// | `Type`    | LLVM type            |
/// |-----------|-----------------------|
/// | Integer   | i32                    |
/// | Float     | float                  |
/// | Double    | double                 |
/// | Boolean   | i1                     |
/// | String    | i8* (opaque byte ptr)  |
/// | Unknown   | never reaches here — callers short-circuit on it first |
pub fn llvm_type<'ctx>(context: &'ctx Context, ty: Type) -> BasicTypeEnum<'ctx> {
    match ty {
        Type::Integer => context.i32_type().into(),
        Type::Float => context.f32_type().into(),
        Type::Double => context.f64_type().into(),
        Type::Boolean => context.bool_type().into(),
        Type::String => context.i8_type().ptr_type(AddressSpace::default()).into(),
        Type::Unknown => context.i32_type().into(),
    }
}

/// The zero-value a variable definition without an initializer is stored
/// with, matching `original_source/src/codegen/CodeGen.cpp`'s `GetInitValue`.
pub fn zero_value<'ctx>(context: &'ctx Context, ty: Type) -> BasicValueEnum<'ctx> {
    match ty {
        Type::Integer => context.i32_type().const_zero().into(),
        Type::Float => context.f32_type().const_zero().into(),
        Type::Double => context.f64_type().const_zero().into(),
        Type::Boolean => context.bool_type().const_zero().into(),
        Type::String => context.i8_type().ptr_type(AddressSpace::default()).const_null().into(),
        Type::Unknown => context.i32_type().const_zero().into(),
    }
}
