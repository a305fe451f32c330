//! Runtime intrinsic declarations, grounded in
//! `mesh-codegen/src/codegen/intrinsics.rs`'s `declare_intrinsics`: extern "C"
//! functions registered once at module construction so user code can call
//! them by name, here `printf`/`scanf` instead of the Mesh runtime surface.

use inkwell::module::{Linkage, Module};
use inkwell::AddressSpace;

/// Register `printf(i8*, ...) -> i32` and `scanf(i8*, ...) -> i32` with C
/// linkage.
pub fn declare_intrinsics(module: &Module) {
    let context = module.get_context();
    let i32_type = context.i32_type();
    let ptr_type = context.i8_type().ptr_type(AddressSpace::default());

    let printf_ty = i32_type.fn_type(&[ptr_type.into()], true);
    module.add_function("printf", printf_ty, Some(Linkage::External));

    let scanf_ty = i32_type.fn_type(&[ptr_type.into()], true);
    module.add_function("scanf", scanf_ty, Some(Linkage::External));
}
