/// The type lattice used by the analyzer to decorate expressions.
///
/// Lives in `glint-common`, not `glint-typeck`, because the AST's
/// `natural_type`/`cast_type` decoration fields need to name it without the
/// parser crate depending on the analyzer crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Unknown,
    Integer,
    Float,
    Double,
    Boolean,
    String,
}

impl Type {
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Integer | Type::Float | Type::Double)
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Type::Unknown => "unknown",
            Type::Integer => "integer",
            Type::Float => "float",
            Type::Double => "double",
            Type::Boolean => "boolean",
            Type::String => "string",
        };
        f.write_str(name)
    }
}
