use std::fmt;

use super::Ty;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveTy {
    Number,
    Bool,
    String,
}

impl PrimitiveTy {
    pub const ALL: [PrimitiveTy; 3] = [PrimitiveTy::Number, PrimitiveTy::Bool, PrimitiveTy::String];

    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveTy::Number => "number",
            PrimitiveTy::Bool => "bool",
            PrimitiveTy::String => "string",
        }
    }

    /// Match an annotation keyword (`integer`, `Boolean`, ...) case-insensitively.
    pub fn from_keyword(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "number" | "integer" => Some(PrimitiveTy::Number),
            "bool" | "boolean" => Some(PrimitiveTy::Bool),
            "string" => Some(PrimitiveTy::String),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<PrimitiveTy> for Ty {
    fn from(value: PrimitiveTy) -> Self {
        Ty::Primitive(value)
    }
}
