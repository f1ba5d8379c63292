use std::fmt;

use crate::buffer::Type;

/// Declared field of a class: its basic type and name.
///
/// Two fields are the same key when both type and name match, which is how
/// static values are looked up after decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Field {
    ty: Type,
    name: String,
}

impl Field {
    pub fn new(ty: Type, name: impl Into<String>) -> Self {
        Field {
            ty,
            name: name.into(),
        }
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)
    }
}
