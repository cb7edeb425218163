//! The Orion++ type tree: a root category plus an ordered list of children.

use alloc::vec::Vec;
use orion_core::OrionError;

/// Maximum nesting depth of a type tree. Chosen at the high end of the
/// spec's allowed 10-64 range: deep enough for realistic C-subset types,
/// shallow enough to keep recursive traversal (clone/validate/print) safe
/// from stack overflow on adversarial input.
pub const MAX_TYPE_DEPTH: u32 = 32;

/// The root category of a [`Type`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum TypeRoot {
    /// `const`/`volatile`/pointer qualifier; exactly one child.
    Qualifier(Qualifier),
    /// Signed/unsigned integer of a fixed width.
    Integer(IntWidth),
    /// `void`.
    Void,
    /// `char`.
    Char,
    /// Function type: children are `[return-type, param-type...]`.
    Function,
    /// Struct or union aggregate: children are field types in order.
    StructOrUnion,
    /// Fixed-size array: single child is the element type.
    Array,
}

/// A qualifier root's specific kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Qualifier {
    /// `const T`.
    Const,
    /// `volatile T`.
    Volatile,
    /// `T*`.
    Pointer,
}

/// Integer width/signedness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IntWidth {
    /// Signed 8-bit.
    I8,
    /// Signed 16-bit.
    I16,
    /// Signed 32-bit.
    I32,
    /// Signed 64-bit.
    I64,
    /// Unsigned 8-bit.
    U8,
    /// Unsigned 16-bit.
    U16,
    /// Unsigned 32-bit.
    U32,
    /// Unsigned 64-bit.
    U64,
}

/// A type tree node: a root category plus an ordered list of child types.
///
/// Cycles are forbidden by construction (each `Type` owns its children, no
/// shared mutable substructure), and [`Type::validate_depth`] enforces
/// [`MAX_TYPE_DEPTH`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Type {
    /// This node's category.
    pub root: TypeRoot,
    /// Ordered child types (empty for leaves).
    pub children: Vec<Type>,
}

impl Type {
    /// A leaf type with no children.
    pub fn leaf(root: TypeRoot) -> Self {
        Self { root, children: Vec::new() }
    }

    /// The C-subset `int` type (`i32`), used throughout the front-end.
    pub fn int() -> Self {
        Self::leaf(TypeRoot::Integer(IntWidth::I32))
    }

    /// The C-subset `char` type.
    pub fn char_ty() -> Self {
        Self::leaf(TypeRoot::Char)
    }

    /// The C-subset `void` type.
    pub fn void() -> Self {
        Self::leaf(TypeRoot::Void)
    }

    /// A pointer to `inner`.
    pub fn pointer(inner: Type) -> Self {
        Self { root: TypeRoot::Qualifier(Qualifier::Pointer), children: alloc::vec![inner] }
    }

    /// Recursively checks that this tree's depth does not exceed
    /// [`MAX_TYPE_DEPTH`]. Returns [`OrionError::InvalidType`] if it does.
    pub fn validate_depth(&self) -> Result<(), OrionError> {
        self.check_depth(0)
    }

    fn check_depth(&self, depth: u32) -> Result<(), OrionError> {
        if depth > MAX_TYPE_DEPTH {
            return Err(OrionError::InvalidType);
        }
        for child in &self.children {
            child.check_depth(depth + 1)?;
        }
        Ok(())
    }

    /// True if this is an integer type of any width.
    pub fn is_integer(&self) -> bool {
        matches!(self.root, TypeRoot::Integer(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallow_type_passes_depth_check() {
        let t = Type::pointer(Type::int());
        assert!(t.validate_depth().is_ok());
    }

    #[test]
    fn overly_deep_type_is_rejected() {
        let mut t = Type::int();
        for _ in 0..(MAX_TYPE_DEPTH as usize + 2) {
            t = Type::pointer(t);
        }
        assert_eq!(t.validate_depth(), Err(OrionError::InvalidType));
    }
}
