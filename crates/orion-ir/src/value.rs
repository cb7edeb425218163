//! Values: the tagged operands carried by an [`crate::Instruction`].

use alloc::vec::Vec;

/// Numeric literal base, spelled in the text grammar as `%B` where `B` is
/// one of `b`/`o`/`d`/`x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumericBase {
    /// Binary, `%b`.
    Binary = 2,
    /// Octal, `%o`.
    Octal = 8,
    /// Decimal, `%d`.
    Decimal = 10,
    /// Hexadecimal, `%x`.
    Hex = 16,
}

impl NumericBase {
    /// The text-grammar base letter.
    pub fn letter(self) -> char {
        match self {
            NumericBase::Binary => 'b',
            NumericBase::Octal => 'o',
            NumericBase::Decimal => 'd',
            NumericBase::Hex => 'x',
        }
    }

    /// Parses a base letter back into a [`NumericBase`].
    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'b' => Some(NumericBase::Binary),
            'o' => Some(NumericBase::Octal),
            'd' => Some(NumericBase::Decimal),
            'x' => Some(NumericBase::Hex),
            _ => None,
        }
    }

    /// Numeric radix.
    pub fn radix(self) -> u32 {
        self as u32
    }
}

/// A label's direction, as spelled `+.label` (forward), `-.label`
/// (backward), or `.label` (local/either) in the text grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LabelDirection {
    /// `-.label`.
    Backward,
    /// `.label`.
    Local,
    /// `+.label`.
    Forward,
}

/// A tagged instruction operand.
///
/// Arrays own their elements deeply; there is no shared mutable
/// substructure, so recursive clone/destroy/validate is always safe once
/// paired with a depth cap (enforced by the container reading the value,
/// mirroring [`crate::types::MAX_TYPE_DEPTH`] for types).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// A VM variable id, spelled `$n`.
    Variable(u32),
    /// A compile-time label id, spelled `+.label`/`-.label`/`.label`.
    Label {
        /// Label identifier.
        id: u32,
        /// Declared jump direction.
        direction: LabelDirection,
    },
    /// An offset+length reference into the module string table, spelled
    /// `@sym@`.
    Symbol {
        /// Byte offset into the string table.
        offset: u32,
        /// Byte length of the string (excluding the NUL terminator).
        length: u32,
    },
    /// An offset+length reference into the module string table, spelled
    /// `"..."`. Distinguished from [`Value::Symbol`] only by intent (a
    /// symbol names something resolvable at link/call time; a string is
    /// opaque data).
    Str {
        /// Byte offset into the string table.
        offset: u32,
        /// Byte length of the string (excluding the NUL terminator).
        length: u32,
    },
    /// A numeric literal, spelled `%Bdigits`.
    Numeric {
        /// Radix the literal was written in (preserved for round-trip
        /// disassembly; the magnitude itself is base-independent).
        base: NumericBase,
        /// Unsigned 64-bit magnitude.
        magnitude: u64,
    },
    /// An ordered, deeply-owned array of values, spelled `[v1, v2, …]`.
    Array(Vec<Value>),
    /// Typed raw bytes tagged with a primitive integer width, for literals
    /// that do not round-trip cleanly through [`Value::Numeric`] (e.g.
    /// pre-encoded constant-pool data from an object file).
    Raw {
        /// Declared width, reusing [`crate::types::IntWidth`].
        width: crate::types::IntWidth,
        /// Little-endian byte payload, sized to `width`.
        bytes: Vec<u8>,
    },
}

impl Value {
    /// Convenience constructor for a decimal numeric literal.
    pub fn decimal(magnitude: u64) -> Self {
        Value::Numeric { base: NumericBase::Decimal, magnitude }
    }

    /// True if this value is, directly, a variable reference.
    pub fn as_variable(&self) -> Option<u32> {
        match self {
            Value::Variable(id) => Some(*id),
            _ => None,
        }
    }

    /// The id this value names as a label, accepting either spelling the
    /// lowering pipeline and the text assembler use for jump targets:
    /// [`Value::Label`] (`.label`/`+.label`/`-.label`) and [`Value::Variable`]
    /// (the lowering crate's uniform label id space).
    pub fn as_label_id(&self) -> Option<u32> {
        match self {
            Value::Label { id, .. } | Value::Variable(id) => Some(*id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_base_letter_roundtrips() {
        for b in [NumericBase::Binary, NumericBase::Octal, NumericBase::Decimal, NumericBase::Hex] {
            assert_eq!(NumericBase::from_letter(b.letter()), Some(b));
        }
    }

    #[test]
    fn as_label_id_accepts_both_label_and_variable_spellings() {
        assert_eq!(Value::Label { id: 7, direction: LabelDirection::Forward }.as_label_id(), Some(7));
        assert_eq!(Value::Variable(7).as_label_id(), Some(7));
        assert_eq!(Value::decimal(7).as_label_id(), None);
    }

    #[test]
    fn array_owns_elements_deeply() {
        let v = Value::Array(alloc::vec![Value::decimal(1), Value::decimal(2)]);
        let cloned = v.clone();
        assert_eq!(v, cloned);
    }
}
