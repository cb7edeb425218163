//! The feature bitmask: capability groups a module declares support for.

use orion_core::OrionError;

bitflags::bitflags! {
    /// Enabled-features bitmask carried by every [`crate::Module`].
    ///
    /// Loading an instruction whose feature bit is clear is
    /// [`OrionError::UnsupportedFeature`] — this keeps minor revisions
    /// forward-compatible as new sub-opcodes are added under existing
    /// features.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct FeatureSet: u32 {
        /// Object-container metadata: sections, symbols, data.
        const OBJ  = 1 << 0;
        /// The core instruction set (arithmetic, control flow, variables).
        const ISA  = 1 << 1;
        /// Non-semantic hints (e.g. `HINT.FUNCEND`); always safe to ignore.
        const HINT = 1 << 2;
        /// Type-tree metadata instructions.
        const TYPE = 1 << 3;
        /// ABI declarations (calling convention, argument/return shape).
        const ABI  = 1 << 4;
        /// C-family type qualifiers/primitives riding on top of `TYPE`.
        const CTYPE = 1 << 5;
    }
}

impl Default for FeatureSet {
    fn default() -> Self {
        FeatureSet::empty()
    }
}

/// A single feature, used to tag an [`crate::Opcode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Feature {
    /// See [`FeatureSet::OBJ`].
    Obj = 0,
    /// See [`FeatureSet::ISA`].
    Isa = 1,
    /// See [`FeatureSet::HINT`].
    Hint = 2,
    /// See [`FeatureSet::TYPE`].
    Type = 3,
    /// See [`FeatureSet::ABI`].
    Abi = 4,
    /// See [`FeatureSet::CTYPE`].
    CType = 5,
}

impl Feature {
    /// Decodes a feature from its wire byte.
    pub fn from_u8(b: u8) -> Result<Self, OrionError> {
        match b {
            0 => Ok(Feature::Obj),
            1 => Ok(Feature::Isa),
            2 => Ok(Feature::Hint),
            3 => Ok(Feature::Type),
            4 => Ok(Feature::Abi),
            5 => Ok(Feature::CType),
            _ => Err(OrionError::InvalidInstruction),
        }
    }

    /// Encodes to the wire byte.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// The single-bit [`FeatureSet`] corresponding to this feature.
    pub fn bit(self) -> FeatureSet {
        match self {
            Feature::Obj => FeatureSet::OBJ,
            Feature::Isa => FeatureSet::ISA,
            Feature::Hint => FeatureSet::HINT,
            Feature::Type => FeatureSet::TYPE,
            Feature::Abi => FeatureSet::ABI,
            Feature::CType => FeatureSet::CTYPE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_roundtrips_through_wire_byte() {
        for f in [Feature::Obj, Feature::Isa, Feature::Hint, Feature::Type, Feature::Abi, Feature::CType] {
            assert_eq!(Feature::from_u8(f.to_u8()).unwrap(), f);
        }
    }

    #[test]
    fn unknown_feature_byte_rejected() {
        assert!(Feature::from_u8(200).is_err());
    }
}
