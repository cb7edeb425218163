//! The module container: version, enabled features, string table, and the
//! ordered instruction stream.

use alloc::vec::Vec;
use orion_core::{ByteReader, ByteWriter, OrionError, OrionResult, StringTable};

use crate::binary::{self, Header, VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH};
use crate::feature::FeatureSet;
use crate::opcode::{HintOp, IsaOp, ObjOp};
use crate::Instruction;

/// One Orion++ binary unit: version, enabled-features bitmask, string
/// table, and the ordered instruction stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Major.minor.patch version this module was built with.
    pub version: (u16, u16, u32),
    /// Declared feature capabilities; an instruction outside this set
    /// fails validation with [`OrionError::UnsupportedFeature`].
    pub features: FeatureSet,
    /// The module's single string table.
    pub strings: StringTable,
    /// Instructions in program order.
    pub instructions: Vec<Instruction>,
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

impl Module {
    /// Builds an empty module at the implementation's current version.
    pub fn new() -> Self {
        Self {
            version: (VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH),
            features: FeatureSet::empty(),
            strings: StringTable::new(),
            instructions: Vec::new(),
        }
    }

    /// Appends an instruction, first checking its feature bit is enabled.
    pub fn push(&mut self, instr: Instruction) -> OrionResult<()> {
        if !instr.opcode.supported_by(self.features) {
            return Err(OrionError::UnsupportedFeature);
        }
        self.instructions.push(instr);
        Ok(())
    }

    /// Enables a feature, allowing subsequent instructions of that kind.
    pub fn enable(&mut self, feature: FeatureSet) {
        self.features |= feature;
    }

    /// Serializes to the binary container format (file envelope, string
    /// table, instruction stream), per the external interface layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        let header = Header {
            version_major: self.version.0,
            version_minor: self.version.1,
            version_patch: self.version.2,
            features: self.features,
            string_table_size: self.strings.byte_len() as u32,
            instruction_count: self.instructions.len() as u32,
        };
        header.write(&mut w);
        w.write_bytes(self.strings.as_bytes());
        for instr in &self.instructions {
            binary::write_instruction(&mut w, instr);
        }
        w.into_vec()
    }

    /// Deserializes from the binary container format.
    pub fn from_bytes(data: &[u8]) -> OrionResult<Self> {
        let mut r = ByteReader::new(data);
        let header = Header::read(&mut r)?;
        let str_bytes = r.read_bytes(header.string_table_size as usize)?.to_vec();
        let strings = StringTable::from_raw_bytes(str_bytes);
        let mut instructions = Vec::with_capacity(header.instruction_count as usize);
        for _ in 0..header.instruction_count {
            instructions.push(binary::read_instruction(&mut r)?);
        }
        Ok(Self {
            version: (header.version_major, header.version_minor, header.version_patch),
            features: header.features,
            strings,
            instructions,
        })
    }

    /// Computes summary statistics, used by the dump tool and by
    /// diagnostics.
    pub fn stats(&self) -> ModuleStats {
        let mut stats = ModuleStats {
            total_instructions: self.instructions.len(),
            obj_instructions: 0,
            isa_instructions: 0,
            abi_instructions: 0,
            hint_instructions: 0,
            type_instructions: 0,
            ctype_instructions: 0,
            string_table_size: self.strings.byte_len(),
        };
        for instr in &self.instructions {
            match instr.opcode.feature {
                crate::feature::Feature::Obj => stats.obj_instructions += 1,
                crate::feature::Feature::Isa => stats.isa_instructions += 1,
                crate::feature::Feature::Abi => stats.abi_instructions += 1,
                crate::feature::Feature::Hint => stats.hint_instructions += 1,
                crate::feature::Feature::Type => stats.type_instructions += 1,
                crate::feature::Feature::CType => stats.ctype_instructions += 1,
            }
        }
        stats
    }

    /// Registers `ISA.LABEL` instruction indices, failing on a duplicate
    /// label id. Shared by the VM's prepare pass and by static validation.
    pub fn label_indices(&self) -> OrionResult<alloc::collections::BTreeMap<u32, usize>> {
        let mut map = alloc::collections::BTreeMap::new();
        for (idx, instr) in self.instructions.iter().enumerate() {
            if instr.opcode.feature == crate::feature::Feature::Isa
                && IsaOp::from_u8(instr.opcode.sub) == Ok(IsaOp::Label)
            {
                let id = instr
                    .values
                    .first()
                    .and_then(crate::value::Value::as_label_id)
                    .ok_or(OrionError::InvalidInstruction)?;
                if map.insert(id, idx).is_some() {
                    return Err(OrionError::InvalidLabelId);
                }
            }
        }
        Ok(map)
    }

    /// Structural validation beyond feature-gating: every opcode decodes,
    /// every `OBJ`/`HINT` sub-opcode is recognized, and labels are unique.
    pub fn validate(&self) -> OrionResult<()> {
        for instr in &self.instructions {
            if !instr.opcode.supported_by(self.features) {
                return Err(OrionError::UnsupportedFeature);
            }
            match instr.opcode.feature {
                crate::feature::Feature::Isa => {
                    IsaOp::from_u8(instr.opcode.sub)?;
                }
                crate::feature::Feature::Obj => {
                    ObjOp::from_u8(instr.opcode.sub)?;
                }
                crate::feature::Feature::Hint => {
                    HintOp::from_u8(instr.opcode.sub)?;
                }
                _ => {}
            }
        }
        self.label_indices()?;
        Ok(())
    }
}

/// Summary statistics over a module's instruction stream, used by the dump
/// tool's function-table/stats reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModuleStats {
    /// Total instruction count.
    pub total_instructions: usize,
    /// Count of `OBJ.*` instructions.
    pub obj_instructions: usize,
    /// Count of `ISA.*` instructions.
    pub isa_instructions: usize,
    /// Count of `ABI.*` instructions.
    pub abi_instructions: usize,
    /// Count of `HINT.*` instructions.
    pub hint_instructions: usize,
    /// Count of `TYPE.*` instructions.
    pub type_instructions: usize,
    /// Count of `CTYPE.*` instructions.
    pub ctype_instructions: usize,
    /// Byte length of the string table.
    pub string_table_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use crate::Instruction;

    fn sample_module() -> Module {
        let mut m = Module::new();
        m.enable(FeatureSet::ISA);
        m.push(Instruction::isa(IsaOp::Var, alloc::vec![Value::Variable(0)])).unwrap();
        m.push(Instruction::isa(IsaOp::Const, alloc::vec![Value::Variable(0), Value::decimal(14)])).unwrap();
        m.push(Instruction::isa(IsaOp::Ret, alloc::vec![Value::Variable(0)])).unwrap();
        m
    }

    #[test]
    fn push_rejects_instruction_outside_declared_features() {
        let mut m = Module::new();
        let err = m.push(Instruction::isa(IsaOp::Ret, Vec::new())).unwrap_err();
        assert_eq!(err, OrionError::UnsupportedFeature);
    }

    #[test]
    fn binary_roundtrip_is_value_equal() {
        let m = sample_module();
        let bytes = m.to_bytes();
        let m2 = Module::from_bytes(&bytes).unwrap();
        assert_eq!(m, m2);
    }

    #[test]
    fn second_serialization_is_byte_identical() {
        let m = sample_module();
        let first = m.to_bytes();
        let reloaded = Module::from_bytes(&first).unwrap();
        let second = reloaded.to_bytes();
        assert_eq!(first, second);
    }

    #[test]
    fn stats_count_by_feature() {
        let m = sample_module();
        let stats = m.stats();
        assert_eq!(stats.total_instructions, 3);
        assert_eq!(stats.isa_instructions, 3);
    }

    #[test]
    fn duplicate_label_ids_rejected() {
        let mut m = Module::new();
        m.enable(FeatureSet::ISA);
        m.push(Instruction::isa(IsaOp::Label, alloc::vec![Value::Variable(1)])).unwrap();
        m.push(Instruction::isa(IsaOp::Label, alloc::vec![Value::Variable(1)])).unwrap();
        assert_eq!(m.label_indices(), Err(OrionError::InvalidLabelId));
    }

    #[test]
    fn label_indices_accepts_the_text_assembler_label_spelling() {
        use crate::value::LabelDirection;
        let mut m = Module::new();
        m.enable(FeatureSet::ISA);
        m.push(Instruction::isa(
            IsaOp::Label,
            alloc::vec![Value::Label { id: 3, direction: LabelDirection::Local }],
        ))
        .unwrap();
        let labels = m.label_indices().unwrap();
        assert_eq!(labels.get(&3), Some(&0));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::value::Value;
    use crate::Instruction;
    use proptest::prelude::*;

    fn arb_instruction() -> impl Strategy<Value = Instruction> {
        prop_oneof![
            (0u32..64).prop_map(|id| Instruction::isa(IsaOp::Var, alloc::vec![Value::Variable(id)])),
            (0u32..64, any::<u64>()).prop_map(|(id, n)| {
                Instruction::isa(IsaOp::Const, alloc::vec![Value::Variable(id), Value::decimal(n)])
            }),
            (0u32..64, 0u32..64, 0u32..64).prop_map(|(dst, a, b)| {
                Instruction::isa(IsaOp::Add, alloc::vec![Value::Variable(dst), Value::Variable(a), Value::Variable(b)])
            }),
            (0u32..64).prop_map(|id| Instruction::isa(IsaOp::Ret, alloc::vec![Value::Variable(id)])),
        ]
    }

    proptest! {
        /// Any well-formed (ISA-only, no duplicate labels) instruction
        /// stream survives a `to_bytes`/`from_bytes` round trip byte-for-byte
        /// equal in its decoded form — spec.md's round-trip property (2).
        #[test]
        fn binary_roundtrip_preserves_arbitrary_isa_streams(instrs in prop::collection::vec(arb_instruction(), 0..32)) {
            let mut m = Module::new();
            m.enable(FeatureSet::ISA);
            for instr in instrs {
                m.push(instr).unwrap();
            }
            let bytes = m.to_bytes();
            let decoded = Module::from_bytes(&bytes).unwrap();
            prop_assert_eq!(&m, &decoded);
            prop_assert_eq!(decoded.to_bytes(), bytes);
        }
    }
}
