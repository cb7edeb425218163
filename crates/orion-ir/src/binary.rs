//! The Orion++ binary container: file envelope, instruction framing, and
//! value framing, per the external interface layout.

use alloc::vec::Vec;
use orion_core::{ByteReader, ByteWriter, OrionError, OrionResult};

use crate::feature::{Feature, FeatureSet};
use crate::opcode::Opcode;
use crate::types::IntWidth;
use crate::value::{LabelDirection, NumericBase, Value};
use crate::Instruction;

/// Magic four-byte tag `OPPO` (`0x4F50504F` little-endian), identifying an
/// Orion++ binary file.
pub const MAGIC_OPPO: u32 = 0x4F50_504F;

/// The major version this implementation writes and requires on read.
pub const VERSION_MAJOR: u16 = 1;
/// The minor version this implementation writes; readers accept any minor
/// version `<= VERSION_MINOR`.
pub const VERSION_MINOR: u16 = 0;
/// The patch version this implementation writes; ignored on read.
pub const VERSION_PATCH: u32 = 0;

/// Parsed file-envelope header (magic already validated).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Major version; must equal [`VERSION_MAJOR`].
    pub version_major: u16,
    /// Minor version; must be `<= VERSION_MINOR`.
    pub version_minor: u16,
    /// Patch version; ignored.
    pub version_patch: u32,
    /// Enabled-features bitmask.
    pub features: FeatureSet,
    /// Size in bytes of the string table that follows the header.
    pub string_table_size: u32,
    /// Number of instructions in the stream that follows the string table.
    pub instruction_count: u32,
}

impl Header {
    /// Writes the envelope (magic + version + features + sizes + reserved).
    pub fn write(&self, w: &mut ByteWriter) {
        w.write_u32_le(MAGIC_OPPO);
        w.write_u16_le(self.version_major);
        w.write_u16_le(self.version_minor);
        w.write_u32_le(self.version_patch);
        w.write_u32_le(self.features.bits());
        w.write_u32_le(self.string_table_size);
        w.write_u32_le(self.instruction_count);
        for _ in 0..4 {
            w.write_u32_le(0);
        }
    }

    /// Reads and validates the envelope.
    pub fn read(r: &mut ByteReader<'_>) -> OrionResult<Self> {
        let magic = r.read_u32_le()?;
        if magic != MAGIC_OPPO {
            return Err(OrionError::InvalidMagic);
        }
        let version_major = r.read_u16_le()?;
        let version_minor = r.read_u16_le()?;
        let version_patch = r.read_u32_le()?;
        if version_major != VERSION_MAJOR {
            return Err(OrionError::UnsupportedVersion);
        }
        if version_minor > VERSION_MINOR {
            return Err(OrionError::UnsupportedVersion);
        }
        let features = FeatureSet::from_bits_truncate(r.read_u32_le()?);
        let string_table_size = r.read_u32_le()?;
        let instruction_count = r.read_u32_le()?;
        for _ in 0..4 {
            r.read_u32_le()?;
        }
        Ok(Self {
            version_major,
            version_minor,
            version_patch,
            features,
            string_table_size,
            instruction_count,
        })
    }
}

/* ─────────────────────────── Value tags ─────────────────────────── */

const TAG_VARIABLE: u8 = 0;
const TAG_LABEL: u8 = 1;
const TAG_SYMBOL: u8 = 2;
const TAG_STRING: u8 = 3;
const TAG_NUMERIC: u8 = 4;
const TAG_ARRAY: u8 = 5;
const TAG_RAW: u8 = 6;
/// Reserved stream-terminator tag; meaningful only in the text grammar —
/// in binary framing `value-count` is authoritative and this tag never
/// appears on the wire.
pub const TAG_END_OF_STATEMENT: u8 = 0xFE;
/// Reserved "immediate value follows" tag, likewise text-grammar-only.
pub const TAG_IMMEDIATE_FOLLOWS: u8 = 0xFF;

fn int_width_to_u8(w: IntWidth) -> u8 {
    match w {
        IntWidth::I8 => 0,
        IntWidth::I16 => 1,
        IntWidth::I32 => 2,
        IntWidth::I64 => 3,
        IntWidth::U8 => 4,
        IntWidth::U16 => 5,
        IntWidth::U32 => 6,
        IntWidth::U64 => 7,
    }
}

fn int_width_from_u8(b: u8) -> OrionResult<IntWidth> {
    Ok(match b {
        0 => IntWidth::I8,
        1 => IntWidth::I16,
        2 => IntWidth::I32,
        3 => IntWidth::I64,
        4 => IntWidth::U8,
        5 => IntWidth::U16,
        6 => IntWidth::U32,
        7 => IntWidth::U64,
        _ => return Err(OrionError::InvalidType),
    })
}

fn label_dir_to_u8(d: LabelDirection) -> u8 {
    match d {
        LabelDirection::Backward => 0,
        LabelDirection::Local => 1,
        LabelDirection::Forward => 2,
    }
}

fn label_dir_from_u8(b: u8) -> OrionResult<LabelDirection> {
    Ok(match b {
        0 => LabelDirection::Backward,
        1 => LabelDirection::Local,
        2 => LabelDirection::Forward,
        _ => return Err(OrionError::InvalidValue),
    })
}

fn base_to_u8(b: NumericBase) -> u8 {
    b as u8
}

fn base_from_u8(b: u8) -> OrionResult<NumericBase> {
    Ok(match b {
        2 => NumericBase::Binary,
        8 => NumericBase::Octal,
        10 => NumericBase::Decimal,
        16 => NumericBase::Hex,
        _ => return Err(OrionError::InvalidValue),
    })
}

/// Writes a value's self-delimited wire encoding:
/// `type-tag:u8 ∥ module-tag:u8 ∥ payload-length:u32 ∥ payload-bytes`.
pub fn write_value(w: &mut ByteWriter, v: &Value) {
    match v {
        Value::Variable(id) => {
            w.write_u8(TAG_VARIABLE);
            w.write_u8(0);
            w.write_u32_le(4);
            w.write_u32_le(*id);
        }
        Value::Label { id, direction } => {
            w.write_u8(TAG_LABEL);
            w.write_u8(label_dir_to_u8(*direction));
            w.write_u32_le(4);
            w.write_u32_le(*id);
        }
        Value::Symbol { offset, length } => {
            w.write_u8(TAG_SYMBOL);
            w.write_u8(0);
            w.write_u32_le(8);
            w.write_u32_le(*offset);
            w.write_u32_le(*length);
        }
        Value::Str { offset, length } => {
            w.write_u8(TAG_STRING);
            w.write_u8(0);
            w.write_u32_le(8);
            w.write_u32_le(*offset);
            w.write_u32_le(*length);
        }
        Value::Numeric { base, magnitude } => {
            w.write_u8(TAG_NUMERIC);
            w.write_u8(base_to_u8(*base));
            w.write_u32_le(8);
            w.write_u64_le(*magnitude);
        }
        Value::Array(items) => {
            let mut inner = ByteWriter::new();
            inner.write_u32_le(items.len() as u32);
            for item in items {
                write_value(&mut inner, item);
            }
            w.write_u8(TAG_ARRAY);
            w.write_u8(0);
            w.write_u32_le(inner.len() as u32);
            w.write_bytes(inner.as_slice());
        }
        Value::Raw { width, bytes } => {
            w.write_u8(TAG_RAW);
            w.write_u8(int_width_to_u8(*width));
            w.write_u32_le(bytes.len() as u32);
            w.write_bytes(bytes);
        }
    }
}

/// Reads a value's self-delimited wire encoding. Bounds-checks the
/// payload against the declared `payload-length`; a read that would
/// exhaust the buffer fails with [`OrionError::BufferOverflow`].
pub fn read_value(r: &mut ByteReader<'_>) -> OrionResult<Value> {
    let tag = r.read_u8()?;
    let module_tag = r.read_u8()?;
    let len = r.read_u32_le()?;
    let payload = r.read_bytes(len as usize)?;
    let mut pr = ByteReader::new(payload);
    let value = match tag {
        TAG_VARIABLE => Value::Variable(pr.read_u32_le()?),
        TAG_LABEL => Value::Label { id: pr.read_u32_le()?, direction: label_dir_from_u8(module_tag)? },
        TAG_SYMBOL => Value::Symbol { offset: pr.read_u32_le()?, length: pr.read_u32_le()? },
        TAG_STRING => Value::Str { offset: pr.read_u32_le()?, length: pr.read_u32_le()? },
        TAG_NUMERIC => Value::Numeric { base: base_from_u8(module_tag)?, magnitude: pr.read_u64_le()? },
        TAG_ARRAY => {
            let count = pr.read_u32_le()?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(read_value(&mut pr)?);
            }
            Value::Array(items)
        }
        TAG_RAW => Value::Raw { width: int_width_from_u8(module_tag)?, bytes: payload.to_vec() },
        _ => return Err(OrionError::InvalidValue),
    };
    Ok(value)
}

/// Writes an instruction's wire framing:
/// `feature:u8 ∥ opcode:u8 ∥ flags:u16 ∥ value-count:u32` then each value.
pub fn write_instruction(w: &mut ByteWriter, instr: &Instruction) {
    w.write_u8(instr.opcode.feature.to_u8());
    w.write_u8(instr.opcode.sub);
    w.write_u16_le(instr.flags);
    w.write_u32_le(instr.values.len() as u32);
    for v in &instr.values {
        write_value(w, v);
    }
}

/// Reads an instruction's wire framing.
pub fn read_instruction(r: &mut ByteReader<'_>) -> OrionResult<Instruction> {
    let feature = Feature::from_u8(r.read_u8()?)?;
    let sub = r.read_u8()?;
    let flags = r.read_u16_le()?;
    let count = r.read_u32_le()?;
    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        values.push(read_value(r)?);
    }
    Ok(Instruction { opcode: Opcode::new(feature, sub), flags, values })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_roundtrips_for_every_variant() {
        let values = alloc::vec![
            Value::Variable(7),
            Value::Label { id: 3, direction: LabelDirection::Forward },
            Value::Symbol { offset: 4, length: 4 },
            Value::Str { offset: 8, length: 3 },
            Value::decimal(42),
            Value::Array(alloc::vec![Value::decimal(1), Value::Variable(2)]),
            Value::Raw { width: IntWidth::I64, bytes: alloc::vec![1, 2, 3, 4, 5, 6, 7, 8] },
        ];
        for v in values {
            let mut w = ByteWriter::new();
            write_value(&mut w, &v);
            let mut r = ByteReader::new(w.as_slice());
            assert_eq!(read_value(&mut r).unwrap(), v);
        }
    }

    #[test]
    fn header_rejects_bad_magic() {
        let mut w = ByteWriter::new();
        w.write_u32_le(0xDEAD_BEEF);
        let mut r = ByteReader::new(w.as_slice());
        assert_eq!(Header::read(&mut r), Err(OrionError::InvalidMagic));
    }

    #[test]
    fn header_roundtrips() {
        let h = Header {
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            version_patch: VERSION_PATCH,
            features: FeatureSet::ISA | FeatureSet::HINT,
            string_table_size: 10,
            instruction_count: 3,
        };
        let mut w = ByteWriter::new();
        h.write(&mut w);
        let mut r = ByteReader::new(w.as_slice());
        assert_eq!(Header::read(&mut r).unwrap(), h);
    }
}
