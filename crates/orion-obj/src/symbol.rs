//! Symbol table entries: name, packed binding/type, section, value, size.

use orion_core::{ByteReader, ByteWriter, OrionError, OrionResult};

/// A symbol's binding (linkage visibility).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SymbolBinding {
    /// Visible only within this object.
    Local,
    /// Visible to other objects at link time.
    Global,
    /// Global, but yields to a non-weak definition elsewhere.
    Weak,
}

/// A symbol's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SymbolType {
    /// Unspecified.
    NoType,
    /// Data object.
    Object,
    /// Function.
    Func,
    /// Names a section itself.
    Section,
    /// Names the source file the object was compiled from.
    File,
}

/// One `.symtab` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Symbol {
    /// Offset into `.strtab`.
    pub name_offset: u32,
    /// Binding.
    pub binding: SymbolBinding,
    /// Kind.
    pub symbol_type: SymbolType,
    /// Reserved, round-tripped but otherwise unused.
    pub other: u8,
    /// Index of the section this symbol is defined in.
    pub section_index: u16,
    /// Value (offset within the section, or an absolute address).
    pub value: u64,
    /// Size in bytes, if known.
    pub size: u64,
}

fn pack_info(binding: SymbolBinding, ty: SymbolType) -> u8 {
    let b = match binding {
        SymbolBinding::Local => 0,
        SymbolBinding::Global => 1,
        SymbolBinding::Weak => 2,
    };
    let t = match ty {
        SymbolType::NoType => 0,
        SymbolType::Object => 1,
        SymbolType::Func => 2,
        SymbolType::Section => 3,
        SymbolType::File => 4,
    };
    (b << 4) | (t & 0x0F)
}

fn unpack_info(info: u8) -> OrionResult<(SymbolBinding, SymbolType)> {
    let binding = match info >> 4 {
        0 => SymbolBinding::Local,
        1 => SymbolBinding::Global,
        2 => SymbolBinding::Weak,
        _ => return Err(OrionError::InvalidSymbol),
    };
    let ty = match info & 0x0F {
        0 => SymbolType::NoType,
        1 => SymbolType::Object,
        2 => SymbolType::Func,
        3 => SymbolType::Section,
        4 => SymbolType::File,
        _ => return Err(OrionError::InvalidSymbol),
    };
    Ok((binding, ty))
}

impl Symbol {
    /// Writes the fixed-size entry: `name_offset u32 · info u8 · other u8
    /// · section_index u16 · value u64 · size u64`.
    pub fn write(&self, w: &mut ByteWriter) {
        w.write_u32_le(self.name_offset);
        w.write_u8(pack_info(self.binding, self.symbol_type));
        w.write_u8(self.other);
        w.write_u16_le(self.section_index);
        w.write_u64_le(self.value);
        w.write_u64_le(self.size);
    }

    /// Reads the fixed-size entry.
    pub fn read(r: &mut ByteReader<'_>) -> OrionResult<Self> {
        let name_offset = r.read_u32_le()?;
        let info = r.read_u8()?;
        let (binding, symbol_type) = unpack_info(info)?;
        let other = r.read_u8()?;
        let section_index = r.read_u16_le()?;
        let value = r.read_u64_le()?;
        let size = r.read_u64_le()?;
        Ok(Self { name_offset, binding, symbol_type, other, section_index, value, size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_byte_packs_binding_high_type_low() {
        let info = pack_info(SymbolBinding::Global, SymbolType::Func);
        assert_eq!(info, 0x12);
        assert_eq!(unpack_info(info).unwrap(), (SymbolBinding::Global, SymbolType::Func));
    }

    #[test]
    fn symbol_roundtrips() {
        let s = Symbol {
            name_offset: 5,
            binding: SymbolBinding::Global,
            symbol_type: SymbolType::Func,
            other: 0,
            section_index: 1,
            value: 0,
            size: 4,
        };
        let mut w = ByteWriter::new();
        s.write(&mut w);
        let mut r = ByteReader::new(w.as_slice());
        assert_eq!(Symbol::read(&mut r).unwrap(), s);
    }
}
