//! Section headers: type tags, flags, and the BSS "size only" convention.

use orion_core::{ByteReader, ByteWriter, OrionError, OrionResult};

/// A section's type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum SectionType {
    /// Section index 0 is always a null section.
    Null = 0,
    /// `.orionpp.text` — Orion++ IR code.
    OrionppText = 1,
    /// `.orionpp.data` — Orion++ initialized data.
    OrionppData = 2,
    /// `.orionpp.bss` — Orion++ zero-initialized data (size only).
    OrionppBss = 3,
    /// `.orion.<arch>.text` — Orion-variant code.
    VariantText = 4,
    /// `.orion.<arch>.data` — Orion-variant initialized data.
    VariantData = 5,
    /// `.orion.<arch>.bss` — Orion-variant zero-initialized data (size only).
    VariantBss = 6,
    /// `.text` — native code.
    NativeText = 7,
    /// `.data` — native initialized data.
    NativeData = 8,
    /// `.bss` — native zero-initialized data (size only).
    NativeBss = 9,
    /// `.symtab` — symbol table.
    Symtab = 10,
    /// `.strtab` / the section-name table — string table.
    Strtab = 11,
    /// Relocation entries.
    Rela = 12,
    /// Dynamic linking information.
    Dynamic = 13,
    /// Free-form annotation.
    Note = 14,
    /// Debug information.
    Debug = 15,
}

impl SectionType {
    /// Decodes from the wire `u32`.
    pub fn from_u32(v: u32) -> OrionResult<Self> {
        use SectionType::*;
        Ok(match v {
            0 => Null,
            1 => OrionppText,
            2 => OrionppData,
            3 => OrionppBss,
            4 => VariantText,
            5 => VariantData,
            6 => VariantBss,
            7 => NativeText,
            8 => NativeData,
            9 => NativeBss,
            10 => Symtab,
            11 => Strtab,
            12 => Rela,
            13 => Dynamic,
            14 => Note,
            15 => Debug,
            _ => return Err(OrionError::InvalidSection),
        })
    }

    /// True for the three BSS-class types, which store `size` but no file
    /// bytes.
    pub fn is_bss(self) -> bool {
        matches!(self, SectionType::OrionppBss | SectionType::VariantBss | SectionType::NativeBss)
    }
}

bitflags::bitflags! {
    /// Section flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct SectionFlags: u64 {
        /// Writable at load time.
        const WRITE   = 1 << 0;
        /// Occupies memory during execution.
        const ALLOC   = 1 << 1;
        /// Executable.
        const EXEC    = 1 << 2;
        /// May be merged with identical sections (e.g. string pools).
        const MERGE   = 1 << 3;
        /// Contains NUL-terminated strings.
        const STRINGS = 1 << 4;
        /// Member of a section group.
        const GROUP   = 1 << 5;
    }
}

/// One section-header-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectionHeader {
    /// Offset into the section-name string table.
    pub name_offset: u32,
    /// Section type tag.
    pub section_type: SectionType,
    /// Section flags.
    pub flags: SectionFlags,
    /// Virtual address, if allocated.
    pub addr: u64,
    /// File offset of the section body (0 for BSS-class sections).
    pub offset: u64,
    /// Logical size in bytes.
    pub size: u64,
    /// Auxiliary "link" index (e.g. a symtab section's linked strtab).
    pub link: u32,
    /// Auxiliary "info" field, meaning depends on `section_type`.
    pub info: u32,
    /// Required alignment of the section body.
    pub alignment: u64,
    /// Size of one fixed-size entry, for table-shaped sections (0 otherwise).
    pub entry_size: u64,
}

impl SectionHeader {
    /// Writes the fixed-size entry.
    pub fn write(&self, w: &mut ByteWriter) {
        w.write_u32_le(self.name_offset);
        w.write_u32_le(self.section_type as u32);
        w.write_u64_le(self.flags.bits());
        w.write_u64_le(self.addr);
        w.write_u64_le(self.offset);
        w.write_u64_le(self.size);
        w.write_u32_le(self.link);
        w.write_u32_le(self.info);
        w.write_u64_le(self.alignment);
        w.write_u64_le(self.entry_size);
    }

    /// Reads the fixed-size entry.
    pub fn read(r: &mut ByteReader<'_>) -> OrionResult<Self> {
        Ok(Self {
            name_offset: r.read_u32_le()?,
            section_type: SectionType::from_u32(r.read_u32_le()?)?,
            flags: SectionFlags::from_bits_truncate(r.read_u64_le()?),
            addr: r.read_u64_le()?,
            offset: r.read_u64_le()?,
            size: r.read_u64_le()?,
            link: r.read_u32_le()?,
            info: r.read_u32_le()?,
            alignment: r.read_u64_le()?,
            entry_size: r.read_u64_le()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_type_roundtrips() {
        for v in 0..=15u32 {
            assert_eq!(SectionType::from_u32(v).unwrap() as u32, v);
        }
    }

    #[test]
    fn bss_classification() {
        assert!(SectionType::OrionppBss.is_bss());
        assert!(!SectionType::OrionppText.is_bss());
    }

    #[test]
    fn section_header_roundtrips() {
        let h = SectionHeader {
            name_offset: 1,
            section_type: SectionType::OrionppText,
            flags: SectionFlags::ALLOC | SectionFlags::EXEC,
            addr: 0,
            offset: 64,
            size: 16,
            link: 0,
            info: 0,
            alignment: 16,
            entry_size: 0,
        };
        let mut w = ByteWriter::new();
        h.write(&mut w);
        let mut r = ByteReader::new(w.as_slice());
        assert_eq!(SectionHeader::read(&mut r).unwrap(), h);
    }
}
