//! The object-file header: magic, version/target identification, and the
//! section-header-table pointer.

use orion_core::{ByteReader, ByteWriter, OrionError, OrionResult};

/// Magic four-byte tag `ORIO` (`0x4F52494F` little-endian), identifying an
/// Orion object file.
pub const MAGIC_ORIO: u32 = 0x4F52_494F;

/// The object-file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjHeader {
    /// Format version.
    pub version: u8,
    /// Object kind (relocatable, executable, shared, …); uninterpreted by
    /// this toolchain beyond round-tripping the byte.
    pub obj_type: u8,
    /// Target architecture identifier.
    pub target_arch: u8,
    /// Orion variant identifier (0 = none / pure Orion++).
    pub variant: u8,
    /// Format-level flags.
    pub flags: u32,
    /// Entry point, if this object is executable.
    pub entry_point: u64,
    /// Byte offset of the section-header table.
    pub section_header_offset: u32,
    /// Number of section headers.
    pub section_count: u32,
    /// Byte size of one section header entry.
    pub section_header_size: u32,
    /// Index of the dedicated section-name STRTAB section.
    pub string_table_index: u32,
}

/// Byte size of one [`SectionHeader`](crate::section::SectionHeader) entry
/// on the wire: `name_offset u32 · type u32 · flags u64 · addr u64 ·
/// offset u64 · size u64 · link u32 · info u32 · alignment u64 · entry_size u64`.
pub const SECTION_HEADER_SIZE: u32 = 4 + 4 + 8 + 8 + 8 + 8 + 4 + 4 + 8 + 8;

/// Byte size of the fixed-size [`ObjHeader`] on the wire: `magic u32 ·
/// version u8 · obj_type u8 · target_arch u8 · variant u8 · flags u32 ·
/// entry_point u64 · section_header_offset u32 · section_count u32 ·
/// section_header_size u32 · string_table_index u32 · reserved[4] u32`.
pub const HEADER_SIZE: u32 = 4 + 1 + 1 + 1 + 1 + 4 + 8 + 4 + 4 + 4 + 4 + 4 * 4;

impl ObjHeader {
    /// Writes the fixed-size header.
    pub fn write(&self, w: &mut ByteWriter) {
        w.write_u32_le(MAGIC_ORIO);
        w.write_u8(self.version);
        w.write_u8(self.obj_type);
        w.write_u8(self.target_arch);
        w.write_u8(self.variant);
        w.write_u32_le(self.flags);
        w.write_u64_le(self.entry_point);
        w.write_u32_le(self.section_header_offset);
        w.write_u32_le(self.section_count);
        w.write_u32_le(self.section_header_size);
        w.write_u32_le(self.string_table_index);
        for _ in 0..4 {
            w.write_u32_le(0);
        }
    }

    /// Reads and validates the header (magic check only; version
    /// compatibility is the caller's concern since the format has no
    /// declared minimum-supported version beyond exact match here).
    pub fn read(r: &mut ByteReader<'_>) -> OrionResult<Self> {
        let magic = r.read_u32_le()?;
        if magic != MAGIC_ORIO {
            return Err(OrionError::InvalidMagic);
        }
        let version = r.read_u8()?;
        let obj_type = r.read_u8()?;
        let target_arch = r.read_u8()?;
        let variant = r.read_u8()?;
        let flags = r.read_u32_le()?;
        let entry_point = r.read_u64_le()?;
        let section_header_offset = r.read_u32_le()?;
        let section_count = r.read_u32_le()?;
        let section_header_size = r.read_u32_le()?;
        let string_table_index = r.read_u32_le()?;
        for _ in 0..4 {
            r.read_u32_le()?;
        }
        Ok(Self {
            version,
            obj_type,
            target_arch,
            variant,
            flags,
            entry_point,
            section_header_offset,
            section_count,
            section_header_size,
            string_table_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrips() {
        let h = ObjHeader {
            version: 1,
            obj_type: 1,
            target_arch: 0,
            variant: 0,
            flags: 0,
            entry_point: 0,
            section_header_offset: 64,
            section_count: 5,
            section_header_size: SECTION_HEADER_SIZE,
            string_table_index: 1,
        };
        let mut w = ByteWriter::new();
        h.write(&mut w);
        let mut r = ByteReader::new(w.as_slice());
        assert_eq!(ObjHeader::read(&mut r).unwrap(), h);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut w = ByteWriter::new();
        w.write_u32_le(0);
        let mut r = ByteReader::new(w.as_slice());
        assert_eq!(ObjHeader::read(&mut r), Err(OrionError::InvalidMagic));
    }
}
