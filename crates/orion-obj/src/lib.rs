//! orion-obj — the Orion object-file format: a header, a section-header
//! table, raw section bodies, and a symbol table, used to wrap Orion++ IR
//! or native sections for linking.
//!
//! Section index 0 is always a null section. BSS-class sections
//! (`OrionppBss`/`VariantBss`/`NativeBss`) record only a logical `size`;
//! they contribute no file bytes.

#![deny(missing_docs)]

pub mod header;
pub mod section;
pub mod symbol;

use orion_core::{ByteReader, ByteWriter, OrionError, OrionResult, StringTable};

pub use header::{ObjHeader, MAGIC_ORIO};
pub use section::{SectionFlags, SectionHeader, SectionType};
pub use symbol::{Symbol, SymbolBinding, SymbolType};

/// A section's body: either raw bytes, or (for BSS-class sections) just a
/// logical size with no file bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionBody {
    /// File-backed bytes.
    Bytes(Vec<u8>),
    /// Logical size only (BSS class).
    Bss(u64),
}

impl SectionBody {
    /// Byte length as it would be written to the file (0 for BSS).
    fn file_len(&self) -> usize {
        match self {
            SectionBody::Bytes(b) => b.len(),
            SectionBody::Bss(_) => 0,
        }
    }

    /// Logical size (bytes length, or the declared BSS size).
    fn logical_size(&self) -> u64 {
        match self {
            SectionBody::Bytes(b) => b.len() as u64,
            SectionBody::Bss(n) => *n,
        }
    }
}

/// One section: its header metadata plus its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section name, kept alongside the header for convenient lookup
    /// (the header's `name_offset` is recomputed on write).
    pub name: String,
    /// Header fields other than `name_offset`/`offset`/`size`, which are
    /// computed on write.
    pub header: SectionHeader,
    /// The section's body.
    pub body: SectionBody,
}

/// The in-memory object file: header fields, sections, symbols, and the
/// dedicated section-name and symbol-name string tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectFile {
    /// Format version.
    pub version: u8,
    /// Object kind.
    pub obj_type: u8,
    /// Target architecture.
    pub target_arch: u8,
    /// Orion variant, 0 = pure Orion++.
    pub variant: u8,
    /// Format-level flags.
    pub flags: u32,
    /// Entry point, if executable.
    pub entry_point: u64,
    /// Sections, including the mandatory index-0 null section.
    pub sections: Vec<Section>,
    /// Symbol table entries.
    pub symbols: Vec<Symbol>,
    /// Dedicated section-name string table (becomes the body of the
    /// section-name STRTAB section referenced by the header).
    pub section_names: StringTable,
    /// Symbol-name string table (becomes the body of `.strtab`).
    pub strtab: StringTable,
}

impl Default for ObjectFile {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectFile {
    /// Builds an empty object file containing only the null section.
    pub fn new() -> Self {
        let null_section = Section {
            name: String::new(),
            header: SectionHeader {
                name_offset: 0,
                section_type: SectionType::Null,
                flags: SectionFlags::empty(),
                addr: 0,
                offset: 0,
                size: 0,
                link: 0,
                info: 0,
                alignment: 0,
                entry_size: 0,
            },
            body: SectionBody::Bytes(Vec::new()),
        };
        Self {
            version: 1,
            obj_type: 1,
            target_arch: 0,
            variant: 0,
            flags: 0,
            entry_point: 0,
            sections: alloc_vec(null_section),
            symbols: Vec::new(),
            section_names: StringTable::new(),
            strtab: StringTable::new(),
        }
    }

    /// Builds a new Orion++ object with the standard template: `.orionpp.text`
    /// (alloc+exec, align 16), `.orionpp.data` (alloc+write, align 8),
    /// `.orionpp.bss` (alloc+write, align 8), `.symtab`, `.strtab`, and a
    /// dedicated section-name STRTAB section referenced by the header.
    pub fn new_orionpp_object() -> Self {
        let mut obj = Self::new();
        obj.add_section(".orionpp.text", SectionType::OrionppText, SectionFlags::ALLOC | SectionFlags::EXEC, 16, SectionBody::Bytes(Vec::new()));
        obj.add_section(".orionpp.data", SectionType::OrionppData, SectionFlags::ALLOC | SectionFlags::WRITE, 8, SectionBody::Bytes(Vec::new()));
        obj.add_section(".orionpp.bss", SectionType::OrionppBss, SectionFlags::ALLOC | SectionFlags::WRITE, 8, SectionBody::Bss(0));
        obj.add_section(".symtab", SectionType::Symtab, SectionFlags::empty(), 8, SectionBody::Bytes(Vec::new()));
        obj.add_section(".strtab", SectionType::Strtab, SectionFlags::STRINGS, 1, SectionBody::Bytes(Vec::new()));
        obj.add_section(".shstrtab", SectionType::Strtab, SectionFlags::STRINGS, 1, SectionBody::Bytes(Vec::new()));
        obj
    }

    /// Appends a section, interning its name into the section-name table.
    /// Returns the new section's index.
    pub fn add_section(
        &mut self,
        name: &str,
        section_type: SectionType,
        flags: SectionFlags,
        alignment: u64,
        body: SectionBody,
    ) -> u32 {
        let name_offset = self.section_names.add(name);
        let header = SectionHeader {
            name_offset,
            section_type,
            flags,
            addr: 0,
            offset: 0,
            size: body.logical_size(),
            link: 0,
            info: 0,
            alignment,
            entry_size: 0,
        };
        self.sections.push(Section { name: name.to_string(), header, body });
        (self.sections.len() - 1) as u32
    }

    /// Looks up a section by name (first match).
    pub fn section_by_name(&self, name: &str) -> Option<(u32, &Section)> {
        self.sections.iter().enumerate().find(|(_, s)| s.name == name).map(|(i, s)| (i as u32, s))
    }

    /// Looks up a section by index.
    pub fn section_by_index(&self, index: u32) -> OrionResult<&Section> {
        self.sections.get(index as usize).ok_or(OrionError::InvalidSection)
    }

    /// Replaces a section's bytes (only valid for non-BSS sections).
    pub fn set_section_bytes(&mut self, index: u32, bytes: Vec<u8>) -> OrionResult<()> {
        let section = self.sections.get_mut(index as usize).ok_or(OrionError::InvalidSection)?;
        if section.header.section_type.is_bss() {
            return Err(OrionError::InvalidSection);
        }
        section.header.size = bytes.len() as u64;
        section.body = SectionBody::Bytes(bytes);
        Ok(())
    }

    /// Sets a section's flags.
    pub fn set_section_flags(&mut self, index: u32, flags: SectionFlags) -> OrionResult<()> {
        let section = self.sections.get_mut(index as usize).ok_or(OrionError::InvalidSection)?;
        section.header.flags = flags;
        Ok(())
    }

    /// Sets a section's required alignment.
    pub fn set_section_alignment(&mut self, index: u32, alignment: u64) -> OrionResult<()> {
        let section = self.sections.get_mut(index as usize).ok_or(OrionError::InvalidSection)?;
        section.header.alignment = alignment;
        Ok(())
    }

    /// Adds a symbol, given the already-interned name offset (see
    /// [`ObjectFile::add_string`]).
    pub fn add_symbol(&mut self, name: &str, binding: SymbolBinding, symbol_type: SymbolType, section_index: u16, value: u64, size: u64) -> u32 {
        let name_offset = self.add_string(name);
        self.symbols.push(Symbol { name_offset, binding, symbol_type, other: 0, section_index, value, size });
        (self.symbols.len() - 1) as u32
    }

    /// Interns a string into `.strtab`, deduplicating by content.
    pub fn add_string(&mut self, s: &str) -> u32 {
        self.strtab.add(s)
    }

    /// Looks up a string previously interned with [`ObjectFile::add_string`].
    pub fn lookup_string(&self, offset: u32) -> OrionResult<&str> {
        self.strtab.get(offset)
    }

    /// Serializes to the object-file binary layout: header, section-header
    /// table, then raw section bodies in declaration order, each aligned
    /// to 8 bytes. The section-name table and `.strtab`/`.symtab` bodies
    /// are synthesized from `self.section_names`/`self.strtab`/`self.symbols`
    /// just before writing.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut sections = self.sections.clone();
        self.sync_builtin_bodies(&mut sections);

        let count = sections.len() as u32;
        let header_size = header::HEADER_SIZE;
        let table_size = count * header::SECTION_HEADER_SIZE;
        let mut cursor = header_size + table_size;

        for section in &mut sections {
            if section.header.section_type.is_bss() || section.header.section_type == SectionType::Null {
                section.header.offset = 0;
                continue;
            }
            cursor = align_up(cursor, 8);
            section.header.offset = cursor as u64;
            cursor += section.body.file_len() as u32;
        }

        let string_table_index = sections
            .iter()
            .position(|s| s.name == ".shstrtab")
            .map(|i| i as u32)
            .unwrap_or(0);

        let header = ObjHeader {
            version: self.version,
            obj_type: self.obj_type,
            target_arch: self.target_arch,
            variant: self.variant,
            flags: self.flags,
            entry_point: self.entry_point,
            section_header_offset: header_size,
            section_count: count,
            section_header_size: header::SECTION_HEADER_SIZE,
            string_table_index,
        };

        let mut w = ByteWriter::new();
        header.write(&mut w);
        for section in &sections {
            section.header.write(&mut w);
        }
        for section in &sections {
            if let SectionBody::Bytes(bytes) = &section.body {
                if section.header.section_type == SectionType::Null {
                    continue;
                }
                w.align_to(8);
                w.write_bytes(bytes);
            }
        }
        w.into_vec()
    }

    /// Deserializes from the object-file binary layout.
    pub fn from_bytes(data: &[u8]) -> OrionResult<Self> {
        let mut r = ByteReader::new(data);
        let header = ObjHeader::read(&mut r)?;

        r.seek(header.section_header_offset as usize)?;
        let mut headers = Vec::with_capacity(header.section_count as usize);
        for _ in 0..header.section_count {
            headers.push(SectionHeader::read(&mut r)?);
        }

        let mut sections = Vec::with_capacity(headers.len());
        for h in &headers {
            let body = if h.section_type.is_bss() || h.section_type == SectionType::Null {
                if h.section_type.is_bss() { SectionBody::Bss(h.size) } else { SectionBody::Bytes(Vec::new()) }
            } else {
                let mut br = ByteReader::new(data);
                br.seek(h.offset as usize)?;
                SectionBody::Bytes(br.read_bytes(h.size as usize)?.to_vec())
            };
            sections.push(Section { name: String::new(), header: *h, body });
        }

        let section_names = sections
            .get(header.string_table_index as usize)
            .and_then(|s| match &s.body {
                SectionBody::Bytes(b) => Some(StringTable::from_raw_bytes(b.clone())),
                SectionBody::Bss(_) => None,
            })
            .unwrap_or_else(StringTable::new);

        for section in &mut sections {
            section.name = section_names.get(section.header.name_offset).unwrap_or("").to_string();
        }

        let strtab_section = sections.iter().find(|s| s.name == ".strtab");
        let strtab = match strtab_section.map(|s| &s.body) {
            Some(SectionBody::Bytes(b)) => StringTable::from_raw_bytes(b.clone()),
            _ => StringTable::new(),
        };

        let symbols = match sections.iter().find(|s| s.name == ".symtab").map(|s| &s.body) {
            Some(SectionBody::Bytes(bytes)) => {
                let mut sr = ByteReader::new(bytes);
                let mut syms = Vec::new();
                while sr.remaining() > 0 {
                    syms.push(Symbol::read(&mut sr)?);
                }
                syms
            }
            _ => Vec::new(),
        };

        Ok(Self {
            version: header.version,
            obj_type: header.obj_type,
            target_arch: header.target_arch,
            variant: header.variant,
            flags: header.flags,
            entry_point: header.entry_point,
            sections,
            symbols,
            section_names,
            strtab,
        })
    }

    /// Writes the object to `path`.
    pub fn write_to_file(&self, path: impl AsRef<std::path::Path>) -> OrionResult<()> {
        std::fs::write(path, self.to_bytes())?;
        Ok(())
    }

    /// Reads an object from `path`.
    pub fn read_from_file(path: impl AsRef<std::path::Path>) -> OrionResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Regenerates the synthesized `.strtab`/`.symtab`/section-name-table
    /// bodies from the current `strtab`/`symbols`/`section_names` fields.
    fn sync_builtin_bodies(&self, sections: &mut [Section]) {
        for section in sections.iter_mut() {
            if section.name == ".strtab" {
                section.body = SectionBody::Bytes(self.strtab.as_bytes().to_vec());
                section.header.size = self.strtab.byte_len() as u64;
            } else if section.name == ".symtab" {
                let mut w = ByteWriter::new();
                for sym in &self.symbols {
                    sym.write(&mut w);
                }
                let bytes = w.into_vec();
                section.header.size = bytes.len() as u64;
                section.body = SectionBody::Bytes(bytes);
            }
        }
        for section in sections.iter_mut() {
            if section.name == ".shstrtab" {
                section.body = SectionBody::Bytes(self.section_names.as_bytes().to_vec());
                section.header.size = self.section_names.byte_len() as u64;
            }
        }
    }
}

fn align_up(v: u32, align: u32) -> u32 {
    let rem = v % align;
    if rem == 0 { v } else { v + (align - rem) }
}

fn alloc_vec<T>(item: T) -> Vec<T> {
    let mut v = Vec::with_capacity(1);
    v.push(item);
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_object_roundtrip_preserves_bytes_and_symbol() {
        let mut obj = ObjectFile::new_orionpp_object();
        let (text_idx, _) = obj.section_by_name(".orionpp.text").unwrap();
        obj.set_section_bytes(text_idx, b"ABC\0".to_vec()).unwrap();
        obj.add_symbol("main", SymbolBinding::Global, SymbolType::Func, (text_idx + 1) as u16, 0, 4);

        let bytes = obj.to_bytes();
        let loaded = ObjectFile::from_bytes(&bytes).unwrap();

        let (loaded_text_idx, loaded_text) = loaded.section_by_name(".orionpp.text").unwrap();
        assert_eq!(loaded_text.body, SectionBody::Bytes(b"ABC\0".to_vec()));

        let sym = &loaded.symbols[0];
        assert_eq!(loaded.lookup_string(sym.name_offset).unwrap(), "main");
        assert_eq!(sym.section_index as u32, loaded_text_idx + 1);
        assert_eq!(sym.value, 0);
        assert_eq!(sym.size, 4);
        assert_eq!(sym.binding, SymbolBinding::Global);
        assert_eq!(sym.symbol_type, SymbolType::Func);
    }

    #[test]
    fn bss_section_has_no_file_bytes_but_keeps_size() {
        let mut obj = ObjectFile::new_orionpp_object();
        let (bss_idx, _) = obj.section_by_name(".orionpp.bss").unwrap();
        obj.sections[bss_idx as usize].body = SectionBody::Bss(256);
        obj.sections[bss_idx as usize].header.size = 256;

        let bytes = obj.to_bytes();
        let loaded = ObjectFile::from_bytes(&bytes).unwrap();
        let (_, bss) = loaded.section_by_name(".orionpp.bss").unwrap();
        assert_eq!(bss.body, SectionBody::Bss(256));
        assert_eq!(bss.header.offset, 0);
    }

    #[test]
    fn unknown_section_index_is_invalid_section() {
        let obj = ObjectFile::new();
        assert_eq!(obj.section_by_index(99), Err(OrionError::InvalidSection));
    }
}
