//! orion-dump — inspects Orion object files and Orion++ binaries: header,
//! section, symbol, and function reporting, plus a header-only validation
//! mode, in human, JSON, or XML form.
//!
//! Grounded on the original dump utility's section-by-section,
//! symbol-by-symbol walk: detect the container by magic bytes, then report
//! whatever the caller's [`DumpOptions`] asks for. The human/JSON/XML split
//! renders the same tree-shaped [`DumpReport`] three ways rather than
//! building three separate walks.

#![deny(missing_docs)]

use orion_core::{OrionError, OrionResult};
use orion_ir::Module;
use orion_obj::{ObjectFile, SectionBody};

/// What kind of file a byte buffer turned out to be, decided by magic bytes
/// (and, failing that, by the caller-supplied file extension).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `ORIO`-tagged object file.
    Object,
    /// `OPPO`-tagged Orion++ binary module.
    OrionppBinary,
    /// Neither magic matched; the extension hints at a `.hopp` text file.
    OrionppText,
    /// Neither magic nor extension identify the file.
    Unknown,
}

/// Reads the first four bytes as a little-endian `u32` and matches it
/// against the two known container magics, falling back to the `.hopp`
/// extension convention for human-readable Orion++ text.
pub fn detect_file_kind(data: &[u8], file_name: &str) -> FileKind {
    if data.len() >= 4 {
        let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        if magic == orion_obj::MAGIC_ORIO {
            return FileKind::Object;
        }
        if magic == orion_ir::binary::MAGIC_OPPO {
            return FileKind::OrionppBinary;
        }
    }
    if file_name.ends_with(".hopp") {
        return FileKind::OrionppText;
    }
    FileKind::Unknown
}

/// What to include in a dump. `-a`/`all` (the CLI default) sets every flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpOptions {
    /// Print header fields.
    pub header: bool,
    /// Print section listing.
    pub sections: bool,
    /// Print symbol table.
    pub symbols: bool,
    /// Print function listing.
    pub functions: bool,
    /// Print instruction disassembly (Orion++ binaries only).
    pub instructions: bool,
    /// Print file statistics.
    pub stats: bool,
    /// Include a hex dump of each section's body.
    pub hex_dump: bool,
    /// Include extra detail fields (addresses, offsets, alignment, …).
    pub verbose: bool,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self::all()
    }
}

impl DumpOptions {
    /// Every report section enabled, no hex dump, not verbose — the CLI's
    /// `-a`/default mode.
    pub fn all() -> Self {
        Self {
            header: true,
            sections: true,
            symbols: true,
            functions: true,
            instructions: true,
            stats: true,
            hex_dump: false,
            verbose: false,
        }
    }

    /// Every report section disabled; the caller flips on what it wants.
    pub fn none() -> Self {
        Self {
            header: false,
            sections: false,
            symbols: false,
            functions: false,
            instructions: false,
            stats: false,
            hex_dump: false,
            verbose: false,
        }
    }
}

/// One section's report row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SectionReport {
    /// Index in the section-header table.
    pub index: u32,
    /// Section name.
    pub name: String,
    /// Type mnemonic, e.g. `orionpp.text`.
    pub kind: String,
    /// Logical size in bytes.
    pub size: u64,
    /// Flag bits, rendered as a hex string.
    pub flags: String,
    /// Virtual address (only meaningful when `verbose`).
    pub addr: Option<u64>,
    /// File offset (only meaningful when `verbose`).
    pub offset: Option<u64>,
    /// Required alignment (only meaningful when `verbose`).
    pub alignment: Option<u64>,
    /// Space-separated hex bytes, 16 per row, when hex dumping was requested.
    pub hex_dump: Option<Vec<String>>,
}

/// One symbol's report row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SymbolReport {
    /// Index in the symbol table.
    pub index: u32,
    /// Symbol name, resolved through `.strtab`.
    pub name: String,
    /// `"local"` / `"global"` / `"weak"`.
    pub binding: String,
    /// `"notype"` / `"object"` / `"func"` / `"section"` / `"file"`.
    pub symbol_type: String,
    /// Defining section's index.
    pub section_index: u16,
    /// Value (section-relative offset, or an absolute address).
    pub value: u64,
    /// Size in bytes.
    pub size: u64,
}

/// One function's report row. For object files this is a `Func`-typed
/// symbol; for Orion++ binaries it is a label id reached by at least one
/// `CALL` (the binary module carries no separate function table, unlike
/// the object format).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FunctionReport {
    /// Display name, when one is known (object symbols always have one;
    /// Orion++ binary functions are identified by label id only).
    pub name: String,
    /// Defining section index, for object files.
    pub section_index: Option<u16>,
    /// Entry value: a symbol's `value` for objects, a label id for binaries.
    pub entry: u64,
    /// Size in bytes, when known.
    pub size: Option<u64>,
}

/// Header fields common to both container kinds, rendered loosely so one
/// report shape covers either.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HeaderReport {
    /// `"orion-object"` or `"orion++ binary"`.
    pub format: String,
    /// Format/version field(s), rendered as text.
    pub version: String,
    /// Entry point, if the container declares one.
    pub entry_point: Option<u64>,
    /// Declared feature set (Orion++ binaries) or object/target/variant
    /// tags (object files), rendered as text.
    pub flags: String,
}

/// Summary counts, mirroring `oriondump -t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StatsReport {
    /// Total file size in bytes.
    pub file_size: u64,
    /// Number of sections (object files) or 0 (binaries have none).
    pub section_count: usize,
    /// Number of symbols (object files) or 0.
    pub symbol_count: usize,
    /// Number of instructions (Orion++ binaries) or 0.
    pub instruction_count: usize,
    /// String-table byte size.
    pub string_table_size: usize,
}

/// The full tree-shaped report for one input file, rendered by
/// [`render_human`], [`render_json`], or [`render_xml`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DumpReport {
    /// The input's display name.
    pub file_name: String,
    /// Which container kind was detected.
    pub file_kind: String,
    /// Header fields, when `DumpOptions::header` was set.
    pub header: Option<HeaderReport>,
    /// Section rows, when `DumpOptions::sections` was set.
    pub sections: Vec<SectionReport>,
    /// Symbol rows, when `DumpOptions::symbols` was set.
    pub symbols: Vec<SymbolReport>,
    /// Function rows, when `DumpOptions::functions` was set.
    pub functions: Vec<FunctionReport>,
    /// Disassembly text, one instruction per line, when
    /// `DumpOptions::instructions` was set (Orion++ binaries only).
    pub instructions: Option<String>,
    /// Summary stats, when `DumpOptions::stats` was set.
    pub stats: Option<StatsReport>,
}

/// Builds a [`DumpReport`] for an Orion object file.
pub fn dump_object(data: &[u8], file_name: &str, options: &DumpOptions) -> OrionResult<DumpReport> {
    let obj = ObjectFile::from_bytes(data)?;
    let mut report = DumpReport { file_name: file_name.to_string(), file_kind: "orion-object".to_string(), ..Default::default() };

    if options.header {
        report.header = Some(HeaderReport {
            format: "orion-object".to_string(),
            version: obj.version.to_string(),
            entry_point: Some(obj.entry_point),
            flags: format!("obj_type={} target_arch={} variant={} flags=0x{:08x}", obj.obj_type, obj.target_arch, obj.variant, obj.flags),
        });
    }

    if options.sections {
        for (index, section) in obj.sections.iter().enumerate() {
            let hex_dump = if options.hex_dump {
                match &section.body {
                    SectionBody::Bytes(bytes) => Some(hex_rows(bytes)),
                    SectionBody::Bss(_) => None,
                }
            } else {
                None
            };
            report.sections.push(SectionReport {
                index: index as u32,
                name: section.name.clone(),
                kind: format!("{:?}", section.header.section_type).to_lowercase(),
                size: section.header.size,
                flags: format!("0x{:x}", section.header.flags.bits()),
                addr: options.verbose.then_some(section.header.addr),
                offset: options.verbose.then_some(section.header.offset),
                alignment: options.verbose.then_some(section.header.alignment),
                hex_dump,
            });
        }
    }

    if options.symbols {
        for (index, sym) in obj.symbols.iter().enumerate() {
            let name = obj.lookup_string(sym.name_offset).unwrap_or("<invalid>");
            report.symbols.push(SymbolReport {
                index: index as u32,
                name: name.to_string(),
                binding: format!("{:?}", sym.binding).to_lowercase(),
                symbol_type: format!("{:?}", sym.symbol_type).to_lowercase(),
                section_index: sym.section_index,
                value: sym.value,
                size: sym.size,
            });
        }
    }

    if options.functions {
        for sym in &obj.symbols {
            if sym.symbol_type == orion_obj::SymbolType::Func {
                let name = obj.lookup_string(sym.name_offset).unwrap_or("<invalid>");
                report.functions.push(FunctionReport {
                    name: name.to_string(),
                    section_index: Some(sym.section_index),
                    entry: sym.value,
                    size: Some(sym.size),
                });
            }
        }
    }

    if options.stats {
        report.stats = Some(StatsReport {
            file_size: data.len() as u64,
            section_count: obj.sections.len(),
            symbol_count: obj.symbols.len(),
            instruction_count: 0,
            string_table_size: obj.strtab.byte_len(),
        });
    }

    Ok(report)
}

/// Builds a [`DumpReport`] for an Orion++ binary module.
pub fn dump_orionpp_binary(data: &[u8], file_name: &str, options: &DumpOptions) -> OrionResult<DumpReport> {
    let module = Module::from_bytes(data)?;
    let mut report = DumpReport { file_name: file_name.to_string(), file_kind: "orionpp-binary".to_string(), ..Default::default() };

    if options.header {
        report.header = Some(HeaderReport {
            format: "orionpp-binary".to_string(),
            version: format!("{}.{}.{}", module.version.0, module.version.1, module.version.2),
            entry_point: None,
            flags: format!("{:?}", module.features),
        });
    }

    if options.functions {
        report.functions = called_label_ids(&module).into_iter().map(|id| FunctionReport { name: format!("L{id}"), section_index: None, entry: u64::from(id), size: None }).collect();
    }

    if options.instructions {
        report.instructions = Some(orion_ir::text::disassemble(&module));
    }

    if options.stats {
        let stats = module.stats();
        report.stats = Some(StatsReport {
            file_size: data.len() as u64,
            section_count: 0,
            symbol_count: 0,
            instruction_count: stats.total_instructions,
            string_table_size: stats.string_table_size,
        });
    }

    Ok(report)
}

/// Collects the set of distinct label ids named as a `CALL` target (index 1
/// holding a label, i.e. a user-defined function rather than a builtin),
/// in first-appearance order. Accepts either spelling a module may use for
/// a label id — `Value::Variable` (what `orion-lower` emits) or
/// `Value::Label` (what a text-assembled module may spell it as).
fn called_label_ids(module: &Module) -> Vec<u32> {
    let mut seen = std::collections::BTreeSet::new();
    for instr in &module.instructions {
        if instr.opcode.feature == orion_ir::Feature::Isa && orion_ir::IsaOp::from_u8(instr.opcode.sub) == Ok(orion_ir::IsaOp::Call) {
            if let Some(id) = instr.values.get(1).and_then(orion_ir::Value::as_label_id) {
                seen.insert(id);
            }
        }
    }
    seen.into_iter().collect()
}

fn hex_rows(bytes: &[u8]) -> Vec<String> {
    bytes
        .chunks(16)
        .enumerate()
        .map(|(row, chunk)| {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
            format!("{:04x}: {}", row * 16, hex.join(" "))
        })
        .collect()
}

/// One file's header-only validation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// The input's display name.
    pub file_name: String,
    /// True if the header parsed cleanly.
    pub valid: bool,
    /// Human-readable detail, always present (the success message when
    /// `valid`, the failure reason otherwise).
    pub detail: String,
}

/// Re-reads only the container header and reports VALID/INVALID, mirroring
/// `oriondump -c`'s shallow validation (it never walks sections or
/// instructions).
pub fn validate(data: &[u8], file_name: &str) -> ValidationReport {
    match detect_file_kind(data, file_name) {
        FileKind::Object => match orion_obj::ObjHeader::read(&mut orion_core::ByteReader::new(data)) {
            Ok(header) => ValidationReport { file_name: file_name.to_string(), valid: true, detail: format!("orion object, {} sections", header.section_count) },
            Err(e) => invalid(file_name, e),
        },
        FileKind::OrionppBinary => match orion_ir::binary::Header::read(&mut orion_core::ByteReader::new(data)) {
            Ok(header) => ValidationReport { file_name: file_name.to_string(), valid: true, detail: format!("orion++ binary, {} instructions", header.instruction_count) },
            Err(e) => invalid(file_name, e),
        },
        FileKind::OrionppText => ValidationReport { file_name: file_name.to_string(), valid: true, detail: "orion++ human-readable text".to_string() },
        FileKind::Unknown => ValidationReport { file_name: file_name.to_string(), valid: false, detail: "cannot determine file type".to_string() },
    }
}

fn invalid(file_name: &str, e: OrionError) -> ValidationReport {
    ValidationReport { file_name: file_name.to_string(), valid: false, detail: e.to_string() }
}

/// Output rendering mode, matching `oriondump -o {human,json,xml}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Indented, labeled sections for a terminal reader.
    Human,
    /// Pretty-printed JSON over the same [`DumpReport`] tree.
    Json,
    /// Hand-written XML over the same tree (no XML crate in the dependency
    /// stack; a small recursive element-printer covers the fixed shape).
    Xml,
}

/// Renders a report as indented plain text.
pub fn render_human(report: &DumpReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {} ({}) ===\n", report.file_name, report.file_kind));

    if let Some(h) = &report.header {
        out.push_str("-- header --\n");
        out.push_str(&format!("version: {}\n", h.version));
        if let Some(ep) = h.entry_point {
            out.push_str(&format!("entry point: 0x{ep:x}\n"));
        }
        out.push_str(&format!("{}\n", h.flags));
    }
    if !report.sections.is_empty() {
        out.push_str("-- sections --\n");
        for s in &report.sections {
            out.push_str(&format!("[{}] {} type={} size={} flags={}\n", s.index, s.name, s.kind, s.size, s.flags));
            if let Some(addr) = s.addr {
                out.push_str(&format!("    addr=0x{addr:x}\n"));
            }
            if let Some(rows) = &s.hex_dump {
                for row in rows {
                    out.push_str(&format!("    {row}\n"));
                }
            }
        }
    }
    if !report.symbols.is_empty() {
        out.push_str("-- symbols --\n");
        for s in &report.symbols {
            out.push_str(&format!("[{}] {} binding={} type={} section={} value=0x{:x} size={}\n", s.index, s.name, s.binding, s.symbol_type, s.section_index, s.value, s.size));
        }
    }
    if !report.functions.is_empty() {
        out.push_str("-- functions --\n");
        for f in &report.functions {
            out.push_str(&format!("{} entry=0x{:x}\n", f.name, f.entry));
        }
    }
    if let Some(instrs) = &report.instructions {
        out.push_str("-- instructions --\n");
        out.push_str(instrs);
        out.push('\n');
    }
    if let Some(stats) = &report.stats {
        out.push_str("-- stats --\n");
        out.push_str(&format!(
            "file_size={} sections={} symbols={} instructions={} strings={}\n",
            stats.file_size, stats.section_count, stats.symbol_count, stats.instruction_count, stats.string_table_size
        ));
    }
    out
}

/// Renders a report as pretty-printed JSON.
#[cfg(feature = "serde")]
pub fn render_json(report: &DumpReport) -> OrionResult<String> {
    serde_json::to_string_pretty(report).map_err(|e| OrionError::IoError { message: e.to_string().into() })
}

/// Renders a report as hand-written XML over the same report tree.
pub fn render_xml(report: &DumpReport) -> String {
    let mut out = String::new();
    out.push_str("<dump>\n");
    xml_el(&mut out, 1, "file_name", &report.file_name);
    xml_el(&mut out, 1, "file_kind", &report.file_kind);
    if let Some(h) = &report.header {
        out.push_str("  <header>\n");
        xml_el(&mut out, 2, "format", &h.format);
        xml_el(&mut out, 2, "version", &h.version);
        if let Some(ep) = h.entry_point {
            xml_el(&mut out, 2, "entry_point", &format!("0x{ep:x}"));
        }
        xml_el(&mut out, 2, "flags", &h.flags);
        out.push_str("  </header>\n");
    }
    if !report.sections.is_empty() {
        out.push_str("  <sections>\n");
        for s in &report.sections {
            out.push_str("    <section>\n");
            xml_el(&mut out, 3, "index", &s.index.to_string());
            xml_el(&mut out, 3, "name", &s.name);
            xml_el(&mut out, 3, "kind", &s.kind);
            xml_el(&mut out, 3, "size", &s.size.to_string());
            xml_el(&mut out, 3, "flags", &s.flags);
            out.push_str("    </section>\n");
        }
        out.push_str("  </sections>\n");
    }
    if !report.symbols.is_empty() {
        out.push_str("  <symbols>\n");
        for s in &report.symbols {
            out.push_str("    <symbol>\n");
            xml_el(&mut out, 3, "index", &s.index.to_string());
            xml_el(&mut out, 3, "name", &s.name);
            xml_el(&mut out, 3, "binding", &s.binding);
            xml_el(&mut out, 3, "type", &s.symbol_type);
            xml_el(&mut out, 3, "value", &format!("0x{:x}", s.value));
            xml_el(&mut out, 3, "size", &s.size.to_string());
            out.push_str("    </symbol>\n");
        }
        out.push_str("  </symbols>\n");
    }
    if !report.functions.is_empty() {
        out.push_str("  <functions>\n");
        for f in &report.functions {
            out.push_str("    <function>\n");
            xml_el(&mut out, 3, "name", &f.name);
            xml_el(&mut out, 3, "entry", &format!("0x{:x}", f.entry));
            out.push_str("    </function>\n");
        }
        out.push_str("  </functions>\n");
    }
    if let Some(stats) = &report.stats {
        out.push_str("  <stats>\n");
        xml_el(&mut out, 2, "file_size", &stats.file_size.to_string());
        xml_el(&mut out, 2, "section_count", &stats.section_count.to_string());
        xml_el(&mut out, 2, "symbol_count", &stats.symbol_count.to_string());
        xml_el(&mut out, 2, "instruction_count", &stats.instruction_count.to_string());
        out.push_str("  </stats>\n");
    }
    out.push_str("</dump>\n");
    out
}

fn xml_el(out: &mut String, depth: usize, tag: &str, value: &str) {
    let indent = "  ".repeat(depth);
    out.push_str(&format!("{indent}<{tag}>{}</{tag}>\n", xml_escape(value)));
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_ir::{FeatureSet, Instruction, IsaOp, Value};

    fn sample_module_bytes() -> Vec<u8> {
        let mut m = Module::new();
        m.enable(FeatureSet::ISA);
        m.push(Instruction::isa(IsaOp::Const, vec![Value::Variable(0), Value::decimal(42)])).unwrap();
        m.push(Instruction::isa(IsaOp::Ret, vec![Value::Variable(0)])).unwrap();
        m.to_bytes()
    }

    #[test]
    fn detects_orionpp_binary_by_magic() {
        let bytes = sample_module_bytes();
        assert_eq!(detect_file_kind(&bytes, "a.opp"), FileKind::OrionppBinary);
    }

    #[test]
    fn detects_object_by_magic() {
        let obj = ObjectFile::new_orionpp_object();
        assert_eq!(detect_file_kind(&obj.to_bytes(), "a.orion"), FileKind::Object);
    }

    #[test]
    fn unknown_bytes_with_hopp_extension_are_text() {
        assert_eq!(detect_file_kind(b"int main(){}", "prog.hopp"), FileKind::OrionppText);
    }

    #[test]
    fn unknown_bytes_without_extension_are_unknown() {
        assert_eq!(detect_file_kind(b"garbage", "prog.bin"), FileKind::Unknown);
    }

    #[test]
    fn dump_orionpp_binary_reports_instructions_and_stats() {
        let bytes = sample_module_bytes();
        let report = dump_orionpp_binary(&bytes, "a.opp", &DumpOptions::all()).unwrap();
        assert!(report.instructions.unwrap().contains("isa.const"));
        assert_eq!(report.stats.unwrap().instruction_count, 2);
    }

    #[test]
    fn dump_object_reports_sections_and_symbols() {
        let mut obj = ObjectFile::new_orionpp_object();
        let (idx, _) = obj.section_by_name(".orionpp.text").unwrap();
        obj.set_section_bytes(idx, b"\0\0\0\0".to_vec()).unwrap();
        obj.add_symbol("main", orion_obj::SymbolBinding::Global, orion_obj::SymbolType::Func, (idx + 1) as u16, 0, 4);
        let bytes = obj.to_bytes();
        let report = dump_object(&bytes, "a.orion", &DumpOptions::all()).unwrap();
        assert!(report.sections.iter().any(|s| s.name == ".orionpp.text"));
        assert_eq!(report.symbols.len(), 1);
        assert_eq!(report.functions.len(), 1);
        assert_eq!(report.functions[0].name, "main");
    }

    #[test]
    fn validate_reports_invalid_magic_reason() {
        let result = validate(b"\0\0\0\0garbage", "bad.opp");
        assert!(!result.valid);
    }

    #[test]
    fn validate_accepts_well_formed_binary() {
        let bytes = sample_module_bytes();
        let result = validate(&bytes, "a.opp");
        assert!(result.valid);
    }

    #[test]
    fn human_render_includes_section_headers() {
        let bytes = sample_module_bytes();
        let report = dump_orionpp_binary(&bytes, "a.opp", &DumpOptions::all()).unwrap();
        let text = render_human(&report);
        assert!(text.contains("-- instructions --"));
    }

    #[test]
    fn xml_render_escapes_and_nests() {
        let bytes = sample_module_bytes();
        let report = dump_orionpp_binary(&bytes, "a.opp", &DumpOptions::all()).unwrap();
        let xml = render_xml(&report);
        assert!(xml.starts_with("<dump>"));
        assert!(xml.contains("<stats>"));
    }
}
