//! The text disassembly grammar: `feature.op value, value, …` per line.
//!
//! Disassembly is round-trippable within the documented value subset
//! (variable/symbol/numeric/label/string/array); [`Value::Raw`] has no
//! textual spelling and renders as `UNKNOWN(width)` — lossy, for humans
//! only, matching the specification's own carve-out for exotic types.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use orion_core::{OrionError, OrionResult, StringTable};

use crate::opcode::{HintOp, IsaOp, ObjOp};
use crate::types::IntWidth;
use crate::value::{LabelDirection, NumericBase, Value};
use crate::{Feature, Instruction, Module, Opcode};

/// Renders one value in the text grammar.
pub fn format_value(v: &Value, strings: &StringTable) -> String {
    match v {
        Value::Variable(id) => format!("${id}"),
        Value::Label { id, direction } => {
            let sigil = match direction {
                LabelDirection::Forward => "+.",
                LabelDirection::Backward => "-.",
                LabelDirection::Local => ".",
            };
            format!("{sigil}L{id}")
        }
        Value::Symbol { offset, .. } => {
            let name = strings.get(*offset).unwrap_or("?");
            format!("@{name}@")
        }
        Value::Str { offset, .. } => {
            let s = strings.get(*offset).unwrap_or("");
            format!("\"{}\"", escape_string(s))
        }
        Value::Numeric { base, magnitude } => {
            let letter = base.letter();
            let digits = match base {
                NumericBase::Binary => format!("{magnitude:b}"),
                NumericBase::Octal => format!("{magnitude:o}"),
                NumericBase::Decimal => format!("{magnitude}"),
                NumericBase::Hex => format!("{magnitude:x}"),
            };
            format!("%{letter}{digits}")
        }
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(|i| format_value(i, strings)).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Raw { width, .. } => format!("UNKNOWN({})", width_name(*width)),
    }
}

fn width_name(w: IntWidth) -> &'static str {
    match w {
        IntWidth::I8 => "i8",
        IntWidth::I16 => "i16",
        IntWidth::I32 => "i32",
        IntWidth::I64 => "i64",
        IntWidth::U8 => "u8",
        IntWidth::U16 => "u16",
        IntWidth::U32 => "u32",
        IntWidth::U64 => "u64",
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders one instruction as `feature.op value, value, …`.
pub fn format_instruction(instr: &Instruction, strings: &StringTable) -> String {
    let values: Vec<String> = instr.values.iter().map(|v| format_value(v, strings)).collect();
    if values.is_empty() {
        instr.opcode.name()
    } else {
        format!("{} {}", instr.opcode.name(), values.join(", "))
    }
}

/// Renders every instruction in a module, one per line.
pub fn disassemble(module: &Module) -> String {
    module
        .instructions
        .iter()
        .map(|i| format_instruction(i, &module.strings))
        .collect::<Vec<_>>()
        .join("\n")
}

/* ─────────────────────────── Assembler (parse direction) ─────────────────────────── */

/// Parses one `feature.op value, value, …` line into an instruction,
/// interning any string/symbol literals into `strings`.
pub fn parse_instruction(line: &str, strings: &mut StringTable) -> OrionResult<Instruction> {
    let line = line.trim();
    let (head, rest) = match line.find(char::is_whitespace) {
        Some(idx) => (&line[..idx], line[idx..].trim_start()),
        None => (line, ""),
    };
    let (feature_name, op_name) = head.split_once('.').ok_or(OrionError::ParseError {
        message: "expected feature.op".into(),
    })?;
    let opcode = resolve_opcode(feature_name, op_name)?;
    let values = if rest.is_empty() {
        Vec::new()
    } else {
        split_top_level(rest)
            .into_iter()
            .map(|part| parse_value(part.trim(), strings))
            .collect::<OrionResult<Vec<_>>>()?
    };
    Ok(Instruction::new(opcode, values))
}

/// Parses a full text-disassembly listing (one instruction per line, blank
/// lines ignored) into an instruction stream.
pub fn assemble(text: &str, strings: &mut StringTable) -> OrionResult<Vec<Instruction>> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| parse_instruction(l, strings))
        .collect()
}

fn resolve_opcode(feature_name: &str, op_name: &str) -> OrionResult<Opcode> {
    match feature_name {
        "isa" => {
            let op = isa_from_mnemonic(op_name).ok_or(OrionError::ParseError {
                message: "unknown isa mnemonic".into(),
            })?;
            Ok(Opcode::isa(op))
        }
        "hint" => {
            let op = match op_name {
                "funcend" => HintOp::FuncEnd,
                "generic" => HintOp::Generic,
                _ => return Err(OrionError::ParseError { message: "unknown hint mnemonic".into() }),
            };
            Ok(Opcode::new(Feature::Hint, op as u8))
        }
        "obj" => {
            let op = match op_name {
                "section" => ObjOp::Section,
                "symbol" => ObjOp::Symbol,
                "data" => ObjOp::Data,
                _ => return Err(OrionError::ParseError { message: "unknown obj mnemonic".into() }),
            };
            Ok(Opcode::new(Feature::Obj, op as u8))
        }
        _ => Err(OrionError::ParseError { message: "unknown feature".into() }),
    }
}

fn isa_from_mnemonic(s: &str) -> Option<IsaOp> {
    for b in 0..=32u8 {
        if let Ok(op) = IsaOp::from_u8(b) {
            if op.mnemonic() == s {
                return Some(op);
            }
        }
    }
    None
}

/// Splits a comma-separated value list respecting nested `[...]` and
/// quoted strings.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut start = 0usize;
    let bytes = s.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => in_string = !in_string,
            b'[' if !in_string => depth += 1,
            b']' if !in_string => depth -= 1,
            b',' if !in_string && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < s.len() {
        parts.push(&s[start..]);
    }
    parts
}

fn parse_value(s: &str, strings: &mut StringTable) -> OrionResult<Value> {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix('$') {
        let id: u32 = rest.parse().map_err(|_| OrionError::ParseError { message: "bad variable id".into() })?;
        return Ok(Value::Variable(id));
    }
    if let Some(rest) = s.strip_prefix("+.") {
        return Ok(Value::Label { id: parse_label_id(rest)?, direction: LabelDirection::Forward });
    }
    if let Some(rest) = s.strip_prefix("-.") {
        return Ok(Value::Label { id: parse_label_id(rest)?, direction: LabelDirection::Backward });
    }
    if let Some(rest) = s.strip_prefix('.') {
        return Ok(Value::Label { id: parse_label_id(rest)?, direction: LabelDirection::Local });
    }
    if let Some(rest) = s.strip_prefix('@') {
        let name = rest.strip_suffix('@').ok_or(OrionError::ParseError { message: "unterminated symbol".into() })?;
        let offset = strings.add(name);
        return Ok(Value::Symbol { offset, length: name.len() as u32 });
    }
    if let Some(rest) = s.strip_prefix('"') {
        let raw = rest.strip_suffix('"').ok_or(OrionError::ParseError { message: "unterminated string".into() })?;
        let unescaped = unescape_string(raw);
        let offset = strings.add(&unescaped);
        return Ok(Value::Str { offset, length: unescaped.len() as u32 });
    }
    if let Some(rest) = s.strip_prefix('%') {
        let mut chars = rest.chars();
        let letter = chars.next().ok_or(OrionError::ParseError { message: "missing numeric base".into() })?;
        let base = NumericBase::from_letter(letter).ok_or(OrionError::ParseError { message: "bad numeric base".into() })?;
        let digits = chars.as_str();
        let magnitude = u64::from_str_radix(digits, base.radix()).map_err(|_| OrionError::ParseError { message: "bad numeric digits".into() })?;
        return Ok(Value::Numeric { base, magnitude });
    }
    if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        let items = split_top_level(inner)
            .into_iter()
            .map(|p| parse_value(p.trim(), strings))
            .collect::<OrionResult<Vec<_>>>()?;
        return Ok(Value::Array(items));
    }
    Err(OrionError::ParseError { message: "unrecognized value syntax".into() })
}

fn parse_label_id(s: &str) -> OrionResult<u32> {
    let digits: String = s.chars().skip_while(|c| !c.is_ascii_digit()).collect();
    digits.parse().map_err(|_| OrionError::ParseError { message: "bad label id".into() })
}

fn unescape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_value_roundtrips_through_text() {
        let mut strings = StringTable::new();
        let v = Value::Variable(3);
        let text = format_value(&v, &strings);
        assert_eq!(text, "$3");
        assert_eq!(parse_value(&text, &mut strings).unwrap(), v);
    }

    #[test]
    fn numeric_value_roundtrips_through_text() {
        let mut strings = StringTable::new();
        let v = Value::decimal(42);
        let text = format_value(&v, &strings);
        assert_eq!(text, "%d42");
        assert_eq!(parse_value(&text, &mut strings).unwrap(), v);
    }

    #[test]
    fn array_value_roundtrips_through_text() {
        let mut strings = StringTable::new();
        let v = Value::Array(alloc::vec![Value::Variable(1), Value::decimal(2)]);
        let text = format_value(&v, &strings);
        let reparsed = parse_value(&text, &mut strings).unwrap();
        assert_eq!(reparsed, v);
    }

    #[test]
    fn instruction_line_roundtrips() {
        let mut strings = StringTable::new();
        let instr = Instruction::isa(IsaOp::Add, alloc::vec![Value::Variable(0), Value::Variable(1), Value::Variable(2)]);
        let line = format_instruction(&instr, &strings);
        assert_eq!(line, "isa.add $0, $1, $2");
        let parsed = parse_instruction(&line, &mut strings).unwrap();
        assert_eq!(parsed, instr);
    }

    #[test]
    fn string_value_escapes_and_unescapes() {
        let mut strings = StringTable::new();
        let offset = strings.add("a\nb");
        let v = Value::Str { offset, length: 3 };
        let text = format_value(&v, &strings);
        assert_eq!(text, "\"a\\nb\"");
    }
}
