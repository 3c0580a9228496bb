//! Two-pass assembler for DCPU-16 programs.
//!
//! Accepts the syntax the disassembler prints, plus labels and directives:
//! ```text
//! ; Comment
//!         SET A, 0x30         ; literal
//!         SET [0x1000], 0x20  ; memory at literal address
//! :loop   SET I, 10           ; label (":name" or "name:")
//!         SET [0x2000 + I], [A]
//!         SUB I, 1
//!         IFN I, 0
//!         SET PC, loop
//!         JSR print
//!         ORG 0x100           ; pad with zeros up to 0x100
//! text:   DAT "hi", 0         ; one word per character
//! ```
//!
//! Label references always use the next-word encoding, so instruction sizes
//! are known in the first pass.

use crate::cpu::decode::{encode, BasicOp, ExtendedOp, Instruction, Operand};
use crate::cpu::memory::MEMORY_SIZE;
use crate::cpu::registers::Register;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to memory words, starting at address 0.
pub fn assemble(source: &str) -> Result<Vec<u16>, AssemblerError> {
    let mut asm = Assembler::new();
    // Pass 1: collect labels
    asm.run(source, false)?;
    // Pass 2: emit with every label known
    asm.run(source, true)
}

/// A numeric operand before label resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Number(u16),
    Label(String),
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> address).
    symbols: HashMap<String, u16>,
    /// Whether unresolved labels are an error (second pass).
    strict: bool,
    /// Output words; the current address is its length.
    output: Vec<u16>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            strict: false,
            output: Vec::new(),
        }
    }

    fn run(&mut self, source: &str, strict: bool) -> Result<Vec<u16>, AssemblerError> {
        self.strict = strict;
        self.output.clear();

        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        Ok(std::mem::take(&mut self.output))
    }

    fn current_addr(&self) -> u16 {
        self.output.len() as u16
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let mut line = strip_comment(line).trim();

        // Label definitions: ":name" prefix or "name:" prefix
        loop {
            if let Some(rest) = line.strip_prefix(':') {
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                self.define_label(&rest[..end], line_num)?;
                line = rest[end..].trim_start();
            } else if let Some(colon) = label_suffix(line) {
                self.define_label(&line[..colon], line_num)?;
                line = line[colon + 1..].trim_start();
            } else {
                break;
            }
        }

        if line.is_empty() {
            return Ok(());
        }

        let (mnemonic, rest) = match line.find(char::is_whitespace) {
            Some(idx) => (&line[..idx], line[idx..].trim()),
            None => (line, ""),
        };
        let mnemonic = mnemonic.to_uppercase();
        let operands = split_operands(rest);

        match mnemonic.as_str() {
            "DAT" | "DATA" => self.process_data(&operands, line_num)?,
            "ORG" => self.process_org(&operands, line_num)?,
            _ => {
                let instr = self.parse_instruction(&mnemonic, &operands, line_num)?;
                self.output.extend(encode(&instr));
            }
        }

        if self.output.len() > MEMORY_SIZE {
            return Err(AssemblerError::ProgramTooLarge { line: line_num });
        }
        Ok(())
    }

    fn define_label(&mut self, name: &str, line_num: usize) -> Result<(), AssemblerError> {
        if !is_identifier(name) || is_reserved(name) {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid label name '{}'", name),
            });
        }

        if self.output.len() >= MEMORY_SIZE {
            return Err(AssemblerError::ProgramTooLarge { line: line_num });
        }

        let key = name.to_uppercase();
        let addr = self.current_addr();
        match self.symbols.get(&key) {
            // The second pass sees every label again.
            Some(&existing) if self.strict && existing == addr => Ok(()),
            Some(_) => Err(AssemblerError::DuplicateLabel { line: line_num, label: name.to_string() }),
            None => {
                self.symbols.insert(key, addr);
                Ok(())
            }
        }
    }

    fn process_data(&mut self, operands: &[&str], line_num: usize) -> Result<(), AssemblerError> {
        if operands.is_empty() {
            return Err(AssemblerError::SyntaxError { line: line_num, message: "DAT requires a value".into() });
        }

        for operand in operands {
            if let Some(text) = operand.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
                self.output.extend(text.chars().map(|c| c as u16));
            } else {
                let value = self.parse_value(operand, line_num)?;
                let word = self.resolve(&value, line_num)?;
                self.output.push(word);
            }
        }
        Ok(())
    }

    fn process_org(&mut self, operands: &[&str], line_num: usize) -> Result<(), AssemblerError> {
        let [operand] = operands else {
            return Err(AssemblerError::SyntaxError { line: line_num, message: "ORG requires one address".into() });
        };
        let value = self.parse_value(operand, line_num)?;
        let target = self.resolve(&value, line_num)? as usize;

        if target < self.output.len() {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("ORG {:#x} is behind the current address {:#x}", target, self.output.len()),
            });
        }
        self.output.resize(target, 0);
        Ok(())
    }

    fn parse_instruction(&self, mnemonic: &str, operands: &[&str], line_num: usize)
        -> Result<Instruction, AssemblerError>
    {
        if let Some(op) = BasicOp::from_mnemonic(mnemonic) {
            let [a, b] = operands else {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("{} takes two operands", mnemonic),
                });
            };
            let a = self.parse_operand(a, line_num)?;
            let b = self.parse_operand(b, line_num)?;
            return Ok(Instruction::Basic { op, a, b });
        }

        if let Some(op) = ExtendedOp::from_mnemonic(mnemonic) {
            let [a] = operands else {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("{} takes one operand", mnemonic),
                });
            };
            let a = self.parse_operand(a, line_num)?;
            return Ok(Instruction::Extended { op, a });
        }

        Err(AssemblerError::UnknownMnemonic { line: line_num, mnemonic: mnemonic.to_string() })
    }

    fn parse_operand(&self, text: &str, line_num: usize) -> Result<Operand, AssemblerError> {
        let text = text.trim();

        if let Some(inner) = text.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            return self.parse_memory_operand(inner, line_num);
        }

        if let Some(reg) = Register::from_name(text) {
            return Ok(Operand::Register(reg));
        }

        match text.to_uppercase().as_str() {
            "POP" => return Ok(Operand::Pop),
            "PEEK" => return Ok(Operand::Peek),
            "PUSH" => return Ok(Operand::Push),
            "SP" => return Ok(Operand::Sp),
            "PC" => return Ok(Operand::Pc),
            "O" => return Ok(Operand::O),
            _ => {}
        }

        match self.parse_value(text, line_num)? {
            Value::Number(n) => Ok(Operand::literal(n)),
            label => Ok(Operand::NextLiteral(self.resolve(&label, line_num)?)),
        }
    }

    /// Parse the inside of `[...]`: `reg`, `value`, `reg + value` or `value + reg`.
    fn parse_memory_operand(&self, inner: &str, line_num: usize) -> Result<Operand, AssemblerError> {
        let parts: Vec<&str> = inner.split('+').map(str::trim).collect();

        match parts.as_slice() {
            [single] => match Register::from_name(single) {
                Some(reg) => Ok(Operand::Indirect(reg)),
                None => {
                    let value = self.parse_value(single, line_num)?;
                    Ok(Operand::Memory(self.resolve(&value, line_num)?))
                }
            },
            [left, right] => {
                let (reg, offset) = match (Register::from_name(left), Register::from_name(right)) {
                    (Some(reg), None) => (reg, right),
                    (None, Some(reg)) => (reg, left),
                    _ => {
                        return Err(AssemblerError::SyntaxError {
                            line: line_num,
                            message: format!("expected [register + value], found [{}]", inner),
                        })
                    }
                };
                let value = self.parse_value(offset, line_num)?;
                Ok(Operand::IndirectOffset(reg, self.resolve(&value, line_num)?))
            }
            _ => Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("malformed memory operand [{}]", inner),
            }),
        }
    }

    fn parse_value(&self, text: &str, line_num: usize) -> Result<Value, AssemblerError> {
        let text = text.trim();

        if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            return u16::from_str_radix(hex, 16)
                .map(Value::Number)
                .map_err(|_| AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid hex literal '{}'", text),
                });
        }

        if let Ok(num) = text.parse::<i64>() {
            if !(-0x8000..=0xffff).contains(&num) {
                return Err(AssemblerError::ValueOutOfRange { line: line_num, value: num });
            }
            return Ok(Value::Number(num as u16));
        }

        if is_identifier(text) && !is_reserved(text) {
            return Ok(Value::Label(text.to_uppercase()));
        }

        Err(AssemblerError::SyntaxError { line: line_num, message: format!("invalid value '{}'", text) })
    }

    fn resolve(&self, value: &Value, line_num: usize) -> Result<u16, AssemblerError> {
        match value {
            Value::Number(n) => Ok(*n),
            Value::Label(label) => match self.symbols.get(label) {
                Some(&addr) => Ok(addr),
                None if !self.strict => Ok(0),
                None => Err(AssemblerError::UndefinedLabel { line: line_num, label: label.clone() }),
            },
        }
    }
}

/// Remove a `;` comment, ignoring semicolons inside string literals.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (idx, c) in line.char_indices() {
        match c {
            '"' => in_string = !in_string,
            ';' if !in_string => return &line[..idx],
            _ => {}
        }
    }
    line
}

/// Byte index of the colon in a leading `name:` label, if any.
fn label_suffix(line: &str) -> Option<usize> {
    let token_end = line.find(char::is_whitespace).unwrap_or(line.len());
    let token = &line[..token_end];
    token.strip_suffix(':').filter(|name| is_identifier(name)).map(str::len)
}

/// Split operands on commas outside brackets and string literals.
fn split_operands(text: &str) -> Vec<&str> {
    let mut operands = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut start = 0;

    for (idx, c) in text.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '[' if !in_string => depth += 1,
            ']' if !in_string => depth = depth.saturating_sub(1),
            ',' if !in_string && depth == 0 => {
                operands.push(text[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }

    let last = text[start..].trim();
    if !last.is_empty() || !operands.is_empty() {
        operands.push(last);
    }
    operands
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn is_reserved(name: &str) -> bool {
    Register::from_name(name).is_some()
        || ["POP", "PEEK", "PUSH", "SP", "PC", "O"]
            .iter()
            .any(|kw| kw.eq_ignore_ascii_case(name))
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("program does not fit in memory at line {line}")]
    ProgramTooLarge { line: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            ; Simple test program
            SET A, 0x30
            SET [0x1000], 0x20
            SUB A, [0x1000]
        "#;

        let words = assemble(source).unwrap();
        assert_eq!(words, vec![0x7c01, 0x0030, 0x7de1, 0x1000, 0x0020, 0x7803, 0x1000]);
    }

    #[test]
    fn test_assemble_memory_forms() {
        let words = assemble("SET [0x2000 + I], [A]\nSET [I+0x2000], [A]").unwrap();
        assert_eq!(words, vec![0x2161, 0x2000, 0x2161, 0x2000]);
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
        :loop   SET I, 10
                SUB I, 1
                IFN I, 0
                SET PC, loop
        end:    SET PC, end
        "#;

        let words = assemble(source).unwrap();
        // SET PC, loop -> next-word literal 0
        assert_eq!(&words[3..5], &[0x7dc1, 0x0000]);
        // end is at address 5
        assert_eq!(&words[5..7], &[0x7dc1, 0x0005]);
    }

    #[test]
    fn test_forward_reference() {
        let words = assemble("JSR sub\nSET A, 1\nsub: SET B, 2").unwrap();
        assert_eq!(words[0], 0x7c10);
        assert_eq!(words[1], 3);
    }

    #[test]
    fn test_assemble_data() {
        let words = assemble("DAT 42, -1, 0xbeef\nDAT \"hi;\", 0").unwrap();
        assert_eq!(words, vec![42, 0xffff, 0xbeef, 'h' as u16, 'i' as u16, ';' as u16, 0]);
    }

    #[test]
    fn test_org_pads() {
        let words = assemble("SET A, 1\nORG 4\nDAT 7").unwrap();
        assert_eq!(words, vec![0x8401, 0, 0, 0, 7]);

        assert!(assemble("DAT 1, 2\nORG 1").is_err());
    }

    #[test]
    fn test_program_must_fit_in_memory() {
        assert!(matches!(
            assemble("ORG 0xffff\nDAT 1, 2\nlbl: DAT 3\nSET PC, lbl"),
            Err(AssemblerError::ProgramTooLarge { line: 2 })
        ));
        assert!(matches!(
            assemble("ORG 0xffff\nDAT 1\nend:"),
            Err(AssemblerError::ProgramTooLarge { line: 3 })
        ));

        let words = assemble("ORG 0xffff\nDAT 7").unwrap();
        assert_eq!(words.len(), MEMORY_SIZE);
        assert_eq!(words[0xffff], 7);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            assemble("FOO A, 1"),
            Err(AssemblerError::UnknownMnemonic { line: 1, .. })
        ));
        assert!(matches!(
            assemble("\nSET PC, nowhere"),
            Err(AssemblerError::UndefinedLabel { line: 2, .. })
        ));
        assert!(matches!(
            assemble("x: DAT 1\nx: DAT 2"),
            Err(AssemblerError::DuplicateLabel { line: 2, .. })
        ));
        assert!(matches!(
            assemble("DAT 70000"),
            Err(AssemblerError::ValueOutOfRange { value: 70000, .. })
        ));
        assert!(matches!(assemble("SET A"), Err(AssemblerError::SyntaxError { .. })));
        assert!(matches!(assemble("SET [A + B], 1"), Err(AssemblerError::SyntaxError { .. })));
    }
}
