//! Object-like macro preprocessing
//!
//! Sketches lean on `#define` for pin numbers and tuning constants. This pass
//! handles exactly that subset:
//!
//! - `#define NAME body` records the macro and substitutes `body` for every
//!   later occurrence of `NAME` outside string/char literals and comments
//! - `#undef NAME` forgets a macro
//! - every other directive (`#include`, `#pragma`, conditionals) is dropped
//!
//! Directive lines are replaced by empty lines so token locations still match
//! the original source. Macros whose body is a single literal are also
//! collected into a [`MacroTable`], which the interpreter consults when it
//! meets an identifier that is not a variable (for trees decoded from the
//! binary format, where no textual substitution happened).

use super::ast::SourceLocation;
use super::parse::ParseError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MAX_EXPANSION_DEPTH: usize = 16;

/// Literal value of an object-like macro
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MacroValue {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Macro name → literal value, ordered for deterministic iteration
pub type MacroTable = BTreeMap<String, MacroValue>;

/// Output of [`preprocess`]
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessed {
    pub source: String,
    pub macros: MacroTable,
}

/// Strip directives and expand object-like macros.
pub fn preprocess(source: &str) -> Result<Preprocessed, ParseError> {
    let mut bodies: BTreeMap<String, String> = BTreeMap::new();
    let mut output = String::with_capacity(source.len());

    for (index, line) in source.lines().enumerate() {
        let trimmed = line.trim_start();
        if let Some(directive) = trimmed.strip_prefix('#') {
            let location = SourceLocation::new(index as u32 + 1, 1);
            handle_directive(directive.trim_start(), location, &mut bodies)?;
            output.push('\n');
            continue;
        }

        output.push_str(&expand_line(line, &bodies, 0));
        output.push('\n');
    }

    let macros = bodies
        .iter()
        .filter_map(|(name, body)| {
            let expanded = expand_line(body, &bodies, 0);
            parse_literal(&expanded).map(|value| (name.clone(), value))
        })
        .collect();

    Ok(Preprocessed {
        source: output,
        macros,
    })
}

fn handle_directive(
    directive: &str,
    location: SourceLocation,
    bodies: &mut BTreeMap<String, String>,
) -> Result<(), ParseError> {
    if let Some(rest) = directive.strip_prefix("define") {
        let rest = rest.trim_start();
        let name: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if name.is_empty() {
            return Err(ParseError {
                message: "Expected macro name after #define".to_string(),
                location,
            });
        }
        let body = &rest[name.len()..];
        if body.starts_with('(') {
            return Err(ParseError {
                message: format!("Function-like macro '{}' is not supported", name),
                location,
            });
        }
        bodies.insert(name, strip_line_comment(body).trim().to_string());
    } else if let Some(rest) = directive.strip_prefix("undef") {
        bodies.remove(rest.trim());
    }
    Ok(())
}

fn strip_line_comment(text: &str) -> &str {
    match text.find("//") {
        Some(pos) => &text[..pos],
        None => text,
    }
}

/// Substitute macro names in one line, skipping literals and comments.
fn expand_line(line: &str, bodies: &BTreeMap<String, String>, depth: usize) -> String {
    if bodies.is_empty() || depth >= MAX_EXPANSION_DEPTH {
        return line.to_string();
    }

    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '"' | '\'' => {
                let end = literal_end(&chars, i);
                out.extend(&chars[i..end]);
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                out.extend(&chars[i..]);
                break;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match bodies.get(&word) {
                    Some(body) => out.push_str(&expand_line(body, bodies, depth + 1)),
                    None => out.push_str(&word),
                }
            }
            c if c.is_ascii_digit() => {
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                    out.push(chars[i]);
                    i += 1;
                }
            }
            _ => {
                out.push(ch);
                i += 1;
            }
        }
    }

    out
}

/// Index just past the string or char literal starting at `start`.
fn literal_end(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

fn parse_literal(body: &str) -> Option<MacroValue> {
    let mut text = body.trim();
    while text.starts_with('(') && text.ends_with(')') {
        text = text[1..text.len() - 1].trim();
    }

    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        return Some(MacroValue::Text(text[1..text.len() - 1].to_string()));
    }

    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, text),
    };
    let digits = digits.trim_end_matches(['u', 'U', 'l', 'L']);

    let int = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok()
    } else {
        digits.parse::<i64>().ok()
    };
    if let Some(n) = int {
        return Some(MacroValue::Int(if negative { -n } else { n }));
    }

    if !digits.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let float = digits.trim_end_matches(['f', 'F']).parse::<f64>().ok()?;
    Some(MacroValue::Float(if negative { -float } else { float }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_substitution() {
        let out = preprocess("#define LED 13\npinMode(LED, OUTPUT);\n").unwrap();
        assert_eq!(out.source, "\npinMode(13, OUTPUT);\n");
        assert_eq!(out.macros.get("LED"), Some(&MacroValue::Int(13)));
    }

    #[test]
    fn test_strings_and_comments_untouched() {
        let out = preprocess("#define X 1\nprint(\"X\"); // X\nX;").unwrap();
        assert!(out.source.contains("print(\"X\"); // X"));
        assert!(out.source.ends_with("1;\n"));
    }

    #[test]
    fn test_nested_macros_and_literal_table() {
        let source = "#define BASE 0x10\n#define LIMIT (BASE)\n#define RATIO 2.5f\n#define NAME \"bot\"\n#define EXPR BASE + 1\n";
        let out = preprocess(source).unwrap();
        assert_eq!(out.macros.get("LIMIT"), Some(&MacroValue::Int(16)));
        assert_eq!(out.macros.get("RATIO"), Some(&MacroValue::Float(2.5)));
        assert_eq!(out.macros.get("NAME"), Some(&MacroValue::Text("bot".to_string())));
        assert!(!out.macros.contains_key("EXPR"));
    }

    #[test]
    fn test_undef_and_include() {
        let out = preprocess("#include <Servo.h>\n#define A 1\n#undef A\nA;").unwrap();
        assert_eq!(out.source, "\n\n\nA;\n");
        assert!(out.macros.is_empty());
    }

    #[test]
    fn test_function_like_macro_rejected() {
        let err = preprocess("\n#define SQ(x) ((x)*(x))\n").unwrap_err();
        assert_eq!(err.location.line, 2);
        assert!(err.message.contains("Function-like"));
    }
}
