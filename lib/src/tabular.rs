//! Minimal CSV reading and writing for the pipeline checkpoints.
//!
//! The checkpoint files only ever hold URIs, short literal values and
//! numbers, so this sticks to the common quoting rules: fields containing a
//! comma, quote or newline are wrapped in double quotes with embedded quotes
//! doubled. No external dialect knobs.

use crate::error::{CompletenessError, Result};

/// Escapes one field for CSV output.
pub fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Appends one row, terminated by `\n`.
pub fn write_row(out: &mut String, fields: &[&str]) {
    let escaped: Vec<String> = fields.iter().map(|f| escape(f)).collect();
    out.push_str(&escaped.join(","));
    out.push('\n');
}

/// Parses CSV text into rows of fields, honoring quoted fields.
///
/// Empty trailing lines are skipped. A quote opening mid-field is treated as
/// a literal character, matching how the checkpoint writers produce output.
pub fn read(text: &str) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => {
                row.push(std::mem::take(&mut field));
            }
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }
    if in_quotes {
        return Err(CompletenessError::Tabular(
            "unterminated quoted field".into(),
        ));
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    Ok(rows)
}
