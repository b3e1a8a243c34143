//! JSON I/O handling for CLI
//!
//! - Input: JSON lines or a single JSON document on stdin
//! - Output: one JSON object per line on stdout
//! - UTF-8 only

use std::io::{self, BufRead, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use super::errors::{CliError, CliResult};

/// Parse one value per non-blank line
pub fn parse_lines<T: DeserializeOwned, R: BufRead>(reader: R) -> CliResult<Vec<T>> {
    let mut values = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line)
            .map_err(|e| CliError::input_error(format!("line {}: {}", index + 1, e)))?;
        values.push(value);
    }
    Ok(values)
}

/// Read JSON lines from stdin
pub fn read_lines<T: DeserializeOwned>() -> CliResult<Vec<T>> {
    parse_lines(io::stdin().lock())
}

/// Read a single JSON document from stdin
pub fn read_request<T: DeserializeOwned>() -> CliResult<T> {
    let mut input = String::new();
    io::stdin().lock().read_to_string(&mut input)?;
    if input.trim().is_empty() {
        return Err(CliError::input_error("Empty input"));
    }
    Ok(serde_json::from_str(&input)?)
}

/// Read stdin as raw bytes
pub fn read_bytes() -> CliResult<Vec<u8>> {
    let mut data = Vec::new();
    io::stdin().lock().read_to_end(&mut data)?;
    Ok(data)
}

/// Write a success response to stdout
pub fn write_response<T: Serialize>(data: &T) -> CliResult<()> {
    write_line(&json!({
        "status": "ok",
        "data": data
    }))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_line(&json!({
        "status": "error",
        "code": code,
        "message": message
    }))
}

/// Write raw bytes to stdout
pub fn write_bytes(data: &[u8]) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(data)?;
    stdout.flush()?;
    Ok(())
}

fn write_line(value: &serde_json::Value) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::RxDocumentWriteData;

    #[test]
    fn test_parse_lines_skips_blanks() {
        let input = "{\"id\":\"a\",\"data\":{}}\n\n{\"id\":\"b\",\"data\":{\"n\":1}}\n";
        let writes: Vec<RxDocumentWriteData> = parse_lines(input.as_bytes()).unwrap();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1].id, "b");
    }

    #[test]
    fn test_parse_lines_reports_line_number() {
        let input = "{\"id\":\"a\",\"data\":{}}\nnot json\n";
        let err = parse_lines::<RxDocumentWriteData, _>(input.as_bytes()).unwrap_err();
        assert!(err.to_string().starts_with("line 2:"));
    }
}
