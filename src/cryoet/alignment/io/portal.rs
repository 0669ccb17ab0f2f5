use std::io;

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};

use crate::cryoet::alignment::error::{Result, ToolError};
use crate::cryoet::alignment::io::text::float_repr;
use crate::cryoet::alignment::model::InterchangeAlignment;

const PORTAL_FORMAT: &str = "interchange JSON";

/// JSON layout of Python's `json.dumps` defaults: `", "` and `": "`
/// separators, `repr` floats and ASCII-only strings.
struct PythonJsonFormatter;

impl Formatter for PythonJsonFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_f64<W>(&mut self, writer: &mut W, value: f64) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(float_repr(value).as_bytes())
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if fragment.bytes().all(|byte| byte.is_ascii() && byte != 0x7f) {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() && ch != '\u{7f}' {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

/// Parses a data portal alignment document.
pub fn parse_portal(text: &str) -> Result<InterchangeAlignment> {
    serde_json::from_str(text).map_err(|err| ToolError::parse(PORTAL_FORMAT, err.to_string()))
}

/// Serialises a data portal alignment as a single-line JSON object in the
/// `json.dumps` layout portal documents are published in.
pub fn portal_to_string(alignment: &InterchangeAlignment) -> Result<String> {
    let mut buffer = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buffer, PythonJsonFormatter);
    alignment.serialize(&mut serializer)?;
    String::from_utf8(buffer).map_err(|err| ToolError::parse(PORTAL_FORMAT, err.to_string()))
}
