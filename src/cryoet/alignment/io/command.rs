//! Table-driven parser for IMOD keyword/value command files.
//!
//! Each command file declares a static table of [`FieldSpec`]s. The parser
//! walks the file once, matches the leading keyword of every line against the
//! table and converts the remainder according to the field kind. Lines that
//! start with `$` (shell directives) or `#` (comments) and unknown keywords
//! are skipped. The first occurrence of a keyword wins.

use std::collections::BTreeMap;

use crate::cryoet::alignment::error::{Result, ToolError};
use crate::cryoet::alignment::io::text::parse_range_list;

/// Value kind of a command field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Text,
    Int,
    Float,
    IntPair,
    FloatPair,
    /// Bare keyword, present or absent.
    Flag,
    /// IMOD range list such as `1,2-6,8`.
    RangeList,
}

/// One row of a command file's field table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldSpec {
    pub name: &'static str,
    /// Alternative keywords accepted besides `name`.
    pub keywords: &'static [&'static str],
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            keywords: &[],
            kind,
            required: false,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn aliases(mut self, keywords: &'static [&'static str]) -> Self {
        self.keywords = keywords;
        self
    }

    fn matches(&self, keyword: &str) -> bool {
        keyword == self.name || self.keywords.contains(&keyword)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
    IntPair(i64, i64),
    FloatPair(f64, f64),
    Flag,
    /// Expanded values and the list as written.
    List(Vec<usize>, String),
}

/// Field values collected from one command file.
#[derive(Debug, Default)]
pub(crate) struct ParsedFields {
    format: &'static str,
    values: BTreeMap<&'static str, FieldValue>,
}

pub(crate) fn parse_fields(
    format: &'static str,
    table: &[FieldSpec],
    text: &str,
) -> Result<ParsedFields> {
    let mut values = BTreeMap::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('$') || line.starts_with('#') {
            continue;
        }

        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (line, ""),
        };

        let Some(spec) = table.iter().find(|spec| spec.matches(keyword)) else {
            continue;
        };
        if values.contains_key(spec.name) {
            continue;
        }

        let value = parse_value(spec, rest).map_err(|message| {
            ToolError::parse(format, format!("line {}: {}: {message}", index + 1, spec.name))
        })?;
        values.insert(spec.name, value);
    }

    for spec in table.iter().filter(|spec| spec.required) {
        if !values.contains_key(spec.name) {
            return Err(ToolError::parse(
                format,
                format!("missing required field {}", spec.name),
            ));
        }
    }

    Ok(ParsedFields { format, values })
}

fn parse_value(spec: &FieldSpec, rest: &str) -> std::result::Result<FieldValue, String> {
    if rest.is_empty() && spec.kind != FieldKind::Flag {
        return Err("missing value".to_string());
    }

    Ok(match spec.kind {
        FieldKind::Text => FieldValue::Text(rest.to_string()),
        FieldKind::Int => FieldValue::Int(parse_integer(rest)?),
        FieldKind::Float => FieldValue::Float(parse_number(rest)?),
        FieldKind::IntPair => {
            let (first, second) = split_pair(rest)?;
            FieldValue::IntPair(parse_integer(first)?, parse_integer(second)?)
        }
        FieldKind::FloatPair => {
            let (first, second) = split_pair(rest)?;
            FieldValue::FloatPair(parse_number(first)?, parse_number(second)?)
        }
        FieldKind::Flag => FieldValue::Flag,
        FieldKind::RangeList => FieldValue::List(parse_range_list(rest)?, rest.to_string()),
    })
}

fn parse_number(token: &str) -> std::result::Result<f64, String> {
    token
        .parse::<f64>()
        .map_err(|_| format!("invalid number '{token}'"))
}

fn parse_integer(token: &str) -> std::result::Result<i64, String> {
    token
        .parse::<i64>()
        .map_err(|_| format!("invalid integer '{token}'"))
}

/// Splits `a b`, `a,b` or `a, b` into its two tokens.
fn split_pair(rest: &str) -> std::result::Result<(&str, &str), String> {
    let tokens: Vec<&str> = rest
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .collect();
    match tokens.as_slice() {
        [first, second] => Ok((*first, *second)),
        _ => Err(format!("expected two values, found '{rest}'")),
    }
}

impl ParsedFields {
    fn missing(&self, name: &str) -> ToolError {
        ToolError::parse(self.format, format!("missing required field {name}"))
    }

    fn mistyped(&self, name: &str) -> ToolError {
        ToolError::parse(self.format, format!("field {name} has an unexpected type"))
    }

    pub fn text(&self, name: &str) -> Result<Option<String>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(FieldValue::Text(value)) => Ok(Some(value.clone())),
            Some(_) => Err(self.mistyped(name)),
        }
    }

    pub fn required_text(&self, name: &str) -> Result<String> {
        self.text(name)?.ok_or_else(|| self.missing(name))
    }

    pub fn int(&self, name: &str) -> Result<Option<i64>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(FieldValue::Int(value)) => Ok(Some(*value)),
            Some(_) => Err(self.mistyped(name)),
        }
    }

    pub fn float(&self, name: &str) -> Result<Option<f64>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(FieldValue::Float(value)) => Ok(Some(*value)),
            Some(_) => Err(self.mistyped(name)),
        }
    }

    pub fn int_pair(&self, name: &str) -> Result<Option<(i64, i64)>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(FieldValue::IntPair(first, second)) => Ok(Some((*first, *second))),
            Some(_) => Err(self.mistyped(name)),
        }
    }

    pub fn float_pair(&self, name: &str) -> Result<Option<(f64, f64)>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(FieldValue::FloatPair(first, second)) => Ok(Some((*first, *second))),
            Some(_) => Err(self.mistyped(name)),
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(FieldValue::Flag))
    }

    pub fn list(&self, name: &str) -> Result<Option<Vec<usize>>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(FieldValue::List(values, _)) => Ok(Some(values.clone())),
            Some(_) => Err(self.mistyped(name)),
        }
    }

    /// The list exactly as it appeared in the file.
    pub fn list_text(&self, name: &str) -> Result<Option<String>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(FieldValue::List(_, text)) => Ok(Some(text.clone())),
            Some(_) => Err(self.mistyped(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[FieldSpec] = &[
        FieldSpec::new("Name", FieldKind::Text).required(),
        FieldSpec::new("Count", FieldKind::Int),
        FieldSpec::new("Size", FieldKind::IntPair),
        FieldSpec::new("Shift", FieldKind::FloatPair),
        FieldSpec::new("Verbose", FieldKind::Flag),
        FieldSpec::new("Skip", FieldKind::RangeList).aliases(&["SKIP", "Omit"]),
    ];

    #[test]
    fn parses_known_fields_and_ignores_the_rest() {
        let text = "$run -StandardInput\n# Count 99\nName  TS_01.mrc\nCount 3\nCount 4\nSize 10,20\nShift -1.5 2\nVerbose\nOmit 1,3-4\nUnknown 5\n";
        let fields = parse_fields("test", TABLE, text).expect("parsed");
        assert_eq!(fields.required_text("Name").unwrap(), "TS_01.mrc");
        assert_eq!(fields.int("Count").unwrap(), Some(3));
        assert_eq!(fields.int_pair("Size").unwrap(), Some((10, 20)));
        assert_eq!(fields.float_pair("Shift").unwrap(), Some((-1.5, 2.0)));
        assert!(fields.flag("Verbose"));
        assert_eq!(fields.list("Skip").unwrap(), Some(vec![1, 3, 4]));
        assert_eq!(fields.list_text("Skip").unwrap().as_deref(), Some("1,3-4"));
    }

    #[test]
    fn missing_required_field_is_reported() {
        let err = parse_fields("test", TABLE, "Count 3\n").unwrap_err();
        assert!(matches!(err, ToolError::Parse { .. }));
        assert!(err.to_string().contains("Name"));
    }

    #[test]
    fn malformed_value_reports_line() {
        let err = parse_fields("test", TABLE, "Name x\nCount three\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
