//! Small helpers shared by the line-oriented codecs.

use crate::cryoet::alignment::error::{Result, ToolError};

/// Renders a float the way the alignment tools' reference writers do:
/// shortest round-trip digits, a trailing `.0` for integral values and a
/// signed two-digit exponent in scientific notation (`1e-05`, `1e+16`).
pub fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let repr = format!("{value:?}");
    match repr.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => repr,
    }
}

pub(crate) fn parse_f64(format: &'static str, line: usize, token: &str) -> Result<f64> {
    token.trim().parse::<f64>().map_err(|_| {
        ToolError::parse(format, format!("line {line}: invalid number '{token}'"))
    })
}

pub(crate) fn parse_int<T: std::str::FromStr>(format: &'static str, line: usize, token: &str) -> Result<T> {
    token.trim().parse::<T>().map_err(|_| {
        ToolError::parse(format, format!("line {line}: invalid integer '{token}'"))
    })
}

/// Non-empty lines paired with their 1-based line numbers.
pub(crate) fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}

/// Parses IMOD range lists such as `1,2-6,8,10-12`.
pub fn parse_range_list(text: &str) -> std::result::Result<Vec<usize>, String> {
    let mut values = Vec::new();
    for part in text.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start: usize = start
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid range start in '{part}'"))?;
                let end: usize = end
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid range end in '{part}'"))?;
                if end < start {
                    return Err(format!("descending range '{part}'"));
                }
                values.extend(start..=end);
            }
            None => values.push(
                part.parse()
                    .map_err(|_| format!("invalid list entry '{part}'"))?,
            ),
        }
    }
    Ok(values)
}

/// Formats sorted values as an IMOD range list, collapsing runs into `a-b`.
pub fn format_range_list(values: &[usize]) -> String {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut parts = Vec::new();
    let mut iter = sorted.into_iter().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            iter.next();
        }
        if end == start {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}-{end}"));
        }
    }
    parts.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_repr_matches_reference_writers() {
        assert_eq!(float_repr(-60.0), "-60.0");
        assert_eq!(float_repr(-58.5), "-58.5");
        assert_eq!(float_repr(0.0), "0.0");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(1e-5), "1e-05");
        assert_eq!(float_repr(1.5e-7), "1.5e-07");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(12.6611), "12.6611");
    }

    #[test]
    fn range_lists_expand() {
        assert_eq!(
            parse_range_list("1,2-6,8,10-12").expect("parsed"),
            vec![1, 2, 3, 4, 5, 6, 8, 10, 11, 12]
        );
        assert_eq!(parse_range_list("").expect("parsed"), Vec::<usize>::new());
        assert!(parse_range_list("4-2").is_err());
        assert!(parse_range_list("a").is_err());
    }

    #[test]
    fn range_lists_collapse_runs() {
        assert_eq!(
            format_range_list(&[1, 2, 3, 4, 5, 6, 8, 10, 11, 12]),
            "1-6,8,10-12"
        );
        assert_eq!(format_range_list(&[89, 1, 2, 90]), "1-2,89-90");
        assert_eq!(format_range_list(&[]), "");
    }
}
