use crate::cryoet::alignment::error::{Result, ToolError};
use crate::cryoet::alignment::io::text::{content_lines, float_repr, parse_f64};
use crate::cryoet::alignment::model::{TiltAngles, XfFile, XfRow};

const XF_FORMAT: &str = "IMOD transform file";
const ANGLE_FORMAT: &str = "IMOD angle file";

/// Parses an `.xf` file: six whitespace-separated numbers per line.
pub fn parse_xf(text: &str) -> Result<XfFile> {
    let rows = content_lines(text)
        .map(|(line, content)| {
            let values = content
                .split_whitespace()
                .map(|token| parse_f64(XF_FORMAT, line, token))
                .collect::<Result<Vec<_>>>()?;
            let row: [f64; 6] = values.as_slice().try_into().map_err(|_| {
                ToolError::parse(
                    XF_FORMAT,
                    format!("line {line}: expected 6 columns, found {}", values.len()),
                )
            })?;
            Ok(XfRow::from_row(&row))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(XfFile::new(rows))
}

/// Serialises an `.xf` file with IMOD's fixed column widths.
pub fn xf_to_string(xf: &XfFile) -> String {
    let mut output = String::new();
    for row in &xf.rows {
        output.push_str(&format!(
            "{:>12.7}{:>12.7}{:>12.7}{:>12.7}{:>12.3}{:>12.3}\n",
            row.mxx, row.mxy, row.myx, row.myy, row.sx, row.sy
        ));
    }
    output
}

/// Parses a one-angle-per-line file (`.tlt`, `.rawtlt`, `.xtilt`).
pub fn parse_angles(text: &str) -> Result<TiltAngles> {
    let angles = content_lines(text)
        .map(|(line, content)| parse_f64(ANGLE_FORMAT, line, content))
        .collect::<Result<Vec<_>>>()?;
    Ok(TiltAngles::new(angles))
}

pub fn angles_to_string(angles: &TiltAngles) -> String {
    let mut output = String::new();
    for angle in &angles.angles {
        output.push_str(&float_repr(*angle));
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    const XF: &str = "   0.9756808   0.2191424  -0.2191424   0.9756808     -23.589       7.887\n   0.9756808   0.2191424  -0.2191424   0.9756808     -35.498      15.935\n";

    #[test]
    fn xf_roundtrip_is_byte_identical() {
        let xf = parse_xf(XF).expect("xf parsed");
        assert_eq!(xf.len(), 2);
        assert_eq!(xf.rows[1].sx, -35.498);
        assert_eq!(xf_to_string(&xf), XF);
    }

    #[test]
    fn xf_rejects_short_rows() {
        let err = parse_xf("1 0 0 1 2\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn angle_roundtrip_is_byte_identical() {
        let text = "-61.5\n-60.0\n-58.5\n0.0\n1e-05\n";
        let angles = parse_angles(text).expect("angles parsed");
        assert_eq!(angles.angles, vec![-61.5, -60.0, -58.5, 0.0, 1e-5]);
        assert_eq!(angles_to_string(&angles), text);
    }

    #[test]
    fn angles_tolerate_padding_and_blank_lines() {
        let angles = parse_angles("  -3.0\n\n   3\n").expect("angles parsed");
        assert_eq!(angles.angles, vec![-3.0, 3.0]);
    }
}
