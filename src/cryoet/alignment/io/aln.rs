use std::fmt::Write;

use crate::cryoet::alignment::error::{Result, ToolError};
use crate::cryoet::alignment::io::text::{content_lines, parse_f64, parse_int};
use crate::cryoet::alignment::model::aretomo::DEFAULT_HEADER;
use crate::cryoet::alignment::model::{AlnFile, DarkFrame, GlobalAlignmentRow, LocalAlignmentRow};

const ALN_FORMAT: &str = "AreTomo3 alignment";

const GLOBAL_HEADER: &str = "# SEC     ROT         GMAG       TX          TY      SMEAN     SFIT    SCALE     BASE     TILT";
const LOCAL_MARKER: &str = "# Local Alignment";

#[derive(Clone, Copy)]
enum Block {
    Preamble,
    Global,
    Local,
}

/// Parses an AreTomo3 `.aln` file.
pub fn parse_aln(text: &str) -> Result<AlnFile> {
    let mut header = None;
    let mut raw_size = None;
    let mut num_patches = None;
    let mut alpha_offset = None;
    let mut beta_offset = None;
    let mut dark_frames = Vec::new();
    let mut global_alignments = Vec::new();
    let mut local_alignments = Vec::new();
    let mut block = Block::Preamble;

    for (line, content) in content_lines(text) {
        if content.starts_with("# AreTomo Alignment") {
            header = Some(content.to_string());
        } else if content.starts_with("# RawSize") {
            let values = header_values(line, content)?
                .split_whitespace()
                .map(|token| parse_int::<usize>(ALN_FORMAT, line, token))
                .collect::<Result<Vec<_>>>()?;
            let size: [usize; 3] = values.as_slice().try_into().map_err(|_| {
                ToolError::parse(ALN_FORMAT, format!("line {line}: RawSize needs 3 values"))
            })?;
            raw_size = Some(size);
        } else if content.starts_with("# NumPatches") {
            num_patches = Some(parse_int(ALN_FORMAT, line, header_values(line, content)?)?);
        } else if content.starts_with("# DarkFrame") {
            dark_frames.push(parse_dark_frame(line, content)?);
        } else if content.starts_with("# AlphaOffset") {
            alpha_offset = Some(parse_f64(ALN_FORMAT, line, header_values(line, content)?)?);
        } else if content.starts_with("# BetaOffset") {
            beta_offset = Some(parse_f64(ALN_FORMAT, line, header_values(line, content)?)?);
        } else if content.starts_with("# SEC") {
            block = Block::Global;
        } else if content.starts_with(LOCAL_MARKER) {
            block = Block::Local;
        } else if content.starts_with('#') {
            continue;
        } else {
            match block {
                Block::Global => global_alignments.push(parse_global_row(line, content)?),
                Block::Local => local_alignments.push(parse_local_row(line, content)?),
                Block::Preamble => {
                    return Err(ToolError::parse(
                        ALN_FORMAT,
                        format!("line {line}: data row before the '# SEC' header"),
                    ));
                }
            }
        }
    }

    let missing = |name: &str| ToolError::parse(ALN_FORMAT, format!("missing '# {name}' line"));
    Ok(AlnFile {
        header: header.unwrap_or_else(|| DEFAULT_HEADER.to_string()),
        raw_size: raw_size.ok_or_else(|| missing("RawSize"))?,
        num_patches: num_patches.ok_or_else(|| missing("NumPatches"))?,
        dark_frames,
        alpha_offset: alpha_offset.ok_or_else(|| missing("AlphaOffset"))?,
        beta_offset: beta_offset.ok_or_else(|| missing("BetaOffset"))?,
        global_alignments,
        local_alignments,
    })
}

fn header_values(line: usize, content: &str) -> Result<&str> {
    content
        .split_once('=')
        .map(|(_, values)| values.trim())
        .ok_or_else(|| ToolError::parse(ALN_FORMAT, format!("line {line}: expected '='")))
}

fn columns<'a>(line: usize, content: &'a str, expected: usize) -> Result<Vec<&'a str>> {
    let tokens: Vec<&str> = content.split_whitespace().collect();
    if tokens.len() != expected {
        return Err(ToolError::parse(
            ALN_FORMAT,
            format!("line {line}: expected {expected} columns, found {}", tokens.len()),
        ));
    }
    Ok(tokens)
}

fn parse_dark_frame(line: usize, content: &str) -> Result<DarkFrame> {
    let tokens = columns(line, header_values(line, content)?, 3)?;
    Ok(DarkFrame {
        section_idx: parse_int(ALN_FORMAT, line, tokens[0])?,
        val2: parse_int(ALN_FORMAT, line, tokens[1])?,
        angle: parse_f64(ALN_FORMAT, line, tokens[2])?,
    })
}

fn parse_global_row(line: usize, content: &str) -> Result<GlobalAlignmentRow> {
    let tokens = columns(line, content, 10)?;
    let number = |index: usize| parse_f64(ALN_FORMAT, line, tokens[index]);
    Ok(GlobalAlignmentRow {
        sec: parse_int(ALN_FORMAT, line, tokens[0])?,
        rot: number(1)?,
        gmag: number(2)?,
        tx: number(3)?,
        ty: number(4)?,
        smean: number(5)?,
        sfit: number(6)?,
        scale: number(7)?,
        base: number(8)?,
        tilt: number(9)?,
    })
}

fn parse_local_row(line: usize, content: &str) -> Result<LocalAlignmentRow> {
    let tokens = columns(line, content, 7)?;
    let number = |index: usize| parse_f64(ALN_FORMAT, line, tokens[index]);
    Ok(LocalAlignmentRow {
        sec_idx: parse_int(ALN_FORMAT, line, tokens[0])?,
        patch_idx: parse_int(ALN_FORMAT, line, tokens[1])?,
        center_x: number(2)?,
        center_y: number(3)?,
        shift_x: number(4)?,
        shift_y: number(5)?,
        is_reliable: number(6)?,
    })
}

/// Serialises an `.aln` file in AreTomo3's fixed-width layout.
pub fn aln_to_string(aln: &AlnFile) -> Result<String> {
    let mut out = String::new();
    write_aln(&mut out, aln)?;
    Ok(out)
}

fn write_aln(out: &mut String, aln: &AlnFile) -> std::fmt::Result {
    writeln!(out, "{}", aln.header)?;
    writeln!(
        out,
        "# RawSize = {} {} {}",
        aln.raw_size[0], aln.raw_size[1], aln.raw_size[2]
    )?;
    writeln!(out, "# NumPatches = {}", aln.num_patches)?;
    // AreTomo leaves an empty line when there are no dark frames.
    if aln.dark_frames.is_empty() {
        writeln!(out)?;
    }
    for frame in &aln.dark_frames {
        writeln!(
            out,
            "# DarkFrame ={:>6}{:>5}{:>9.2}",
            frame.section_idx, frame.val2, frame.angle
        )?;
    }
    writeln!(out, "# AlphaOffset ={:>9.2}", aln.alpha_offset)?;
    writeln!(out, "# BetaOffset ={:>9.2}", aln.beta_offset)?;
    writeln!(out, "{GLOBAL_HEADER}")?;
    for row in &aln.global_alignments {
        writeln!(
            out,
            "{:>5}{:>11.4}{:>11.5}{:>11.3}{:>11.3}{:>9.2}{:>9.2}{:>9.2}{:>9.2}{:>10.2}",
            row.sec,
            row.rot,
            row.gmag,
            row.tx,
            row.ty,
            row.smean,
            row.sfit,
            row.scale,
            row.base,
            row.tilt
        )?;
    }
    writeln!(out, "{LOCAL_MARKER}")?;
    if aln.local_alignments.is_empty() {
        writeln!(out)?;
    }
    for row in &aln.local_alignments {
        writeln!(
            out,
            "{:>4}{:>4}{:>9.2}{:>10.2}{:>10.2}{:>10.2}{:>6.1}",
            row.sec_idx,
            row.patch_idx,
            row.center_x,
            row.center_y,
            row.shift_x,
            row.shift_y,
            row.is_reliable
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALN: &str = "# AreTomo Alignment / Priims bprmMn
# RawSize = 2032 2032 6
# NumPatches = 2
# DarkFrame =     0    0   -66.00
# DarkFrame =     5    0    67.50
# AlphaOffset =     0.00
# BetaOffset =     0.00
# SEC     ROT         GMAG       TX          TY      SMEAN     SFIT    SCALE     BASE     TILT
    0   -12.6611    1.00000     24.786     -2.677     1.00     1.00     1.00     0.00    -61.50
    1   -12.6611    1.00000     34.451     -8.599     1.00     1.00     1.00     0.00    -60.00
    2   -12.6611    1.00000      9.951     -7.690     1.00     1.00     1.00     0.00    -58.50
    3   -12.6611    1.00000      5.538     -2.504     1.00     1.00     1.00     0.00    -57.00
# Local Alignment
   0   0  -640.55   -630.71     -9.40     -5.81   1.0
   0   1   -21.37   -629.39     -4.25      2.96   1.0
   1   0  -640.24   -631.70     -2.73     -1.49   1.0
   1   1   -21.18   -630.53     -1.41      0.41   1.0
   2   0  -640.08   -632.26     -0.47      1.35   1.0
   2   1   -21.06   -631.18     -0.56      1.64   1.0
   3   0  -639.98   -632.54      1.80      1.86   0.0
   3   1   -20.96   -631.49      2.37      0.95   1.0
";

    #[test]
    fn aln_roundtrip_is_byte_identical() {
        let aln = parse_aln(ALN).expect("aln parsed");
        assert_eq!(aln.raw_size, [2032, 2032, 6]);
        assert_eq!(aln.num_patches, 2);
        assert_eq!(aln.dark_frames.len(), 2);
        assert_eq!(aln.global_alignments.len(), 4);
        assert_eq!(aln.local_alignments.len(), 8);
        assert_eq!(aln.global_alignments[1].tx, 34.451);
        assert_eq!(aln.local_alignments[6].is_reliable, 0.0);
        assert!(aln.validate().is_ok());
        assert_eq!(aln_to_string(&aln).expect("serialized"), ALN);
    }

    #[test]
    fn aln_without_dark_frames_or_patches_roundtrips() {
        let mut aln = parse_aln(ALN).expect("aln parsed");
        aln.raw_size[2] = 4;
        aln.dark_frames.clear();
        aln.local_alignments.clear();
        aln.num_patches = 0;

        let text = aln_to_string(&aln).expect("serialized");
        let reparsed = parse_aln(&text).expect("reparsed");
        assert_eq!(reparsed, aln);
        assert_eq!(aln_to_string(&reparsed).expect("serialized"), text);
    }

    #[test]
    fn aln_requires_raw_size() {
        let text = ALN.replace("# RawSize = 2032 2032 6\n", "");
        let err = parse_aln(&text).unwrap_err();
        assert!(err.to_string().contains("RawSize"));
    }

    #[test]
    fn aln_reports_malformed_rows() {
        let text = ALN.replace("    1   -12.6611", "    1   twelve");
        let err = parse_aln(&text).unwrap_err();
        assert!(matches!(err, ToolError::Parse { .. }));
        assert!(err.to_string().contains("line 10"));
    }
}
