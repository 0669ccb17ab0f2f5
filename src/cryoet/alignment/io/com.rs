//! Codecs for IMOD's `tilt.com` and `newst.com` command files.

use std::fmt::Write;

use crate::cryoet::alignment::error::{Result, ToolError};
use crate::cryoet::alignment::io::command::{FieldKind, FieldSpec, parse_fields};
use crate::cryoet::alignment::io::text::{float_repr, format_range_list, parse_range_list};
use crate::cryoet::alignment::model::{NewstCom, TiltCom};

const TILT_FORMAT: &str = "IMOD tilt.com";
const NEWST_FORMAT: &str = "IMOD newst.com";

const SAVEWORK: &str = "$if (-e ./savework) ./savework\n";

const TILT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("InputProjections", FieldKind::Text).required(),
    FieldSpec::new("OutputFile", FieldKind::Text).required(),
    FieldSpec::new("IMAGEBINNED", FieldKind::Int),
    FieldSpec::new("TILTFILE", FieldKind::Text).required(),
    FieldSpec::new("THICKNESS", FieldKind::Int).required(),
    FieldSpec::new("RADIAL", FieldKind::FloatPair),
    FieldSpec::new("FalloffIsTrueSigma", FieldKind::Int),
    FieldSpec::new("XAXISTILT", FieldKind::Float),
    FieldSpec::new("SCALE", FieldKind::FloatPair),
    FieldSpec::new("PERPENDICULAR", FieldKind::Flag),
    FieldSpec::new("MODE", FieldKind::Int),
    FieldSpec::new("FULLIMAGE", FieldKind::IntPair).required(),
    FieldSpec::new("SUBSETSTART", FieldKind::IntPair),
    FieldSpec::new("AdjustOrigin", FieldKind::Flag),
    FieldSpec::new("ActionIfGPUFails", FieldKind::IntPair),
    FieldSpec::new("XTILTFILE", FieldKind::Text),
    FieldSpec::new("OFFSET", FieldKind::Float),
    FieldSpec::new("SHIFT", FieldKind::FloatPair),
    FieldSpec::new("EXCLUDELIST2", FieldKind::RangeList).aliases(&["EXCLUDELIST", "EXCLUDE"]),
];

const NEWST_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("AntialiasFilter", FieldKind::Int),
    FieldSpec::new("InputFile", FieldKind::Text).required(),
    FieldSpec::new("OutputFile", FieldKind::Text).required(),
    FieldSpec::new("TransformFile", FieldKind::Text).required(),
    FieldSpec::new("TaperAtFill", FieldKind::IntPair),
    FieldSpec::new("AdjustOrigin", FieldKind::Flag),
    FieldSpec::new("OffsetsInXandY", FieldKind::FloatPair),
    FieldSpec::new("DistortionField", FieldKind::Text),
    FieldSpec::new("ImagesAreBinned", FieldKind::Float),
    FieldSpec::new("BinByFactor", FieldKind::Int),
    FieldSpec::new("GradientFile", FieldKind::Text),
];

/// Parses a `tilt.com` file. The exclusion list is converted to 0-based indices.
pub fn parse_tiltcom(text: &str) -> Result<TiltCom> {
    let fields = parse_fields(TILT_FORMAT, TILT_FIELDS, text)?;

    let exclude_list = fields
        .list("EXCLUDELIST2")?
        .unwrap_or_default()
        .into_iter()
        .map(|section| {
            section.checked_sub(1).ok_or_else(|| {
                ToolError::parse(TILT_FORMAT, "EXCLUDELIST2 entries are 1-based, found 0")
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // Required fields were checked by the parser.
    let thickness = fields.int("THICKNESS")?.unwrap_or_default();
    let full_image = fields.int_pair("FULLIMAGE")?.unwrap_or_default();

    let mut tiltcom = TiltCom::new(
        fields.required_text("InputProjections")?,
        fields.required_text("OutputFile")?,
        fields.required_text("TILTFILE")?,
        thickness,
        full_image,
    );
    tiltcom.image_binned = fields.int("IMAGEBINNED")?.unwrap_or(tiltcom.image_binned);
    tiltcom.radial = fields.float_pair("RADIAL")?.unwrap_or(tiltcom.radial);
    tiltcom.falloff_is_true_sigma = fields
        .int("FalloffIsTrueSigma")?
        .unwrap_or(tiltcom.falloff_is_true_sigma);
    tiltcom.x_axis_tilt = fields.float("XAXISTILT")?.unwrap_or(tiltcom.x_axis_tilt);
    tiltcom.scale = fields.float_pair("SCALE")?.unwrap_or(tiltcom.scale);
    tiltcom.perpendicular = fields.flag("PERPENDICULAR");
    tiltcom.mode = fields.int("MODE")?.unwrap_or(tiltcom.mode);
    tiltcom.subset_start = fields.int_pair("SUBSETSTART")?.unwrap_or(tiltcom.subset_start);
    tiltcom.adjust_origin = fields.flag("AdjustOrigin");
    tiltcom.action_if_gpu_fails = fields.int_pair("ActionIfGPUFails")?;
    tiltcom.x_tilt_file = fields.text("XTILTFILE")?;
    tiltcom.offset = fields.float("OFFSET")?;
    tiltcom.shift = fields.float_pair("SHIFT")?;
    tiltcom.exclude_list = exclude_list;
    tiltcom.exclude_list_text = fields.list_text("EXCLUDELIST2")?;
    Ok(tiltcom)
}

/// Serialises a `tilt.com` file. Unset optional fields are written as comments.
pub fn tiltcom_to_string(tiltcom: &TiltCom) -> Result<String> {
    let mut out = String::from("$setenv IMOD_OUTPUT_FORMAT MRC\n$tilt -StandardInput\n");
    write_tilt_fields(&mut out, tiltcom)?;
    out.push_str(SAVEWORK);
    Ok(out)
}

/// The 1-based exclusion list text: the text read from disk if it still
/// matches `exclude_list`, a compressed range list otherwise.
fn exclude_list_text(tiltcom: &TiltCom) -> String {
    let one_based: Vec<usize> = tiltcom.exclude_list.iter().map(|section| section + 1).collect();
    match &tiltcom.exclude_list_text {
        Some(text) if parse_range_list(text).is_ok_and(|values| values == one_based) => {
            text.clone()
        }
        _ => format_range_list(&one_based),
    }
}

fn write_tilt_fields(out: &mut String, t: &TiltCom) -> std::fmt::Result {
    writeln!(out, "InputProjections {}", t.input_projections)?;
    writeln!(out, "OutputFile {}", t.output_file)?;
    writeln!(out, "IMAGEBINNED {}", t.image_binned)?;
    writeln!(out, "TILTFILE {}", t.tilt_file)?;
    writeln!(out, "THICKNESS {}", t.thickness)?;
    writeln!(out, "RADIAL {:.2} {:.3}", t.radial.0, t.radial.1)?;
    writeln!(out, "FalloffIsTrueSigma {}", t.falloff_is_true_sigma)?;
    writeln!(out, "XAXISTILT {}", float_repr(t.x_axis_tilt))?;
    writeln!(out, "SCALE {:.1} {:.1}", t.scale.0, t.scale.1)?;
    if t.perpendicular {
        writeln!(out, "PERPENDICULAR")?;
    }
    writeln!(out, "MODE {}", t.mode)?;
    writeln!(out, "FULLIMAGE {} {}", t.full_image.0, t.full_image.1)?;
    writeln!(out, "SUBSETSTART {} {}", t.subset_start.0, t.subset_start.1)?;
    if t.adjust_origin {
        writeln!(out, "AdjustOrigin")?;
    }
    match t.action_if_gpu_fails {
        Some((first, second)) => writeln!(out, "ActionIfGPUFails {first},{second}")?,
        None => writeln!(out, "#ActionIfGPUFails")?,
    }
    match &t.x_tilt_file {
        Some(path) => writeln!(out, "XTILTFILE {path}")?,
        None => writeln!(out, "#XTILTFILE")?,
    }
    match t.offset {
        Some(offset) => writeln!(out, "OFFSET {}", float_repr(offset))?,
        None => writeln!(out, "#OFFSET")?,
    }
    match t.shift {
        Some((x, y)) => writeln!(out, "SHIFT {} {}", float_repr(x), float_repr(y))?,
        None => writeln!(out, "#SHIFT")?,
    }
    if !t.exclude_list.is_empty() {
        writeln!(out, "EXCLUDELIST2 {}", exclude_list_text(t))?;
    }
    Ok(())
}

/// Parses a `newst.com` file.
pub fn parse_newstcom(text: &str) -> Result<NewstCom> {
    let fields = parse_fields(NEWST_FORMAT, NEWST_FIELDS, text)?;

    let mut newstcom = NewstCom::new(
        fields.required_text("InputFile")?,
        fields.required_text("OutputFile")?,
        fields.required_text("TransformFile")?,
    );
    newstcom.antialias_filter = fields
        .int("AntialiasFilter")?
        .unwrap_or(newstcom.antialias_filter);
    newstcom.taper_at_fill = fields
        .int_pair("TaperAtFill")?
        .unwrap_or(newstcom.taper_at_fill);
    newstcom.adjust_origin = fields.flag("AdjustOrigin");
    newstcom.offsets_in_x_and_y = fields
        .float_pair("OffsetsInXandY")?
        .unwrap_or(newstcom.offsets_in_x_and_y);
    newstcom.distortion_field = fields.text("DistortionField")?;
    newstcom.images_are_binned = fields
        .float("ImagesAreBinned")?
        .unwrap_or(newstcom.images_are_binned);
    newstcom.bin_by_factor = fields.int("BinByFactor")?;
    newstcom.gradient_file = fields.text("GradientFile")?;
    Ok(newstcom)
}

/// Serialises a `newst.com` file with tab-separated values.
pub fn newstcom_to_string(newstcom: &NewstCom) -> Result<String> {
    let mut out = String::from("$setenv IMOD_OUTPUT_FORMAT MRC\n$newstack -StandardInput\n");
    write_newst_fields(&mut out, newstcom)?;
    out.push_str(SAVEWORK);
    Ok(out)
}

fn write_newst_fields(out: &mut String, n: &NewstCom) -> std::fmt::Result {
    writeln!(out, "AntialiasFilter\t{}", n.antialias_filter)?;
    writeln!(out, "InputFile\t{}", n.input_file)?;
    writeln!(out, "OutputFile\t{}", n.output_file)?;
    writeln!(out, "TransformFile\t{}", n.transform_file)?;
    writeln!(out, "TaperAtFill\t{},{}", n.taper_at_fill.0, n.taper_at_fill.1)?;
    if n.adjust_origin {
        writeln!(out, "AdjustOrigin")?;
    }
    writeln!(
        out,
        "OffsetsInXandY\t{},{}",
        float_repr(n.offsets_in_x_and_y.0),
        float_repr(n.offsets_in_x_and_y.1)
    )?;
    match &n.distortion_field {
        Some(path) => writeln!(out, "DistortionField\t{path}")?,
        None => writeln!(out, "#DistortionField\t.idf")?,
    }
    writeln!(out, "ImagesAreBinned\t{}", float_repr(n.images_are_binned))?;
    match n.bin_by_factor {
        Some(factor) => writeln!(out, "BinByFactor\t{factor}")?,
        None => writeln!(out, "#BinByFactor")?,
    }
    match &n.gradient_file {
        Some(path) => writeln!(out, "GradientFile\t{path}")?,
        None => writeln!(out, "#GradientFile\t.maggrad")?,
    }
    Ok(())
}
