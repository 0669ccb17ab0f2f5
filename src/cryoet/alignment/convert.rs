//! Conversions between the native alignment formats and the data portal
//! interchange format.
//!
//! Every function here is pure: it takes models by reference and returns a
//! freshly built model. File access and volume header lookup happen in the
//! callers.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::cryoet::alignment::error::{Result, ToolError};
use crate::cryoet::alignment::geometry::{
    angle_to_matrix, from_matrix, interchange_to_native, matrix_to_angle, native_to_interchange,
    to_matrix,
};
use crate::cryoet::alignment::model::portal::{ARETOMO3_FORMAT, IMOD_FORMAT};
use crate::cryoet::alignment::model::{
    AlnFile, DarkFrame, GlobalAlignmentRow, ImodAlignment, InterchangeAlignment, NewstCom,
    PerSectionParameters, TiltAngles, TiltCom, Vec3, XfFile, XfRow,
};

/// Builds an interchange alignment from an IMOD bundle.
///
/// Frames listed in the tilt command's exclusion list are dropped; the kept
/// frames keep their original index as `z_index`.
pub fn portal_from_imod(
    imod: &ImodAlignment,
    volume_dimension: Vec3,
) -> Result<InterchangeAlignment> {
    imod.validate()?;

    let excluded: BTreeSet<usize> = imod.excluded_frames().iter().copied().collect();
    if let Some(&last) = excluded.last() {
        if last >= imod.frame_count() {
            warn!(
                frame = last,
                frames = imod.frame_count(),
                "exclusion list names frames beyond the tilt series"
            );
        }
    }

    let mut alignment = InterchangeAlignment::new(IMOD_FORMAT, volume_dimension);
    for (z_index, (row, &tilt_angle)) in imod.xf.rows.iter().zip(&imod.tlt.angles).enumerate() {
        if excluded.contains(&z_index) {
            continue;
        }
        let secondary_rotation = imod
            .xtilt
            .as_ref()
            .map_or(0.0, |xtilt| xtilt.angles[z_index]);
        let (matrix, shift) = native_to_interchange(&row.matrix(), &row.shift());
        alignment.insert_section(PerSectionParameters {
            z_index,
            tilt_angle,
            secondary_rotation,
            in_plane_rotation: from_matrix(&matrix),
            x_offset: shift.x,
            y_offset: shift.y,
        });
    }

    debug!(
        frames = imod.frame_count(),
        sections = alignment.section_count(),
        "converted IMOD alignment"
    );
    Ok(alignment)
}

/// Builds an interchange alignment from an AreTomo3 `.aln` file.
///
/// Global rows are matched to raw frames by position, not by their `sec`
/// column. Local alignments are not carried over.
pub fn portal_from_aretomo(aln: &AlnFile, volume_dimension: Vec3) -> Result<InterchangeAlignment> {
    aln.validate()?;

    let mut alignment = InterchangeAlignment::new(ARETOMO3_FORMAT, volume_dimension);
    alignment.tilt_offset = aln.alpha_offset;
    alignment.x_rotation_offset = aln.beta_offset;

    for (z_index, row) in aln.retained_indices().into_iter().zip(&aln.global_alignments) {
        alignment.insert_section(PerSectionParameters {
            z_index,
            tilt_angle: row.tilt,
            secondary_rotation: 0.0,
            in_plane_rotation: from_matrix(&angle_to_matrix(row.rot)),
            x_offset: row.tx,
            y_offset: row.ty,
        });
    }

    if !aln.local_alignments.is_empty() {
        debug!(
            rows = aln.local_alignments.len(),
            "dropping local alignments, the interchange format only carries global ones"
        );
    }
    Ok(alignment)
}

/// Settings for writing an interchange alignment back out as IMOD files.
#[derive(Debug, Clone, PartialEq)]
pub struct ImodExportOptions {
    /// Size of the original tilt series: x, y and frame count.
    pub ts_size: [usize; 3],
    /// Pixel spacing of the unbinned tilt series, in the units of the volume dimension.
    pub ts_spacing: f64,
    pub binning: u32,
    /// Basename used for the file names recorded in the command files.
    pub basename: Option<String>,
}

impl ImodExportOptions {
    pub fn new(ts_size: [usize; 3], ts_spacing: f64) -> Self {
        Self {
            ts_size,
            ts_spacing,
            binning: 1,
            basename: None,
        }
    }
}

fn check_z_indices(alignment: &InterchangeAlignment, frame_count: usize) -> Result<()> {
    match alignment.sections().keys().next_back() {
        Some(&last) if last >= frame_count => Err(ToolError::StructuralMismatch(format!(
            "section z_index {last} lies outside the tilt series of {frame_count} frames"
        ))),
        _ => Ok(()),
    }
}

/// Expands an interchange alignment into a full IMOD bundle.
///
/// Every original frame gets a row; frames without a section become identity
/// transforms with zero angles and are added to the exclusion list.
pub fn imod_from_portal(
    alignment: &InterchangeAlignment,
    options: &ImodExportOptions,
) -> Result<ImodAlignment> {
    let [size_x, size_y, frame_count] = options.ts_size;
    check_z_indices(alignment, frame_count)?;

    if alignment.volume_dimension.z <= 0.0 {
        return Err(ToolError::InvalidDimension(format!(
            "volume z dimension {} is required to derive the thickness",
            alignment.volume_dimension.z
        )));
    }
    if options.ts_spacing <= 0.0 {
        return Err(ToolError::InvalidDimension(format!(
            "pixel spacing {} must be positive",
            options.ts_spacing
        )));
    }
    if options.binning == 0 {
        return Err(ToolError::InvalidDimension("binning must be at least 1".into()));
    }

    let mut xf_rows = Vec::with_capacity(frame_count);
    let mut tilt_angles = Vec::with_capacity(frame_count);
    let mut secondary_angles = Vec::with_capacity(frame_count);
    let mut exclude_list = Vec::new();

    for z_index in 0..frame_count {
        match alignment.section(z_index) {
            None => {
                xf_rows.push(XfRow::IDENTITY);
                tilt_angles.push(0.0);
                secondary_angles.push(0.0);
                exclude_list.push(z_index);
            }
            Some(section) => {
                let shift = nalgebra::Vector2::new(section.x_offset, section.y_offset);
                let (matrix, shift) =
                    interchange_to_native(&to_matrix(&section.in_plane_rotation), &shift);
                xf_rows.push(XfRow::from_parts(&matrix, &shift));
                tilt_angles.push(section.tilt_angle);
                secondary_angles.push(section.secondary_rotation);
            }
        }
    }

    let base = options.basename.as_deref().unwrap_or("basename");
    let tilt_series = format!("{base}.mrc");
    let xf_path = format!("{base}.xf");

    // Halves go to the even pixel count.
    let thickness = (alignment.volume_dimension.z / options.ts_spacing).round_ties_even() as i64;
    let mut tiltcom = TiltCom::new(
        tilt_series.clone(),
        format!("{base}_full_rec.mrc"),
        format!("{base}.tlt"),
        thickness,
        (size_x as i64, size_y as i64),
    );
    tiltcom.x_tilt_file = Some(format!("{base}.xtilt"));
    tiltcom.exclude_list = exclude_list;

    let mut newstcom = NewstCom::new(tilt_series, format!("{base}_ali.mrc"), xf_path);
    newstcom.bin_by_factor = Some(i64::from(options.binning));

    debug!(
        frames = frame_count,
        excluded = tiltcom.exclude_list.len(),
        thickness,
        "expanded interchange alignment into IMOD bundle"
    );

    Ok(ImodAlignment {
        xf: XfFile::new(xf_rows),
        tlt: TiltAngles::new(tilt_angles),
        xtilt: Some(TiltAngles::new(secondary_angles)),
        tiltcom: Some(tiltcom),
        newstcom: Some(newstcom),
    })
}

/// Writes an interchange alignment as an AreTomo3 `.aln` model.
///
/// Missing frames become dark frames, sections become global rows numbered
/// in retained order. Secondary rotations and local alignments are dropped.
pub fn aretomo_from_portal(alignment: &InterchangeAlignment, ts_size: [usize; 3]) -> Result<AlnFile> {
    let frame_count = ts_size[2];
    check_z_indices(alignment, frame_count)?;

    let mut aln = AlnFile::new(ts_size);
    aln.alpha_offset = alignment.tilt_offset;
    aln.beta_offset = alignment.x_rotation_offset;

    for z_index in 0..frame_count {
        match alignment.section(z_index) {
            None => aln.dark_frames.push(DarkFrame {
                section_idx: z_index,
                val2: 0,
                angle: 0.0,
            }),
            Some(section) => {
                let sec = aln.global_alignments.len();
                let rot = matrix_to_angle(&to_matrix(&section.in_plane_rotation));
                aln.global_alignments.push(GlobalAlignmentRow::new(
                    sec,
                    rot,
                    section.x_offset,
                    section.y_offset,
                    section.tilt_angle,
                ));
            }
        }
    }

    debug!(
        dark_frames = aln.dark_frames.len(),
        sections = aln.global_alignments.len(),
        "converted interchange alignment to AreTomo3"
    );
    Ok(aln)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cryoet::alignment::model::aretomo::LocalAlignmentRow;
    use approx::assert_abs_diff_eq;

    fn imod_fixture() -> ImodAlignment {
        let rows = [-12.0, -11.5, -12.5, -12.25]
            .iter()
            .zip([(24.786, -2.677), (34.451, -8.599), (9.951, -7.69), (5.538, -2.504)])
            .map(|(&angle, (sx, sy))| {
                XfRow::from_parts(
                    &angle_to_matrix(angle),
                    &nalgebra::Vector2::new(sx, sy),
                )
            })
            .collect();
        let mut imod = ImodAlignment::new(
            XfFile::new(rows),
            TiltAngles::new(vec![-61.5, -60.0, -58.5, -57.0]),
        );
        imod.xtilt = Some(TiltAngles::new(vec![0.1, 0.2, 0.3, 0.4]));
        let mut tiltcom = TiltCom::new("TS.mrc", "TS_full_rec.mrc", "TS.tlt", 1500, (3838, 3710));
        tiltcom.exclude_list = vec![0];
        imod.tiltcom = Some(tiltcom);
        imod
    }

    fn aln_fixture() -> AlnFile {
        let mut aln = AlnFile::new([2032, 2032, 6]);
        aln.num_patches = 1;
        aln.alpha_offset = 1.5;
        aln.beta_offset = -0.5;
        aln.dark_frames = vec![
            DarkFrame {
                section_idx: 0,
                val2: 0,
                angle: -66.0,
            },
            DarkFrame {
                section_idx: 4,
                val2: 0,
                angle: 63.0,
            },
        ];
        aln.global_alignments = vec![
            GlobalAlignmentRow::new(0, -12.6611, 24.786, -2.677, -61.5),
            GlobalAlignmentRow::new(1, -12.7, 34.451, -8.599, -60.0),
            GlobalAlignmentRow::new(2, -12.5, 9.951, -7.69, -58.5),
            GlobalAlignmentRow::new(3, -12.6, 5.538, -2.504, -57.0),
        ];
        aln.local_alignments = (0..4)
            .map(|sec_idx| LocalAlignmentRow {
                sec_idx,
                patch_idx: 0,
                center_x: -640.0,
                center_y: -630.0,
                shift_x: 1.0,
                shift_y: -1.0,
                is_reliable: 1.0,
            })
            .collect();
        aln
    }

    #[test]
    fn imod_exclusion_keeps_original_indices() {
        let portal = portal_from_imod(&imod_fixture(), Vec3::default()).expect("converted");
        assert_eq!(portal.section_count(), 3);
        let indices: Vec<usize> = portal.sections().keys().copied().collect();
        assert_eq!(indices, vec![1, 2, 3]);
        let tilts: Vec<f64> = portal
            .per_section_alignment_parameters()
            .map(|section| section.tilt_angle)
            .collect();
        assert_eq!(tilts, vec![-60.0, -58.5, -57.0]);
        assert_eq!(portal.section(2).expect("section").secondary_rotation, 0.3);
        assert_eq!(portal.format, IMOD_FORMAT);
        assert_eq!(portal.tilt_offset, 0.0);
    }

    #[test]
    fn imod_without_xtilt_uses_zero_secondary_rotation() {
        let mut imod = imod_fixture();
        imod.xtilt = None;
        let portal = portal_from_imod(&imod, Vec3::default()).expect("converted");
        assert!(portal
            .per_section_alignment_parameters()
            .all(|section| section.secondary_rotation == 0.0));
    }

    #[test]
    fn imod_shape_mismatch_is_rejected() {
        let mut imod = imod_fixture();
        imod.tlt.angles.push(0.0);
        assert!(matches!(
            portal_from_imod(&imod, Vec3::default()),
            Err(ToolError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn imod_roundtrip_preserves_exclusions_angles_and_shifts() {
        let imod = imod_fixture();
        let portal = portal_from_imod(&imod, Vec3::new(3830.0, 3710.0, 2400.0)).expect("converted");
        let options = ImodExportOptions::new([3838, 3710, 4], 1.6);
        let restored = imod_from_portal(&portal, &options).expect("restored");

        assert_eq!(restored.frame_count(), 4);
        assert_eq!(restored.excluded_frames(), &[0]);
        for z_index in 1..4 {
            let original = &imod.xf.rows[z_index];
            let roundtrip = &restored.xf.rows[z_index];
            assert_eq!(restored.tlt.angles[z_index], imod.tlt.angles[z_index]);
            assert_abs_diff_eq!(
                matrix_to_angle(&roundtrip.matrix()),
                matrix_to_angle(&original.matrix()),
                epsilon = 1e-9
            );
            assert_abs_diff_eq!(roundtrip.sx, original.sx, epsilon = 1e-3);
            assert_abs_diff_eq!(roundtrip.sy, original.sy, epsilon = 1e-3);
        }
        assert_eq!(restored.xf.rows[0], XfRow::IDENTITY);
        assert_eq!(restored.tiltcom.as_ref().expect("tilt.com").thickness, 1500);
    }

    #[test]
    fn imod_export_records_file_names_and_binning() {
        let portal = portal_from_imod(&imod_fixture(), Vec3::new(1.0, 1.0, 300.0)).expect("converted");
        let mut options = ImodExportOptions::new([3838, 3710, 4], 2.0);
        options.binning = 4;
        options.basename = Some("TS_01".to_string());
        let restored = imod_from_portal(&portal, &options).expect("restored");

        let tiltcom = restored.tiltcom.expect("tilt.com");
        assert_eq!(tiltcom.input_projections, "TS_01.mrc");
        assert_eq!(tiltcom.output_file, "TS_01_full_rec.mrc");
        assert_eq!(tiltcom.tilt_file, "TS_01.tlt");
        assert_eq!(tiltcom.x_tilt_file.as_deref(), Some("TS_01.xtilt"));
        assert_eq!(tiltcom.full_image, (3838, 3710));
        assert_eq!(tiltcom.thickness, 150);

        let newstcom = restored.newstcom.expect("newst.com");
        assert_eq!(newstcom.output_file, "TS_01_ali.mrc");
        assert_eq!(newstcom.transform_file, "TS_01.xf");
        assert_eq!(newstcom.bin_by_factor, Some(4));
    }

    #[test]
    fn imod_thickness_rounds_halves_to_even() {
        for (depth, expected) in [(301.0, 150), (303.0, 152), (302.0, 151)] {
            let portal =
                portal_from_imod(&imod_fixture(), Vec3::new(1.0, 1.0, depth)).expect("converted");
            let options = ImodExportOptions::new([3838, 3710, 4], 2.0);
            let restored = imod_from_portal(&portal, &options).expect("restored");
            assert_eq!(restored.tiltcom.expect("tilt.com").thickness, expected);
        }
    }

    #[test]
    fn imod_export_requires_volume_thickness() {
        let portal = portal_from_imod(&imod_fixture(), Vec3::default()).expect("converted");
        let options = ImodExportOptions::new([3838, 3710, 4], 1.0);
        assert!(matches!(
            imod_from_portal(&portal, &options),
            Err(ToolError::InvalidDimension(_))
        ));
    }

    #[test]
    fn aretomo_rows_map_to_retained_frames() {
        let portal = portal_from_aretomo(&aln_fixture(), Vec3::default()).expect("converted");
        let indices: Vec<usize> = portal.sections().keys().copied().collect();
        assert_eq!(indices, vec![1, 2, 3, 5]);
        let section = portal.section(5).expect("section");
        assert_eq!(section.tilt_angle, -57.0);
        assert_eq!(section.x_offset, 5.538);
        assert_abs_diff_eq!(section.tilt_axis_rotation(), -12.6, epsilon = 1e-9);
        assert_eq!(portal.tilt_offset, 1.5);
        assert_eq!(portal.x_rotation_offset, -0.5);
        assert_eq!(portal.format, ARETOMO3_FORMAT);
    }

    #[test]
    fn aretomo_frame_count_mismatch_is_rejected() {
        let mut aln = aln_fixture();
        aln.raw_size[2] = 7;
        assert!(matches!(
            portal_from_aretomo(&aln, Vec3::default()),
            Err(ToolError::StructuralMismatch(_))
        ));
    }

    #[test]
    fn aretomo_roundtrip_drops_local_alignments() {
        let aln = aln_fixture();
        let portal = portal_from_aretomo(&aln, Vec3::default()).expect("converted");
        let restored = aretomo_from_portal(&portal, aln.raw_size).expect("restored");

        let dark: Vec<usize> = restored.dark_frames.iter().map(|frame| frame.section_idx).collect();
        assert_eq!(dark, vec![0, 4]);
        assert_eq!(restored.num_patches, 0);
        assert!(restored.local_alignments.is_empty());
        assert_eq!(restored.alpha_offset, aln.alpha_offset);
        assert_eq!(restored.beta_offset, aln.beta_offset);

        for (index, (original, roundtrip)) in aln
            .global_alignments
            .iter()
            .zip(&restored.global_alignments)
            .enumerate()
        {
            assert_eq!(roundtrip.sec, index);
            assert_abs_diff_eq!(roundtrip.rot, original.rot, epsilon = 1e-9);
            assert_eq!(roundtrip.tx, original.tx);
            assert_eq!(roundtrip.ty, original.ty);
            assert_eq!(roundtrip.tilt, original.tilt);
        }
        assert!(restored.validate().is_ok());
    }

    #[test]
    fn sections_beyond_the_series_are_rejected() {
        let portal = portal_from_aretomo(&aln_fixture(), Vec3::default()).expect("converted");
        assert!(matches!(
            aretomo_from_portal(&portal, [2032, 2032, 5]),
            Err(ToolError::StructuralMismatch(_))
        ));
    }
}
