//! Numeric table mirrors of the alignment models, used for spreadsheet
//! export and import.

use crate::cryoet::alignment::error::{Result, ToolError};
use crate::cryoet::alignment::model::{
    AlnFile, AnyAlignment, DarkFrame, ImodAlignment, InterchangeAlignment, TiltAngles, Vec3,
    XfFile,
};

/// Sheet holding IMOD transform rows.
pub const XF_SHEET: &str = "Transforms";
/// Sheet holding IMOD tilt and secondary tilt angles.
pub const TILT_SHEET: &str = "TiltAngles";
/// Sheet holding the scalar fields of an AreTomo3 file.
pub const ALN_METADATA_SHEET: &str = "AlnMetadata";
pub const DARK_FRAMES_SHEET: &str = "DarkFrames";
pub const GLOBAL_SHEET: &str = "GlobalAlignment";
pub const LOCAL_SHEET: &str = "LocalAlignment";
/// Sheet holding the volume dimension and offsets of an interchange alignment.
pub const PORTAL_METADATA_SHEET: &str = "PortalMetadata";
pub const SECTIONS_SHEET: &str = "Sections";

const XF_COLUMNS: [&str; 6] = ["mxx", "mxy", "myx", "myy", "sx", "sy"];
const ALN_METADATA_COLUMNS: [&str; 6] = [
    "raw_x",
    "raw_y",
    "raw_z",
    "num_patches",
    "alpha_offset",
    "beta_offset",
];
const DARK_FRAME_COLUMNS: [&str; 3] = ["section_idx", "val2", "angle"];
const GLOBAL_COLUMNS: [&str; 10] = [
    "SEC", "ROT", "GMAG", "TX", "TY", "SMEAN", "SFIT", "SCALE", "BASE", "TILT",
];
const LOCAL_COLUMNS: [&str; 7] = [
    "sec_idx",
    "patch_idx",
    "center_x",
    "center_y",
    "shift_x",
    "shift_y",
    "is_reliable",
];
const PORTAL_METADATA_COLUMNS: [&str; 5] = [
    "volume_x",
    "volume_y",
    "volume_z",
    "tilt_offset",
    "x_rotation_offset",
];
const SECTION_COLUMNS: [&str; 9] = [
    "z_index",
    "tilt_angle",
    "volume_x_rotation",
    "m00",
    "m01",
    "m10",
    "m11",
    "x_offset",
    "y_offset",
];

/// A table that will be materialised as an Excel sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetTable {
    pub sheet_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl SheetTable {
    pub fn new(sheet_name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    fn from_rows<const N: usize, R: Into<Vec<f64>>>(
        sheet_name: &str,
        columns: [&str; N],
        rows: impl IntoIterator<Item = R>,
    ) -> Self {
        Self {
            sheet_name: sheet_name.to_string(),
            columns: columns.iter().map(|column| column.to_string()).collect(),
            rows: rows.into_iter().map(Into::into).collect(),
        }
    }

    /// Checks that the header matches `expected` exactly.
    fn expect_columns(&self, expected: &[&str]) -> Result<()> {
        if self.columns.iter().map(String::as_str).eq(expected.iter().copied()) {
            Ok(())
        } else {
            Err(ToolError::InvalidWorkbook(format!(
                "sheet '{}' has columns {:?}, expected {:?}",
                self.sheet_name, self.columns, expected
            )))
        }
    }
}

/// Represents all tables required to materialise the Excel workbook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookData {
    pub tables: Vec<SheetTable>,
}

impl WorkbookData {
    pub fn table(&self, sheet_name: &str) -> Option<&SheetTable> {
        self.tables.iter().find(|table| table.sheet_name == sheet_name)
    }

    fn required(&self, sheet_name: &str, columns: &[&str]) -> Result<&SheetTable> {
        let table = self
            .table(sheet_name)
            .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{sheet_name}'")))?;
        table.expect_columns(columns)?;
        Ok(table)
    }
}

/// Flattens an alignment into the sheets of its format.
pub fn build_workbook(alignment: &AnyAlignment) -> Result<WorkbookData> {
    let tables = match alignment {
        AnyAlignment::Imod(imod) => imod_tables(imod)?,
        AnyAlignment::AreTomo3(aln) => aln_tables(aln),
        AnyAlignment::Portal(portal) => portal_tables(portal),
    };
    Ok(WorkbookData { tables })
}

fn imod_tables(imod: &ImodAlignment) -> Result<Vec<SheetTable>> {
    imod.validate()?;
    let xf = SheetTable::from_rows(XF_SHEET, XF_COLUMNS, imod.xf.to_rows());
    let tilt = match &imod.xtilt {
        Some(xtilt) => SheetTable::from_rows(
            TILT_SHEET,
            ["tilt_angle", "x_tilt"],
            imod.tlt
                .angles
                .iter()
                .zip(&xtilt.angles)
                .map(|(&tilt, &x_tilt)| [tilt, x_tilt]),
        ),
        None => SheetTable::from_rows(
            TILT_SHEET,
            ["tilt_angle"],
            imod.tlt.angles.iter().map(|&tilt| [tilt]),
        ),
    };
    Ok(vec![xf, tilt])
}

fn aln_tables(aln: &AlnFile) -> Vec<SheetTable> {
    let [raw_x, raw_y, raw_z] = aln.raw_size;
    vec![
        SheetTable::from_rows(
            ALN_METADATA_SHEET,
            ALN_METADATA_COLUMNS,
            [[
                raw_x as f64,
                raw_y as f64,
                raw_z as f64,
                aln.num_patches as f64,
                aln.alpha_offset,
                aln.beta_offset,
            ]],
        ),
        SheetTable::from_rows(
            DARK_FRAMES_SHEET,
            DARK_FRAME_COLUMNS,
            aln.dark_frames
                .iter()
                .map(|frame| [frame.section_idx as f64, frame.val2 as f64, frame.angle]),
        ),
        SheetTable::from_rows(GLOBAL_SHEET, GLOBAL_COLUMNS, aln.global_rows()),
        SheetTable::from_rows(LOCAL_SHEET, LOCAL_COLUMNS, aln.local_rows()),
    ]
}

fn portal_tables(portal: &InterchangeAlignment) -> Vec<SheetTable> {
    let volume = portal.volume_dimension;
    vec![
        SheetTable::from_rows(
            PORTAL_METADATA_SHEET,
            PORTAL_METADATA_COLUMNS,
            [[
                volume.x,
                volume.y,
                volume.z,
                portal.tilt_offset,
                portal.x_rotation_offset,
            ]],
        ),
        SheetTable::from_rows(SECTIONS_SHEET, SECTION_COLUMNS, portal.section_rows()),
    ]
}

fn single_row(table: &SheetTable) -> Result<&[f64]> {
    match table.rows.as_slice() {
        [row] if row.len() == table.columns.len() => Ok(row),
        rows => Err(ToolError::InvalidWorkbook(format!(
            "sheet '{}' must hold exactly one complete row, found {}",
            table.sheet_name,
            rows.len()
        ))),
    }
}

fn count(value: f64, what: &str) -> Result<usize> {
    if value < 0.0 || value.fract() != 0.0 {
        return Err(ToolError::InvalidWorkbook(format!(
            "{what} must be a non-negative integer, found {value}"
        )));
    }
    Ok(value as usize)
}

/// Restores the transforms of an IMOD bundle from its workbook.
pub fn xf_from_workbook(workbook: &WorkbookData) -> Result<XfFile> {
    XfFile::from_rows(workbook.required(XF_SHEET, &XF_COLUMNS)?.rows.as_slice())
}

/// Restores the transform and angle files of an IMOD bundle. Command files
/// are not part of the workbook.
pub fn imod_from_workbook(workbook: &WorkbookData) -> Result<ImodAlignment> {
    let xf = xf_from_workbook(workbook)?;
    let tilt = workbook
        .table(TILT_SHEET)
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{TILT_SHEET}'")))?;
    let with_xtilt = tilt.columns.len() == 2;
    let expected: &[&str] = if with_xtilt {
        &["tilt_angle", "x_tilt"]
    } else {
        &["tilt_angle"]
    };
    tilt.expect_columns(expected)?;

    let column = |index: usize| -> Result<TiltAngles> {
        tilt.rows
            .iter()
            .enumerate()
            .map(|(row_idx, row)| {
                row.get(index).copied().ok_or_else(|| {
                    ToolError::ShapeMismatch(format!("tilt row {row_idx} is missing a column"))
                })
            })
            .collect::<Result<Vec<f64>>>()
            .map(TiltAngles::new)
    };

    let mut imod = ImodAlignment::new(xf, column(0)?);
    if with_xtilt {
        imod.xtilt = Some(column(1)?);
    }
    imod.validate()?;
    Ok(imod)
}

/// Restores a complete AreTomo3 model from its workbook.
pub fn aln_from_workbook(workbook: &WorkbookData) -> Result<AlnFile> {
    let metadata = single_row(workbook.required(ALN_METADATA_SHEET, &ALN_METADATA_COLUMNS)?)?;
    let mut aln = AlnFile::new([
        count(metadata[0], "raw_x")?,
        count(metadata[1], "raw_y")?,
        count(metadata[2], "raw_z")?,
    ]);
    aln.num_patches = count(metadata[3], "num_patches")?;
    aln.alpha_offset = metadata[4];
    aln.beta_offset = metadata[5];

    aln.dark_frames = workbook
        .required(DARK_FRAMES_SHEET, &DARK_FRAME_COLUMNS)?
        .rows
        .iter()
        .map(|row| match row.as_slice() {
            [section_idx, val2, angle] => Ok(DarkFrame {
                section_idx: count(*section_idx, "section_idx")?,
                val2: *val2 as i64,
                angle: *angle,
            }),
            other => Err(ToolError::ShapeMismatch(format!(
                "dark frame row has {} columns, expected 3",
                other.len()
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    aln.set_global_rows(workbook.required(GLOBAL_SHEET, &GLOBAL_COLUMNS)?.rows.as_slice())?;
    aln.set_local_rows(workbook.required(LOCAL_SHEET, &LOCAL_COLUMNS)?.rows.as_slice())?;
    aln.validate()?;
    Ok(aln)
}

/// Restores an interchange alignment from its workbook, tagging it with
/// `format` since the workbook carries numbers only.
pub fn portal_from_workbook(
    workbook: &WorkbookData,
    format: &str,
) -> Result<InterchangeAlignment> {
    let metadata = single_row(workbook.required(PORTAL_METADATA_SHEET, &PORTAL_METADATA_COLUMNS)?)?;
    let mut portal =
        InterchangeAlignment::new(format, Vec3::new(metadata[0], metadata[1], metadata[2]));
    portal.tilt_offset = metadata[3];
    portal.x_rotation_offset = metadata[4];
    portal.set_section_rows(workbook.required(SECTIONS_SHEET, &SECTION_COLUMNS)?.rows.as_slice())?;
    Ok(portal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cryoet::alignment::model::portal::ARETOMO3_FORMAT;
    use crate::cryoet::alignment::model::{GlobalAlignmentRow, PerSectionParameters, XfRow};

    fn aln() -> AlnFile {
        let mut aln = AlnFile::new([2032, 2032, 3]);
        aln.alpha_offset = 2.0;
        aln.dark_frames.push(DarkFrame {
            section_idx: 1,
            val2: 0,
            angle: 3.0,
        });
        aln.global_alignments = vec![
            GlobalAlignmentRow::new(0, -12.6, 1.0, 2.0, -3.0),
            GlobalAlignmentRow::new(1, -12.5, 3.0, 4.0, 6.0),
        ];
        aln
    }

    #[test]
    fn aln_workbook_restores_the_model() {
        let aln = aln();
        let workbook = build_workbook(&AnyAlignment::from(aln.clone())).expect("workbook");
        let names: Vec<&str> = workbook
            .tables
            .iter()
            .map(|table| table.sheet_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![ALN_METADATA_SHEET, DARK_FRAMES_SHEET, GLOBAL_SHEET, LOCAL_SHEET]
        );
        assert_eq!(aln_from_workbook(&workbook).expect("restored"), aln);
    }

    #[test]
    fn imod_workbook_keeps_secondary_tilts() {
        let mut imod = ImodAlignment::new(
            XfFile::new(vec![XfRow::IDENTITY; 2]),
            TiltAngles::new(vec![-3.0, 3.0]),
        );
        imod.xtilt = Some(TiltAngles::new(vec![0.5, 0.25]));
        let workbook = build_workbook(&AnyAlignment::from(imod.clone())).expect("workbook");
        let tilt = workbook.table(TILT_SHEET).expect("tilt sheet");
        assert_eq!(tilt.rows, vec![vec![-3.0, 0.5], vec![3.0, 0.25]]);
        assert_eq!(imod_from_workbook(&workbook).expect("restored"), imod);
    }

    #[test]
    fn imod_workbook_rejects_short_secondary_tilts() {
        let mut imod = ImodAlignment::new(
            XfFile::new(vec![XfRow::IDENTITY; 3]),
            TiltAngles::new(vec![-3.0, 0.0, 3.0]),
        );
        imod.xtilt = Some(TiltAngles::new(vec![0.5, 0.25]));
        assert!(matches!(
            build_workbook(&AnyAlignment::from(imod)),
            Err(ToolError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn portal_workbook_restores_sections() {
        let mut portal = InterchangeAlignment::new(ARETOMO3_FORMAT, Vec3::new(1.0, 2.0, 3.0));
        portal.tilt_offset = 1.5;
        let mut section = PerSectionParameters {
            z_index: 4,
            tilt_angle: 12.0,
            secondary_rotation: 0.0,
            in_plane_rotation: [[1.0, 0.0], [0.0, 1.0]],
            x_offset: -1.0,
            y_offset: 2.0,
        };
        section.set_tilt_axis_rotation(-85.0);
        portal.insert_section(section);

        let workbook = build_workbook(&AnyAlignment::from(portal.clone())).expect("workbook");
        let restored = portal_from_workbook(&workbook, ARETOMO3_FORMAT).expect("restored");
        assert_eq!(restored, portal);
    }

    #[test]
    fn renamed_columns_are_rejected() {
        let mut workbook = build_workbook(&AnyAlignment::from(aln())).expect("workbook");
        workbook.tables[2].columns[1] = "ROTATION".to_string();
        assert!(matches!(
            aln_from_workbook(&workbook),
            Err(ToolError::InvalidWorkbook(_))
        ));
    }

    #[test]
    fn missing_sheet_is_reported() {
        let workbook = WorkbookData::default();
        let err = xf_from_workbook(&workbook).unwrap_err();
        assert!(err.to_string().contains(XF_SHEET));
    }
}
