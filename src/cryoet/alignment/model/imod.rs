use nalgebra::{Matrix2, Vector2};

use crate::cryoet::alignment::error::{Result, ToolError};

/// One row of an IMOD `.xf` file: a 2x2 matrix followed by a shift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XfRow {
    pub mxx: f64,
    pub mxy: f64,
    pub myx: f64,
    pub myy: f64,
    pub sx: f64,
    pub sy: f64,
}

impl XfRow {
    pub const IDENTITY: XfRow = XfRow {
        mxx: 1.0,
        mxy: 0.0,
        myx: 0.0,
        myy: 1.0,
        sx: 0.0,
        sy: 0.0,
    };

    pub fn from_parts(matrix: &Matrix2<f64>, shift: &Vector2<f64>) -> Self {
        Self {
            mxx: matrix[(0, 0)],
            mxy: matrix[(0, 1)],
            myx: matrix[(1, 0)],
            myy: matrix[(1, 1)],
            sx: shift.x,
            sy: shift.y,
        }
    }

    pub fn matrix(&self) -> Matrix2<f64> {
        Matrix2::new(self.mxx, self.mxy, self.myx, self.myy)
    }

    pub fn shift(&self) -> Vector2<f64> {
        Vector2::new(self.sx, self.sy)
    }

    pub fn to_row(&self) -> [f64; 6] {
        [self.mxx, self.mxy, self.myx, self.myy, self.sx, self.sy]
    }

    pub fn from_row(row: &[f64; 6]) -> Self {
        Self {
            mxx: row[0],
            mxy: row[1],
            myx: row[2],
            myy: row[3],
            sx: row[4],
            sy: row[5],
        }
    }
}

/// Contents of an IMOD `.xf` transform file, one row per original frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XfFile {
    pub rows: Vec<XfRow>,
}

impl XfFile {
    pub fn new(rows: Vec<XfRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_rows(&self) -> Vec<[f64; 6]> {
        self.rows.iter().map(XfRow::to_row).collect()
    }

    /// Builds the file from numeric rows, which must have exactly six columns.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let rows = rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let row: [f64; 6] = row.as_ref().try_into().map_err(|_| {
                    ToolError::ShapeMismatch(format!(
                        "transform row {index} has {} columns, expected 6",
                        row.as_ref().len()
                    ))
                })?;
                Ok(XfRow::from_row(&row))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rows })
    }
}

/// A one-value-per-line angle file (`.tlt`, `.rawtlt`, `.xtilt`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TiltAngles {
    pub angles: Vec<f64>,
}

impl TiltAngles {
    pub fn new(angles: Vec<f64>) -> Self {
        Self { angles }
    }

    pub fn len(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }
}

/// Parameters of an IMOD `tilt.com` reconstruction command file.
#[derive(Debug, Clone, PartialEq)]
pub struct TiltCom {
    pub input_projections: String,
    pub output_file: String,
    pub image_binned: i64,
    pub tilt_file: String,
    /// Thickness in unbinned pixels of the input tilt series.
    pub thickness: i64,
    pub radial: (f64, f64),
    pub falloff_is_true_sigma: i64,
    pub x_axis_tilt: f64,
    pub scale: (f64, f64),
    pub perpendicular: bool,
    pub mode: i64,
    pub full_image: (i64, i64),
    pub subset_start: (i64, i64),
    pub adjust_origin: bool,
    pub action_if_gpu_fails: Option<(i64, i64)>,
    pub x_tilt_file: Option<String>,
    pub offset: Option<f64>,
    pub shift: Option<(f64, f64)>,
    /// Excluded frames, 0-based (the file stores them 1-based).
    pub exclude_list: Vec<usize>,
    /// `EXCLUDELIST2` as read from disk. Written back verbatim while it
    /// still expands to `exclude_list`.
    pub exclude_list_text: Option<String>,
}

impl TiltCom {
    /// Creates a command record with IMOD's usual defaults for the optional fields.
    pub fn new(
        input_projections: impl Into<String>,
        output_file: impl Into<String>,
        tilt_file: impl Into<String>,
        thickness: i64,
        full_image: (i64, i64),
    ) -> Self {
        Self {
            input_projections: input_projections.into(),
            output_file: output_file.into(),
            image_binned: 1,
            tilt_file: tilt_file.into(),
            thickness,
            radial: (0.35, 0.035),
            falloff_is_true_sigma: 1,
            x_axis_tilt: 0.0,
            scale: (0.0, 0.1),
            perpendicular: true,
            mode: 2,
            full_image,
            subset_start: (0, 0),
            adjust_origin: true,
            action_if_gpu_fails: Some((1, 2)),
            x_tilt_file: None,
            offset: Some(0.0),
            shift: Some((0.0, 0.0)),
            exclude_list: Vec::new(),
            exclude_list_text: None,
        }
    }
}

/// Parameters of an IMOD `newst.com` resampling command file.
#[derive(Debug, Clone, PartialEq)]
pub struct NewstCom {
    pub antialias_filter: i64,
    pub input_file: String,
    pub output_file: String,
    pub transform_file: String,
    pub taper_at_fill: (i64, i64),
    pub adjust_origin: bool,
    pub offsets_in_x_and_y: (f64, f64),
    pub distortion_field: Option<String>,
    pub images_are_binned: f64,
    pub bin_by_factor: Option<i64>,
    pub gradient_file: Option<String>,
}

impl NewstCom {
    pub fn new(
        input_file: impl Into<String>,
        output_file: impl Into<String>,
        transform_file: impl Into<String>,
    ) -> Self {
        Self {
            antialias_filter: -1,
            input_file: input_file.into(),
            output_file: output_file.into(),
            transform_file: transform_file.into(),
            taper_at_fill: (0, 0),
            adjust_origin: true,
            offsets_in_x_and_y: (0.0, 0.0),
            distortion_field: None,
            images_are_binned: 1.0,
            bin_by_factor: Some(1),
            gradient_file: None,
        }
    }
}

/// The cooperating IMOD files that describe one tilt-series alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct ImodAlignment {
    pub xf: XfFile,
    pub tlt: TiltAngles,
    pub xtilt: Option<TiltAngles>,
    pub tiltcom: Option<TiltCom>,
    pub newstcom: Option<NewstCom>,
}

impl ImodAlignment {
    pub fn new(xf: XfFile, tlt: TiltAngles) -> Self {
        Self {
            xf,
            tlt,
            xtilt: None,
            tiltcom: None,
            newstcom: None,
        }
    }

    /// Number of frames in the original tilt series.
    pub fn frame_count(&self) -> usize {
        self.xf.len()
    }

    /// Checks that every per-frame list covers the same frames.
    pub fn validate(&self) -> Result<()> {
        if self.xf.len() != self.tlt.len() {
            return Err(ToolError::ShapeMismatch(format!(
                "{} transforms but {} tilt angles",
                self.xf.len(),
                self.tlt.len()
            )));
        }
        if let Some(xtilt) = &self.xtilt {
            if xtilt.len() != self.xf.len() {
                return Err(ToolError::ShapeMismatch(format!(
                    "{} transforms but {} secondary tilt angles",
                    self.xf.len(),
                    xtilt.len()
                )));
            }
        }
        Ok(())
    }

    /// Excluded original frames (0-based) declared by the tilt command file.
    pub fn excluded_frames(&self) -> &[usize] {
        self.tiltcom
            .as_ref()
            .map(|tiltcom| tiltcom.exclude_list.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_length_disagreement() {
        let mut alignment = ImodAlignment::new(
            XfFile::new(vec![XfRow::IDENTITY; 3]),
            TiltAngles::new(vec![-3.0, 0.0, 3.0]),
        );
        assert!(alignment.validate().is_ok());

        alignment.xtilt = Some(TiltAngles::new(vec![0.0, 0.0]));
        assert!(matches!(
            alignment.validate(),
            Err(ToolError::ShapeMismatch(_))
        ));

        alignment.xtilt = None;
        alignment.tlt.angles.pop();
        assert!(matches!(
            alignment.validate(),
            Err(ToolError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn xf_rows_reject_wrong_width() {
        let rows = vec![vec![1.0, 0.0, 0.0, 1.0, 2.0]];
        assert!(matches!(
            XfFile::from_rows(&rows),
            Err(ToolError::ShapeMismatch(_))
        ));

        let rows = vec![vec![1.0, 0.0, 0.0, 1.0, 2.0, 3.0]];
        let xf = XfFile::from_rows(&rows).expect("six columns accepted");
        assert_eq!(xf.rows[0].shift(), Vector2::new(2.0, 3.0));
    }

    #[test]
    fn excluded_frames_default_to_empty() {
        let alignment = ImodAlignment::new(XfFile::default(), TiltAngles::default());
        assert!(alignment.excluded_frames().is_empty());
    }
}
