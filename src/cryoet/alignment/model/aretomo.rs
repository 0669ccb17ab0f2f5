use std::collections::BTreeSet;

use crate::cryoet::alignment::error::{Result, ToolError};

/// Header line AreTomo3 writes at the top of every `.aln` file.
pub const DEFAULT_HEADER: &str = "# AreTomo Alignment / Priims bprmMn";

/// Global alignment of one retained section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalAlignmentRow {
    /// 0-based index into the retained sequence (dark frames removed).
    pub sec: usize,
    /// Tilt axis rotation in degrees.
    pub rot: f64,
    pub gmag: f64,
    pub tx: f64,
    pub ty: f64,
    pub smean: f64,
    pub sfit: f64,
    pub scale: f64,
    pub base: f64,
    pub tilt: f64,
}

impl GlobalAlignmentRow {
    /// Row with AreTomo's neutral values for the fit columns.
    pub fn new(sec: usize, rot: f64, tx: f64, ty: f64, tilt: f64) -> Self {
        Self {
            sec,
            rot,
            gmag: 1.0,
            tx,
            ty,
            smean: 1.0,
            sfit: 1.0,
            scale: 1.0,
            base: 0.0,
            tilt,
        }
    }

    pub fn to_row(&self) -> [f64; 10] {
        [
            self.sec as f64,
            self.rot,
            self.gmag,
            self.tx,
            self.ty,
            self.smean,
            self.sfit,
            self.scale,
            self.base,
            self.tilt,
        ]
    }

    fn from_row(row: &[f64; 10]) -> Self {
        Self {
            sec: row[0].round().max(0.0) as usize,
            rot: row[1],
            gmag: row[2],
            tx: row[3],
            ty: row[4],
            smean: row[5],
            sfit: row[6],
            scale: row[7],
            base: row[8],
            tilt: row[9],
        }
    }
}

/// A frame of the raw tilt series discarded before reconstruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DarkFrame {
    /// 0-based index into the raw tilt series.
    pub section_idx: usize,
    pub val2: i64,
    pub angle: f64,
}

/// Patch-level correction on one retained section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalAlignmentRow {
    pub sec_idx: usize,
    pub patch_idx: usize,
    pub center_x: f64,
    pub center_y: f64,
    pub shift_x: f64,
    pub shift_y: f64,
    pub is_reliable: f64,
}

impl LocalAlignmentRow {
    pub fn to_row(&self) -> [f64; 7] {
        [
            self.sec_idx as f64,
            self.patch_idx as f64,
            self.center_x,
            self.center_y,
            self.shift_x,
            self.shift_y,
            self.is_reliable,
        ]
    }

    fn from_row(row: &[f64; 7]) -> Self {
        Self {
            sec_idx: row[0].round().max(0.0) as usize,
            patch_idx: row[1].round().max(0.0) as usize,
            center_x: row[2],
            center_y: row[3],
            shift_x: row[4],
            shift_y: row[5],
            is_reliable: row[6],
        }
    }
}

/// Contents of an AreTomo3 `.aln` alignment file.
#[derive(Debug, Clone, PartialEq)]
pub struct AlnFile {
    pub header: String,
    /// Raw tilt series size: x, y and total frame count.
    pub raw_size: [usize; 3],
    pub num_patches: usize,
    pub dark_frames: Vec<DarkFrame>,
    pub alpha_offset: f64,
    pub beta_offset: f64,
    pub global_alignments: Vec<GlobalAlignmentRow>,
    pub local_alignments: Vec<LocalAlignmentRow>,
}

impl AlnFile {
    pub fn new(raw_size: [usize; 3]) -> Self {
        Self {
            header: DEFAULT_HEADER.to_string(),
            raw_size,
            num_patches: 0,
            dark_frames: Vec::new(),
            alpha_offset: 0.0,
            beta_offset: 0.0,
            global_alignments: Vec::new(),
            local_alignments: Vec::new(),
        }
    }

    /// Raw-series indices of the frames that survived, in ascending order.
    pub fn retained_indices(&self) -> Vec<usize> {
        let dark: BTreeSet<usize> = self.dark_frames.iter().map(|frame| frame.section_idx).collect();
        (0..self.raw_size[2])
            .filter(|index| !dark.contains(index))
            .collect()
    }

    /// Checks the frame bookkeeping that every conversion relies on.
    pub fn validate(&self) -> Result<()> {
        let total = self.raw_size[2];
        let mut seen = BTreeSet::new();
        for frame in &self.dark_frames {
            if frame.section_idx >= total {
                return Err(ToolError::StructuralMismatch(format!(
                    "dark frame {} lies outside the raw series of {total} frames",
                    frame.section_idx
                )));
            }
            if !seen.insert(frame.section_idx) {
                return Err(ToolError::StructuralMismatch(format!(
                    "dark frame {} listed twice",
                    frame.section_idx
                )));
            }
        }

        if self.dark_frames.len() + self.global_alignments.len() != total {
            return Err(ToolError::StructuralMismatch(format!(
                "{} dark frames and {} global alignments do not add up to {total} raw frames",
                self.dark_frames.len(),
                self.global_alignments.len()
            )));
        }

        if !self.local_alignments.is_empty()
            && self.local_alignments.len() != self.global_alignments.len() * self.num_patches
        {
            return Err(ToolError::StructuralMismatch(format!(
                "{} local alignments but {} sections with {} patches each",
                self.local_alignments.len(),
                self.global_alignments.len(),
                self.num_patches
            )));
        }
        Ok(())
    }

    pub fn global_rows(&self) -> Vec<[f64; 10]> {
        self.global_alignments
            .iter()
            .map(GlobalAlignmentRow::to_row)
            .collect()
    }

    pub fn set_global_rows<R: AsRef<[f64]>>(&mut self, rows: &[R]) -> Result<()> {
        self.global_alignments = fixed_rows::<R, 10>(rows, "global alignment")?
            .iter()
            .map(GlobalAlignmentRow::from_row)
            .collect();
        Ok(())
    }

    pub fn local_rows(&self) -> Vec<[f64; 7]> {
        self.local_alignments
            .iter()
            .map(LocalAlignmentRow::to_row)
            .collect()
    }

    pub fn set_local_rows<R: AsRef<[f64]>>(&mut self, rows: &[R]) -> Result<()> {
        self.local_alignments = fixed_rows::<R, 7>(rows, "local alignment")?
            .iter()
            .map(LocalAlignmentRow::from_row)
            .collect();
        Ok(())
    }
}

fn fixed_rows<R: AsRef<[f64]>, const N: usize>(rows: &[R], what: &str) -> Result<Vec<[f64; N]>> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let row = row.as_ref();
            row.try_into().map_err(|_| {
                ToolError::ShapeMismatch(format!(
                    "{what} row {index} has {} columns, expected {N}",
                    row.len()
                ))
            })
        })
        .collect()
}
