//! Physical volume dimensions attached to interchange alignments.

use crate::cryoet::alignment::error::{Result, ToolError};
use crate::cryoet::alignment::model::Vec3;

/// The header fields needed to derive a volume's physical extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeHeader {
    pub nx: i32,
    pub ny: i32,
    pub nz: i32,
    pub mx: i32,
    pub my: i32,
    pub mz: i32,
    /// Cell dimensions in Angstrom.
    pub cell: [f32; 3],
}

/// Axis order of a reconstruction on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VolumeLayout {
    /// Thickness along Z.
    #[default]
    Xyz,
    /// Thickness along Y, as IMOD's `tilt` writes unrotated volumes.
    Xzy,
}

impl VolumeHeader {
    /// Physical extent per axis, `cell / sampling * voxels`, reordered to x, y, z.
    pub fn extent(&self, layout: VolumeLayout) -> Result<Vec3> {
        let axis = |cell: f32, sampling: i32, voxels: i32, name: &str| -> Result<f64> {
            if sampling <= 0 {
                return Err(ToolError::InvalidDimension(format!(
                    "volume header sampling m{name} is {sampling}"
                )));
            }
            Ok(f64::from(cell) / f64::from(sampling) * f64::from(voxels))
        };
        let x = axis(self.cell[0], self.mx, self.nx, "x")?;
        let y = axis(self.cell[1], self.my, self.ny, "y")?;
        let z = axis(self.cell[2], self.mz, self.nz, "z")?;
        Ok(match layout {
            VolumeLayout::Xyz => Vec3::new(x, y, z),
            VolumeLayout::Xzy => Vec3::new(x, z, y),
        })
    }
}

/// Where to take the volume dimension from when building an interchange
/// alignment. An explicit size wins over a header; with neither the
/// dimension is zero-filled.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VolumeOptions {
    pub explicit_size: Option<[f64; 3]>,
    pub header: Option<VolumeHeader>,
}

impl VolumeOptions {
    pub fn explicit(size: [f64; 3]) -> Self {
        Self {
            explicit_size: Some(size),
            header: None,
        }
    }

    pub fn from_header(header: VolumeHeader) -> Self {
        Self {
            explicit_size: None,
            header: Some(header),
        }
    }

    pub fn resolve(&self, layout: VolumeLayout) -> Result<Vec3> {
        match (self.explicit_size, &self.header) {
            (Some(size), _) => Ok(Vec3::from(size)),
            (None, Some(header)) => header.extent(layout),
            (None, None) => Ok(Vec3::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> VolumeHeader {
        VolumeHeader {
            nx: 958,
            ny: 200,
            nz: 927,
            mx: 958,
            my: 200,
            mz: 927,
            cell: [9580.0, 2000.0, 9270.0],
        }
    }

    #[test]
    fn explicit_size_wins() {
        let options = VolumeOptions {
            explicit_size: Some([1.0, 2.0, 3.0]),
            header: Some(header()),
        };
        assert_eq!(
            options.resolve(VolumeLayout::Xyz).expect("resolved"),
            Vec3::new(1.0, 2.0, 3.0)
        );
    }

    #[test]
    fn imod_layout_swaps_thickness_axis() {
        let options = VolumeOptions::from_header(header());
        let extent = options.resolve(VolumeLayout::Xzy).expect("resolved");
        assert_eq!(extent, Vec3::new(9580.0, 9270.0, 2000.0));
    }

    #[test]
    fn missing_sources_resolve_to_zero() {
        let extent = VolumeOptions::default()
            .resolve(VolumeLayout::Xyz)
            .expect("resolved");
        assert_eq!(extent, Vec3::default());
    }

    #[test]
    fn zero_sampling_is_rejected() {
        let mut header = header();
        header.my = 0;
        assert!(matches!(
            header.extent(VolumeLayout::Xyz),
            Err(ToolError::InvalidDimension(_))
        ));
    }
}
