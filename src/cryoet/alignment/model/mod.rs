//! In-memory representations of the three alignment formats.

use std::fmt;
use std::path::Path;

pub mod aretomo;
pub mod imod;
pub mod portal;

pub use aretomo::{AlnFile, DarkFrame, GlobalAlignmentRow, LocalAlignmentRow};
pub use imod::{ImodAlignment, NewstCom, TiltAngles, TiltCom, XfFile, XfRow};
pub use portal::{AlignmentType, InterchangeAlignment, PerSectionParameters, Vec3};

/// The alignment representations the tool understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentFormat {
    /// IMOD `.xf`/`.tlt`/`.xtilt` files plus `tilt.com`/`newst.com`.
    Imod,
    /// AreTomo3 `.aln` file.
    AreTomo3,
    /// CryoET Data Portal alignment JSON.
    Portal,
}

impl AlignmentFormat {
    /// Infers the format from a file extension; anything unknown is treated
    /// as an IMOD basename.
    pub fn infer(path: &str) -> Self {
        match Path::new(path).extension().and_then(|ext| ext.to_str()) {
            Some("aln") => AlignmentFormat::AreTomo3,
            Some("json") => AlignmentFormat::Portal,
            _ => AlignmentFormat::Imod,
        }
    }
}

impl fmt::Display for AlignmentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignmentFormat::Imod => write!(f, "imod"),
            AlignmentFormat::AreTomo3 => write!(f, "aretomo3"),
            AlignmentFormat::Portal => write!(f, "cdp"),
        }
    }
}

/// An alignment in any of the supported representations.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyAlignment {
    Imod(ImodAlignment),
    AreTomo3(AlnFile),
    Portal(InterchangeAlignment),
}

impl AnyAlignment {
    pub fn format(&self) -> AlignmentFormat {
        match self {
            AnyAlignment::Imod(_) => AlignmentFormat::Imod,
            AnyAlignment::AreTomo3(_) => AlignmentFormat::AreTomo3,
            AnyAlignment::Portal(_) => AlignmentFormat::Portal,
        }
    }
}

impl From<ImodAlignment> for AnyAlignment {
    fn from(alignment: ImodAlignment) -> Self {
        AnyAlignment::Imod(alignment)
    }
}

impl From<AlnFile> for AnyAlignment {
    fn from(alignment: AlnFile) -> Self {
        AnyAlignment::AreTomo3(alignment)
    }
}

impl From<InterchangeAlignment> for AnyAlignment {
    fn from(alignment: InterchangeAlignment) -> Self {
        AnyAlignment::Portal(alignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_format_from_extension() {
        assert_eq!(AlignmentFormat::infer("TS_01.aln"), AlignmentFormat::AreTomo3);
        assert_eq!(
            AlignmentFormat::infer("s3://bucket/TS_01/alignment.json"),
            AlignmentFormat::Portal
        );
        assert_eq!(AlignmentFormat::infer("/data/TS_01/TS_01"), AlignmentFormat::Imod);
    }
}
