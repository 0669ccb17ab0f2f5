//! Path-level orchestration: read one representation from disk, convert it,
//! and write the other.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::cryoet::alignment::convert::{self, ImodExportOptions};
use crate::cryoet::alignment::error::{Result, ToolError};
use crate::cryoet::alignment::io::{self, excel_write, mrc};
use crate::cryoet::alignment::io::storage::{LocalStore, Location, TextStore};
use crate::cryoet::alignment::model::{
    AlignmentFormat, AlnFile, AnyAlignment, ImodAlignment, InterchangeAlignment,
};
use crate::cryoet::alignment::tables::build_workbook;
use crate::cryoet::alignment::volume::{VolumeLayout, VolumeOptions};

/// Suffix of the reconstruction IMOD's `tilt` writes next to the bundle.
pub const IMOD_VOLUME_SUFFIX: &str = "_full_rec.mrc";
/// Suffix of the reconstruction AreTomo3 writes next to its `.aln` file.
pub const ARETOMO_VOLUME_SUFFIX: &str = "_Vol.mrc";

fn read_imod(store: &dyn TextStore, basename: &Path) -> Result<ImodAlignment> {
    match io::read(store, &Location::from(basename), Some(AlignmentFormat::Imod))? {
        AnyAlignment::Imod(imod) => Ok(imod),
        other => Err(unexpected(AlignmentFormat::Imod, &other)),
    }
}

fn read_aln(store: &dyn TextStore, input: &Path) -> Result<AlnFile> {
    match io::read(store, &Location::from(input), Some(AlignmentFormat::AreTomo3))? {
        AnyAlignment::AreTomo3(aln) => Ok(aln),
        other => Err(unexpected(AlignmentFormat::AreTomo3, &other)),
    }
}

fn read_portal(store: &dyn TextStore, input: &Path) -> Result<InterchangeAlignment> {
    match io::read(store, &Location::from(input), Some(AlignmentFormat::Portal))? {
        AnyAlignment::Portal(portal) => Ok(portal),
        other => Err(unexpected(AlignmentFormat::Portal, &other)),
    }
}

fn unexpected(expected: AlignmentFormat, found: &AnyAlignment) -> ToolError {
    ToolError::UnsupportedConversion {
        from: found.format().to_string(),
        to: expected.to_string(),
    }
}

fn write(alignment: AnyAlignment, output: &Path) -> Result<()> {
    io::write(&LocalStore, &alignment, &Location::from(output))
}

fn basename_of(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}

/// Series size implied by an IMOD bundle: the `tilt.com` image size and the
/// number of transforms.
fn imod_series_size(imod: &ImodAlignment) -> Option<[usize; 3]> {
    let tiltcom = imod.tiltcom.as_ref()?;
    let (x, y) = tiltcom.full_image;
    Some([
        usize::try_from(x).ok()?,
        usize::try_from(y).ok()?,
        imod.frame_count(),
    ])
}

/// Converts an IMOD bundle (addressed by basename) into interchange JSON.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), output = %output.display())
)]
pub fn imod_to_portal(input: &Path, output: &Path, volume: &VolumeOptions) -> Result<()> {
    let imod = read_imod(&LocalStore, input)?;
    info!(frames = imod.frame_count(), "read IMOD alignment");
    let portal = convert::portal_from_imod(&imod, volume.resolve(VolumeLayout::Xzy)?)?;
    debug!(sections = portal.section_count(), "interchange alignment constructed");
    write(portal.into(), output)
}

/// Converts an AreTomo3 `.aln` file into interchange JSON.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), output = %output.display())
)]
pub fn aretomo_to_portal(input: &Path, output: &Path, volume: &VolumeOptions) -> Result<()> {
    let aln = read_aln(&LocalStore, input)?;
    info!(
        frames = aln.raw_size[2],
        dark_frames = aln.dark_frames.len(),
        "read AreTomo3 alignment"
    );
    let portal = convert::portal_from_aretomo(&aln, volume.resolve(VolumeLayout::Xyz)?)?;
    debug!(sections = portal.section_count(), "interchange alignment constructed");
    write(portal.into(), output)
}

/// Expands interchange JSON into an IMOD bundle at the `output` basename.
/// The command files name their inputs after that basename unless
/// `options` already carries one.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), output = %output.display())
)]
pub fn portal_to_imod(input: &Path, output: &Path, options: &ImodExportOptions) -> Result<()> {
    let portal = read_portal(&LocalStore, input)?;
    info!(sections = portal.section_count(), "read interchange alignment");
    let mut options = options.clone();
    if options.basename.is_none() {
        options.basename = basename_of(output);
    }
    let imod = convert::imod_from_portal(&portal, &options)?;
    write(imod.into(), output)
}

/// Converts interchange JSON into an AreTomo3 `.aln` file.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), output = %output.display())
)]
pub fn portal_to_aretomo(input: &Path, output: &Path, ts_size: [usize; 3]) -> Result<()> {
    let portal = read_portal(&LocalStore, input)?;
    info!(sections = portal.section_count(), "read interchange alignment");
    let aln = convert::aretomo_from_portal(&portal, ts_size)?;
    write(aln.into(), output)
}

/// Converts an IMOD bundle into an AreTomo3 `.aln` file through the
/// interchange model. Without `ts_size` the series size is taken from
/// `tilt.com`.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), output = %output.display())
)]
pub fn imod_to_aretomo(input: &Path, output: &Path, ts_size: Option<[usize; 3]>) -> Result<()> {
    let imod = read_imod(&LocalStore, input)?;
    let ts_size = ts_size.or_else(|| imod_series_size(&imod)).ok_or_else(|| {
        ToolError::MissingInput("tilt-series size is required when tilt.com is absent".into())
    })?;
    let portal = convert::portal_from_imod(&imod, Default::default())?;
    info!(sections = portal.section_count(), "converted IMOD alignment");
    let aln = convert::aretomo_from_portal(&portal, ts_size)?;
    write(aln.into(), output)
}

/// Converts an AreTomo3 `.aln` file into an IMOD bundle through the
/// interchange model. The series size comes from the `.aln` raw size.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), output = %output.display())
)]
pub fn aretomo_to_imod(
    input: &Path,
    output: &Path,
    volume: &VolumeOptions,
    ts_spacing: f64,
    binning: u32,
) -> Result<()> {
    let aln = read_aln(&LocalStore, input)?;
    let portal = convert::portal_from_aretomo(&aln, volume.resolve(VolumeLayout::Xyz)?)?;
    info!(sections = portal.section_count(), "converted AreTomo3 alignment");
    let options = ImodExportOptions {
        ts_size: aln.raw_size,
        ts_spacing,
        binning,
        basename: basename_of(output),
    };
    let imod = convert::imod_from_portal(&portal, &options)?;
    write(imod.into(), output)
}

/// Writes the numeric tables of any alignment into an Excel workbook.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), output = %output.display(), %format)
)]
pub fn export_tables(input: &Path, format: AlignmentFormat, output: &Path) -> Result<()> {
    let alignment = io::read(&LocalStore, &Location::from(input), Some(format))?;
    let workbook = build_workbook(&alignment)?;
    debug!(sheet_count = workbook.tables.len(), "workbook constructed");
    excel_write::write_workbook(output, &workbook)
}

fn volume_beside(store: &dyn TextStore, volume: &Location) -> Result<VolumeOptions> {
    if !store.exists(volume)? {
        debug!(volume = %volume, "no reconstruction found, volume dimension stays zero");
        return Ok(VolumeOptions::default());
    }
    let path = volume
        .as_local()
        .ok_or_else(|| ToolError::UnsupportedLocation(volume.to_string()))?;
    Ok(VolumeOptions::from_header(mrc::read_header(path)?))
}

/// Builds an interchange alignment from an IMOD basename, taking the volume
/// dimension from `{basename}_full_rec.mrc` when it exists.
#[instrument(level = "info", skip_all, fields(basename = %basename.display()))]
pub fn portal_from_imod_basename(basename: &Path) -> Result<InterchangeAlignment> {
    let store = LocalStore;
    let imod = read_imod(&store, basename)?;
    let volume = volume_beside(&store, &Location::from(basename).with_suffix(IMOD_VOLUME_SUFFIX))?;
    convert::portal_from_imod(&imod, volume.resolve(VolumeLayout::Xzy)?)
}

/// Builds an interchange alignment from `{basename}.aln`, taking the volume
/// dimension from `{basename}_Vol.mrc` when it exists.
#[instrument(level = "info", skip_all, fields(basename = %basename.display()))]
pub fn portal_from_aretomo_basename(basename: &Path) -> Result<InterchangeAlignment> {
    let store = LocalStore;
    let base = Location::from(basename);
    let aln = match io::read(&store, &base.with_suffix(".aln"), Some(AlignmentFormat::AreTomo3))? {
        AnyAlignment::AreTomo3(aln) => aln,
        other => return Err(unexpected(AlignmentFormat::AreTomo3, &other)),
    };
    let volume = volume_beside(&store, &base.with_suffix(ARETOMO_VOLUME_SUFFIX))?;
    convert::portal_from_aretomo(&aln, volume.resolve(VolumeLayout::Xyz)?)
}

/// Frame bookkeeping of an alignment, as reported by the `info` command.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentSummary {
    pub format: AlignmentFormat,
    pub frame_count: usize,
    pub section_count: usize,
    pub skipped_sections: Vec<usize>,
    pub median_tilt_axis: Option<f64>,
}

/// Summarises any alignment through its interchange form. `frame_count`
/// overrides the count implied by the input, which for interchange JSON is
/// one past the highest `z_index`.
#[instrument(level = "info", skip_all, fields(input = %input.display(), %format))]
pub fn describe(
    input: &Path,
    format: AlignmentFormat,
    frame_count: Option<usize>,
) -> Result<AlignmentSummary> {
    let (portal, implied_frames) = match io::read(&LocalStore, &Location::from(input), Some(format))? {
        AnyAlignment::Imod(imod) => (
            convert::portal_from_imod(&imod, Default::default())?,
            imod.frame_count(),
        ),
        AnyAlignment::AreTomo3(aln) => (
            convert::portal_from_aretomo(&aln, Default::default())?,
            aln.raw_size[2],
        ),
        AnyAlignment::Portal(portal) => {
            let frames = portal.sections().keys().next_back().map_or(0, |last| last + 1);
            (portal, frames)
        }
    };
    let frame_count = frame_count.unwrap_or(implied_frames);

    Ok(AlignmentSummary {
        format,
        frame_count,
        section_count: portal.section_count(),
        skipped_sections: portal.get_skipped_sections(frame_count),
        median_tilt_axis: portal.get_median_tilt_axis(),
    })
}
