//! Reading and writing the multi-file IMOD alignment bundle.

use tracing::debug;

use crate::cryoet::alignment::error::{Result, ToolError};
use crate::cryoet::alignment::io::com::{
    newstcom_to_string, parse_newstcom, parse_tiltcom, tiltcom_to_string,
};
use crate::cryoet::alignment::io::storage::{Location, TextStore};
use crate::cryoet::alignment::io::xf::{angles_to_string, parse_angles, parse_xf, xf_to_string};
use crate::cryoet::alignment::model::ImodAlignment;

/// Explicit per-file locations of an IMOD bundle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImodPaths {
    pub xf: Option<Location>,
    pub tlt: Option<Location>,
    pub xtilt: Option<Location>,
    pub tiltcom: Option<Location>,
    pub newstcom: Option<Location>,
}

/// Fully resolved bundle locations. With a basename the optional files are
/// only used when they exist.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImodPaths {
    pub xf: Location,
    pub tlt: Location,
    pub xtilt: Option<Location>,
    pub tiltcom: Option<Location>,
    pub newstcom: Option<Location>,
    pub from_basename: bool,
}

impl ImodPaths {
    fn any(&self) -> bool {
        self.xf.is_some()
            || self.tlt.is_some()
            || self.xtilt.is_some()
            || self.tiltcom.is_some()
            || self.newstcom.is_some()
    }

    /// Picks exactly one input mode: a basename, or explicit xf and tlt paths.
    pub fn resolve(basename: Option<&Location>, explicit: &ImodPaths) -> Result<ResolvedImodPaths> {
        match basename {
            Some(_) if explicit.any() => Err(ToolError::MissingInput(
                "either a basename or explicit xf/tlt paths must be given, not both".into(),
            )),
            Some(base) => Ok(ResolvedImodPaths {
                xf: base.with_suffix(".xf"),
                tlt: base.with_suffix(".tlt"),
                xtilt: Some(base.with_suffix(".xtilt")),
                tiltcom: Some(base.sibling("tilt.com")),
                newstcom: Some(base.sibling("newst.com")),
                from_basename: true,
            }),
            None => match (&explicit.xf, &explicit.tlt) {
                (Some(xf), Some(tlt)) => Ok(ResolvedImodPaths {
                    xf: xf.clone(),
                    tlt: tlt.clone(),
                    xtilt: explicit.xtilt.clone(),
                    tiltcom: explicit.tiltcom.clone(),
                    newstcom: explicit.newstcom.clone(),
                    from_basename: false,
                }),
                _ => Err(ToolError::MissingInput(
                    "either a basename or both xf and tlt paths must be given".into(),
                )),
            },
        }
    }
}

fn read_optional<T>(
    store: &dyn TextStore,
    location: Option<&Location>,
    probe: bool,
    parse: fn(&str) -> Result<T>,
) -> Result<Option<T>> {
    let Some(location) = location else {
        return Ok(None);
    };
    if probe && !store.exists(location)? {
        debug!(location = %location, "optional IMOD file absent");
        return Ok(None);
    }
    Ok(Some(parse(&store.read_to_string(location)?)?))
}

/// Reads an IMOD bundle and checks that its per-frame lists agree.
pub fn read_imod(store: &dyn TextStore, paths: &ResolvedImodPaths) -> Result<ImodAlignment> {
    let probe = paths.from_basename;
    let alignment = ImodAlignment {
        xf: parse_xf(&store.read_to_string(&paths.xf)?)?,
        tlt: parse_angles(&store.read_to_string(&paths.tlt)?)?,
        xtilt: read_optional(store, paths.xtilt.as_ref(), probe, parse_angles)?,
        tiltcom: read_optional(store, paths.tiltcom.as_ref(), probe, parse_tiltcom)?,
        newstcom: read_optional(store, paths.newstcom.as_ref(), probe, parse_newstcom)?,
    };
    alignment.validate()?;
    debug!(
        frames = alignment.frame_count(),
        excluded = alignment.excluded_frames().len(),
        "read IMOD alignment"
    );
    Ok(alignment)
}

/// Writes every file of the bundle that has both content and a destination.
pub fn write_imod(
    store: &dyn TextStore,
    alignment: &ImodAlignment,
    paths: &ResolvedImodPaths,
) -> Result<()> {
    store.write_string(&paths.xf, &xf_to_string(&alignment.xf))?;
    store.write_string(&paths.tlt, &angles_to_string(&alignment.tlt))?;
    if let (Some(xtilt), Some(location)) = (&alignment.xtilt, &paths.xtilt) {
        store.write_string(location, &angles_to_string(xtilt))?;
    }
    if let (Some(tiltcom), Some(location)) = (&alignment.tiltcom, &paths.tiltcom) {
        store.write_string(location, &tiltcom_to_string(tiltcom)?)?;
    }
    if let (Some(newstcom), Some(location)) = (&alignment.newstcom, &paths.newstcom) {
        store.write_string(location, &newstcom_to_string(newstcom)?)?;
    }
    Ok(())
}
