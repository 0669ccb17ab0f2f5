//! Text codecs for each alignment format plus format-dispatching helpers.

pub mod aln;
pub mod com;
pub(crate) mod command;
pub mod excel_read;
pub mod excel_write;
pub mod imod;
pub mod mrc;
pub mod portal;
pub mod storage;
pub mod text;
pub mod xf;

use tracing::{debug, instrument};

use crate::cryoet::alignment::error::Result;
use crate::cryoet::alignment::model::{AlignmentFormat, AnyAlignment};

use self::imod::ImodPaths;
use self::storage::{Location, TextStore};

/// Reads an alignment from `location`. IMOD bundles are addressed by their
/// basename. Without an explicit format it is inferred from the extension.
#[instrument(level = "debug", skip(store), fields(location = %location))]
pub fn read(
    store: &dyn TextStore,
    location: &Location,
    format: Option<AlignmentFormat>,
) -> Result<AnyAlignment> {
    let format = format.unwrap_or_else(|| AlignmentFormat::infer(&location.to_string()));
    debug!(%format, "reading alignment");
    Ok(match format {
        AlignmentFormat::Imod => {
            let paths = ImodPaths::resolve(Some(location), &ImodPaths::default())?;
            AnyAlignment::Imod(imod::read_imod(store, &paths)?)
        }
        AlignmentFormat::AreTomo3 => {
            AnyAlignment::AreTomo3(aln::parse_aln(&store.read_to_string(location)?)?)
        }
        AlignmentFormat::Portal => {
            AnyAlignment::Portal(portal::parse_portal(&store.read_to_string(location)?)?)
        }
    })
}

/// Writes an alignment to `location` in the format of its own variant.
#[instrument(level = "debug", skip(store, alignment), fields(location = %location, format = %alignment.format()))]
pub fn write(store: &dyn TextStore, alignment: &AnyAlignment, location: &Location) -> Result<()> {
    match alignment {
        AnyAlignment::Imod(imod_alignment) => {
            let paths = ImodPaths::resolve(Some(location), &ImodPaths::default())?;
            imod::write_imod(store, imod_alignment, &paths)
        }
        AnyAlignment::AreTomo3(aln_file) => {
            store.write_string(location, &aln::aln_to_string(aln_file)?)
        }
        AnyAlignment::Portal(portal_alignment) => {
            store.write_string(location, &portal::portal_to_string(portal_alignment)?)
        }
    }
}
