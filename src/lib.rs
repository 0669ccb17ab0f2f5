//! Core library for the cryoet-alignment-tools command line application.
//!
//! The library converts tilt-series alignments between IMOD, AreTomo3 and the
//! CryoET Data Portal interchange JSON. Text codecs live under
//! [`cryoet::alignment::io`], data representations inside
//! [`cryoet::alignment::model`], the conversions themselves in
//! [`cryoet::alignment::convert`], and the path-level orchestration under
//! [`cryoet::alignment::sync`].

pub mod cryoet;

pub use cryoet::alignment::{
    Result, ToolError, convert, error, geometry, io, logging, model, sync, tables, volume,
};
