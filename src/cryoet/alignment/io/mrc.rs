// MRC2014 header introspection, see https://www.ccpem.ac.uk/mrc_format/mrc2014.php
//
// Only the words needed for physical dimensions are decoded: nx, ny, nz
// (words 1-3), mx, my, mz (words 8-10) and the cell lengths (words 11-13).
// The machine stamp (word 54) selects the byte order.

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use byteorder::{BE, ByteOrder, LE, ReadBytesExt};

use crate::cryoet::alignment::error::{Result, ToolError};
use crate::cryoet::alignment::volume::VolumeHeader;

pub const HEADER_LEN: usize = 1024;

const MACHINE_STAMP_OFFSET: usize = 4 * 53;

/// Reads the header of the MRC volume at `path`.
pub fn read_header(path: &Path) -> Result<VolumeHeader> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut bytes = [0u8; HEADER_LEN];
    reader.read_exact(&mut bytes)?;
    parse_header(&bytes)
}

/// Decodes a raw 1024-byte MRC header.
pub fn parse_header(bytes: &[u8]) -> Result<VolumeHeader> {
    if bytes.len() < HEADER_LEN {
        return Err(ToolError::parse(
            "MRC header",
            format!("expected {HEADER_LEN} bytes, found {}", bytes.len()),
        ));
    }

    // 0x11 in the first stamp byte marks big-endian files, everything else
    // (0x44, or zeros from old writers) is read as little-endian.
    if bytes[MACHINE_STAMP_OFFSET] == 0x11 {
        decode::<BE>(bytes)
    } else {
        decode::<LE>(bytes)
    }
}

fn decode<B: ByteOrder>(bytes: &[u8]) -> Result<VolumeHeader> {
    let mut cursor = Cursor::new(bytes);
    let nx = cursor.read_i32::<B>()?;
    let ny = cursor.read_i32::<B>()?;
    let nz = cursor.read_i32::<B>()?;

    // skip mode and nxstart..nzstart (words 4-7)
    cursor.set_position(4 * 7);
    let mx = cursor.read_i32::<B>()?;
    let my = cursor.read_i32::<B>()?;
    let mz = cursor.read_i32::<B>()?;
    let cell = [
        cursor.read_f32::<B>()?,
        cursor.read_f32::<B>()?,
        cursor.read_f32::<B>()?,
    ];

    Ok(VolumeHeader {
        nx,
        ny,
        nz,
        mx,
        my,
        mz,
        cell,
    })
}
