//! MRC header access
//!
//! Only the fixed 1024-byte header is read: dimensions, data mode and voxel
//! size. That is enough to count images in a class stack and report map
//! shapes; voxel data is left to the rendering side.

use crate::error::{RelionError, Result, ResultExt};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Size of the fixed MRC2014 header
pub const MRC_HEADER_LEN: usize = 1024;

/// Parsed MRC header fields
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MrcHeader {
    pub nx: u32,
    pub ny: u32,
    /// Number of sections; the image count for `.mrcs` stacks
    pub nz: u32,
    pub mode: u32,
    /// Voxel size in Å along x
    pub voxel_size: f64,
}

impl MrcHeader {
    /// Parse a header from its raw bytes
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MRC_HEADER_LEN {
            return Err(RelionError::schema(
                "MRC header",
                format!("{} bytes, expected {MRC_HEADER_LEN}", bytes.len()),
            ));
        }
        // machine stamp 0x11 0x11 marks big-endian files
        let big_endian = bytes[212] == 0x11;
        let word = |offset: usize| -> [u8; 4] {
            [bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]
        };
        let int = |offset: usize| {
            if big_endian {
                i32::from_be_bytes(word(offset))
            } else {
                i32::from_le_bytes(word(offset))
            }
        };
        let float = |offset: usize| {
            if big_endian {
                f32::from_be_bytes(word(offset))
            } else {
                f32::from_le_bytes(word(offset))
            }
        };

        let dims = [int(0), int(4), int(8)];
        if dims.iter().any(|&d| d < 0) {
            return Err(RelionError::schema(
                "MRC header",
                format!("negative dimensions {dims:?}"),
            ));
        }
        let mx = int(28);
        let xlen = float(40) as f64;
        let voxel_size = if mx > 0 { xlen / mx as f64 } else { 0.0 };

        Ok(Self {
            nx: dims[0] as u32,
            ny: dims[1] as u32,
            nz: dims[2] as u32,
            mode: int(12).max(0) as u32,
            voxel_size,
        })
    }

    /// Read the header of a file; a missing file is `MissingOutput`
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RelionError::MissingOutput(path.to_path_buf()));
        }
        let mut buf = [0u8; MRC_HEADER_LEN];
        File::open(path)
            .and_then(|mut f| f.read_exact(&mut buf))
            .map_err(RelionError::from)
            .with_context(|| format!("Failed to read MRC header of {}", path.display()))?;
        Self::parse(&buf)
    }

    /// Header bytes for a file of the given shape (little-endian, mode 2)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; MRC_HEADER_LEN];
        let mut put = |offset: usize, bytes: [u8; 4]| {
            buf[offset..offset + 4].copy_from_slice(&bytes);
        };
        put(0, (self.nx as i32).to_le_bytes());
        put(4, (self.ny as i32).to_le_bytes());
        put(8, (self.nz as i32).to_le_bytes());
        put(12, (self.mode as i32).to_le_bytes());
        put(28, (self.nx as i32).to_le_bytes());
        put(32, (self.ny as i32).to_le_bytes());
        put(36, (self.nz as i32).to_le_bytes());
        put(40, ((self.voxel_size * self.nx as f64) as f32).to_le_bytes());
        put(44, ((self.voxel_size * self.ny as f64) as f32).to_le_bytes());
        put(48, ((self.voxel_size * self.nz as f64) as f32).to_le_bytes());
        buf[208..212].copy_from_slice(b"MAP ");
        buf[212] = 0x44;
        buf[213] = 0x44;
        buf
    }
}

/// An MRC file on disk together with its header
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapFile {
    pub path: PathBuf,
    pub header: MrcHeader,
}

impl MapFile {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let header = MrcHeader::read(&path)?;
        Ok(Self { path, header })
    }

    /// Number of images in a stack, or sections in a volume
    pub fn len(&self) -> usize {
        self.header.nz as usize
    }

    pub fn is_empty(&self) -> bool {
        self.header.nz == 0
    }
}
