//! Self-describing tensor files.
//!
//! Every numeric array in an index directory uses one container: magic
//! bytes, format version, a dtype tag, the shape, then raw element data.
//! All integers and elements are little-endian.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Magic (4B): "WFTN"                   │
//! │ Version (4B): u32                    │
//! │ Dtype (1B): 1=f32, 2=u32, 3=u8       │
//! │ Rank (1B): number of dimensions      │
//! │ Shape (8B × rank): u64 dim sizes     │
//! ├──────────────────────────────────────┤
//! │ Element data (little-endian)         │
//! └──────────────────────────────────────┘
//! ```
//!
//! A rank of 0 stores a single scalar. Readers verify magic, version,
//! dtype, and that the payload length matches the shape product.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{IndexError, Result};

/// Magic bytes for tensor files.
pub const TENSOR_MAGIC: &[u8; 4] = b"WFTN";

/// Current tensor format version.
pub const TENSOR_VERSION: u32 = 1;

/// Element types supported by the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Dtype {
    F32 = 1,
    U32 = 2,
    U8 = 3,
}

impl Dtype {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Dtype::F32),
            2 => Some(Dtype::U32),
            3 => Some(Dtype::U8),
            _ => None,
        }
    }
}

fn write_header(w: &mut impl Write, dtype: Dtype, shape: &[usize]) -> std::io::Result<()> {
    w.write_all(TENSOR_MAGIC)?;
    w.write_all(&TENSOR_VERSION.to_le_bytes())?;
    w.write_all(&[dtype as u8, shape.len() as u8])?;
    for &dim in shape {
        w.write_all(&(dim as u64).to_le_bytes())?;
    }
    Ok(())
}

fn read_header(r: &mut impl Read, path: &Path) -> Result<(Dtype, Vec<usize>)> {
    let err = |reason: String| IndexError::format(path)(reason);
    let io = |e| IndexError::io("read", path)(e);

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).map_err(io)?;
    if &magic != TENSOR_MAGIC {
        return Err(err(format!("bad magic bytes {magic:?}")));
    }

    let mut u32_buf = [0u8; 4];
    r.read_exact(&mut u32_buf).map_err(io)?;
    let version = u32::from_le_bytes(u32_buf);
    if version != TENSOR_VERSION {
        return Err(err(format!("unsupported version {version}")));
    }

    let mut tag_rank = [0u8; 2];
    r.read_exact(&mut tag_rank).map_err(io)?;
    let dtype = Dtype::from_tag(tag_rank[0])
        .ok_or_else(|| IndexError::format(path)(format!("unknown dtype tag {}", tag_rank[0])))?;

    let mut shape = Vec::with_capacity(tag_rank[1] as usize);
    let mut u64_buf = [0u8; 8];
    for _ in 0..tag_rank[1] {
        r.read_exact(&mut u64_buf).map_err(io)?;
        shape.push(u64::from_le_bytes(u64_buf) as usize);
    }

    Ok((dtype, shape))
}

fn check_len(path: &Path, shape: &[usize], len: usize) -> Result<()> {
    let expected: usize = shape.iter().product();
    if expected != len {
        return Err(IndexError::format(path)(format!(
            "shape {shape:?} expects {expected} elements, got {len}"
        )));
    }
    Ok(())
}

fn read_payload(path: &Path, expect: Dtype) -> Result<(Vec<usize>, Vec<u8>)> {
    let file = File::open(path).map_err(IndexError::io("open", path))?;
    let mut reader = BufReader::new(file);
    let (dtype, shape) = read_header(&mut reader, path)?;
    if dtype != expect {
        return Err(IndexError::format(path)(format!(
            "expected dtype {expect:?}, found {dtype:?}"
        )));
    }
    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .map_err(IndexError::io("read", path))?;
    Ok((shape, data))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(IndexError::io("create", path))?;
    Ok(BufWriter::new(file))
}

/// Write an f32 tensor.
pub fn write_f32(path: &Path, shape: &[usize], data: &[f32]) -> Result<()> {
    check_len(path, shape, data.len())?;
    let mut w = create(path)?;
    let io = |e| IndexError::io("write", path)(e);
    write_header(&mut w, Dtype::F32, shape).map_err(io)?;
    let mut bytes = Vec::with_capacity(data.len() * 4);
    for &v in data {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    w.write_all(&bytes).map_err(io)?;
    w.flush().map_err(io)
}

/// Write a u32 tensor.
pub fn write_u32(path: &Path, shape: &[usize], data: &[u32]) -> Result<()> {
    check_len(path, shape, data.len())?;
    let mut w = create(path)?;
    let io = |e| IndexError::io("write", path)(e);
    write_header(&mut w, Dtype::U32, shape).map_err(io)?;
    let mut bytes = Vec::with_capacity(data.len() * 4);
    for &v in data {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    w.write_all(&bytes).map_err(io)?;
    w.flush().map_err(io)
}

/// Write a u8 tensor.
pub fn write_u8(path: &Path, shape: &[usize], data: &[u8]) -> Result<()> {
    check_len(path, shape, data.len())?;
    let mut w = create(path)?;
    let io = |e| IndexError::io("write", path)(e);
    write_header(&mut w, Dtype::U8, shape).map_err(io)?;
    w.write_all(data).map_err(io)?;
    w.flush().map_err(io)
}

/// Read an f32 tensor, returning its shape and elements.
pub fn read_f32(path: &Path) -> Result<(Vec<usize>, Vec<f32>)> {
    let (shape, bytes) = read_payload(path, Dtype::F32)?;
    if bytes.len() % 4 != 0 {
        return Err(IndexError::format(path)(format!(
            "payload of {} bytes is not a whole number of f32s",
            bytes.len()
        )));
    }
    let data: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    check_len(path, &shape, data.len())?;
    Ok((shape, data))
}

/// Read a u32 tensor, returning its shape and elements.
pub fn read_u32(path: &Path) -> Result<(Vec<usize>, Vec<u32>)> {
    let (shape, bytes) = read_payload(path, Dtype::U32)?;
    if bytes.len() % 4 != 0 {
        return Err(IndexError::format(path)(format!(
            "payload of {} bytes is not a whole number of u32s",
            bytes.len()
        )));
    }
    let data: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    check_len(path, &shape, data.len())?;
    Ok((shape, data))
}

/// Read a u8 tensor, returning its shape and elements.
pub fn read_u8(path: &Path) -> Result<(Vec<usize>, Vec<u8>)> {
    let (shape, data) = read_payload(path, Dtype::U8)?;
    check_len(path, &shape, data.len())?;
    Ok((shape, data))
}
