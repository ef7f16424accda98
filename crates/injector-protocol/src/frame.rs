//! Frame header codec and blocking read/write helpers.
//!
//! Layout of every frame: `{path_length: i32, data_length: i32}` in native
//! byte order, then `path_length` bytes of NUL-terminated path, then
//! `data_length` payload bytes unless `data_length` is the magic value
//! (path-only command) or negative.

use std::io::{Read, Write};

use crate::error::{ProtocolError, ProtocolResult};
use crate::{MAX_PATH_LENGTH, MKDIR};

/// Fixed-size record preceding every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub path_length: i32,
    pub data_length: i32,
}

impl FrameHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 8;

    pub fn new(path_length: i32, data_length: i32) -> Self {
        Self {
            path_length,
            data_length,
        }
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[..4].copy_from_slice(&self.path_length.to_ne_bytes());
        bytes[4..].copy_from_slice(&self.data_length.to_ne_bytes());
        bytes
    }

    pub fn decode(bytes: [u8; Self::SIZE]) -> Self {
        let mut path = [0u8; 4];
        let mut data = [0u8; 4];
        path.copy_from_slice(&bytes[..4]);
        data.copy_from_slice(&bytes[4..]);
        Self {
            path_length: i32::from_ne_bytes(path),
            data_length: i32::from_ne_bytes(data),
        }
    }

    pub fn read_from<R: Read>(reader: &mut R) -> ProtocolResult<Self> {
        let mut bytes = [0u8; Self::SIZE];
        reader
            .read_exact(&mut bytes)
            .map_err(ProtocolError::from_read)?;
        Ok(Self::decode(bytes))
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> ProtocolResult<()> {
        writer.write_all(&self.encode())?;
        Ok(())
    }
}

/// A header together with the path string that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub path: String,
}

/// Size announced in a remote-write header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteSize {
    Directory,
    Bytes(u64),
}

impl RemoteSize {
    pub fn data_length(&self) -> ProtocolResult<i32> {
        match *self {
            RemoteSize::Directory => Ok(MKDIR),
            RemoteSize::Bytes(n) => {
                i32::try_from(n).map_err(|_| ProtocolError::InvalidPayloadLength(i32::MAX))
            }
        }
    }
}

/// Read a header and the path bytes it announces.
pub fn read_frame<R: Read>(reader: &mut R) -> ProtocolResult<Frame> {
    let header = FrameHeader::read_from(reader)?;
    if header.path_length < 0 || header.path_length > MAX_PATH_LENGTH {
        return Err(ProtocolError::InvalidPathLength(header.path_length));
    }
    let path = read_string(reader, header.path_length as usize)?;
    Ok(Frame { header, path })
}

/// Read `length` bytes and decode them as a NUL-terminated string.
pub fn read_string<R: Read>(reader: &mut R, length: usize) -> ProtocolResult<String> {
    let bytes = read_payload(reader, length)?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

/// Read exactly `length` payload bytes.
pub fn read_payload<R: Read>(reader: &mut R, length: usize) -> ProtocolResult<Vec<u8>> {
    let mut buffer = vec![0u8; length];
    reader
        .read_exact(&mut buffer)
        .map_err(ProtocolError::from_read)?;
    Ok(buffer)
}

/// Read one native-endian `i32` word.
pub fn read_word<R: Read>(reader: &mut R) -> ProtocolResult<i32> {
    let mut bytes = [0u8; 4];
    reader
        .read_exact(&mut bytes)
        .map_err(ProtocolError::from_read)?;
    Ok(i32::from_ne_bytes(bytes))
}

pub fn write_word<W: Write>(writer: &mut W, word: i32) -> ProtocolResult<()> {
    writer.write_all(&word.to_ne_bytes())?;
    Ok(())
}

/// Write a frame. Without `data` the `data_length` is `magic`, marking the
/// path as a command; otherwise the payload length follows the header.
pub fn write_frame<W: Write>(
    writer: &mut W,
    magic: i32,
    path: &str,
    data: Option<&[u8]>,
) -> ProtocolResult<()> {
    let data_length = match data {
        Some(bytes) => i32::try_from(bytes.len())
            .map_err(|_| ProtocolError::InvalidPayloadLength(i32::MAX))?,
        None => magic,
    };
    let mut buffer = Vec::with_capacity(FrameHeader::SIZE + path.len() + 1);
    buffer.extend_from_slice(&FrameHeader::new(path_length(path)?, data_length).encode());
    buffer.extend_from_slice(path.as_bytes());
    buffer.push(0);
    if let Some(bytes) = data {
        buffer.extend_from_slice(bytes);
    }
    writer.write_all(&buffer)?;
    writer.flush()?;
    Ok(())
}

/// Write a `>path` remote-write header. File contents, if any, are streamed
/// by the caller straight after.
pub fn write_remote_header<W: Write>(
    writer: &mut W,
    path: &str,
    size: RemoteSize,
) -> ProtocolResult<()> {
    let target = format!(">{}", path);
    let header = FrameHeader::new(path_length(&target)?, size.data_length()?);
    let mut buffer = Vec::with_capacity(FrameHeader::SIZE + target.len() + 1);
    buffer.extend_from_slice(&header.encode());
    buffer.extend_from_slice(target.as_bytes());
    buffer.push(0);
    writer.write_all(&buffer)?;
    Ok(())
}

fn path_length(path: &str) -> ProtocolResult<i32> {
    let length = path.len() + 1;
    if length > MAX_PATH_LENGTH as usize {
        return Err(ProtocolError::InvalidPathLength(length as i32));
    }
    Ok(length as i32)
}
