use core::fmt::{Display, Formatter, Result as FmtResult};
use std::io::{self, Read, Write};

use crate::{
    error::{AudioIOError, AudioIOResult, ErrorPosition},
    types::ContainerKind,
    wav::endian::{read_array, read_u32, read_u64, write_u32, write_u64},
};

/// FourCC chunk identifier wrapper -- does not own the data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChunkID {
    pub id: [u8; 4],
}

impl AsRef<[u8]> for ChunkID {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.id
    }
}

impl Display for ChunkID {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match core::str::from_utf8(&self.id) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => write!(
                f,
                "0x{:02X}{:02X}{:02X}{:02X}",
                self.id[0], self.id[1], self.id[2], self.id[3]
            ),
        }
    }
}

impl From<&[u8; 4]> for ChunkID {
    fn from(value: &[u8; 4]) -> Self {
        ChunkID { id: *value }
    }
}

impl ChunkID {
    #[inline]
    pub const fn new(id: &[u8; 4]) -> Self {
        ChunkID { id: *id }
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.id
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.id).ok()
    }
}

pub const RIFF_CHUNK: ChunkID = ChunkID::new(b"RIFF");
pub const RF64_CHUNK: ChunkID = ChunkID::new(b"RF64");
pub const W64_RIFF_CHUNK: ChunkID = ChunkID::new(b"riff");
pub const WAVE_CHUNK: ChunkID = ChunkID::new(b"WAVE");
pub const DS64_CHUNK: ChunkID = ChunkID::new(b"ds64");
pub const FMT_CHUNK: ChunkID = ChunkID::new(b"fmt ");
pub const DATA_CHUNK: ChunkID = ChunkID::new(b"data");
pub const FACT_CHUNK: ChunkID = ChunkID::new(b"fact");
pub const LIST_CHUNK: ChunkID = ChunkID::new(b"LIST");
pub const LIST_CHUNK_LOWER: ChunkID = ChunkID::new(b"list");
pub const CUE_CHUNK: ChunkID = ChunkID::new(b"cue ");
pub const SMPL_CHUNK: ChunkID = ChunkID::new(b"smpl");
pub const INST_CHUNK: ChunkID = ChunkID::new(b"inst");
pub const ACID_CHUNK: ChunkID = ChunkID::new(b"acid");
pub const BEXT_CHUNK: ChunkID = ChunkID::new(b"bext");
pub const JUNK_CHUNK: ChunkID = ChunkID::new(b"JUNK");
pub const PAD_CHUNK: ChunkID = ChunkID::new(b"PAD ");
pub const FLLR_CHUNK: ChunkID = ChunkID::new(b"FLLR");

/// LIST sub-types
pub const INFO_LIST: ChunkID = ChunkID::new(b"INFO");
pub const ADTL_LIST: ChunkID = ChunkID::new(b"adtl");

/// adtl sub-chunks
pub const LABL_CHUNK: ChunkID = ChunkID::new(b"labl");
pub const NOTE_CHUNK: ChunkID = ChunkID::new(b"note");
pub const LTXT_CHUNK: ChunkID = ChunkID::new(b"ltxt");

/// Id given to Wave64 chunks whose GUID is not recognised
pub const UNKNOWN_GUID_CHUNK: ChunkID = ChunkID::new(&[0, 0, 0, 0]);

/// Wave64 GUID of the outer `riff` chunk
pub const W64_RIFF_GUID: [u8; 16] = [
    0x72, 0x69, 0x66, 0x66, 0x2E, 0x91, 0xCF, 0x11, 0xA5, 0xD6, 0x28, 0xDB, 0x04, 0xC1, 0x00, 0x00,
];

/// Tail shared by the Wave64 GUIDs of the `wave`, `fmt `, `fact` and `data` chunks.
/// The first four bytes of those GUIDs are the RIFF fourcc.
pub const W64_CHUNK_GUID_TAIL: [u8; 12] = [
    0xF3, 0xAC, 0xD3, 0x11, 0x8C, 0xD1, 0x00, 0xC0, 0x4F, 0x8E, 0xDB, 0x8A,
];

/// Wave64 form type, `wave` followed by the common tail
pub const W64_WAVE_GUID: [u8; 16] = w64_guid(b"wave");

/// Build the Wave64 GUID for a standard fourcc
pub const fn w64_guid(fourcc: &[u8; 4]) -> [u8; 16] {
    let mut guid = [0u8; 16];
    let mut i = 0;
    while i < 4 {
        guid[i] = fourcc[i];
        i += 1;
    }
    while i < 16 {
        guid[i] = W64_CHUNK_GUID_TAIL[i - 4];
        i += 1;
    }
    guid
}

/// Map a Wave64 GUID back to its fourcc, if it is one of the standard ids
pub fn w64_fourcc(guid: &[u8; 16]) -> Option<ChunkID> {
    if guid == &W64_RIFF_GUID {
        return Some(W64_RIFF_CHUNK);
    }
    if guid[4..] == W64_CHUNK_GUID_TAIL {
        return Some(ChunkID::new(&[guid[0], guid[1], guid[2], guid[3]]));
    }
    None
}

/// Padding that follows a chunk body of `size` bytes
#[inline]
pub const fn chunk_padding(container: ContainerKind, size: u64) -> u64 {
    let align = container.chunk_alignment();
    (align - size % align) % align
}

/// A parsed chunk header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: ChunkID,
    /// Raw GUID for Wave64 chunks
    pub guid: Option<[u8; 16]>,
    /// Body size, excluding header and padding
    pub size: u64,
    pub padding: u64,
}

impl ChunkHeader {
    /// Bytes from the end of the header to the start of the next chunk.
    /// Saturates for sizes no stream can hold.
    #[inline]
    pub const fn padded_size(&self) -> u64 {
        self.size.saturating_add(self.padding)
    }
}

/// Read one chunk header in the layout of `container`
pub fn read_chunk_header<R: Read + ?Sized>(
    reader: &mut R,
    container: ContainerKind,
) -> io::Result<ChunkHeader> {
    match container {
        ContainerKind::Riff | ContainerKind::Rf64 => {
            let id = ChunkID::new(&read_array::<_, 4>(reader)?);
            let size = read_u32(reader)? as u64;
            Ok(ChunkHeader {
                id,
                guid: None,
                size,
                padding: chunk_padding(container, size),
            })
        }
        ContainerKind::Wave64 => {
            let guid: [u8; 16] = read_array(reader)?;
            let declared = read_u64(reader)?;
            // Wave64 sizes include the 24-byte header
            let size = declared.checked_sub(24).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Wave64 chunk size {} is smaller than its header", declared),
                )
            })?;
            Ok(ChunkHeader {
                id: w64_fourcc(&guid).unwrap_or(UNKNOWN_GUID_CHUNK),
                guid: Some(guid),
                size,
                padding: chunk_padding(container, size),
            })
        }
    }
}

/// Write a chunk header for a body of `body_size` bytes. For RIFF/RF64 the
/// size is clamped to the 32-bit field; callers that need more use `ds64`.
pub fn write_chunk_header<W: Write + ?Sized>(
    writer: &mut W,
    container: ContainerKind,
    id: ChunkID,
    body_size: u64,
) -> io::Result<()> {
    match container {
        ContainerKind::Riff | ContainerKind::Rf64 => {
            writer.write_all(id.as_bytes())?;
            write_u32(writer, body_size.min(u32::MAX as u64) as u32)
        }
        ContainerKind::Wave64 => {
            writer.write_all(&w64_guid(id.as_bytes()))?;
            write_u64(writer, body_size + 24)
        }
    }
}

/// Lightweight description of a chunk discovered while walking a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDesc {
    pub id: ChunkID,
    /// Offset of the chunk header
    pub offset: u64,
    /// Offset of the first body byte
    pub body_offset: u64,
    /// Logical size of the chunk data (excluding header and padding)
    pub logical_size: u64,
    /// Total size including header and padding (for file positioning)
    pub total_size: u64,
}

impl ChunkDesc {
    /// Place `header` at `offset`. Fails with
    /// [`AudioIOError::CorruptedData`] when the chunk would extend past the
    /// 64-bit offset range.
    pub fn new(
        offset: u64,
        container: ContainerKind,
        header: &ChunkHeader,
    ) -> AudioIOResult<Self> {
        Self::with_body_size(offset, container, header.id, header.size)
    }

    /// Like [`ChunkDesc::new`] with the body size taken from elsewhere, such
    /// as the RF64 `ds64` chunk
    pub fn with_body_size(
        offset: u64,
        container: ContainerKind,
        id: ChunkID,
        size: u64,
    ) -> AudioIOResult<Self> {
        let header_size = container.chunk_header_size();
        let Some(total_size) = header_size
            .checked_add(size)
            .and_then(|n| n.checked_add(chunk_padding(container, size)))
            .filter(|&n| offset.checked_add(n).is_some())
        else {
            return Err(AudioIOError::corrupted_data(
                "Chunk size out of range",
                format!("'{}' declares {} bytes", id, size),
                ErrorPosition::new(offset).with_description(format!("'{}' chunk header", id)),
            ));
        };
        Ok(ChunkDesc {
            id,
            offset,
            body_offset: offset + header_size,
            logical_size: size,
            total_size,
        })
    }

    /// Offset of the next chunk header
    #[inline]
    pub const fn end_offset(&self) -> u64 {
        self.offset + self.total_size
    }
}

impl Display for ChunkDesc {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "Chunk ID: {}, Offset: {}, Logical Size: {}, Total Size: {}",
            self.id, self.offset, self.logical_size, self.total_size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_riff_header_padding() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"labl");
        bytes.extend_from_slice(&7u32.to_le_bytes());
        let header = read_chunk_header(&mut Cursor::new(bytes), ContainerKind::Riff).unwrap();
        assert_eq!(header.id, LABL_CHUNK);
        assert_eq!(header.size, 7);
        assert_eq!(header.padding, 1);
        assert_eq!(header.padded_size(), 8);
    }

    #[test]
    fn test_w64_header_roundtrip() {
        let mut bytes = Vec::new();
        write_chunk_header(&mut bytes, ContainerKind::Wave64, DATA_CHUNK, 13).unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[0..4], b"data");
        let header = read_chunk_header(&mut Cursor::new(bytes), ContainerKind::Wave64).unwrap();
        assert_eq!(header.id, DATA_CHUNK);
        assert_eq!(header.size, 13);
        assert_eq!(header.padding, 3);
    }

    #[test]
    fn test_w64_unknown_guid() {
        let mut bytes = vec![0xAB; 16];
        bytes.extend_from_slice(&40u64.to_le_bytes());
        let header = read_chunk_header(&mut Cursor::new(bytes), ContainerKind::Wave64).unwrap();
        assert_eq!(header.id, UNKNOWN_GUID_CHUNK);
        assert_eq!(header.size, 16);
    }

    #[test]
    fn test_w64_undersized_chunk_rejected() {
        let mut bytes = w64_guid(b"fmt ").to_vec();
        bytes.extend_from_slice(&10u64.to_le_bytes());
        assert!(read_chunk_header(&mut Cursor::new(bytes), ContainerKind::Wave64).is_err());
    }

    #[test]
    fn test_w64_riff_guid_maps() {
        assert_eq!(w64_fourcc(&W64_RIFF_GUID), Some(W64_RIFF_CHUNK));
        assert_eq!(w64_fourcc(&W64_WAVE_GUID), Some(ChunkID::new(b"wave")));
    }

    #[test]
    fn test_chunk_desc_offsets() {
        let header = ChunkHeader {
            id: CUE_CHUNK,
            guid: None,
            size: 29,
            padding: 1,
        };
        let desc = ChunkDesc::new(100, ContainerKind::Riff, &header).unwrap();
        assert_eq!(desc.body_offset, 108);
        assert_eq!(desc.end_offset(), 138);
    }

    #[test]
    fn test_chunk_desc_rejects_extent_past_u64() {
        let header = ChunkHeader {
            id: DATA_CHUNK,
            guid: None,
            size: u64::MAX - 30,
            padding: 1,
        };
        assert!(ChunkDesc::new(0, ContainerKind::Wave64, &header).is_err());
        // Fits on its own, but not after the header offset
        let header = ChunkHeader {
            size: u64::MAX - 100,
            ..header
        };
        assert!(ChunkDesc::new(40, ContainerKind::Wave64, &header).is_ok());
        assert!(ChunkDesc::new(200, ContainerKind::Wave64, &header).is_err());
        assert!(ChunkDesc::with_body_size(80, ContainerKind::Rf64, DATA_CHUNK, u64::MAX).is_err());
    }
}
