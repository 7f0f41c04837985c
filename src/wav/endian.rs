//! Fixed-width little-endian primitives.
//!
//! Field I/O goes through `byteorder`; the helpers here cover the slice
//! decoding and in-place swapping the sample paths need.

use std::io::{self, Read, Write};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

#[inline]
pub fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    LittleEndian::read_u16(&bytes[offset..offset + 2])
}

#[inline]
pub fn i16_at(bytes: &[u8], offset: usize) -> i16 {
    LittleEndian::read_i16(&bytes[offset..offset + 2])
}

#[inline]
pub fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    LittleEndian::read_u32(&bytes[offset..offset + 4])
}

#[inline]
pub fn u64_at(bytes: &[u8], offset: usize) -> u64 {
    LittleEndian::read_u64(&bytes[offset..offset + 8])
}

#[inline]
pub fn f32_at(bytes: &[u8], offset: usize) -> f32 {
    LittleEndian::read_f32(&bytes[offset..offset + 4])
}

/// Read exactly `N` bytes
pub fn read_array<R: Read + ?Sized, const N: usize>(reader: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_u16<R: Read + ?Sized>(reader: &mut R) -> io::Result<u16> {
    reader.read_u16::<LittleEndian>()
}

pub fn read_u32<R: Read + ?Sized>(reader: &mut R) -> io::Result<u32> {
    reader.read_u32::<LittleEndian>()
}

pub fn read_u64<R: Read + ?Sized>(reader: &mut R) -> io::Result<u64> {
    reader.read_u64::<LittleEndian>()
}

pub fn write_u16<W: Write + ?Sized>(writer: &mut W, value: u16) -> io::Result<()> {
    writer.write_u16::<LittleEndian>(value)
}

pub fn write_u32<W: Write + ?Sized>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_u32::<LittleEndian>(value)
}

pub fn write_u64<W: Write + ?Sized>(writer: &mut W, value: u64) -> io::Result<()> {
    writer.write_u64::<LittleEndian>(value)
}

/// Read until `buf` is full or the source reports end of stream.
/// Returns the number of bytes actually read.
pub fn read_fully<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Reverse the byte order of every `bytes_per_sample`-wide sample in place
pub fn swap_sample_bytes(bytes: &mut [u8], bytes_per_sample: usize) {
    if bytes_per_sample < 2 {
        return;
    }
    for sample in bytes.chunks_exact_mut(bytes_per_sample) {
        sample.reverse();
    }
}

/// Convert little-endian samples to host order. No-op on little-endian hosts.
#[inline]
pub fn le_to_native_in_place(bytes: &mut [u8], bytes_per_sample: usize) {
    if cfg!(target_endian = "big") {
        swap_sample_bytes(bytes, bytes_per_sample);
    }
}
