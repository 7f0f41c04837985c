//! I/O capability wrappers.
//!
//! Readers and writers are generic over one of two wrappers: [`Seekable`]
//! for transports that can reposition, [`Sequential`] for forward-only ones.
//! Operations that need to move backwards (rewinding, size back-patching)
//! only exist on the `Seekable` instantiations.

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Largest relative seek issued in one call
pub(crate) const MAX_RELATIVE_SEEK: u64 = 0x7FFF_FFFF;

/// A byte stream that can at least move forward
pub trait ByteSource: Read {
    /// True if the wrapped transport supports absolute repositioning
    const SEEKABLE: bool;

    /// Advance `count` bytes without handing them to the caller
    fn skip(&mut self, count: u64) -> io::Result<()>;
}

/// Wrapper for transports implementing `Seek`
#[derive(Debug)]
pub struct Seekable<T>(T);

/// Wrapper for forward-only transports
#[derive(Debug)]
pub struct Sequential<T>(T);

impl<T> Seekable<T> {
    pub const fn new(inner: T) -> Self {
        Seekable(inner)
    }

    pub const fn get_ref(&self) -> &T {
        &self.0
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Sequential<T> {
    pub const fn new(inner: T) -> Self {
        Sequential(inner)
    }

    pub const fn get_ref(&self) -> &T {
        &self.0
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<R: Read> Read for Seekable<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<R: Read> Read for Sequential<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<W: Write> Write for Seekable<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: Write> Write for Sequential<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<S: Seek> Seek for Seekable<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.seek(pos)
    }
}

impl<S: Seek> Seekable<S> {
    /// Relative seek split into steps the size of a signed 32-bit offset
    pub(crate) fn seek_relative_bounded(&mut self, mut offset: i64) -> io::Result<()> {
        while offset != 0 {
            let step = offset.clamp(-(MAX_RELATIVE_SEEK as i64), MAX_RELATIVE_SEEK as i64);
            self.0.seek(SeekFrom::Current(step))?;
            offset -= step;
        }
        Ok(())
    }
}

impl<R: Read + Seek> ByteSource for Seekable<R> {
    const SEEKABLE: bool = true;

    fn skip(&mut self, count: u64) -> io::Result<()> {
        let offset = i64::try_from(count)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "skip distance overflow"))?;
        self.seek_relative_bounded(offset)
    }
}

impl<R: Read> ByteSource for Sequential<R> {
    const SEEKABLE: bool = false;

    fn skip(&mut self, count: u64) -> io::Result<()> {
        let skipped = io::copy(&mut self.0.by_ref().take(count), &mut io::sink())?;
        if skipped < count {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended after skipping {} of {} bytes", skipped, count),
            ));
        }
        Ok(())
    }
}
