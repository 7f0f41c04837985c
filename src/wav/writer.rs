//! Streaming WAV writer.
//!
//! The header is encoded up front. A [`Seekable`] writer starts with
//! placeholder sizes and back-patches them in [`WavWriter::finalize`]; a
//! [`Sequential`] writer is told the frame count at creation, writes final
//! sizes immediately and checks the promise when it is finalized.

use std::io::{Seek, SeekFrom, Write};

use crate::{
    error::{AudioIOError, AudioIOResult},
    types::{ContainerKind, WriteFormat},
    wav::{
        chunks::{
            DATA_CHUNK, DS64_CHUNK, RF64_CHUNK, RIFF_CHUNK, W64_RIFF_GUID, W64_WAVE_GUID,
            WAVE_CHUNK, chunk_padding, w64_guid,
        },
        convert::DiskSample,
        endian::{write_u32, write_u64},
        error::WavError,
        fmt::{FmtChunk, MAX_CHANNELS},
        io::{Seekable, Sequential},
        metadata::{
            Metadata,
            write::{metadata_size, write_metadata},
        },
    },
};

const SCRATCH_BYTES: usize = 4096;
const DS64_BODY_SIZE: u64 = 28;

/// Offsets of the size fields, relative to the start of the stream
const RIFF_SIZE_FIELD: u64 = 4;
const W64_SIZE_FIELD: u64 = 16;
const DS64_RIFF_SIZE_FIELD: u64 = 20;
const DS64_DATA_SIZE_FIELD: u64 = 28;
const DS64_SAMPLE_COUNT_FIELD: u64 = 36;

/// Sizes recorded in the header
#[derive(Debug, Clone, Copy)]
struct DeclaredSizes {
    data_size: u64,
    frames: u64,
}

/// Where everything in the header lives
#[derive(Debug, Clone, Copy)]
struct HeaderLayout {
    container: ContainerKind,
    /// Offset of the data chunk header
    data_header_offset: u64,
    /// Offset of the first sample byte
    header_len: u64,
}

impl HeaderLayout {
    fn new(container: ContainerKind, fmt: &FmtChunk, metadata_len: u64) -> Self {
        let chunk_header = container.chunk_header_size();
        let fmt_body = fmt.body_size();
        let fmt_total = chunk_header + fmt_body + chunk_padding(container, fmt_body);
        let preamble = match container {
            ContainerKind::Riff => 12,
            ContainerKind::Rf64 => 12 + 8 + DS64_BODY_SIZE,
            ContainerKind::Wave64 => 40,
        };
        let data_header_offset = preamble + fmt_total + metadata_len;
        HeaderLayout {
            container,
            data_header_offset,
            header_len: data_header_offset + chunk_header,
        }
    }

    /// Size of the finished file holding `data_size` sample bytes
    const fn file_size(&self, data_size: u64) -> u64 {
        self.header_len + data_size + chunk_padding(self.container, data_size)
    }

    /// Value of the 32-bit RIFF size field, if it fits
    fn riff_size(&self, data_size: u64) -> AudioIOResult<u32> {
        u32::try_from(self.file_size(data_size) - 8).map_err(|_| {
            AudioIOError::invalid_parameters(format!(
                "{} data bytes exceed the 4 GiB RIFF limit; use RF64 or Wave64",
                data_size
            ))
        })
    }

    /// Encode the header. `None` writes placeholder sizes.
    fn encode(
        &self,
        fmt: &FmtChunk,
        metadata: Option<&Metadata>,
        sizes: Option<DeclaredSizes>,
    ) -> AudioIOResult<Vec<u8>> {
        let mut header = Vec::with_capacity(self.header_len as usize);
        match self.container {
            ContainerKind::Riff => {
                header.extend_from_slice(RIFF_CHUNK.as_bytes());
                let riff_size = match sizes {
                    Some(sizes) => self.riff_size(sizes.data_size)?,
                    None => 0,
                };
                write_u32(&mut header, riff_size)?;
                header.extend_from_slice(WAVE_CHUNK.as_bytes());
            }
            ContainerKind::Rf64 => {
                header.extend_from_slice(RF64_CHUNK.as_bytes());
                write_u32(&mut header, u32::MAX)?;
                header.extend_from_slice(WAVE_CHUNK.as_bytes());
                header.extend_from_slice(DS64_CHUNK.as_bytes());
                write_u32(&mut header, DS64_BODY_SIZE as u32)?;
                let (riff_size, data_size, frames) = match sizes {
                    Some(sizes) => (
                        self.file_size(sizes.data_size) - 8,
                        sizes.data_size,
                        sizes.frames,
                    ),
                    None => (0, 0, 0),
                };
                write_u64(&mut header, riff_size)?;
                write_u64(&mut header, data_size)?;
                write_u64(&mut header, frames)?;
                // No size table
                write_u32(&mut header, 0)?;
            }
            ContainerKind::Wave64 => {
                header.extend_from_slice(&W64_RIFF_GUID);
                let size = sizes.map(|s| self.file_size(s.data_size)).unwrap_or(0);
                write_u64(&mut header, size)?;
                header.extend_from_slice(&W64_WAVE_GUID);
            }
        }

        fmt.write(&mut header, self.container)?;
        if let Some(metadata) = metadata {
            write_metadata(&mut header, metadata)?;
        }

        match self.container {
            ContainerKind::Riff => {
                header.extend_from_slice(DATA_CHUNK.as_bytes());
                let data_size = sizes.map(|s| s.data_size as u32).unwrap_or(0);
                write_u32(&mut header, data_size)?;
            }
            ContainerKind::Rf64 => {
                header.extend_from_slice(DATA_CHUNK.as_bytes());
                write_u32(&mut header, u32::MAX)?;
            }
            ContainerKind::Wave64 => {
                header.extend_from_slice(&w64_guid(DATA_CHUNK.as_bytes()));
                let size = sizes.map(|s| s.data_size + 24).unwrap_or(0);
                write_u64(&mut header, size)?;
            }
        }

        debug_assert_eq!(header.len() as u64, self.header_len);
        Ok(header)
    }
}

/// Streaming writer for RIFF, RF64 and Wave64 files.
///
/// Samples are appended with `write_raw`/`write_pcm_frames` (on-disk bytes)
/// or `write_frames_i16`/`i32`/`f32` (converted to the target format).
/// Always call [`finalize`](WavWriter::finalize) when done; dropping an
/// unfinalized writer leaves the header incomplete.
///
/// ```no_run
/// use std::{fs::File, io::BufWriter};
/// use wav_codec::{types::WriteFormat, wav::WavWriter};
///
/// let file = BufWriter::new(File::create("tone.wav")?);
/// let mut writer = WavWriter::create(file, WriteFormat::pcm(1, 48_000, 16))?;
/// writer.write_frames_i16(&[0, 1000, -1000])?;
/// writer.finalize()?;
/// # Ok::<(), wav_codec::error::AudioIOError>(())
/// ```
#[derive(Debug)]
pub struct WavWriter<S: Write> {
    sink: S,
    format: WriteFormat,
    disk: DiskSample,
    layout: HeaderLayout,
    /// Stream position the header was written at
    base: u64,
    /// Data size promised in a sequential header
    promised_data_size: Option<u64>,
    data_bytes_written: u64,
    frames_written: u64,
    finalized: bool,
}

impl<S: Write> WavWriter<S> {
    fn start(
        mut sink: S,
        base: u64,
        format: WriteFormat,
        metadata: Option<&Metadata>,
        total_frames: Option<u64>,
    ) -> AudioIOResult<Self> {
        format.validate()?;
        if format.channels > MAX_CHANNELS {
            return Err(AudioIOError::invalid_parameters(format!(
                "Too many channels: {} (maximum {})",
                format.channels, MAX_CHANNELS
            )));
        }
        let fmt = FmtChunk::from_write_format(&format);
        let bytes_per_sample = format.bytes_per_sample() as u64;
        let Some(disk) = DiskSample::from_format(format.sample_format, bytes_per_sample) else {
            return Err(AudioIOError::invalid_parameters(format!(
                "{} with {} bits per sample is not writable",
                format.sample_format, format.bits_per_sample
            )));
        };
        if metadata.is_some() && !format.container.supports_metadata() {
            return Err(AudioIOError::invalid_parameters(format!(
                "Metadata cannot be written to {} files",
                format.container
            )));
        }

        let metadata_len = metadata.map(metadata_size).unwrap_or(0);
        let layout = HeaderLayout::new(format.container, &fmt, metadata_len);
        let sizes = match total_frames {
            Some(frames) => {
                let data_size = frames.checked_mul(fmt.block_align as u64).ok_or_else(|| {
                    AudioIOError::invalid_parameters(format!(
                        "{} frames overflow the data size",
                        frames
                    ))
                })?;
                Some(DeclaredSizes { data_size, frames })
            }
            None => None,
        };
        let header = layout.encode(&fmt, metadata, sizes)?;
        sink.write_all(&header)?;
        log::debug!(
            "Wrote {} header ({} bytes) for {}",
            format.container,
            header.len(),
            fmt
        );

        Ok(WavWriter {
            sink,
            format,
            disk,
            layout,
            base,
            promised_data_size: sizes.map(|s| s.data_size),
            data_bytes_written: 0,
            frames_written: 0,
            finalized: false,
        })
    }

    pub const fn format(&self) -> &WriteFormat {
        &self.format
    }

    /// Bytes per frame on disk
    pub const fn block_align(&self) -> usize {
        self.format.block_align() as usize
    }

    pub const fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub const fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub const fn get_ref(&self) -> &S {
        &self.sink
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn flush(&mut self) -> AudioIOResult<()> {
        self.sink.flush()?;
        Ok(())
    }

    /// Append on-disk sample bytes. `bytes` must hold whole frames.
    ///
    /// # Errors
    ///
    /// A finalized writer, a partial frame, or a RIFF file that would
    /// outgrow its 32-bit size fields.
    pub fn write_raw(&mut self, bytes: &[u8]) -> AudioIOResult<u64> {
        if self.finalized {
            return Err(AudioIOError::invalid_parameters(
                "Cannot write to a finalized stream",
            ));
        }
        let frame_bytes = self.block_align();
        if bytes.len() % frame_bytes != 0 {
            return Err(AudioIOError::invalid_parameters(format!(
                "Got {} bytes, frame size is {} bytes",
                bytes.len(),
                frame_bytes
            )));
        }
        let new_size = self.data_bytes_written + bytes.len() as u64;
        if self.format.container == ContainerKind::Riff {
            self.layout.riff_size(new_size)?;
        }

        self.sink.write_all(bytes)?;
        let frames = (bytes.len() / frame_bytes) as u64;
        self.data_bytes_written = new_size;
        self.frames_written += frames;
        Ok(frames)
    }

    /// Append `frames` frames of on-disk bytes taken from the front of `data`
    pub fn write_pcm_frames(&mut self, frames: u64, data: &[u8]) -> AudioIOResult<u64> {
        let len = frames
            .checked_mul(self.block_align() as u64)
            .filter(|&len| len <= data.len() as u64)
            .ok_or_else(|| {
                AudioIOError::invalid_parameters(format!(
                    "{} frames need more than the {} bytes supplied",
                    frames,
                    data.len()
                ))
            })?;
        self.write_raw(&data[..len as usize])
    }

    fn write_encoded<T: Copy>(
        &mut self,
        samples: &[T],
        encode: fn(DiskSample, &[T], &mut [u8]),
    ) -> AudioIOResult<u64> {
        let channels = self.format.channels as usize;
        if samples.len() % channels != 0 {
            return Err(AudioIOError::invalid_parameters(format!(
                "{} samples do not form whole {}-channel frames",
                samples.len(),
                channels
            )));
        }
        let width = self.disk.width();
        let per_batch = (SCRATCH_BYTES / (width * channels)).max(1) * channels;
        let mut scratch = [0u8; SCRATCH_BYTES];
        let mut frames = 0;
        for batch in samples.chunks(per_batch) {
            let bytes = &mut scratch[..batch.len() * width];
            encode(self.disk, batch, bytes);
            frames += self.write_raw(bytes)?;
        }
        Ok(frames)
    }

    /// Encode interleaved `i16` samples to the target format
    pub fn write_frames_i16(&mut self, samples: &[i16]) -> AudioIOResult<u64> {
        self.write_encoded(samples, DiskSample::encode_from_s16)
    }

    /// Encode interleaved `i32` samples (full scale at `i32::MAX`)
    pub fn write_frames_i32(&mut self, samples: &[i32]) -> AudioIOResult<u64> {
        self.write_encoded(samples, DiskSample::encode_from_s32)
    }

    /// Encode interleaved `f32` samples in `[-1.0, 1.0]`
    pub fn write_frames_f32(&mut self, samples: &[f32]) -> AudioIOResult<u64> {
        self.write_encoded(samples, DiskSample::encode_from_f32)
    }

    /// Pad the data chunk to the container's alignment
    fn write_data_padding(&mut self) -> AudioIOResult<()> {
        let padding = chunk_padding(self.format.container, self.data_bytes_written);
        if padding > 0 {
            self.sink.write_all(&[0u8; 8][..padding as usize])?;
        }
        Ok(())
    }
}

impl<W: Write + Seek> WavWriter<Seekable<W>> {
    /// Start a file whose sizes are patched in by `finalize`. The header is
    /// written at the stream's current position.
    pub fn create(writer: W, format: WriteFormat) -> AudioIOResult<Self> {
        let mut sink = Seekable::new(writer);
        let base = sink.stream_position()?;
        Self::start(sink, base, format, None, None)
    }

    /// Like [`WavWriter::create`], with metadata chunks between `fmt ` and `data`
    pub fn create_with_metadata(
        writer: W,
        format: WriteFormat,
        metadata: &Metadata,
    ) -> AudioIOResult<Self> {
        let mut sink = Seekable::new(writer);
        let base = sink.stream_position()?;
        Self::start(sink, base, format, Some(metadata), None)
    }

    fn patch(&mut self, offset: u64, value: u64, width: usize) -> AudioIOResult<()> {
        self.sink.seek(SeekFrom::Start(self.base + offset))?;
        match width {
            4 => write_u32(&mut self.sink, value as u32)?,
            _ => write_u64(&mut self.sink, value)?,
        }
        Ok(())
    }

    /// Pad the data, then seek back and write the final sizes. The stream is
    /// left at the end of the file. Calling it again does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if seeking or writing the size fields fails.
    pub fn finalize(&mut self) -> AudioIOResult<()> {
        if self.finalized {
            return Ok(());
        }
        self.write_data_padding()?;

        let data_size = self.data_bytes_written;
        let layout = self.layout;
        let end = self.sink.stream_position()?;
        match layout.container {
            ContainerKind::Riff => {
                let riff_size = layout.riff_size(data_size)?;
                self.patch(RIFF_SIZE_FIELD, riff_size as u64, 4)?;
                self.patch(layout.data_header_offset + 4, data_size, 4)?;
            }
            ContainerKind::Rf64 => {
                self.patch(DS64_RIFF_SIZE_FIELD, layout.file_size(data_size) - 8, 8)?;
                self.patch(DS64_DATA_SIZE_FIELD, data_size, 8)?;
                self.patch(DS64_SAMPLE_COUNT_FIELD, self.frames_written, 8)?;
            }
            ContainerKind::Wave64 => {
                self.patch(W64_SIZE_FIELD, layout.file_size(data_size), 8)?;
                self.patch(layout.data_header_offset + 16, data_size + 24, 8)?;
            }
        }
        self.sink.seek(SeekFrom::Start(end))?;
        self.sink.flush()?;
        self.finalized = true;
        log::debug!(
            "Finalized {} file: {} frames, {} data bytes",
            layout.container,
            self.frames_written,
            data_size
        );
        Ok(())
    }
}

impl<W: Write> WavWriter<Sequential<W>> {
    /// Start a forward-only file holding exactly `total_frames` frames. The
    /// header carries final sizes, so no seeking is needed.
    pub fn create_sequential(
        writer: W,
        format: WriteFormat,
        total_frames: u64,
    ) -> AudioIOResult<Self> {
        Self::start(Sequential::new(writer), 0, format, None, Some(total_frames))
    }

    pub fn create_sequential_with_metadata(
        writer: W,
        format: WriteFormat,
        total_frames: u64,
        metadata: &Metadata,
    ) -> AudioIOResult<Self> {
        Self::start(
            Sequential::new(writer),
            0,
            format,
            Some(metadata),
            Some(total_frames),
        )
    }

    /// Pad the data and check that the promised frame count was delivered.
    ///
    /// # Errors
    ///
    /// [`WavError::FinalizationMismatch`] if the byte count differs from the
    /// header. The writer is finalized either way.
    pub fn finalize(&mut self) -> AudioIOResult<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        let expected = self.promised_data_size.unwrap_or(0);
        if self.data_bytes_written != expected {
            log::warn!(
                "Sequential writer promised {} data bytes but received {}",
                expected,
                self.data_bytes_written
            );
            self.sink.flush()?;
            return Err(WavError::FinalizationMismatch {
                expected,
                actual: self.data_bytes_written,
            }
            .into());
        }
        self.write_data_padding()?;
        self.sink.flush()?;
        Ok(())
    }
}

impl<S: Write> Drop for WavWriter<S> {
    fn drop(&mut self) {
        if !self.finalized {
            log::warn!(
                "WavWriter dropped without finalize after {} frames; header sizes are incomplete",
                self.frames_written
            );
        }
    }
}
