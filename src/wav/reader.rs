//! Container reader.
//!
//! Opening a stream identifies the container from its magic, parses the
//! outer header (plus `ds64` for RF64), then walks chunks in file order
//! until `data` is reached, picking up `fmt `, `fact` and any metadata
//! chunks on the way. Sample reading lives in `decode`, seeking in `seek`.

use std::{
    io::{self, Read, Seek, SeekFrom},
    time::Duration,
};

use crate::{
    error::{AudioIOError, AudioIOResult, ErrorPosition},
    types::{ContainerKind, OpenOptions, SampleFormat, WavInfo},
    wav::{
        chunks::{
            ChunkDesc, ChunkID, DATA_CHUNK, DS64_CHUNK, FACT_CHUNK, FMT_CHUNK, RF64_CHUNK,
            RIFF_CHUNK, W64_RIFF_CHUNK, W64_RIFF_GUID, W64_WAVE_GUID, WAVE_CHUNK,
            read_chunk_header,
        },
        codecs::{BlockDecoder, adpcm_total_frames},
        convert::DiskSample,
        endian::{read_array, read_u32, read_u64, u32_at, u64_at},
        fmt::FmtChunk,
        io::{ByteSource, Seekable, Sequential},
        metadata::{
            Metadata,
            parse::{is_metadata_chunk, read_metadata},
        },
    },
};

/// Smallest outer RIFF size that can hold `WAVE`, a fmt chunk and a data header
const MIN_RIFF_SIZE: u64 = 36;
/// Smallest Wave64 file: outer header plus a fmt chunk
const MIN_W64_SIZE: u64 = 80;
const DS64_BASE_SIZE: u64 = 28;

/// Sizes carried by the RF64 `ds64` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ds64 {
    pub riff_size: u64,
    pub data_size: u64,
    /// Frames per channel
    pub sample_count: u64,
}

#[derive(Debug, Clone, Copy)]
struct Preamble {
    container: ContainerKind,
    /// Offset one past the outer chunk, as declared by the header
    declared_end: u64,
    ds64: Option<Ds64>,
    len: u64,
}

fn truncated_header(err: io::Error, what: &str, offset: u64) -> AudioIOError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        AudioIOError::corrupted_data(
            "Stream too short for a WAV header",
            format!("Ended while reading {}", what),
            ErrorPosition::new(offset).with_description(what.to_string()),
        )
    } else {
        AudioIOError::Io(err)
    }
}

fn read_preamble<S: ByteSource>(source: &mut S) -> AudioIOResult<Preamble> {
    let magic: [u8; 4] =
        read_array(source).map_err(|e| truncated_header(e, "container magic", 0))?;

    match ChunkID::new(&magic) {
        RIFF_CHUNK => {
            let size = read_u32(source).map_err(|e| truncated_header(e, "RIFF size", 4))? as u64;
            expect_wave(source)?;
            if size < MIN_RIFF_SIZE {
                return Err(AudioIOError::corrupted_data(
                    "RIFF chunk too small",
                    format!("Declared size {} (minimum {})", size, MIN_RIFF_SIZE),
                    ErrorPosition::new(4).with_description("RIFF chunk size"),
                ));
            }
            Ok(Preamble {
                container: ContainerKind::Riff,
                declared_end: 8 + size,
                ds64: None,
                len: 12,
            })
        }
        RF64_CHUNK => {
            let size = read_u32(source).map_err(|e| truncated_header(e, "RF64 size", 4))?;
            if size != u32::MAX {
                log::warn!("RF64 outer size is {:#X}, expected 0xFFFFFFFF", size);
            }
            expect_wave(source)?;

            let header = read_chunk_header(source, ContainerKind::Rf64)
                .map_err(|e| truncated_header(e, "ds64 chunk header", 12))?;
            if header.id != DS64_CHUNK {
                return Err(AudioIOError::corrupted_data(
                    "RF64 stream without ds64 chunk",
                    format!("Found '{}' after the outer header", header.id),
                    ErrorPosition::new(12).with_description("ds64 chunk header"),
                ));
            }
            if header.size < DS64_BASE_SIZE {
                return Err(AudioIOError::corrupted_data(
                    "ds64 chunk too small",
                    format!("{} bytes (minimum {})", header.size, DS64_BASE_SIZE),
                    ErrorPosition::new(16).with_description("ds64 chunk size"),
                ));
            }
            let body: [u8; 28] =
                read_array(source).map_err(|e| truncated_header(e, "ds64 chunk", 20))?;
            let ds64 = Ds64 {
                riff_size: u64_at(&body, 0),
                data_size: u64_at(&body, 8),
                sample_count: u64_at(&body, 16),
            };
            let table_length = u32_at(&body, 24);
            // Size table entries are not needed once the data size is known
            source.skip(header.padded_size() - DS64_BASE_SIZE)?;
            log::debug!(
                "ds64: riff {} data {} samples {} table entries {}",
                ds64.riff_size,
                ds64.data_size,
                ds64.sample_count,
                table_length
            );
            Ok(Preamble {
                container: ContainerKind::Rf64,
                declared_end: ds64.riff_size.saturating_add(8),
                ds64: Some(ds64),
                len: 20 + header.padded_size(),
            })
        }
        W64_RIFF_CHUNK => {
            let rest: [u8; 12] =
                read_array(source).map_err(|e| truncated_header(e, "Wave64 GUID", 4))?;
            if magic[..] != W64_RIFF_GUID[..4] || rest[..] != W64_RIFF_GUID[4..] {
                return Err(AudioIOError::corrupted_data(
                    "Invalid Wave64 header",
                    "Outer GUID does not match the Wave64 riff GUID",
                    ErrorPosition::new(0).with_description("Wave64 riff GUID"),
                ));
            }
            let size = read_u64(source).map_err(|e| truncated_header(e, "Wave64 size", 16))?;
            if size < MIN_W64_SIZE {
                return Err(AudioIOError::corrupted_data(
                    "Wave64 file too small",
                    format!("Declared size {} (minimum {})", size, MIN_W64_SIZE),
                    ErrorPosition::new(16).with_description("Wave64 riff size"),
                ));
            }
            let wave: [u8; 16] =
                read_array(source).map_err(|e| truncated_header(e, "Wave64 form GUID", 24))?;
            if wave != W64_WAVE_GUID {
                return Err(AudioIOError::corrupted_data(
                    "Invalid Wave64 header",
                    "Form GUID is not wave",
                    ErrorPosition::new(24).with_description("Wave64 wave GUID"),
                ));
            }
            Ok(Preamble {
                container: ContainerKind::Wave64,
                declared_end: size,
                ds64: None,
                len: 40,
            })
        }
        other => Err(AudioIOError::corrupted_data(
            "Not a WAV stream",
            format!("Unrecognised container magic '{}'", other),
            ErrorPosition::new(0).with_description("container magic"),
        )),
    }
}

fn expect_wave<S: ByteSource>(source: &mut S) -> AudioIOResult<()> {
    let form = ChunkID::new(
        &read_array::<_, 4>(source).map_err(|e| truncated_header(e, "WAVE identifier", 8))?,
    );
    if form != WAVE_CHUNK {
        return Err(AudioIOError::corrupted_data(
            "Missing WAVE identifier",
            format!("Found '{}'", form),
            ErrorPosition::new(8).with_description("WAVE identifier"),
        ));
    }
    Ok(())
}

/// State of the chunk walk
#[derive(Debug)]
struct ChunkScan<'a> {
    container: ContainerKind,
    ds64: Option<Ds64>,
    options: &'a OpenOptions,
    /// Stream length, known only for seekable sources
    stream_len: Option<u64>,
    pos: u64,
    fmt: Option<FmtChunk>,
    fact_frames: Option<u64>,
    data: Option<ChunkDesc>,
    chunks: Vec<ChunkDesc>,
    metadata_chunks: Vec<ChunkDesc>,
    /// Buffered metadata bodies, for sources that cannot come back to them
    metadata_bytes: Vec<u8>,
}

impl<'a> ChunkScan<'a> {
    fn new(preamble: &Preamble, options: &'a OpenOptions, stream_len: Option<u64>) -> Self {
        ChunkScan {
            container: preamble.container,
            ds64: preamble.ds64,
            options,
            stream_len,
            pos: preamble.len,
            fmt: None,
            fact_frames: None,
            data: None,
            chunks: Vec::new(),
            metadata_chunks: Vec::new(),
            metadata_bytes: Vec::new(),
        }
    }

    fn wants_metadata(&self, id: ChunkID) -> bool {
        self.options.read_metadata && self.container.supports_metadata() && is_metadata_chunk(id)
    }

    fn read_header<S: ByteSource>(&mut self, source: &mut S) -> AudioIOResult<ChunkDesc> {
        let offset = self.pos;
        let header = read_chunk_header(source, self.container)?;
        let desc = ChunkDesc::new(offset, self.container, &header)?;
        log::debug!(
            "Found chunk '{}' at offset {} ({} bytes)",
            desc.id,
            offset,
            desc.logical_size
        );
        self.pos = desc.body_offset;
        Ok(desc)
    }

    /// Move to the next chunk header, `consumed` body bytes having been read.
    /// Seekable sources stop at the end of the stream; the next header read
    /// then reports the truncation.
    fn skip_rest<S: ByteSource>(
        &mut self,
        source: &mut S,
        desc: &ChunkDesc,
        consumed: u64,
    ) -> io::Result<()> {
        let here = desc.body_offset + consumed;
        let target = match self.stream_len {
            Some(len) => desc.end_offset().min(len.max(here)),
            None => desc.end_offset(),
        };
        source.skip(target - here)?;
        self.pos = desc.end_offset();
        Ok(())
    }

    /// Walk until the data chunk header has been consumed
    fn scan_to_data<S: ByteSource>(&mut self, source: &mut S) -> AudioIOResult<()> {
        loop {
            let desc = match self.read_header(source) {
                Ok(desc) => desc,
                Err(AudioIOError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(AudioIOError::corrupted_data(
                        "No data chunk found",
                        format!(
                            "Stream ended after chunks {:?}",
                            self.chunks.iter().map(|c| c.id.to_string()).collect::<Vec<_>>()
                        ),
                        ErrorPosition::new(self.pos),
                    ));
                }
                Err(e) => return Err(e),
            };

            match desc.id {
                FMT_CHUNK => {
                    if self.fmt.is_some() {
                        log::warn!("Ignoring duplicate fmt chunk at offset {}", desc.offset);
                        self.skip_rest(source, &desc, 0)?;
                    } else {
                        let (fmt, consumed) = FmtChunk::parse(source, desc.logical_size)?;
                        log::debug!("{}", fmt);
                        self.skip_rest(source, &desc, consumed)?;
                        self.fmt = Some(fmt);
                    }
                }
                FACT_CHUNK => self.read_fact(source, &desc)?,
                DATA_CHUNK => {
                    if self.fmt.is_none() {
                        return Err(AudioIOError::corrupted_data(
                            "data chunk precedes fmt chunk",
                            "A fmt chunk must appear before the sample data",
                            ErrorPosition::new(desc.offset).with_description("data chunk header"),
                        ));
                    }
                    let desc = self.resolve_data(desc)?;
                    self.chunks.push(desc.clone());
                    self.data = Some(desc);
                    return Ok(());
                }
                id if self.wants_metadata(id) => self.collect_metadata(source, &desc)?,
                _ => self.skip_rest(source, &desc, 0)?,
            }
            self.chunks.push(desc);
        }
    }

    /// Apply the RF64 data size and recompute the chunk extent
    fn resolve_data(&self, desc: ChunkDesc) -> AudioIOResult<ChunkDesc> {
        let Some(ds64) = self.ds64 else {
            return Ok(desc);
        };
        if desc.logical_size != u32::MAX as u64 && desc.logical_size != ds64.data_size {
            log::warn!(
                "RF64 data header declares {} bytes, ds64 declares {}; using ds64",
                desc.logical_size,
                ds64.data_size
            );
        }
        ChunkDesc::with_body_size(desc.offset, self.container, desc.id, ds64.data_size)
    }

    fn read_fact<S: ByteSource>(&mut self, source: &mut S, desc: &ChunkDesc) -> AudioIOResult<()> {
        let (frames, consumed) = if self.container == ContainerKind::Wave64 && desc.logical_size >= 8
        {
            (Some(read_u64(source)?), 8)
        } else if desc.logical_size >= 4 {
            (Some(read_u32(source)? as u64), 4)
        } else {
            (None, 0)
        };
        if let Some(frames) = frames {
            log::debug!("fact chunk: {} frames", frames);
            self.fact_frames = Some(frames);
        }
        self.skip_rest(source, desc, consumed)?;
        Ok(())
    }

    fn collect_metadata<S: ByteSource>(
        &mut self,
        source: &mut S,
        desc: &ChunkDesc,
    ) -> AudioIOResult<()> {
        if S::SEEKABLE {
            let mut deferred = desc.clone();
            if let Some(len) = self.stream_len {
                let available = len.saturating_sub(desc.body_offset);
                if deferred.logical_size > available {
                    log::warn!(
                        "'{}' chunk declares {} bytes but only {} remain, clamping",
                        desc.id,
                        desc.logical_size,
                        available
                    );
                    deferred.logical_size = available;
                }
            }
            self.metadata_chunks.push(deferred);
            self.skip_rest(source, desc, 0)?;
        } else {
            let start = self.metadata_bytes.len() as u64;
            let read = (&mut *source)
                .take(desc.logical_size)
                .read_to_end(&mut self.metadata_bytes)? as u64;
            if read < desc.logical_size {
                return Err(AudioIOError::corrupted_data(
                    "Truncated metadata chunk",
                    format!("'{}' declares {} bytes, {} present", desc.id, desc.logical_size, read),
                    ErrorPosition::new(desc.body_offset),
                ));
            }
            self.metadata_chunks.push(ChunkDesc {
                id: desc.id,
                offset: start,
                body_offset: start,
                logical_size: read,
                total_size: read,
            });
            self.skip_rest(source, desc, read)?;
        }
        Ok(())
    }

    /// Continue past the data chunk collecting trailing metadata chunks.
    /// The source is left wherever the walk stopped.
    fn scan_after_data<S: ByteSource>(
        &mut self,
        source: &mut S,
        declared_end: u64,
    ) -> AudioIOResult<()> {
        let Some(data) = self.data.clone() else {
            return Ok(());
        };
        self.skip_rest(source, &data, 0)?;

        let end = match self.stream_len {
            Some(len) => len.min(declared_end),
            None => declared_end,
        };
        let header_size = self.container.chunk_header_size();
        while self.pos.saturating_add(header_size) <= end {
            let desc = match self.read_header(source) {
                Ok(desc) => desc,
                Err(e) => {
                    log::debug!("Stopping chunk walk after data: {}", e);
                    break;
                }
            };
            match desc.id {
                FACT_CHUNK if self.fact_frames.is_none() => self.read_fact(source, &desc)?,
                id if self.wants_metadata(id) => self.collect_metadata(source, &desc)?,
                _ => self.skip_rest(source, &desc, 0)?,
            }
            self.chunks.push(desc);
        }
        Ok(())
    }
}

/// Streaming reader for RIFF, RF64 and Wave64 audio.
///
/// `S` is [`Seekable`] or [`Sequential`]; only seekable readers can move
/// backwards (see `seek_to_frame`). Samples are read with the
/// `read_pcm_frames*` family.
///
/// ```no_run
/// use std::{fs::File, io::BufReader};
/// use wav_codec::wav::WavReader;
///
/// let mut reader = WavReader::open(BufReader::new(File::open("take.wav")?))?;
/// let mut buffer = vec![0.0f32; 1024 * reader.channels() as usize];
/// loop {
///     let frames = reader.read_pcm_frames_f32(&mut buffer)?;
///     if frames == 0 {
///         break;
///     }
/// }
/// # Ok::<(), wav_codec::error::AudioIOError>(())
/// ```
#[derive(Debug)]
pub struct WavReader<S> {
    pub(crate) source: S,
    pub(crate) container: ContainerKind,
    pub(crate) fmt: FmtChunk,
    pub(crate) sample_format: SampleFormat,
    /// On-disk sample layout, `None` for ADPCM
    pub(crate) disk: Option<DiskSample>,
    pub(crate) decoder: Option<BlockDecoder>,
    /// Absolute offset of the first data byte
    pub(crate) data_offset: u64,
    pub(crate) data_size: u64,
    /// Bytes of the data chunk not yet consumed
    pub(crate) data_remaining: u64,
    pub(crate) total_frames: u64,
    pub(crate) current_frame: u64,
    ds64: Option<Ds64>,
    chunks: Vec<ChunkDesc>,
    metadata: Option<Metadata>,
}

impl<S: ByteSource> WavReader<S> {
    fn from_scan(
        source: S,
        base: u64,
        scan: ChunkScan<'_>,
        metadata: Option<Metadata>,
    ) -> AudioIOResult<Self> {
        let (Some(fmt), Some(data)) = (scan.fmt, scan.data.as_ref()) else {
            return Err(AudioIOError::corrupted_data_simple(
                "Missing mandatory chunk",
                "Both fmt and data chunks are required",
            ));
        };
        let sample_format = fmt.validate()?;
        let decoder = BlockDecoder::for_format(sample_format, fmt.channels, fmt.block_align);
        let disk = DiskSample::from_format(sample_format, fmt.bytes_per_sample());
        if decoder.is_none() && disk.is_none() {
            return Err(AudioIOError::unsupported_format(format!(
                "{} with {} bits per sample",
                sample_format, fmt.bits_per_sample
            )));
        }

        let data_size = data.logical_size;
        let total_frames = match decoder {
            None => data_size / fmt.bytes_per_frame(),
            Some(_) => scan
                .fact_frames
                .or(scan.ds64.map(|d| d.sample_count).filter(|&n| n > 0))
                .unwrap_or_else(|| {
                    adpcm_total_frames(
                        sample_format,
                        data_size,
                        fmt.block_align as u64,
                        fmt.channels as u64,
                    )
                }),
        };
        log::debug!(
            "{} {} stream: {} frames in {} data bytes at offset {}",
            scan.container,
            sample_format,
            total_frames,
            data_size,
            data.body_offset
        );

        Ok(WavReader {
            source,
            container: scan.container,
            fmt,
            sample_format,
            disk,
            decoder,
            data_offset: base + data.body_offset,
            data_size,
            data_remaining: data_size,
            total_frames,
            current_frame: 0,
            ds64: scan.ds64,
            chunks: scan.chunks,
            metadata,
        })
    }

    pub const fn container(&self) -> ContainerKind {
        self.container
    }

    pub const fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    pub const fn fmt(&self) -> &FmtChunk {
        &self.fmt
    }

    pub const fn channels(&self) -> u16 {
        self.fmt.channels
    }

    pub const fn sample_rate(&self) -> u32 {
        self.fmt.sample_rate
    }

    pub const fn bits_per_sample(&self) -> u16 {
        self.fmt.bits_per_sample
    }

    /// Total frames in the stream. Seeks are clamped against this.
    pub const fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Index of the next frame a read returns
    pub const fn current_frame(&self) -> u64 {
        self.current_frame
    }

    pub const fn remaining_frames(&self) -> u64 {
        self.total_frames.saturating_sub(self.current_frame)
    }

    /// Offset of the first sample byte from the start of the stream
    pub const fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Size of the data chunk in bytes
    pub const fn data_size(&self) -> u64 {
        self.data_size
    }

    /// Sizes from the `ds64` chunk, RF64 only
    pub const fn ds64(&self) -> Option<Ds64> {
        self.ds64
    }

    /// Top-level chunks seen while opening
    pub fn chunks(&self) -> &[ChunkDesc] {
        &self.chunks
    }

    /// Bytes per frame returned by `read_pcm_frames`: the on-disk frame for
    /// uncompressed formats, 16-bit samples for ADPCM
    pub const fn pcm_frame_size(&self) -> usize {
        match self.disk {
            Some(disk) => disk.width() * self.fmt.channels as usize,
            None => 2 * self.fmt.channels as usize,
        }
    }

    pub fn info(&self) -> WavInfo {
        WavInfo {
            container: self.container,
            sample_format: self.sample_format,
            sample_rate: self.fmt.sample_rate,
            channels: self.fmt.channels,
            bits_per_sample: self.fmt.bits_per_sample,
            byte_rate: self.fmt.byte_rate,
            block_align: self.fmt.block_align,
            total_frames: self.total_frames,
            duration: Duration::from_secs_f64(
                self.total_frames as f64 / self.fmt.sample_rate as f64,
            ),
        }
    }

    /// Metadata parsed at open, if it was requested
    pub const fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Move the metadata arena out of the reader. Later calls return `None`.
    pub fn take_metadata(&mut self) -> Option<Metadata> {
        self.metadata.take()
    }

    pub const fn get_ref(&self) -> &S {
        &self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<R: Read + Seek> WavReader<Seekable<R>> {
    /// Open a seekable stream with default options
    pub fn open(reader: R) -> AudioIOResult<Self> {
        Self::open_with_options(reader, OpenOptions::default())
    }

    /// Open a seekable stream. The stream's current position is taken as
    /// the start of the WAV data.
    pub fn open_with_options(reader: R, options: OpenOptions) -> AudioIOResult<Self> {
        let mut source = Seekable::new(reader);
        let base = source.stream_position()?;
        let end = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(base))?;

        let preamble = read_preamble(&mut source)?;
        log::debug!("Detected {} container", preamble.container);
        let mut scan = ChunkScan::new(&preamble, &options, Some(end.saturating_sub(base)));
        scan.scan_to_data(&mut source)?;

        let mut metadata = None;
        if options.read_metadata && preamble.container.supports_metadata() {
            scan.scan_after_data(&mut source, preamble.declared_end)?;
            // Chunk offsets are relative to `base`
            source.seek(SeekFrom::Start(base))?;
            let mut view = OffsetReader {
                inner: &mut source,
                base,
            };
            metadata = Some(read_metadata(
                &mut view,
                &scan.metadata_chunks,
                options.keep_unknown_chunks,
            )?);
        }

        let mut reader = Self::from_scan(source, base, scan, metadata)?;
        let data_offset = reader.data_offset;
        reader.source.seek(SeekFrom::Start(data_offset))?;
        Ok(reader)
    }
}

impl<R: Read> WavReader<Sequential<R>> {
    /// Open a forward-only stream with default options
    pub fn open_sequential(reader: R) -> AudioIOResult<Self> {
        Self::open_sequential_with_options(reader, OpenOptions::default())
    }

    /// Open a forward-only stream. Metadata chunks ahead of `data` are
    /// buffered and parsed; anything after `data` is never seen.
    pub fn open_sequential_with_options(reader: R, options: OpenOptions) -> AudioIOResult<Self> {
        let mut source = Sequential::new(reader);
        let preamble = read_preamble(&mut source)?;
        log::debug!("Detected {} container (sequential)", preamble.container);
        let mut scan = ChunkScan::new(&preamble, &options, None);
        scan.scan_to_data(&mut source)?;

        let metadata = if options.read_metadata && preamble.container.supports_metadata() {
            let mut buffered = io::Cursor::new(core::mem::take(&mut scan.metadata_bytes));
            Some(read_metadata(
                &mut buffered,
                &scan.metadata_chunks,
                options.keep_unknown_chunks,
            )?)
        } else {
            None
        };
        Self::from_scan(source, 0, scan, metadata)
    }
}

/// Presents a stream with its first `base` bytes hidden
struct OffsetReader<'a, T> {
    inner: &'a mut T,
    base: u64,
}

impl<T: Read> Read for OffsetReader<'_, T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<T: Seek> Seek for OffsetReader<'_, T> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let pos = match pos {
            SeekFrom::Start(offset) => SeekFrom::Start(self.base + offset),
            other => other,
        };
        Ok(self.inner.seek(pos)?.saturating_sub(self.base))
    }
}
