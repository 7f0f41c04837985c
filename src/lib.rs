// Correctness and logic
#![warn(clippy::unit_cmp)] // Detects comparing unit types
#![warn(clippy::match_same_arms)] // Duplicate match arms
#![allow(clippy::result_large_err)] // Allow large error types for comprehensive error handling
#![allow(clippy::collapsible_if)] // Sometimes clearer to have separate conditions
#![allow(clippy::unnecessary_cast)] // Explicit casts for clarity
#![allow(clippy::identity_op)] // Explicit operations for clarity

// Performance-focused
#![warn(clippy::inefficient_to_string)] // `format!("{}", x)` vs `x.to_string()`
#![warn(clippy::map_clone)] // Cloning inside `map()` unnecessarily
#![warn(clippy::unnecessary_to_owned)] // Detects redundant `.to_owned()` or `.clone()`
#![warn(clippy::large_stack_arrays)] // Helps avoid stack overflows
#![warn(clippy::needless_collect)] // Avoids `.collect().iter()` chains

// Style and idiomatic Rust
#![warn(clippy::redundant_clone)] // Detects unnecessary `.clone()`
#![warn(clippy::needless_return)] // Avoids `return` at the end of functions
#![warn(clippy::let_unit_value)] // Avoids binding `()` to variables
#![warn(clippy::manual_map)] // Use `.map()` instead of manual `match`
#![warn(clippy::unwrap_used)] // Avoids using `unwrap()`
#![warn(clippy::panic)] // Avoids using `panic!` in production code

// Maintainability
#![warn(clippy::missing_safety_doc)] // Docs for `unsafe` functions
#![allow(clippy::too_many_arguments)] // Allow functions with many parameters (very few and far between)

//! Streaming reader and writer for WAV audio in RIFF, RF64 and Wave64
//! containers.
//!
//! Readers and writers work on caller-supplied transports through the
//! [`wav::Seekable`] and [`wav::Sequential`] wrappers. The functions at the
//! crate root are conveniences for files on disk.

pub mod error;
pub mod traits;
pub mod types;
pub mod wav;

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Seek, SeekFrom},
    path::Path,
};

#[cfg(feature = "mmap")]
use memmap2::{Mmap, MmapOptions};

pub use crate::{
    error::{AudioIOError, AudioIOResult},
    traits::{AudioStreamReader, AudioStreamSeek, AudioStreamWriter},
    types::{ContainerKind, OpenOptions, SampleFormat, WavInfo, WriteFormat},
    wav::{Seekable, Sequential, WavReader, WavWriter, metadata::Metadata},
};

/// Files up to this size are memory-mapped by the path helpers
#[cfg(feature = "mmap")]
pub(crate) const MAX_MMAP_SIZE: u64 = 512 * 1024 * 1024;

/// Frames decoded per step by the whole-file readers
const READ_CHUNK_FRAMES: usize = 4096;

/// Byte source behind a reader opened from a path
#[derive(Debug)]
pub enum FileSource {
    Buffered(BufReader<File>),
    #[cfg(feature = "mmap")]
    MemoryMapped(io::Cursor<Mmap>),
}

impl Read for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FileSource::Buffered(reader) => reader.read(buf),
            #[cfg(feature = "mmap")]
            FileSource::MemoryMapped(cursor) => cursor.read(buf),
        }
    }
}

impl Seek for FileSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            FileSource::Buffered(reader) => reader.seek(pos),
            #[cfg(feature = "mmap")]
            FileSource::MemoryMapped(cursor) => cursor.seek(pos),
        }
    }
}

fn file_source(path: &Path, options: &OpenOptions) -> AudioIOResult<FileSource> {
    let file = File::open(path)?;

    #[cfg(feature = "mmap")]
    {
        let file_size = file.metadata()?.len();
        if options.use_memory_map && file_size <= MAX_MMAP_SIZE {
            log::debug!("Memory-mapping {} ({} bytes)", path.display(), file_size);
            // SAFETY: the map is read-only and owned by the returned source;
            // the caller must not truncate the file while it is open.
            let map = unsafe { MmapOptions::new().map(&file)? };
            return Ok(FileSource::MemoryMapped(io::Cursor::new(map)));
        }
    }
    #[cfg(not(feature = "mmap"))]
    let _ = options;

    Ok(FileSource::Buffered(BufReader::new(file)))
}

/// Open a WAV file for streaming reads with default options
pub fn open<P: AsRef<Path>>(fp: P) -> AudioIOResult<WavReader<Seekable<FileSource>>> {
    open_with_options(fp, OpenOptions::default())
}

/// Open a WAV file for streaming reads.
///
/// # Example
///
/// ```no_run
/// use wav_codec::{OpenOptions, wav::metadata::InfoTag};
///
/// let mut reader = wav_codec::open_with_options("take.wav", OpenOptions::default().with_metadata(true))?;
/// if let Some(title) = reader.metadata().and_then(|m| m.info(InfoTag::Title)) {
///     println!("{}", title);
/// }
/// reader.seek_to_frame(48_000)?;
/// # Ok::<(), wav_codec::AudioIOError>(())
/// ```
pub fn open_with_options<P: AsRef<Path>>(
    fp: P,
    options: OpenOptions,
) -> AudioIOResult<WavReader<Seekable<FileSource>>> {
    let source = file_source(fp.as_ref(), &options)?;
    WavReader::open_with_options(source, options)
}

/// Read the header of a WAV file
pub fn info<P: AsRef<Path>>(fp: P) -> AudioIOResult<WavInfo> {
    let options = OpenOptions::default().with_memory_map(false);
    let reader = open_with_options(fp, options)?;
    Ok(reader.info())
}

fn read_all<T: Copy + Default>(
    fp: &Path,
    read: fn(&mut WavReader<Seekable<FileSource>>, &mut [T]) -> AudioIOResult<u64>,
) -> AudioIOResult<(WavInfo, Vec<T>)> {
    let mut reader = open(fp)?;
    let info = reader.info();
    let channels = info.channels as usize;

    let mut samples = Vec::new();
    let mut chunk = vec![T::default(); READ_CHUNK_FRAMES * channels];
    loop {
        let frames = read(&mut reader, &mut chunk)? as usize;
        if frames == 0 {
            break;
        }
        samples.extend_from_slice(&chunk[..frames * channels]);
    }
    if (samples.len() / channels) as u64 != info.total_frames {
        log::warn!(
            "{}: header declares {} frames, read {}",
            fp.display(),
            info.total_frames,
            samples.len() / channels
        );
    }
    Ok((info, samples))
}

/// Read a whole file as interleaved `f32` samples
pub fn read_f32<P: AsRef<Path>>(fp: P) -> AudioIOResult<(WavInfo, Vec<f32>)> {
    read_all(fp.as_ref(), WavReader::read_pcm_frames_f32)
}

/// Read a whole file as interleaved `i16` samples
pub fn read_i16<P: AsRef<Path>>(fp: P) -> AudioIOResult<(WavInfo, Vec<i16>)> {
    read_all(fp.as_ref(), WavReader::read_pcm_frames_s16)
}

/// Read a whole file as interleaved `i32` samples
pub fn read_i32<P: AsRef<Path>>(fp: P) -> AudioIOResult<(WavInfo, Vec<i32>)> {
    read_all(fp.as_ref(), WavReader::read_pcm_frames_s32)
}

/// Create a WAV file for streaming writes. Sizes are patched in when the
/// writer is finalized.
pub fn create<P: AsRef<Path>>(
    fp: P,
    format: WriteFormat,
) -> AudioIOResult<WavWriter<Seekable<BufWriter<File>>>> {
    let file = File::create(fp.as_ref())?;
    WavWriter::create(BufWriter::new(file), format)
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    fn write_tone(path: &Path, format: WriteFormat) {
        let samples: Vec<f32> = (0..800).map(|i| ((i % 40) as f32 / 40.0) - 0.5).collect();
        let mut writer = create(path, format).unwrap();
        writer.write_frames_f32(&samples).unwrap();
        writer.finalize().unwrap();
    }

    #[test]
    fn test_info_function() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_tone(&path, WriteFormat::pcm(2, 8000, 16));

        let info = info(&path).unwrap();
        assert_eq!(info.container, ContainerKind::Riff);
        assert_eq!(info.sample_format, SampleFormat::Pcm);
        assert_eq!(info.channels, 2);
        assert_eq!(info.total_frames, 400);
        assert!((info.duration.as_secs_f64() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_read_functions_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_tone(&path, WriteFormat::pcm(1, 8000, 16));

        let (_, floats) = read_f32(&path).unwrap();
        let (_, shorts) = read_i16(&path).unwrap();
        let (info, ints) = read_i32(&path).unwrap();
        assert_eq!(info.total_frames, 800);
        assert_eq!(floats.len(), 800);
        for ((f, s), i) in floats.iter().zip(&shorts).zip(&ints) {
            assert_eq!(*f, *s as f32 / 32768.0);
            assert_eq!(*i, (*s as i32) << 16);
        }
    }

    #[test]
    fn test_open_with_and_without_mmap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_tone(&path, WriteFormat::float(1, 8000, 32).in_container(ContainerKind::Rf64));

        let mapped = open(&path).unwrap();
        #[cfg(feature = "mmap")]
        assert!(matches!(mapped.get_ref().get_ref(), FileSource::MemoryMapped(_)));

        let mut buffered =
            open_with_options(&path, OpenOptions::default().with_memory_map(false)).unwrap();
        assert!(matches!(buffered.get_ref().get_ref(), FileSource::Buffered(_)));
        assert_eq!(mapped.info(), buffered.info());

        buffered.seek_to_frame(10).unwrap();
        let mut out = [0f32; 1];
        assert_eq!(buffered.read_pcm_frames_f32(&mut out).unwrap(), 1);
        assert_eq!(out[0], 10.0 / 40.0 - 0.5);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = info("definitely/not/here.wav").unwrap_err();
        assert!(err.is_io());
    }
}
