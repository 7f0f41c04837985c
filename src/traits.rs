//! Object-safe streaming traits.
//!
//! These let callers hold any reader or writer of the crate behind a
//! `dyn` pointer regardless of the transport wrapper it was opened with.

use std::io::{Read, Seek, Write};

use crate::{
    error::AudioIOResult,
    wav::{
        WavReader, WavWriter,
        io::{ByteSource, Seekable, Sequential},
    },
};

/// Base trait for streaming audio readers (object-safe).
///
/// # Example
///
/// ```no_run
/// use wav_codec::traits::AudioStreamReader;
///
/// fn drain(stream: &mut dyn AudioStreamReader) -> wav_codec::error::AudioIOResult<f32> {
///     let mut buffer = vec![0.0f32; 1024 * stream.num_channels() as usize];
///     let mut peak = 0.0f32;
///     while stream.remaining_frames() > 0 {
///         let frames = stream.read_frames_f32(&mut buffer)? as usize;
///         if frames == 0 {
///             break;
///         }
///         let used = frames * stream.num_channels() as usize;
///         peak = buffer[..used].iter().fold(peak, |p, s| p.max(s.abs()));
///     }
///     Ok(peak)
/// }
/// ```
pub trait AudioStreamReader {
    /// Get the current frame position (0-indexed).
    fn current_frame(&self) -> u64;

    /// Get the number of remaining frames from current position.
    fn remaining_frames(&self) -> u64;

    /// Get the total number of frames in the stream.
    fn total_frames(&self) -> u64;

    /// Get the sample rate in Hz.
    fn sample_rate(&self) -> u32;

    fn num_channels(&self) -> u16;

    /// Get the number of bytes per frame (block align).
    fn bytes_per_frame(&self) -> usize;

    /// Read interleaved frames as `i16`. Returns the number of frames read.
    fn read_frames_i16(&mut self, out: &mut [i16]) -> AudioIOResult<u64>;

    /// Read interleaved frames as `i32`
    fn read_frames_i32(&mut self, out: &mut [i32]) -> AudioIOResult<u64>;

    /// Read interleaved frames as `f32`
    fn read_frames_f32(&mut self, out: &mut [f32]) -> AudioIOResult<u64>;

    /// Move forward without decoding into the caller's buffer
    fn skip_frames(&mut self, count: u64) -> AudioIOResult<u64>;
}

/// Readers that can reposition (object-safe).
pub trait AudioStreamSeek: AudioStreamReader {
    /// Seek to a specific frame position.
    ///
    /// # Arguments
    ///
    /// * `frame` - The frame index to seek to (0-indexed), clamped to the last frame
    fn seek_to_frame(&mut self, frame: u64) -> AudioIOResult<()>;

    /// Reset to the beginning of the audio data.
    fn reset(&mut self) -> AudioIOResult<()> {
        self.seek_to_frame(0)
    }
}

/// Base trait for streaming audio writers (object-safe).
///
/// # Finalization
///
/// Audio formats often require updating headers with final size information.
/// Call [`finalize()`](AudioStreamWriter::finalize) when done writing to ensure
/// the output is valid. The internal `finalized` flag prevents double-finalization.
///
/// # Example
///
/// ```no_run
/// use wav_codec::traits::AudioStreamWriter;
///
/// fn finish_stream(writer: &mut dyn AudioStreamWriter) -> Result<(), wav_codec::error::AudioIOError> {
///     writer.flush()?;
///     writer.finalize()?;
///     Ok(())
/// }
/// ```
pub trait AudioStreamWriter {
    /// Flush any buffered data to the underlying writer.
    fn flush(&mut self) -> AudioIOResult<()>;

    /// Finalize the audio stream, completing its header.
    ///
    /// # Idempotency
    ///
    /// Calling `finalize()` multiple times succeeds without re-writing headers.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be completed, or if a writer
    /// created with a fixed length received a different amount of data.
    fn finalize(&mut self) -> AudioIOResult<()>;

    /// Check if the stream has been finalized.
    fn is_finalized(&self) -> bool;

    /// Get the number of frames written so far.
    fn frames_written(&self) -> u64;

    /// Get the sample rate this writer was configured with.
    fn sample_rate(&self) -> u32;

    /// Get the number of channels this writer was configured with.
    fn num_channels(&self) -> u16;

    /// Encode and append interleaved `i16` frames
    fn write_frames_i16(&mut self, samples: &[i16]) -> AudioIOResult<u64>;

    /// Encode and append interleaved `i32` frames
    fn write_frames_i32(&mut self, samples: &[i32]) -> AudioIOResult<u64>;

    /// Encode and append interleaved `f32` frames
    fn write_frames_f32(&mut self, samples: &[f32]) -> AudioIOResult<u64>;
}

impl<S: ByteSource> AudioStreamReader for WavReader<S> {
    fn current_frame(&self) -> u64 {
        Self::current_frame(self)
    }

    fn remaining_frames(&self) -> u64 {
        Self::remaining_frames(self)
    }

    fn total_frames(&self) -> u64 {
        Self::total_frames(self)
    }

    fn sample_rate(&self) -> u32 {
        Self::sample_rate(self)
    }

    fn num_channels(&self) -> u16 {
        self.channels()
    }

    fn bytes_per_frame(&self) -> usize {
        self.fmt().block_align as usize
    }

    fn read_frames_i16(&mut self, out: &mut [i16]) -> AudioIOResult<u64> {
        self.read_pcm_frames_s16(out)
    }

    fn read_frames_i32(&mut self, out: &mut [i32]) -> AudioIOResult<u64> {
        self.read_pcm_frames_s32(out)
    }

    fn read_frames_f32(&mut self, out: &mut [f32]) -> AudioIOResult<u64> {
        self.read_pcm_frames_f32(out)
    }

    fn skip_frames(&mut self, count: u64) -> AudioIOResult<u64> {
        Self::skip_frames(self, count)
    }
}

impl<R: Read + Seek> AudioStreamSeek for WavReader<Seekable<R>> {
    fn seek_to_frame(&mut self, frame: u64) -> AudioIOResult<()> {
        Self::seek_to_frame(self, frame)
    }
}

macro_rules! impl_stream_writer {
    ($wrapper:ident, $($bounds:tt)+) => {
        impl<W: $($bounds)+> AudioStreamWriter for WavWriter<$wrapper<W>> {
            fn flush(&mut self) -> AudioIOResult<()> {
                Self::flush(self)
            }

            fn finalize(&mut self) -> AudioIOResult<()> {
                Self::finalize(self)
            }

            fn is_finalized(&self) -> bool {
                Self::is_finalized(self)
            }

            fn frames_written(&self) -> u64 {
                Self::frames_written(self)
            }

            fn sample_rate(&self) -> u32 {
                self.format().sample_rate
            }

            fn num_channels(&self) -> u16 {
                self.format().channels
            }

            fn write_frames_i16(&mut self, samples: &[i16]) -> AudioIOResult<u64> {
                Self::write_frames_i16(self, samples)
            }

            fn write_frames_i32(&mut self, samples: &[i32]) -> AudioIOResult<u64> {
                Self::write_frames_i32(self, samples)
            }

            fn write_frames_f32(&mut self, samples: &[f32]) -> AudioIOResult<u64> {
                Self::write_frames_f32(self, samples)
            }
        }
    };
}

impl_stream_writer!(Seekable, Write + Seek);
impl_stream_writer!(Sequential, Write);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WriteFormat;
    use std::io::Cursor;

    fn stereo_file() -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        let mut writer = WavWriter::create(&mut out, WriteFormat::pcm(2, 22_050, 16)).unwrap();
        let stream: &mut dyn AudioStreamWriter = &mut writer;
        stream.write_frames_i16(&[100, -100, 200, -200, 300, -300]).unwrap();
        stream.finalize().unwrap();
        assert!(stream.is_finalized());
        assert_eq!(stream.frames_written(), 3);
        drop(writer);
        out.into_inner()
    }

    #[test]
    fn test_reader_behind_trait_object() {
        let mut reader = WavReader::open(Cursor::new(stereo_file())).unwrap();
        let stream: &mut dyn AudioStreamSeek = &mut reader;
        assert_eq!(stream.total_frames(), 3);
        assert_eq!(stream.num_channels(), 2);
        assert_eq!(stream.bytes_per_frame(), 4);

        stream.seek_to_frame(2).unwrap();
        let mut out = [0i16; 2];
        assert_eq!(stream.read_frames_i16(&mut out).unwrap(), 1);
        assert_eq!(out, [300, -300]);

        stream.reset().unwrap();
        assert_eq!(stream.current_frame(), 0);
        assert_eq!(stream.remaining_frames(), 3);
    }

    #[test]
    fn test_sequential_types_share_traits() {
        let mut readers: Vec<Box<dyn AudioStreamReader>> = vec![
            Box::new(WavReader::open(Cursor::new(stereo_file())).unwrap()),
            Box::new(WavReader::open_sequential(Cursor::new(stereo_file())).unwrap()),
        ];
        for reader in readers.iter_mut() {
            assert_eq!(reader.skip_frames(1).unwrap(), 1);
            let mut out = [0i32; 4];
            assert_eq!(reader.read_frames_i32(&mut out).unwrap(), 2);
            assert_eq!(out[0], 200 << 16);
        }

        let mut sink = Vec::new();
        let mut writer =
            WavWriter::create_sequential(&mut sink, WriteFormat::float(1, 8000, 32), 2).unwrap();
        let stream: &mut dyn AudioStreamWriter = &mut writer;
        stream.write_frames_f32(&[0.5, -0.5]).unwrap();
        stream.finalize().unwrap();
        assert_eq!(stream.sample_rate(), 8000);
    }
}
