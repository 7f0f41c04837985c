//! Frame reading for [`WavReader`].
//!
//! Every read is bounded by the bytes left in the data chunk, so trailing
//! chunks are never mistaken for samples. Conversions run through a fixed
//! stack buffer; no read allocates.

use std::io::Read;

use crate::{
    error::AudioIOResult,
    wav::{
        convert::{DiskSample, s16_to_f32, s16_to_s32},
        endian::{le_to_native_in_place, read_fully},
        io::ByteSource,
        reader::WavReader,
    },
};

const SCRATCH_BYTES: usize = 4096;
const SCRATCH_SAMPLES: usize = 2048;

impl<S: ByteSource> WavReader<S> {
    /// Read from the data chunk into `buf`, stopping at its end
    fn read_data(&mut self, buf: &mut [u8]) -> AudioIOResult<usize> {
        let mut data = Read::take(&mut self.source, self.data_remaining);
        let read = read_fully(&mut data, buf);
        self.data_remaining = data.limit();
        Ok(read?)
    }

    /// The transport ran out before the declared end of the data chunk.
    /// Later reads, skips and seeks are bounded by the frames delivered.
    fn truncate_at_current(&mut self) {
        log::warn!(
            "Data chunk ended early at frame {} of {}",
            self.current_frame,
            self.total_frames
        );
        self.total_frames = self.current_frame;
    }

    /// Decode ADPCM frames into `out`, capped at the frames left in the stream
    fn read_adpcm(&mut self, out: &mut [i16]) -> AudioIOResult<usize> {
        let channels = self.fmt.channels as usize;
        let wanted = ((out.len() / channels) as u64).min(self.remaining_frames()) as usize;
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(0);
        };
        let mut data = Read::take(&mut self.source, self.data_remaining);
        let frames = decoder.read_frames(&mut data, &mut out[..wanted * channels]);
        self.data_remaining = data.limit();
        let frames = frames?;
        self.current_frame += frames as u64;
        if frames < wanted {
            self.truncate_at_current();
        }
        Ok(frames)
    }

    fn read_adpcm_converted<T>(
        &mut self,
        out: &mut [T],
        convert: fn(&[i16], &mut [T]),
    ) -> AudioIOResult<u64> {
        let channels = self.fmt.channels as usize;
        let wanted = out.len() / channels;
        let per_batch = SCRATCH_SAMPLES / channels;
        let mut scratch = [0i16; SCRATCH_SAMPLES];
        let mut done = 0;
        while done < wanted {
            let batch = (wanted - done).min(per_batch);
            let got = self.read_adpcm(&mut scratch[..batch * channels])?;
            convert(
                &scratch[..got * channels],
                &mut out[done * channels..(done + got) * channels],
            );
            done += got;
            if got < batch {
                break;
            }
        }
        Ok(done as u64)
    }

    fn read_converted<T>(
        &mut self,
        out: &mut [T],
        disk: DiskSample,
        decode: fn(DiskSample, &[u8], &mut [T]),
    ) -> AudioIOResult<u64> {
        let channels = self.fmt.channels as usize;
        let frame_size = self.fmt.bytes_per_frame() as usize;
        let wanted = ((out.len() / channels) as u64).min(self.remaining_frames()) as usize;
        let per_batch = SCRATCH_BYTES / frame_size;
        let mut scratch = [0u8; SCRATCH_BYTES];
        let mut done = 0;
        while done < wanted {
            let batch = (wanted - done).min(per_batch);
            let read = self.read_data(&mut scratch[..batch * frame_size])?;
            let got = read / frame_size;
            decode(
                disk,
                &scratch[..got * frame_size],
                &mut out[done * channels..(done + got) * channels],
            );
            done += got;
            if got < batch {
                break;
            }
        }
        self.current_frame += done as u64;
        if done < wanted {
            self.truncate_at_current();
        }
        Ok(done as u64)
    }

    /// Read whole frames in their little-endian file layout.
    ///
    /// ADPCM streams are decoded to 16-bit samples first. `out` should hold a
    /// multiple of [`WavReader::pcm_frame_size`] bytes; the return value is
    /// the number of frames written, zero at the end of the data.
    pub fn read_pcm_frames_le(&mut self, out: &mut [u8]) -> AudioIOResult<u64> {
        let frame_size = self.pcm_frame_size();
        if self.decoder.is_some() {
            let channels = self.fmt.channels as usize;
            let wanted = out.len() / frame_size;
            let mut scratch = [0i16; SCRATCH_SAMPLES];
            let mut done = 0;
            while done < wanted {
                let batch = (wanted - done).min(SCRATCH_SAMPLES / channels);
                let got = self.read_adpcm(&mut scratch[..batch * channels])?;
                let bytes = &mut out[done * frame_size..(done + got) * frame_size];
                for (dst, sample) in bytes.chunks_exact_mut(2).zip(&scratch[..got * channels]) {
                    dst.copy_from_slice(&sample.to_le_bytes());
                }
                done += got;
                if got < batch {
                    break;
                }
            }
            return Ok(done as u64);
        }

        let wanted = ((out.len() / frame_size) as u64).min(self.remaining_frames()) as usize;
        let read = self.read_data(&mut out[..wanted * frame_size])?;
        let frames = read / frame_size;
        self.current_frame += frames as u64;
        if frames < wanted {
            self.truncate_at_current();
        }
        Ok(frames as u64)
    }

    /// Like [`WavReader::read_pcm_frames_le`] with samples in host byte order
    pub fn read_pcm_frames(&mut self, out: &mut [u8]) -> AudioIOResult<u64> {
        let frames = self.read_pcm_frames_le(out)?;
        let sample_width = self.pcm_frame_size() / self.fmt.channels as usize;
        le_to_native_in_place(
            &mut out[..frames as usize * self.pcm_frame_size()],
            sample_width,
        );
        Ok(frames)
    }

    /// Read interleaved frames converted to `i16`
    pub fn read_pcm_frames_s16(&mut self, out: &mut [i16]) -> AudioIOResult<u64> {
        match self.disk {
            Some(disk) => self.read_converted(out, disk, DiskSample::decode_to_s16),
            None => Ok(self.read_adpcm(out)? as u64),
        }
    }

    /// Read interleaved frames converted to `i32`, full scale at `i32::MAX`
    pub fn read_pcm_frames_s32(&mut self, out: &mut [i32]) -> AudioIOResult<u64> {
        match self.disk {
            Some(disk) => self.read_converted(out, disk, DiskSample::decode_to_s32),
            None => self.read_adpcm_converted(out, s16_to_s32),
        }
    }

    /// Read interleaved frames converted to `f32` in `[-1.0, 1.0]`.
    ///
    /// ```no_run
    /// # use std::io::Cursor;
    /// # use wav_codec::wav::WavReader;
    /// # let bytes: Vec<u8> = Vec::new();
    /// let mut reader = WavReader::open(Cursor::new(bytes))?;
    /// let mut samples = vec![0.0f32; 4096 * reader.channels() as usize];
    /// let frames = reader.read_pcm_frames_f32(&mut samples)?;
    /// samples.truncate(frames as usize * reader.channels() as usize);
    /// # Ok::<(), wav_codec::error::AudioIOError>(())
    /// ```
    pub fn read_pcm_frames_f32(&mut self, out: &mut [f32]) -> AudioIOResult<u64> {
        match self.disk {
            Some(disk) => self.read_converted(out, disk, DiskSample::decode_to_f32),
            None => self.read_adpcm_converted(out, s16_to_f32),
        }
    }

    /// Decode and drop up to `count` frames
    pub(crate) fn discard_frames(&mut self, count: u64) -> AudioIOResult<u64> {
        let channels = self.fmt.channels as usize;
        let per_batch = (SCRATCH_SAMPLES / channels) as u64;
        let mut scratch = [0i16; SCRATCH_SAMPLES];
        let mut done = 0;
        while done < count {
            let batch = (count - done).min(per_batch) as usize;
            let got = self.read_adpcm(&mut scratch[..batch * channels])?;
            done += got as u64;
            if got < batch {
                break;
            }
        }
        Ok(done)
    }

    /// Move forward `count` frames without returning them. Returns the number
    /// of frames skipped, which is less than `count` near the end.
    pub fn skip_frames(&mut self, count: u64) -> AudioIOResult<u64> {
        let count = count.min(self.remaining_frames());
        if self.decoder.is_some() {
            return self.discard_frames(count);
        }
        let frame_size = self.fmt.bytes_per_frame();
        let count = count.min(self.data_remaining / frame_size);
        let bytes = count * frame_size;
        self.source.skip(bytes)?;
        self.data_remaining -= bytes;
        self.current_frame += count;
        Ok(count)
    }
}
