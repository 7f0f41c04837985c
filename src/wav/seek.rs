//! Frame-accurate seeking for seekable readers.

use std::io::{Read, Seek};

use crate::{
    error::{AudioIOError, AudioIOResult},
    wav::{io::Seekable, reader::WavReader},
};

fn signed_distance(bytes: u64) -> AudioIOResult<i64> {
    i64::try_from(bytes).map_err(|_| {
        AudioIOError::seek_error(format!("Seek distance of {} bytes is out of range", bytes))
    })
}

impl<R: Read + Seek> WavReader<Seekable<R>> {
    /// Position the reader so the next read returns frame `frame`.
    ///
    /// Targets past the end clamp to the last frame; seeking in an empty
    /// stream is a no-op. Uncompressed streams move the transport directly.
    /// ADPCM streams decode forward from the nearest earlier position,
    /// rewinding to the start of the data when the target is behind.
    ///
    /// # Errors
    ///
    /// Transport failures, or a compressed stream that ends before the target.
    pub fn seek_to_frame(&mut self, frame: u64) -> AudioIOResult<()> {
        if self.total_frames == 0 {
            return Ok(());
        }
        let target = frame.min(self.total_frames - 1);
        if target == self.current_frame {
            return Ok(());
        }
        log::trace!("Seeking from frame {} to {}", self.current_frame, target);

        if self.decoder.is_some() {
            if target < self.current_frame {
                self.rewind()?;
            }
            let wanted = target - self.current_frame;
            let skipped = self.discard_frames(wanted)?;
            if skipped < wanted {
                return Err(AudioIOError::seek_error(format!(
                    "Stream ended at frame {} while seeking to {}",
                    self.current_frame, target
                )));
            }
            return Ok(());
        }

        let consumed = self.data_size - self.data_remaining;
        let target_offset = target * self.fmt.bytes_per_frame();
        let delta = signed_distance(target_offset)? - signed_distance(consumed)?;
        self.source.seek_relative_bounded(delta)?;
        self.data_remaining = self.data_size - target_offset;
        self.current_frame = target;
        Ok(())
    }

    /// Return to the first data byte and reset decoder state
    fn rewind(&mut self) -> AudioIOResult<()> {
        let consumed = self.data_size - self.data_remaining;
        self.source.seek_relative_bounded(-signed_distance(consumed)?)?;
        if let Some(decoder) = self.decoder.as_mut() {
            decoder.reset();
        }
        self.data_remaining = self.data_size;
        self.current_frame = 0;
        Ok(())
    }
}
