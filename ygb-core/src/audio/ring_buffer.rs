/// Fixed-capacity FIFO of interleaved stereo `f32` samples.
///
/// Writes never overwrite unread samples: whatever does not fit is dropped.
/// Reads never fail: samples that are not available come back as silence.
pub struct SampleRing {
    buffer: Vec<f32>,
    read_pos: usize,
    write_pos: usize,
    available: usize,
}

impl SampleRing {
    /// `capacity` is in samples and is rounded down to whole stereo frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity & !1],
            read_pos: 0,
            write_pos: 0,
            available: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Samples written and not yet read.
    pub fn available(&self) -> usize {
        self.available
    }

    pub fn free(&self) -> usize {
        self.capacity() - self.available
    }

    /// Append interleaved samples. Only whole frames are written; returns
    /// the number of samples accepted.
    pub fn write(&mut self, samples: &[f32]) -> usize {
        let n = samples.len().min(self.free()) & !1;
        for &sample in &samples[..n] {
            self.buffer[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.buffer.len();
        }
        self.available += n;
        n
    }

    /// Append planar channels as interleaved frames. Returns frames accepted.
    pub fn write_stereo(&mut self, left: &[f32], right: &[f32]) -> usize {
        let frames = left.len().min(right.len()).min(self.free() / 2);
        for (&l, &r) in left.iter().zip(right).take(frames) {
            self.buffer[self.write_pos] = l;
            self.buffer[self.write_pos + 1] = r;
            self.write_pos = (self.write_pos + 2) % self.buffer.len();
        }
        self.available += frames * 2;
        frames
    }

    /// Fill `out` with the oldest samples, zero-filling the remainder.
    /// Returns the number of real samples copied.
    pub fn read(&mut self, out: &mut [f32]) -> usize {
        let n = out.len().min(self.available);
        for slot in &mut out[..n] {
            *slot = self.buffer[self.read_pos];
            self.read_pos = (self.read_pos + 1) % self.buffer.len();
        }
        out[n..].fill(0.0);
        self.available -= n;
        n
    }

    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
        self.available = 0;
    }
}
