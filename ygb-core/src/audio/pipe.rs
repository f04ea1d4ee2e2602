use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use super::SampleRing;

/// Create the bounded chunk channel between the executor and the audio side.
pub fn audio_channel(depth: usize) -> (AudioSender, Receiver<Vec<f32>>) {
    let (tx, rx) = crossbeam_channel::bounded(depth.max(1));
    (
        AudioSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        rx,
    )
}

/// Executor-side end of the audio channel. Never blocks.
#[derive(Clone)]
pub struct AudioSender {
    tx: Sender<Vec<f32>>,
    dropped: Arc<AtomicU64>,
}

impl AudioSender {
    /// Queue one chunk of planar stereo samples, interleaved. Returns false
    /// when the chunk was dropped because the consumer is behind or gone.
    pub fn send(&self, left: &[f32], right: &[f32]) -> bool {
        let mut chunk = Vec::with_capacity(left.len().min(right.len()) * 2);
        for (&l, &r) in left.iter().zip(right) {
            chunk.push(l);
            chunk.push(r);
        }
        match self.tx.try_send(chunk) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Chunks dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Render-side end: drains chunks into a [`SampleRing`] and serves fixed
/// quanta to the output callback.
pub struct AudioPipe {
    rx: Receiver<Vec<f32>>,
    ring: SampleRing,
    overflowed: u64,
}

impl AudioPipe {
    pub fn new(rx: Receiver<Vec<f32>>, capacity: usize) -> Self {
        Self {
            rx,
            ring: SampleRing::new(capacity),
            overflowed: 0,
        }
    }

    /// Move every queued chunk into the ring. Returns samples accepted.
    pub fn pump(&mut self) -> usize {
        let mut accepted = 0;
        for chunk in self.rx.try_iter() {
            let n = self.ring.write(&chunk);
            if n < chunk.len() {
                self.overflowed += (chunk.len() - n) as u64;
            }
            accepted += n;
        }
        accepted
    }

    /// Fill one output quantum, silence-filling any shortfall. Returns the
    /// number of real samples rendered.
    pub fn render(&mut self, out: &mut [f32]) -> usize {
        self.pump();
        self.ring.read(out)
    }

    pub fn buffered(&self) -> usize {
        self.ring.available()
    }

    /// Samples dropped because the ring was full.
    pub fn overflowed(&self) -> u64 {
        self.overflowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_are_interleaved_and_rendered() {
        let (sender, rx) = audio_channel(4);
        let mut pipe = AudioPipe::new(rx, 16);
        assert!(sender.send(&[0.1, 0.2], &[-0.1, -0.2]));

        let mut out = [9.0; 6];
        assert_eq!(pipe.render(&mut out), 4);
        assert_eq!(out, [0.1, -0.1, 0.2, -0.2, 0.0, 0.0]);
    }

    #[test]
    fn full_channel_drops_without_blocking() {
        let (sender, _rx) = audio_channel(1);
        assert!(sender.send(&[0.0], &[0.0]));
        assert!(!sender.send(&[0.0], &[0.0]));
        assert_eq!(sender.dropped(), 1);
    }

    #[test]
    fn ring_overflow_is_counted() {
        let (sender, rx) = audio_channel(8);
        let mut pipe = AudioPipe::new(rx, 4);
        sender.send(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert_eq!(pipe.pump(), 4);
        assert_eq!(pipe.overflowed(), 2);
        assert_eq!(pipe.buffered(), 4);
    }
}
