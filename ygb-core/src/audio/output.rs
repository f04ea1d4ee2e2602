//! Default output device via cpal.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use super::AudioPipe;

/// A running output stream. Dropping it stops playback.
pub struct AudioOutput {
    _stream: Stream,
    sample_rate: u32,
}

impl AudioOutput {
    /// Open the default output device as 2-channel f32 at `sample_rate` and
    /// render from `pipe` in the device callback.
    pub fn start(mut pipe: AudioPipe, sample_rate: u32) -> Result<Self, String> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| "No output device available".to_string())?;

        let config = StreamConfig {
            channels: 2,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    pipe.render(data);
                },
                |err| {
                    log::error!(target: "audio", "output stream error: {}", err);
                },
                None,
            )
            .map_err(|e| format!("Failed to build output stream: {}", e))?;

        stream
            .play()
            .map_err(|e| format!("Failed to start output stream: {}", e))?;

        log::info!(
            target: "audio",
            "output started on {} at {} Hz",
            device.name().unwrap_or_else(|_| "unknown device".into()),
            sample_rate
        );
        Ok(Self {
            _stream: stream,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
