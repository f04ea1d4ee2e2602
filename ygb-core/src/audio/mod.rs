//! Audio path from the core's upcall to the output device.
//!
//! core --audio(left, right)--> [`AudioSender`] --bounded channel--> [`AudioPipe`]
//! --> [`SampleRing`] --> render callback.

pub mod pipe;
pub mod ring_buffer;

#[cfg(feature = "cpal")]
pub mod output;

pub use pipe::{audio_channel, AudioPipe, AudioSender};
pub use ring_buffer::SampleRing;

#[cfg(feature = "cpal")]
pub use output::AudioOutput;
