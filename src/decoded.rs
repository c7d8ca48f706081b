//! Borrow contract for already-decoded PCM data
//!
//! Decoding WAV/OGG assets and bookkeeping them by name is a collaborator
//! outside this crate (see [`crate::registry::SoundRegistry`]). An
//! [`AudioChannel`](crate::audio_channel::AudioChannel) only ever borrows a
//! `DecodedAudio` implementation; it never owns or frees the underlying
//! samples.

/// A single-channel, already-resampled block of PCM audio.
///
/// Implementations must already be at the engine's output sample rate — this
/// crate performs no resampling. Requests for a frame past [`Self::frame_count`]
/// must return silence rather than panicking, since [`crate::mixer::mix`]
/// relies on that to avoid a bounds check on every sample.
pub trait DecodedAudio: Send + Sync {
    /// Total number of frames (one sample each, since sources are mono).
    fn frame_count(&self) -> usize;

    /// The sample at `frame`. Returns `0.0` for any `frame >= frame_count()`.
    fn sample(&self, frame: usize) -> f32;
}

/// An in-memory [`DecodedAudio`] backed by an owned sample vector.
///
/// Stands in for the real decoder in tests and examples.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    samples: Vec<f32>,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// A mono sine wave at `freq_hz`, `amplitude`, rendered for one period
    /// (or `frame_count` frames if given, for convenience in tests).
    pub fn sine(freq_hz: f32, sample_rate_hz: f32, frame_count: usize, amplitude: f32) -> Self {
        let samples = (0..frame_count)
            .map(|i| {
                let t = i as f32 / sample_rate_hz;
                (t * freq_hz * std::f32::consts::TAU).sin() * amplitude
            })
            .collect();
        Self::new(samples)
    }

    /// A buffer where every frame holds the same sample value.
    pub fn constant(value: f32, frame_count: usize) -> Self {
        Self::new(vec![value; frame_count])
    }
}

impl DecodedAudio for SampleBuffer {
    fn frame_count(&self) -> usize {
        self.samples.len()
    }

    fn sample(&self, frame: usize) -> f32 {
        self.samples.get(frame).copied().unwrap_or(0.0)
    }
}
