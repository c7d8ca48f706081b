//! The device backend: opens a stereo float output stream and invokes the
//! mixer under the shared device lock on every callback.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use parking_lot::Mutex;

use crate::error::{MixerError, MixerResult};
use crate::mixer;
use crate::Shared;
use crate::{AUDIO_BUFFER_SIZE, CHANNEL_COUNT, SAMPLE_RATE_HZ};

/// Opens the default output device at the engine's fixed output spec
/// (44100 Hz, float32-LE, 2 channels, `AUDIO_BUFFER_SIZE`-frame buffer) and
/// wires its callback to [`mixer::mix`].
///
/// The returned `Stream` must be kept alive for audio to play; dropping it
/// stops the callback. Device enumeration/selection is explicitly out of
/// scope, so this always asks cpal for the host's default device.
pub(crate) fn open_output_stream(shared: Arc<Mutex<Shared>>) -> MixerResult<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| MixerError::DeviceUnavailable("no default output device".into()))?;

    let config = StreamConfig {
        channels: CHANNEL_COUNT as u16,
        sample_rate: SampleRate(SAMPLE_RATE_HZ),
        buffer_size: BufferSize::Fixed(AUDIO_BUFFER_SIZE as u32),
    };

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frame_count = data.len() / CHANNEL_COUNT;
                let mut shared = shared.lock();
                let Shared { playing, scratch } = &mut *shared;
                mixer::mix(playing, scratch, data, frame_count);
            },
            move |err| {
                log::error!("output stream error: {err}");
            },
            None,
        )
        .map_err(|e| MixerError::DeviceUnavailable(e.to_string()))?;

    stream
        .play()
        .map_err(|e| MixerError::DeviceUnavailable(e.to_string()))?;

    Ok(stream)
}
