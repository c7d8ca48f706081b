//! The sample-source adapter: a [`ChannelVoice`] that draws frames from a
//! [`DecodedAudio`] buffer.

use std::sync::Arc;

use crate::channel::{ChannelState, ChannelVoice};
use crate::decoded::DecodedAudio;
use crate::{AUDIO_BUFFER_SIZE, CHANNEL_COUNT};

/// Smoothing coefficient for the per-frame volume ramp:
/// `actual_volume += (current.volume - actual_volume) * VOLUME_RAMP_ALPHA`.
const VOLUME_RAMP_ALPHA: f32 = 1.0 / 64.0;

/// Fade-out step applied once a channel enters `Stopping`, sized so the fade
/// reaches zero over roughly one device buffer.
const FADE_STEP: f32 = 1.0 / AUDIO_BUFFER_SIZE as f32;

/// The mutable control parameters of an audio channel.
///
/// An [`AudioChannel`] holds two snapshots of this: `current` (read by the
/// mixer) and `new` (written by the control plane). `update()` promotes
/// `new` into `current` while the device lock is held.
#[derive(Clone, Copy, Debug)]
pub struct AudioChannelProps {
    pub volume: f32,
    pub pan: f32,
    pub loop_enabled: bool,
    pub position: usize,
    /// Bumped on every control-plane write; not read by the mixer, useful for
    /// a caller wanting to detect whether a seek/props change landed.
    pub generation: u64,
}

impl Default for AudioChannelProps {
    fn default() -> Self {
        Self {
            volume: 0.5,
            pan: 0.0,
            loop_enabled: false,
            position: 0,
            generation: 0,
        }
    }
}

/// A concrete [`ChannelVoice`] that plays back an already-decoded,
/// already-resampled mono sample buffer with volume, pan and loop.
///
/// Ownership: the body (this struct) is reached through the channel
/// record's boxed voice slot and is only ever freed by
/// [`ChannelVoice::finish`], which runs on the control thread. The `audio`
/// handle itself is a borrow; this crate never frees decoded data.
pub struct AudioChannel {
    sound_id: String,
    audio: Arc<dyn DecodedAudio>,
    current: AudioChannelProps,
    new: AudioChannelProps,
    actual_volume: f32,
    fade: f32,
}

impl AudioChannel {
    pub fn new(sound_id: impl Into<String>, audio: Arc<dyn DecodedAudio>, props: AudioChannelProps) -> Self {
        Self {
            sound_id: sound_id.into(),
            audio,
            current: props,
            new: props,
            actual_volume: 0.0,
            fade: 1.0,
        }
    }

    pub fn sound_id(&self) -> &str {
        &self.sound_id
    }

    pub fn current_props(&self) -> AudioChannelProps {
        self.current
    }

    pub fn set_loop(&mut self, loop_enabled: bool) {
        self.new.loop_enabled = loop_enabled;
        self.new.generation += 1;
    }

    pub fn seek(&mut self, position: usize) {
        self.new.position = position;
        self.new.generation += 1;
    }
}

impl ChannelVoice for AudioChannel {
    fn mix(&mut self, state: ChannelState, scratch: &mut [f32], frame_count: usize) -> ChannelState {
        debug_assert!(scratch.len() >= frame_count * CHANNEL_COUNT);

        let total_frames = self.audio.frame_count();
        let mut next_state = state;

        for frame in 0..frame_count {
            self.actual_volume += (self.current.volume - self.actual_volume) * VOLUME_RAMP_ALPHA;

            let raw_sample = self.audio.sample(self.current.position);

            if total_frames > 0 && self.current.position + 1 >= total_frames {
                if self.current.loop_enabled {
                    self.current.position = 0;
                } else {
                    self.current.position = total_frames;
                    if matches!(next_state, ChannelState::Playing | ChannelState::Virtualizing) {
                        next_state = ChannelState::Stopping;
                        self.fade = 1.0;
                    }
                }
            } else {
                self.current.position += 1;
            }

            let mut amplitude = raw_sample * self.actual_volume;

            if next_state == ChannelState::Stopping {
                self.fade = (self.fade - FADE_STEP).max(0.0);
                amplitude *= self.fade;
                if self.fade <= 0.0 {
                    next_state = ChannelState::Stopped;
                }
            }

            // Virtualizing still advances position/ramp/fade bookkeeping above
            // but contributes silence.
            if next_state == ChannelState::Virtualizing {
                amplitude = 0.0;
            }

            let left = amplitude * (1.0 - self.current.pan.max(0.0));
            let right = amplitude * (1.0 + self.current.pan.min(0.0));

            scratch[frame * CHANNEL_COUNT] = left;
            scratch[frame * CHANNEL_COUNT + 1] = right;
        }

        next_state
    }

    fn update(&mut self, state: ChannelState, stop_requested: bool) -> ChannelState {
        self.current = self.new;

        match state {
            ChannelState::Initialize => ChannelState::Devirtualize,
            ChannelState::Devirtualize => {
                self.actual_volume = self.current.volume;
                ChannelState::Playing
            }
            ChannelState::Playing | ChannelState::Virtualizing if stop_requested => {
                self.fade = 1.0;
                ChannelState::Stopping
            }
            other => other,
        }
    }

    fn finish(self: Box<Self>) {
        log::debug!("audio channel finished: sound {:?}", self.sound_id);
    }

    fn set_volume(&mut self, volume: f32) {
        self.new.volume = volume.clamp(0.0, 1.0);
        self.new.generation += 1;
    }

    fn set_pan(&mut self, pan: f32) {
        self.new.pan = pan.clamp(-1.0, 1.0);
        self.new.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoded::SampleBuffer;
    use float_eq::assert_float_eq;

    fn voice_with(props: AudioChannelProps, buf: SampleBuffer) -> AudioChannel {
        AudioChannel::new("test", Arc::new(buf), props)
    }

    fn promote_to_playing(voice: &mut AudioChannel) {
        // Initialize -> Devirtualize -> Playing, each a separate update tick.
        let mut state = ChannelState::Initialize;
        state = voice.update(state, false);
        assert_eq!(state, ChannelState::Devirtualize);
        state = voice.update(state, false);
        assert_eq!(state, ChannelState::Playing);
    }

    #[test]
    fn pan_hard_left_silences_right() {
        let props = AudioChannelProps {
            volume: 1.0,
            pan: -1.0,
            ..Default::default()
        };
        let mut voice = voice_with(props, SampleBuffer::constant(1.0, 4096));
        promote_to_playing(&mut voice);

        let mut scratch = vec![0.0f32; 256 * CHANNEL_COUNT];
        // burn the ramp-in
        voice.mix(ChannelState::Playing, &mut scratch, 256);
        voice.mix(ChannelState::Playing, &mut scratch, 256);

        for frame in 0..256 {
            assert_float_eq!(scratch[frame * 2 + 1], 0.0, abs <= 1e-6);
        }
    }

    #[test]
    fn pan_hard_right_silences_left() {
        let props = AudioChannelProps {
            volume: 1.0,
            pan: 1.0,
            ..Default::default()
        };
        let mut voice = voice_with(props, SampleBuffer::constant(1.0, 4096));
        promote_to_playing(&mut voice);

        let mut scratch = vec![0.0f32; 256 * CHANNEL_COUNT];
        voice.mix(ChannelState::Playing, &mut scratch, 256);
        voice.mix(ChannelState::Playing, &mut scratch, 256);

        for frame in 0..256 {
            assert_float_eq!(scratch[frame * 2], 0.0, abs <= 1e-6);
        }
    }

    #[test]
    fn pan_center_balances_left_and_right() {
        let props = AudioChannelProps {
            volume: 1.0,
            pan: 0.0,
            ..Default::default()
        };
        let mut voice = voice_with(props, SampleBuffer::constant(0.5, 4096));
        promote_to_playing(&mut voice);

        let mut scratch = vec![0.0f32; 256 * CHANNEL_COUNT];
        voice.mix(ChannelState::Playing, &mut scratch, 256);
        voice.mix(ChannelState::Playing, &mut scratch, 256);

        for frame in 0..256 {
            assert_float_eq!(scratch[frame * 2], scratch[frame * 2 + 1], abs <= 1e-6);
        }
    }

    #[test]
    fn volume_ramp_is_bounded_by_distance_to_target() {
        let props = AudioChannelProps {
            volume: 1.0,
            ..Default::default()
        };
        let mut voice = voice_with(props, SampleBuffer::constant(1.0, 4096));
        promote_to_playing(&mut voice);

        let mut prev = voice.actual_volume;
        let mut scratch = [0.0f32; CHANNEL_COUNT];
        for _ in 0..200 {
            voice.mix(ChannelState::Playing, &mut scratch, 1);
            let delta = (voice.actual_volume - prev).abs();
            let bound = (voice.current.volume - prev).abs();
            assert!(delta <= bound + 1e-6);
            prev = voice.actual_volume;
        }
    }

    #[test]
    fn non_looping_source_stops_after_exhaustion() {
        let mut voice = voice_with(Default::default(), SampleBuffer::constant(1.0, 10));
        promote_to_playing(&mut voice);

        let mut scratch = vec![0.0f32; 20 * CHANNEL_COUNT];
        let state = voice.mix(ChannelState::Playing, &mut scratch, 20);
        assert!(matches!(state, ChannelState::Stopping | ChannelState::Stopped));
    }

    #[test]
    fn stopping_fades_to_stopped_within_one_buffer() {
        let mut voice = voice_with(
            AudioChannelProps {
                volume: 1.0,
                ..Default::default()
            },
            SampleBuffer::constant(1.0, 1_000_000),
        );
        promote_to_playing(&mut voice);

        let mut scratch = vec![0.0f32; AUDIO_BUFFER_SIZE * CHANNEL_COUNT];
        voice.mix(ChannelState::Playing, &mut scratch, AUDIO_BUFFER_SIZE);

        voice.fade = 1.0;
        let state = voice.mix(ChannelState::Stopping, &mut scratch, AUDIO_BUFFER_SIZE);
        assert_eq!(state, ChannelState::Stopped);
    }

    #[test]
    fn loop_wraps_position_modulo_source_length() {
        let mut voice = voice_with(
            AudioChannelProps {
                volume: 1.0,
                loop_enabled: true,
                ..Default::default()
            },
            SampleBuffer::constant(1.0, 100),
        );
        promote_to_playing(&mut voice);

        let mut scratch = vec![0.0f32; 1024 * CHANNEL_COUNT];
        let state = voice.mix(ChannelState::Playing, &mut scratch, 1024);

        assert_eq!(state, ChannelState::Playing);
        assert_eq!(voice.current.position, 1024 % 100);
    }

    #[test]
    fn virtualizing_advances_position_but_writes_silence() {
        let mut voice = voice_with(
            AudioChannelProps {
                volume: 1.0,
                ..Default::default()
            },
            SampleBuffer::constant(1.0, 1_000_000),
        );
        promote_to_playing(&mut voice);

        let mut scratch = vec![0.0f32; 256 * CHANNEL_COUNT];
        voice.mix(ChannelState::Playing, &mut scratch, 256); // burn the ramp-in

        let position_before = voice.current.position;
        let state = voice.mix(ChannelState::Virtualizing, &mut scratch, 256);

        assert_eq!(state, ChannelState::Virtualizing);
        assert_eq!(voice.current.position, position_before + 256);
        assert!(scratch.iter().all(|&s| s == 0.0));
    }
}
