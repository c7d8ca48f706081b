//! The scripting/host surface. A thin, stateless-except-for-the-engine
//! wrapper that turns sound names into channels and forwards the rest
//! straight to [`Engine`].

use std::sync::Arc;

use crate::audio_channel::{AudioChannel, AudioChannelProps};
use crate::channel::ChannelRef;
use crate::engine::Engine;
use crate::error::MixerResult;
use crate::registry::SoundRegistry;

/// Default volume/pan applied by the bare `play(name)` form.
pub const DEFAULT_VOLUME: f32 = 0.5;
pub const DEFAULT_PAN: f32 = 0.0;

/// Bridges a [`SoundRegistry`] (name → decoded audio) and an [`Engine`]
/// (lifecycle) into the single surface a scripting VM binds against.
///
/// `load`/`unload`/`unloadAll` are the registry's job, not this type's.
pub struct ScriptAudio<R> {
    engine: Engine,
    registry: R,
}

impl<R: SoundRegistry> ScriptAudio<R> {
    pub fn new(engine: Engine, registry: R) -> Self {
        Self { engine, registry }
    }

    /// `play(name)`: default volume and pan.
    pub fn play(&mut self, name: &str) -> ChannelRef {
        self.play_with_volume(name, DEFAULT_VOLUME)
    }

    /// `play(name, volume)`: default pan.
    pub fn play_with_volume(&mut self, name: &str, volume: f32) -> ChannelRef {
        self.play_with(name, volume, DEFAULT_PAN)
    }

    /// `play(name, volume, pan)`. Returns [`ChannelRef::NONE`] and logs a
    /// warning if `name` is not in the registry — there is no exceptional
    /// control flow here.
    pub fn play_with(&mut self, name: &str, volume: f32, pan: f32) -> ChannelRef {
        let Some(audio) = self.registry.resolve(name) else {
            log::warn!("play: unknown sound {name:?}");
            return ChannelRef::NONE;
        };

        let props = AudioChannelProps {
            volume: volume.clamp(0.0, 1.0),
            pan: pan.clamp(-1.0, 1.0),
            ..Default::default()
        };
        let voice = AudioChannel::new(name, audio, props);
        self.engine.channel_init(Box::new(voice))
    }

    pub fn stop_channel(&self, channel: ChannelRef) {
        self.engine.stop(channel);
    }

    pub fn stop_all_channels(&self) {
        self.engine.stop_all();
    }

    pub fn set_channel_volume(&mut self, channel: ChannelRef, volume: f32) {
        self.engine.set_channel_volume(channel, volume);
    }

    pub fn set_channel_pan(&mut self, channel: ChannelRef, pan: f32) {
        self.engine.set_channel_pan(channel, pan);
    }

    pub fn is_playing(&self, channel: ChannelRef) -> bool {
        channel.is_valid() && self.engine.is_playing(channel.id)
    }

    /// Called once per host frame; drives the control-plane `update`.
    pub fn update(&mut self) {
        self.engine.update();
    }
}

impl<R: SoundRegistry> ScriptAudio<R> {
    /// Convenience constructor that also opens the device.
    pub fn init(registry: R) -> MixerResult<Self> {
        Ok(Self::new(Engine::init()?, registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoded::SampleBuffer;
    use crate::registry::MapRegistry;

    fn registry() -> MapRegistry {
        MapRegistry::new().with("tone", Arc::new(SampleBuffer::constant(1.0, 4096)))
    }

    #[test]
    fn play_unknown_sound_returns_sentinel_ref() {
        crate::init_test_logging();
        let mut audio = ScriptAudio::init(registry()).unwrap();
        let ch = audio.play("missing");
        assert!(!ch.is_valid());
        assert!(!audio.is_playing(ch));
    }

    #[test]
    fn play_known_sound_is_reported_playing_after_update() {
        let mut audio = ScriptAudio::init(registry()).unwrap();
        let ch = audio.play("tone");
        assert!(ch.is_valid());

        audio.update();
        assert!(audio.is_playing(ch));
    }

    #[test]
    fn dead_channel_setters_are_no_ops() {
        let mut audio = ScriptAudio::init(registry()).unwrap();
        let dead = ChannelRef { id: 424242 };
        audio.set_channel_volume(dead, 1.0);
        audio.set_channel_pan(dead, -1.0);
        audio.stop_channel(dead);
        assert!(!audio.is_playing(dead));
    }
}
