//! A real-time audio mixing engine: the bridge between a scripting layer and
//! a host output device.
//!
//! The three tightly coupled concerns this crate exists to get right are the
//! allocation-free [`mixer`] callback, the [`channel`] lifecycle state
//! machine, and the pending/playing table discipline that lets new channels
//! register without ever blocking the audio thread. See [`engine::Engine`]
//! for the control-plane entry point, or [`host::ScriptAudio`] for the
//! higher-level surface a scripting VM would bind against.

pub mod audio_channel;
pub mod channel;
pub mod decoded;
mod device;
pub mod engine;
pub mod error;
pub mod host;
pub mod mixer;
pub mod registry;

/// Output buffer size, in frames. Fixed at compile time.
pub const AUDIO_BUFFER_SIZE: usize = 1024;

/// Stereo output only; arbitrary channel counts are an explicit non-goal.
pub const CHANNEL_COUNT: usize = 2;

/// Fixed device sample rate. Resampling is out of scope: sources must
/// already be encoded at this rate.
pub const SAMPLE_RATE_HZ: u32 = 44_100;

use channel::ChannelTable;

/// State shared between the control thread and the device callback, held
/// behind a single lock.
pub(crate) struct Shared {
    pub(crate) playing: ChannelTable,
    pub(crate) scratch: Vec<f32>,
}

/// Test-only logging setup shared by every module's `#[cfg(test)] mod
/// tests`, so `RUST_LOG=debug cargo test -- --nocapture` shows the
/// engine/mixer/channel `log` output instead of swallowing it.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
