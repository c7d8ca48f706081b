//! The Channel interface: per-voice state and the pending/playing table
//!
//! A [`Channel`] is the generic, polymorphic record the mixer walks. Its
//! `mix`/`update`/`finish` triple is supplied by a concrete [`ChannelVoice`]
//! implementation (see [`crate::audio_channel::AudioChannel`]) rather than by
//! raw function pointers plus a `void*` userdata, the way a language without
//! trait objects would express it — the `Box<dyn ChannelVoice>` is the
//! userdata, and dropping it is the resource release.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Monotonically increasing channel identifier. Zero is reserved for "no
/// channel" and is never returned by [`crate::engine::Engine::channel_init`].
pub type ChannelId = u64;

/// Opaque handle returned to a caller when a channel is created.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ChannelRef {
    pub id: ChannelId,
}

impl ChannelRef {
    /// The sentinel reference returned when a channel could not be created
    /// (e.g. an unknown sound name).
    pub const NONE: ChannelRef = ChannelRef { id: 0 };

    pub fn is_valid(self) -> bool {
        self.id != 0
    }
}

/// Where a channel sits in its lifecycle.
///
/// Transitions only ever move down this list; `Last` is terminal.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ChannelState {
    Initialize,
    Devirtualize,
    Playing,
    Stopping,
    Stopped,
    Virtualizing,
    Last,
}

impl ChannelState {
    /// Whether the mixer should walk this channel at all.
    pub fn is_mixable(self) -> bool {
        matches!(
            self,
            ChannelState::Playing | ChannelState::Stopping | ChannelState::Virtualizing
        )
    }
}

/// Polymorphism surface for a channel's sample source.
///
/// Concrete sources (decoded-buffer playback, a streaming source, a
/// synthesized tone) implement this trio instead of subclassing, the way a
/// dynamically-dispatched language would. `userdata` is simply whatever
/// fields the implementor holds; it is dropped when [`Self::finish`] consumes
/// the box.
pub trait ChannelVoice: Send {
    /// Write exactly `frame_count` interleaved stereo frames into `scratch`.
    /// Called only while the channel's state is `Playing`, `Stopping` or
    /// `Virtualizing`. A `Virtualizing` voice still advances its own
    /// position/fade bookkeeping but must write silence. Returns the
    /// channel's next state.
    ///
    /// Must not allocate, lock, or block — it runs on the device thread
    /// inside the mixer's critical section.
    fn mix(&mut self, state: ChannelState, scratch: &mut [f32], frame_count: usize) -> ChannelState;

    /// Runs on the control thread, under the device lock, once per
    /// [`crate::engine::Engine::update`] tick. Returns the channel's next
    /// state.
    fn update(&mut self, state: ChannelState, stop_requested: bool) -> ChannelState;

    /// Runs on the control thread once the channel has reached `Stopped`.
    /// Consumes the voice so any owned resources (decoded-audio handle,
    /// sound id) drop here, not on the device thread.
    fn finish(self: Box<Self>);

    /// Optional control-plane property surface. Voices that expose tunable
    /// parameters (volume, pan, ...) override these; the default is a no-op
    /// so [`ChannelVoice`] stays usable for sources that have none.
    fn set_volume(&mut self, _volume: f32) {}
    fn set_pan(&mut self, _pan: f32) {}
}

/// The monotonic, lock-free flags a channel exposes to the control thread
/// even while it lives in the locked *playing* table.
///
/// `stop_requested` only ever flips false→true; `enabled` can flip either way
/// but a stale read by the device thread just defers the effect by one
/// buffer.
pub(crate) struct ChannelControl {
    enabled: AtomicBool,
    stop_requested: AtomicBool,
}

impl ChannelControl {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            enabled: AtomicBool::new(true),
            stop_requested: AtomicBool::new(false),
        })
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub(crate) fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Relaxed);
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Relaxed)
    }
}

/// An active voice being mixed: a record carrying state, the monotonic
/// control flags, and the voice's callback triple.
pub struct Channel {
    id: ChannelId,
    state: ChannelState,
    control: Arc<ChannelControl>,
    voice: Option<Box<dyn ChannelVoice>>,
    finished: bool,
}

impl Channel {
    pub(crate) fn new(id: ChannelId, control: Arc<ChannelControl>, voice: Box<dyn ChannelVoice>) -> Self {
        Self {
            id,
            state: ChannelState::Initialize,
            control,
            voice: Some(voice),
            finished: false,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.control.is_enabled()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.control.set_enabled(enabled);
    }

    pub fn stop_requested(&self) -> bool {
        self.control.stop_requested()
    }

    pub fn set_volume(&mut self, volume: f32) {
        if let Some(voice) = &mut self.voice {
            voice.set_volume(volume);
        }
    }

    pub fn set_pan(&mut self, pan: f32) {
        if let Some(voice) = &mut self.voice {
            voice.set_pan(pan);
        }
    }

    /// Overrides the channel's state directly, bypassing the voice's own
    /// `update`/`mix` transitions. Used by engine-level policy (e.g.
    /// virtualize/devirtualize) rather than by a voice's own lifecycle.
    pub(crate) fn force_state(&mut self, state: ChannelState) {
        self.state = state;
    }

    /// Runs on the device thread, inside the mixer's critical section.
    pub(crate) fn mix_into(&mut self, scratch: &mut [f32], frame_count: usize) {
        let voice = self.voice.as_mut().expect("voice missing before finish()");
        self.state = voice.mix(self.state, scratch, frame_count);
    }

    /// Runs on the control thread, under the device lock.
    pub(crate) fn run_update(&mut self) {
        let stop_requested = self.stop_requested();
        let voice = self.voice.as_mut().expect("voice missing before finish()");
        self.state = voice.update(self.state, stop_requested);
    }

    /// Consumes the channel, releasing the voice's resources. Runs on the
    /// control thread after the channel reached `Stopped`.
    pub(crate) fn finish(mut self) {
        self.finished = true;
        if let Some(voice) = self.voice.take() {
            voice.finish();
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if !self.finished {
            log::warn!(
                "channel {} dropped without reaching finish(); its voice's resources leak per the engine's resource contract",
                self.id
            );
        }
    }
}

/// Mapping from channel id to channel record.
///
/// Backed by a `HashMap`; `insert`/`get`/`remove` are O(1) amortized and
/// `absorb` drains one table into another without per-entry allocation.
#[derive(Default)]
pub struct ChannelTable {
    channels: HashMap<ChannelId, Channel>,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, channel: Channel) {
        self.channels.insert(channel.id(), channel);
    }

    pub fn get(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(&id)
    }

    pub fn get_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.get_mut(&id)
    }

    pub fn remove(&mut self, id: ChannelId) -> Option<Channel> {
        self.channels.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.channels.values_mut()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Moves every entry out of `src` into `self`. Keys already present in
    /// `self` are overwritten, which cannot occur under the engine's
    /// id-uniqueness invariant.
    pub fn absorb(&mut self, src: &mut ChannelTable) {
        self.channels.extend(src.channels.drain());
    }

    /// Releases the table's backing storage. Does **not** run `finish` on any
    /// remaining record — that is the caller's job (see
    /// [`crate::engine::Engine::update`], which always drains to empty before
    /// calling this).
    pub(crate) fn release_storage(&mut self) {
        self.channels = HashMap::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullVoice;
    impl ChannelVoice for NullVoice {
        fn mix(&mut self, state: ChannelState, scratch: &mut [f32], _frame_count: usize) -> ChannelState {
            scratch.fill(0.0);
            state
        }
        fn update(&mut self, state: ChannelState, _stop_requested: bool) -> ChannelState {
            state
        }
        fn finish(self: Box<Self>) {}
    }

    fn make_channel(id: ChannelId) -> Channel {
        Channel::new(id, ChannelControl::new(), Box::new(NullVoice))
    }

    #[test]
    fn table_insert_get_remove() {
        let mut table = ChannelTable::new();
        table.insert(make_channel(1));
        assert!(table.get(1).is_some());
        assert_eq!(table.len(), 1);

        let removed = table.remove(1).unwrap();
        assert_eq!(removed.id(), 1);
        assert!(table.get(1).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn absorb_drains_source_into_destination() {
        let mut pending = ChannelTable::new();
        pending.insert(make_channel(1));
        pending.insert(make_channel(2));

        let mut playing = ChannelTable::new();
        playing.absorb(&mut pending);

        assert!(pending.is_empty());
        assert_eq!(playing.len(), 2);
        assert!(playing.get(1).is_some());
        assert!(playing.get(2).is_some());
    }

    #[test]
    fn stop_requested_is_monotonic() {
        let channel = make_channel(7);
        assert!(!channel.stop_requested());
        channel.control.request_stop();
        assert!(channel.stop_requested());
        // a second request is a no-op, still true
        channel.control.request_stop();
        assert!(channel.stop_requested());
    }

    #[test]
    fn disabled_channel_reports_disabled() {
        let channel = make_channel(3);
        assert!(channel.is_enabled());
        channel.set_enabled(false);
        assert!(!channel.is_enabled());
    }

    #[test]
    fn finishing_suppresses_leak_warning() {
        // exercised for coverage of the consuming path; the log output isn't
        // asserted on, but finish() must not panic on a channel with a voice.
        let channel = make_channel(9);
        channel.finish();
    }

    #[test]
    fn dropping_without_finish_logs_a_leak_warning() {
        crate::init_test_logging();
        // no call to finish(): Drop should log, not panic.
        drop(make_channel(11));
    }

    #[test]
    fn channel_state_is_mixable() {
        assert!(ChannelState::Playing.is_mixable());
        assert!(ChannelState::Stopping.is_mixable());
        assert!(ChannelState::Virtualizing.is_mixable());
        assert!(!ChannelState::Initialize.is_mixable());
        assert!(!ChannelState::Stopped.is_mixable());
        assert!(!ChannelState::Last.is_mixable());
    }
}
