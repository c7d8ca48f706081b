//! The control plane: channel lifecycle, pending/playing promotion, and the
//! device lifecycle operations exposed to the host.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

#[cfg(not(test))]
use cpal::traits::StreamTrait;

use crate::channel::{Channel, ChannelControl, ChannelId, ChannelRef, ChannelState, ChannelTable, ChannelVoice};
use crate::error::MixerResult;
use crate::{Shared, AUDIO_BUFFER_SIZE, CHANNEL_COUNT};

#[cfg(not(test))]
use crate::device;

/// Owns the device, the scratch buffer, and both channel tables.
///
/// *Playing*, together with the scratch buffer, lives behind a single lock
/// shared with the device callback; *pending* and the per-channel
/// [`ChannelControl`] index are control-thread-private and never touch that
/// lock — `channel_init`, `stop` and `stop_all` are lock-free by
/// construction, not by accident.
pub struct Engine {
    shared: Arc<Mutex<Shared>>,
    pending: ChannelTable,
    controls: HashMap<ChannelId, Arc<ChannelControl>>,
    next_id: ChannelId,
    #[cfg(not(test))]
    stream: Option<cpal::Stream>,
}

impl Engine {
    /// Opens the default output device and allocates the scratch buffer.
    /// Fails with [`crate::error::MixerError::DeviceUnavailable`] if no
    /// device can be opened; the engine is not constructed in that case.
    #[cfg(not(test))]
    pub fn init() -> MixerResult<Self> {
        let shared = Arc::new(Mutex::new(Shared {
            playing: ChannelTable::new(),
            scratch: vec![0.0; AUDIO_BUFFER_SIZE * CHANNEL_COUNT],
        }));

        let stream = device::open_output_stream(Arc::clone(&shared))?;

        Ok(Self {
            shared,
            pending: ChannelTable::new(),
            controls: HashMap::new(),
            next_id: 1,
            stream: Some(stream),
        })
    }

    /// In tests, construct an engine with no real output device so unit and
    /// property tests can drive `update`/`mix` without touching hardware.
    #[cfg(test)]
    pub fn init() -> MixerResult<Self> {
        let shared = Arc::new(Mutex::new(Shared {
            playing: ChannelTable::new(),
            scratch: vec![0.0; AUDIO_BUFFER_SIZE * CHANNEL_COUNT],
        }));

        Ok(Self {
            shared,
            pending: ChannelTable::new(),
            controls: HashMap::new(),
            next_id: 1,
        })
    }

    /// Allocates a channel id and stores the record in *pending*, state
    /// `Initialize`. Does not lock the device.
    pub fn channel_init(&mut self, voice: Box<dyn ChannelVoice>) -> ChannelRef {
        let id = self.next_id;
        self.next_id += 1;

        let control = ChannelControl::new();
        self.controls.insert(id, Arc::clone(&control));
        self.pending.insert(Channel::new(id, control, voice));

        ChannelRef { id }
    }

    /// Looks up `ref.id`, first in *pending* then in *playing*. Returns
    /// `false` for id `0` or a dead id.
    pub fn is_playing(&self, id: ChannelId) -> bool {
        if id == 0 {
            return false;
        }
        if self.pending.get(id).is_some() {
            return true;
        }
        self.shared.lock().playing.get(id).is_some()
    }

    /// Looks up a channel by reference, first in *pending* then in
    /// *playing*. A *pending* hit borrows directly; a *playing* hit holds
    /// the device lock for as long as the returned guard lives, since the
    /// record lives behind it. Returns `None` for id `0` or a dead id.
    pub fn get(&self, channel: ChannelRef) -> Option<ChannelLookup<'_>> {
        if channel.id == 0 {
            return None;
        }
        if self.pending.get(channel.id).is_some() {
            return Some(ChannelLookup(ChannelLookupInner::Pending(self, channel.id)));
        }
        let guard = self.shared.lock();
        if guard.playing.get(channel.id).is_some() {
            Some(ChannelLookup(ChannelLookupInner::Playing(guard, channel.id)))
        } else {
            None
        }
    }

    /// Acquires the device's callback-exclusion lock directly, suspending
    /// the mixer callback for as long as the returned guard is held. Drop
    /// the guard (or call [`EngineLock::unlock`]) to let the callback
    /// resume.
    pub fn lock(&self) -> EngineLock<'_> {
        EngineLock {
            guard: self.shared.lock(),
        }
    }

    /// Moves *pending* into *playing*, runs every channel's `update`, and
    /// finalizes any channel that reached `Stopped` — all under the device
    /// lock.
    pub fn update(&mut self) {
        let mut shared = self.shared.lock();

        shared.playing.absorb(&mut self.pending);
        self.pending.release_storage();

        let mut finished = Vec::new();
        for channel in shared.playing.iter_mut() {
            channel.run_update();
            if channel.state() == ChannelState::Stopped {
                finished.push(channel.id());
            }
        }

        for id in finished {
            if let Some(channel) = shared.playing.remove(id) {
                channel.finish();
            }
            self.controls.remove(&id);
        }
    }

    /// Requests a cooperative stop. Idempotent; a no-op for an unknown or
    /// dead id. Does not take the device lock: `stopRequested` is a
    /// monotonic flag the channel's own control handle carries.
    pub fn stop(&self, channel: ChannelRef) {
        if let Some(control) = self.controls.get(&channel.id) {
            control.request_stop();
        }
    }

    /// Requests a stop on every live channel, pending or playing.
    pub fn stop_all(&self) {
        for control in self.controls.values() {
            control.request_stop();
        }
    }

    pub fn set_channel_volume(&mut self, channel: ChannelRef, volume: f32) {
        self.with_channel_mut(channel.id, |c| c.set_volume(volume));
    }

    pub fn set_channel_pan(&mut self, channel: ChannelRef, pan: f32) {
        self.with_channel_mut(channel.id, |c| c.set_pan(pan));
    }

    pub fn set_channel_enabled(&mut self, channel: ChannelRef, enabled: bool) {
        if let Some(c) = self.pending.get(channel.id) {
            c.set_enabled(enabled);
            return;
        }
        if let Some(c) = self.shared.lock().playing.get(channel.id) {
            c.set_enabled(enabled);
        }
    }

    fn with_channel_mut(&mut self, id: ChannelId, f: impl FnOnce(&mut Channel)) {
        if let Some(c) = self.pending.get_mut(id) {
            f(c);
            return;
        }
        if let Some(c) = self.shared.lock().playing.get_mut(id) {
            f(c);
        }
    }

    /// Suspends device callbacks without closing the device.
    #[cfg(not(test))]
    pub fn pause(&self) {
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                log::warn!("failed to pause output stream: {e}");
            }
        }
    }

    /// Resumes a previously paused device.
    #[cfg(not(test))]
    pub fn resume(&self) {
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.play() {
                log::warn!("failed to resume output stream: {e}");
            }
        }
    }

    #[cfg(test)]
    pub fn pause(&self) {}
    #[cfg(test)]
    pub fn resume(&self) {}

    /// Pauses and closes the device. Failures here are already terminal and
    /// are swallowed.
    pub fn halt(&mut self) {
        #[cfg(not(test))]
        {
            self.stream.take();
        }
    }

    /// Halts, releases the scratch buffer, and frees both tables. Channels
    /// that never reached `finish` leak their voice's resources; that is the
    /// caller's responsibility to have avoided.
    pub fn free(&mut self) {
        self.halt();
        self.pending.release_storage();
        let mut shared = self.shared.lock();
        shared.playing.release_storage();
        shared.scratch = Vec::new();
        self.controls.clear();
    }

    /// Moves a channel out of the mix budget without removing it from the
    /// lifecycle: it keeps ticking but stops contributing samples. Policy
    /// for *which* channel to evict is left to the caller.
    pub fn virtualize(&mut self, channel: ChannelRef) {
        self.set_state(channel.id, ChannelState::Virtualizing);
    }

    /// Reverses [`Self::virtualize`], restoring a channel to `Playing`.
    pub fn devirtualize(&mut self, channel: ChannelRef) {
        self.set_state(channel.id, ChannelState::Playing);
    }

    fn set_state(&mut self, id: ChannelId, state: ChannelState) {
        let mut shared = self.shared.lock();
        if let Some(channel) = shared.playing.get_mut(id) {
            channel.force_state(state);
        }
    }
}

/// A channel found by [`Engine::get`]. Derefs to the looked-up [`Channel`];
/// a *playing* hit holds the device lock for as long as this value lives.
pub struct ChannelLookup<'a>(ChannelLookupInner<'a>);

enum ChannelLookupInner<'a> {
    Pending(&'a Engine, ChannelId),
    Playing(MutexGuard<'a, Shared>, ChannelId),
}

impl std::ops::Deref for ChannelLookup<'_> {
    type Target = Channel;

    fn deref(&self) -> &Channel {
        match &self.0 {
            ChannelLookupInner::Pending(engine, id) => {
                engine.pending.get(*id).expect("channel present for lifetime of lookup")
            }
            ChannelLookupInner::Playing(guard, id) => {
                guard.playing.get(*id).expect("channel present for lifetime of lookup")
            }
        }
    }
}

/// A held device lock, acquired by [`Engine::lock`]. Dropping it (or calling
/// [`Self::unlock`]) releases the lock and lets the mixer callback resume.
pub struct EngineLock<'a> {
    guard: MutexGuard<'a, Shared>,
}

impl EngineLock<'_> {
    /// Releases the lock. Equivalent to dropping the guard.
    pub fn unlock(self) {}
}
