//! The resource-bookkeeping collaborator: resolves a sound name to decoded
//! audio. Loading/unloading assets by name lives outside this crate; this
//! trait is the seam a host provides it through.

use std::sync::Arc;

use crate::decoded::DecodedAudio;

/// Resolves sound names to already-decoded, already-resampled audio.
///
/// A `play("explosion")` call against [`crate::host::ScriptAudio`] fails
/// silently when `resolve` returns `None` — there is no exceptional control
/// flow at this boundary.
pub trait SoundRegistry {
    fn resolve(&self, name: &str) -> Option<Arc<dyn DecodedAudio>>;
}

#[cfg(test)]
pub(crate) struct MapRegistry {
    sounds: std::collections::HashMap<String, Arc<dyn DecodedAudio>>,
}

#[cfg(test)]
impl MapRegistry {
    pub(crate) fn new() -> Self {
        Self {
            sounds: std::collections::HashMap::new(),
        }
    }

    pub(crate) fn with(mut self, name: &str, audio: Arc<dyn DecodedAudio>) -> Self {
        self.sounds.insert(name.to_string(), audio);
        self
    }
}

#[cfg(test)]
impl SoundRegistry for MapRegistry {
    fn resolve(&self, name: &str) -> Option<Arc<dyn DecodedAudio>> {
        self.sounds.get(name).cloned()
    }
}
