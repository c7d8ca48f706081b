//! The device callback: sums every mixable channel into the output buffer.
//!
//! This is the lock-held, allocation-free hot path. It is a
//! pure function of the *playing* table and the engine-owned scratch buffer
//! handed to it — no channel is ever skipped for reasons other than its
//! state or `enabled` flag, and no allocation happens here regardless of how
//! many channels are playing.

use crate::channel::ChannelTable;
use crate::CHANNEL_COUNT;

/// Mix every channel in `playing` into `output`.
///
/// `output` must hold exactly `frame_count * CHANNEL_COUNT` samples.
/// `scratch` is reused as working space for each channel's chunk and must be
/// at least `CHANNEL_COUNT` samples long; it does not need to be as large as
/// `output` — channels are drawn in chunks of at most `scratch.len() /
/// CHANNEL_COUNT` frames at a time.
pub(crate) fn mix(playing: &mut ChannelTable, scratch: &mut [f32], output: &mut [f32], frame_count: usize) {
    debug_assert_eq!(output.len(), frame_count * CHANNEL_COUNT);
    output.fill(0.0);

    let scratch_frames = scratch.len() / CHANNEL_COUNT;
    if scratch_frames == 0 {
        return;
    }

    for channel in playing.iter_mut() {
        if !channel.state().is_mixable() {
            continue;
        }

        let mut produced = 0;
        while channel.is_enabled() && produced < frame_count {
            let chunk_frames = (frame_count - produced).min(scratch_frames);
            let scratch_chunk = &mut scratch[..chunk_frames * CHANNEL_COUNT];
            scratch_chunk.fill(0.0);

            channel.mix_into(scratch_chunk, chunk_frames);

            let out_offset = produced * CHANNEL_COUNT;
            let out_chunk = &mut output[out_offset..out_offset + chunk_frames * CHANNEL_COUNT];
            for (o, s) in out_chunk.iter_mut().zip(scratch_chunk.iter()) {
                *o += s;
            }

            produced += chunk_frames;
        }
    }
}
