use std::sync::Arc;

use glam::Vec3;
use itertools::Itertools;
use log::{debug, info, trace, warn};
use serde::Serialize;
use volstream_manifest::typedefs::Manifest;

use crate::asset::decode_buffer::DecodeBuffer;
use crate::asset::decoder::SegmentPlacement;
use crate::asset::frame::{Aabb, DecodedFrame, DecodedSegment, TIME_EPSILON};
use crate::asset::state::{AssetState, AssetStateMachine};
use crate::errors::AssetError;

/// Used for stepping when no decoded track advertises a frame rate.
const DEFAULT_FRAME_RATE: f32 = 30.0;

/// The representation currently fetched for one adaptation set, as published by the streamer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveTrack {
    pub adaptation_set: String,
    pub mime_type: String,
    pub codec: String,
    pub representation: String,
    pub bandwidth: u32,
    pub max_fps: f32,
    /// False for passthrough tracks that only reach the data callback.
    pub decoded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOutcome {
    /// Nothing moved (invalid asset, or no seek was needed).
    Ignored,
    /// Remembered until the manifest is resolved.
    Deferred,
    /// The target lies inside the buffered range, nothing was discarded.
    Retained,
    /// The buffer was emptied, everything in flight is moot.
    Reset,
}

#[derive(Serialize)]
struct LayerMeta<'a> {
    adaptation_set: &'a str,
    representation: &'a str,
    bytes: usize,
}

#[derive(Serialize)]
struct FrameMeta<'a> {
    time: f64,
    stream_time: f64,
    segment: u64,
    voxel_count: u32,
    bounds: Option<Aabb>,
    layers: Vec<LayerMeta<'a>>,
}

#[derive(Serialize)]
struct TrackMeta<'a> {
    duration: f64,
    segment_duration: f64,
    segment_count: u32,
    looping: bool,
    adaptation_sets: Vec<AdaptationSetMeta<'a>>,
}

#[derive(Serialize)]
struct AdaptationSetMeta<'a> {
    id: &'a str,
    mime_type: &'a str,
    codec: &'a str,
    representations: Vec<RepresentationMeta<'a>>,
    active: Option<&'a ActiveTrack>,
}

#[derive(Serialize)]
struct RepresentationMeta<'a> {
    id: &'a str,
    bandwidth: u32,
    max_fps: f32,
}

/// The playback state of one asset: position, loop flag, decode buffer and state bits.
///
/// Positions come in two flavours. The asset time (`current_time`) lies in `[0, duration]`, while the stream time
/// keeps counting across loops (`loop_index * duration + current_time`) and is what the decode buffer is keyed by.
/// This keeps the buffered tail of one loop and the head of the next in a single ordered timeline.
#[derive(Debug)]
pub struct AssetCore {
    state: AssetStateMachine,
    buffer: DecodeBuffer,
    manifest: Option<Arc<Manifest>>,
    tracks: Vec<ActiveTrack>,
    duration: f64,
    bounds: Option<Aabb>,
    looping: bool,
    play_requested: bool,
    pending_seek: Option<f64>,
    time: f64,
    loop_index: u64,
    last_update: Option<f64>,
    error: Option<AssetError>,
    segments_received: u64,
}

impl AssetCore {
    pub fn new(buffer_time: f64, back_window: f64) -> Self {
        Self {
            state: AssetStateMachine::default(),
            buffer: DecodeBuffer::new(buffer_time, back_window),
            manifest: None,
            tracks: Vec::new(),
            duration: 0.0,
            bounds: None,
            looping: false,
            play_requested: false,
            pending_seek: None,
            time: 0.0,
            loop_index: 0,
            last_update: None,
            error: None,
            segments_received: 0,
        }
    }

    pub fn state(&self) -> AssetState {
        self.state.state()
    }

    pub fn is_invalid(&self) -> bool {
        self.state.is_invalid()
    }

    pub fn is_initialising(&self) -> bool {
        self.state.is_initialising()
    }

    pub fn error(&self) -> Option<&AssetError> {
        self.error.as_ref()
    }

    pub fn buffer(&self) -> &DecodeBuffer {
        &self.buffer
    }

    pub fn manifest(&self) -> Option<&Arc<Manifest>> {
        self.manifest.as_ref()
    }

    pub fn tracks(&self) -> &[ActiveTrack] {
        &self.tracks
    }

    /// Unknown until the manifest is resolved.
    pub fn duration(&self) -> Option<f64> {
        self.manifest.as_ref().map(|_| self.duration)
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn segments_received(&self) -> u64 {
        self.segments_received
    }

    /// Position inside the asset. Never reaches the duration while looping.
    pub fn current_time(&self) -> f64 {
        self.time
    }

    pub fn loop_index(&self) -> u64 {
        self.loop_index
    }

    fn loop_base(&self) -> f64 {
        self.loop_index as f64 * self.duration
    }

    pub fn stream_time(&self) -> f64 {
        self.loop_base() + self.time
    }

    pub fn fill_ratio(&self) -> f64 {
        if self.state.is_invalid() {
            return 0.0;
        }
        self.buffer.fill_ratio()
    }

    pub fn presentable_frame(&self) -> Option<Arc<DecodedFrame>> {
        if self.state.is_invalid() {
            return None;
        }
        self.buffer.frame_at(self.stream_time())
    }

    /// Asset time of the frame that would be presented right now.
    pub fn decode_time(&self) -> Option<f64> {
        self.presentable_frame().map(|frame| frame.asset_time)
    }

    pub fn voxel_count(&self) -> u32 {
        self.presentable_frame().map(|frame| frame.voxel_count).unwrap_or(0)
    }

    pub fn frame_rate(&self) -> f32 {
        self.tracks
            .iter()
            .find(|track| track.decoded)
            .map(|track| track.max_fps)
            .unwrap_or(DEFAULT_FRAME_RATE)
    }

    /// Returns true only for the call that actually invalidated the asset.
    pub fn invalidate(&mut self, error: AssetError) -> bool {
        if !self.state.invalidate() {
            return false;
        }

        warn!("Asset invalid: {}", error);
        self.error = Some(error);
        self.play_requested = false;
        self.buffer.discard_all();
        true
    }

    /// Makes duration, bounds and the segment layout known. A seek issued while initialising takes effect here.
    pub fn resolve(&mut self, manifest: Arc<Manifest>, tracks: Vec<ActiveTrack>) {
        self.duration = manifest.duration;
        self.bounds = manifest.bounds.as_ref().map(|bounds| {
            Aabb::from_center_half_dims(Vec3::from_array(bounds.center.0), Vec3::from_array(bounds.half_dims.0))
        });
        self.manifest = Some(manifest);
        self.tracks = tracks;

        if let Some(target) = self.pending_seek.take() {
            let time = self.clamp_seek_target(target);
            debug!("Applying the seek to {:.3} requested during initialisation", time);
            self.loop_index = 0;
            self.time = time;
            self.buffer.reset(self.stream_time());
        }
    }

    pub fn set_tracks(&mut self, tracks: Vec<ActiveTrack>) {
        self.tracks = tracks;
    }

    /// Returns true exactly once, when the first buffered data makes the asset ready.
    pub fn try_mark_ready(&mut self) -> bool {
        if !self.state.is_initialising() || self.manifest.is_none() || self.buffer.fill_ratio() <= 0.0 {
            return false;
        }

        self.state.mark_ready();
        info!("Asset ready, {} tracks, {:.3}s", self.tracks.len(), self.duration);
        if self.play_requested {
            self.state.set_playing(true);
        }
        self.refresh_status();
        true
    }

    pub fn set_offline(&mut self, offline: bool) {
        if self.state.set_offline(offline) {
            info!("Asset {}", if offline { "went offline" } else { "is back online" });
        }
        self.refresh_status();
    }

    /// Hands a decoded segment to the buffer. Returns false if it no longer fits the retained window.
    pub fn push_segment(&mut self, segment: DecodedSegment) -> bool {
        if self.state.is_invalid() {
            return false;
        }

        self.segments_received += 1;
        let admitted = self.buffer.push(segment);
        self.refresh_status();
        admitted
    }

    /// Seek targets outside of the asset are clamped: negative to 0, past the end to the end, or wrapped around
    /// for looping assets. Callers reject non finite targets before.
    fn clamp_seek_target(&self, target: f64) -> f64 {
        let time = target.max(0.0);
        if self.looping && time >= self.duration {
            time % self.duration
        } else {
            time.min(self.duration)
        }
    }

    fn set_stream_position(&mut self, position: f64) {
        let mut loop_index = ((position + TIME_EPSILON) / self.duration).floor().max(0.0) as u64;
        let mut time = position - loop_index as f64 * self.duration;

        if !self.looping && loop_index > self.loop_index {
            // the end of a non looping asset belongs to the loop it ends
            loop_index = self.loop_index;
            time = self.duration;
        }

        self.loop_index = loop_index;
        self.time = time.clamp(0.0, self.duration);
    }

    pub fn seek(&mut self, target: f64) -> Result<SeekOutcome, AssetError> {
        if self.state.is_invalid() {
            return Ok(SeekOutcome::Ignored);
        }

        if !target.is_finite() {
            let error = AssetError::SeekOutOfRange { target };
            self.invalidate(error.clone());
            return Err(error);
        }

        if self.manifest.is_none() {
            self.pending_seek = Some(target);
            return Ok(SeekOutcome::Deferred);
        }

        let time = self.clamp_seek_target(target);
        let base = self.loop_base();
        let current = self.buffer.current();
        let horizon = self.buffer.highest_cached_time();

        let mut candidates = vec![base + time];
        if self.looping {
            // seeking "backwards" in a loop may land in the buffered head of the next one
            candidates.push(base + self.duration + time);
        }

        let retained = candidates
            .into_iter()
            .find(|candidate| *candidate >= current - TIME_EPSILON && *candidate <= horizon + TIME_EPSILON);

        let outcome = match retained {
            Some(position) => {
                self.set_stream_position(position);
                self.buffer.advance(self.stream_time());
                SeekOutcome::Retained
            }
            None => {
                self.set_stream_position(base + time);
                self.buffer.reset(self.stream_time());
                SeekOutcome::Reset
            }
        };

        debug!("Seek to {:.3} (clamped {:.3}): {:?}", target, time, outcome);
        self.state.set_seeking(true);
        self.refresh_status();
        Ok(outcome)
    }

    /// Applies the time elapsed since the previous call while playing. The first call only sets the reference.
    pub fn update(&mut self, absolute_time: f64) {
        let delta = match self.last_update.replace(absolute_time) {
            Some(previous) => absolute_time - previous,
            None => 0.0,
        };

        if delta.is_finite() && delta > 0.0 {
            self.advance_by(delta);
        } else {
            self.refresh_status();
        }
    }

    /// Moves the playback position forward, but never past the buffered data.
    pub fn advance_by(&mut self, delta: f64) {
        let state = self.state.state();
        if !state.is_ready() || !state.contains(AssetState::PLAYING) || state.contains(AssetState::SEEKING) {
            return;
        }

        let current = self.stream_time();
        let horizon = self.buffer.highest_cached_time().max(current);
        let mut target = (current + delta).min(horizon);
        if target < current + delta - TIME_EPSILON {
            trace!("Playback stalled at {:.3}, buffered up to {:.3}", current, horizon);
        }

        let end = self.loop_base() + self.duration;
        let finished = !self.looping && target >= end - TIME_EPSILON;
        if finished {
            target = end;
        }

        self.set_stream_position(target);
        self.buffer.advance(self.stream_time());

        if finished {
            info!("Reached the end of the asset");
            self.play_requested = false;
            self.state.set_playing(false);
        }
        self.refresh_status();
    }

    pub fn play(&mut self) -> SeekOutcome {
        if self.state.is_invalid() {
            return SeekOutcome::Ignored;
        }

        self.play_requested = true;
        if self.state.is_initialising() {
            return SeekOutcome::Ignored;
        }

        let mut outcome = SeekOutcome::Ignored;
        if !self.looping && self.time >= self.duration - TIME_EPSILON {
            // playing a finished asset starts over
            outcome = self.seek(0.0).unwrap_or(SeekOutcome::Ignored);
        }
        self.state.set_playing(true);
        outcome
    }

    pub fn pause(&mut self) {
        self.play_requested = false;
        self.state.set_playing(false);
    }

    pub fn stop(&mut self) -> SeekOutcome {
        self.pause();
        self.seek(0.0).unwrap_or(SeekOutcome::Ignored)
    }

    /// Pauses and moves by whole frames of the active frame rate.
    pub fn step(&mut self, frames: i32) -> SeekOutcome {
        self.pause();
        if self.state.is_initialising() || self.state.is_invalid() {
            return SeekOutcome::Ignored;
        }

        let target = self.time + frames as f64 / self.frame_rate() as f64;
        self.seek(target).unwrap_or(SeekOutcome::Ignored)
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
        if looping && self.manifest.is_some() && self.time >= self.duration {
            self.set_stream_position(self.stream_time());
        }
        self.refresh_status();
    }

    /// True once everything until the end, or one full loop for looping assets, is buffered.
    pub fn fully_cached(&self) -> bool {
        if self.manifest.is_none() {
            return false;
        }

        let end = if self.looping {
            self.stream_time() + self.duration
        } else {
            self.loop_base() + self.duration
        };
        self.buffer.highest_cached_time() >= end - TIME_EPSILON
    }

    /// Recomputes the bits derived from the buffer: `SEEKING` clears once the target has a frame, `CACHING` and
    /// `FULLY_CACHED` follow the fill level.
    pub fn refresh_status(&mut self) {
        let state = self.state.state();
        if !state.is_ready() {
            return;
        }

        if state.contains(AssetState::SEEKING) && self.buffer.has_frame(self.stream_time()) {
            self.state.set_seeking(false);
        }

        let fully_cached = self.fully_cached();
        let caching = !fully_cached && !state.contains(AssetState::OFFLINE) && self.buffer.fill_ratio() < 1.0;
        self.state.set_cache_status(caching, fully_cached);
    }

    pub fn segment_count(&self) -> u64 {
        self.manifest
            .as_ref()
            .map(|manifest| manifest.segment_count() as u64)
            .unwrap_or(0)
    }

    /// The segment slot covering the given stream time.
    pub fn slot_at(&self, stream_time: f64) -> u64 {
        let Some(manifest) = self.manifest.as_ref() else {
            return 0;
        };

        let loop_index = ((stream_time + TIME_EPSILON) / self.duration).floor().max(0.0) as u64;
        let local = (stream_time - loop_index as f64 * self.duration).max(0.0);
        loop_index * self.segment_count() + manifest.segment_index_at(local + TIME_EPSILON) as u64
    }

    pub fn placement(&self, seq: u64) -> Option<SegmentPlacement> {
        let manifest = self.manifest.as_ref()?;
        let count = self.segment_count();
        let loop_index = seq / count;
        let start = manifest.segment_start((seq % count) as u32);

        Some(SegmentPlacement {
            seq,
            loop_offset: loop_index as f64 * self.duration,
            start,
            end: (start + manifest.segment_duration).min(self.duration),
        })
    }

    /// Whether slot `seq` should be fetched now: it starts inside the forward window, and a non looping asset does
    /// not end before it.
    pub fn wants_slot(&self, seq: u64) -> bool {
        if self.state.is_invalid() {
            return false;
        }

        let Some(placement) = self.placement(seq) else {
            return false;
        };

        if !self.looping && seq / self.segment_count() > self.loop_index {
            return false;
        }

        let start = placement.loop_offset + placement.start;
        let end = placement.loop_offset + placement.end;
        start < self.buffer.current() + self.buffer.target() && end > self.buffer.lowest_retained() + TIME_EPSILON
    }

    /// Slot the fetch cursor should continue from after the buffer was reset or a stall was recovered.
    pub fn resume_slot(&self) -> u64 {
        self.slot_at(self.buffer.highest_cached_time())
    }

    pub fn frame_meta(&self) -> Option<String> {
        let frame = self.presentable_frame()?;
        let meta = FrameMeta {
            time: frame.asset_time,
            stream_time: frame.stream_time,
            segment: frame.seq,
            voxel_count: frame.voxel_count,
            bounds: frame.bounds,
            layers: frame
                .layers
                .iter()
                .map(|layer| LayerMeta {
                    adaptation_set: &layer.adaptation_set,
                    representation: &layer.representation,
                    bytes: layer.data.len(),
                })
                .collect_vec(),
        };
        serde_json::to_string(&meta).ok()
    }

    pub fn track_meta(&self) -> Option<String> {
        let manifest = self.manifest.as_ref()?;
        let meta = TrackMeta {
            duration: manifest.duration,
            segment_duration: manifest.segment_duration,
            segment_count: manifest.segment_count(),
            looping: self.looping,
            adaptation_sets: manifest
                .adaptation_sets
                .iter()
                .map(|set| AdaptationSetMeta {
                    id: &set.id,
                    mime_type: &set.mime_type,
                    codec: &set.codec,
                    representations: set
                        .representations
                        .iter()
                        .map(|rep| RepresentationMeta {
                            id: &rep.id,
                            bandwidth: rep.bandwidth,
                            max_fps: rep.max_fps,
                        })
                        .collect_vec(),
                    active: self.tracks.iter().find(|track| track.adaptation_set == set.id),
                })
                .collect_vec(),
        };
        serde_json::to_string(&meta).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::frame::DecodedFrame;
    use std::io::Cursor;
    use volstream_manifest::deserialize_manifest;

    fn manifest(duration: f64) -> Arc<Manifest> {
        let xml = format!(
            r#"<Manifest duration="{}" segmentDuration="1">
                <Bounds center="0 1 0" halfDims="1 1 1"/>
                <AdaptationSet id="geometry" mimeType="application/vnd.volstream.voxels" codec="vox1" media="$RepresentationID$/$Number$.vseg">
                    <Representation id="low" bandwidth="1000000" maxFps="10"/>
                </AdaptationSet>
            </Manifest>"#,
            duration
        );
        Arc::new(deserialize_manifest(Cursor::new(xml)).unwrap())
    }

    fn segment(core: &AssetCore, seq: u64) -> DecodedSegment {
        let placement = core.placement(seq).unwrap();
        let frames = (0..10)
            .map(|i| {
                let asset_time = placement.start + i as f64 * 0.1;
                Arc::new(DecodedFrame {
                    stream_time: placement.loop_offset + asset_time,
                    asset_time,
                    seq,
                    voxel_count: 100 + i,
                    bounds: None,
                    layers: Vec::new(),
                })
            })
            .collect();
        DecodedSegment {
            seq,
            start: placement.loop_offset + placement.start,
            end: placement.loop_offset + placement.end,
            frames,
        }
    }

    /// A resolved, ready asset with the first `slots` segments buffered.
    fn ready_core(duration: f64, buffer_time: f64, looping: bool, slots: u64) -> AssetCore {
        let mut core = AssetCore::new(buffer_time, 1.0);
        core.set_looping(looping);
        core.resolve(manifest(duration), Vec::new());
        for seq in 0..slots {
            core.push_segment(segment(&core, seq));
        }
        assert!(core.try_mark_ready());
        core
    }

    fn fill(core: &mut AssetCore) {
        let mut seq = core.resume_slot();
        while core.wants_slot(seq) {
            let segment = segment(core, seq);
            core.push_segment(segment);
            seq += 1;
        }
    }

    #[test]
    pub fn ready_needs_buffered_data() {
        let mut core = AssetCore::new(2.0, 1.0);
        assert!(!core.try_mark_ready());
        core.resolve(manifest(4.0), Vec::new());
        assert!(!core.try_mark_ready());
        assert_eq!(core.duration(), Some(4.0));
        assert!(core.bounds().is_some());

        core.push_segment(segment(&core, 0));
        assert!(core.try_mark_ready());
        assert!(!core.try_mark_ready());
        assert!(core.state().contains(AssetState::CACHING));
    }

    #[test]
    pub fn playback_never_outruns_the_buffer() {
        let mut core = ready_core(10.0, 2.0, false, 1);
        core.play();
        core.update(100.0);
        core.update(103.0);
        assert!((core.current_time() - 1.0).abs() < 1e-9);
        assert_eq!(core.decode_time(), Some(0.9));
    }

    #[test]
    pub fn looping_wraps_and_never_reports_the_duration() {
        let mut core = ready_core(3.0, 2.0, true, 2);
        core.play();

        for _ in 0..40 {
            fill(&mut core);
            core.advance_by(0.25);
            assert!(core.current_time() < 3.0, "time {} reached the duration", core.current_time());
        }
        assert!(core.loop_index() >= 2);
        assert!((core.stream_time() - 10.0).abs() < 1e-6);
        assert!((core.current_time() - 1.0).abs() < 1e-6);
    }

    #[test]
    pub fn non_looping_playback_stops_at_the_end() {
        let mut core = ready_core(2.0, 2.0, false, 2);
        core.play();
        core.advance_by(5.0);

        assert_eq!(core.current_time(), 2.0);
        assert!(!core.state().contains(AssetState::PLAYING));
        assert!(core.state().contains(AssetState::FULLY_CACHED));
        assert_eq!(core.play(), SeekOutcome::Reset);
        assert_eq!(core.current_time(), 0.0);
    }

    #[test]
    pub fn seek_clamps_into_the_asset() {
        let mut core = ready_core(4.0, 2.0, false, 2);
        core.seek(-3.0).unwrap();
        assert_eq!(core.current_time(), 0.0);
        core.seek(9.0).unwrap();
        assert_eq!(core.current_time(), 4.0);

        core.set_looping(true);
        core.seek(9.5).unwrap();
        assert!((core.current_time() - 1.5).abs() < 1e-9);
        assert!(!core.is_invalid());
    }

    #[test]
    pub fn unclampable_seek_invalidates() {
        let mut core = ready_core(4.0, 2.0, false, 1);
        core.play();
        assert!(matches!(core.seek(f64::NAN), Err(AssetError::SeekOutOfRange { .. })));
        assert_eq!(core.state(), AssetState::INVALID);
        assert_eq!(core.error().map(AssetError::code), Some(5));
        assert_eq!(core.seek(1.0), Ok(SeekOutcome::Ignored));
    }

    #[test]
    pub fn seek_never_raises_fill() {
        let mut core = ready_core(10.0, 2.0, false, 2);
        let before = core.fill_ratio();
        assert_eq!(core.seek(0.5).unwrap(), SeekOutcome::Retained);
        assert!(core.fill_ratio() <= before);
        assert_eq!(core.buffer().segment_count(), 2);

        let before = core.fill_ratio();
        assert_eq!(core.seek(6.0).unwrap(), SeekOutcome::Reset);
        assert!(core.fill_ratio() <= before);
        assert!(core.state().contains(AssetState::SEEKING));

        fill(&mut core);
        assert!(!core.state().contains(AssetState::SEEKING));
    }

    #[test]
    pub fn seek_during_initialisation_is_deferred() {
        let mut core = AssetCore::new(2.0, 1.0);
        assert_eq!(core.seek(2.5), Ok(SeekOutcome::Deferred));
        core.play();
        core.resolve(manifest(4.0), Vec::new());
        assert_eq!(core.current_time(), 2.5);
        assert_eq!(core.resume_slot(), 2);

        fill(&mut core);
        assert!(core.try_mark_ready());
        assert!(core.state().contains(AssetState::PLAYING));
    }

    #[test]
    pub fn step_moves_by_frames() {
        let mut core = ready_core(4.0, 2.0, false, 2);
        core.set_tracks(vec![ActiveTrack {
            adaptation_set: "geometry".into(),
            mime_type: "application/vnd.volstream.voxels".into(),
            codec: "vox1".into(),
            representation: "low".into(),
            bandwidth: 1_000_000,
            max_fps: 10.0,
            decoded: true,
        }]);
        core.play();
        core.step(3);
        assert!((core.current_time() - 0.3).abs() < 1e-9);
        assert!(core.state().is_paused());
        core.step(-10);
        assert_eq!(core.current_time(), 0.0);
    }

    #[test]
    pub fn slots_follow_the_stream_timeline() {
        let mut core = ready_core(2.5, 2.0, true, 1);
        assert_eq!(core.segment_count(), 3);
        assert_eq!(core.slot_at(2.4), 2);
        assert_eq!(core.slot_at(2.5), 3);

        let placement = core.placement(5).unwrap();
        assert_eq!(placement.loop_offset, 2.5);
        assert_eq!((placement.start, placement.end), (2.0, 2.5));

        core.set_looping(false);
        assert!(!core.wants_slot(3));
    }

    #[test]
    pub fn metadata_is_json() {
        let core = ready_core(4.0, 2.0, false, 1);
        let frame: serde_json::Value = serde_json::from_str(&core.frame_meta().unwrap()).unwrap();
        assert_eq!(frame["voxel_count"], 100);
        let tracks: serde_json::Value = serde_json::from_str(&core.track_meta().unwrap()).unwrap();
        assert_eq!(tracks["segment_count"], 4);
        assert_eq!(tracks["adaptation_sets"][0]["id"], "geometry");
    }
}
