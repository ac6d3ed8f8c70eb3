use std::collections::BTreeMap;
use std::sync::Arc;

use log::trace;

use crate::asset::frame::{DecodedFrame, DecodedSegment, TIME_EPSILON};

type TimeKey = i64;

fn to_key(time: f64) -> TimeKey {
    (time * 1_000_000.0).round() as TimeKey
}

/// Decoded segments of one asset, ordered by their position on the playback timeline.
///
/// Segments are retained while they overlap `[current - back_window, current + target]`; admission happens
/// per segment, so the last admitted segment may reach past the forward edge.
#[derive(Debug)]
pub struct DecodeBuffer {
    segments: BTreeMap<TimeKey, DecodedSegment>,
    current: f64,
    target: f64,
    back_window: f64,
    lowest_retained: f64,
}

impl DecodeBuffer {
    pub fn new(target: f64, back_window: f64) -> Self {
        Self {
            segments: BTreeMap::new(),
            current: 0.0,
            target,
            back_window,
            lowest_retained: -back_window,
        }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn lowest_retained(&self) -> f64 {
        self.lowest_retained
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn frame_count(&self) -> usize {
        self.segments.values().map(|segment| segment.frames.len()).sum()
    }

    pub fn contains_segment(&self, seq: u64) -> bool {
        self.segments.values().any(|segment| segment.seq == seq)
    }

    /// Admits a decoded segment. Segments entirely outside the retained window are dropped.
    pub fn push(&mut self, segment: DecodedSegment) -> bool {
        if segment.end <= self.lowest_retained + TIME_EPSILON || segment.start >= self.current + self.target {
            trace!(
                "Dropping segment {} [{:.3}, {:.3}) outside of the window around {:.3}",
                segment.seq, segment.start, segment.end, self.current
            );
            return false;
        }

        self.segments.insert(to_key(segment.start), segment);
        true
    }

    /// Moves the playback position forward and releases everything behind the back window.
    pub fn advance(&mut self, to: f64) {
        self.current = to;
        self.discard_before(to - self.back_window);
    }

    pub fn discard_before(&mut self, time: f64) {
        if time > self.lowest_retained {
            self.lowest_retained = time;
        }

        let lowest = self.lowest_retained;
        self.segments.retain(|_, segment| segment.end > lowest + TIME_EPSILON);
    }

    pub fn discard_all(&mut self) {
        self.segments.clear();
    }

    /// Restarts the buffer at `position` without any content, e.g. for a seek out of the buffered range.
    pub fn reset(&mut self, position: f64) {
        self.discard_all();
        self.current = position;
        self.lowest_retained = position - self.back_window;
    }

    /// End of the contiguous run of segments starting at the current position.
    pub fn highest_cached_time(&self) -> f64 {
        self.horizon_from(self.current)
    }

    pub fn horizon_from(&self, time: f64) -> f64 {
        let Some((_, covering)) = self.segments.range(..=to_key(time)).next_back() else {
            return time;
        };

        if covering.end <= time + TIME_EPSILON {
            return time;
        }

        let mut end = covering.end;
        for segment in self.segments.range(to_key(covering.start) + 1..).map(|(_, segment)| segment) {
            if segment.start > end + TIME_EPSILON {
                break;
            }
            end = end.max(segment.end);
        }
        end
    }

    pub fn fill_ratio(&self) -> f64 {
        if self.target <= 0.0 {
            return 1.0;
        }

        ((self.highest_cached_time() - self.current) / self.target).clamp(0.0, 1.0)
    }

    /// The frame to present at `time`: the latest decoded frame not after it, within the covering segment.
    pub fn frame_at(&self, time: f64) -> Option<Arc<DecodedFrame>> {
        let (_, segment) = self.segments.range(..=to_key(time)).next_back()?;
        if time > segment.end + TIME_EPSILON {
            return None;
        }

        segment
            .frames
            .iter()
            .take_while(|frame| frame.stream_time <= time + TIME_EPSILON)
            .last()
            .cloned()
    }

    /// A cache miss is not an error, the caller simply has nothing to present yet.
    pub fn has_frame(&self, time: f64) -> bool {
        self.frame_at(time).is_some()
    }

    pub fn frames(&self) -> impl Iterator<Item = &Arc<DecodedFrame>> {
        self.segments.values().flat_map(|segment| segment.frames.iter())
    }
}
