use crate::ViewportRange;

/// Samples kept by [`VelocityTracker`].
const HISTORY_SIZE: usize = 5;

/// Only samples this recent contribute to the velocity.
const HORIZON_MS: u64 = 100;

/// Below this speed (px/ms) scrolling counts as stopped and buffers stay symmetric.
const MOVING_VELOCITY: f64 = 0.01;

#[derive(Clone, Copy, Debug, Default)]
struct Sample {
    time_ms: u64,
    offset: f64,
}

/// Scroll velocity estimate from the most recent scroll events.
#[derive(Clone, Debug, Default)]
pub struct VelocityTracker {
    samples: [Option<Sample>; HISTORY_SIZE],
    index: usize,
}

impl VelocityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, time_ms: u64, offset: f64) {
        self.index = (self.index + 1) % HISTORY_SIZE;
        self.samples[self.index] = Some(Sample { time_ms, offset });
    }

    /// Velocity in px/ms (positive = forward). Zero when the newest sample is older than the
    /// horizon or there is not enough history.
    pub fn velocity(&self, now_ms: u64) -> f64 {
        let Some(newest) = self.samples[self.index] else {
            return 0.0;
        };
        if now_ms.saturating_sub(newest.time_ms) > HORIZON_MS {
            return 0.0;
        }

        let mut oldest = newest;
        for step in 1..HISTORY_SIZE {
            let i = (self.index + HISTORY_SIZE - step) % HISTORY_SIZE;
            let Some(sample) = self.samples[i] else {
                break;
            };
            if sample.time_ms > oldest.time_ms
                || newest.time_ms.saturating_sub(sample.time_ms) > HORIZON_MS
            {
                break;
            }
            oldest = sample;
        }

        let dt = newest.time_ms.saturating_sub(oldest.time_ms);
        if dt == 0 {
            return 0.0;
        }
        (newest.offset - oldest.offset) / dt as f64
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Read access to laid-out items for viewport resolution.
///
/// Tops and extents must be non-decreasing in index order. `top` may extend lazily computed
/// positions, hence `&mut self`.
pub trait ItemLayout {
    fn len(&self) -> usize;
    /// Leading indices whose positions are already computed and cheap to look up.
    fn valid_len(&self) -> usize;
    fn top(&mut self, index: usize) -> f64;
    /// Extent of the row containing `index`.
    fn extent(&mut self, index: usize) -> f64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How the draw distance is split between the two viewport edges.
///
/// While scrolling, the leading edge gets up to `max_multiplier` times the buffer (growing with
/// speed) and the trailing edge half of it.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BufferPolicy {
    /// Extra buffer multiplier per px/ms of velocity.
    pub gain: f64,
    pub max_multiplier: f64,
    pub trailing_ratio: f64,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self {
            gain: 0.5,
            max_multiplier: 3.0,
            trailing_ratio: 0.5,
        }
    }
}

impl BufferPolicy {
    /// Returns `(before, after)` buffer distances for the given velocity.
    pub fn split(&self, buffer: f64, velocity: f64) -> (f64, f64) {
        let buffer = buffer.max(0.0);
        if !velocity.is_finite() || velocity.abs() < MOVING_VELOCITY {
            return (buffer, buffer);
        }
        let ahead = buffer * (1.0 + velocity.abs() * self.gain).min(self.max_multiplier.max(1.0));
        let behind = buffer * self.trailing_ratio.clamp(0.0, 1.0);
        if velocity > 0.0 {
            (behind, ahead)
        } else {
            (ahead, behind)
        }
    }
}

/// Resolves the visible and buffered index ranges for a viewport.
///
/// An item is visible when it ends after the viewport start and starts at or before the viewport
/// end. Offsets past the content clamp to the last item. Searches binary-search the computed
/// prefix and only walk forward past it.
pub fn resolve(
    layout: &mut impl ItemLayout,
    scroll_offset: f64,
    scroll_length: f64,
    buffer: f64,
    velocity: f64,
    policy: BufferPolicy,
) -> ViewportRange {
    let len = layout.len();
    if len == 0 {
        return ViewportRange::EMPTY;
    }
    let last = len - 1;
    let top_edge = scroll_offset.max(0.0);
    let bottom_edge = top_edge + scroll_length.max(0.0);
    let (before, after) = policy.split(buffer, velocity);

    let start = first_ending_after(layout, top_edge).unwrap_or(last);
    let end = last_starting_at_or_before(layout, bottom_edge).max(start);
    let start_buffered = first_ending_after(layout, top_edge - before)
        .unwrap_or(last)
        .min(start);
    let end_buffered = last_starting_at_or_before(layout, bottom_edge + after).max(end);

    vtrace!(
        start,
        end,
        start_buffered,
        end_buffered,
        velocity,
        "viewport::resolve"
    );
    ViewportRange {
        start,
        end,
        start_buffered,
        end_buffered,
        empty: false,
    }
}

fn first_ending_after<L: ItemLayout>(layout: &mut L, edge: f64) -> Option<usize> {
    first_where(layout, |layout, i| layout.top(i) + layout.extent(i) > edge)
}

fn last_starting_at_or_before<L: ItemLayout>(layout: &mut L, edge: f64) -> usize {
    let len = layout.len();
    match first_where(layout, |layout, i| layout.top(i) > edge) {
        Some(i) => i.saturating_sub(1),
        None => len - 1,
    }
}

/// First index where a monotone predicate turns true.
fn first_where<L: ItemLayout>(
    layout: &mut L,
    mut pred: impl FnMut(&mut L, usize) -> bool,
) -> Option<usize> {
    let len = layout.len();
    let valid = layout.valid_len().min(len);
    if valid > 0 && pred(layout, valid - 1) {
        let (mut lo, mut hi) = (0, valid - 1);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if pred(layout, mid) {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        return Some(lo);
    }
    for i in valid..len {
        if pred(layout, i) {
            return Some(i);
        }
    }
    None
}
