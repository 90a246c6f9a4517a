/// Offset used for slots that are not bound to any visible item.
///
/// Hosts keep such slots mounted but translate them far off-screen.
pub const POSITION_OUT_OF_VIEW: f64 = -10_000_000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScrollDirection {
    Forward,
    Backward,
}

/// A measured layout as reported by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayoutSize {
    pub width: f64,
    pub height: f64,
}

impl LayoutSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// The extent along the scroll axis.
    pub fn main(&self, horizontal: bool) -> f64 {
        if horizontal { self.width } else { self.height }
    }
}

/// Index range resolved for a viewport. All bounds are inclusive.
///
/// `start..=end` is the tight visible range, `start_buffered..=end_buffered` the range expanded by
/// the draw distance. An empty collection resolves to [`ViewportRange::EMPTY`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewportRange {
    pub start: usize,
    pub end: usize,
    pub start_buffered: usize,
    pub end_buffered: usize,
    pub empty: bool,
}

impl ViewportRange {
    pub const EMPTY: Self = Self {
        start: 0,
        end: 0,
        start_buffered: 0,
        end_buffered: 0,
        empty: true,
    };

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn contains(&self, index: usize) -> bool {
        !self.empty && index >= self.start && index <= self.end
    }

    pub fn contains_buffered(&self, index: usize) -> bool {
        !self.empty && index >= self.start_buffered && index <= self.end_buffered
    }

    /// Number of indices in the buffered range.
    pub fn buffered_len(&self) -> usize {
        if self.empty {
            0
        } else {
            self.end_buffered - self.start_buffered + 1
        }
    }
}

/// Outbound scroll instruction for the host's scroll container.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScrollCommand {
    /// Scroll to an absolute offset.
    ScrollTo { offset: f64, animated: bool },
    /// Scroll by a relative delta without animation (scroll-position compensation).
    ScrollBy { delta: f64 },
}

/// Diagnostics reported through `ListOptions::on_warning`.
///
/// None of these are errors: the list keeps working in a degraded mode.
#[derive(Clone, Debug, PartialEq)]
pub enum Warning<K> {
    /// Two items share a key. The later index wins in the id → index map.
    DuplicateKey { key: K, first: usize, second: usize },
    /// The buffered range needs more slots than the pool may hold; edge items were dropped.
    PoolExhausted { needed: usize, capacity: usize },
    /// A scroll-to request stopped waiting for convergence.
    ScrollToForcedCompletion {
        target: f64,
        offset: f64,
        retries: u32,
    },
}

impl<K: core::fmt::Debug> core::fmt::Display for Warning<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DuplicateKey { key, first, second } => write!(
                f,
                "duplicate item key {key:?} at indexes {first} and {second}; keys must be unique"
            ),
            Self::PoolExhausted { needed, capacity } => write!(
                f,
                "container pool exhausted: {needed} items in range, capacity {capacity}"
            ),
            Self::ScrollToForcedCompletion {
                target,
                offset,
                retries,
            } => write!(
                f,
                "scroll-to forced to complete at {offset} (target {target}, {retries} retries)"
            ),
        }
    }
}

/// Serializable view of one slot.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotState {
    pub index: Option<usize>,
    pub position: f64,
    pub column: usize,
    pub host_key: u64,
}

/// Point-in-time state of a list, e.g. for debugging overlays or persisting scroll state.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListSnapshot {
    pub scroll_offset: f64,
    pub scroll_length: f64,
    pub total_size: f64,
    pub align_padding: f64,
    pub range: ViewportRange,
    pub ready: bool,
    pub slots: Vec<SlotState>,
}
