//! A headless virtualized list engine.
//!
//! For host-side glue (executing scroll commands, animated scrolling), see the
//! `virtualist-adapter` crate.
//!
//! The engine renders a bounded window of a very large collection through a fixed pool of
//! reusable slots. It keeps per-item sizes keyed by item identity, computes positions lazily
//! over a valid prefix (grids included), resolves the visible range from the scroll offset, and
//! compensates the scroll position when items above the viewport change size. Programmatic
//! scrolls are tracked until the offset actually settles on a target that may keep moving while
//! items are measured.
//!
//! It is UI-agnostic. The host is expected to provide:
//! - the viewport length along the scroll axis
//! - scroll offsets (with timestamps)
//! - item measurements
//! - frame ticks (and idle callbacks where available)
//!
//! In return it reads slot bindings from [`VirtualList::slots`] or the [`StateStore`], and
//! executes the [`ScrollCommand`]s drained from [`VirtualList::take_commands`].
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod containers;
mod key;
mod list;
mod options;
mod positions;
mod scheduler;
mod scroll_adjust;
mod scroll_to;
mod sizes;
mod store;
mod total;
mod types;
mod viewport;

#[cfg(test)]
mod tests;

pub use containers::{Allocation, ContainerPool, Slot};
pub use key::{ItemId, ItemKey};
pub use list::VirtualList;
pub use options::{
    ConvergencePolicy, HostCapabilities, InitialScroll, KeyExtractor, ListOptions,
    MaintainVisibleContentPosition, SizeEstimator, WarningCallback,
};
pub use positions::{
    LARGE_LIST_THRESHOLD, POSITION_LOOKAHEAD, PositionCalculator, RowCursor, row_extent,
    row_start,
};
pub use scheduler::{Deadline, FrameScheduler, Phase, Task, TaskId};
pub use scroll_adjust::{AdjustState, ScrollAdjustHandler, ScrollAnchor};
pub use scroll_to::{
    CheckOutcome, InFlight, ScrollRequest, ScrollTarget, ScrollToController, item_offset,
};
pub use sizes::{SIZE_QUANTUM, SizeLedger, round_size};
pub use store::{StateStore, Subscription, Topic, Value};
pub use total::TotalSize;
pub use types::{
    LayoutSize, ListSnapshot, POSITION_OUT_OF_VIEW, ScrollCommand, ScrollDirection, SlotState,
    ViewportRange, Warning,
};
pub use viewport::{BufferPolicy, ItemLayout, VelocityTracker, resolve as resolve_viewport};
