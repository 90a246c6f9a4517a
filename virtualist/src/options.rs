use std::sync::Arc;

use crate::{ItemId, ItemKey, Warning};

/// Extracts the key of the item at an index.
pub type KeyExtractor<K> = Arc<dyn Fn(usize) -> K + Send + Sync>;

/// Per-item size estimator, consulted before an item has been measured.
pub type SizeEstimator = Arc<dyn Fn(usize) -> f64 + Send + Sync>;

/// Receives [`Warning`]s. Data-integrity and pool warnings are only produced when `dev_mode` is set.
pub type WarningCallback<K> = Arc<dyn Fn(&Warning<K>) + Send + Sync>;

/// Which content changes should keep the visible content pinned under the viewport's leading edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaintainVisibleContentPosition {
    /// Keep the first visible item in place when the data set changes (e.g. prepend).
    pub data_changes: bool,
    /// Compensate scroll when items above the viewport change size after measurement.
    pub scroll: bool,
}

impl Default for MaintainVisibleContentPosition {
    fn default() -> Self {
        Self {
            data_changes: false,
            scroll: true,
        }
    }
}

/// Where the list starts once the first layout arrives.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InitialScroll {
    Offset(f64),
    Index {
        index: usize,
        view_offset: f64,
        view_position: f64,
    },
}

/// Convergence detection constants for programmatic scrolling.
///
/// The defaults are empirical; only the shape (epsilon, bounded retries, separate settle timeout
/// for the initial scroll) is relied upon.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConvergencePolicy {
    /// Distance to the target under which a scroll counts as arrived.
    pub epsilon: f64,
    /// Corrective scroll commands issued before giving up.
    pub max_retries: u32,
    /// How long the offset may stay still away from the target before completion is forced.
    pub settle_timeout_ms: u64,
    /// Same as `settle_timeout_ms`, for the initial scroll while layout is still settling.
    pub initial_settle_timeout_ms: u64,
    /// Hard upper bound on the lifetime of a request.
    pub max_duration_ms: u64,
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self {
            epsilon: 1.0,
            max_retries: 5,
            settle_timeout_ms: 100,
            initial_settle_timeout_ms: 500,
            max_duration_ms: 3_000,
        }
    }
}

/// Host platform traits the engine reads at its boundary instead of branching per platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HostCapabilities {
    /// Whether a zero-sized item layout reflects a real size. Some hosts report 0 before the
    /// first real layout pass; when this is `false` such measurements are ignored.
    pub zero_size_layouts_trusted: bool,
    /// Whether the host delivers idle callbacks. Without them, idle work runs on the next frame.
    pub idle_callbacks: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            zero_size_layouts_trusted: true,
            idle_callbacks: false,
        }
    }
}

/// Configuration for [`crate::VirtualList`].
///
/// Cheap to clone: closures live in `Arc`s so hosts can tweak a field and call
/// `VirtualList::set_options` without reallocating them.
pub struct ListOptions<K = ItemId> {
    pub count: usize,
    pub key_extractor: KeyExtractor<K>,
    /// Static size used when no other estimate is available.
    pub estimated_item_size: f64,
    /// Per-item estimator. Takes precedence over the running average.
    pub estimate_item_size: Option<SizeEstimator>,
    /// Use the average of measured sizes for unmeasured items when no estimator is set.
    pub use_average_size: bool,
    pub num_columns: usize,
    pub horizontal: bool,
    /// Reuse slot instances for different items (content swap) instead of rebinding per item.
    pub recycle_items: bool,
    /// Buffer distance rendered beyond each viewport edge.
    pub draw_distance: f64,
    pub maintain_visible_content_position: MaintainVisibleContentPosition,
    /// Pad the content start so short lists sit at the end of the viewport.
    pub align_items_at_end: bool,
    /// Keep `ready` false until the first viewport layout has been reported.
    pub wait_for_initial_layout: bool,
    pub initial_scroll: Option<InitialScroll>,
    /// Target pool size as a multiple of what the first layout needs. Reached progressively.
    pub initial_container_pool_ratio: f64,
    /// Hard ceiling for the pool. `None` means unbounded.
    pub max_container_pool_size: Option<usize>,
    pub convergence: ConvergencePolicy,
    pub capabilities: HostCapabilities,
    /// Enables data-integrity checks and pool diagnostics.
    pub dev_mode: bool,
    pub on_warning: Option<WarningCallback<K>>,
}

impl<K> Clone for ListOptions<K> {
    fn clone(&self) -> Self {
        Self {
            count: self.count,
            key_extractor: Arc::clone(&self.key_extractor),
            estimated_item_size: self.estimated_item_size,
            estimate_item_size: self.estimate_item_size.clone(),
            use_average_size: self.use_average_size,
            num_columns: self.num_columns,
            horizontal: self.horizontal,
            recycle_items: self.recycle_items,
            draw_distance: self.draw_distance,
            maintain_visible_content_position: self.maintain_visible_content_position,
            align_items_at_end: self.align_items_at_end,
            wait_for_initial_layout: self.wait_for_initial_layout,
            initial_scroll: self.initial_scroll,
            initial_container_pool_ratio: self.initial_container_pool_ratio,
            max_container_pool_size: self.max_container_pool_size,
            convergence: self.convergence,
            capabilities: self.capabilities,
            dev_mode: self.dev_mode,
            on_warning: self.on_warning.clone(),
        }
    }
}

impl ListOptions<ItemId> {
    /// Creates options for a list keyed by index (the index rendered as a string).
    pub fn new(count: usize, estimated_item_size: f64) -> Self {
        Self::new_with_key(count, estimated_item_size, |i| i.to_string())
    }
}

impl<K: ItemKey> ListOptions<K> {
    /// Creates options with a custom key extractor.
    ///
    /// Sizes are stored by key, so measurements follow items across reorders and inserts.
    pub fn new_with_key(
        count: usize,
        estimated_item_size: f64,
        key_extractor: impl Fn(usize) -> K + Send + Sync + 'static,
    ) -> Self {
        Self {
            count,
            key_extractor: Arc::new(key_extractor),
            estimated_item_size,
            estimate_item_size: None,
            use_average_size: true,
            num_columns: 1,
            horizontal: false,
            recycle_items: false,
            draw_distance: 250.0,
            maintain_visible_content_position: MaintainVisibleContentPosition::default(),
            align_items_at_end: false,
            wait_for_initial_layout: true,
            initial_scroll: None,
            initial_container_pool_ratio: 2.0,
            max_container_pool_size: None,
            convergence: ConvergencePolicy::default(),
            capabilities: HostCapabilities::default(),
            dev_mode: cfg!(debug_assertions),
            on_warning: None,
        }
    }
}

impl<K> ListOptions<K> {
    pub fn with_key_extractor(
        mut self,
        key_extractor: impl Fn(usize) -> K + Send + Sync + 'static,
    ) -> Self {
        self.key_extractor = Arc::new(key_extractor);
        self
    }

    pub fn with_estimate_item_size(
        mut self,
        estimate: Option<impl Fn(usize) -> f64 + Send + Sync + 'static>,
    ) -> Self {
        self.estimate_item_size = estimate.map(|f| Arc::new(f) as _);
        self
    }

    pub fn with_use_average_size(mut self, use_average_size: bool) -> Self {
        self.use_average_size = use_average_size;
        self
    }

    pub fn with_num_columns(mut self, num_columns: usize) -> Self {
        self.num_columns = num_columns;
        self
    }

    pub fn with_horizontal(mut self, horizontal: bool) -> Self {
        self.horizontal = horizontal;
        self
    }

    pub fn with_recycle_items(mut self, recycle_items: bool) -> Self {
        self.recycle_items = recycle_items;
        self
    }

    pub fn with_draw_distance(mut self, draw_distance: f64) -> Self {
        self.draw_distance = draw_distance;
        self
    }

    pub fn with_maintain_visible_content_position(
        mut self,
        mvcp: MaintainVisibleContentPosition,
    ) -> Self {
        self.maintain_visible_content_position = mvcp;
        self
    }

    pub fn with_align_items_at_end(mut self, align_items_at_end: bool) -> Self {
        self.align_items_at_end = align_items_at_end;
        self
    }

    pub fn with_wait_for_initial_layout(mut self, wait: bool) -> Self {
        self.wait_for_initial_layout = wait;
        self
    }

    pub fn with_initial_scroll(mut self, initial_scroll: Option<InitialScroll>) -> Self {
        self.initial_scroll = initial_scroll;
        self
    }

    pub fn with_initial_scroll_index(mut self, index: usize) -> Self {
        self.initial_scroll = Some(InitialScroll::Index {
            index,
            view_offset: 0.0,
            view_position: 0.0,
        });
        self
    }

    pub fn with_initial_scroll_offset(mut self, offset: f64) -> Self {
        self.initial_scroll = Some(InitialScroll::Offset(offset));
        self
    }

    pub fn with_initial_container_pool_ratio(mut self, ratio: f64) -> Self {
        self.initial_container_pool_ratio = ratio;
        self
    }

    pub fn with_max_container_pool_size(mut self, max: Option<usize>) -> Self {
        self.max_container_pool_size = max;
        self
    }

    pub fn with_convergence(mut self, convergence: ConvergencePolicy) -> Self {
        self.convergence = convergence;
        self
    }

    pub fn with_capabilities(mut self, capabilities: HostCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    pub fn with_on_warning(
        mut self,
        on_warning: Option<impl Fn(&Warning<K>) + Send + Sync + 'static>,
    ) -> Self {
        self.on_warning = on_warning.map(|f| Arc::new(f) as _);
        self
    }

    /// Column count with the degenerate `0` treated as a single column.
    pub(crate) fn columns(&self) -> usize {
        self.num_columns.max(1)
    }
}

impl<K> core::fmt::Debug for ListOptions<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ListOptions")
            .field("count", &self.count)
            .field("estimated_item_size", &self.estimated_item_size)
            .field("use_average_size", &self.use_average_size)
            .field("num_columns", &self.num_columns)
            .field("horizontal", &self.horizontal)
            .field("recycle_items", &self.recycle_items)
            .field("draw_distance", &self.draw_distance)
            .field(
                "maintain_visible_content_position",
                &self.maintain_visible_content_position,
            )
            .field("align_items_at_end", &self.align_items_at_end)
            .field("wait_for_initial_layout", &self.wait_for_initial_layout)
            .field("initial_scroll", &self.initial_scroll)
            .field(
                "initial_container_pool_ratio",
                &self.initial_container_pool_ratio,
            )
            .field("max_container_pool_size", &self.max_container_pool_size)
            .field("convergence", &self.convergence)
            .field("capabilities", &self.capabilities)
            .field("dev_mode", &self.dev_mode)
            .finish_non_exhaustive()
    }
}
