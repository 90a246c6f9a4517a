use std::sync::Arc;

use crate::containers::{ContainerPool, Slot};
use crate::key::KeyMap;
use crate::positions::{self, PositionCalculator};
use crate::scheduler::{Deadline, FrameScheduler, Phase, Task};
use crate::scroll_adjust::{ScrollAdjustHandler, ScrollAnchor};
use crate::scroll_to::{
    self, CheckOutcome, InFlight, ScrollRequest, ScrollTarget, ScrollToController,
};
use crate::sizes::SizeLedger;
use crate::store::{StateStore, Topic, Value};
use crate::total::TotalSize;
use crate::viewport::{self, BufferPolicy, ItemLayout, VelocityTracker};
use crate::{
    ItemId, ItemKey, LayoutSize, ListOptions, ListSnapshot, ScrollCommand, ScrollDirection,
    SlotState, ViewportRange, Warning,
};

/// Slots mounted per idle step while the pool grows toward its target size.
const POOL_GROWTH_STEP: usize = 4;

/// Borrowed layout state handed to the viewport resolver.
struct LayoutView<'a, K> {
    positions: &'a mut PositionCalculator,
    ledger: &'a SizeLedger<K>,
    ids: &'a [K],
}

impl<K: ItemKey> ItemLayout for LayoutView<'_, K> {
    fn len(&self) -> usize {
        self.ids.len()
    }

    fn valid_len(&self) -> usize {
        self.positions.valid_len()
    }

    fn top(&mut self, index: usize) -> f64 {
        let (ids, ledger) = (self.ids, self.ledger);
        self.positions
            .ensure(index, |i| ledger.size_of(&ids[i], i))
            .unwrap_or(0.0)
    }

    fn extent(&mut self, index: usize) -> f64 {
        let (ids, ledger) = (self.ids, self.ledger);
        positions::row_extent(index, ids.len(), self.positions.num_columns(), |i| {
            ledger.size_of(&ids[i], i)
        })
    }
}

/// A virtualized list engine.
///
/// The host feeds it viewport layouts, scroll events, item measurements and frame ticks; the
/// list answers with slot bindings (through [`VirtualList::slots`] and the [`StateStore`]) and
/// scroll commands to execute (through [`VirtualList::take_commands`]).
///
/// Measurements are batched: they update sizes and the total immediately, but positions and the
/// viewport are only recomputed on [`VirtualList::flush`], the next scroll event or the next
/// [`VirtualList::tick`].
///
/// Single-threaded: the store hands out `Rc` listeners, so a list is neither `Send` nor `Clone`.
pub struct VirtualList<K = ItemId> {
    options: ListOptions<K>,
    ids: Vec<K>,
    index_by_id: KeyMap<K, usize>,
    ledger: SizeLedger<K>,
    positions: PositionCalculator,
    total: TotalSize,
    buffer_policy: BufferPolicy,
    velocity: VelocityTracker,
    pool: ContainerPool<K>,
    pool_target: usize,
    pool_sized: bool,
    pool_exhausted: bool,
    adjust: ScrollAdjustHandler,
    scroll_to: ScrollToController<K>,
    scheduler: FrameScheduler,
    store: StateStore,
    commands: Vec<ScrollCommand>,

    scroll_offset: f64,
    scroll_length: f64,
    scroll_direction: Option<ScrollDirection>,
    range: ViewportRange,
    now_ms: u64,
    /// Smallest index whose size changed since positions were last brought up to date.
    dirty_from: Option<usize>,
    has_layout: bool,
    initial_scroll_done: bool,
    painted: bool,
    batching: bool,
    torn_down: bool,
}

impl<K: ItemKey> VirtualList<K> {
    pub fn new(options: ListOptions<K>) -> Self {
        vdebug!(
            count = options.count,
            num_columns = options.num_columns,
            "VirtualList::new"
        );
        let ledger = SizeLedger::new(
            options.estimated_item_size,
            options.estimate_item_size.clone(),
            options.use_average_size,
        );
        let positions = PositionCalculator::new(0, options.columns());
        let initial_scroll_done = options.initial_scroll.is_none();
        let mut list = Self {
            options,
            ids: Vec::new(),
            index_by_id: KeyMap::new(),
            ledger,
            positions,
            total: TotalSize::default(),
            buffer_policy: BufferPolicy::default(),
            velocity: VelocityTracker::new(),
            pool: ContainerPool::new(0),
            pool_target: 0,
            pool_sized: false,
            pool_exhausted: false,
            adjust: ScrollAdjustHandler::new(),
            scroll_to: ScrollToController::new(),
            scheduler: FrameScheduler::new(),
            store: StateStore::new(),
            commands: Vec::new(),
            scroll_offset: 0.0,
            scroll_length: 0.0,
            scroll_direction: None,
            range: ViewportRange::EMPTY,
            now_ms: 0,
            dirty_from: None,
            has_layout: false,
            initial_scroll_done,
            painted: false,
            batching: false,
            torn_down: false,
        };
        list.rebuild_data();
        list
    }

    pub fn options(&self) -> &ListOptions<K> {
        &self.options
    }

    /// Replaces the options. Data-affecting changes (count, keys, columns, estimates, axis)
    /// rebuild sizes and positions; anything else only re-resolves the viewport.
    pub fn set_options(&mut self, options: ListOptions<K>) {
        let prev = std::mem::replace(&mut self.options, options);
        vtrace!(
            count = self.options.count,
            draw_distance = self.options.draw_distance,
            "VirtualList::set_options"
        );

        let axis_changed = prev.horizontal != self.options.horizontal;
        if axis_changed {
            self.ledger.clear();
        }
        let estimates_changed = self.ledger.configure(
            self.options.estimated_item_size,
            self.options.estimate_item_size.clone(),
            self.options.use_average_size,
        );

        if prev.count != self.options.count
            || !Arc::ptr_eq(&prev.key_extractor, &self.options.key_extractor)
            || prev.columns() != self.options.columns()
            || axis_changed
            || estimates_changed
        {
            self.rebuild_data();
        } else {
            self.refresh();
        }
    }

    pub fn update_options(&mut self, f: impl FnOnce(&mut ListOptions<K>)) {
        let mut options = self.options.clone();
        f(&mut options);
        self.set_options(options);
    }

    /// Runs `f` and re-resolves the viewport once at the end instead of after every call.
    pub fn batch_update(&mut self, f: impl FnOnce(&mut Self)) {
        let was_batching = std::mem::replace(&mut self.batching, true);
        f(self);
        self.batching = was_batching;
        if !was_batching {
            self.refresh();
        }
    }

    pub fn count(&self) -> usize {
        self.ids.len()
    }

    pub fn set_count(&mut self, count: usize) {
        if count == self.options.count {
            return;
        }
        self.options.count = count;
        self.rebuild_data();
    }

    pub fn set_key_extractor(&mut self, f: impl Fn(usize) -> K + Send + Sync + 'static) {
        self.options.key_extractor = Arc::new(f);
        self.rebuild_data();
    }

    /// Re-reads every key, e.g. after the data behind the same extractor was reordered.
    pub fn sync_item_keys(&mut self) {
        self.rebuild_data();
    }

    pub fn key_for(&self, index: usize) -> Option<&K> {
        self.ids.get(index)
    }

    /// Index of `id`. With duplicate keys the last occurrence wins.
    pub fn index_of(&self, id: &K) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn ids(&self) -> &[K] {
        &self.ids
    }

    fn rebuild_data(&mut self) {
        let anchor = self.capture_anchor(self.options.maintain_visible_content_position.data_changes);

        let key_of = Arc::clone(&self.options.key_extractor);
        self.ids = (0..self.options.count).map(|i| key_of(i)).collect();
        self.index_by_id.clear();
        self.index_by_id.reserve(self.ids.len());
        let mut duplicates = Vec::new();
        for (i, id) in self.ids.iter().enumerate() {
            if let Some(first) = self.index_by_id.insert(id.clone(), i) {
                duplicates.push(Warning::DuplicateKey {
                    key: id.clone(),
                    first,
                    second: i,
                });
            }
        }
        if self.options.dev_mode {
            for warning in duplicates {
                self.warn(warning);
            }
        }

        self.ledger.rebase();
        self.positions.reset(self.ids.len(), self.options.columns());
        self.dirty_from = None;
        self.recompute_total();
        self.restore_anchor(anchor);
        vdebug!(count = self.ids.len(), total = self.total.get(), "VirtualList::rebuild_data");
        self.refresh();
    }

    /// Remembers the first visible item and where it sits, if `enabled` and anything is visible.
    fn capture_anchor(&mut self, enabled: bool) -> Option<ScrollAnchor<K>> {
        if !enabled || !self.has_layout || self.range.is_empty() {
            return None;
        }
        let index = self.range.start;
        let id = self.ids.get(index)?.clone();
        self.revalidate_dirty();
        let top = self.ensure_top(index);
        Some(ScrollAnchor::new(id, top))
    }

    /// Scrolls by however far the anchored item moved.
    fn restore_anchor(&mut self, anchor: Option<ScrollAnchor<K>>) {
        let Some(anchor) = anchor else {
            return;
        };
        if let Some(index) = self.index_of(&anchor.id) {
            let top = self.ensure_top(index);
            self.request_adjust(anchor.delta(top));
        }
    }

    fn recompute_total(&mut self) {
        let (ids, ledger) = (&self.ids, &self.ledger);
        self.total
            .recompute(ids.len(), self.options.columns(), |i| ledger.size_of(&ids[i], i));
    }

    fn ensure_top(&mut self, index: usize) -> f64 {
        let (ids, ledger) = (&self.ids, &self.ledger);
        self.positions
            .ensure(index, |i| ledger.size_of(&ids[i], i))
            .unwrap_or(0.0)
    }

    fn row_extent(&self, index: usize) -> f64 {
        let (ids, ledger) = (&self.ids, &self.ledger);
        positions::row_extent(index, ids.len(), self.options.columns(), |i| {
            ledger.size_of(&ids[i], i)
        })
    }

    /// Pins the estimates of every item sharing a row with `index`.
    fn pin_row(&mut self, index: usize) {
        let columns = self.options.columns();
        let start = index - index % columns;
        let end = (start + columns).min(self.ids.len());
        for i in start..end {
            self.ledger.get(&self.ids[i], i);
        }
    }

    /// Reports the viewport length along the scroll axis. The first call triggers the initial
    /// scroll, if any.
    pub fn on_layout(&mut self, scroll_length: f64) {
        if self.torn_down {
            return;
        }
        let first = !self.has_layout;
        self.scroll_length = if scroll_length.is_finite() {
            scroll_length.max(0.0)
        } else {
            0.0
        };
        self.has_layout = true;
        vdebug!(scroll_length = self.scroll_length, first, "VirtualList::on_layout");

        if first {
            if let Some(initial) = self.options.initial_scroll {
                if self.start_scroll_to(ScrollRequest::from(initial), true) {
                    return;
                }
                self.initial_scroll_done = true;
            }
        }
        self.refresh();
    }

    /// Reports a scroll position from the host.
    pub fn on_scroll(&mut self, offset: f64, now_ms: u64) {
        if self.torn_down || !offset.is_finite() {
            return;
        }
        let offset = offset.max(0.0);
        self.now_ms = self.now_ms.max(now_ms);
        if !self
            .adjust
            .on_scroll(offset, self.options.convergence.epsilon)
        {
            return;
        }
        if offset != self.scroll_offset {
            self.scroll_direction = Some(if offset > self.scroll_offset {
                ScrollDirection::Forward
            } else {
                ScrollDirection::Backward
            });
        }
        self.velocity.add(now_ms, offset);
        self.scroll_to.observe_scroll(offset, now_ms);
        self.scroll_offset = offset;
        self.refresh();
    }

    /// Reports the measured layout of item `id`. Unknown ids (e.g. a layout racing a data
    /// update) are ignored.
    pub fn on_item_layout(&mut self, id: &K, size: LayoutSize) {
        if self.torn_down {
            return;
        }
        let Some(index) = self.index_of(id) else {
            vtrace!(?id, "VirtualList::on_item_layout: unknown id");
            return;
        };
        self.record_size(index, size.main(self.options.horizontal));
    }

    /// Reports the main-axis size of the item at `index`.
    pub fn measure(&mut self, index: usize, size: f64) {
        if self.torn_down || index >= self.ids.len() {
            return;
        }
        self.record_size(index, size);
    }

    pub fn measure_many(&mut self, measurements: impl IntoIterator<Item = (usize, f64)>) {
        for (index, size) in measurements {
            self.measure(index, size);
        }
    }

    fn record_size(&mut self, index: usize, size: f64) {
        if size <= 0.0 && !self.options.capabilities.zero_size_layouts_trusted {
            return;
        }
        self.pin_row(index);
        let before = self.row_extent(index);
        self.ledger.set(&self.ids[index], size);
        let delta = self.row_extent(index) - before;
        if delta == 0.0 {
            if self.ledger.needs_rebase() {
                self.scheduler
                    .schedule_once(Deadline::Microtask, Task::FlushSizes);
            }
            return;
        }
        self.total.add(delta);

        if self.options.maintain_visible_content_position.scroll && self.has_layout {
            // An earlier pending change would leave this top stale.
            if self.dirty_from.is_some_and(|d| d < index) {
                self.revalidate_dirty();
            }
            let top = self.ensure_top(index);
            if top < self.scroll_offset {
                self.request_adjust(delta);
            }
        }
        self.dirty_from = Some(self.dirty_from.map_or(index, |d| d.min(index)));
        self.scheduler
            .schedule_once(Deadline::Microtask, Task::FlushSizes);
    }

    fn request_adjust(&mut self, delta: f64) {
        let in_flight = self.scroll_to.is_in_flight();
        if let Some(delta) = self
            .adjust
            .request_adjust(delta, self.scroll_offset, in_flight)
        {
            self.scroll_offset = (self.scroll_offset + delta).max(0.0);
            self.commands.push(ScrollCommand::ScrollBy { delta });
        }
    }

    /// Runs microtasks: applies batched measurements and re-resolves the viewport.
    pub fn flush(&mut self) {
        if self.torn_down {
            return;
        }
        for task in self.scheduler.take_due(Phase::Microtasks) {
            self.run_task(task);
        }
    }

    /// Drives one animation frame at `now_ms`.
    pub fn tick(&mut self, now_ms: u64) {
        if self.torn_down {
            return;
        }
        self.now_ms = self.now_ms.max(now_ms);
        self.flush();
        self.adjust.on_frame();
        let run_idle = !self.options.capabilities.idle_callbacks;
        for task in self.scheduler.take_due(Phase::Frame { now_ms, run_idle }) {
            self.run_task(task);
        }
    }

    /// Drives an idle callback at `now_ms`.
    pub fn idle(&mut self, now_ms: u64) {
        if self.torn_down {
            return;
        }
        self.now_ms = self.now_ms.max(now_ms);
        for task in self.scheduler.take_due(Phase::Idle { now_ms }) {
            self.run_task(task);
        }
    }

    fn run_task(&mut self, task: Task) {
        vtrace!(?task, "VirtualList::run_task");
        match task {
            Task::FlushSizes => self.refresh(),
            Task::CheckScrollTo { token } => self.check_scroll_to(token),
            Task::GrowPool => self.grow_pool(),
        }
    }

    /// Brings positions up to date with batched size changes, then with a moved estimate.
    fn apply_dirty_positions(&mut self) {
        self.revalidate_dirty();
        if self.ledger.needs_rebase() {
            self.rebase_estimates();
        }
    }

    fn revalidate_dirty(&mut self) {
        if let Some(index) = self.dirty_from.take() {
            let (ids, ledger) = (&self.ids, &self.ledger);
            self.positions
                .revalidate_from(index, |i| ledger.size_of(&ids[i], i));
        }
    }

    /// Lays unpinned items out again with the current average, keeping the first visible item
    /// where it is.
    fn rebase_estimates(&mut self) {
        let anchor = self.capture_anchor(self.options.maintain_visible_content_position.scroll);
        self.ledger.rebase();
        self.positions.reset(self.ids.len(), self.options.columns());
        self.recompute_total();
        vtrace!(
            estimate = self.ledger.estimate(0),
            total = self.total.get(),
            "VirtualList: estimates rebased"
        );
        self.restore_anchor(anchor);
    }

    /// Brings positions up to date, resolves the viewport, binds slots and publishes.
    fn refresh(&mut self) {
        if self.torn_down || self.batching {
            return;
        }
        self.apply_dirty_positions();
        if self.options.wait_for_initial_layout && !self.has_layout {
            self.publish();
            return;
        }

        let velocity = self.velocity.velocity(self.now_ms);
        let mut layout = LayoutView {
            positions: &mut self.positions,
            ledger: &self.ledger,
            ids: &self.ids,
        };
        self.range = viewport::resolve(
            &mut layout,
            self.scroll_offset,
            self.scroll_length,
            self.options.draw_distance,
            velocity,
            self.buffer_policy,
        );
        self.allocate();
        self.publish();
    }

    fn allocate(&mut self) {
        let range = self.range;
        let ceiling = self.options.max_container_pool_size.unwrap_or(usize::MAX);
        if !self.pool_sized && !range.is_empty() {
            let needed = range.buffered_len();
            let capacity = needed.min(ceiling);
            self.pool.set_capacity(capacity);
            let ratio = self.options.initial_container_pool_ratio;
            let target = if ratio.is_finite() && ratio > 1.0 {
                (needed as f64 * ratio).ceil() as usize
            } else {
                needed
            };
            self.pool_target = target.min(ceiling).max(capacity);
            self.pool_sized = true;
            vdebug!(capacity, target = self.pool_target, "VirtualList: pool sized");
        }

        let positions = &self.positions;
        let place = |i: usize| {
            (
                positions.top(i).unwrap_or(0.0),
                positions.column(i).unwrap_or(1),
            )
        };
        let recycle = self.options.recycle_items;
        let mut allocation = self.pool.allocate(range, &self.ids, recycle, place);

        // Visible rows must never wait for idle time to get a slot.
        let visible_unbound = allocation.dropped > 0
            && (range.start..=range.end).any(|i| self.pool.slot_for_index(i).is_none());
        if visible_unbound && self.pool.capacity() < ceiling {
            let target = allocation.needed.min(ceiling);
            self.pool.grow(target.saturating_sub(self.pool.capacity()), target);
            self.pool_target = self.pool_target.max(self.pool.capacity());
            vdebug!(capacity = self.pool.capacity(), "VirtualList: pool grown for visible rows");
            allocation = self.pool.allocate(range, &self.ids, recycle, place);
        }

        for slot in self.pool.slots() {
            if let Some(i) = slot.index {
                self.ledger.get(&self.ids[i], i);
            }
        }

        if allocation.dropped > 0 {
            if self.pool.capacity() < ceiling {
                self.pool_target = self.pool_target.max(allocation.needed).min(ceiling);
                self.scheduler
                    .schedule_once(Deadline::Idle, Task::GrowPool);
            } else if !self.pool_exhausted && self.options.dev_mode {
                self.warn(Warning::PoolExhausted {
                    needed: allocation.needed,
                    capacity: self.pool.capacity(),
                });
            }
        }
        self.pool_exhausted = allocation.dropped > 0;

        if !self.painted && !range.is_empty() {
            self.painted = true;
            if self.pool.capacity() < self.pool_target {
                self.scheduler
                    .schedule_once(Deadline::Idle, Task::GrowPool);
            }
        }
    }

    fn grow_pool(&mut self) {
        let added = self.pool.grow(POOL_GROWTH_STEP, self.pool_target);
        if self.pool.capacity() < self.pool_target {
            self.scheduler
                .schedule_once(Deadline::Idle, Task::GrowPool);
        }
        if added > 0 {
            self.refresh();
        }
    }

    fn publish(&self) {
        let store = &self.store;
        store.set(Topic::ScrollLength, Value::Number(self.scroll_length));
        store.set(Topic::ScrollOffset, Value::Number(self.scroll_offset));
        store.set(Topic::TotalSize, Value::Number(self.total.get()));
        store.set(Topic::AlignPadding, Value::Number(self.align_padding()));
        store.set(Topic::ScrollAdjust, Value::Number(self.adjust.applied()));
        store.set(Topic::NumContainers, Value::Count(self.pool.len()));
        for (s, slot) in self.pool.slots().iter().enumerate() {
            store.set(Topic::SlotIndex(s), Value::Index(slot.index));
            store.set(Topic::SlotPosition(s), Value::Number(slot.position));
            store.set(Topic::SlotColumn(s), Value::Count(slot.column));
            store.set(Topic::SlotHostKey(s), Value::Key(slot.host_key));
        }
        store.set(
            Topic::ScrollToActive,
            Value::Flag(self.scroll_to.is_in_flight()),
        );
        store.set(Topic::Ready, Value::Flag(self.is_ready()));
    }

    /// Starts a programmatic scroll. Returns `false` (and does nothing) when the target cannot be
    /// resolved, e.g. an index past the end or an unknown id.
    pub fn scroll_to(&mut self, request: ScrollRequest<K>, now_ms: u64) -> bool {
        if self.torn_down {
            return false;
        }
        self.now_ms = self.now_ms.max(now_ms);
        self.start_scroll_to(request, false)
    }

    pub fn scroll_to_index(&mut self, index: usize, animated: bool, now_ms: u64) -> bool {
        self.scroll_to(ScrollRequest::index(index).animated(animated), now_ms)
    }

    pub fn scroll_to_offset(&mut self, offset: f64, animated: bool, now_ms: u64) -> bool {
        self.scroll_to(ScrollRequest::offset(offset).animated(animated), now_ms)
    }

    pub fn scroll_to_end(&mut self, animated: bool, now_ms: u64) -> bool {
        self.scroll_to(ScrollRequest::end().animated(animated), now_ms)
    }

    /// Abandons the programmatic scroll in flight (e.g. the user grabbed the scroll view).
    /// Compensation queued meanwhile is applied.
    pub fn cancel_scroll_to(&mut self) {
        let Some(done) = self.scroll_to.cancel() else {
            return;
        };
        if let Some(task) = done.task {
            self.scheduler.cancel(task);
        }
        if done.is_initial {
            self.initial_scroll_done = true;
        }
        self.flush_adjust();
        self.refresh();
    }

    fn start_scroll_to(&mut self, request: ScrollRequest<K>, is_initial: bool) -> bool {
        self.apply_dirty_positions();
        let Some(target) = self.resolve_target(&request.target) else {
            vdebug!(?request, "VirtualList::scroll_to: unresolvable target");
            return false;
        };
        let animated = request.animated && !is_initial;
        let (token, previous) = self
            .scroll_to
            .begin(request, target, is_initial, self.now_ms);
        if let Some(previous) = previous {
            if let Some(task) = previous.task {
                self.scheduler.cancel(task);
            }
            if previous.is_initial {
                self.initial_scroll_done = true;
            }
        }

        self.commands
            .push(ScrollCommand::ScrollTo { offset: target, animated });
        if !animated {
            self.scroll_offset = target;
            self.scroll_to.observe_scroll(target, self.now_ms);
        }
        self.reschedule_check(token);
        self.refresh();
        true
    }

    fn reschedule_check(&mut self, token: u64) {
        let task = self
            .scheduler
            .schedule(Deadline::NextFrame, Task::CheckScrollTo { token });
        self.scroll_to.set_task(token, task);
    }

    /// Resolves a target to a clamped scroll offset from current positions.
    fn resolve_target(&mut self, target: &ScrollTarget<K>) -> Option<f64> {
        let raw = match target {
            ScrollTarget::Offset(offset) => *offset,
            ScrollTarget::Index {
                index,
                view_offset,
                view_position,
            } => self.index_offset(*index, *view_offset, *view_position)?,
            ScrollTarget::Item {
                id,
                view_offset,
                view_position,
            } => {
                let index = self.index_of(id)?;
                self.index_offset(index, *view_offset, *view_position)?
            }
            ScrollTarget::End => self.max_scroll_offset(),
        };
        raw.is_finite()
            .then(|| raw.clamp(0.0, self.max_scroll_offset()))
    }

    fn index_offset(&mut self, index: usize, view_offset: f64, view_position: f64) -> Option<f64> {
        if index >= self.ids.len() {
            return None;
        }
        let top = self.ensure_top(index);
        let size = self.row_extent(index);
        Some(scroll_to::item_offset(
            top,
            size,
            self.scroll_length,
            view_offset,
            view_position,
        ))
    }

    fn check_scroll_to(&mut self, token: u64) {
        let Some((target, fallback)) = self
            .scroll_to
            .current()
            .filter(|f| f.token == token)
            .map(|f| (f.request.target.clone(), f.issued))
        else {
            return;
        };
        self.apply_dirty_positions();
        let max_scroll = self.max_scroll_offset();
        let target = self
            .resolve_target(&target)
            .unwrap_or_else(|| fallback.clamp(0.0, max_scroll));
        let policy = self.options.convergence;

        match self.scroll_to.check(
            token,
            self.scroll_offset,
            target,
            max_scroll,
            self.now_ms,
            &policy,
        ) {
            CheckOutcome::Stale => {}
            CheckOutcome::Pending => self.reschedule_check(token),
            CheckOutcome::Reissue { offset, animated } => {
                self.commands
                    .push(ScrollCommand::ScrollTo { offset, animated });
                self.reschedule_check(token);
                if !animated {
                    self.scroll_offset = offset;
                    self.scroll_to.observe_scroll(offset, self.now_ms);
                    self.refresh();
                }
            }
            CheckOutcome::Converged(done) => self.finish_scroll_to(done, false),
            CheckOutcome::Forced(done) => self.finish_scroll_to(done, true),
        }
    }

    fn finish_scroll_to(&mut self, done: InFlight<K>, forced: bool) {
        if forced {
            self.warn(Warning::ScrollToForcedCompletion {
                target: done.issued,
                offset: self.scroll_offset,
                retries: done.retries,
            });
        }
        if done.is_initial {
            self.initial_scroll_done = true;
        }
        // Content-tracking targets were re-resolved from positions that already include the
        // queued size changes.
        if done.request.target.tracks_content() {
            let _absorbed = self.adjust.discard_pending();
            vtrace!(absorbed = _absorbed, "VirtualList: pending adjust absorbed");
        } else {
            self.flush_adjust();
        }
        vdebug!(
            token = done.token,
            forced,
            retries = done.retries,
            "VirtualList: scroll-to finished"
        );
        self.refresh();
    }

    fn flush_adjust(&mut self) {
        if let Some(delta) = self.adjust.flush(self.scroll_offset) {
            self.scroll_offset = (self.scroll_offset + delta).max(0.0);
            self.commands.push(ScrollCommand::ScrollBy { delta });
        }
    }

    fn warn(&self, warning: Warning<K>) {
        vwarn!(%warning, "virtualist warning");
        if let Some(cb) = &self.options.on_warning {
            cb(&warning);
        }
    }

    /// Drains the scroll commands the host should execute, in issue order.
    pub fn take_commands(&mut self) -> Vec<ScrollCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Cancels every scheduled task and listener. The list ignores all further input.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.scheduler.teardown();
        self.scroll_to.cancel();
        self.store.clear_listeners();
        self.commands.clear();
        vdebug!("VirtualList::teardown");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Scheduled tasks not yet run.
    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn scroll_length(&self) -> f64 {
        self.scroll_length
    }

    pub fn scroll_direction(&self) -> Option<ScrollDirection> {
        self.scroll_direction
    }

    /// Current scroll velocity in px/ms.
    pub fn velocity(&self) -> f64 {
        self.velocity.velocity(self.now_ms)
    }

    pub fn range(&self) -> ViewportRange {
        self.range
    }

    pub fn total_size(&self) -> f64 {
        self.total.get()
    }

    pub fn align_padding(&self) -> f64 {
        self.total
            .align_padding(self.scroll_length, self.options.align_items_at_end)
    }

    pub fn max_scroll_offset(&self) -> f64 {
        self.total.max_scroll_offset(self.scroll_length)
    }

    /// Position of the item at `index`, computing it if needed.
    pub fn item_position(&mut self, index: usize) -> Option<f64> {
        if index >= self.ids.len() {
            return None;
        }
        self.apply_dirty_positions();
        Some(self.ensure_top(index))
    }

    pub fn position_of(&mut self, id: &K) -> Option<f64> {
        let index = self.index_of(id)?;
        self.item_position(index)
    }

    /// Measured size of the item at `index`, or the estimate it is laid out with.
    pub fn item_size(&self, index: usize) -> Option<f64> {
        let id = self.ids.get(index)?;
        Some(self.ledger.size_of(id, index))
    }

    pub fn is_measured(&self, index: usize) -> bool {
        self.ids.get(index).is_some_and(|id| self.ledger.is_known(id))
    }

    pub fn slots(&self) -> &[Slot<K>] {
        self.pool.slots()
    }

    pub fn pool_capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Pool size the list is growing toward during idle time.
    pub fn pool_target(&self) -> usize {
        self.pool_target
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn scroll_adjust(&self) -> &ScrollAdjustHandler {
        &self.adjust
    }

    pub fn is_scroll_to_in_flight(&self) -> bool {
        self.scroll_to.is_in_flight()
    }

    pub fn has_layout(&self) -> bool {
        self.has_layout
    }

    /// Whether the host may show the list: the first layout arrived (when waiting for it) and the
    /// initial scroll converged.
    pub fn is_ready(&self) -> bool {
        (!self.options.wait_for_initial_layout || self.has_layout) && self.initial_scroll_done
    }

    pub fn snapshot(&self) -> ListSnapshot {
        ListSnapshot {
            scroll_offset: self.scroll_offset,
            scroll_length: self.scroll_length,
            total_size: self.total.get(),
            align_padding: self.align_padding(),
            range: self.range,
            ready: self.is_ready(),
            slots: self
                .pool
                .slots()
                .iter()
                .map(|slot| SlotState {
                    index: slot.index,
                    position: slot.position,
                    column: slot.column,
                    host_key: slot.host_key,
                })
                .collect(),
        }
    }

    pub fn measurement_cache_len(&self) -> usize {
        self.ledger.known_len()
    }

    /// Exports measured sizes so a later list over the same data can start from them.
    pub fn export_measurement_cache(&self) -> Vec<(K, f64)> {
        self.ledger.export_known()
    }

    pub fn import_measurement_cache(&mut self, entries: impl IntoIterator<Item = (K, f64)>) {
        self.ledger.import_known(entries);
        self.relayout_all();
    }

    /// Forgets every measurement; items fall back to estimates.
    pub fn reset_measurements(&mut self) {
        self.ledger.clear();
        self.relayout_all();
    }

    fn relayout_all(&mut self) {
        self.ledger.rebase();
        self.positions.reset(self.ids.len(), self.options.columns());
        self.dirty_from = None;
        self.recompute_total();
        self.refresh();
    }
}

impl<K: ItemKey> core::fmt::Debug for VirtualList<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VirtualList")
            .field("count", &self.ids.len())
            .field("scroll_offset", &self.scroll_offset)
            .field("scroll_length", &self.scroll_length)
            .field("total", &self.total.get())
            .field("range", &self.range)
            .field("slots", &self.pool.len())
            .field("has_layout", &self.has_layout)
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}
