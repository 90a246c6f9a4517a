use crate::*;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        // Deterministic, dependency-free PRNG for tests.
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 11
    }

    fn gen_range_usize(&mut self, start: usize, end_exclusive: usize) -> usize {
        debug_assert!(start < end_exclusive);
        start + (self.next_u64() % (end_exclusive - start) as u64) as usize
    }

    /// Whole-pixel sizes keep every sum exact in `f64`.
    fn gen_size(&mut self, start: usize, end_exclusive: usize) -> f64 {
        self.gen_range_usize(start, end_exclusive) as f64
    }
}

/// Naive row-by-row layout: `(tops, columns, total)`.
fn expected_layout(sizes: &[f64], num_columns: usize) -> (Vec<f64>, Vec<usize>, f64) {
    let mut tops = Vec::with_capacity(sizes.len());
    let mut columns = Vec::with_capacity(sizes.len());
    let mut row_top = 0.0;
    for row in sizes.chunks(num_columns) {
        for c in 0..row.len() {
            tops.push(row_top);
            columns.push(c + 1);
        }
        row_top += row.iter().copied().fold(0.0, f64::max);
    }
    (tops, columns, row_top)
}

struct FixedLayout {
    sizes: Vec<f64>,
    tops: Vec<f64>,
}

impl FixedLayout {
    fn new(sizes: Vec<f64>) -> Self {
        let (tops, _, _) = expected_layout(&sizes, 1);
        Self { sizes, tops }
    }
}

impl ItemLayout for FixedLayout {
    fn len(&self) -> usize {
        self.sizes.len()
    }

    fn valid_len(&self) -> usize {
        self.sizes.len()
    }

    fn top(&mut self, index: usize) -> f64 {
        self.tops[index]
    }

    fn extent(&mut self, index: usize) -> f64 {
        self.sizes[index]
    }
}

fn warning_sink() -> (
    Arc<Mutex<Vec<Warning<ItemId>>>>,
    impl Fn(&Warning<ItemId>) + Send + Sync + 'static,
) {
    let warnings = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&warnings);
    (warnings, move |w: &Warning<ItemId>| {
        sink.lock().unwrap().push(w.clone())
    })
}

fn bound_ids(list: &VirtualList) -> Vec<ItemId> {
    list.slots().iter().filter_map(|s| s.id.clone()).collect()
}

fn bound_indices(list: &VirtualList) -> Vec<usize> {
    let mut indices: Vec<usize> = list.slots().iter().filter_map(|s| s.index).collect();
    indices.sort_unstable();
    indices
}

fn ids(range: core::ops::Range<usize>) -> Vec<ItemId> {
    range.map(|i| i.to_string()).collect()
}

fn range(start: usize, end: usize, start_buffered: usize, end_buffered: usize) -> ViewportRange {
    ViewportRange {
        start,
        end,
        start_buffered,
        end_buffered,
        empty: false,
    }
}

fn fixed_list(count: usize, size: f64, draw_distance: f64) -> VirtualList {
    VirtualList::new(
        ListOptions::new(count, size)
            .with_draw_distance(draw_distance)
            .with_use_average_size(false)
            .with_dev_mode(true),
    )
}

#[test]
fn sizes_round_to_eighth_pixels() {
    assert_eq!(round_size(50.3), 50.25);
    assert_eq!(round_size(10.0), 10.0);
    assert_eq!(round_size(-3.0), 0.0);
    assert_eq!(round_size(f64::NAN), 0.0);
}

#[test]
fn ledger_estimate_chain_and_diffs() {
    let mut ledger: SizeLedger<ItemId> = SizeLedger::new(40.0, None, true);
    assert_eq!(ledger.get(&"a".into(), 0), 40.0);
    assert!(ledger.has(&"a".into()));
    assert!(!ledger.is_known(&"a".into()));

    // Diff is against the estimate the item was laid out with.
    assert_eq!(ledger.set(&"a".into(), 60.0), 20.0);
    assert_eq!(ledger.set(&"a".into(), 60.0), 0.0);
    assert_eq!(ledger.set(&"a".into(), 55.0), -5.0);

    // Unmeasured items keep the old fallback until the owner rebases onto the average.
    assert_eq!(ledger.average_size(), Some(55.0));
    assert_eq!(ledger.size_of(&"b".into(), 1), 40.0);
    assert!(!ledger.has(&"b".into()));
    assert!(ledger.needs_rebase());
    assert!(ledger.rebase());
    assert!(!ledger.needs_rebase());
    assert_eq!(ledger.get(&"b".into(), 1), 55.0);

    // Pinned estimates ignore later average moves.
    ledger.set(&"e".into(), 95.0);
    assert!(ledger.rebase());
    assert_eq!(ledger.size_of(&"b".into(), 1), 55.0);
    assert_eq!(ledger.size_of(&"f".into(), 2), 75.0);

    // Never laid out: nothing to compensate.
    assert_eq!(ledger.set(&"c".into(), 10.0), 0.0);

    let estimator: SizeEstimator = Arc::new(|i| 10.0 + i as f64);
    assert!(ledger.configure(40.0, Some(estimator.clone()), true));
    assert!(!ledger.configure(40.0, Some(estimator), true));
    assert_eq!(ledger.get(&"d".into(), 5), 15.0);
    // Known sizes survive reconfiguration.
    assert_eq!(ledger.peek(&"a".into()), Some(55.0));
}

#[test]
fn ledger_export_import_roundtrip() {
    let mut ledger: SizeLedger<ItemId> = SizeLedger::new(40.0, None, false);
    ledger.set(&"x".into(), 12.0);
    ledger.set(&"y".into(), 34.5);
    let mut exported = ledger.export_known();
    exported.sort_by(|a, b| a.0.cmp(&b.0));

    let mut restored: SizeLedger<ItemId> = SizeLedger::new(40.0, None, false);
    restored.import_known(exported);
    assert_eq!(restored.known_len(), 2);
    assert_eq!(restored.peek(&"y".into()), Some(34.5));
    assert_eq!(restored.get(&"z".into(), 9), 40.0);
}

#[test]
fn row_cursor_wraps_rows_by_max_size() {
    let sizes = [10.0, 30.0, 20.0, 5.0, 5.0, 5.0, 40.0];
    let mut cursor = RowCursor::START;
    let placed: Vec<(f64, usize)> = sizes.iter().map(|&s| cursor.place(s, 3)).collect();
    assert_eq!(
        placed,
        vec![
            (0.0, 1),
            (0.0, 2),
            (0.0, 3),
            (30.0, 1),
            (30.0, 2),
            (30.0, 3),
            (35.0, 1)
        ]
    );
    assert_eq!(cursor.extent(), 75.0);

    // Resuming after index 4 only looks at its row.
    let resumed = RowCursor::resume(2, 30.0, [5.0, 5.0], 3);
    assert_eq!(resumed.column, 3);
    assert_eq!(resumed.row_top, 30.0);
    assert_eq!(resumed.max_size_in_row, 5.0);
}

#[test]
fn positions_match_naive_layout_under_random_updates() {
    for seed in [1u64, 2, 3, 7, 42, 999] {
        let mut rng = Lcg::new(seed);
        let num_columns = rng.gen_range_usize(1, 5);
        let len = if seed % 2 == 0 { 700 } else { 120 };
        let mut sizes: Vec<f64> = (0..len).map(|_| rng.gen_size(1, 200)).collect();

        let mut calc = PositionCalculator::new(len, num_columns);
        calc.ensure(len - 1, |i| sizes[i]);

        for _ in 0..50 {
            let i = rng.gen_range_usize(0, len);
            sizes[i] = rng.gen_size(0, 300);
            calc.revalidate_from(i, |j| sizes[j]);
            calc.ensure(len - 1, |j| sizes[j]);

            let (tops, columns, _) = expected_layout(&sizes, num_columns);
            for j in 0..len {
                assert_eq!(calc.top(j), Some(tops[j]), "seed {seed} index {j}");
                assert_eq!(calc.column(j), Some(columns[j]), "seed {seed} index {j}");
            }
        }
    }
}

#[test]
fn positions_extend_lazily_for_large_lists() {
    let mut calc = PositionCalculator::new(10_000, 1);
    assert_eq!(calc.valid_range(), None);
    assert_eq!(calc.ensure(10, |_| 20.0), Some(200.0));
    assert_eq!(calc.valid_range(), Some((0, 10 + POSITION_LOOKAHEAD)));

    // Changes past the valid prefix need no work.
    assert_eq!(calc.invalidate_from(5_000), None);
    assert_eq!(calc.invalidate_from(3), Some(10 + POSITION_LOOKAHEAD));
    assert_eq!(calc.valid_range(), Some((0, 2)));
    assert_eq!(calc.top(3), None);

    // Small lists compute everything at once.
    let mut small = PositionCalculator::new(100, 1);
    small.ensure(0, |_| 20.0);
    assert_eq!(small.valid_range(), Some((0, 99)));
}

#[test]
fn grid_invalidation_starts_at_row_start() {
    let mut calc = PositionCalculator::new(9, 3);
    calc.ensure(8, |_| 10.0);
    assert_eq!(calc.invalidate_from(5), Some(8));
    assert_eq!(calc.valid_range(), Some((0, 2)));
    assert_eq!(row_start(5, 3), 3);
    assert_eq!(row_extent(4, 9, 3, |i| if i == 5 { 25.0 } else { 10.0 }), 25.0);
}

#[test]
fn total_size_matches_rows_and_padding() {
    let sizes = [10.0, 30.0, 20.0, 5.0, 5.0];
    let mut total = TotalSize::default();
    assert_eq!(total.recompute(sizes.len(), 3, |i| sizes[i]), 35.0);
    assert_eq!(total.recompute(sizes.len(), 1, |i| sizes[i]), 70.0);

    assert_eq!(total.align_padding(100.0, true), 30.0);
    assert_eq!(total.align_padding(100.0, false), 0.0);
    assert_eq!(total.align_padding(50.0, true), 0.0);
    assert_eq!(total.max_scroll_offset(50.0), 20.0);
    assert_eq!(total.max_scroll_offset(100.0), 0.0);

    total.add(-100.0);
    assert_eq!(total.get(), 0.0);
}

#[test]
fn viewport_resolves_visible_range() {
    let mut layout = FixedLayout::new(vec![50.0; 1000]);
    let policy = BufferPolicy::default();

    let r = resolve_viewport(&mut layout, 500.0, 300.0, 0.0, 0.0, policy);
    assert_eq!((r.start, r.end), (10, 16));
    assert_eq!((r.start_buffered, r.end_buffered), (10, 16));

    let r = resolve_viewport(&mut layout, 500.0, 300.0, 100.0, 0.0, policy);
    assert_eq!((r.start, r.end), (10, 16));
    assert_eq!((r.start_buffered, r.end_buffered), (8, 18));

    // Scrolled past the content: clamp to the last item.
    let r = resolve_viewport(&mut layout, 60_000.0, 300.0, 0.0, 0.0, policy);
    assert_eq!((r.start, r.end), (999, 999));

    let mut empty = FixedLayout::new(Vec::new());
    assert!(resolve_viewport(&mut empty, 0.0, 300.0, 100.0, 0.0, policy).is_empty());
}

#[test]
fn viewport_buffer_follows_velocity() {
    let mut layout = FixedLayout::new(vec![50.0; 1000]);
    let policy = BufferPolicy::default();

    assert_eq!(policy.split(100.0, 0.0), (100.0, 100.0));
    assert_eq!(policy.split(100.0, 2.0), (50.0, 200.0));
    assert_eq!(policy.split(100.0, -2.0), (200.0, 50.0));
    // Capped.
    assert_eq!(policy.split(100.0, 50.0), (50.0, 300.0));

    let r = resolve_viewport(&mut layout, 500.0, 300.0, 100.0, 2.0, policy);
    assert_eq!((r.start_buffered, r.end_buffered), (9, 20));
    let r = resolve_viewport(&mut layout, 500.0, 300.0, 100.0, -2.0, policy);
    assert_eq!((r.start_buffered, r.end_buffered), (6, 17));
}

#[test]
fn viewport_range_is_tight_for_random_sizes() {
    for seed in [3u64, 11, 77] {
        let mut rng = Lcg::new(seed);
        let sizes: Vec<f64> = (0..300).map(|_| rng.gen_size(1, 120)).collect();
        let (tops, _, total) = expected_layout(&sizes, 1);
        let mut layout = FixedLayout::new(sizes.clone());

        for _ in 0..100 {
            let offset = rng.gen_range_usize(0, total as usize) as f64;
            let length = rng.gen_size(1, 800);
            let r = resolve_viewport(&mut layout, offset, length, 0.0, 0.0, BufferPolicy::default());

            for i in r.start..=r.end {
                assert!(tops[i] + sizes[i] > offset, "seed {seed} item {i} ends before viewport");
                assert!(tops[i] <= offset + length, "seed {seed} item {i} starts after viewport");
            }
            if r.start > 0 {
                let before = r.start - 1;
                assert!(tops[before] + sizes[before] <= offset);
            }
            if r.end + 1 < sizes.len() {
                assert!(tops[r.end + 1] > offset + length);
            }
        }
    }
}

#[test]
fn velocity_tracker_uses_recent_samples() {
    let mut tracker = VelocityTracker::new();
    assert_eq!(tracker.velocity(0), 0.0);
    tracker.add(0, 0.0);
    assert_eq!(tracker.velocity(0), 0.0);
    tracker.add(10, 20.0);
    tracker.add(20, 40.0);
    assert_eq!(tracker.velocity(20), 2.0);
    // Stale samples.
    assert_eq!(tracker.velocity(500), 0.0);
    tracker.add(30, 30.0);
    assert_eq!(tracker.velocity(30), 1.0);
}

#[test]
fn pool_places_visible_items_first_and_keeps_bindings() {
    let ids = ids(0..100);
    let mut pool: ContainerPool<ItemId> = ContainerPool::new(20);
    let place = |i: usize| (i as f64 * 10.0, 1);

    let a = pool.allocate(range(10, 20, 8, 22), &ids, false, place);
    assert_eq!(a.needed, 15);
    assert_eq!(a.placed, 15);
    assert_eq!(a.dropped, 0);
    assert_eq!(pool.slot(0).and_then(|s| s.index), Some(10));
    assert_eq!(pool.slot(10).and_then(|s| s.index), Some(20));
    assert_eq!(pool.slot(11).and_then(|s| s.index), Some(9));
    assert_eq!(pool.slot(14).and_then(|s| s.index), Some(22));

    let key_of_15 = pool.slot_for_index(15).map(|s| pool.slots()[s].host_key);
    let slot_of_8 = pool.slot_for_index(8);
    assert_eq!(slot_of_8, Some(13));

    let b = pool.allocate(range(11, 21, 9, 23), &ids, false, place);
    assert_eq!(b.placed, 1);
    // Kept items stay in their slots.
    assert_eq!(pool.slot_for_index(15).map(|s| pool.slots()[s].host_key), key_of_15);
    assert_eq!(pool.slot_for_index(15), Some(5));
    // The freed slot is reused for the new edge item with a new identity.
    assert_eq!(pool.slot_for_index(23), Some(13));
    assert_ne!(pool.slots()[13].host_key, 13);
    assert_eq!(pool.slots()[13].position, 230.0);
    assert_eq!(pool.slot_for_index(8), None);
}

#[test]
fn pool_recycling_keeps_host_keys() {
    let ids = ids(0..10);
    let mut pool: ContainerPool<ItemId> = ContainerPool::new(3);
    let place = |i: usize| (i as f64, 1);
    pool.allocate(range(0, 2, 0, 2), &ids, true, place);
    let keys: Vec<u64> = pool.slots().iter().map(|s| s.host_key).collect();
    pool.allocate(range(5, 7, 5, 7), &ids, true, place);
    assert_eq!(
        pool.slots().iter().map(|s| s.host_key).collect::<Vec<_>>(),
        keys
    );
    assert_eq!(pool.slots()[0].last_id(), Some(&"5".to_string()));
}

#[test]
fn pool_prefers_slot_that_last_rendered_the_item() {
    let ids = ids(0..10);
    let mut pool: ContainerPool<ItemId> = ContainerPool::new(4);
    let place = |i: usize| (i as f64, 1);
    pool.allocate(range(0, 2, 0, 2), &ids, false, place);
    assert_eq!(pool.len(), 3);
    let key_of_2 = pool.slots()[2].host_key;

    pool.allocate(range(5, 5, 5, 5), &ids, false, place);
    assert_eq!(pool.slot_for_index(5), Some(0));

    pool.allocate(range(2, 2, 2, 2), &ids, false, place);
    assert_eq!(pool.slot_for_index(2), Some(2));
    assert_eq!(pool.slots()[2].host_key, key_of_2);
}

#[test]
fn pool_follows_items_across_index_shifts() {
    let before = ids(0..20);
    let mut pool: ContainerPool<ItemId> = ContainerPool::new(10);
    pool.allocate(range(5, 8, 5, 8), &before, false, |i| (i as f64, 1));
    let slot = pool.slot_for_index(5);

    // Two items prepended.
    let mut after = vec!["p0".to_string(), "p1".to_string()];
    after.extend(before);
    pool.allocate(range(7, 10, 7, 10), &after, false, |i| (i as f64, 1));
    assert_eq!(pool.slot_for_index(7), slot);
    assert_eq!(pool.slots()[slot.unwrap()].id.as_deref(), Some("5"));
}

#[test]
fn pool_drops_edges_when_full() {
    let ids = ids(0..100);
    let mut pool: ContainerPool<ItemId> = ContainerPool::new(5);
    let a = pool.allocate(range(10, 12, 8, 14), &ids, false, |i| (i as f64, 1));
    assert_eq!(a.needed, 7);
    assert_eq!(a.dropped, 2);
    let mut bound: Vec<usize> = pool.slots().iter().filter_map(|s| s.index).collect();
    bound.sort_unstable();
    assert_eq!(bound, vec![9, 10, 11, 12, 13]);

    assert_eq!(pool.grow(4, 7), 2);
    assert_eq!(pool.capacity(), 7);
    assert_eq!(pool.len(), 7);
    assert!(pool.slots()[6].is_free());
    assert_eq!(pool.slots()[6].position, POSITION_OUT_OF_VIEW);
}

#[test]
fn store_delivers_nested_writes_in_order() {
    let store = StateStore::new();
    let log = Rc::new(RefCell::new(Vec::new()));

    let writer = store.clone();
    let _a = store.subscribe(Topic::TotalSize, move |_, _| {
        writer.set(Topic::ScrollOffset, Value::Number(5.0));
    });
    let l = Rc::clone(&log);
    let _b = store.subscribe(Topic::TotalSize, move |_, v| {
        l.borrow_mut().push(format!("total:{}", v.as_number().unwrap()));
    });
    let l = Rc::clone(&log);
    let _c = store.subscribe(Topic::ScrollOffset, move |_, v| {
        l.borrow_mut().push(format!("offset:{}", v.as_number().unwrap()));
    });

    assert!(store.set(Topic::TotalSize, Value::Number(10.0)));
    assert_eq!(*log.borrow(), vec!["total:10", "offset:5"]);

    // Equal writes are dropped.
    assert!(!store.set(Topic::TotalSize, Value::Number(10.0)));
    assert_eq!(log.borrow().len(), 2);
    assert_eq!(store.peek_number(Topic::ScrollOffset), 5.0);
}

#[test]
fn store_subscription_disposer_unsubscribes() {
    let store = StateStore::new();
    let hits = Rc::new(RefCell::new(0));
    let h = Rc::clone(&hits);
    let sub = store.subscribe(Topic::Ready, move |_, _| *h.borrow_mut() += 1);
    assert_eq!(store.listener_count(Topic::Ready), 1);

    store.set(Topic::Ready, Value::Flag(true));
    drop(sub);
    assert_eq!(store.listener_count(Topic::Ready), 0);
    store.set(Topic::Ready, Value::Flag(false));
    assert_eq!(*hits.borrow(), 1);
}

#[test]
fn scheduler_runs_tasks_by_phase() {
    let mut scheduler = FrameScheduler::new();
    scheduler.schedule(Deadline::Microtask, Task::FlushSizes);
    let check = scheduler
        .schedule(Deadline::NextFrame, Task::CheckScrollTo { token: 1 })
        .unwrap();
    scheduler.schedule(Deadline::Idle, Task::GrowPool);
    scheduler.schedule(Deadline::At(100), Task::CheckScrollTo { token: 2 });

    // Coalesced.
    scheduler.schedule_once(Deadline::Idle, Task::GrowPool);
    assert_eq!(scheduler.len(), 4);

    assert_eq!(scheduler.take_due(Phase::Microtasks), vec![Task::FlushSizes]);
    assert!(scheduler.cancel(check));
    assert!(!scheduler.cancel(check));

    let due = scheduler.take_due(Phase::Frame {
        now_ms: 50,
        run_idle: false,
    });
    assert!(due.is_empty());
    assert_eq!(
        scheduler.take_due(Phase::Idle { now_ms: 60 }),
        vec![Task::GrowPool]
    );
    assert_eq!(
        scheduler.take_due(Phase::Frame {
            now_ms: 100,
            run_idle: false
        }),
        vec![Task::CheckScrollTo { token: 2 }]
    );
    assert!(scheduler.is_empty());
}

#[test]
fn scheduler_teardown_cancels_everything() {
    let mut scheduler = FrameScheduler::new();
    scheduler.schedule(Deadline::NextFrame, Task::GrowPool);
    scheduler.teardown();
    assert!(scheduler.is_empty());
    assert!(scheduler.is_torn_down());
    assert_eq!(scheduler.schedule(Deadline::NextFrame, Task::GrowPool), None);
}

#[test]
fn scroll_adjust_queues_while_scroll_to_in_flight() {
    let mut adjust = ScrollAdjustHandler::new();
    assert_eq!(adjust.request_adjust(0.0, 100.0, false), None);
    assert_eq!(adjust.request_adjust(30.0, 100.0, false), Some(30.0));
    assert_eq!(
        adjust.state(),
        AdjustState::Adjusting {
            from_offset: 100.0,
            expected_offset: 130.0
        }
    );
    // The host reporting where it was before the adjustment landed is stale.
    assert!(!adjust.on_scroll(100.0, 1.0));
    assert!(adjust.is_adjusting());
    assert!(adjust.on_scroll(129.5, 1.0));
    assert_eq!(adjust.state(), AdjustState::Idle);

    assert_eq!(adjust.request_adjust(10.0, 130.0, true), None);
    assert_eq!(adjust.request_adjust(5.0, 130.0, true), None);
    assert_eq!(adjust.pending(), 15.0);
    assert_eq!(adjust.flush(130.0), Some(15.0));
    assert_eq!(adjust.flush(145.0), None);
    assert_eq!(adjust.applied(), 45.0);

    adjust.request_adjust(7.0, 145.0, true);
    assert_eq!(adjust.discard_pending(), 7.0);
    assert_eq!(adjust.applied(), 45.0);
}

#[test]
fn scroll_to_controller_outcomes() {
    let policy = ConvergencePolicy::default();
    let mut ctl: ScrollToController<ItemId> = ScrollToController::new();

    let (token, previous) = ctl.begin(ScrollRequest::offset(100.0), 100.0, false, 0);
    assert!(previous.is_none());
    assert!(matches!(
        ctl.check(token + 1, 100.0, 100.0, 1000.0, 16, &policy),
        CheckOutcome::Stale
    ));
    assert!(matches!(
        ctl.check(token, 100.4, 100.0, 1000.0, 16, &policy),
        CheckOutcome::Converged(_)
    ));
    assert!(!ctl.is_in_flight());

    // Target moved by measurements: corrective command.
    let (token, _) = ctl.begin(ScrollRequest::index(10), 100.0, false, 0);
    match ctl.check(token, 100.0, 150.0, 1000.0, 16, &policy) {
        CheckOutcome::Reissue { offset, animated } => {
            assert_eq!(offset, 150.0);
            assert!(!animated);
        }
        other => panic!("expected reissue, got {other:?}"),
    }
    assert_eq!(ctl.current().map(|f| f.retries), Some(1));

    // A new request supersedes the one in flight.
    let (_, previous) = ctl.begin(ScrollRequest::end(), 0.0, false, 20);
    assert_eq!(previous.map(|p| p.token), Some(token));
}

#[test]
fn scroll_to_controller_forces_completion() {
    let policy = ConvergencePolicy {
        max_retries: 2,
        ..ConvergencePolicy::default()
    };
    let mut ctl: ScrollToController<ItemId> = ScrollToController::new();

    let (token, _) = ctl.begin(ScrollRequest::index(3), 100.0, false, 0);
    assert!(matches!(
        ctl.check(token, 100.0, 150.0, 1000.0, 16, &policy),
        CheckOutcome::Reissue { .. }
    ));
    assert!(matches!(
        ctl.check(token, 150.0, 200.0, 1000.0, 32, &policy),
        CheckOutcome::Reissue { .. }
    ));
    match ctl.check(token, 200.0, 250.0, 1000.0, 48, &policy) {
        CheckOutcome::Forced(done) => assert_eq!(done.retries, 2),
        other => panic!("expected forced completion, got {other:?}"),
    }

    // Never arriving: the settle timeout ends it.
    let (token, _) = ctl.begin(ScrollRequest::offset(100.0), 100.0, false, 0);
    assert!(matches!(
        ctl.check(token, 0.0, 100.0, 1000.0, 50, &policy),
        CheckOutcome::Pending
    ));
    assert!(matches!(
        ctl.check(token, 0.0, 100.0, 1000.0, 120, &policy),
        CheckOutcome::Forced(_)
    ));
}

#[test]
fn scroll_to_controller_animated_corrections() {
    let policy = ConvergencePolicy {
        max_retries: 1,
        ..ConvergencePolicy::default()
    };
    let mut ctl: ScrollToController<ItemId> = ScrollToController::new();

    let (token, _) = ctl.begin(ScrollRequest::index(3).animated(true), 100.0, false, 0);
    assert!(matches!(
        ctl.check(token, 40.0, 150.0, 1000.0, 16, &policy),
        CheckOutcome::Reissue {
            offset,
            animated: true
        } if offset == 150.0
    ));
    // Out of retries: one immediate jump before giving up.
    assert!(matches!(
        ctl.check(token, 80.0, 170.0, 1000.0, 32, &policy),
        CheckOutcome::Reissue {
            offset,
            animated: false
        } if offset == 170.0
    ));
    assert_eq!(ctl.current().map(|f| f.animated), Some(false));
    assert!(matches!(
        ctl.check(token, 170.0, 170.0, 1000.0, 48, &policy),
        CheckOutcome::Converged(_)
    ));

    // The initial scroll never animates.
    let _ = ctl.begin(ScrollRequest::index(3).animated(true), 100.0, true, 64);
    assert_eq!(ctl.current().map(|f| f.animated), Some(false));
}

#[test]
fn scroll_request_builders() {
    let req: ScrollRequest<ItemId> = ScrollRequest::index(4)
        .with_view_offset(10.0)
        .with_view_position(0.5)
        .animated(true);
    assert_eq!(
        req.target,
        ScrollTarget::Index {
            index: 4,
            view_offset: 10.0,
            view_position: 0.5
        }
    );
    assert!(req.animated);
    assert!(!ScrollTarget::<ItemId>::Offset(1.0).tracks_content());
    assert_eq!(item_offset(1000.0, 50.0, 300.0, 0.0, 0.5), 875.0);
}

#[test]
fn list_resolves_viewport_after_layout() {
    let mut list = fixed_list(1000, 50.0, 0.0);
    assert!(!list.is_ready());
    assert!(list.slots().is_empty());
    assert_eq!(list.total_size(), 50_000.0);

    list.on_layout(300.0);
    assert!(list.is_ready());
    list.on_scroll(500.0, 0);
    let r = list.range();
    assert_eq!((r.start, r.end), (10, 16));
    assert_eq!(bound_indices(&list), (10..=16).collect::<Vec<_>>());
    assert_eq!(list.scroll_direction(), Some(ScrollDirection::Forward));

    for slot in list.slots().iter().filter(|s| s.index.is_some()) {
        let index = slot.index.unwrap();
        assert_eq!(slot.position, index as f64 * 50.0);
    }
}

#[test]
fn list_resize_above_viewport_adjusts_scroll_once() {
    let mut list = fixed_list(1000, 50.0, 0.0);
    list.on_layout(300.0);
    list.on_scroll(500.0, 0);
    assert!(list.take_commands().is_empty());

    list.measure(5, 120.0);
    assert_eq!(list.take_commands(), vec![ScrollCommand::ScrollBy { delta: 70.0 }]);
    assert_eq!(list.scroll_offset(), 570.0);
    assert_eq!(list.total_size(), 50_070.0);
    assert_eq!(list.scroll_adjust().applied(), 70.0);

    list.tick(16);
    list.measure(5, 120.0);
    list.tick(32);
    assert!(list.take_commands().is_empty());
    assert_eq!(list.scroll_adjust().applied(), 70.0);
    assert_eq!(list.item_position(10), Some(570.0));

    // Items at or below the leading edge never adjust.
    list.measure(12, 80.0);
    assert!(list.take_commands().is_empty());
}

#[test]
fn list_duplicate_keys_warn_and_last_wins() {
    let (warnings, sink) = warning_sink();
    let options = ListOptions::new(10, 20.0)
        .with_key_extractor(|i| match i {
            3 | 7 => "dup".to_string(),
            _ => i.to_string(),
        })
        .with_dev_mode(true)
        .with_on_warning(Some(sink));
    let list = VirtualList::new(options);

    assert_eq!(
        *warnings.lock().unwrap(),
        vec![Warning::DuplicateKey {
            key: "dup".to_string(),
            first: 3,
            second: 7
        }]
    );
    assert_eq!(list.index_of(&"dup".to_string()), Some(7));
}

#[test]
fn list_scroll_to_last_item_converges_while_measuring() {
    let (warnings, sink) = warning_sink();
    let mut list = VirtualList::new(
        ListOptions::new(1000, 50.0)
            .with_dev_mode(true)
            .with_on_warning(Some(sink)),
    );
    list.on_layout(500.0);
    assert!(list.scroll_to_index(999, false, 0));
    assert!(list.is_scroll_to_in_flight());

    let mut now = 0;
    for _ in 0..10 {
        // The host renders every bound slot; real items are taller than estimated.
        for id in bound_ids(&list) {
            list.on_item_layout(&id, LayoutSize::new(320.0, 80.0));
        }
        now += 16;
        list.tick(now);
        if !list.is_scroll_to_in_flight() {
            break;
        }
    }

    assert!(!list.is_scroll_to_in_flight());
    assert!(warnings.lock().unwrap().is_empty());
    assert_eq!(list.scroll_offset(), list.max_scroll_offset());
    let commands = list.take_commands();
    assert!(matches!(commands.last(), Some(ScrollCommand::ScrollTo { offset, animated: false }) if *offset == list.max_scroll_offset()));
    assert!(commands.len() <= 1 + ConvergencePolicy::default().max_retries as usize);
    assert!(list.range().contains(999));
}

#[test]
fn list_initial_scroll_gates_ready() {
    let mut list = VirtualList::new(ListOptions::new(1000, 50.0).with_initial_scroll_index(50));
    let ready = Rc::new(RefCell::new(Vec::new()));
    let r = Rc::clone(&ready);
    let _sub = list.store().subscribe(Topic::Ready, move |_, v| {
        r.borrow_mut().push(v.as_flag().unwrap());
    });

    list.on_layout(300.0);
    assert!(!list.is_ready());
    assert_eq!(
        list.take_commands(),
        vec![ScrollCommand::ScrollTo {
            offset: 2500.0,
            animated: false
        }]
    );
    assert_eq!(list.range().start, 50);

    list.tick(16);
    assert!(list.is_ready());
    assert_eq!(*ready.borrow(), vec![true]);
    assert!(list.store().peek_flag(Topic::Ready));
}

#[test]
fn list_initial_scroll_to_missing_index_is_ready() {
    let mut list = VirtualList::new(ListOptions::new(10, 50.0).with_initial_scroll_index(50));
    list.on_layout(300.0);
    assert!(list.is_ready());
    assert!(list.take_commands().is_empty());
}

#[test]
fn list_out_of_range_scroll_requests_are_noops() {
    let mut list = fixed_list(10, 50.0, 0.0);
    list.on_layout(300.0);
    assert!(!list.scroll_to_index(10, false, 0));
    assert!(!list.scroll_to(ScrollRequest::item("nope".to_string()), 0));
    assert!(list.take_commands().is_empty());

    assert!(list.scroll_to_end(true, 0));
    assert_eq!(
        list.take_commands(),
        vec![ScrollCommand::ScrollTo {
            offset: 200.0,
            animated: true
        }]
    );
    // Animated requests wait for the host to report progress.
    assert_eq!(list.scroll_offset(), 0.0);
    list.on_scroll(200.0, 10);
    list.tick(16);
    assert!(!list.is_scroll_to_in_flight());
}

#[test]
fn list_pool_grows_toward_ratio_in_idle_time() {
    let mut list = fixed_list(1000, 50.0, 0.0);
    list.on_layout(300.0);
    assert_eq!(list.pool_capacity(), 7);
    assert_eq!(list.pool_target(), 14);

    list.tick(16);
    assert_eq!(list.pool_capacity(), 11);
    list.tick(32);
    list.tick(48);
    assert_eq!(list.pool_capacity(), 14);
    assert_eq!(list.slots().len(), 14);
    assert_eq!(list.store().peek(Topic::NumContainers), Some(Value::Count(14)));
    assert_eq!(bound_indices(&list), (0..=6).collect::<Vec<_>>());
}

#[test]
fn list_pool_ceiling_warns_once() {
    let (warnings, sink) = warning_sink();
    let mut list = VirtualList::new(
        ListOptions::new(1000, 50.0)
            .with_draw_distance(0.0)
            .with_max_container_pool_size(Some(3))
            .with_dev_mode(true)
            .with_on_warning(Some(sink)),
    );
    list.on_layout(300.0);
    list.on_scroll(10.0, 0);
    assert_eq!(list.slots().len(), 3);
    assert_eq!(
        *warnings.lock().unwrap(),
        vec![Warning::PoolExhausted {
            needed: 7,
            capacity: 3
        }]
    );
}

#[test]
fn list_grid_rows_use_tallest_item() {
    let mut list = VirtualList::new(
        ListOptions::new(10, 100.0)
            .with_num_columns(3)
            .with_use_average_size(false),
    );
    assert_eq!(list.total_size(), 400.0);

    list.measure(1, 150.0);
    assert_eq!(list.total_size(), 450.0);
    // Same row, smaller than the row max: nothing moves.
    list.measure(2, 120.0);
    assert_eq!(list.total_size(), 450.0);

    list.flush();
    assert_eq!(list.item_position(3), Some(150.0));
    assert_eq!(list.item_position(9), Some(350.0));

    list.on_layout(1000.0);
    let slot = list
        .slots()
        .iter()
        .find(|s| s.index == Some(4))
        .cloned()
        .unwrap();
    assert_eq!(slot.column, 2);
    assert_eq!(slot.position, 150.0);
}

#[test]
fn list_keeps_anchor_on_prepend() {
    let data = Arc::new(Mutex::new(ids(0..100)));
    let keys = Arc::clone(&data);
    let mut list = VirtualList::new(
        ListOptions::new_with_key(100, 50.0, move |i| keys.lock().unwrap()[i].clone())
            .with_draw_distance(0.0)
            .with_maintain_visible_content_position(MaintainVisibleContentPosition {
                data_changes: true,
                scroll: true,
            }),
    );
    list.on_layout(300.0);
    list.on_scroll(500.0, 0);
    assert_eq!(list.range().start, 10);

    {
        let mut data = data.lock().unwrap();
        for i in (0..5).rev() {
            data.insert(0, format!("p{i}"));
        }
    }
    list.set_count(105);

    assert_eq!(list.take_commands(), vec![ScrollCommand::ScrollBy { delta: 250.0 }]);
    assert_eq!(list.scroll_offset(), 750.0);
    assert_eq!(list.range().start, 15);
    assert_eq!(list.key_for(15).map(String::as_str), Some("10"));
}

#[test]
fn list_ignores_untrusted_zero_sizes_and_unknown_ids() {
    let mut list = VirtualList::new(ListOptions::new(10, 50.0).with_capabilities(
        HostCapabilities {
            zero_size_layouts_trusted: false,
            idle_callbacks: true,
        },
    ));
    list.measure(0, 0.0);
    assert!(!list.is_measured(0));
    list.on_item_layout(&"missing".to_string(), LayoutSize::new(10.0, 10.0));
    assert_eq!(list.measurement_cache_len(), 0);

    list.on_item_layout(&"1".to_string(), LayoutSize::new(10.0, 30.0));
    assert!(list.is_measured(1));
    assert_eq!(list.item_size(1), Some(30.0));
}

#[test]
fn list_horizontal_measures_width() {
    let mut list = VirtualList::new(ListOptions::new(10, 50.0).with_horizontal(true));
    list.on_item_layout(&"0".to_string(), LayoutSize::new(70.0, 10.0));
    assert_eq!(list.item_size(0), Some(70.0));
    assert_eq!(list.total_size(), 520.0);
}

#[test]
fn list_aligns_short_content_at_end() {
    let mut list = VirtualList::new(ListOptions::new(3, 50.0).with_align_items_at_end(true));
    list.on_layout(300.0);
    assert_eq!(list.align_padding(), 150.0);
    assert_eq!(list.store().peek_number(Topic::AlignPadding), 150.0);
    assert_eq!(list.snapshot().align_padding, 150.0);
}

#[test]
fn list_measurement_cache_roundtrip() {
    let mut list = fixed_list(50, 40.0, 0.0);
    list.measure_many([(0, 10.0), (3, 90.0)]);
    let exported = list.export_measurement_cache();
    assert_eq!(exported.len(), 2);

    let mut restored = fixed_list(50, 40.0, 0.0);
    restored.import_measurement_cache(exported);
    assert_eq!(restored.item_size(3), Some(90.0));
    assert_eq!(restored.total_size(), list.total_size());
    assert_eq!(restored.item_position(4), Some(180.0));

    restored.reset_measurements();
    assert_eq!(restored.total_size(), 2000.0);
}

#[test]
fn list_teardown_cancels_work() {
    let mut list = fixed_list(1000, 50.0, 100.0);
    list.on_layout(300.0);
    list.scroll_to_index(500, false, 0);
    assert!(list.pending_tasks() > 0);

    let hits = Rc::new(RefCell::new(0));
    let h = Rc::clone(&hits);
    let _sub = list
        .store()
        .subscribe(Topic::ScrollOffset, move |_, _| *h.borrow_mut() += 1);

    list.teardown();
    assert!(list.is_torn_down());
    assert_eq!(list.pending_tasks(), 0);
    assert!(!list.is_scroll_to_in_flight());
    assert_eq!(list.store().listener_count(Topic::ScrollOffset), 0);

    list.on_scroll(10.0, 16);
    list.tick(32);
    assert!(!list.scroll_to_index(1, false, 48));
    assert_eq!(*hits.borrow(), 0);
    assert!(list.take_commands().is_empty());
}

#[test]
fn list_update_options_rebuilds_on_count_change() {
    let mut list = fixed_list(10, 50.0, 0.0);
    list.measure(2, 80.0);
    list.update_options(|o| o.count = 20);
    assert_eq!(list.count(), 20);
    assert_eq!(list.total_size(), 20.0 * 50.0 + 30.0);
    assert!(list.is_measured(2));

    list.batch_update(|l| {
        l.set_count(5);
        l.set_count(6);
    });
    assert_eq!(list.count(), 6);
}

#[test]
fn list_large_collections_stay_consistent_with_random_measurements() {
    let mut rng = Lcg::new(2024);
    let mut list = fixed_list(5_000, 40.0, 200.0);
    list.on_layout(600.0);

    let mut now = 0;
    for _ in 0..60 {
        let offset = rng.gen_range_usize(0, list.max_scroll_offset() as usize) as f64;
        now += 16;
        list.on_scroll(offset, now);
        for id in bound_ids(&list) {
            let size = rng.gen_size(20, 90);
            list.on_item_layout(&id, LayoutSize::new(100.0, size));
        }
        list.tick(now);
        list.take_commands();

        // Bound slots stay inside the buffered range, once each, in position order.
        let r = list.range();
        let bound = bound_indices(&list);
        assert!((r.start..=r.end).all(|i| bound.contains(&i)));
        assert!(bound.windows(2).all(|w| w[0] < w[1]));
        assert!(bound.iter().all(|&i| r.contains_buffered(i)));
        if list.pool_capacity() >= r.buffered_len() {
            assert_eq!(bound, (r.start_buffered..=r.end_buffered).collect::<Vec<_>>());
        }
        let mut prev = f64::NEG_INFINITY;
        for i in bound {
            let top = list.item_position(i).unwrap();
            assert!(top >= prev);
            prev = top;
        }
    }
}

#[test]
fn list_pool_binds_every_visible_row_immediately() {
    let mut list = fixed_list(1000, 100.0, 0.0);
    list.on_layout(600.0);
    assert_eq!(list.pool_capacity(), 7);

    // Items turn out much smaller, so far more rows fit than the pool was sized for.
    list.measure_many((0..60).map(|i| (i, 20.0)));
    list.flush();

    let r = list.range();
    assert_eq!((r.start, r.end), (0, 30));
    assert!(list.pool_capacity() >= 31);
    assert_eq!(bound_indices(&list), (0..=30).collect::<Vec<_>>());
}

#[test]
fn list_shown_items_keep_their_estimate_when_the_average_moves() {
    let mut list = VirtualList::new(ListOptions::new(100, 50.0).with_draw_distance(0.0));
    list.on_layout(300.0);
    let shown = bound_indices(&list);
    assert_eq!(shown, (0..=6).collect::<Vec<_>>());

    list.measure(0, 100.0);
    list.flush();
    assert!(list.take_commands().is_empty());
    assert_eq!(list.scroll_offset(), 0.0);

    for &i in &shown[1..] {
        assert_eq!(list.item_size(i), Some(50.0));
    }
    assert_eq!(list.item_size(50), Some(100.0));

    let sizes: Vec<f64> = (0..100).map(|i| list.item_size(i).unwrap()).collect();
    let (tops, _, total) = expected_layout(&sizes, 1);
    assert_eq!(list.total_size(), total);
    assert_eq!(list.item_position(10), Some(tops[10]));
}

#[test]
fn list_average_applies_to_unseen_items_before_layout() {
    let mut list = VirtualList::new(ListOptions::new(1000, 50.0));
    list.measure_many((0..10).map(|i| (i, 100.0)));
    list.flush();
    assert_eq!(list.item_size(500), Some(100.0));
    assert_eq!(list.total_size(), 100_000.0);
    assert_eq!(list.measurement_cache_len(), 10);
}

#[test]
fn list_rebased_estimates_keep_visible_items_in_place() {
    let mut list = VirtualList::new(ListOptions::new(1000, 50.0).with_draw_distance(0.0));
    list.on_layout(300.0);
    list.on_scroll(10_000.0, 0);
    assert_eq!(list.range().start, 200);

    list.measure_many((200..=206).map(|i| (i, 100.0)));
    assert!(list.take_commands().is_empty());
    list.flush();

    // Items 0..=6 were shown at 50 and stay there; 7..200 follow the new average.
    assert_eq!(list.take_commands(), vec![ScrollCommand::ScrollBy { delta: 9650.0 }]);
    assert_eq!(list.scroll_offset(), 19_650.0);
    assert_eq!(list.item_position(200), Some(19_650.0));
    assert_eq!(list.range().start, 200);
}

#[test]
fn list_batched_measurements_compensate_against_current_tops() {
    let mut list = fixed_list(1000, 50.0, 0.0);
    list.on_layout(300.0);
    list.on_scroll(500.0, 0);

    list.measure(8, 150.0);
    assert_eq!(list.scroll_offset(), 600.0);
    // Item 11 sat above the old offset but is below the adjusted one.
    list.measure(11, 80.0);
    assert_eq!(list.take_commands(), vec![ScrollCommand::ScrollBy { delta: 100.0 }]);
    assert_eq!(list.scroll_offset(), 600.0);
    assert_eq!(list.item_position(11), Some(650.0));
}

#[test]
fn list_stale_scroll_report_does_not_undo_compensation() {
    let mut list = fixed_list(1000, 50.0, 0.0);
    list.on_layout(300.0);
    list.on_scroll(500.0, 0);

    list.measure(5, 120.0);
    assert_eq!(list.take_commands(), vec![ScrollCommand::ScrollBy { delta: 70.0 }]);
    assert_eq!(list.scroll_offset(), 570.0);

    list.on_scroll(500.0, 5);
    assert_eq!(list.scroll_offset(), 570.0);
    assert!(list.scroll_adjust().is_adjusting());

    list.on_scroll(570.0, 6);
    assert!(!list.scroll_adjust().is_adjusting());
    list.on_scroll(400.0, 7);
    assert_eq!(list.scroll_offset(), 400.0);
}

#[test]
fn list_animated_scroll_to_corrects_without_jumping() {
    let mut list = fixed_list(1000, 50.0, 0.0);
    list.on_layout(300.0);
    assert!(list.scroll_to_index(500, true, 0));
    assert_eq!(
        list.take_commands(),
        vec![ScrollCommand::ScrollTo {
            offset: 25_000.0,
            animated: true
        }]
    );

    // The host animation is under way when items above the target grow.
    list.on_scroll(100.0, 5);
    list.measure_many((0..10).map(|i| (i, 60.0)));
    list.tick(16);
    assert_eq!(
        list.take_commands(),
        vec![ScrollCommand::ScrollTo {
            offset: 25_100.0,
            animated: true
        }]
    );
    assert_eq!(list.scroll_offset(), 100.0);

    list.tick(32);
    assert!(list.take_commands().is_empty());

    // The animation stalled: one immediate correction lands it.
    list.tick(200);
    assert_eq!(
        list.take_commands(),
        vec![ScrollCommand::ScrollTo {
            offset: 25_100.0,
            animated: false
        }]
    );
    assert_eq!(list.scroll_offset(), 25_100.0);
    list.tick(216);
    assert!(!list.is_scroll_to_in_flight());
    assert!(list.take_commands().is_empty());
}
