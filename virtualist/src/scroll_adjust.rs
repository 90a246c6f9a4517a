/// Whether a compensation scroll is waiting to be observed.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdjustState {
    Idle,
    /// A `ScrollBy` was issued and the host has not reported the resulting offset yet.
    /// `from_offset` is where the host was before the first unconfirmed adjustment.
    Adjusting {
        from_offset: f64,
        expected_offset: f64,
    },
}

/// Scroll-position compensation for size changes above the viewport.
///
/// While a programmatic scroll is in flight, deltas are accumulated instead of applied and handed
/// back as a single adjustment once it completes, so each delta reaches the host exactly once.
#[derive(Clone, Debug)]
pub struct ScrollAdjustHandler {
    state: AdjustState,
    applied: f64,
    pending: f64,
}

impl Default for ScrollAdjustHandler {
    fn default() -> Self {
        Self {
            state: AdjustState::Idle,
            applied: 0.0,
            pending: 0.0,
        }
    }
}

impl ScrollAdjustHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AdjustState {
        self.state
    }

    pub fn is_adjusting(&self) -> bool {
        matches!(self.state, AdjustState::Adjusting { .. })
    }

    /// Sum of every delta handed out so far.
    pub fn applied(&self) -> f64 {
        self.applied
    }

    pub fn pending(&self) -> f64 {
        self.pending
    }

    /// Requests compensation by `delta` at `current_offset`.
    ///
    /// Returns the delta to apply now, or `None` when it was queued (or zero).
    pub fn request_adjust(
        &mut self,
        delta: f64,
        current_offset: f64,
        scroll_to_in_flight: bool,
    ) -> Option<f64> {
        if delta == 0.0 || !delta.is_finite() {
            return None;
        }
        if scroll_to_in_flight {
            self.pending += delta;
            vtrace!(delta, pending = self.pending, "ScrollAdjustHandler: queued");
            return None;
        }
        Some(self.apply(delta, current_offset))
    }

    /// Releases the queued deltas as one adjustment.
    pub fn flush(&mut self, current_offset: f64) -> Option<f64> {
        let delta = std::mem::take(&mut self.pending);
        (delta != 0.0).then(|| self.apply(delta, current_offset))
    }

    /// Drops queued deltas that a re-resolved scroll target already accounts for.
    pub fn discard_pending(&mut self) -> f64 {
        std::mem::take(&mut self.pending)
    }

    /// Feeds an observed scroll offset. Returns `false` for a stale report of the position the
    /// host had before executing an outstanding adjustment; such reports must not roll the
    /// offset back.
    pub fn on_scroll(&mut self, offset: f64, epsilon: f64) -> bool {
        let AdjustState::Adjusting {
            from_offset,
            expected_offset,
        } = self.state
        else {
            return true;
        };
        let near = |a: f64, b: f64| (a - b).abs() <= epsilon;
        if near(offset, from_offset) && !near(offset, expected_offset) {
            vtrace!(offset, expected_offset, "ScrollAdjustHandler: stale scroll ignored");
            return false;
        }
        // Either the adjustment landed or the user moved on.
        self.state = AdjustState::Idle;
        true
    }

    /// A frame passed; any issued adjustment has been committed by the host.
    pub fn on_frame(&mut self) {
        self.state = AdjustState::Idle;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn apply(&mut self, delta: f64, current_offset: f64) -> f64 {
        self.applied += delta;
        let from_offset = match self.state {
            AdjustState::Adjusting { from_offset, .. } => from_offset,
            AdjustState::Idle => current_offset,
        };
        self.state = AdjustState::Adjusting {
            from_offset,
            expected_offset: current_offset + delta,
        };
        vdebug!(delta, applied = self.applied, "ScrollAdjustHandler: adjust");
        delta
    }
}

/// The first visible item and its position, captured before a data change.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScrollAnchor<K> {
    pub id: K,
    pub top: f64,
}

impl<K> ScrollAnchor<K> {
    pub fn new(id: K, top: f64) -> Self {
        Self { id, top }
    }

    /// Scroll delta that keeps the anchor in place once it sits at `new_top`.
    pub fn delta(&self, new_top: f64) -> f64 {
        new_top - self.top
    }
}
