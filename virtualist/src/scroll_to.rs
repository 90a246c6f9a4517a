use crate::ConvergencePolicy;
use crate::options::InitialScroll;
use crate::scheduler::TaskId;

/// What a programmatic scroll is aiming at.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScrollTarget<K> {
    Offset(f64),
    /// Place item `index` so that the point `view_position` (0 = leading edge, 1 = trailing edge)
    /// of the item lines up with the same point of the viewport, shifted by `view_offset`.
    Index {
        index: usize,
        view_offset: f64,
        view_position: f64,
    },
    Item {
        id: K,
        view_offset: f64,
        view_position: f64,
    },
    End,
}

impl<K> ScrollTarget<K> {
    /// Whether the target follows content, i.e. is re-resolved from item positions.
    pub fn tracks_content(&self) -> bool {
        !matches!(self, Self::Offset(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScrollRequest<K> {
    pub target: ScrollTarget<K>,
    pub animated: bool,
}

impl<K> ScrollRequest<K> {
    pub fn offset(offset: f64) -> Self {
        Self::new(ScrollTarget::Offset(offset))
    }

    pub fn index(index: usize) -> Self {
        Self::new(ScrollTarget::Index {
            index,
            view_offset: 0.0,
            view_position: 0.0,
        })
    }

    pub fn item(id: K) -> Self {
        Self::new(ScrollTarget::Item {
            id,
            view_offset: 0.0,
            view_position: 0.0,
        })
    }

    pub fn end() -> Self {
        Self::new(ScrollTarget::End)
    }

    fn new(target: ScrollTarget<K>) -> Self {
        Self {
            target,
            animated: false,
        }
    }

    pub fn animated(mut self, animated: bool) -> Self {
        self.animated = animated;
        self
    }

    /// Sets the view offset of index and item targets.
    pub fn with_view_offset(mut self, offset: f64) -> Self {
        if let ScrollTarget::Index { view_offset, .. } | ScrollTarget::Item { view_offset, .. } =
            &mut self.target
        {
            *view_offset = offset;
        }
        self
    }

    /// Sets the view position of index and item targets.
    pub fn with_view_position(mut self, position: f64) -> Self {
        if let ScrollTarget::Index { view_position, .. } | ScrollTarget::Item { view_position, .. } =
            &mut self.target
        {
            *view_position = position;
        }
        self
    }
}

impl<K> From<InitialScroll> for ScrollRequest<K> {
    fn from(initial: InitialScroll) -> Self {
        match initial {
            InitialScroll::Offset(offset) => Self::offset(offset),
            InitialScroll::Index {
                index,
                view_offset,
                view_position,
            } => Self::new(ScrollTarget::Index {
                index,
                view_offset,
                view_position,
            }),
        }
    }
}

/// Scroll offset that aligns an item at `top` with size `size` inside a viewport.
pub fn item_offset(
    top: f64,
    size: f64,
    scroll_length: f64,
    view_offset: f64,
    view_position: f64,
) -> f64 {
    top - view_offset - view_position * (scroll_length - size)
}

/// Bookkeeping for the request currently in flight.
#[derive(Clone, Debug)]
pub struct InFlight<K> {
    pub token: u64,
    pub request: ScrollRequest<K>,
    pub is_initial: bool,
    /// Offset of the last command sent to the host.
    pub issued: f64,
    pub retries: u32,
    /// Whether corrections are still sent animated. Cleared for the final immediate correction.
    pub animated: bool,
    pub started_ms: u64,
    pub last_progress_ms: u64,
    last_offset: Option<f64>,
    pub(crate) task: Option<TaskId>,
}

/// Result of a convergence check.
#[derive(Clone, Debug)]
pub enum CheckOutcome<K> {
    /// The token does not belong to the request in flight.
    Stale,
    /// Still moving toward the target.
    Pending,
    /// The target moved; send a corrective scroll to `offset`. Animated requests are corrected
    /// with animated scrolls until they run out of retries or stop moving.
    Reissue { offset: f64, animated: bool },
    Converged(InFlight<K>),
    /// Gave up waiting; the request is over.
    Forced(InFlight<K>),
}

/// Tracks programmatic scroll requests until the scroll offset settles on their target.
///
/// Targets are re-resolved every check because measurements can move them after the command was
/// issued. Only one request is in flight; a new one supersedes it.
#[derive(Clone, Debug)]
pub struct ScrollToController<K> {
    next_token: u64,
    in_flight: Option<InFlight<K>>,
}

impl<K> Default for ScrollToController<K> {
    fn default() -> Self {
        Self {
            next_token: 1,
            in_flight: None,
        }
    }
}

impl<K: Clone> ScrollToController<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn current(&self) -> Option<&InFlight<K>> {
        self.in_flight.as_ref()
    }

    /// Starts tracking `request`, replacing (and returning) any request in flight.
    pub fn begin(
        &mut self,
        request: ScrollRequest<K>,
        issued: f64,
        is_initial: bool,
        now_ms: u64,
    ) -> (u64, Option<InFlight<K>>) {
        let token = self.next_token;
        self.next_token += 1;
        let animated = request.animated && !is_initial;
        let previous = self.in_flight.replace(InFlight {
            token,
            request,
            animated,
            is_initial,
            issued,
            retries: 0,
            started_ms: now_ms,
            last_progress_ms: now_ms,
            last_offset: None,
            task: None,
        });
        vdebug!(token, issued, is_initial, "ScrollToController::begin");
        (token, previous)
    }

    pub(crate) fn set_task(&mut self, token: u64, task: Option<TaskId>) {
        if let Some(current) = self.in_flight.as_mut().filter(|f| f.token == token) {
            current.task = task;
        }
    }

    /// Records an observed scroll offset as progress.
    pub fn observe_scroll(&mut self, offset: f64, now_ms: u64) {
        if let Some(current) = self.in_flight.as_mut() {
            if current.last_offset.is_none_or(|last| (last - offset).abs() > f64::EPSILON) {
                current.last_offset = Some(offset);
                current.last_progress_ms = now_ms;
            }
        }
    }

    /// Checks request `token` against the current offset and the freshly resolved `target`.
    ///
    /// Converged means within `epsilon` of the target and not overscrolled past
    /// `[0, max_scroll_offset]`. The request is force-completed after `max_retries` corrections,
    /// when the offset has been still for the settle timeout, or after `max_duration_ms`. An
    /// animated request gets one immediate correction before either of the first two.
    pub fn check(
        &mut self,
        token: u64,
        offset: f64,
        target: f64,
        max_scroll_offset: f64,
        now_ms: u64,
        policy: &ConvergencePolicy,
    ) -> CheckOutcome<K> {
        let Some(current) = self.in_flight.as_mut().filter(|f| f.token == token) else {
            return CheckOutcome::Stale;
        };
        let eps = policy.epsilon.max(0.0);
        let overscrolled = offset < -eps || offset > max_scroll_offset + eps;

        if (offset - target).abs() <= eps && !overscrolled {
            return self.finish(CheckOutcome::Converged);
        }

        let settle = if current.is_initial {
            policy.initial_settle_timeout_ms
        } else {
            policy.settle_timeout_ms
        };
        let still_ms = now_ms.saturating_sub(current.last_progress_ms);
        let elapsed_ms = now_ms.saturating_sub(current.started_ms);
        let target_moved = (target - current.issued).abs() > eps;
        let retries_left = current.retries < policy.max_retries;

        if elapsed_ms >= policy.max_duration_ms {
            return self.finish(CheckOutcome::Forced);
        }

        if target_moved && retries_left {
            current.retries += 1;
            current.issued = target;
            current.last_progress_ms = now_ms;
            vdebug!(
                token,
                target,
                retries = current.retries,
                animated = current.animated,
                "ScrollToController: reissue"
            );
            return CheckOutcome::Reissue {
                offset: target,
                animated: current.animated,
            };
        }

        // Out of retries, or the animation stopped short: one last jump straight to the target.
        if current.animated && (target_moved || still_ms >= settle) {
            current.animated = false;
            current.issued = target;
            current.last_progress_ms = now_ms;
            vdebug!(token, target, "ScrollToController: immediate correction");
            return CheckOutcome::Reissue {
                offset: target,
                animated: false,
            };
        }

        if target_moved || still_ms >= settle {
            return self.finish(CheckOutcome::Forced);
        }
        CheckOutcome::Pending
    }

    /// Drops the request in flight.
    pub fn cancel(&mut self) -> Option<InFlight<K>> {
        self.in_flight.take()
    }

    fn finish(&mut self, outcome: fn(InFlight<K>) -> CheckOutcome<K>) -> CheckOutcome<K> {
        match self.in_flight.take() {
            Some(done) => outcome(done),
            None => CheckOutcome::Stale,
        }
    }
}
