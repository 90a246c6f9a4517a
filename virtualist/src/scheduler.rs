/// Handle of a scheduled task, used to cancel it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// When a task becomes due.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Deadline {
    /// Before the current event finishes processing (`VirtualList::flush`).
    Microtask,
    NextFrame,
    /// When the host is idle; falls back to the next frame on hosts without idle callbacks.
    Idle,
    /// On the first frame at or after this timestamp (ms).
    At(u64),
}

/// Deferred work owned by a list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Task {
    /// Apply batched size changes to positions and re-resolve the viewport.
    FlushSizes,
    /// Re-check convergence of the scroll-to request with this token.
    CheckScrollTo { token: u64 },
    /// Mount more slots toward the target pool size.
    GrowPool,
}

/// Drain points at which due tasks are collected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Microtasks,
    /// A frame at the given timestamp.
    Frame { now_ms: u64, run_idle: bool },
    Idle { now_ms: u64 },
}

/// Cancelable deferred tasks.
///
/// Every timer and deferred callback of a list goes through here so teardown can drop all of them
/// at once. After [`FrameScheduler::teardown`] nothing new is accepted.
#[derive(Clone, Debug, Default)]
pub struct FrameScheduler {
    next_id: u64,
    queue: Vec<(TaskId, Deadline, Task)>,
    torn_down: bool,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deadline: Deadline, task: Task) -> Option<TaskId> {
        if self.torn_down {
            return None;
        }
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.queue.push((id, deadline, task));
        vtrace!(?deadline, ?task, "FrameScheduler::schedule");
        Some(id)
    }

    /// Schedules `task` unless an equal task is already pending at the same deadline.
    pub fn schedule_once(&mut self, deadline: Deadline, task: Task) -> Option<TaskId> {
        match self
            .queue
            .iter()
            .find(|(_, d, t)| *d == deadline && *t == task)
        {
            Some((id, _, _)) => Some(*id),
            None => self.schedule(deadline, task),
        }
    }

    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|(queued, _, _)| *queued != id);
        self.queue.len() != before
    }

    pub fn is_pending(&self, task: Task) -> bool {
        self.queue.iter().any(|(_, _, t)| *t == task)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Removes and returns the tasks due in `phase`, in scheduling order.
    ///
    /// Tasks scheduled while the returned ones run wait for the next drain.
    pub fn take_due(&mut self, phase: Phase) -> Vec<Task> {
        let mut due = Vec::new();
        self.queue.retain(|&(_, deadline, task)| {
            let is_due = match (phase, deadline) {
                (Phase::Microtasks, Deadline::Microtask) => true,
                (Phase::Microtasks, _) => false,
                (Phase::Frame { .. }, Deadline::Microtask | Deadline::NextFrame) => true,
                (Phase::Frame { run_idle, .. }, Deadline::Idle) => run_idle,
                (Phase::Frame { now_ms, .. }, Deadline::At(at)) => at <= now_ms,
                (Phase::Idle { .. }, Deadline::Microtask | Deadline::Idle) => true,
                (Phase::Idle { now_ms }, Deadline::At(at)) => at <= now_ms,
                (Phase::Idle { .. }, Deadline::NextFrame) => false,
            };
            if is_due {
                due.push(task);
            }
            !is_due
        });
        due
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Cancels everything and refuses further scheduling.
    pub fn teardown(&mut self) {
        if !self.queue.is_empty() {
            vdebug!(cancelled = self.queue.len(), "FrameScheduler::teardown");
        }
        self.queue.clear();
        self.torn_down = true;
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}
