use virtualist::{
    ItemId, ItemKey, LayoutSize, ListOptions, ScrollCommand, ScrollRequest, VirtualList,
};

use crate::{Easing, Tween};

/// Duration of animated scrolls unless configured otherwise.
pub const DEFAULT_ANIMATION_MS: u64 = 240;

/// Upper bound on command round-trips per pump. Executing a command reports a scroll event, which
/// can only queue compensation, so a handful of rounds always drains the queue.
const MAX_PUMP_ROUNDS: usize = 8;

/// A framework-neutral host for a [`VirtualList`].
///
/// Owns the (simulated) scroll position, executes the list's [`ScrollCommand`]s against it and
/// reports every resulting offset back through [`VirtualList::on_scroll`]. Animated scroll-tos
/// run as a [`Tween`] advanced by [`Controller::tick`].
///
/// Adapters drive it by calling:
/// - `on_layout` / `on_user_scroll` / `on_item_layout` when UI events occur
/// - `tick(now_ms)` each frame, and `idle(now_ms)` where the toolkit has idle callbacks
///
/// After each call, [`Controller::offset`] is where the real scroll container should be.
#[derive(Debug)]
pub struct Controller<K: ItemKey = ItemId> {
    list: VirtualList<K>,
    offset: f64,
    tween: Option<Tween>,
    duration_ms: u64,
    easing: Easing,
    now_ms: u64,
}

impl<K: ItemKey> Controller<K> {
    pub fn new(options: ListOptions<K>) -> Self {
        Self::from_list(VirtualList::new(options))
    }

    pub fn from_list(list: VirtualList<K>) -> Self {
        let offset = list.scroll_offset();
        Self {
            list,
            offset,
            tween: None,
            duration_ms: DEFAULT_ANIMATION_MS,
            easing: Easing::default(),
            now_ms: 0,
        }
    }

    pub fn with_animation(mut self, duration_ms: u64, easing: Easing) -> Self {
        self.duration_ms = duration_ms;
        self.easing = easing;
        self
    }

    pub fn list(&self) -> &VirtualList<K> {
        &self.list
    }

    /// Direct access to the list. Commands it queues are executed on the next controller call.
    pub fn list_mut(&mut self) -> &mut VirtualList<K> {
        &mut self.list
    }

    pub fn into_list(self) -> VirtualList<K> {
        self.list
    }

    /// Current host scroll position.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn is_animating(&self) -> bool {
        self.tween.is_some()
    }

    pub fn tween(&self) -> Option<&Tween> {
        self.tween.as_ref()
    }

    /// Stops an animated scroll where it is. The list's scroll-to keeps waiting for convergence
    /// and force-completes once the offset stays still.
    pub fn cancel_animation(&mut self) {
        self.tween = None;
    }

    pub fn on_layout(&mut self, scroll_length: f64) {
        self.list.on_layout(scroll_length);
        self.pump();
    }

    /// A scroll the user made (wheel, drag). Cancels any animation and programmatic scroll.
    pub fn on_user_scroll(&mut self, offset: f64, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
        self.cancel_animation();
        self.list.cancel_scroll_to();
        self.offset = offset.max(0.0);
        self.list.on_scroll(self.offset, self.now_ms);
        self.pump();
    }

    pub fn on_item_layout(&mut self, id: &K, size: LayoutSize) {
        self.list.on_item_layout(id, size);
        self.pump();
    }

    pub fn measure(&mut self, index: usize, size: f64) {
        self.list.measure(index, size);
        self.pump();
    }

    /// Starts a programmatic scroll. Returns `false` when the target cannot be resolved.
    pub fn scroll_to(&mut self, request: ScrollRequest<K>, now_ms: u64) -> bool {
        self.now_ms = self.now_ms.max(now_ms);
        let started = self.list.scroll_to(request, self.now_ms);
        self.pump();
        started
    }

    /// Advances the animation, then runs the list's frame work.
    ///
    /// Returns the new offset if it moved during this frame.
    pub fn tick(&mut self, now_ms: u64) -> Option<f64> {
        self.now_ms = self.now_ms.max(now_ms);
        let before = self.offset;

        self.list.flush();
        self.pump();
        if let Some(tween) = self.tween {
            let next = tween.sample(self.now_ms);
            if tween.is_done(self.now_ms) {
                self.tween = None;
            }
            self.report(next);
        }
        self.list.tick(self.now_ms);
        self.pump();

        (self.offset != before).then_some(self.offset)
    }

    pub fn idle(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
        self.list.idle(self.now_ms);
        self.pump();
    }

    /// Drops the animation and tears the list down.
    pub fn teardown(&mut self) {
        self.tween = None;
        self.list.teardown();
    }

    /// Executes queued commands until the list stops issuing them.
    fn pump(&mut self) {
        for _ in 0..MAX_PUMP_ROUNDS {
            let commands = self.list.take_commands();
            if commands.is_empty() {
                return;
            }
            for command in commands {
                self.execute(command);
            }
        }
    }

    fn execute(&mut self, command: ScrollCommand) {
        #[cfg(feature = "tracing")]
        tracing::trace!(
            target: "virtualist_adapter",
            ?command,
            offset = self.offset,
            "Controller::execute"
        );
        match command {
            ScrollCommand::ScrollTo {
                offset,
                animated: true,
            } => {
                match &mut self.tween {
                    // Mid-flight corrections continue from the current offset and velocity.
                    Some(tween) => tween.retarget(self.now_ms, offset),
                    None => {
                        self.tween = Some(Tween::new(
                            self.offset,
                            offset,
                            self.now_ms,
                            self.duration_ms,
                            self.easing,
                        ));
                    }
                }
            }
            ScrollCommand::ScrollTo {
                offset,
                animated: false,
            } => {
                self.tween = None;
                self.report(offset);
            }
            ScrollCommand::ScrollBy { delta } => {
                if let Some(tween) = &mut self.tween {
                    tween.shift(delta);
                }
                self.report(self.offset + delta);
            }
        }
    }

    fn report(&mut self, offset: f64) {
        self.offset = offset.max(0.0);
        self.list.on_scroll(self.offset, self.now_ms);
    }
}
