use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

/// Observable values published by a list.
///
/// Per-slot topics are keyed by slot index so a host only re-renders the slot whose binding or
/// position changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Topic {
    TotalSize,
    ScrollOffset,
    ScrollLength,
    AlignPadding,
    /// Sum of all scroll compensation applied.
    ScrollAdjust,
    Ready,
    ScrollToActive,
    NumContainers,
    SlotIndex(usize),
    SlotPosition(usize),
    SlotColumn(usize),
    SlotHostKey(usize),
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Number(f64),
    Flag(bool),
    Count(usize),
    Index(Option<usize>),
    Key(u64),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match *self {
            Self::Number(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match *self {
            Self::Flag(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<usize> {
        match *self {
            Self::Count(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_index(&self) -> Option<Option<usize>> {
        match *self {
            Self::Index(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<u64> {
        match *self {
            Self::Key(v) => Some(v),
            _ => None,
        }
    }
}

type Listener = Rc<dyn Fn(Topic, &Value)>;

#[derive(Default)]
struct Inner {
    values: HashMap<Topic, Value>,
    listeners: HashMap<Topic, Vec<(u64, Listener)>>,
    next_listener: u64,
    notifying: bool,
    queue: VecDeque<(Topic, Value)>,
}

/// Single-threaded keyed value store with per-key listeners.
///
/// Writes of an equal value are dropped. Listeners run synchronously; writes made from inside a
/// listener are queued and delivered after the current notification, so every listener sees
/// changes in write order.
#[derive(Clone, Default)]
pub struct StateStore {
    inner: Rc<RefCell<Inner>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a value without subscribing.
    pub fn peek(&self, topic: Topic) -> Option<Value> {
        self.inner.borrow().values.get(&topic).copied()
    }

    pub fn peek_number(&self, topic: Topic) -> f64 {
        self.peek(topic).and_then(|v| v.as_number()).unwrap_or(0.0)
    }

    pub fn peek_flag(&self, topic: Topic) -> bool {
        self.peek(topic).and_then(|v| v.as_flag()).unwrap_or(false)
    }

    /// Stores `value` and notifies listeners of `topic`. Returns whether the value changed.
    pub fn set(&self, topic: Topic, value: Value) -> bool {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.values.get(&topic) == Some(&value) {
                return false;
            }
            inner.values.insert(topic, value);
            inner.queue.push_back((topic, value));
            if inner.notifying {
                return true;
            }
            inner.notifying = true;
        }
        self.drain();
        true
    }

    fn drain(&self) {
        loop {
            let (topic, value, listeners) = {
                let mut inner = self.inner.borrow_mut();
                let Some((topic, value)) = inner.queue.pop_front() else {
                    inner.notifying = false;
                    return;
                };
                let listeners: Vec<Listener> = inner
                    .listeners
                    .get(&topic)
                    .map(|ls| ls.iter().map(|(_, l)| Rc::clone(l)).collect())
                    .unwrap_or_default();
                (topic, value, listeners)
            };
            for listener in listeners {
                listener(topic, &value);
            }
        }
    }

    /// Registers `listener` for `topic` until the returned [`Subscription`] is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(
        &self,
        topic: Topic,
        listener: impl Fn(Topic, &Value) + 'static,
    ) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_listener;
        inner.next_listener += 1;
        inner
            .listeners
            .entry(topic)
            .or_default()
            .push((id, Rc::new(listener)));
        Subscription {
            topic,
            id,
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self, topic: Topic) -> usize {
        self.inner
            .borrow()
            .listeners
            .get(&topic)
            .map_or(0, Vec::len)
    }

    /// Drops every listener and any undelivered notification.
    pub fn clear_listeners(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.listeners.clear();
        inner.queue.clear();
    }
}

impl core::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("StateStore")
            .field("values", &inner.values.len())
            .field("listeners", &inner.listeners.len())
            .finish_non_exhaustive()
    }
}

/// Disposer returned by [`StateStore::subscribe`]; unsubscribes on drop.
pub struct Subscription {
    topic: Topic,
    id: u64,
    inner: Weak<RefCell<Inner>>,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut inner = inner.borrow_mut();
        if let Some(listeners) = inner.listeners.get_mut(&self.topic) {
            listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .finish()
    }
}
