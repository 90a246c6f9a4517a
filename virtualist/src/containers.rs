use crate::key::KeyMap;
use crate::{ItemKey, POSITION_OUT_OF_VIEW, ViewportRange};

/// A rendering slot owned by the host.
///
/// Slots are never unmounted; a free slot keeps its last item around for reuse and is parked at
/// [`POSITION_OUT_OF_VIEW`].
#[derive(Clone, Debug, PartialEq)]
pub struct Slot<K> {
    /// Index of the bound item, `None` when free.
    pub index: Option<usize>,
    pub id: Option<K>,
    /// 1-based column of the bound item.
    pub column: usize,
    pub position: f64,
    /// Identity the host should key its slot instance by. Changes when the slot is rebound to a
    /// different item unless item recycling is enabled.
    pub host_key: u64,
    last_id: Option<K>,
}

impl<K> Slot<K> {
    fn new(host_key: u64) -> Self {
        Self {
            index: None,
            id: None,
            column: 1,
            position: POSITION_OUT_OF_VIEW,
            host_key,
            last_id: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.index.is_none()
    }

    /// The item this slot last rendered, bound or not.
    pub fn last_id(&self) -> Option<&K> {
        self.last_id.as_ref()
    }

    fn release(&mut self) {
        self.index = None;
        self.id = None;
        self.position = POSITION_OUT_OF_VIEW;
    }
}

/// Result of one [`ContainerPool::allocate`] pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Allocation {
    /// Items in the buffered range.
    pub needed: usize,
    /// Items newly bound to a slot in this pass.
    pub placed: usize,
    /// Items left without a slot because the pool is at capacity.
    pub dropped: usize,
    /// Slots whose binding or position changed, ascending.
    pub changed: Vec<usize>,
}

/// Fixed set of slots mapped onto the buffered index range.
#[derive(Clone, Debug)]
pub struct ContainerPool<K> {
    slots: Vec<Slot<K>>,
    capacity: usize,
    next_host_key: u64,
}

impl<K> Default for ContainerPool<K> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            capacity: 0,
            next_host_key: 0,
        }
    }
}

impl<K: ItemKey> ContainerPool<K> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn slots(&self) -> &[Slot<K>] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&Slot<K>> {
        self.slots.get(index)
    }

    /// Mounted slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots the pool may mount.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Raises the capacity. Mounted slots are never removed, so shrinking below `len` is clamped.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(self.slots.len());
    }

    /// Grows capacity by up to `step` toward `target` and mounts empty slots for it.
    ///
    /// Returns the number of slots added.
    pub fn grow(&mut self, step: usize, target: usize) -> usize {
        let capacity = (self.capacity + step).min(target).max(self.capacity);
        self.capacity = capacity;
        let added = capacity.saturating_sub(self.slots.len());
        for _ in 0..added {
            self.mount();
        }
        if added > 0 {
            vdebug!(added, capacity, "ContainerPool::grow");
        }
        added
    }

    /// Slot currently bound to `index`.
    pub fn slot_for_index(&self, index: usize) -> Option<usize> {
        self.slots.iter().position(|s| s.index == Some(index))
    }

    /// Frees every slot.
    pub fn release_all(&mut self) -> Vec<usize> {
        let mut changed = Vec::new();
        for (s, slot) in self.slots.iter_mut().enumerate() {
            if !slot.is_free() {
                slot.release();
                changed.push(s);
            }
        }
        changed
    }

    /// Binds the buffered range of `range` to slots.
    ///
    /// Slots whose item is still in range keep it, following the item if its index moved. Free
    /// slots go first to items they last rendered, then in ascending slot order. Missing items
    /// are placed by distance from the visible range so that a full pool drops the outer edges.
    /// `place` returns the `(top, column)` of an index.
    pub fn allocate(
        &mut self,
        range: ViewportRange,
        ids: &[K],
        recycle: bool,
        mut place: impl FnMut(usize) -> (f64, usize),
    ) -> Allocation {
        if range.is_empty() || ids.is_empty() {
            return Allocation {
                changed: self.release_all(),
                ..Allocation::default()
            };
        }

        let first = range.start_buffered;
        let last = range.end_buffered.min(ids.len() - 1);
        let span = last + 1 - first;
        let in_range: KeyMap<&K, usize> = (first..=last).map(|i| (&ids[i], i)).collect();

        let mut changed = Vec::new();
        let mut slot_of: Vec<Option<usize>> = vec![None; span];

        for (s, slot) in self.slots.iter_mut().enumerate() {
            let Some(id) = slot.id.as_ref() else {
                continue;
            };
            match in_range.get(id) {
                Some(&i) if slot_of[i - first].is_none() => {
                    slot_of[i - first] = Some(s);
                    let (position, column) = place(i);
                    if slot.index != Some(i) || slot.position != position || slot.column != column
                    {
                        slot.index = Some(i);
                        slot.position = position;
                        slot.column = column;
                        changed.push(s);
                    }
                }
                _ => {
                    slot.release();
                    changed.push(s);
                }
            }
        }

        let mut pending: Vec<usize> = (first..=last)
            .filter(|&i| slot_of[i - first].is_none())
            .collect();
        pending.sort_by_key(|&i| distance_from_visible(i, &range));

        let mut free: Vec<usize> = (0..self.slots.len())
            .filter(|&s| self.slots[s].is_free())
            .collect();

        // Returning items first.
        let mut by_last_id: KeyMap<K, usize> = free
            .iter()
            .filter_map(|&s| self.slots[s].last_id.clone().map(|id| (id, s)))
            .collect();
        let mut unplaced = Vec::with_capacity(pending.len());
        let mut placed = 0;
        for i in pending {
            match by_last_id.remove(&ids[i]) {
                Some(s) => {
                    free.retain(|&f| f != s);
                    self.bind(s, i, &ids[i], recycle, place(i));
                    changed.push(s);
                    placed += 1;
                }
                None => unplaced.push(i),
            }
        }

        let mut dropped = 0;
        let mut free = free.into_iter();
        for i in unplaced {
            let s = match free.next() {
                Some(s) => s,
                None if self.slots.len() < self.capacity => self.mount(),
                None => {
                    dropped += 1;
                    continue;
                }
            };
            self.bind(s, i, &ids[i], recycle, place(i));
            changed.push(s);
            placed += 1;
        }

        changed.sort_unstable();
        changed.dedup();
        if dropped > 0 {
            vdebug!(dropped, capacity = self.capacity, "ContainerPool::allocate");
        }
        Allocation {
            needed: span,
            placed,
            dropped,
            changed,
        }
    }

    fn mount(&mut self) -> usize {
        let key = self.fresh_host_key();
        self.slots.push(Slot::new(key));
        self.slots.len() - 1
    }

    fn fresh_host_key(&mut self) -> u64 {
        let key = self.next_host_key;
        self.next_host_key += 1;
        key
    }

    fn bind(
        &mut self,
        s: usize,
        index: usize,
        id: &K,
        recycle: bool,
        (position, column): (f64, usize),
    ) {
        let rebinding = self.slots[s].last_id.as_ref().is_some_and(|last| last != id);
        let key = if rebinding && !recycle {
            Some(self.fresh_host_key())
        } else {
            None
        };
        let slot = &mut self.slots[s];
        if let Some(key) = key {
            slot.host_key = key;
        }
        slot.index = Some(index);
        slot.id = Some(id.clone());
        slot.last_id = Some(id.clone());
        slot.position = position;
        slot.column = column;
    }
}

fn distance_from_visible(index: usize, range: &ViewportRange) -> usize {
    if index < range.start {
        range.start - index
    } else {
        index.saturating_sub(range.end)
    }
}
