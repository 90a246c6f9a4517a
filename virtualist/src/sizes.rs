use std::sync::Arc;

use crate::key::KeyMap;
use crate::options::SizeEstimator;
use crate::ItemKey;

/// Sizes are stored in multiples of `1 / SIZE_QUANTUM` px.
pub const SIZE_QUANTUM: f64 = 8.0;

/// Rounds a size to the storage quantum. Non-finite and negative sizes become 0.
pub fn round_size(size: f64) -> f64 {
    if !size.is_finite() || size <= 0.0 {
        return 0.0;
    }
    (size * SIZE_QUANTUM).round() / SIZE_QUANTUM
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct RunningAverage {
    total: f64,
    count: usize,
}

impl RunningAverage {
    fn add(&mut self, size: f64) {
        self.total += size;
        self.count += 1;
    }

    fn replace(&mut self, old: f64, new: f64) {
        self.total += new - old;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| round_size(self.total / self.count as f64))
    }
}

/// Per-item size storage keyed by item id.
///
/// Holds known (measured) sizes, the estimate each unmeasured item was pinned to when it was
/// first shown, and a running average of known sizes. Writes never trigger position
/// recomputation; the owner batches them and invalidates positions once per frame.
///
/// Unpinned items are laid out with the fallback estimate captured by the last
/// [`SizeLedger::rebase`], so a moving average only shifts them when the owner asks for it.
#[derive(Clone)]
pub struct SizeLedger<K> {
    known: KeyMap<K, f64>,
    estimated: KeyMap<K, f64>,
    average: RunningAverage,
    default_size: f64,
    basis: f64,
    estimator: Option<SizeEstimator>,
    use_average: bool,
}

impl<K: ItemKey> SizeLedger<K> {
    pub fn new(default_size: f64, estimator: Option<SizeEstimator>, use_average: bool) -> Self {
        let default_size = round_size(default_size);
        Self {
            known: KeyMap::new(),
            estimated: KeyMap::new(),
            average: RunningAverage::default(),
            default_size,
            basis: default_size,
            estimator,
            use_average,
        }
    }

    /// Replaces the estimator chain. Cached estimates are dropped if anything changed; known sizes
    /// are kept. Returns whether anything changed.
    pub fn configure(
        &mut self,
        default_size: f64,
        estimator: Option<SizeEstimator>,
        use_average: bool,
    ) -> bool {
        let default_size = round_size(default_size);
        let same_estimator = match (&self.estimator, &estimator) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        if same_estimator && self.default_size == default_size && self.use_average == use_average
        {
            return false;
        }
        self.default_size = default_size;
        self.estimator = estimator;
        self.use_average = use_average;
        self.estimated.clear();
        self.basis = self.fallback();
        true
    }

    pub fn has(&self, id: &K) -> bool {
        self.known.contains_key(id) || self.estimated.contains_key(id)
    }

    pub fn is_known(&self, id: &K) -> bool {
        self.known.contains_key(id)
    }

    /// Returns the stored size without resolving an estimate.
    pub fn peek(&self, id: &K) -> Option<f64> {
        self.known
            .get(id)
            .or_else(|| self.estimated.get(id))
            .copied()
    }

    /// Returns the size of `id` without caching: the known or pinned size, else the estimate.
    pub fn size_of(&self, id: &K, index: usize) -> f64 {
        self.peek(id).unwrap_or_else(|| self.estimate(index))
    }

    /// Returns the size of `id`, resolving and pinning an estimate on first use. Pinned
    /// estimates stay put until a measurement arrives, so items already shown never move
    /// because the average did.
    pub fn get(&mut self, id: &K, index: usize) -> f64 {
        if let Some(size) = self.peek(id) {
            return size;
        }
        let size = self.estimate(index);
        self.estimated.insert(id.clone(), size);
        size
    }

    /// Estimate for an unpinned item: the per-item estimator, else the fallback captured by the
    /// last rebase.
    pub fn estimate(&self, index: usize) -> f64 {
        match &self.estimator {
            Some(estimator) => round_size(estimator(index)),
            None => self.basis,
        }
    }

    /// Running average (when enabled) or the static default.
    fn fallback(&self) -> f64 {
        self.average
            .value()
            .filter(|_| self.use_average)
            .unwrap_or(self.default_size)
    }

    /// Whether the fallback moved since the last rebase and unpinned items are laid out stale.
    pub fn needs_rebase(&self) -> bool {
        self.estimator.is_none() && self.fallback() != self.basis
    }

    /// Adopts the current fallback for unpinned items. Returns whether it changed.
    pub fn rebase(&mut self) -> bool {
        let fallback = self.fallback();
        let changed = fallback != self.basis;
        self.basis = fallback;
        changed
    }

    /// Records a measured size and returns `new - previous`.
    ///
    /// The previous size is the last known size or the cached estimate; an id that was never
    /// sized yields 0 since nothing was laid out with it.
    pub fn set(&mut self, id: &K, size: f64) -> f64 {
        let size = round_size(size);
        let prev_known = self.known.insert(id.clone(), size);
        match prev_known {
            Some(old) => self.average.replace(old, size),
            None => self.average.add(size),
        }
        let prev = prev_known.or_else(|| self.estimated.remove(id));
        prev.map_or(0.0, |prev| size - prev)
    }

    pub fn average_size(&self) -> Option<f64> {
        self.average.value()
    }

    pub fn known_len(&self) -> usize {
        self.known.len()
    }

    /// Forgets every measurement and cached estimate.
    pub fn clear(&mut self) {
        self.known.clear();
        self.estimated.clear();
        self.average = RunningAverage::default();
        self.basis = self.default_size;
    }

    /// Exports known sizes, e.g. to restore them in a later session.
    pub fn export_known(&self) -> Vec<(K, f64)> {
        self.known.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    /// Replaces known sizes with `entries`.
    pub fn import_known(&mut self, entries: impl IntoIterator<Item = (K, f64)>) {
        self.clear();
        for (key, size) in entries {
            self.set(&key, size);
        }
        self.rebase();
        vdebug!(entries = self.known.len(), "SizeLedger::import_known");
    }
}

impl<K> core::fmt::Debug for SizeLedger<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SizeLedger")
            .field("known", &self.known.len())
            .field("estimated", &self.estimated.len())
            .field("average", &self.average.value())
            .field("default_size", &self.default_size)
            .field("basis", &self.basis)
            .field("use_average", &self.use_average)
            .finish_non_exhaustive()
    }
}
