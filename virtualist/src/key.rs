use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Item identity used as the primary key of every per-item map.
///
/// Implemented for any `Hash + Eq + Clone + Debug` type; the default is [`ItemId`].
pub trait ItemKey: Hash + Eq + Clone + Debug {}
impl<K: Hash + Eq + Clone + Debug> ItemKey for K {}

/// The default item key: a user supplied string, or the index rendered as a string.
pub type ItemId = String;

pub(crate) type KeyMap<K, V> = HashMap<K, V>;
