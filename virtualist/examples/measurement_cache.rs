// Example: persist measured sizes across list instances (e.g. navigating away and back).
use virtualist::{ListOptions, VirtualList};

fn main() {
    let options = || ListOptions::new(1_000, 40.0).with_use_average_size(false);

    let mut list = VirtualList::new(options());
    list.measure_many((0..50).map(|i| (i, 40.0 + (i % 5) as f64 * 8.0)));
    let cache = list.export_measurement_cache();
    println!("exported {} sizes, total_size={}", cache.len(), list.total_size());

    let mut restored = VirtualList::new(options());
    restored.import_measurement_cache(cache);
    println!(
        "restored {} sizes, total_size={}",
        restored.measurement_cache_len(),
        restored.total_size()
    );

    restored.reset_measurements();
    println!("after reset: total_size={}", restored.total_size());
}
