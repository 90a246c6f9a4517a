// Example: minimal host loop. Layout, scroll, read the slot bindings.
use virtualist::{ListOptions, VirtualList};

fn main() {
    let mut list = VirtualList::new(ListOptions::new(1_000_000, 24.0).with_draw_distance(120.0));
    list.on_layout(480.0);
    list.on_scroll(123_456.0, 0);

    println!("total_size={}", list.total_size());
    println!("range={:?}", list.range());
    for slot in list.slots().iter().filter(|s| !s.is_free()) {
        println!(
            "slot key={} item={:?} at {}",
            slot.host_key, slot.id, slot.position
        );
    }

    list.scroll_to_end(false, 16);
    for command in list.take_commands() {
        println!("host executes {command:?}");
    }
    println!("after scroll_to_end: offset={}", list.scroll_offset());
}
