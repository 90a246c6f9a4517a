// Example: items measured after render. Sizes above the viewport shift content, the list
// compensates with ScrollBy commands, and a scroll-to chases its target until it settles.
use virtualist::{LayoutSize, ListOptions, ScrollCommand, VirtualList};

fn measured_height(index: usize) -> f64 {
    // Pretend every 7th row wraps onto a second line.
    if index % 7 == 0 { 64.0 } else { 32.0 }
}

fn main() {
    let mut list = VirtualList::new(ListOptions::new(10_000, 32.0));
    list.on_layout(600.0);

    let mut host_offset = 0.0;
    let mut now_ms = 0;
    list.scroll_to_index(5_000, false, now_ms);

    while list.is_scroll_to_in_flight() && now_ms < 2_000 {
        for command in list.take_commands() {
            match command {
                ScrollCommand::ScrollTo { offset, .. } => host_offset = offset,
                ScrollCommand::ScrollBy { delta } => host_offset += delta,
            }
            list.on_scroll(host_offset, now_ms);
        }

        // Render: measure whatever is bound.
        let bound: Vec<(String, usize)> = list
            .slots()
            .iter()
            .filter_map(|s| Some((s.id.clone()?, s.index?)))
            .collect();
        for (id, index) in bound {
            list.on_item_layout(&id, LayoutSize::new(320.0, measured_height(index)));
        }

        now_ms += 16;
        list.tick(now_ms);
    }

    println!(
        "settled at offset={} after {now_ms}ms, range={:?}",
        list.scroll_offset(),
        list.range()
    );
    println!("item 5000 at {:?}", list.item_position(5_000));
}
