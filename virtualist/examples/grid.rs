// Example: a three-column grid. Rows are as tall as their tallest cell.
use virtualist::{ListOptions, VirtualList};

fn main() {
    let mut list = VirtualList::new(ListOptions::new(90, 100.0).with_num_columns(3));
    list.on_layout(400.0);

    // A tall cell in the second row pushes every later row down.
    list.measure(4, 180.0);
    list.flush();

    println!("total_size={}", list.total_size());
    for slot in list.slots().iter().filter(|s| !s.is_free()).take(9) {
        println!(
            "item {:?} row_top={} column={}",
            slot.index, slot.position, slot.column
        );
    }
}
