// Example: prepend older messages without moving what the user is reading.
use std::sync::{Arc, Mutex};

use virtualist::{ListOptions, VirtualList};

fn main() {
    let messages: Arc<Mutex<Vec<String>>> =
        Arc::new(Mutex::new((100..200).map(|i| format!("msg-{i}")).collect()));
    let keys = Arc::clone(&messages);

    let mut list = VirtualList::new(ListOptions::new_with_key(100, 48.0, move |i| {
        keys.lock().map(|m| m[i].clone()).unwrap_or_default()
    }));
    list.on_layout(480.0);
    list.on_scroll(1_200.0, 0);
    println!(
        "reading {:?} at offset={}",
        list.key_for(list.range().start),
        list.scroll_offset()
    );

    if let Ok(mut messages) = messages.lock() {
        for i in (50..100).rev() {
            messages.insert(0, format!("msg-{i}"));
        }
    }
    list.set_count(150);

    for command in list.take_commands() {
        println!("host executes {command:?}");
    }
    println!(
        "still reading {:?} at offset={}",
        list.key_for(list.range().start),
        list.scroll_offset()
    );
}
