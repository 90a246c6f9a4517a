use virtualist::{ListOptions, ScrollRequest};
use virtualist_adapter::{Controller, Easing};

fn main() {
    // Example: a controller animating a scroll-to without holding any UI objects.
    //
    // An adapter would:
    // - forward layout and user scroll events
    // - call tick(now_ms) in a frame loop / timer
    // - apply the returned offset to the real scroll container (if any)
    // - render the bound slots
    let mut c =
        Controller::new(ListOptions::new(10_000, 20.0)).with_animation(240, Easing::SmoothStep);
    c.on_layout(400.0);

    c.scroll_to(
        ScrollRequest::index(2_000).with_view_position(0.5).animated(true),
        0,
    );
    println!("target_offset={:?}", c.tween().map(|t| t.to));

    let mut now_ms = 0u64;
    while c.is_animating() || c.list().is_scroll_to_in_flight() {
        now_ms += 16;
        if let Some(off) = c.tick(now_ms) {
            if now_ms % 80 == 0 {
                println!("t={now_ms} off={off} range={:?}", c.list().range());
            }
        }
    }

    println!("done: off={} range={:?}", c.offset(), c.list().range());
}
