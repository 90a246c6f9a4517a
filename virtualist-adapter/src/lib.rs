//! Host-side driver for the `virtualist` crate.
//!
//! `virtualist` never touches a real scroll view: it emits [`virtualist::ScrollCommand`]s and
//! expects the host to execute them and report the resulting offsets back. This crate provides
//! a framework-neutral [`Controller`] that does exactly that against a simulated scroll position,
//! including tween-driven animated scrolls.
//!
//! Adapters for a concrete UI toolkit wrap the controller and copy [`Controller::offset`] into
//! their scroll container after each call.
#![forbid(unsafe_code)]

mod controller;
mod tween;


pub use controller::{Controller, DEFAULT_ANIMATION_MS};
pub use tween::{Easing, MIN_RETARGET_MS, Tween};
