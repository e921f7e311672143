/// Frame lifecycle - fenced frame slots, acquire, submit and present

pub mod frame_controller;

pub use frame_controller::*;
