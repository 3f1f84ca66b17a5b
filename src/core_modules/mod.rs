pub mod arbiter;
pub mod distance_filter;
pub mod frame_diff;
pub mod frame_slot;
pub mod motion_event;
