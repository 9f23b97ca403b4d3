pub mod device_api;
pub mod health_api;

pub use device_api::{debug_ping, get_device_meta};
pub use health_api::{monitor_status, push_samples, reset_monitor};
