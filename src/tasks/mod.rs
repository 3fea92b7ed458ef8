//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a cache is in use.
//!
//! # Tasks
//! - Maintenance: Sweeps expired entries at configured intervals

mod maintenance;

pub use maintenance::spawn_maintenance_task;
