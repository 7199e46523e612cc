//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiration sweep: removes expired rows at configured intervals

mod sweeper;

pub use sweeper::spawn_sweeper_task;
