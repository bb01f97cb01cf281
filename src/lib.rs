pub mod config;
pub mod console;
pub mod dispatch;
pub mod errors;
pub mod fleet;
pub mod logs;
pub mod rest;
pub mod socket;
pub mod ui;

pub use forest_common as common;
