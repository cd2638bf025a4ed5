//! REST API handlers

pub mod billing;
pub mod health;
pub mod shared;
pub mod webhook;

pub use billing::*;
pub use health::*;
pub use webhook::*;
