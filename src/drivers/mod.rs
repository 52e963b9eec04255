//! Concrete page drivers.

pub mod chromium;

pub use chromium::{ChromiumFactory, ChromiumPage};
