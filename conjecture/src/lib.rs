pub mod data;
pub mod engine;
pub mod errors;
pub mod mutators;
pub mod ordering;
pub mod settings;
mod shrink;
pub mod strategy;
pub mod text_order;

pub use data::{DataId, Status, TestData};
pub use engine::{TestRunner, find_interesting_buffer};
pub use errors::{DataError, DrawResult};
pub use settings::Settings;
pub use strategy::Strategy;
