//! Transaction-to-invoice matching engine

pub mod config;
pub mod scorer;
pub mod selector;

pub use config::*;
pub use scorer::*;
pub use selector::*;
