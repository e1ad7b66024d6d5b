#![allow(dead_code)]

pub mod broker;
pub mod builders;
pub mod fake_api;

pub use broker::*;
pub use builders::*;
pub use fake_api::*;
