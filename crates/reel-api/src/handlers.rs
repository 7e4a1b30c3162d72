//! Request handlers.

pub mod compile;
pub mod health;
pub mod schema;

pub use compile::*;
pub use health::*;
pub use schema::*;
