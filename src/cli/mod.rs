pub mod commands;
pub mod handler;
pub mod signals;

pub use commands::*;
pub use handler::*;
pub use signals::*;
