pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod process;
pub mod registry;
pub mod test_utils;
pub mod users;

pub use error::{Result, SupervisorError};
pub use process::{Supervisor, SupervisorConfig};
pub use registry::SupervisorRegistry;
