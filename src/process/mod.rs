pub mod environment;
pub mod handle;
#[cfg(unix)]
mod handle_unix;
#[cfg(windows)]
mod handle_windows;
pub mod log_relay;
pub mod pid_file;
pub mod reconcile;
pub mod supervisor;

pub use environment::*;
pub use handle::*;
pub use log_relay::*;
pub use pid_file::*;
pub use reconcile::*;
pub use supervisor::*;
