pub mod component;
pub mod global;

pub use component::*;
pub use global::*;
