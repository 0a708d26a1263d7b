pub mod macros;
pub mod plan;
pub mod time;

pub use plan::*;
pub use time::*;
