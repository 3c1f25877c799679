//! Runtime components: planning and process management

pub mod executor;
pub mod plan;
pub mod process;

pub use executor::*;
pub use plan::*;
pub use process::*;
