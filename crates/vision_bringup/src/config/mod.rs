//! Launch file configuration, argument resolution and substitution

mod arguments;
mod condition;
mod launch_file;
mod substitution;

pub use arguments::*;
pub use condition::*;
pub use launch_file::*;
pub use substitution::*;
