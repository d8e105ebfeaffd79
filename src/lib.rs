// External Modules
extern crate pest;
#[macro_use]
extern crate pest_derive;

// Internal Modules
pub mod compiler;

pub use compiler::{compile, CompileOutcome};
