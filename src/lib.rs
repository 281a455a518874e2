//! See README.md for more

mod command;
mod error;
mod executor;
mod invocation;
mod misc;
mod paths;
pub use command::*;
pub use error::*;
pub use executor::*;
pub use invocation::*;
pub use misc::*;
pub use paths::*;
/// This reexport helps with dependency wrangling
pub use stacked_errors;
