pub mod aggregate;
pub mod outcome;
pub mod supervisor;
pub mod verdict;
pub mod watchdog;

pub use aggregate::*;
pub use outcome::*;
pub use supervisor::*;
pub use verdict::*;
pub use watchdog::*;
