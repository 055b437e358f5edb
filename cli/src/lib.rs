pub mod cmd;
pub mod style;
pub mod util;
