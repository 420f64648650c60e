pub mod check;
pub mod scan;
pub mod watch;
