pub mod controller;
pub mod pid;

pub use controller::BalanceController;
pub use pid::{Pid, PidGains};
