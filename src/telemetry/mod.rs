pub mod client;
pub mod pose;

pub use client::{Handle, OpMode, Reply, ReturnCode, SimClient};
pub use pose::{Pose, WheelCommand};
