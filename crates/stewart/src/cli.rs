pub mod calibrate;
pub mod solve;
pub mod start;
