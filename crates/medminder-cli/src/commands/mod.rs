pub mod check;
pub mod config;
pub mod remind;
pub mod status;
