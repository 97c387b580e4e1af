pub mod config;
pub mod gc;
pub mod list;
pub mod run;
