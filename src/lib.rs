pub mod cli;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod remote;
pub mod revenue;
pub mod rollover;
pub mod time;
pub mod wal;
