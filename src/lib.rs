pub mod config;
pub mod security;
pub mod shared;
pub mod tickets;
