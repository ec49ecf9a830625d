pub mod config;
pub mod matches;
pub mod profile;
pub mod recommend;
pub mod session;
