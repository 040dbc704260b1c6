pub mod address;
pub mod chain;
pub mod classify;
pub mod config;
pub mod deployment;
pub mod gm_counter;
pub mod network;
pub mod notice;
pub mod observer;
pub mod platform;
pub mod rpc_wallet;
pub mod submission;
pub mod wallet;

pub mod test_helpers;
