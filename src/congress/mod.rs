mod client;
pub mod types;

pub use client::{CongressBillSource, CongressClient};
