#![allow(clippy::manual_range_contains, clippy::float_cmp)]

pub mod client;
pub mod cl_main;
pub mod cl_parse;
pub mod cl_demo;

pub use cl_main::{host_frame, Client};
