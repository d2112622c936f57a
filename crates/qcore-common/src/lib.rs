#![allow(clippy::manual_range_contains, clippy::float_cmp, clippy::type_complexity,
         clippy::new_without_default, clippy::comparison_chain)]

pub mod q_shared;
pub mod wildcards;
pub mod error;
pub mod qcommon;
pub mod common;
pub mod cmd;
pub mod cvar;
pub mod files;
pub mod net;
pub mod net_loop;
pub mod net_vcr;

pub use error::{QError, QResult};
