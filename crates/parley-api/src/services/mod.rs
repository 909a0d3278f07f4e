//! Store-backed operations. These are synchronous and expect to run on a
//! blocking thread (see `state::run_blocking`).

pub mod catalog;
pub mod negotiation;
