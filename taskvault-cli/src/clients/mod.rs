//! HTTP implementations of the tracker and oracle seams.

pub mod asana;
pub mod azure;
