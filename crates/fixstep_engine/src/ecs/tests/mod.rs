//! Scenario tests spanning the World and the update scheduler

pub(crate) mod fixtures;
