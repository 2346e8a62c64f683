//! Live session tracking: the in-memory session registry, its eviction
//! paths, and the observer broadcast group.

pub mod clock;
pub mod feed;
pub mod reaper;
pub mod session;
