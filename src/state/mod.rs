//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `FollowerState`: the pagination state machine of one follower
//! - `FollowerOutcome`: how a follower ended, with its page and row counts

mod follower_state;

// Re-export main types
pub use follower_state::{FollowerOutcome, FollowerState};
