//! State module for tracking crawl job progress
//!
//! - `JobState`: lifecycle of a crawl job (pending, running, stopping, stopped, completed)

mod job_state;

pub use job_state::JobState;
