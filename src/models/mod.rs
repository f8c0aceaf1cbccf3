pub mod event;
pub mod job;
pub mod job_diff;
pub mod ownership;
pub mod source;
