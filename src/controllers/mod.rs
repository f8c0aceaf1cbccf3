pub mod job;
pub mod watcher;
