#[cfg(test)]
pub mod fake;
pub mod nomad;
pub mod scheduler;
