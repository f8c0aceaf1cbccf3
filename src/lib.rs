//! Reconciliation core of a GitOps controller for Nomad.
//!
//! Decides whether a desired job differs meaningfully from what Nomad runs,
//! submits it under the ownership metadata of its source, and watches Nomad
//! for job changes that warrant another look.

pub mod controllers;
pub mod models;
pub mod schedulers;
pub mod utils;

pub use controllers::job::JobController;
pub use controllers::watcher::JobChanges;
pub use schedulers::nomad::NomadClient;
pub use utils::error::Error;
