use serde::{Deserialize, Serialize};

/// A configured origin of desired job definitions.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Source {
    pub id: String,
    pub url: String,

    // Nomad scoping, empty means the client default
    pub namespace: String,
    pub region: String,

    pub create_namespace: bool,

    // compute and log the diff, but never submit
    pub paused: bool,

    // always resubmit, even when only bookkeeping metadata changed
    pub force: bool,
}
