use serde::{Deserialize, Deserializer, Serialize};

use super::ownership::{meta_field_name, META_KEY_FORCE_RESTART, META_KEY_SRC_COMMIT};

// Nomad encodes empty lists as null.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct FieldDiff {
    #[serde(rename = "Type", default)]
    pub diff_type: String,

    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "Old", default)]
    pub old: String,

    #[serde(rename = "New", default)]
    pub new: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct ObjectDiff {
    #[serde(rename = "Type", default)]
    pub diff_type: String,

    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "Fields", default, deserialize_with = "null_as_empty")]
    pub fields: Vec<FieldDiff>,

    #[serde(rename = "Objects", default, deserialize_with = "null_as_empty")]
    pub objects: Vec<ObjectDiff>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct TaskDiff {
    #[serde(rename = "Type", default)]
    pub diff_type: String,

    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "Fields", default, deserialize_with = "null_as_empty")]
    pub fields: Vec<FieldDiff>,

    #[serde(rename = "Objects", default, deserialize_with = "null_as_empty")]
    pub objects: Vec<ObjectDiff>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct TaskGroupDiff {
    #[serde(rename = "Type", default)]
    pub diff_type: String,

    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "Fields", default, deserialize_with = "null_as_empty")]
    pub fields: Vec<FieldDiff>,

    #[serde(rename = "Objects", default, deserialize_with = "null_as_empty")]
    pub objects: Vec<ObjectDiff>,

    #[serde(rename = "Tasks", default, deserialize_with = "null_as_empty")]
    pub tasks: Vec<TaskDiff>,
}

/// Structural delta between a candidate job and the one Nomad is running.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct JobDiff {
    #[serde(rename = "Type", default)]
    pub diff_type: String,

    #[serde(rename = "ID", default)]
    pub id: String,

    #[serde(rename = "Fields", default, deserialize_with = "null_as_empty")]
    pub fields: Vec<FieldDiff>,

    #[serde(rename = "Objects", default, deserialize_with = "null_as_empty")]
    pub objects: Vec<ObjectDiff>,

    #[serde(rename = "TaskGroups", default, deserialize_with = "null_as_empty")]
    pub task_groups: Vec<TaskGroupDiff>,
}

/// Response of a dry-run plan.
#[derive(Deserialize, Debug, PartialEq, Clone, Default)]
pub struct JobPlanResponse {
    #[serde(rename = "Diff", default)]
    pub diff: Option<JobDiff>,

    #[serde(rename = "JobModifyIndex", default)]
    pub job_modify_index: u64,

    #[serde(rename = "Warnings", default)]
    pub warnings: String,
}

/// Decides whether a diff has to be submitted.
///
/// A diff whose only top level change is the source commit or the restart
/// nonce is bookkeeping, re-syncing the same job from a newer commit must not
/// roll it. `restart` and `force` override that. More than one changed field
/// always counts.
pub fn has_update(diff: &JobDiff, restart: bool, force: bool) -> bool {
    if !diff.objects.is_empty() {
        return true;
    }

    if !diff.fields.is_empty() {
        let bookkeeping = [
            meta_field_name(META_KEY_SRC_COMMIT),
            meta_field_name(META_KEY_FORCE_RESTART),
        ];
        if diff.fields.len() != 1
            || !bookkeeping.contains(&diff.fields[0].name)
            || force
            || restart
        {
            return true;
        }
    }

    diff.task_groups.iter().any(|task_group| {
        !task_group.fields.is_empty()
            || !task_group.objects.is_empty()
            || task_group
                .tasks
                .iter()
                .any(|task| !task.fields.is_empty() || !task.objects.is_empty())
    })
}
