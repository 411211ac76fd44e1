//! Pre-flight checks of job sizing requests against a partition

use std::fmt;

use color_eyre::Result;
use thiserror::Error;

use crate::slurm::{collect_partitions, partition_names, PartitionRecord, TopologyQuerier};

/// Resource counted by a [`ValidationError::CapacityExceeded`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    Cpu,
    Gpu,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Resource::Cpu => f.write_str("CPUs"),
            Resource::Gpu => f.write_str("GPUs"),
        }
    }
}

/// Kind of a [`ValidationError`], without its details
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationKind {
    MissingSizing,
    InvalidValue,
    EmptySizing,
    AmbiguousSizing,
    UnknownPartition,
    CapacityExceeded,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("either gpus_per_task or cpus_per_task must be specified")]
    MissingSizing,
    #[error("{field} has to be >= 0, got {value}")]
    InvalidValue { field: &'static str, value: i64 },
    #[error("one of gpus_per_task or cpus_per_task has to be non-zero")]
    EmptySizing,
    #[error(
        "only one of gpus_per_task or cpus_per_task can be specified; for GPU requests use \
         gpus_per_task and CPUs are derived automatically, for CPU requests use cpus_per_task only"
    )]
    AmbiguousSizing,
    #[error("partition {name:?} not found; available partitions: {}", .available.join(", "))]
    UnknownPartition { name: String, available: Vec<String> },
    #[error(
        "requested {requested} {resource} ({per_task} per task x {tasks_per_node} tasks per node) \
         exceeds the maximum of {limit} {resource} per node in partition {partition:?}"
    )]
    CapacityExceeded {
        resource: Resource,
        partition: String,
        per_task: u64,
        tasks_per_node: u64,
        requested: u64,
        limit: u64,
    },
}

impl ValidationError {
    pub fn kind(&self) -> ValidationKind {
        match self {
            ValidationError::MissingSizing => ValidationKind::MissingSizing,
            ValidationError::InvalidValue { .. } => ValidationKind::InvalidValue,
            ValidationError::EmptySizing => ValidationKind::EmptySizing,
            ValidationError::AmbiguousSizing => ValidationKind::AmbiguousSizing,
            ValidationError::UnknownPartition { .. } => ValidationKind::UnknownPartition,
            ValidationError::CapacityExceeded { .. } => ValidationKind::CapacityExceeded,
        }
    }
}

/// Sizing of a job's tasks on a named partition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobRequest {
    pub partition: String,
    pub gpus_per_task: Option<i64>,
    pub cpus_per_task: Option<i64>,
    pub tasks_per_node: u64,
}

/// Task sizing that passed [`JobRequest::check_sizing`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskSizing {
    pub gpus_per_task: u64,
    pub cpus_per_task: u64,
}

impl JobRequest {
    /// Checks that exactly one of GPUs or CPUs per task is requested; this
    /// does not require any information about the cluster
    pub fn check_sizing(&self) -> Result<TaskSizing, ValidationError> {
        if self.gpus_per_task.is_none() && self.cpus_per_task.is_none() {
            return Err(ValidationError::MissingSizing);
        }

        let cpus = non_negative("cpus_per_task", self.cpus_per_task.unwrap_or(0))?;
        let gpus = non_negative("gpus_per_task", self.gpus_per_task.unwrap_or(0))?;

        match (gpus, cpus) {
            (0, 0) => Err(ValidationError::EmptySizing),
            (1.., 1..) => Err(ValidationError::AmbiguousSizing),
            _ => Ok(TaskSizing {
                gpus_per_task: gpus,
                cpus_per_task: cpus,
            }),
        }
    }

    /// Runs every check against a catalog snapshot, returning the requested partition
    pub fn validate<'a>(
        &self,
        partitions: &'a [PartitionRecord],
    ) -> Result<&'a PartitionRecord, ValidationError> {
        let sizing = self.check_sizing()?;

        let partition = partitions
            .iter()
            .find(|v| v.name == self.partition)
            .ok_or_else(|| ValidationError::UnknownPartition {
                name: self.partition.clone(),
                available: partition_names(partitions),
            })?;

        self.check_capacity(partition, Resource::Gpu, sizing.gpus_per_task)?;
        self.check_capacity(partition, Resource::Cpu, sizing.cpus_per_task)?;

        Ok(partition)
    }

    fn check_capacity(
        &self,
        partition: &PartitionRecord,
        resource: Resource,
        per_task: u64,
    ) -> Result<(), ValidationError> {
        let limit = match resource {
            Resource::Cpu => partition.max_cpus_per_node,
            Resource::Gpu => partition.max_gpus_per_node,
        };

        let requested = per_task.saturating_mul(self.tasks_per_node);
        if requested > limit {
            return Err(ValidationError::CapacityExceeded {
                resource,
                partition: partition.name.clone(),
                per_task,
                tasks_per_node: self.tasks_per_node,
                requested,
                limit,
            });
        }

        Ok(())
    }
}

fn non_negative(field: &'static str, value: i64) -> Result<u64, ValidationError> {
    u64::try_from(value).map_err(|_| ValidationError::InvalidValue { field, value })
}

/// Validates `request` against a freshly collected catalog. Sizing errors are
/// reported before Slurm is queried. Validation failures are returned as
/// [`ValidationError`] inside the report.
pub fn validate_job(querier: &dyn TopologyQuerier, request: &JobRequest) -> Result<PartitionRecord> {
    request.check_sizing()?;

    let partitions = collect_partitions(querier)?;
    Ok(request.validate(&partitions)?.clone())
}
