//! Matching of per-node resource requests against partition capacities

use crate::slurm::{DefaultMem, PartitionRecord};

/// Resources requested on a single node; `gpus_per_node == 0` requests CPUs only
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceRequest {
    pub cpus_per_node: u64,
    pub gpus_per_node: u64,
    pub cpu_ram_mb_per_node: u64,
}

/// CPUs and memory a job launcher grants for a number of GPUs on a partition
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceShape {
    pub cpu_cores: u64,
    pub memory_mb: u64,
}

/// Determines the resource shape granted for `gpus` GPUs on `partition`.
/// Returns `None` if no shape can be determined.
pub trait ShapeOracle {
    fn shape(&self, partition: &str, gpus: u64) -> Option<ResourceShape>;
}

impl<F> ShapeOracle for F
where
    F: Fn(&str, u64) -> Option<ResourceShape>,
{
    fn shape(&self, partition: &str, gpus: u64) -> Option<ResourceShape> {
        self(partition, gpus)
    }
}

/// Grants CPUs and memory in proportion to the share of a node's GPUs
/// requested, unless the partition sets a default memory per GPU.
#[derive(Clone, Copy, Debug)]
pub struct ProportionalShape<'a> {
    partitions: &'a [PartitionRecord],
}

impl<'a> ProportionalShape<'a> {
    pub fn new(partitions: &'a [PartitionRecord]) -> Self {
        Self { partitions }
    }
}

impl ShapeOracle for ProportionalShape<'_> {
    fn shape(&self, partition: &str, gpus: u64) -> Option<ResourceShape> {
        let partition = self.partitions.iter().find(|v| v.name == partition)?;
        let max_gpus = partition.max_gpus_per_node;
        if max_gpus == 0 {
            return None;
        }

        let memory_mb = match partition.default_mem {
            DefaultMem::PerGPU(mb) => mb
                .saturating_mul(gpus)
                .min(partition.max_mem_per_node_mb),
            _ => partition.max_mem_per_node_mb.saturating_mul(gpus) / max_gpus,
        };

        Some(ResourceShape {
            cpu_cores: partition.max_cpus_per_node.saturating_mul(gpus) / max_gpus,
            memory_mb,
        })
    }
}

/// Returns every partition, in catalog order, that is up and can fit `request`
/// on a single node. GPU requests must also fit within the shape `oracle`
/// grants for that many GPUs, as partitions may cap CPUs and RAM per GPU.
pub fn find_matching_partitions<'a>(
    partitions: &'a [PartitionRecord],
    request: &ResourceRequest,
    oracle: &dyn ShapeOracle,
) -> Vec<&'a PartitionRecord> {
    partitions
        .iter()
        .filter(|partition| fits(partition, request, oracle))
        .collect()
}

fn fits(partition: &PartitionRecord, request: &ResourceRequest, oracle: &dyn ShapeOracle) -> bool {
    if !partition.is_up()
        || request.cpus_per_node > partition.max_cpus_per_node
        || request.gpus_per_node > partition.max_gpus_per_node
        || request.cpu_ram_mb_per_node > partition.max_mem_per_node_mb
    {
        return false;
    }

    if request.gpus_per_node > 0 {
        let Some(shape) = oracle.shape(&partition.name, request.gpus_per_node) else {
            log::debug!(
                "no resource shape for {} GPUs on partition {:?}",
                request.gpus_per_node,
                partition.name
            );
            return false;
        };

        return request.cpus_per_node <= shape.cpu_cores
            && request.cpu_ram_mb_per_node <= shape.memory_mb;
    }

    true
}
