use std::collections::BTreeMap;

use color_eyre::Result;
use serde::Deserialize;

use super::config::{DefaultMem, SlurmConfig};
use super::misc::{optional_limit, parse_lines};
use super::nodes::NodeSummary;
use super::TopologyQuerier;

/// Capacity of a single Slurm partition. All capacities are the best single
/// node in the partition, not the sum over its nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartitionRecord {
    pub name: String,
    pub max_cpus_per_node: u64,
    pub max_mem_per_node_mb: u64,
    pub max_gpus_per_node: u64,
    /// Largest per-GPU memory found in GRES descriptors; 0 if unknown
    pub gpu_mem_per_gpu_mb: u64,
    /// Nodes not in a down state
    pub available_nodes: u64,
    /// Administrative state of the partition, e.g. `UP`
    pub state: String,
    /// Maximum number of GPUs of each sub-type on any one node
    pub gpu_types: BTreeMap<String, u64>,
    /// Partition default, or the cluster-wide default if the partition has none
    pub default_mem: DefaultMem,
}

impl PartitionRecord {
    /// Returns true if the partition accepts jobs
    pub fn is_up(&self) -> bool {
        self.state.eq_ignore_ascii_case("UP")
    }

    fn new(partition: PartitionAttributes, nodes: NodeSummary, config: &SlurmConfig) -> Self {
        Self {
            name: partition.name,
            max_cpus_per_node: nodes.max_cpus,
            max_mem_per_node_mb: nodes.max_mem_mb,
            max_gpus_per_node: nodes.max_gpus,
            gpu_mem_per_gpu_mb: nodes.max_gpu_mem_mb,
            available_nodes: nodes.available,
            state: partition.state,
            gpu_types: nodes.gpu_types,
            default_mem: DefaultMem::from_limits(
                partition.def_mem_per_cpu,
                partition.def_mem_per_gpu,
                partition.def_mem_per_node,
            )
            .or(config.default_mem),
        }
    }
}

fn unknown_name() -> String {
    "Unknown".into()
}

fn unknown_state() -> String {
    "UNKNOWN".into()
}

/// Attributes of interest in `scontrol show partition -o` output
#[derive(Clone, Debug, Deserialize)]
struct PartitionAttributes {
    #[serde(rename = "PartitionName", default = "unknown_name")]
    name: String,
    /// Node specification, e.g. `a[01-16],b01`, or `(null)`
    #[serde(rename = "Nodes", default)]
    nodes: String,
    #[serde(rename = "State", default = "unknown_state")]
    state: String,

    #[serde(rename = "DefMemPerCPU", default, deserialize_with = "optional_limit")]
    def_mem_per_cpu: Option<u64>,
    #[serde(rename = "DefMemPerGPU", default, deserialize_with = "optional_limit")]
    def_mem_per_gpu: Option<u64>,
    #[serde(rename = "DefMemPerNode", default, deserialize_with = "optional_limit")]
    def_mem_per_node: Option<u64>,
}

impl PartitionAttributes {
    fn has_nodes(&self) -> bool {
        !self.nodes.is_empty() && self.nodes != "(null)"
    }
}

/// Builds one record per partition reported by `querier`, in the order
/// reported. Every call queries the scheduler anew.
pub fn collect_partitions(querier: &dyn TopologyQuerier) -> Result<Vec<PartitionRecord>> {
    // Cluster-wide defaults are optional; partitions are not
    let config = SlurmConfig::collect(querier).unwrap_or_else(|error| {
        log::warn!("cluster-wide defaults unavailable: {:#}", error);
        SlurmConfig::default()
    });
    let text = querier.partitions()?;

    let mut partitions = Vec::new();
    for partition in parse_lines::<PartitionAttributes>(&text) {
        let nodes = if partition.has_nodes() {
            NodeSummary::parse(&querier.nodes(&partition.nodes)?)
        } else {
            log::debug!("partition {:?} has no nodes", partition.name);
            NodeSummary::default()
        };

        partitions.push(PartitionRecord::new(partition, nodes, &config));
    }

    Ok(partitions)
}

/// Returns the names of all partitions, e.g. for error messages
pub fn partition_names(partitions: &[PartitionRecord]) -> Vec<String> {
    partitions.iter().map(|v| v.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slurm::testing::CannedQuerier;

    fn querier() -> CannedQuerier {
        CannedQuerier::new(
            "PartitionName=gpu AllowGroups=ALL Nodes=g[01-02] State=UP DefMemPerGPU=64000 DefMemPerCPU=UNLIMITED\n\
             PartitionName=cpu Nodes=c01 State=UP DefMemPerCPU=4000\n\
             PartitionName=empty Nodes=(null) State=UP\n\
             \n\
             Nodes=c01 State=DOWN\n",
        )
        .with_nodes(
            "g[01-02]",
            "NodeName=g01 CPUTot=96 RealMemory=1000000 Gres=gpu:h100:8(S:0-1) GresUsed=gpu:h100:0(IDX:N/A) State=IDLE\n\
             NodeName=g02 CPUTot=64 RealMemory=512000 Gres=gpu:a100:4(mem:80G) State=DRAINED\n",
        )
        .with_nodes(
            "c01",
            "NodeName=c01 CPUTot=128 RealMemory=256000 Gres=(null) State=MIXED\n",
        )
    }

    #[test]
    fn test_collect_partitions() {
        let partitions = collect_partitions(&querier()).unwrap();

        assert_eq!(
            partitions,
            vec![
                PartitionRecord {
                    name: "gpu".into(),
                    max_cpus_per_node: 96,
                    max_mem_per_node_mb: 1000000,
                    max_gpus_per_node: 8,
                    gpu_mem_per_gpu_mb: 81920,
                    available_nodes: 1,
                    state: "UP".into(),
                    gpu_types: BTreeMap::from([("h100".into(), 8), ("a100".into(), 4)]),
                    default_mem: DefaultMem::PerGPU(64000),
                },
                PartitionRecord {
                    name: "cpu".into(),
                    max_cpus_per_node: 128,
                    max_mem_per_node_mb: 256000,
                    available_nodes: 1,
                    state: "UP".into(),
                    default_mem: DefaultMem::PerCPU(4000),
                    ..Default::default()
                },
                PartitionRecord {
                    name: "empty".into(),
                    state: "UP".into(),
                    ..Default::default()
                },
                PartitionRecord {
                    name: "Unknown".into(),
                    max_cpus_per_node: 128,
                    max_mem_per_node_mb: 256000,
                    available_nodes: 1,
                    state: "DOWN".into(),
                    ..Default::default()
                },
            ]
        );
    }

    #[test]
    fn test_cluster_default_mem() {
        let querier = querier().with_config("ClusterName = hpc\nDefMemPerNode = 8000\n");
        let partitions = collect_partitions(&querier).unwrap();

        let default_mem: Vec<_> = partitions.iter().map(|v| v.default_mem).collect();
        assert_eq!(
            default_mem,
            vec![
                DefaultMem::PerGPU(64000),
                DefaultMem::PerCPU(4000),
                DefaultMem::PerNode(8000),
                DefaultMem::PerNode(8000),
            ]
        );
    }

    #[test]
    fn test_null_nodes_are_not_queried() {
        let querier = CannedQuerier::new("PartitionName=empty Nodes=(null) State=UP\n");
        let partitions = collect_partitions(&querier).unwrap();

        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].max_cpus_per_node, 0);
        assert_eq!(partitions[0].available_nodes, 0);
        assert!(querier.node_queries().is_empty());
    }

    #[test]
    fn test_missing_state() {
        let querier = CannedQuerier::new("PartitionName=debug\n");
        let partitions = collect_partitions(&querier).unwrap();

        assert_eq!(partitions[0].state, "UNKNOWN");
        assert!(!partitions[0].is_up());
    }

    #[test]
    fn test_collect_is_idempotent() {
        let querier = querier();
        assert_eq!(
            collect_partitions(&querier).unwrap(),
            collect_partitions(&querier).unwrap()
        );
    }

    #[test]
    fn test_is_up() {
        let mut partition = PartitionRecord {
            state: "up".into(),
            ..Default::default()
        };
        assert!(partition.is_up());

        partition.state = "DRAIN".into();
        assert!(!partition.is_up());
    }

    #[test]
    fn test_partition_names() {
        let partitions = collect_partitions(&querier()).unwrap();
        assert_eq!(
            partition_names(&partitions),
            vec!["gpu", "cpu", "empty", "Unknown"]
        );
    }
}
