use std::collections::BTreeMap;

use serde::Deserialize;

use super::gres::{gpu_resources, parse_gpu_count, parse_gpu_mem_mb};
use super::misc::{lenient_number, parse_lines, parse_variant};

/// Node states in which a node cannot run jobs. States not listed here,
/// including compound states such as `IDLE+DRAIN`, count as available.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DownState {
    Drained,
    Down,
    #[serde(rename = "maint")]
    Maintenance,
    PoweredDown,
    PoweringDown,
    PoweringUp,
    Fail,
    Future,
    #[serde(rename = "inval")]
    Invalid,
    Perfctrs,
}

impl DownState {
    /// Classifies a node state reported by Slurm, ignoring case
    pub fn parse(state: &str) -> Option<DownState> {
        parse_variant(state)
    }
}

/// Returns true if a node in `state` should not be counted as available
pub fn is_down(state: &str) -> bool {
    DownState::parse(state).is_some()
}

/// Attributes of interest in `scontrol show node -o` output
#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct NodeAttributes {
    #[serde(rename = "NodeName", default)]
    name: String,
    #[serde(rename = "CPUTot", default, deserialize_with = "lenient_number")]
    cpus: u64,
    #[serde(rename = "RealMemory", default, deserialize_with = "lenient_number")]
    mem_mb: u64,
    #[serde(rename = "Gres", default)]
    gres: String,
    #[serde(rename = "GresUsed", default)]
    gres_used: String,
    #[serde(rename = "State", default)]
    state: String,
}

/// Resources of a single node
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct NodeResources {
    pub cpus: u64,
    pub mem_mb: u64,
    pub gpu_count: u64,
    pub gpu_mem_mb: u64,
    /// GPUs per sub-type, e.g. `a100`
    pub gpu_types: BTreeMap<String, u64>,
    pub is_available: bool,
}

impl From<NodeAttributes> for NodeResources {
    fn from(node: NodeAttributes) -> Self {
        let mut gpu_types = BTreeMap::new();
        for gpu in gpu_resources(&node.gres) {
            *gpu_types.entry(gpu.label().to_string()).or_default() += gpu.count;
        }

        let is_available = !is_down(&node.state);
        if !is_available {
            log::debug!("node {:?} is unavailable ({})", node.name, node.state);
        }

        Self {
            cpus: node.cpus,
            mem_mb: node.mem_mb,
            gpu_count: parse_gpu_count(&node.gres),
            gpu_mem_mb: parse_gpu_mem_mb(&format!("{} {}", node.gres, node.gres_used)),
            gpu_types,
            is_available,
        }
    }
}

/// Per-node maxima over a set of nodes; capacities are never summed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct NodeSummary {
    pub max_cpus: u64,
    pub max_mem_mb: u64,
    pub max_gpus: u64,
    pub max_gpu_mem_mb: u64,
    /// Maximum number of GPUs of each sub-type on any one node
    pub gpu_types: BTreeMap<String, u64>,
    /// Number of nodes not in a down state
    pub available: u64,
}

impl NodeSummary {
    /// Summarizes the output of `scontrol show node <spec> -o`
    pub fn parse(text: &str) -> Self {
        parse_lines::<NodeAttributes>(text)
            .map(NodeResources::from)
            .fold(Self::default(), |mut summary, node| {
                summary.add(&node);
                summary
            })
    }

    fn add(&mut self, node: &NodeResources) {
        self.max_cpus = self.max_cpus.max(node.cpus);
        self.max_mem_mb = self.max_mem_mb.max(node.mem_mb);
        self.max_gpus = self.max_gpus.max(node.gpu_count);
        self.max_gpu_mem_mb = self.max_gpu_mem_mb.max(node.gpu_mem_mb);

        for (kind, &count) in &node.gpu_types {
            let max = self.gpu_types.entry(kind.clone()).or_default();
            *max = (*max).max(count);
        }

        if node.is_available {
            self.available += 1;
        }
    }
}
