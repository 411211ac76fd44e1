use std::collections::HashMap;
use std::fmt;

use color_eyre::Result;
use serde::Deserialize;

use super::misc::{from_attributes, optional_limit};
use super::TopologyQuerier;

/// Default allocations via DefMemPer* options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DefaultMem {
    /// No default allocation
    #[default]
    Unlimited,
    /// Default memory allocation per allocated CPU
    PerCPU(u64),
    /// Default memory allocation per allocated GPU
    PerGPU(u64),
    /// Default memory allocation per allocated node
    PerNode(u64),
}

impl DefaultMem {
    /// Picks the first numeric limit in the order Slurm documents them;
    /// `UNLIMITED` and invalid values have already been mapped to `None`
    pub fn from_limits(per_cpu: Option<u64>, per_gpu: Option<u64>, per_node: Option<u64>) -> Self {
        per_cpu
            .map(DefaultMem::PerCPU)
            .or(per_gpu.map(DefaultMem::PerGPU))
            .or(per_node.map(DefaultMem::PerNode))
            .unwrap_or_default()
    }

    /// Returns `fallback` if no default is set, e.g. partition defaults
    /// falling back to the cluster-wide defaults in `slurm.conf`
    pub fn or(self, fallback: DefaultMem) -> DefaultMem {
        match self {
            DefaultMem::Unlimited => fallback,
            limit => limit,
        }
    }
}

impl fmt::Display for DefaultMem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DefaultMem::Unlimited => f.write_str("UNLIMITED"),
            DefaultMem::PerCPU(mb) => write!(f, "{}M/CPU", mb),
            DefaultMem::PerGPU(mb) => write!(f, "{}M/GPU", mb),
            DefaultMem::PerNode(mb) => write!(f, "{}M/node", mb),
        }
    }
}

/// Attributes of interest in `scontrol show config` output
#[derive(Clone, Debug, Default, Deserialize)]
struct ConfigAttributes {
    #[serde(rename = "ClusterName", default)]
    cluster_name: String,
    #[serde(rename = "SLURM_VERSION", default)]
    slurm_version: String,

    #[serde(rename = "DefMemPerCPU", default, deserialize_with = "optional_limit")]
    def_mem_per_cpu: Option<u64>,
    #[serde(rename = "DefMemPerGPU", default, deserialize_with = "optional_limit")]
    def_mem_per_gpu: Option<u64>,
    #[serde(rename = "DefMemPerNode", default, deserialize_with = "optional_limit")]
    def_mem_per_node: Option<u64>,
}

/// Global cluster configuration
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlurmConfig {
    pub cluster_name: String,
    pub slurm_version: String,
    /// Cluster-wide default used by partitions without DefMemPer* options
    pub default_mem: DefaultMem,
}

impl SlurmConfig {
    /// Returns the current configuration reported by `querier`
    pub fn collect(querier: &dyn TopologyQuerier) -> Result<SlurmConfig> {
        Ok(Self::parse(&querier.config()?))
    }

    /// Parses `scontrol show config` output, i.e. one `Key = Value` per line.
    /// Headers and other lines without `=` are ignored.
    pub fn parse(text: &str) -> SlurmConfig {
        let values: HashMap<&str, &str> = text
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim(), value.trim()))
            .filter(|(key, _)| !key.is_empty())
            .collect();

        let config: ConfigAttributes = from_attributes(values).unwrap_or_else(|error| {
            log::warn!("ignoring unparseable Slurm configuration: {}", error);
            ConfigAttributes::default()
        });

        SlurmConfig {
            cluster_name: config.cluster_name,
            slurm_version: config.slurm_version,
            default_mem: DefaultMem::from_limits(
                config.def_mem_per_cpu,
                config.def_mem_per_gpu,
                config.def_mem_per_node,
            ),
        }
    }
}
