use argh::FromArgs;

/// Slurm partition capacities and job placement checks
#[derive(FromArgs, Debug)]
pub struct Args {
    /// location of `scontrol` executable
    #[argh(option, default = "\"scontrol\".to_string()")]
    pub scontrol: String,

    /// print version information
    #[argh(switch, short = 'v')]
    pub version: bool,

    #[argh(subcommand)]
    pub command: Option<Command>,
}

#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand)]
pub enum Command {
    Info(InfoArgs),
    Partitions(PartitionsArgs),
    Match(MatchArgs),
    Validate(ValidateArgs),
    Gpus(GpusArgs),
}

/// Show the cluster name and Slurm version
#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand, name = "info")]
pub struct InfoArgs {}

/// List the per-node capacity of every partition
#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand, name = "partitions")]
pub struct PartitionsArgs {
    /// print `|` delimited values instead of a table
    #[argh(switch)]
    pub csv: bool,
}

/// List partitions able to run a job of the given size on a single node
#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand, name = "match")]
pub struct MatchArgs {
    /// CPUs required per node
    #[argh(option, default = "0")]
    pub cpus: u64,

    /// GPUs required per node
    #[argh(option, default = "0")]
    pub gpus: u64,

    /// RAM in MB required per node
    #[argh(option, default = "0")]
    pub mem: u64,

    /// print `|` delimited values instead of a table
    #[argh(switch)]
    pub csv: bool,
}

/// Check a job sizing request against a partition
#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand, name = "validate")]
pub struct ValidateArgs {
    /// name of the partition
    #[argh(option)]
    pub partition: String,

    /// GPUs per task; CPUs are derived from the GPU count
    #[argh(option)]
    pub gpus_per_task: Option<i64>,

    /// CPUs per task, for CPU-only jobs
    #[argh(option)]
    pub cpus_per_task: Option<i64>,

    /// number of tasks per node
    #[argh(option, default = "1")]
    pub tasks_per_node: u64,
}

/// Show the largest number of GPUs of each type on a single node
#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand, name = "gpus")]
pub struct GpusArgs {
    /// check whether a GPU type (e.g. A100) exists in the cluster
    #[argh(option)]
    pub check: Option<String>,
}
