use std::io::Write;

use color_eyre::Result;

use crate::args::{Command, GpusArgs, MatchArgs, PartitionsArgs, ValidateArgs};
use crate::placement::{find_matching_partitions, ProportionalShape, ResourceRequest};
use crate::report::{gpu_counts, write_csv, write_gpus, write_table};
use crate::slurm::{collect_partitions, PartitionRecord, SlurmConfig, TopologyQuerier};
use crate::validate::{validate_job, JobRequest};

/// Outcome of a command that completed without errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The command ran, but found nothing, e.g. no matching partitions
    NotFound,
}

#[derive(Debug)]
pub struct App<Q> {
    /// Source of Slurm topology information
    querier: Q,
}

impl<Q: TopologyQuerier> App<Q> {
    /// Constructs a new instance of [`App`].
    pub fn new(querier: Q) -> Self {
        Self { querier }
    }

    /// Runs `command`, writing results to `out` and notes to `err`
    pub fn run<W, E>(&self, command: &Command, out: &mut W, err: &mut E) -> Result<Outcome>
    where
        W: Write,
        E: Write,
    {
        match command {
            Command::Info(_) => self.info(out),
            Command::Partitions(args) => self.partitions(args, out),
            Command::Match(args) => self.matching(args, out, err),
            Command::Validate(args) => self.validate(args, out),
            Command::Gpus(args) => self.gpus(args, out),
        }
    }

    fn info<W: Write>(&self, out: &mut W) -> Result<Outcome> {
        let config = SlurmConfig::collect(&self.querier)?;
        writeln!(out, "Cluster Name: {}", config.cluster_name)?;
        writeln!(out, "Slurm Version: {}", config.slurm_version)?;

        Ok(Outcome::Success)
    }

    fn partitions<W: Write>(&self, args: &PartitionsArgs, out: &mut W) -> Result<Outcome> {
        let partitions = collect_partitions(&self.querier)?;
        write_partitions(out, &partitions, args.csv)?;

        Ok(Outcome::Success)
    }

    fn matching<W, E>(&self, args: &MatchArgs, out: &mut W, err: &mut E) -> Result<Outcome>
    where
        W: Write,
        E: Write,
    {
        let request = ResourceRequest {
            cpus_per_node: args.cpus,
            gpus_per_node: args.gpus,
            cpu_ram_mb_per_node: args.mem,
        };

        let partitions = collect_partitions(&self.querier)?;
        let oracle = ProportionalShape::new(&partitions);
        let matches = find_matching_partitions(&partitions, &request, &oracle);

        if matches.is_empty() {
            writeln!(
                err,
                "No partition can provide {} CPUs, {} GPUs and {} MB RAM on a single node",
                request.cpus_per_node, request.gpus_per_node, request.cpu_ram_mb_per_node
            )?;

            return Ok(Outcome::NotFound);
        }

        write_partitions(out, matches, args.csv)?;
        Ok(Outcome::Success)
    }

    fn validate<W: Write>(&self, args: &ValidateArgs, out: &mut W) -> Result<Outcome> {
        let request = JobRequest {
            partition: args.partition.clone(),
            gpus_per_task: args.gpus_per_task,
            cpus_per_task: args.cpus_per_task,
            tasks_per_node: args.tasks_per_node,
        };

        let partition = validate_job(&self.querier, &request)?;
        writeln!(out, "Request fits partition {:?}", partition.name)?;

        Ok(Outcome::Success)
    }

    fn gpus<W: Write>(&self, args: &GpusArgs, out: &mut W) -> Result<Outcome> {
        let partitions = collect_partitions(&self.querier)?;
        let counts = gpu_counts(&partitions);

        let Some(kind) = &args.check else {
            write_gpus(out, &counts)?;
            return Ok(Outcome::Success);
        };

        if counts.keys().any(|v| v.eq_ignore_ascii_case(kind)) {
            writeln!(out, "GPU type {} is available in the cluster.", kind)?;
            Ok(Outcome::Success)
        } else {
            writeln!(out, "GPU type {} is NOT available in the cluster.", kind)?;
            Ok(Outcome::NotFound)
        }
    }
}

fn write_partitions<'a, W, I>(out: &mut W, partitions: I, csv: bool) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a PartitionRecord>,
{
    if csv {
        write_csv(out, partitions)
    } else {
        write_table(out, partitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::InfoArgs;
    use crate::slurm::testing::{BrokenQuerier, CannedQuerier};
    use crate::validate::{ValidationError, ValidationKind};

    fn querier() -> CannedQuerier {
        CannedQuerier::new(
            "PartitionName=gpu Nodes=g[01-02] State=UP\n\
             PartitionName=cpu Nodes=c01 State=UP\n\
             PartitionName=old Nodes=o01 State=DOWN\n",
        )
        .with_nodes(
            "g[01-02]",
            "NodeName=g01 CPUTot=64 RealMemory=512000 Gres=gpu:a100:8 State=IDLE\n\
             NodeName=g02 CPUTot=64 RealMemory=512000 Gres=gpu:a100:8 State=MIXED\n",
        )
        .with_nodes("c01", "NodeName=c01 CPUTot=128 RealMemory=256000 State=IDLE\n")
        .with_nodes(
            "o01",
            "NodeName=o01 CPUTot=256 RealMemory=1024000 Gres=gpu:v100:4 State=DOWN\n",
        )
        .with_config("ClusterName = hpc-east\nSLURM_VERSION = 23.02.7\n")
    }

    fn run(command: Command) -> (Result<Outcome>, String, String) {
        run_with(querier(), command)
    }

    fn run_with<Q: TopologyQuerier>(querier: Q, command: Command) -> (Result<Outcome>, String, String) {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let result = App::new(querier).run(&command, &mut out, &mut err);

        (
            result,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_info() {
        let (result, out, _) = run(Command::Info(InfoArgs {}));

        assert_eq!(result.unwrap(), Outcome::Success);
        assert_eq!(out, "Cluster Name: hpc-east\nSlurm Version: 23.02.7\n");

        let (result, _, _) = run_with(BrokenQuerier, Command::Info(InfoArgs {}));
        assert!(result.is_err());
    }

    #[test]
    fn test_partitions() {
        let (result, out, _) = run(Command::Partitions(PartitionsArgs { csv: true }));

        assert_eq!(result.unwrap(), Outcome::Success);
        assert_eq!(
            out,
            "PARTITION|STATE|AVAIL|CPUS|MEM(MB)|GPUS|GPU_MEM(MB)|DEF_MEM\n\
             gpu|UP|2|64|512000|8|0|UNLIMITED\n\
             cpu|UP|1|128|256000|0|0|UNLIMITED\n\
             old|DOWN|0|256|1024000|4|0|UNLIMITED\n"
        );
    }

    #[test]
    fn test_match() {
        let (result, out, err) = run(Command::Match(MatchArgs {
            cpus: 16,
            gpus: 2,
            mem: 128000,
            csv: true,
        }));

        assert_eq!(result.unwrap(), Outcome::Success);
        assert_eq!(err, "");
        assert_eq!(
            out,
            "PARTITION|STATE|AVAIL|CPUS|MEM(MB)|GPUS|GPU_MEM(MB)|DEF_MEM\n\
             gpu|UP|2|64|512000|8|0|UNLIMITED\n"
        );
    }

    #[test]
    fn test_match_cluster_default_mem() {
        let command = || {
            Command::Match(MatchArgs {
                cpus: 8,
                gpus: 2,
                mem: 100000,
                csv: true,
            })
        };

        // 2 of 8 GPUs grant a quarter of the node's RAM
        let (result, _, _) = run(command());
        assert_eq!(result.unwrap(), Outcome::Success);

        // 2 GPUs at 32000 MB each are less than requested
        let querier = querier().with_config("DefMemPerGPU = 32000\n");
        let (result, out, _) = run_with(querier, command());
        assert_eq!(result.unwrap(), Outcome::NotFound);
        assert_eq!(out, "");
    }

    #[test]
    fn test_match_cpu_only() {
        let (result, out, _) = run(Command::Match(MatchArgs {
            cpus: 64,
            gpus: 0,
            mem: 0,
            csv: true,
        }));

        assert_eq!(result.unwrap(), Outcome::Success);
        assert!(out.contains("\ngpu|"), "{}", out);
        assert!(out.contains("\ncpu|"), "{}", out);
        assert!(!out.contains("\nold|"), "{}", out);
    }

    #[test]
    fn test_match_none() {
        // 2 of 8 GPUs only grant 16 CPUs
        let (result, out, err) = run(Command::Match(MatchArgs {
            cpus: 17,
            gpus: 2,
            mem: 0,
            csv: false,
        }));

        assert_eq!(result.unwrap(), Outcome::NotFound);
        assert_eq!(out, "");
        assert!(err.starts_with("No partition can provide 17 CPUs"), "{}", err);
    }

    #[test]
    fn test_validate() {
        let (result, out, _) = run(Command::Validate(ValidateArgs {
            partition: "gpu".into(),
            gpus_per_task: Some(4),
            cpus_per_task: None,
            tasks_per_node: 2,
        }));

        assert_eq!(result.unwrap(), Outcome::Success);
        assert_eq!(out, "Request fits partition \"gpu\"\n");
    }

    #[test]
    fn test_validate_unknown_partition() {
        let (result, _, _) = run(Command::Validate(ValidateArgs {
            partition: "missing".into(),
            gpus_per_task: None,
            cpus_per_task: Some(1),
            tasks_per_node: 1,
        }));

        let report = result.unwrap_err();
        let error = report.downcast_ref::<ValidationError>().unwrap();
        assert_eq!(error.kind(), ValidationKind::UnknownPartition);
        assert!(error.to_string().ends_with("gpu, cpu, old"), "{}", error);
    }

    #[test]
    fn test_gpus() {
        let (result, out, _) = run(Command::Gpus(GpusArgs { check: None }));
        assert_eq!(result.unwrap(), Outcome::Success);
        assert_eq!(out, "GPU counts by type:\n  a100: 8\n  v100: 4\n");

        let (result, out, _) = run(Command::Gpus(GpusArgs {
            check: Some("A100".into()),
        }));
        assert_eq!(result.unwrap(), Outcome::Success);
        assert_eq!(out, "GPU type A100 is available in the cluster.\n");

        let (result, _, _) = run(Command::Gpus(GpusArgs {
            check: Some("H100".into()),
        }));
        assert_eq!(result.unwrap(), Outcome::NotFound);
    }
}
