mod config;
mod gres;
mod misc;
mod nodes;
mod partitions;

use std::process::{Command, Output};

use color_eyre::eyre::{bail, Context};
use color_eyre::Result;

pub use config::{DefaultMem, SlurmConfig};
pub use gres::{gpu_resources, parse_gpu_count, parse_gpu_mem_mb, GpuResource, UNTYPED_GPU};
pub use nodes::{is_down, DownState};
pub use partitions::{collect_partitions, partition_names, PartitionRecord};

/// Source of raw Slurm topology information in `scontrol ... -o` format
pub trait TopologyQuerier {
    /// One line per partition with `KEY=VALUE` attributes
    fn partitions(&self) -> Result<String>;

    /// One line per node in `spec` (e.g. `a[01-16],b01`) with `KEY=VALUE` attributes
    fn nodes(&self, spec: &str) -> Result<String>;

    /// Global configuration with one `Key = Value` per line
    fn config(&self) -> Result<String>;
}

/// Queries Slurm by running `scontrol`
#[derive(Clone, Debug)]
pub struct Scontrol {
    exe: String,
}

impl Scontrol {
    pub fn new<S: Into<String>>(exe: S) -> Self {
        Self { exe: exe.into() }
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        log::debug!("running {} {}", self.exe, args.join(" "));

        Command::new(&self.exe)
            .args(args)
            .output()
            .wrap_err_with(|| format!("failed to execute `{} {}`", self.exe, args.join(" ")))
    }

    /// Runs a query whose output is unusable if empty; partial output of a
    /// failed query is used with a warning
    fn query(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args)?;

        if !output.status.success() {
            if output.stdout.is_empty() {
                bail!(
                    "`{} {}` failed with {}: {}",
                    self.exe,
                    args.join(" "),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }

            log::warn!(
                "`{} {}` failed with {}; using partial output",
                self.exe,
                args.join(" "),
                output.status
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for Scontrol {
    fn default() -> Self {
        Self::new("scontrol")
    }
}

impl TopologyQuerier for Scontrol {
    fn partitions(&self) -> Result<String> {
        self.query(&["show", "partition", "-o"])
    }

    fn nodes(&self, spec: &str) -> Result<String> {
        let output = self.run(&["show", "node", spec, "-o"])?;

        // `scontrol show node` may exit with an error despite producing useful output
        if !output.status.success() {
            log::debug!(
                "`{} show node {}` exited with {}",
                self.exe,
                spec,
                output.status
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn config(&self) -> Result<String> {
        self.query(&["show", "config"])
    }
}
