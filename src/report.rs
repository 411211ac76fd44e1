use std::collections::BTreeMap;
use std::io::Write;

use color_eyre::eyre::Context;
use color_eyre::Result;
use serde::Serialize;

use crate::slurm::PartitionRecord;

/// One row of a partition report
#[derive(Debug, Serialize)]
struct Row<'a> {
    #[serde(rename = "PARTITION")]
    name: &'a str,
    #[serde(rename = "STATE")]
    state: &'a str,
    #[serde(rename = "AVAIL")]
    available_nodes: u64,
    #[serde(rename = "CPUS")]
    cpus: u64,
    #[serde(rename = "MEM(MB)")]
    mem_mb: u64,
    #[serde(rename = "GPUS")]
    gpus: u64,
    #[serde(rename = "GPU_MEM(MB)")]
    gpu_mem_mb: u64,
    #[serde(rename = "DEF_MEM")]
    default_mem: String,
}

impl<'a> From<&'a PartitionRecord> for Row<'a> {
    fn from(partition: &'a PartitionRecord) -> Self {
        Self {
            name: &partition.name,
            state: &partition.state,
            available_nodes: partition.available_nodes,
            cpus: partition.max_cpus_per_node,
            mem_mb: partition.max_mem_per_node_mb,
            gpus: partition.max_gpus_per_node,
            gpu_mem_mb: partition.gpu_mem_per_gpu_mb,
            default_mem: partition.default_mem.to_string(),
        }
    }
}

impl Row<'_> {
    const HEADER: [&'static str; 8] = [
        "PARTITION",
        "STATE",
        "AVAIL",
        "CPUS",
        "MEM(MB)",
        "GPUS",
        "GPU_MEM(MB)",
        "DEF_MEM",
    ];

    fn cells(&self) -> [String; 8] {
        [
            self.name.to_string(),
            self.state.to_string(),
            self.available_nodes.to_string(),
            self.cpus.to_string(),
            self.mem_mb.to_string(),
            self.gpus.to_string(),
            self.gpu_mem_mb.to_string(),
            self.default_mem.clone(),
        ]
    }
}

/// Writes partitions as `|` delimited values with a header, matching the
/// delimiter used for `sinfo --Format` output
pub fn write_csv<'a, W, I>(writer: W, partitions: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a PartitionRecord>,
{
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'|')
        .from_writer(writer);

    for partition in partitions {
        writer
            .serialize(Row::from(partition))
            .wrap_err("writing partition")?;
    }

    writer.flush().wrap_err("writing partitions")?;
    Ok(())
}

/// Writes partitions as a table with left-aligned text and right-aligned numbers
pub fn write_table<'a, W, I>(mut writer: W, partitions: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a PartitionRecord>,
{
    let rows: Vec<_> = partitions
        .into_iter()
        .map(|v| Row::from(v).cells())
        .collect();

    let mut widths = Row::HEADER.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let header = Row::HEADER.map(String::from);
    for row in std::iter::once(&header).chain(&rows) {
        let mut line = String::new();
        for (column, (cell, width)) in row.iter().zip(widths).enumerate() {
            match column {
                0 => line.push_str(&format!("{:<width$}", cell)),
                1 | 7 => line.push_str(&format!("  {:<width$}", cell)),
                _ => line.push_str(&format!("  {:>width$}", cell)),
            }
        }

        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

/// Largest number of GPUs of each type found on a single node of any partition
pub fn gpu_counts<'a, I>(partitions: I) -> BTreeMap<String, u64>
where
    I: IntoIterator<Item = &'a PartitionRecord>,
{
    let mut counts = BTreeMap::new();
    for partition in partitions {
        for (kind, &count) in &partition.gpu_types {
            let max: &mut u64 = counts.entry(kind.clone()).or_default();
            *max = (*max).max(count);
        }
    }

    counts
}

/// Writes GPU types and per-node counts, one per line
pub fn write_gpus<W: Write>(mut writer: W, counts: &BTreeMap<String, u64>) -> Result<()> {
    if counts.is_empty() {
        writeln!(writer, "No GPUs found")?;
        return Ok(());
    }

    writeln!(writer, "GPU counts by type:")?;
    for (kind, count) in counts {
        writeln!(writer, "  {}: {}", kind, count)?;
    }

    Ok(())
}
