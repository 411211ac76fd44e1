//! Parsing of generic resource (GRES) descriptors as reported by `scontrol`,
//! e.g. `gpu:a100:2(S:0-1)` or `cpu:10,gpu:tesla:4`.
//!
//! Scheduler output varies between versions and sites, so nothing in this
//! module fails: anything that cannot be parsed counts as zero.

/// Label used for GPUs listed without a sub-type, e.g. `gpu:4`
pub const UNTYPED_GPU: &str = "gpu";

/// A single `gpu[:<type>]:<count>` entry of a GRES descriptor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GpuResource {
    /// GPU sub-type, e.g. `a100`, if any
    pub kind: Option<String>,
    pub count: u64,
}

impl GpuResource {
    /// Returns the sub-type or [`UNTYPED_GPU`]
    pub fn label(&self) -> &str {
        self.kind.as_deref().unwrap_or(UNTYPED_GPU)
    }
}

/// Returns every GPU entry in a GRES descriptor; non-GPU resources are ignored
pub fn gpu_resources(gres: &str) -> impl Iterator<Item = GpuResource> + '_ {
    gres.split(',').filter_map(|token| {
        // Strip qualifiers such as `(S:0-1)` or `(IDX:0,2)`
        let (token, _) = token.trim().split_once('(').unwrap_or((token.trim(), ""));

        let mut fields = token.split(':');
        if fields.next() != Some("gpu") {
            return None;
        }

        let fields: Vec<_> = fields.collect();
        let (kind, count) = match fields.as_slice() {
            [] => (None, 0),
            [count] => (None, count.parse().unwrap_or(0)),
            [kind, count, ..] => (Some(kind.to_string()), count.parse().unwrap_or(0)),
        };

        Some(GpuResource { kind, count })
    })
}

/// Total number of GPUs in a GRES descriptor; 0 for `(null)` or empty values
pub fn parse_gpu_count(gres: &str) -> u64 {
    gpu_resources(gres).map(|v| v.count).sum()
}

/// Extracts the first `mem:<value>[M|G|T]` quantity (in MB) found anywhere in
/// `gres`, ignoring case. Returns 0 if no such quantity is present.
pub fn parse_gpu_mem_mb(gres: &str) -> u64 {
    const NEEDLE: &str = "mem:";

    let gres = gres.to_ascii_lowercase();
    let mut rest = gres.as_str();
    while let Some(index) = rest.find(NEEDLE) {
        rest = &rest[index + NEEDLE.len()..];

        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            continue;
        }

        let Ok(value) = rest[..digits].parse::<u64>() else {
            continue;
        };

        let factor = match rest[digits..].chars().next() {
            Some('g') => 1024,
            Some('t') => 1024 * 1024,
            _ => 1,
        };

        return value.saturating_mul(factor);
    }

    0
}
