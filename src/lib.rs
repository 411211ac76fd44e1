/// Application.
pub mod app;
/// Command-line arguments
pub mod args;
/// Matching of resource requests against partitions
pub mod placement;
/// Text and CSV reports
pub mod report;
/// Querying of Slurm state
pub mod slurm;
/// Validation of job sizing requests
pub mod validate;
