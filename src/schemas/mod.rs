// Data structures read from disk.

// The YAML manifest describing the pipeline.
pub mod manifest;
