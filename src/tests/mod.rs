//! End-to-end tests over the full recommendation pipeline.
