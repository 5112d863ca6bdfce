//! Oracle is part of the closed dialect set (§2) but no pure-Rust driver for
//! it appears anywhere in this workspace's dependency stack, and adding one
//! would mean vendoring an OCI binding with no grounding in the corpus.
//! Rather than fabricate a dependency, the adapter is recognized by the
//! registry but construction fails with a configuration error — the same
//! shape the teacher uses for capabilities a provider doesn't implement
//! (`AIProvider::upload_file`'s default `Err("... not supported")`).

use crate::error::AppError;

use super::ConnectionSpec;

pub async fn connect(_spec: &ConnectionSpec) -> Result<std::convert::Infallible, AppError> {
    Err(AppError::configuration(
        "Oracle adapter is not available in this build: no Oracle driver is part of the dependency stack",
    ))
}
