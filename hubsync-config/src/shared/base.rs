use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field was left empty.
    #[error("`{0}` cannot be empty")]
    EmptyField(&'static str),
    /// The repository id does not follow the `namespace/name` form.
    #[error("invalid repository id `{0}`: expected `namespace/name`")]
    InvalidRepoId(String),
    /// The hub endpoint is not an absolute http(s) URL.
    #[error("invalid hub endpoint `{0}`: expected an http(s) URL")]
    InvalidEndpoint(String),
    /// The snapshot path does not point at a Parquet file.
    #[error("invalid snapshot path `{0}`: expected a relative `.parquet` path")]
    InvalidSnapshotPath(String),
    /// A numeric field is outside of its accepted range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue {
        field: &'static str,
        constraint: &'static str,
    },
}
