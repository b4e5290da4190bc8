//! AWS client modules for the runner
//!
//! Infrastructure itself is provisioned through terraform; the SDK is only
//! used to publish results to S3.

pub mod context;
pub mod s3;

pub use context::AwsContext;
pub use s3::{ObjectStore, S3Client};
