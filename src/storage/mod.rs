// Storage layer (S3-compatible)

pub mod s3_client;

pub use s3_client::*;
