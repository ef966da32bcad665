//! Shared utilities for data ingestion

pub mod decompression;

pub use decompression::extract_zip_members;
