//! HTTP transport for the VDR chunked document-upload endpoint.
//!
//! [`VdrClient`] implements [`vdrlink_uploader::ChunkTransport`] on top of
//! `reqwest`, sending each chunk as one authenticated
//! `application/octet-stream` POST with the upload metadata in headers.

pub mod client;

pub use client::{ClientConfig, Error, VdrClient};
