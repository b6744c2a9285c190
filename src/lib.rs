//! Docs IPFS Archiver library.
//!
//! A three-stage batch pipeline: extract links from changed documentation,
//! archive the linked content to IPFS, and annotate the documents with links
//! to the archived copies. Stages hand off through JSON record files.

pub mod archiver;
pub mod config;
pub mod constants;
pub mod extract;
pub mod git;
pub mod ipfs;
pub mod records;
pub mod rewrite;
