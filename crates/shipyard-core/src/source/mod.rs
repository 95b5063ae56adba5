//! Repository fetching.
//!
//! This module materializes a remote repository's working tree into a
//! workspace:
//! - Parsing source locations (`github:` shorthand, `/tree/<ref>/<path>` URLs)
//! - Cloning with the `git` executable through the stage runner
//! - Checking out a requested reference

mod fetcher;
mod spec;

pub use fetcher::{FetchResult, GitFetcher, RepositoryFetcher};
pub use spec::SourceSpec;
