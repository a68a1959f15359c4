//! Read-only access to GitHub repositories

pub mod client;
pub mod error;
pub mod locator;
pub mod mock;
pub mod types;

pub use client::{GitHubClient, SourceHost, DEFAULT_API_URL};
pub use error::FetchError;
pub use locator::RepoLocator;
pub use mock::MockSourceHost;
pub use types::{EntryKind, RecursiveTree, RepoMetadata, RepositorySnapshot, TreeEntry};
