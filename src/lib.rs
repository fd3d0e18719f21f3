//! # gitlab2github
//!
//! Migrate the repositories of a GitLab group to a GitHub organization:
//! git content, labels, milestones, issues and merge requests.
//!
//! ## Usage
//!
//! ```txt
//! Usage: gitlab2github [OPTIONS]
//!
//! Options:
//!   -r, --repo <REPO>        Migrate only this repository (name or path)
//!   -l, --list               List the source repositories and exit
//!       --force-private      Create every destination repository as private
//!       --dry-run            Show what would be migrated without changing anything
//!   -c, --config <CONFIG>    Custom configuration file path
//!       --show-config-path   Show the default config path
//!   -v, --verbose...         Verbose mode (-v, -vv)
//!   -h, --help               Print help
//! ```

#![warn(clippy::all, rust_2018_idioms)]
#![deny(
    missing_docs,
    clippy::all,
    clippy::missing_docs_in_private_items,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![warn(clippy::multiple_crate_versions)]

pub(crate) mod cli;
pub(crate) mod config;
pub(crate) mod errors;
pub(crate) mod mapper;
pub(crate) mod migrate;
pub(crate) mod mirror;
pub(crate) mod model;
pub(crate) mod platform;
pub(crate) mod report;
pub(crate) mod request;

mod github;
mod gitlab;

pub use cli::{migrate_main, MigrateCli};
pub use config::MigrationConfig;
pub use errors::{MigrateError, MigrateErrorKind};
pub use report::{MigrationResult, RunReport};
