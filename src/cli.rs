//! Command line options for the gitlab2github tool
use std::path::PathBuf;

use clap::Parser;
use log::info;

use crate::{
    config::MigrationConfig,
    errors::MigrateError,
    github::platform::GithubPlatform,
    gitlab::platform::GitlabPlatform,
    migrate::Migrator,
    mirror::GitMirror,
    model::RepositoryDescriptor,
    platform::{DestinationPlatform, SourcePlatform},
    report::RunLog,
};

/// gitlab2github - Migrate a GitLab group to a GitHub organization
#[derive(Parser, Default, Clone, Debug)]
#[command(version, about)]
pub struct MigrateCli {
    /// Migrate only this repository (name or path)
    #[arg(short, long)]
    pub repo: Option<String>,

    /// List the source repositories and exit
    #[arg(short, long)]
    pub list: bool,

    /// Create every destination repository as private
    #[arg(long)]
    pub force_private: bool,

    /// Show what would be migrated without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Custom configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Show the default config path
    #[arg(long)]
    pub show_config_path: bool,

    /// Verbose mode (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Run the migration with the provided command line options
/// # Errors
/// Error on configuration, authentication or unknown repository, before anything is migrated
pub async fn migrate_main(args: MigrateCli) -> Result<(), MigrateError> {
    if args.show_config_path {
        match MigrationConfig::get_config_path() {
            Some(path) => println!("{}", path.display()),
            None => return Err("Unable to find the home directory".into()),
        }
        return Ok(());
    }
    dotenv::dotenv().ok();
    let config = MigrationConfig::load(&args)?;
    if let Some(path) = &config.config_path {
        info!("Using configuration file {}", path.display());
    }

    let source = GitlabPlatform::new(&config.gitlab, config.retry);
    let destination = GithubPlatform::new(&config.github, config.retry);
    source.check_access().await?;
    info!("Checked access to {}", source.get_remote_url());

    let repos = select_repos(source.get_all_repos().await?, config.target_repo.as_deref())?;
    if args.list {
        for repo in &repos {
            println!("{} ({}) {}", repo.show_full_name(), repo.visibility, repo.web_url);
        }
        return Ok(());
    }
    destination.check_access().await?;
    info!("Checked access to {}", destination.get_remote_url());

    if args.dry_run {
        for repo in &repos {
            let visibility = if config.is_private(repo.visibility) {
                "private"
            } else {
                "public"
            };
            println!(
                "Would migrate {} to {}/{} ({visibility})",
                repo.show_full_name(),
                config.github.org,
                repo.name
            );
        }
        println!("{} repositories, nothing was changed", repos.len());
        return Ok(());
    }

    let run_log = RunLog::open(&config.log_file)?;
    let mirror = GitMirror::new(source.git_credentials(), destination.git_credentials());
    let migrator = Migrator::new(&config, &source, &destination, &mirror, &run_log);
    let report = migrator.run(&repos).await;
    println!("{report}");
    Ok(())
}

/// Keep the requested repository, or every repository when none is requested
fn select_repos(
    repos: Vec<RepositoryDescriptor>,
    target: Option<&str>,
) -> Result<Vec<RepositoryDescriptor>, MigrateError> {
    let Some(target) = target else {
        return Ok(repos);
    };
    let selected: Vec<RepositoryDescriptor> = repos
        .into_iter()
        .filter(|repo| repo.name == target || repo.path == target)
        .collect();
    if selected.is_empty() {
        return Err(format!("Repository '{target}' not found in the source group").into());
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(name: &str, path: &str) -> RepositoryDescriptor {
        RepositoryDescriptor {
            name: name.to_string(),
            path: path.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn parses_flags() {
        let args = MigrateCli::parse_from([
            "gitlab2github",
            "--repo",
            "api",
            "--force-private",
            "--dry-run",
            "-vv",
        ]);
        assert_eq!(args.repo.as_deref(), Some("api"));
        assert!(args.force_private);
        assert!(args.dry_run);
        assert!(!args.list);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn selects_by_name_or_path() {
        let repos = vec![repo("API", "api"), repo("web", "web")];
        assert_eq!(select_repos(repos.clone(), None).unwrap().len(), 2);
        let selected = select_repos(repos.clone(), Some("api")).unwrap();
        assert_eq!(selected, vec![repo("API", "api")]);
        let selected = select_repos(repos.clone(), Some("web")).unwrap();
        assert_eq!(selected[0].name, "web");
    }

    #[test]
    fn unknown_repository_is_fatal() {
        let error = select_repos(vec![repo("web", "web")], Some("api")).unwrap_err();
        assert!(error.is_fatal());
        assert!(error.to_string().contains("'api'"));
    }
}
