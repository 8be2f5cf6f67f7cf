//! `postmirror <BACKEND>`: wipe the target repository's issues and recreate
//! one per local document.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use postmirror_core::{
    credential::TOKEN_ENV_VAR, settings, Credential, MarkdownDirectory, Scope, Settings,
};
use postmirror_engine::{Outcome, Reconciler, TaskAggregator};
use postmirror_remote::{Backend, RemoteDirectory};

use super::report;

/// Arguments for a mirroring run. Flags override `~/.postmirror/config.yaml`.
#[derive(Args, Debug)]
pub struct MirrorArgs {
    /// Remote store to mirror into (supported: github).
    #[arg(value_name = "BACKEND")]
    pub backend: Option<Backend>,

    /// Repository whose issues mirror the documents.
    #[arg(short = 'r', long = "repo")]
    pub repo: Option<String>,

    /// Access token.
    #[arg(short = 't', long, env = TOKEN_ENV_VAR, hide_env_values = true)]
    pub token: Option<String>,

    /// Repository owner (defaults to the token's account).
    #[arg(short = 'o', long)]
    pub owner: Option<String>,

    /// Directory holding the documents.
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Document file extension.
    #[arg(short = 'e', long = "ext", value_name = "EXT")]
    pub ext: Option<String>,

    /// Maximum concurrent remote operations per phase.
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    pub jobs: Option<usize>,

    /// List what would be deleted and created without changing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl MirrorArgs {
    pub fn run(self, backend: Backend) -> Result<()> {
        let settings = self.settings()?;
        let credential =
            Credential::new(self.token.clone()).context("cannot authenticate to the remote store")?;
        let remote = backend.open(&settings, credential);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        runtime.block_on(self.mirror(backend, settings, remote))
    }

    /// Settings file, then flag overrides, then validation.
    fn settings(&self) -> Result<Settings> {
        let mut settings = settings::load().context("failed to load settings")?;
        if let Some(repo) = &self.repo {
            settings.repository = repo.clone();
        }
        if let Some(owner) = &self.owner {
            settings.owner = Some(owner.clone());
        }
        if let Some(dir) = &self.dir {
            settings.documents_dir = dir.clone();
        }
        if let Some(ext) = &self.ext {
            settings.extension = ext.clone();
        }
        if let Some(jobs) = self.jobs {
            settings.max_in_flight = jobs;
        }
        settings.validate().context("invalid options")?;
        Ok(settings)
    }

    async fn mirror(
        &self,
        backend: Backend,
        settings: Settings,
        remote: Arc<dyn RemoteDirectory>,
    ) -> Result<()> {
        let owner = match settings.owner.clone() {
            Some(owner) => owner,
            None => {
                let remote = Arc::clone(&remote);
                tokio::task::spawn_blocking(move || remote.default_owner())
                    .await
                    .context("owner lookup did not complete")?
                    .context("could not determine repository owner; pass --owner")?
            }
        };
        let scope = Scope::new(owner, settings.repository.clone());
        tracing::info!(
            backend = %backend,
            scope = %scope,
            dir = %settings.documents_dir.display(),
            jobs = settings.max_in_flight,
            "mirroring"
        );

        let source =
            MarkdownDirectory::new(settings.documents_dir.clone(), settings.extension.clone())
                .strip_front_matter(settings.strip_front_matter);
        let jobs = NonZeroUsize::new(settings.max_in_flight).context("--jobs must be at least 1")?;
        let reconciler = Reconciler::new(remote, Arc::new(source), TaskAggregator::new(jobs));

        if self.dry_run {
            let job = reconciler
                .plan(&scope)
                .await
                .with_context(|| format!("dry run failed for {scope}"))?;
            return report::print_plan(&job, self.json);
        }

        match reconciler.run(&scope).await {
            Outcome::Completed(summary) => report::print_summary(&summary, self.json),
            Outcome::Failed(err) => {
                report::print_failure(&err, self.json)?;
                bail!("mirror to {scope} failed while {}", err.phase);
            }
        }
    }
}
