use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use tasksync_core::{Config, ScoredTask, SharedClock, SystemClock};
use tasksync_scoring::{OllamaScoringProvider, ScoringEngine};
use tasksync_store::{NotionStore, RemoteTaskStore};
use tasksync_sync::{
    ConflictResolution, IdMap, JsonFileSource, LocalTaskSource, LoggingListener,
    MigrationOptions, MigrationService, ReconciliationEngine, SyncConfig, SyncOptions,
    SyncScheduler,
};

use crate::cli::{SyncArgs, TargetArgs};

/// Shared wiring for every subcommand.
pub struct App {
    config: Config,
    clock: SharedClock,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
        }
    }

    fn scoring(&self) -> Result<ScoringEngine> {
        let engine = ScoringEngine::new(self.clock.clone());
        let settings = &self.config.scoring;
        if !settings.uses_provider()? {
            return Ok(engine);
        }
        let provider = OllamaScoringProvider::new(
            settings.url.clone(),
            settings.model.clone(),
            Duration::from_secs(settings.timeout_secs),
        )
        .context("failed to build scoring provider")?;
        info!(provider = %settings.provider, model = %settings.model, "scoring provider enabled");
        Ok(engine.with_provider(Arc::new(provider)))
    }

    fn store(&self) -> Result<Arc<dyn RemoteTaskStore>> {
        let store = NotionStore::from_config(&self.config.notion)
            .context("failed to build Notion client")?;
        Ok(Arc::new(store))
    }

    fn database_id(&self, target: &TargetArgs) -> Result<String> {
        match target
            .database_id
            .clone()
            .or_else(|| self.config.notion.tasks_database_id.clone())
        {
            Some(id) => Ok(id),
            None => bail!("no database id: pass --database-id or set NOTION_TASKS_DATABASE_ID"),
        }
    }

    pub async fn score(&self, file: &Path, json: bool) -> Result<()> {
        let source = JsonFileSource::new(file, self.clock.clone()).read_only();
        let tasks = source
            .load()
            .await
            .with_context(|| format!("failed to load tasks from {}", file.display()))?;
        let scored = self.scoring()?.evaluate_all(&tasks).await;

        if json {
            println!("{}", serde_json::to_string_pretty(&scored)?);
        } else {
            print_ranking(&scored);
        }
        Ok(())
    }

    pub async fn sync(&self, args: &SyncArgs) -> Result<()> {
        let config = SyncConfig::new(self.database_id(&args.target)?);
        let mut options = SyncOptions::from_settings(&self.config.sync)?;
        if let Some(minutes) = args.interval {
            options.sync_interval_minutes = minutes;
        }
        if let Some(policy) = &args.policy {
            options.conflict_resolution = policy.parse::<ConflictResolution>()?;
        }
        options.validate()?;

        let id_map = IdMap::load(&self.config.sync.id_map_path)?;
        let source = Arc::new(JsonFileSource::new(&args.tasks, self.clock.clone()));
        let engine = ReconciliationEngine::new(self.store()?, source, self.scoring()?, self.clock.clone())
            .with_id_map(id_map)
            .with_max_concurrency(self.config.sync.max_concurrency);
        let scheduler = SyncScheduler::new(engine);
        scheduler.subscribe(Arc::new(LoggingListener));

        if !args.watch {
            let result = scheduler.force_sync(&config, Some(options)).await?;
            println!("{}", result.report);
            if !result.success {
                bail!("sync finished with {} error(s)", result.errors.len());
            }
            return Ok(());
        }

        let response = scheduler.start_sync(config, options);
        if !response.success {
            bail!(response.message);
        }
        info!("{}", response.message);

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        info!("{}", scheduler.stop_sync().message);

        let status = scheduler.status();
        info!(
            successful = status.successful_syncs,
            failed = status.failed_syncs,
            "sync watch finished"
        );
        Ok(())
    }

    pub async fn migrate(&self, file: &Path, dry_run: bool, top: usize, target: &TargetArgs) -> Result<()> {
        let source = JsonFileSource::new(file, self.clock.clone());
        let drafts = source
            .load()
            .await
            .with_context(|| format!("failed to load tasks from {}", file.display()))?;
        let options = MigrationOptions::new(self.database_id(target)?)
            .dry_run(dry_run)
            .top_n(top);

        let service = MigrationService::new(self.store()?, self.scoring()?)
            .with_max_concurrency(self.config.sync.max_concurrency);
        let result = service.migrate_tasks(&drafts, &options).await?;
        println!("{}", result.report);
        if result.failed_migrations > 0 {
            warn!(failed = result.failed_migrations, "some tasks were not migrated");
        }
        Ok(())
    }

    pub async fn rescore(&self, target: &TargetArgs) -> Result<()> {
        let database_id = self.database_id(target)?;
        let service = MigrationService::new(self.store()?, self.scoring()?)
            .with_max_concurrency(self.config.sync.max_concurrency);
        let result = service.update_tasks_with_scores(&database_id).await?;
        println!("{}", result.report);
        if !result.errors.is_empty() {
            bail!("rescoring finished with {} error(s)", result.errors.len());
        }
        Ok(())
    }
}

fn print_ranking(scored: &[ScoredTask]) {
    println!(
        "{:>3}  {:>5}  {:<7}  {:>5} {:>5} {:>5} {:>5}  TITLE",
        "#", "SCORE", "PRIO", "URG", "IMP", "EFF", "DEP"
    );
    for (rank, entry) in scored.iter().enumerate() {
        println!(
            "{:>3}  {:>5.2}  {:<7}  {:>5.1} {:>5.1} {:>5.1} {:>5.1}  {}",
            rank + 1,
            entry.total(),
            entry.priority,
            entry.scores.urgency(),
            entry.scores.impact(),
            entry.scores.effort(),
            entry.scores.dependencies(),
            entry.task.title,
        );
    }
}
