//! Core application

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::{AppConfig, TablesConfig};
use crate::core::constants::{APP_NAME, APP_TARGET, ENV_LOG};
use crate::domain::usage::{
    BillingExport, KnowledgeBase, NormalizedUsageRecord, RawUsageRow, UsageError, UsageNormalizer,
};
use crate::utils::file::expand_path;

/// Outcome of one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub rows: usize,
    pub normalized: usize,
    pub failed: usize,
}

pub struct CoreApp {
    pub config: AppConfig,
    pub normalizer: UsageNormalizer,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();

        Self::init_logging();

        tracing::debug!(app = APP_NAME, "Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let app = Self::init(&cli_config)?;

        match command {
            Commands::Normalize { input, output } => {
                let input = expand_path(&input.to_string_lossy());
                let output = output.map(|p| expand_path(&p.to_string_lossy()));
                let summary = app.normalize_file(&input, output.as_deref()).await?;
                if summary.failed > 0 {
                    tracing::warn!(
                        failed = summary.failed,
                        rows = summary.rows,
                        "Some rows could not be normalized"
                    );
                }
                Ok(())
            }
            Commands::Tables => app.print_tables(),
        }
    }

    fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        Self::from_config(config)
    }

    /// Build the application from an already-loaded configuration
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let tables = Arc::new(Self::load_tables(&config.tables)?);
        tracing::debug!(version = tables.version(), "Knowledge base loaded");

        let normalizer = UsageNormalizer::new(tables, config.estimation.reference_cpu_utilization)
            .with_accounts(Arc::new(config.accounts.clone()));

        Ok(Self { config, normalizer })
    }

    fn load_tables(config: &TablesConfig) -> Result<KnowledgeBase> {
        match &config.path {
            Some(path) => KnowledgeBase::from_file(path)
                .with_context(|| format!("Failed to load tables: {}", path.display())),
            None => KnowledgeBase::embedded().context("Failed to load embedded tables"),
        }
    }

    /// Normalize a billing export and write one JSON record per line
    ///
    /// Rows that fail are logged with their index and counted; they never stop
    /// the batch. Output goes to `output` or stdout.
    pub async fn normalize_file(&self, input: &Path, output: Option<&Path>) -> Result<BatchSummary> {
        let content = tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read billing export: {}", input.display()))?;
        let export: BillingExport = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse billing export: {}", input.display()))?;

        tracing::debug!(
            path = %input.display(),
            columns = export.columns.len(),
            rows = export.rows.len(),
            "Billing export loaded"
        );

        let results = self.normalize_rows(export.into_rows()).await?;

        let summary = match output {
            Some(path) => {
                let file = tokio::fs::File::create(path)
                    .await
                    .with_context(|| format!("Failed to create output file: {}", path.display()))?;
                Self::write_records(&results, BufWriter::new(file)).await?
            }
            None => Self::write_records(&results, BufWriter::new(tokio::io::stdout())).await?,
        };

        tracing::info!(
            rows = summary.rows,
            normalized = summary.normalized,
            failed = summary.failed,
            "Normalization complete"
        );

        Ok(summary)
    }

    /// Write each normalized record as one JSON line, logging failed rows
    async fn write_records<W>(
        results: &[Result<NormalizedUsageRecord, UsageError>],
        mut writer: W,
    ) -> Result<BatchSummary>
    where
        W: AsyncWrite + Unpin,
    {
        let mut summary = BatchSummary {
            rows: results.len(),
            ..Default::default()
        };

        for (index, result) in results.iter().enumerate() {
            match result {
                Ok(record) => {
                    let json = serde_json::to_string(record).context("Failed to serialize record")?;
                    writer.write_all(json.as_bytes()).await?;
                    writer.write_all(b"\n").await?;
                    summary.normalized += 1;
                }
                Err(e) => {
                    tracing::warn!(row = index, error = %e, "Skipping row");
                    summary.failed += 1;
                }
            }
        }

        writer.flush().await?;
        Ok(summary)
    }

    /// Normalize rows on the blocking pool, one chunk per task
    ///
    /// Results come back in input order.
    pub async fn normalize_rows(
        &self,
        rows: Vec<Result<RawUsageRow, UsageError>>,
    ) -> Result<Vec<Result<NormalizedUsageRecord, UsageError>>> {
        let total = rows.len();
        let chunk_size = self.config.batch.chunk_size.max(1);

        let mut handles = Vec::with_capacity(total.div_ceil(chunk_size));
        let mut rows = rows.into_iter();
        loop {
            let chunk: Vec<_> = rows.by_ref().take(chunk_size).collect();
            if chunk.is_empty() {
                break;
            }
            let normalizer = self.normalizer.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                chunk
                    .into_iter()
                    .map(|row| row.and_then(|row| normalizer.normalize(&row)))
                    .collect::<Vec<_>>()
            }));
        }

        tracing::debug!(rows = total, chunks = handles.len(), chunk_size, "Normalizing rows");

        let mut results = Vec::with_capacity(total);
        for handle in handles {
            results.extend(handle.await.context("Normalization task failed")?);
        }
        Ok(results)
    }

    /// Print the knowledge-base version and table sizes as JSON
    fn print_tables(&self) -> Result<()> {
        let summary = self.normalizer.tables().summary();
        println!("{}", serde_json::to_string_pretty(&summary)?);
        Ok(())
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_TARGET);
        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .with_writer(std::io::stderr)
            .compact()
            .with_env_filter(filter)
            .init();
    }
}
