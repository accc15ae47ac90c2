//! Orchestrator.
//!
//! Drives one invocation: resolve the slot, list its scripts, obtain the
//! password, connect, then fetch, query and publish each script in catalog
//! order. Precondition failures end the run with status 1; per-script
//! failures are recorded in the [`RunReport`] and never change the status.

use chrono::{DateTime, Utc};
use psql_runner_config::{DatabaseConfig, RuntimeConfig};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::catalog;
use crate::db::{self, Connector, Session};
use crate::error::{DbError, RunError, ScriptError};
use crate::event::{Frequency, InvocationEvent};
use crate::fetch;
use crate::publish::{self, PublishedResult};
use crate::secrets::SecretResolver;
use crate::storage::{Layout, ObjectStore};

mod report;
mod state;

pub use report::{RunReport, ScriptOutcome};
pub use state::{InvalidTransition, RunState, StateMachine};

/// Source of the run timestamp
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Non-client settings the orchestrator needs
#[derive(Debug, Clone, Default)]
pub struct RunnerSettings {
    pub layout: Layout,
    pub database: DatabaseConfig,
    /// Dump the event and the catalog at debug level
    pub debug: bool,
}

impl RunnerSettings {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            layout: Layout::from_config(&config.storage),
            database: config.database.clone(),
            debug: config.debug,
        }
    }
}

/// Clients are built once per process and reused across invocations.
pub struct Runner {
    /// `None` when no bucket is configured
    store: Option<Arc<dyn ObjectStore>>,
    secrets: Arc<dyn SecretResolver>,
    connector: Arc<dyn Connector>,
    settings: RunnerSettings,
    clock: Clock,
}

impl Runner {
    pub fn new(
        store: Option<Arc<dyn ObjectStore>>,
        secrets: Arc<dyn SecretResolver>,
        connector: Arc<dyn Connector>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            store,
            secrets,
            connector,
            settings,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock, e.g. with a fixed instant in tests.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Handle one trigger event.
    pub async fn run(&self, event: &InvocationEvent) -> RunReport {
        let mut machine = StateMachine::new();
        let mut frequency = None;
        let mut scripts = Vec::new();

        let error = self
            .execute(event, &mut machine, &mut frequency, &mut scripts)
            .await
            .err();

        if let Some(err) = &error {
            advance(&mut machine, RunState::Failed);
            tracing::error!(
                error_code = %err.code(),
                state = %machine.current(),
                "Run failed: {}",
                err
            );
        }

        let report = RunReport {
            frequency,
            final_state: machine.current(),
            transitions: machine.history().to_vec(),
            scripts,
            error,
        };

        tracing::info!(
            frequency = report.frequency.map(|f| f.as_str()).unwrap_or("none"),
            state = %report.final_state,
            attempted = report.scripts.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            status = report.status_code(),
            "Run complete"
        );

        report
    }

    async fn execute(
        &self,
        event: &InvocationEvent,
        machine: &mut StateMachine,
        resolved: &mut Option<Frequency>,
        outcomes: &mut Vec<ScriptOutcome>,
    ) -> Result<(), RunError> {
        if self.settings.debug {
            match serde_json::to_string_pretty(event) {
                Ok(dump) => tracing::debug!("Received event:\n{}", dump),
                Err(err) => tracing::debug!("Received event (unserializable: {})", err),
            }
        }

        let store = self.store.as_deref().ok_or(RunError::MissingBucket)?;

        let frequency = event.frequency().map_err(RunError::InvalidFrequency)?;
        *resolved = Some(frequency);
        advance(machine, RunState::FrequencyResolved);

        tracing::info!(
            "Running all scripts scheduled for the {} time slot",
            frequency
        );

        let scripts = catalog::list_scripts(store, &self.settings.layout, frequency)
            .await
            .map_err(RunError::Catalog)?;

        if self.settings.debug {
            tracing::debug!("Scripts found: {:?}", scripts);
        }

        if scripts.is_empty() {
            tracing::info!("No scripts scheduled for the {} time slot", frequency);
            advance(machine, RunState::NothingScheduled);
            return Ok(());
        }

        let password = self.secrets.db_password().await.map_err(|err| {
            tracing::error!("ERROR: No DB password, unable to continue");
            RunError::Secret(err)
        })?;
        advance(machine, RunState::PasswordObtained);

        let mut session =
            db::connect(self.connector.as_ref(), &self.settings.database, password)
                .await
                .map_err(RunError::Connect)?;
        advance(machine, RunState::Connected);

        // One timestamp for every result of this run
        let generated_at = (self.clock)();
        advance(machine, RunState::PerScriptLoop);

        for script in scripts {
            tracing::info!("Running script {}", script);
            let result = self
                .run_script(store, session.as_mut(), frequency, generated_at, &script)
                .await;

            match &result {
                Ok(published) => tracing::info!(
                    script = %script,
                    key = %published.key,
                    bytes = published.bytes,
                    "Script complete"
                ),
                Err(err) => tracing::error!(
                    script = %script,
                    stage = %err.stage(),
                    error_code = %err.code(),
                    "Script failed: {}",
                    err
                ),
            }

            outcomes.push(ScriptOutcome { script, result });
        }

        if let Err(err) = session.close().await {
            tracing::warn!("{}", err);
        }
        advance(machine, RunState::Closed);

        Ok(())
    }

    /// Fetch, query and publish one script. The scratch file is removed when
    /// this returns, whatever the outcome.
    async fn run_script(
        &self,
        store: &dyn ObjectStore,
        session: &mut dyn Session,
        frequency: Frequency,
        generated_at: DateTime<Utc>,
        script: &str,
    ) -> Result<PublishedResult, ScriptError> {
        let query = fetch::read_script(store, script)
            .await
            .map_err(ScriptError::Fetch)?;

        let scratch = NamedTempFile::new().map_err(ScriptError::Scratch)?;
        let file = scratch.as_file().try_clone().map_err(ScriptError::Scratch)?;
        let mut sink = BufWriter::new(tokio::fs::File::from_std(file));

        db::run_query_to_csv(session, &query, &mut sink)
            .await
            .map_err(ScriptError::Query)?;
        // The sink is ours; everything buffered must be on disk before upload
        sink.flush()
            .await
            .map_err(|source| ScriptError::Query(DbError::Sink { source }))?;
        drop(sink);

        publish::publish(
            store,
            &self.settings.layout,
            frequency,
            generated_at,
            script,
            scratch.path(),
        )
        .await
        .map_err(ScriptError::Publish)
    }
}

fn advance(machine: &mut StateMachine, next: RunState) {
    if let Err(err) = machine.advance(next) {
        debug_assert!(false, "{}", err);
        tracing::error!("{}", err);
    }
}
