// AWS Lambda runtime adapter
//
// A scheduled rule invokes the function with {"frequency": "<slot>"}. The
// response body is the run's status code: 0 on success, 1 when a
// precondition failed.
//
// Clients are built once per cold start and shared by every invocation.

use lambda_runtime::{service_fn, Error, LambdaEvent};
use psql_runner::config::RuntimeConfig;
use psql_runner::{InvocationEvent, Runner};
use serde_json::Value;
use std::sync::Arc;

/// Run one invocation payload and return its status code.
pub async fn handle_payload(payload: Value, runner: &Runner) -> i32 {
    let event = InvocationEvent::from_value(payload);
    runner.run(&event).await.status_code()
}

async fn handle_request(event: LambdaEvent<Value>, runner: Arc<Runner>) -> Result<i32, Error> {
    let (payload, context) = event.into_parts();
    tracing::info!(request_id = %context.request_id, "Invocation received");
    Ok(handle_payload(payload, &runner).await)
}

/// Lambda runtime entry point
pub async fn run() -> Result<(), Error> {
    let config = RuntimeConfig::load()
        .map_err(|e| Error::from(format!("Failed to load configuration: {:#}", e)))?;

    psql_runner::init_tracing(&config);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        build_timestamp = env!("BUILD_TIMESTAMP"),
        "psql-runner Lambda starting"
    );

    let runner = psql_runner::build_runner(&config)
        .await
        .map_err(|e| Error::from(format!("Failed to initialize runner: {:#}", e)))?;
    let runner = Arc::new(runner);

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let runner = runner.clone();
        async move { handle_request(event, runner).await }
    }))
    .await
}
