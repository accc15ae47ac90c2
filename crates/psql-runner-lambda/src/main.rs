// AWS Lambda binary entry point
//
// Build with: cargo build -p psql-runner-lambda --release
//
// The lambda_runtime crate drives the tokio runtime, so #[tokio::main] only
// hosts it

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    psql_runner_lambda::run().await
}
