// psql-runner - scheduled SQL reports from object storage
//
// A trigger names a schedule slot (daily, weekly, monthly). Every script
// under scripts/<slot>/ in the bucket is run against PostgreSQL and its
// output is uploaded as CSV under results/<slot>/.
//
// Entry points:
// - CLI: `psql-runner run --frequency daily`
// - AWS Lambda: the `bootstrap` binary in crates/psql-runner-lambda

pub use psql_runner_config as config;

pub mod catalog;
pub mod db;
pub mod error;
pub mod event;
pub mod fetch;
pub mod init;
pub mod publish;
pub mod runner;
pub mod secrets;
pub mod storage;

pub use error::{ErrorCode, RunError, ScriptError};
pub use event::{Frequency, InvocationEvent};
pub use init::{build_runner, init_tracing};
pub use runner::{RunReport, RunState, Runner, RunnerSettings};
