//! roster - maintain the people and student artifacts of the site
//!
//! Every mutating command goes through validate, backup and a conditional
//! write. Exit status is 1 when a change is rejected and 2 when the store
//! moved on or could not be reached; both leave the artifact untouched.

mod cli;
mod render;

use anyhow::{Context, Result};
use cli::{Invocation, Request};
use render::Listing;
use roster_core::{Response, RosterConfig, RosterError};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn print<K: Listing>(response: &Response<K>, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(&render::json(response))?);
    } else {
        println!("{}", render::text(response));
    }
    Ok(())
}

async fn run(invocation: Invocation) -> Result<()> {
    let config = RosterConfig::load(&invocation.config)
        .with_context(|| format!("loading {}", invocation.config.display()))?;

    match invocation.request {
        Request::Config => println!("{}", config.describe()),
        Request::People(operation) => {
            let people = config.people()?;
            tracing::debug!(store = %people.describe(), "people");
            let response = people.execute(operation).await;
            people.settle().await;
            print(&response?, invocation.json)?;
        }
        Request::Students(operation) => {
            let students = config.students()?;
            tracing::debug!(store = %students.describe(), "students");
            let response = students.execute(operation).await;
            students.settle().await;
            print(&response?, invocation.json)?;
        }
        Request::Snapshots { label } => {
            let people = config.people()?;
            let listed = people.snapshots().list(&label).await?;
            println!("{}", render::snapshots(&label, &listed, invocation.json));
        }
    }
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<RosterError>() {
        Some(e) if e.is_retryable() => ExitCode::from(2),
        _ => ExitCode::from(1),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli::command().get_matches();
    let invocation = match cli::parse(&matches) {
        Ok(invocation) => invocation,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::from(1);
        }
    };

    match run(invocation).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(report) = err.downcast_ref::<RosterError>().and_then(RosterError::report) {
                eprintln!("rejected, nothing was written:");
                for finding in report.fatal() {
                    eprintln!("  - {finding}");
                }
            } else {
                eprintln!("error: {err:#}");
                if err.downcast_ref::<RosterError>().is_some_and(RosterError::is_conflict) {
                    eprintln!("hint: run the command again to apply it to the current state");
                }
            }
            exit_code(&err)
        }
    }
}
