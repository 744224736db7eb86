use std::path::Path;
use std::process::ExitCode;

use access_key_service::{AccessKeyStatus, KeyUpload, ServiceResult, UserAccessKeyService};
use anyhow::{bail, Context};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

const USAGE: &str =
    "usage: access-key-service <check|generate|regenerate|upload <path>|reupload <path>>";

enum Command {
    Check,
    Generate,
    Regenerate,
    Upload(String),
    Reupload(String),
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let command = match args {
        [cmd] if cmd == "check" => Command::Check,
        [cmd] if cmd == "generate" => Command::Generate,
        [cmd] if cmd == "regenerate" => Command::Regenerate,
        [cmd, path] if cmd == "upload" => Command::Upload(path.clone()),
        [cmd, path] if cmd == "reupload" => Command::Reupload(path.clone()),
        _ => bail!(USAGE),
    };
    Ok(command)
}

fn read_key(path: &str) -> anyhow::Result<KeyUpload> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key file {path}"))?;
    let file_name = Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    Ok(KeyUpload::new(file_name, content))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn report<T: Serialize>(outcome: ServiceResult<T>) -> anyhow::Result<ExitCode> {
    match outcome {
        Ok(response) => {
            print_json(&response)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            eprintln!("{}", serde_json::to_string(&error)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    dotenvy::dotenv().ok();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;
    let service =
        UserAccessKeyService::from_env().context("invalid access key api configuration")?;

    match command {
        Command::Check => {
            service.run_initial_access_key_check().await;
            let status = service.latest_status();
            print_json(&status)?;
            if matches!(status, AccessKeyStatus::Failed(_)) {
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Generate => report(service.generate_access_key().await),
        Command::Regenerate => report(service.regenerate_access_key().await),
        Command::Upload(path) => {
            let outcome = service.upload_access_key(read_key(&path)?).await;
            if outcome.is_ok() {
                service.notify_upload_complete();
            }
            report(outcome)
        }
        Command::Reupload(path) => {
            let outcome = service.reupload_access_key(read_key(&path)?).await;
            if outcome.is_ok() {
                service.notify_upload_complete();
            }
            report(outcome)
        }
    }
}
