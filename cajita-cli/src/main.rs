//! Cajita CLI
//!
//! Command-line client for the La Cajita content API.
//!
//! # Usage
//!
//! ```bash
//! # Authenticate with the configured strategies
//! cajita login
//!
//! # Fetch a collection
//! cajita get /segments
//!
//! # Create a segment
//! cajita request POST /segments --json '{"name": "News", "active": 1}'
//!
//! # Probe the backend
//! cajita check
//! ```

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use cajita_core::{ApiClient, ApiRequest, ContentApi, RequestOutcome, ToastQueue};
use clap::{Parser, Subcommand};
use reqwest::Method;
use reqwest::header::{HeaderName, HeaderValue};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "cajita")]
#[command(about = "Authenticated client for the La Cajita content API")]
#[command(version)]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate and print the token status
    Login,

    /// Print the token status
    Status,

    /// Forget the current token
    Logout,

    /// Execute an authenticated request and print the outcome as JSON
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,

        /// Endpoint path relative to the base URL (e.g., /segments)
        endpoint: String,

        /// JSON body
        #[arg(long, conflicts_with = "form")]
        json: Option<String>,

        /// Form field as key=value (repeatable)
        #[arg(long, value_name = "KEY=VALUE")]
        form: Vec<String>,

        /// Extra header as name:value (repeatable)
        #[arg(short = 'H', long, value_name = "NAME:VALUE")]
        header: Vec<String>,
    },

    /// Shorthand for `request GET <ENDPOINT>`
    Get {
        endpoint: String,
    },

    /// Query the unauthenticated health endpoint
    Health,

    /// Probe the health and core collection endpoints
    Check,
}

#[derive(Serialize)]
struct StatusReport<'a> {
    base_url: &'a str,
    strategies: Vec<&'a str>,
    #[serde(flatten)]
    status: cajita_core::TokenStatus,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = config::load_config(cli.config.as_deref())?;
    let toasts = Arc::new(ToastQueue::new());
    let client = ApiClient::from_config(&config, toasts.clone())
        .context("Failed to create API client")?;

    if config.persist_token {
        match client.restore_session().await {
            Ok(true) => tracing::debug!("Restored persisted session"),
            Ok(false) => {}
            Err(e) => tracing::warn!("Could not restore persisted session: {}", e),
        }
    }

    let ok = match cli.command {
        Commands::Login => login(&client).await?,
        Commands::Status => {
            print_status(&client)?;
            true
        }
        Commands::Logout => {
            client.logout().await;
            println!("Logged out");
            true
        }
        Commands::Request {
            method,
            endpoint,
            json,
            form,
            header,
        } => {
            let request = build_request(&method, &endpoint, json.as_deref(), &form, &header)?;
            print_outcome(&client.execute(request).await)?
        }
        Commands::Get { endpoint } => print_outcome(&client.get(&endpoint).await)?,
        Commands::Health => {
            print_outcome(&client.execute_public(ApiRequest::get("/health")).await)?
        }
        Commands::Check => {
            let report = ContentApi::new(client.clone()).check_connection().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            report.is_reachable()
        }
    };

    for notification in toasts.drain() {
        eprintln!("{}", notification.message);
    }

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn login(client: &ApiClient) -> Result<bool> {
    match client.login().await {
        Ok(_) => {
            print_status(client)?;
            Ok(true)
        }
        Err(e) => {
            eprintln!("Login failed: {}", e);
            Ok(false)
        }
    }
}

fn print_status(client: &ApiClient) -> Result<()> {
    let report = StatusReport {
        base_url: client.base_url(),
        strategies: client.authenticator().strategy_names(),
        status: client.token_status(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_outcome(outcome: &RequestOutcome) -> Result<bool> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(!outcome.is_failure())
}

fn build_request(
    method: &str,
    endpoint: &str,
    json: Option<&str>,
    form: &[String],
    headers: &[String],
) -> Result<ApiRequest> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", method))?;
    let mut request = ApiRequest::new(method, endpoint);

    if let Some(body) = json {
        let value = serde_json::from_str(body).context("--json is not valid JSON")?;
        request = request.with_json(value);
    } else if !form.is_empty() {
        let pairs = form
            .iter()
            .map(|pair| split_pair(pair, '='))
            .collect::<Result<Vec<_>>>()?;
        request = request.with_form(pairs);
    }

    for raw in headers {
        let (name, value) = split_pair(raw, ':')?;
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("Invalid header name: {}", name))?;
        let value = HeaderValue::from_str(value.trim())
            .with_context(|| format!("Invalid header value for {}", name))?;
        request = request.with_header(name, value);
    }

    Ok(request)
}

fn split_pair(raw: &str, separator: char) -> Result<(String, String)> {
    match raw.split_once(separator) {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => bail!("Expected KEY{}VALUE, got {:?}", separator, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cajita_core::RequestBody;

    #[test]
    fn test_build_request_with_json_and_headers() {
        let request = build_request(
            "post",
            "/segments",
            Some(r#"{"name":"News"}"#),
            &[],
            &["X-Trace: abc".to_string()],
        )
        .unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(
            request.body,
            Some(RequestBody::Json(serde_json::json!({"name": "News"})))
        );
        assert_eq!(request.headers.get("x-trace").unwrap(), "abc");
    }

    #[test]
    fn test_build_request_with_form() {
        let request = build_request(
            "PUT",
            "/home-carousel/1",
            None,
            &["active=0".to_string(), "link=a=b".to_string()],
            &[],
        )
        .unwrap();

        assert_eq!(
            request.body,
            Some(RequestBody::Form(vec![
                ("active".into(), "0".into()),
                ("link".into(), "a=b".into()),
            ]))
        );
    }

    #[test]
    fn test_build_request_rejects_bad_input() {
        assert!(build_request("GET", "/x", Some("{nope"), &[], &[]).is_err());
        assert!(build_request("GET", "/x", None, &["novalue".into()], &[]).is_err());
        assert!(build_request("GET", "/x", None, &[], &["bad header".into()]).is_err());
    }
}
