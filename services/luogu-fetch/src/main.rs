//! Luogu problem list fetcher
//!
//! Loads session config and cookies, fetches one page of the public problem
//! list and prints a line per problem. Cookies refreshed by the server are
//! written back to the cookie file.

use anyhow::{Context, Result};
use luogu_api::{LuoguClient, problem_list_params};
use schema::{Record, Value};
use session::{CookieStore, SessionConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Value following `flag` on the command line, if any.
fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// One output line: pid, difficulty and title.
fn summary_line(problem: &Record) -> String {
    let pid = problem.get_str("pid").unwrap_or("?");
    let title = problem.get_str("title").unwrap_or("");
    match problem.get_i64("difficulty") {
        Some(difficulty) => format!("{pid}\t[{difficulty}]\t{title}"),
        None => format!("{pid}\t[-]\t{title}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = SessionConfig::resolve_path(arg_value(&args, "--config"));

    let config = if config_path.exists() {
        info!(path = %config_path.display(), "loading configuration");
        SessionConfig::load(&config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        info!(path = %config_path.display(), "no config file, using defaults");
        let mut config = SessionConfig::default();
        config.apply_env();
        config
    };
    let cookie_file = config.cookie_file.clone();

    let page: i64 = match arg_value(&args, "--page") {
        Some(p) => p.parse().with_context(|| format!("invalid --page value: {p}"))?,
        None => 1,
    };
    let mut params = problem_list_params().with("page", page);
    if let Some(keyword) = arg_value(&args, "--keyword") {
        params.set("keyword", keyword);
    }

    let client = LuoguClient::new(config).context("failed to build session")?;
    let response = client
        .get_problem_list(&params)
        .await
        .context("failed to fetch problem list")?;

    let problems = response
        .get_record("problems")
        .context("response has no problem page")?;
    let count = problems.get_i64("count").unwrap_or_default();
    info!(page, count, "problem list fetched");

    for problem in problems.get_list("result").unwrap_or_default() {
        match problem {
            Value::Record(record) => println!("{}", summary_line(record)),
            other => warn!(found = other.type_name(), "skipping malformed list entry"),
        }
    }

    if let Some(path) = cookie_file {
        let store = CookieStore::load(path)
            .await
            .context("failed to open cookie file")?;
        let cookies = client.session().cookies().await;
        if store.get().await != cookies {
            store
                .update(cookies)
                .await
                .context("failed to save refreshed cookies")?;
            info!(path = %store.path().display(), "cookies saved");
        }
    }

    Ok(())
}
