#![forbid(unsafe_code)]

//! Command-line front end: checks cookies, or copies a collection into a
//! favorites list.
//!
//! Anything not given as a flag, environment variable or `.env` entry is asked
//! for on stdin, so the tool also works when simply double-clicked.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use favlist_tools::config::{ConfigOverrides, TransferConfig, resolve_transfer_config};
use favlist_tools::credential::{Credential, check_blob_format};
use favlist_tools::login::LoginVerifier;
use favlist_tools::pipeline::{Pipeline, TransferPlan, TransferReport};
use favlist_tools::session::Session;
use favlist_tools::transfer::VideoStatus;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const RULE: &str = "============================================================";

#[derive(Debug, Parser)]
#[command(
    name = "transfer_collection",
    about = "Copy every video of a Bilibili collection into a favorites list"
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// Cookie string copied from the browser (`document.cookie`).
    #[arg(long, global = true)]
    cookies: Option<String>,

    /// Env file holding BILI_COOKIES and FAVLIST_* settings.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[arg(long, global = true)]
    api_base: Option<String>,

    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check the cookie string format and whether the service accepts it.
    Check,
    /// Copy a collection into a favorites list.
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Collection URL, e.g. https://space.bilibili.com/<uid>/lists/<id>?type=season
    collection_url: Option<String>,

    /// Favorites URL containing `fid=<list id>`.
    favlist_url: Option<String>,

    /// Pause between archive pages, in milliseconds (at least 500).
    #[arg(long)]
    page_delay_ms: Option<u64>,

    /// Pause between favorites requests, in milliseconds (at least 1000).
    #[arg(long)]
    transfer_delay_ms: Option<u64>,

    /// Skip videos that appear more than once in the collection.
    #[arg(long)]
    dedupe: bool,

    /// Do not ask for confirmation.
    #[arg(long, short = 'y')]
    yes: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides {
            cookies: self.common.cookies.clone(),
            api_base: self.common.api_base.clone(),
            http_timeout: self
                .common
                .timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            env_path: self.common.env_file.clone(),
            ..ConfigOverrides::default()
        };
        if let Command::Run(run) = &self.command {
            overrides.page_delay = run.page_delay_ms.map(Duration::from_millis);
            overrides.transfer_delay = run.transfer_delay_ms.map(Duration::from_millis);
            overrides.dedupe = run.dedupe.then_some(true);
        }
        overrides
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_transfer_config(cli.overrides())?;

    println!("{RULE}");
    println!("Bilibili collection -> favorites");
    println!("{RULE}");

    let stdin = io::stdin();
    let mut input = stdin.lock();
    match &cli.command {
        Command::Check => check_cookies(&config, &mut input),
        Command::Run(args) => run_transfer(&config, args, &mut input),
    }
}

fn check_cookies(config: &TransferConfig, input: &mut impl BufRead) -> Result<()> {
    let cookies = cookies_or_prompt(config, input)?;
    let credential =
        check_blob_format(&cookies).context("cookie string failed the format check")?;
    println!("Cookie format looks fine, asking the service...");

    let session = Session::connect(credential, config);
    let verifier = LoginVerifier::new(&session, config);
    match verifier.identity() {
        Ok(identity) => {
            println!(
                "Cookies are valid. Logged in as {} (uid {}).",
                identity.uname, identity.mid
            );
            Ok(())
        }
        Err(err) => {
            print_cookie_report(session.credential());
            bail!("cookies were rejected: {err}; log in again and copy a fresh cookie string")
        }
    }
}

fn run_transfer(config: &TransferConfig, args: &RunArgs, input: &mut impl BufRead) -> Result<()> {
    let cookies = cookies_or_prompt(config, input)?;
    let collection_url = match &args.collection_url {
        Some(url) => url.clone(),
        None => prompt_required(input, "Collection URL")?,
    };
    let favlist_url = match &args.favlist_url {
        Some(url) => url.clone(),
        None => prompt_required(input, "Favorites URL")?,
    };
    let plan = TransferPlan::parse(&collection_url, &favlist_url)?;

    println!("Source collection: {collection_url}");
    println!(
        "  owner {} / collection {}",
        plan.collection.owner_id, plan.collection.collection_id
    );
    println!("Target favorites:  {favlist_url}");
    println!("  list {}", plan.list.list_id);
    if !args.yes && !confirm(input, "Proceed?")? {
        println!("Cancelled.");
        return Ok(());
    }

    let session = Session::connect(Credential::parse(&cookies), config);
    let report = Pipeline::new(&session, config).execute(plan)?;
    print_report(&report);
    if report.outcome.success_count == 0 {
        bail!("no video could be added to the favorites list");
    }
    Ok(())
}

fn cookies_or_prompt(config: &TransferConfig, input: &mut impl BufRead) -> Result<String> {
    match &config.cookies {
        Some(cookies) => Ok(cookies.clone()),
        None => prompt_required(input, "Cookie string (document.cookie)"),
    }
}

fn prompt_required(input: &mut impl BufRead, label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line).context("reading stdin")?;
    let value = line.trim();
    if value.is_empty() {
        bail!("{label} must not be empty");
    }
    Ok(value.to_string())
}

fn confirm(input: &mut impl BufRead, question: &str) -> Result<bool> {
    print!("{question} (y/N): ");
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line).context("reading stdin")?;
    Ok(line.trim().eq_ignore_ascii_case("y"))
}

fn print_cookie_report(credential: &Credential) {
    println!("Key cookies:");
    for (key, preview) in credential.diagnostics() {
        match preview {
            Some(value) => println!("  ok      {key}: {value}..."),
            None => println!("  missing {key}"),
        }
    }
}

fn print_report(report: &TransferReport) {
    let outcome = &report.outcome;
    let total = outcome.records.len();
    println!("{RULE}");
    println!("Resolved via {}", report.source);
    for (index, record) in outcome.records.iter().enumerate() {
        let position = index + 1;
        let label = format!("{} ({})", record.title, record.external_id);
        match &record.status {
            VideoStatus::Ok => println!("[{position}/{total}] added   {label}"),
            VideoStatus::Failed(reason) => {
                println!("[{position}/{total}] failed  {label}: {reason}")
            }
        }
    }
    println!("{RULE}");
    println!(
        "Done. Added: {}, failed: {}",
        outcome.success_count, outcome.failure_count
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn run_args_feed_overrides() {
        let cli = Cli::try_parse_from([
            "transfer_collection",
            "--cookies",
            "SESSDATA=a",
            "run",
            "https://space.bilibili.com/1/lists/2",
            "https://space.bilibili.com/1/favlist?fid=3",
            "--transfer-delay-ms",
            "1500",
            "--dedupe",
            "-y",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.cookies.as_deref(), Some("SESSDATA=a"));
        assert_eq!(overrides.transfer_delay, Some(Duration::from_millis(1500)));
        assert_eq!(overrides.page_delay, None);
        assert_eq!(overrides.dedupe, Some(true));
        match cli.command {
            Command::Run(args) => {
                assert!(args.yes);
                assert_eq!(
                    args.favlist_url.as_deref(),
                    Some("https://space.bilibili.com/1/favlist?fid=3")
                );
            }
            Command::Check => panic!("expected run"),
        }
    }

    #[test]
    fn dedupe_flag_absent_leaves_config_choice() {
        let cli = Cli::try_parse_from(["transfer_collection", "run"]).unwrap();
        assert_eq!(cli.overrides().dedupe, None);
    }

    #[test]
    fn check_accepts_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["transfer_collection", "check", "--timeout-secs", "5"]).unwrap();
        assert!(matches!(cli.command, Command::Check));
        assert_eq!(cli.overrides().http_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn prompt_rejects_blank_answers() {
        let mut input = Cursor::new("   \n");
        assert!(prompt_required(&mut input, "Collection URL").is_err());
        let mut input = Cursor::new("  https://x/1/lists/2 \n");
        assert_eq!(
            prompt_required(&mut input, "Collection URL").unwrap(),
            "https://x/1/lists/2"
        );
    }

    #[test]
    fn confirm_defaults_to_no() {
        assert!(!confirm(&mut Cursor::new("\n"), "Proceed?").unwrap());
        assert!(!confirm(&mut Cursor::new("yes\n"), "Proceed?").unwrap());
        assert!(confirm(&mut Cursor::new("Y\n"), "Proceed?").unwrap());
    }
}
