use clap::Parser;
use serde_json::json;
use std::path::PathBuf;

use baseliner::alerts::ProgressLedger;
use baseliner::client::HttpScanner;
use baseliner::config::{RuleSource, ScanConfig, Settings};
use baseliner::domain::{ActionLevel, EXIT_INCONCLUSIVE};
use baseliner::driver::{ExistingEngine, ScanDriver};
use baseliner::hooks::{HookRegistry, points};
use baseliner::report::ReportTargets;
use baseliner::rules::RuleConfig;

#[derive(Parser)]
#[command(name = "baseliner")]
#[command(about = "Drive a remote security-scanning engine through baseline and full scans")]
#[command(version)]
struct Cli {
    /// Target URL to scan
    #[arg(short, long)]
    target: String,

    /// Base URL of the engine's control API
    #[arg(short, long)]
    endpoint: Option<String>,

    /// API key for the engine, if it requires one
    #[arg(long)]
    api_key: Option<String>,

    /// Rule configuration file (tab-separated)
    #[arg(short = 'c', long)]
    config_file: Option<PathBuf>,

    /// Rule configuration fetched from a URL
    #[arg(short = 'u', long, conflicts_with = "config_file")]
    config_url: Option<String>,

    /// Write a rule-file template for every known scan rule, then scan
    #[arg(short, long)]
    generate: Option<PathBuf>,

    /// Write the HTML report to this file
    #[arg(short, long)]
    report_html: Option<PathBuf>,

    /// Write the Markdown report to this file
    #[arg(short = 'w', long)]
    report_md: Option<PathBuf>,

    /// Write the XML report to this file
    #[arg(short = 'x', long)]
    report_xml: Option<PathBuf>,

    /// Write the JSON report to this file
    #[arg(short = 'J', long)]
    report_json: Option<PathBuf>,

    /// Directory relative report paths resolve against
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Context definition file to import before scanning
    #[arg(short = 'n', long)]
    context_file: Option<PathBuf>,

    /// Context user to scan as
    #[arg(short = 'U', long, requires = "context_file")]
    user: Option<String>,

    /// Run the ajax spider after the traditional one
    #[arg(short = 'j', long)]
    ajax_spider: bool,

    /// Run an active scan after spidering
    #[arg(short = 'a', long)]
    active_scan: bool,

    /// Scan policy for the active scan
    #[arg(long, requires = "active_scan")]
    scan_policy: Option<String>,

    /// Spider budget in minutes (0 = engine-paced)
    #[arg(short = 'm', long, default_value_t = 1)]
    spider_mins: u64,

    /// Active scan budget in minutes (0 = engine-paced)
    #[arg(long, default_value_t = 0)]
    active_scan_mins: u64,

    /// Passive scan drain budget in minutes (0 = engine-paced)
    #[arg(long, default_value_t = 0)]
    passive_drain_mins: u64,

    /// Seconds to wait after spidering before scanning
    #[arg(short = 'D', long, default_value_t = 0)]
    delay: u64,

    /// Seconds to wait for the engine to become reachable
    #[arg(long, default_value_t = 600)]
    ready_timeout: u64,

    /// Default unconfigured rules with alerts to INFO instead of WARN
    #[arg(short, long)]
    info_unspecified: bool,

    /// Do not fail the exit code on warnings
    #[arg(short = 'I', long)]
    ignore_warnings: bool,

    /// Minimum level to show in the per-rule output
    #[arg(short, long, default_value = "PASS", value_parser = parse_level)]
    level: ActionLevel,

    /// Progress file tracking in-progress issues
    #[arg(short, long)]
    progress_file: Option<PathBuf>,

    /// Shut the engine down when the run ends
    #[arg(long)]
    shutdown_engine: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_level(s: &str) -> Result<ActionLevel, String> {
    ActionLevel::from_str(s).ok_or_else(|| {
        format!("unknown level {s:?}, expected PASS, IGNORE, INFO, WARN or FAIL")
    })
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Config errors abort before any phase starts
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            println!("ERROR {e:#}");
            EXIT_INCONCLUSIVE
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let settings = Settings::from_dir(std::path::Path::new("."))?;

    let endpoint = cli
        .endpoint
        .or(settings.endpoint)
        .unwrap_or_else(|| "http://127.0.0.1:8080".to_string());

    let rule_source = if let Some(path) = cli.config_file {
        RuleSource::File(path)
    } else if let Some(url) = cli.config_url {
        RuleSource::Url(url)
    } else {
        RuleSource::None
    };

    // Embedders can register a cli_opts hook to rewrite the target before
    // the run is configured; with no hook this passes straight through.
    let hooks = HookRegistry::new();
    let args = hooks.trigger(points::CLI_OPTS, vec![json!(cli.target.clone())]);
    let target = args[0].as_str().unwrap_or(&cli.target).to_string();

    let config = ScanConfig {
        target,
        endpoint: endpoint.clone(),
        api_key: cli.api_key.or(settings.api_key),
        rule_source,
        generate_template: cli.generate,
        reports: ReportTargets {
            html: cli.report_html,
            markdown: cli.report_md,
            xml: cli.report_xml,
            json: cli.report_json,
        },
        report_dir: cli
            .report_dir
            .or(settings.report_dir)
            .unwrap_or_else(|| PathBuf::from(".")),
        context_file: cli.context_file,
        scan_user: cli.user,
        ajax_spider: cli.ajax_spider,
        active_scan: cli.active_scan,
        scan_policy: cli.scan_policy,
        spider_minutes: cli.spider_mins,
        active_scan_minutes: cli.active_scan_mins,
        passive_drain_minutes: cli.passive_drain_mins,
        delay_seconds: cli.delay,
        ready_timeout_seconds: cli.ready_timeout,
        info_unspecified: cli.info_unspecified,
        ignore_warnings: cli.ignore_warnings,
        min_display_level: cli.level,
        progress_file: cli.progress_file,
        shutdown_engine: cli.shutdown_engine,
    };

    let rules = match &config.rule_source {
        RuleSource::None => RuleConfig::empty(),
        RuleSource::File(path) => RuleConfig::from_file(path)?,
        RuleSource::Url(url) => RuleConfig::from_url(url)?,
    };

    let ledger = match &config.progress_file {
        Some(path) => ProgressLedger::from_file(path)?,
        None => ProgressLedger::empty(),
    };

    let api = HttpScanner::new(&config.endpoint, config.api_key.clone());
    let launcher = ExistingEngine::new(&config.endpoint);

    let driver = ScanDriver::new(&api, &rules, &ledger, &hooks, &config);
    let outcome = driver.run(&launcher);

    println!("{}", outcome.summary_line());
    Ok(outcome.exit_code(config.ignore_warnings))
}
