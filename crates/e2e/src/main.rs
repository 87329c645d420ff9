//! Acceptance harness entry point
//!
//! Exit codes: 0 when every scenario passed, 1 when any failed, 2 when the
//! harness itself could not run.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bookshelf_e2e::service::{ServiceCommand, ServiceHandle};
use bookshelf_e2e::{
    ApiDriver, HarnessConfig, HarnessError, HarnessResult, ModuleSpec, SuiteRunner, Surface,
    UiDriver, UniqueGenerator,
};

#[derive(Parser, Debug)]
#[command(name = "bookshelf-e2e")]
#[command(about = "Acceptance tests for the Bookshelf service and web app")]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of YAML modules (built-in modules when omitted)
    #[arg(short, long)]
    suites: Option<PathBuf>,

    /// Run only modules with this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only the module with this name
    #[arg(short, long)]
    module: Option<String>,

    /// Run only one surface (api or ui)
    #[arg(long, value_parser = ["api", "ui"])]
    surface: Option<String>,

    /// Base URL of the book service
    #[arg(long, env = "BOOKSHELF_SERVICE_URL")]
    service_url: Option<String>,

    /// Base URL of the web application
    #[arg(long, env = "BOOKSHELF_APP_URL")]
    app_url: Option<String>,

    /// Command that starts the service before running
    #[arg(long)]
    service_cmd: Option<String>,

    /// Command that starts the web application before running
    #[arg(long)]
    app_cmd: Option<String>,

    /// Skip waiting for the service and application to answer
    #[arg(long)]
    no_wait: bool,

    /// Modules run at the same time
    #[arg(short = 'j', long)]
    parallel: Option<usize>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long)]
    browser: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Directory containing node_modules/playwright
    #[arg(long)]
    playwright_dir: Option<PathBuf>,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List selected modules and exit
    #[arg(long)]
    list: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

fn load_config(args: &Args) -> HarnessResult<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::from_yaml_file(path)?,
        None => HarnessConfig::default(),
    };

    if let Some(dir) = &args.suites {
        config.suites_dir = Some(dir.clone());
    }
    if args.tag.is_some() {
        config.tag = args.tag.clone();
    }
    if args.module.is_some() {
        config.module = args.module.clone();
    }
    if let Some(surface) = args.surface.as_deref() {
        config.surfaces = vec![if surface == "ui" { Surface::Ui } else { Surface::Api }];
    }
    if let Some(url) = &args.service_url {
        config.service_url = url.clone();
    }
    if let Some(url) = &args.app_url {
        config.app_url = url.clone();
    }
    if let Some(parallel) = args.parallel {
        config.max_parallel_modules = parallel;
    }
    if let Some(browser) = &args.browser {
        config.browser = browser.clone();
    }
    if args.headed {
        config.headless = false;
    }
    if let Some(dir) = &args.playwright_dir {
        config.playwright_dir = dir.clone();
    }
    if let Some(dir) = &args.output {
        config.output_dir = dir.clone();
    }

    config.validate()?;
    Ok(config)
}

fn select_modules(config: &HarnessConfig) -> HarnessResult<Vec<ModuleSpec>> {
    let modules = match &config.suites_dir {
        Some(dir) => ModuleSpec::load_all(dir)?,
        None => ModuleSpec::builtin()?,
    };

    let tagged = match &config.tag {
        Some(tag) => ModuleSpec::filter_by_tag(&modules, tag),
        None => modules.iter().collect(),
    };

    let selected: Vec<ModuleSpec> = tagged
        .into_iter()
        .filter(|m| config.runs(m.surface))
        .filter(|m| config.module.as_ref().map_or(true, |n| &m.name == n))
        .cloned()
        .collect();

    if selected.is_empty() {
        return Err(HarnessError::Setup("no modules match the selection".to_string()));
    }
    Ok(selected)
}

async fn async_main(args: Args) -> HarnessResult<bool> {
    let config = load_config(&args)?;
    let modules = select_modules(&config)?;

    if args.list {
        for module in &modules {
            println!(
                "{} ({}, {} scenarios)",
                module.name,
                module.surface,
                module.scenarios.len()
            );
        }
        return Ok(true);
    }

    let needs_ui = modules.iter().any(|m| m.surface == Surface::Ui);

    // Handles stop their processes on drop.
    let mut services = Vec::new();
    if let Some(cmd) = &args.service_cmd {
        let command =
            ServiceCommand::parse(cmd, config.service_url.clone(), config.startup_timeout())?;
        services.push(ServiceHandle::spawn(command).await?);
    }
    if let Some(cmd) = &args.app_cmd {
        let command = ServiceCommand::parse(cmd, config.app_url.clone(), config.startup_timeout())?;
        services.push(ServiceHandle::spawn(command).await?);
    }

    if !args.no_wait {
        ServiceHandle::wait_until_reachable(&config.service_url, config.startup_timeout()).await?;
        if needs_ui {
            ServiceHandle::wait_until_reachable(&config.app_url, config.startup_timeout()).await?;
        }
    }

    let generator = Arc::new(UniqueGenerator::new());
    info!("Run tag: {}", generator.run_tag());

    let runner = SuiteRunner::new(generator)
        .with_driver(Arc::new(ApiDriver::new(config.api())))
        .with_driver(Arc::new(UiDriver::new(config.ui())))
        .max_parallel_modules(config.max_parallel_modules);

    let report = runner.run_all(&modules).await?;
    report.write_json(&config.output_dir)?;

    drop(services);
    Ok(report.success())
}
