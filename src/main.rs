mod astro;
mod config;
mod fetch;
mod orchestrator;
mod web;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;
use tokio::sync::broadcast::error::RecvError;

use crate::astro::{DisplayZone, SystemClock};
use crate::config::Config;
use crate::fetch::{AstronomicalSnapshot, LiveFetcher};
use crate::orchestrator::{handoff, Lookup, OrchestratorOptions, RefreshOrchestrator};

#[derive(Parser)]
#[command(name = "sky-o-mat")]
#[command(about = "Sun, moon and daylight for any city")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Fetch and print one snapshot
    Lookup {
        city: String,
        #[arg(short, long)]
        config: Option<String>,
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Refresh a city periodically and print every update until Ctrl-C
    Watch {
        city: String,
        #[arg(short, long, default_value = "1m", value_parser = humantime::parse_duration)]
        interval: Duration,
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Validate a config file
    CheckConfig { config: String },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => serve(config.as_deref()),
        Commands::Lookup { city, config, json } => lookup(&city, config.as_deref(), json),
        Commands::Watch {
            city,
            interval,
            config,
        } => watch(&city, interval, config.as_deref()),
        Commands::CheckConfig { config } => check_config(&config),
    }
}

fn load_config(path: Option<&str>) -> Option<Config> {
    let Some(path) = path else {
        return Some(Config::default());
    };
    match Config::from_file(path) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Error loading {}: {}", path, e);
            None
        }
    }
}

fn runtime() -> Option<Runtime> {
    match Runtime::new() {
        Ok(runtime) => Some(runtime),
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            None
        }
    }
}

/// Builds the live orchestrator inside `runtime`.
fn build_orchestrator(
    runtime: &Runtime,
    config: &Config,
) -> Option<RefreshOrchestrator<LiveFetcher>> {
    let _guard = runtime.enter();
    let options = match OrchestratorOptions::from_config(config) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return None;
        }
    };
    let fetcher = match fetch::live_fetcher(&config.services, Arc::new(SystemClock), options.zone) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            eprintln!("Failed to set up HTTP client: {}", e);
            return None;
        }
    };
    match RefreshOrchestrator::new(fetcher, options, Arc::new(SystemClock)) {
        Ok(orchestrator) => Some(orchestrator),
        Err(e) => {
            eprintln!("Failed to start orchestrator: {}", e);
            None
        }
    }
}

fn serve(path: Option<&str>) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };
    let Some(runtime) = runtime() else {
        return ExitCode::FAILURE;
    };

    match runtime.block_on(web::run_server(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn lookup(city: &str, path: Option<&str>, json: bool) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };
    let Some(runtime) = runtime() else {
        return ExitCode::FAILURE;
    };
    let Some(orchestrator) = build_orchestrator(&runtime, &config) else {
        return ExitCode::FAILURE;
    };

    let snapshot = orchestrator.request_blocking(city).snapshot;
    if json {
        match serde_json::to_string_pretty(snapshot.as_ref()) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Failed to encode snapshot: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_snapshot(&snapshot, &orchestrator.zone());
        if let Some(info) = orchestrator.daylight_info() {
            println!(
                "  daylight: {:.2} h, {} in {:.1} h, {}",
                info.daylight_hours, info.next_event, info.hours_until_next_event, info.season
            );
        }
    }

    if snapshot.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn watch(city: &str, interval: Duration, path: Option<&str>) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };
    let Some(runtime) = runtime() else {
        return ExitCode::FAILURE;
    };
    let Some(orchestrator) = build_orchestrator(&runtime, &config) else {
        return ExitCode::FAILURE;
    };

    // This thread plays the display thread; everything printed arrives via the mailbox.
    let (postman, mailbox) = handoff::mailbox();
    let zone = orchestrator.zone();
    let quit = Arc::new(AtomicBool::new(false));

    let mut updates = orchestrator.subscribe();
    let forward = postman.clone();
    runtime.spawn(async move {
        loop {
            match updates.recv().await {
                Ok(snapshot) => {
                    forward.post(move || print_snapshot(&snapshot, &zone));
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Display fell behind by {} update(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let stop = Arc::clone(&quit);
    let signal = postman.clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.post(move || stop.store(true, Ordering::SeqCst));
        }
    });

    // Fresh fetches also reach the display through `updates`; a cache hit does not.
    orchestrator.request_async(
        city,
        postman.deliver(move |lookup: Lookup| {
            if lookup.from_cache {
                print_snapshot(&lookup.snapshot, &zone);
            }
        }),
    );
    if let Err(e) = orchestrator.start_auto_refresh(interval) {
        eprintln!("Cannot watch: {}", e);
        return ExitCode::FAILURE;
    }

    while !quit.load(Ordering::SeqCst) {
        mailbox.run_for(Duration::from_millis(250));
    }

    orchestrator.shutdown();
    ExitCode::SUCCESS
}

fn check_config(path: &str) -> ExitCode {
    let Some(config) = load_config(Some(path)) else {
        return ExitCode::FAILURE;
    };
    println!("Config is valid");
    println!("  bind: {}", config.web.bind);
    println!(
        "  cache ttl: {} (failures {})",
        humantime::format_duration(config.cache.ttl),
        humantime::format_duration(config.cache.failure_ttl)
    );
    println!("  default city: {}", config.refresh.default_city);
    match config.refresh.interval {
        Some(interval) => println!(
            "  auto-refresh: every {}",
            humantime::format_duration(interval)
        ),
        None => println!("  auto-refresh: off"),
    }
    println!("  api keys: {}", config.api_keys.len());
    ExitCode::SUCCESS
}

fn print_snapshot(snapshot: &AstronomicalSnapshot, zone: &DisplayZone) {
    let record = snapshot.export(zone);
    let field = |key: &str| record.get(key).map(String::as_str).unwrap_or_default();

    println!("{} @ {}", snapshot.city, field("fetched_at"));
    if let Some(error) = &snapshot.error {
        println!("  unavailable ({}): {}", error.kind, error.message);
    }
    println!(
        "  sun: elevation {} az {} | sunrise {} sunset {} | {}",
        field("sun_elevation"),
        field("sun_azimuth"),
        field("sunrise"),
        field("sunset"),
        if snapshot.is_daytime { "day" } else { "night" }
    );
    println!(
        "  moon: {} {} {}% lit | elevation {} az {}",
        field("moon_symbol"),
        field("moon_phase_name"),
        field("moon_illumination"),
        field("moon_elevation"),
        field("moon_azimuth")
    );
    println!(
        "  golden hour: {} and {}",
        field("golden_morning"),
        field("golden_evening")
    );
}
