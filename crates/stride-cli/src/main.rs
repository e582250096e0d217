//! `stride-cli` – stride Command Line Interface
//!
//! The entry point for the guidance core. It:
//!
//! 1. Initialises tracing (console plus optional OTLP export).
//! 2. Checks for `~/.stride/config.toml`; runs a **First-Run Wizard** when
//!    the file is absent.
//! 3. Probes the routing and perception backends and picks live clients or
//!    offline simulators.
//! 4. Drops the user into an **interactive REPL** driving a simulated
//!    walking session (`/route`, `/pos`, `/scan`, `/status`, `/help`).
//! 5. Intercepts **Ctrl-C** to publish a `Shutdown` alert and exit safely.

mod config;
mod probe;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

use stride_middleware::{EventBus, Topic};
use stride_types::{Event, EventPayload};

fn main() {
    // Hold the guard for the whole process so pending spans are flushed.
    let _tracing = stride_runtime::init_tracing("stride");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let bus = EventBus::default();
    let bus_ctrlc = bus.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping guidance …".yellow().bold());

        let stop_event = Event::new(
            "stride-cli",
            EventPayload::Shutdown {
                reason: "operator ctrl-c".to_string(),
            },
        );
        let _ = bus_ctrlc.publish_to(Topic::SystemAlerts, stop_event);

        println!("{}", "  ✓ Shutdown published to Event Bus.".green());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── First-Run Wizard ──────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    // ── Backend discovery ─────────────────────────────────────────────────
    print!("\n  Probing perception backend at {} … ", cfg.perception_url.dimmed());
    let perception_online = match probe::check(&cfg.perception_url, "/healthz") {
        Ok(()) => {
            println!("{}", "online".green());
            true
        }
        Err(reason) => {
            println!("{}", "offline".yellow());
            println!("  {}  Hazard scans use demo frames.", reason.dimmed());
            false
        }
    };

    if cfg.has_routing_key() {
        print!("  Probing routing backend at {} … ", cfg.routing_url.dimmed());
        if probe::routing_online(&cfg.routing_url) {
            println!("{}", "online".green());
        } else {
            println!("{}", "offline".yellow());
            println!(
                "  {}",
                "Routes will fall back to straight-line guidance if requests fail.".dimmed()
            );
        }
    } else {
        println!(
            "  {}  Routes are planned by the offline direct router.",
            "No routing API key configured.".dimmed()
        );
    }

    // ── Runtime ───────────────────────────────────────────────────────────
    // Built after the blocking probes; reqwest::blocking must not run inside
    // a Tokio context.
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start the async runtime");
            println!("{}: {}", "Fatal".red().bold(), e);
            return;
        }
    };
    let backends = repl::Backends::from_config(&cfg, perception_online);

    println!();
    println!(
        "  Type {} for a list of commands.\n",
        "/help".bold().cyan()
    );

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(&cfg, bus, backends, &rt, shutdown);
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║       stride First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up stride.\n");

    let mut cfg = config::Config::default();

    println!("  Which travel profile should routes use?");
    println!("    1) Walking     (default)");
    println!("    2) Wheelchair");
    let choice = prompt_line("  Enter choice [1]: ", "1");
    cfg.routing_profile = match choice.trim() {
        "2" => stride_middleware::RoutingProfile::Wheelchair,
        _ => stride_middleware::RoutingProfile::FootWalking,
    };

    cfg.perception_url = prompt_line(
        &format!("  Perception backend URL [{}]: ", cfg.perception_url),
        &cfg.perception_url,
    );

    cfg.routing_url = prompt_line(
        &format!("  Routing backend URL [{}]: ", cfg.routing_url),
        &cfg.routing_url,
    );
    cfg.routing_api_key = prompt_line("  Routing API key (Enter to skip): ", "");

    let interval = prompt_line(
        &format!("  Hazard scan interval in seconds [{}]: ", cfg.sensing.interval_secs),
        &cfg.sensing.interval_secs.to_string(),
    );
    match interval.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => cfg.sensing.interval_secs = secs,
        _ => println!(
            "  {} '{}' is not a valid interval, keeping {}",
            "Warning:".yellow(),
            interval,
            cfg.sensing.interval_secs
        ),
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"      _        _     _      "#.bold().cyan());
    println!("{}", r#"  ___| |_ _ __(_) __| | ___ "#.bold().cyan());
    println!("{}", r#" / __| __| '__| |/ _` |/ _ \"#.bold().cyan());
    println!("{}", r#" \__ \ |_| |  | | (_| |  __/"#.bold().cyan());
    println!("{}", r#" |___/\__|_|  |_|\__,_|\___|"#.bold().cyan());
    println!();
    println!("  {} {}",
        "stride".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Spoken navigation and hazard guidance");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
