//! fb: run and inspect Lua addons against the widget bridge
//!
//! - `fb run` loads every enabled addon, fires `PLAYER_LOGIN`, runs update
//!   ticks, fires `PLAYER_LOGOUT` and writes saved variables.
//! - `fb check` compiles every addon file without running anything.
//! - `fb tree` loads addons and prints the live object tree as JSON.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use framebridge_core::addon::discover_addons;
use framebridge_core::config::LogFormat;
use framebridge_core::engine::check_addon;
use framebridge_core::logging::init_logging;
use framebridge_core::{Config, Engine};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fb")]
#[command(about = "Run and inspect Lua addons against the widget bridge", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/framebridge/framebridge.toml)
    #[arg(short, long, global = true, env = "FRAMEBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Addon directory, overriding the config
    #[arg(long, global = true, env = "FRAMEBRIDGE_ADDONS")]
    addons: Option<PathBuf>,

    /// Saved-variables directory, overriding the config
    #[arg(long, global = true)]
    saved: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load addons and drive a login, update ticks and a logout
    Run {
        /// Number of update ticks between login and logout
        #[arg(long)]
        ticks: Option<u32>,
        /// Do not write saved variables
        #[arg(long)]
        no_save: bool,
    },

    /// Compile every addon file without running it
    Check,

    /// Load addons and print the live object tree as JSON
    Tree {
        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },
}

impl Cli {
    fn config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref()).with_context(|| match &self.config {
            Some(path) => format!("failed to load config from {}", path.display()),
            None => "failed to load config".to_string(),
        })?;
        if let Some(dir) = &self.addons {
            config.addons.dir.clone_from(dir);
        }
        if let Some(dir) = &self.saved {
            config.addons.saved_variables_dir.clone_from(dir);
        }
        if let Some(level) = &self.log_level {
            config.logging.level.clone_from(level);
        }
        if self.json {
            config.logging.format = LogFormat::Json;
        }
        let base = std::env::current_dir().context("failed to read the current directory")?;
        Ok(config.rooted_at(&base))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config()?;
    init_logging(&config.logging).context("failed to initialize logging")?;

    match cli.command {
        Commands::Run { ticks, no_save } => run(config, ticks, no_save),
        Commands::Check => check(&config),
        Commands::Tree { compact } => tree(config, compact),
    }
}

fn run(config: Config, ticks: Option<u32>, no_save: bool) -> Result<()> {
    let ticks = ticks.unwrap_or(config.runtime.ticks);
    let tick = config.runtime.tick().as_secs_f64();
    let engine = Engine::new(config).context("failed to start the script engine")?;

    let loaded = engine.load_addons().context("failed to load addons")?;
    engine.trigger_event("PLAYER_LOGIN", None)?;
    let mut invoked = 0;
    for _ in 0..ticks {
        invoked += engine.update(tick)?;
    }
    engine.trigger_event("PLAYER_LOGOUT", None)?;

    let saved = if no_save {
        0
    } else {
        engine.save_variables().context("failed to write saved variables")?
    };
    let live = engine.bridge().live_count();
    engine.shutdown()?;

    tracing::info!(addons = loaded.len(), ticks, handlers = invoked, saved, live, "run finished");
    println!(
        "{} addon(s) loaded, {ticks} tick(s), {invoked} update handler call(s), {saved} saved-variable file(s), {live} live object(s)",
        loaded.len()
    );
    Ok(())
}

fn check(config: &Config) -> Result<()> {
    let manifests = discover_addons(&config.addons.dir)
        .with_context(|| format!("failed to read addons from {}", config.addons.dir.display()))?;

    let mut problems = 0;
    for manifest in &manifests {
        let issues = check_addon(manifest);
        if issues.is_empty() {
            println!("ok    {}", manifest.name);
            continue;
        }
        println!("FAIL  {}", manifest.name);
        for issue in &issues {
            println!("      {}: {}", issue.path.display(), issue.message);
        }
        problems += issues.len();
    }

    if problems > 0 {
        bail!("{problems} problem(s) in {} addon(s)", manifests.len());
    }
    Ok(())
}

fn tree(config: Config, compact: bool) -> Result<()> {
    let engine = Engine::new(config).context("failed to start the script engine")?;
    engine.load_addons().context("failed to load addons")?;
    engine.trigger_event("PLAYER_LOGIN", None)?;

    let tree = engine.tree();
    let json = if compact {
        serde_json::to_string(&tree)?
    } else {
        serde_json::to_string_pretty(&tree)?
    };
    println!("{json}");
    engine.shutdown()?;
    Ok(())
}
