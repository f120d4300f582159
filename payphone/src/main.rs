//! Payphone adventure — main entry point.
//!
//! Loads the scene graph from a directory of scene files and runs the
//! session engine against a console phone (terminal keyboard as keypad).
//! Hardware deployments swap in their own `InputSource`/`Presenter`.
//!
//! Configuration comes from the environment (a `.env` file is honored):
//!
//! - `PAYPHONE_SCENES` — scene directory (default `scenes`)
//! - `PAYPHONE_START` — scene every session starts in (default `intro`)
//! - `PAYPHONE_HOME` — recovery scene (default: the start scene)
//! - `PAYPHONE_HASH` — `replay` or `inventory` for the lone-`#` command
//! - `PAYPHONE_RING_START` / `PAYPHONE_RING_END` — ringer hours

mod console;
mod ring;

use std::sync::atomic::Ordering;

use payphone_core::{content, Engine, EngineConfig, HashCommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use console::{ConsoleBell, ConsoleInput, ConsolePresenter};
use ring::RingConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging on stderr; stdout belongs to the console phone.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "payphone=info,payphone_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let scenes_dir = std::env::var("PAYPHONE_SCENES").unwrap_or_else(|_| "scenes".into());
    let start_scene = std::env::var("PAYPHONE_START").unwrap_or_else(|_| "intro".into());
    let home_scene = std::env::var("PAYPHONE_HOME").unwrap_or_else(|_| start_scene.clone());
    let hash_command = match std::env::var("PAYPHONE_HASH").as_deref() {
        Ok("inventory") => HashCommand::ReadInventory,
        _ => HashCommand::ReplayAudio,
    };

    tracing::info!(dir = %scenes_dir, "loading scenes");
    let graph = content::load_scene_dir(&scenes_dir).await?;
    if graph.is_empty() {
        eprintln!("No scenes found in {scenes_dir}.");
        eprintln!("Point PAYPHONE_SCENES at a directory of scene files.");
        std::process::exit(1);
    }

    let config = EngineConfig::new(start_scene)
        .with_home_scene(home_scene)
        .with_hash_command(hash_command);

    let input = ConsoleInput::new()?;

    // The ambient ringer runs on its own task against the hook probe.
    let ring_config = RingConfig {
        start_hour: env_hour("PAYPHONE_RING_START", 14),
        end_hour: env_hour("PAYPHONE_RING_END", 17),
        ..RingConfig::default()
    };
    let hook = input.hook_probe();
    tokio::spawn(ring::run_ringer(
        ring_config,
        move || hook.load(Ordering::SeqCst),
        ConsoleBell,
    ));

    let mut engine = Engine::new(graph, config, input, ConsolePresenter)?;
    engine.run().await;

    Ok(())
}

fn env_hour(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn print_help() {
    println!("payphone - dial-to-play phone adventure");
    println!();
    println!("USAGE:");
    println!("  payphone [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help    Show this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("  PAYPHONE_SCENES       Scene directory (default: scenes)");
    println!("  PAYPHONE_START        Starting scene id (default: intro)");
    println!("  PAYPHONE_HOME         Recovery scene id (default: the start scene)");
    println!("  PAYPHONE_HASH         Lone-# command: replay | inventory");
    println!("  PAYPHONE_RING_START   Ringer window start hour (default: 14)");
    println!("  PAYPHONE_RING_END     Ringer window end hour (default: 17)");
    println!();
    println!("CONSOLE CONTROLS:");
    println!("  Enter     Lift / cradle the handset");
    println!("  0-9 * #   Keypad");
    println!("  h         Hang up");
    println!("  q, Esc    Quit");
}
