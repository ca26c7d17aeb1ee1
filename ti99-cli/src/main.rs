//! TI-99/4A CLI - Drive the front-end core from a terminal.
//!
//! Usage:
//!   ti99 [--cart NAME] [--config FILE] [--data-dir DIR] [--memory-store]
//!
//! Examples:
//!   ti99                              # Boot with Extended Basic
//!   ti99 --cart ti_invaders           # Boot TI Invaders and auto-run it
//!   ti99 --memory-store               # Keep saved state in memory only
//!
//! Once running, type `help` for the list of console commands.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use ti99_core::{
    bind_machine, AppConfig, AssetModuleLoader, CommandBus, Controller, EventBus,
    HeadlessMachine, JsonCatalog, JsonFileStore, MachineCore, MachineHandle, MemoryStore,
    ModuleLoader, Setting, SettingsStore, SoftwareCatalog, StateStore,
};

/// TI-99/4A front end
#[derive(Parser, Debug)]
#[command(name = "ti99")]
#[command(about = "Run the TI-99/4A front end from the command line")]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for saved state and settings
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Root directory that module URLs are resolved against
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Software catalog JSON
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Cartridge to load and auto-run (underscores stand for spaces)
    #[arg(long)]
    cart: Option<String>,

    /// Keep saved state in memory instead of the data directory
    #[arg(long)]
    memory_store: bool,
}

const HELP: &str = "\
Commands:
  start | fast | frame | step | stop | reset
  save                      save machine state
  restore                   restore machine state
  load <name>               load a cartridge from the catalog
  module <file>             load a module file
  disk <drive> <file>...    add disk images, insert the first into <drive> (1-3)
  set <setting> <on|off>    change a setting
  break <hex|off>           set or clear the breakpoint
  blur | focus              simulate losing/regaining focus
  status                    show machine status
  quit";

/// Build the config from the optional file and the command-line overrides.
fn load_config(args: &Args) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(dir) = &args.assets {
        config.asset_dir = dir.clone();
    }
    if let Some(file) = &args.catalog {
        config.catalog_file = file.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = load_config(&args)?;

    let catalog = match JsonCatalog::from_path(&config.catalog_file) {
        Ok(catalog) => catalog,
        Err(e) => {
            log::warn!(
                "Cannot read catalog {}: {e}",
                config.catalog_file.display()
            );
            JsonCatalog::default()
        }
    };
    let loader = AssetModuleLoader::new(config.asset_dir.clone());

    if args.memory_store {
        run(args.cart, config, MemoryStore::new(), catalog, loader).await
    } else {
        let store = JsonFileStore::open(config.state_dir());
        run(args.cart, config, store, catalog, loader).await
    }
}

async fn run<S, C, L>(
    cart: Option<String>,
    config: AppConfig,
    store: S,
    catalog: C,
    loader: L,
) -> Result<(), Box<dyn std::error::Error>>
where
    S: StateStore,
    C: SoftwareCatalog,
    L: ModuleLoader,
{
    let settings = SettingsStore::open(config.settings_path())?;
    let core = Arc::new(Mutex::new(HeadlessMachine::with_settings(&settings.get())));
    let machine = MachineHandle::from_shared(Arc::clone(&core));

    let commands = CommandBus::new();
    let events = EventBus::new();
    let binding = bind_machine(machine.clone(), &commands, events.clone());

    let mut controller = Controller::new(
        Arc::new(config),
        commands.clone(),
        events.clone(),
        settings,
        store,
        catalog,
        loader,
    );
    let mut inbox = controller.attach();
    controller.on_parameters_changed(cart.as_deref()).await;
    events.ready(machine);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(message) = inbox.recv() => controller.handle(message).await,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line == "quit" || line == "exit" {
                        break;
                    }
                    if let Some(name) = line.strip_prefix("load ") {
                        let name = name.split_whitespace().collect::<Vec<_>>().join("_");
                        controller.load_cartridge(&name).await;
                        continue;
                    }
                    match line {
                        "blur" => controller.focus_lost(),
                        "focus" => controller.focus_gained(),
                        "status" => print_status(&core),
                        _ => execute(line, &commands),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::error!("stdin: {e}");
                    break;
                }
            },
        }
    }

    controller.shutdown();
    binding.unsubscribe();
    Ok(())
}

/// Translate one console line into bus commands.
fn execute(line: &str, commands: &CommandBus) {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return;
    };
    let rest: Vec<&str> = words.collect();

    match (verb, rest.as_slice()) {
        ("start", []) => commands.start(),
        ("fast", []) => commands.fast(),
        ("frame", []) => commands.frame(),
        ("step", []) => commands.step(),
        ("stop", []) => commands.stop(),
        ("reset", []) => commands.reset(),
        ("save", []) => commands.save_state(),
        ("restore", []) => commands.restore_state(),
        ("module", [file]) => commands.open_module(*file),
        ("disk", [drive, files @ ..]) if !files.is_empty() => match drive.parse::<usize>() {
            Ok(n) if n >= 1 => commands.open_disk(files.iter().map(PathBuf::from).collect(), n - 1),
            _ => eprintln!("Invalid drive: {drive}"),
        },
        ("set", [setting, value]) => match (setting.parse::<Setting>(), parse_toggle(value)) {
            (Ok(setting), Some(value)) => commands.change_setting(setting, value),
            (Err(e), _) => eprintln!("{e}"),
            (_, None) => eprintln!("Expected on or off, got {value}"),
        },
        ("break", ["off"]) => commands.set_breakpoint_address(None),
        ("break", [address]) => {
            let digits = address
                .trim_start_matches("0x")
                .trim_start_matches("0X")
                .trim_start_matches('>');
            match u16::from_str_radix(digits, 16) {
                Ok(address) => commands.set_breakpoint_address(Some(address)),
                Err(_) => eprintln!("Invalid address: {address}"),
            }
        }
        ("help", _) => println!("{HELP}"),
        _ => eprintln!("Unknown command: {line} (try `help`)"),
    }
}

fn parse_toggle(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn print_status(core: &Arc<Mutex<HeadlessMachine>>) {
    let Ok(core) = core.lock() else {
        eprintln!("Machine unavailable");
        return;
    };
    println!(
        "running: {}  fast: {}  software: {}",
        core.is_running(),
        core.is_fast(),
        core.software().unwrap_or("-")
    );
    if let Some(address) = core.breakpoint() {
        println!("breakpoint: >{address:04X}");
    }
    for drive in core.disk_drives() {
        println!(
            "{}: {}",
            drive.name,
            drive.disk_image.as_deref().unwrap_or("(empty)")
        );
    }
}
