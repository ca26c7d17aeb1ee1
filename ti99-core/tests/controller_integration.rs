//! End-to-end tests: controller, buses, file-backed store and asset loader.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ti99_core::{
    bind_machine, AppConfig, AssetModuleLoader, CommandBus, ConsoleEventType, Controller,
    EventBus, HeadlessMachine, JsonCatalog, JsonFileStore, Log, MachineCore, MachineHandle,
    MemoryLog, Message, Setting, Settings, SettingsStore,
};
use tokio::sync::mpsc::UnboundedReceiver;

const CATALOG: &str = r#"{
    "name": "Software",
    "items": [
        { "name": "Cartridges", "items": [
            { "name": "Extended Basic", "url": "software/xb.bin" },
            { "name": "TI Invaders", "url": "software/invaders.bin" }
        ] }
    ]
}"#;

/// Scratch directory with an asset tree, a catalog and a data dir.
fn scratch(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ti99-it-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(dir.join("assets/software")).unwrap();
    std::fs::write(dir.join("assets/software/xb.bin"), [0xAA; 32]).unwrap();
    std::fs::write(dir.join("assets/software/invaders.bin"), [0x55; 32]).unwrap();
    std::fs::write(dir.join("assets/software/software.json"), CATALOG).unwrap();
    dir
}

fn config_for(dir: &Path) -> AppConfig {
    AppConfig {
        asset_dir: dir.join("assets"),
        catalog_file: dir.join("assets/software/software.json"),
        data_dir: dir.join("data"),
        ..AppConfig::default()
    }
}

struct Session {
    core: Arc<Mutex<HeadlessMachine>>,
    machine: MachineHandle,
    commands: CommandBus,
    events: EventBus,
    log: MemoryLog,
    controller: Controller<JsonFileStore, JsonCatalog, AssetModuleLoader>,
    inbox: UnboundedReceiver<Message>,
}

impl Session {
    /// Wire up a fresh session the way the CLI does.
    fn open(dir: &Path) -> Self {
        let config = config_for(dir);
        let settings = SettingsStore::open(config.settings_path()).unwrap();
        let core = Arc::new(Mutex::new(HeadlessMachine::with_settings(&settings.get())));
        let machine = MachineHandle::from_shared(Arc::clone(&core));
        let commands = CommandBus::new();
        let events = EventBus::new();
        bind_machine(machine.clone(), &commands, events.clone());

        let store = JsonFileStore::open(config.state_dir());
        let catalog = JsonCatalog::from_path(&config.catalog_file).unwrap();
        let loader = AssetModuleLoader::new(&config.asset_dir);
        let log = MemoryLog::new();
        let mut controller = Controller::new(
            Arc::new(config),
            commands.clone(),
            events.clone(),
            settings,
            store,
            catalog,
            loader,
        )
        .with_log(Log::new(log.clone()));
        let inbox = controller.attach();

        Self {
            core,
            machine,
            commands,
            events,
            log,
            controller,
            inbox,
        }
    }

    async fn settle(&mut self) {
        self.controller.run_pending(&mut self.inbox).await;
    }

    async fn boot(&mut self) {
        self.events.ready(self.machine.clone());
        self.settle().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_cart_parameter_boots_and_auto_runs() {
    let dir = scratch("boot");
    let mut session = Session::open(&dir);

    session
        .controller
        .on_parameters_changed(Some("ti_invaders"))
        .await;
    session.boot().await;

    {
        let core = session.core.lock().unwrap();
        assert_eq!(core.software(), Some("invaders"));
        assert!(core.is_running());
    }
    assert!(session.log.contains("Load cart: ti_invaders"));

    tokio::time::sleep(Duration::from_millis(2100)).await;
    tokio::task::yield_now().await;
    assert_eq!(session.core.lock().unwrap().typed(), [" 2"]);

    session.controller.shutdown();
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_missing_cartridge_is_logged_and_machine_still_starts() {
    let dir = scratch("missing");
    let mut session = Session::open(&dir);
    session.controller.on_parameters_changed(Some("parsec")).await;
    session.boot().await;

    let core = session.core.lock().unwrap();
    assert_eq!(core.software(), None);
    assert!(core.is_running());
    assert_eq!(session.log.errors(), vec!["Not found: software 'parsec'"]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_state_survives_a_new_session() {
    let dir = scratch("persist");

    let mut first = Session::open(&dir);
    first.boot().await;
    first.commands.set_breakpoint_address(Some(0x8300));
    first.commands.change_setting(Setting::Gram, true);
    first.commands.save_state();
    first.settle().await;
    assert!(first.log.contains("Machine state saved OK."));
    first.controller.shutdown();

    assert!(dir.join("data/state/disk-images.json").exists());
    assert!(dir.join("data/state/disk-drives.json").exists());
    assert!(dir.join("data/state/state-ti994a.json").exists());

    let mut second = Session::open(&dir);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    second
        .events
        .subscribe(move |e| sink.lock().unwrap().push(e.kind()));

    second.boot().await;
    assert!(second.controller.settings().is_enabled(Setting::Gram));
    second.commands.restore_state();
    second.settle().await;

    assert!(second.log.contains("Machine state restored OK."));
    {
        let core = second.core.lock().unwrap();
        assert_eq!(core.breakpoint(), Some(0x8300));
        assert_eq!(core.software(), Some("xb"));
        assert!(core.is_running());
    }
    assert_eq!(second.controller.disk_images().len(), 3);
    assert_eq!(
        seen.lock().unwrap().last(),
        Some(&ConsoleEventType::StateRestored)
    );

    second.controller.shutdown();
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_restore_refused_when_f18a_setting_differs() {
    let dir = scratch("f18a");

    let mut first = Session::open(&dir);
    first.boot().await;
    first.commands.save_state();
    first.settle().await;
    first.controller.shutdown();

    // Turn the F18A on before the next session
    let enabled = Settings {
        f18a_enabled: true,
        ..Settings::default()
    };
    let settings = SettingsStore::open(config_for(&dir).settings_path()).unwrap();
    settings.restore_settings(enabled).unwrap();

    let mut second = Session::open(&dir);
    second.boot().await;
    second.core.lock().unwrap().clear_journal();

    second.commands.restore_state();
    second.settle().await;

    assert_eq!(
        second.log.errors(),
        vec!["Please disable F18A before restoring the state"]
    );
    let core = second.core.lock().unwrap();
    assert_eq!(core.journal(), ["stop"]);
    assert!(!core.is_running());
    assert!(core.settings().f18a_enabled);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_open_module_loads_software() {
    let dir = scratch("module");
    let mut session = Session::open(&dir);
    session.boot().await;

    session
        .commands
        .open_module(dir.join("assets/software/invaders.bin"));
    session.settle().await;

    assert_eq!(session.core.lock().unwrap().software(), Some("invaders"));

    session.commands.open_module(dir.join("nope.rpk"));
    session.settle().await;
    assert_eq!(session.log.errors().len(), 1);

    let _ = std::fs::remove_dir_all(&dir);
}
