//! The front-end controller.
//!
//! Subscribes to both buses and reacts to what it hears: loads the startup
//! cartridge on READY, injects the auto-run keystrokes after STARTED, runs
//! the save and restore pipelines, and handles disk and module files.
//!
//! Bus handlers only forward into an unbounded inbox, so publishing never
//! blocks. `run` drains the inbox one message at a time; a pipeline started
//! by one message finishes before the next message is looked at.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};
use tokio::task::JoinHandle;

use crate::bus::{Command, CommandBus, ConsoleEvent, EventBus, Subscription};
use crate::config::AppConfig;
use crate::disk::{DiskImage, DiskImageSet};
use crate::error::CoreError;
use crate::log::Log;
use crate::machine::MachineHandle;
use crate::orchestrator::{OrchestrationContext, StateOrchestrator};
use crate::resolver::CartridgeResolver;
use crate::settings::{Setting, SettingsStore};
use crate::software::{ModuleLoader, SoftwareCatalog};
use crate::store::StateStore;

/// Something delivered to the controller's inbox.
#[derive(Debug, Clone)]
pub enum Message {
    Command(Command),
    Event(ConsoleEvent),
}

/// One-shot delayed keystroke injection.
///
/// Armed by a `cart` parameter; the next STARTED schedules it and disarms,
/// so it fires at most once per arming.
#[derive(Debug, Default)]
pub struct AutoRun {
    pending: bool,
    task: Option<JoinHandle<()>>,
}

impl AutoRun {
    pub fn arm(&mut self) {
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Spawn the injection if armed. Returns true if a task was scheduled.
    pub fn schedule(&mut self, machine: MachineHandle, delay: Duration, keys: String) -> bool {
        if !self.pending {
            return false;
        }
        self.pending = false;
        self.cancel();
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = machine.with(|core| core.simulate_key_presses(&keys)) {
                log::error!(target: "ti99", "auto-run: {e}");
            }
        }));
        true
    }

    /// Abort a scheduled injection that has not fired yet.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Reacts to commands and console events.
pub struct Controller<S, C, L> {
    config: Arc<AppConfig>,
    commands: CommandBus,
    events: EventBus,
    settings: SettingsStore,
    resolver: CartridgeResolver<C, L>,
    orchestrator: StateOrchestrator<S>,
    log: Log,
    machine: Option<MachineHandle>,
    disk_images: DiskImageSet,
    cart_name: String,
    started: bool,
    was_running: bool,
    auto_run: AutoRun,
    subscriptions: Option<(Subscription<Command>, Subscription<ConsoleEvent>)>,
}

impl<S, C, L> Controller<S, C, L>
where
    S: StateStore,
    C: SoftwareCatalog,
    L: ModuleLoader,
{
    pub fn new(
        config: Arc<AppConfig>,
        commands: CommandBus,
        events: EventBus,
        settings: SettingsStore,
        store: S,
        catalog: C,
        loader: L,
    ) -> Self {
        let log = Log::default();
        let resolver = CartridgeResolver::new(catalog, loader, commands.clone(), log.clone());
        let orchestrator = StateOrchestrator::new(
            store,
            settings.clone(),
            commands.clone(),
            events.clone(),
            log.clone(),
        )
        .with_state_key(config.machine_state_key.clone());
        Self {
            cart_name: config.default_cartridge.clone(),
            config,
            commands,
            events,
            settings,
            resolver,
            orchestrator,
            log,
            machine: None,
            disk_images: DiskImageSet::with_defaults(),
            started: false,
            was_running: false,
            auto_run: AutoRun::default(),
            subscriptions: None,
        }
    }

    /// Send diagnostics to `log` instead of the `log` facade.
    pub fn with_log(mut self, log: Log) -> Self {
        self.resolver = self.resolver.with_log(log.clone());
        self.orchestrator = self.orchestrator.with_log(log.clone());
        self.log = log;
        self
    }

    /// Subscribe to both buses and return the inbox they feed.
    pub fn attach(&mut self) -> UnboundedReceiver<Message> {
        self.detach();
        let (tx, rx) = mpsc::unbounded_channel();

        let command_tx = tx.clone();
        let commands = self.commands.subscribe(move |command| {
            let _ = command_tx.send(Message::Command(command.clone()));
        });
        let events = self.events.subscribe(move |event| {
            let _ = tx.send(Message::Event(event.clone()));
        });
        self.subscriptions = Some((commands, events));

        self.log.info(self.config.banner());
        self.log.info("--------------------------------");
        rx
    }

    /// Process messages until every sender is gone.
    pub async fn run(&mut self, mut inbox: UnboundedReceiver<Message>) {
        while let Some(message) = inbox.recv().await {
            self.handle(message).await;
        }
    }

    /// Process everything queued, including messages published while
    /// handling. Returns the number of messages handled.
    pub async fn run_pending(&mut self, inbox: &mut UnboundedReceiver<Message>) -> usize {
        let mut handled = 0;
        loop {
            match inbox.try_recv() {
                Ok(message) => {
                    self.handle(message).await;
                    handled += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return handled,
            }
        }
    }

    pub async fn handle(&mut self, message: Message) {
        match message {
            Message::Command(command) => self.handle_command(command).await,
            Message::Event(event) => self.handle_event(event).await,
        }
    }

    pub async fn handle_command(&mut self, command: Command) {
        self.log.info(command.kind().to_string());
        match command {
            Command::ChangeSetting { setting, value } => self.change_setting(setting, value),
            Command::SaveState => self.save_state().await,
            Command::RestoreState => self.restore_state().await,
            Command::OpenDisk { files, drive_index } => self.open_disk(&files, drive_index).await,
            Command::OpenModule(path) => {
                self.resolver.load_module_file(&path).await;
            }
            _ => {}
        }
    }

    pub async fn handle_event(&mut self, event: ConsoleEvent) {
        self.log.info(event.kind().to_string());
        match event {
            ConsoleEvent::Ready(machine) => {
                let sound = self.settings.is_sound_enabled();
                if let Err(e) = machine.with(|core| core.apply_setting(Setting::Sound, sound)) {
                    self.log.error(e.to_string());
                }
                self.machine = Some(machine);
                self.started = true;
                let cart_name = self.cart_name.clone();
                self.resolver.load_cartridge(&cart_name).await;
                self.commands.start();
            }
            ConsoleEvent::Started => {
                if let Some(machine) = &self.machine {
                    self.auto_run.schedule(
                        machine.clone(),
                        self.config.auto_run_delay(),
                        self.config.auto_run_keys.clone(),
                    );
                }
            }
            _ => {}
        }
    }

    /// The `cart` navigation parameter. Arms auto-run; loads right away if
    /// the machine is already up, otherwise replaces the startup cartridge.
    pub async fn on_parameters_changed(&mut self, cart: Option<&str>) {
        let Some(cart_name) = cart.filter(|name| !name.is_empty()) else {
            return;
        };
        self.auto_run.arm();
        if self.started {
            self.resolver.load_cartridge(cart_name).await;
        } else {
            self.cart_name = cart_name.to_string();
        }
    }

    /// Load a cartridge from the catalog. Unlike the `cart` parameter this
    /// never arms auto-run.
    pub async fn load_cartridge(&self, name: &str) -> bool {
        self.resolver.load_cartridge(name).await
    }

    /// Pause the machine if pause-on-focus-lost is enabled.
    pub fn focus_lost(&mut self) {
        if !self.settings.is_pause_on_focus_lost_enabled() {
            return;
        }
        self.was_running = self
            .machine
            .as_ref()
            .and_then(|machine| machine.with(|core| core.is_running()).ok())
            .unwrap_or(false);
        if self.was_running {
            self.commands.stop();
        }
    }

    /// Resume a machine paused by `focus_lost`.
    pub fn focus_gained(&mut self) {
        if self.settings.is_pause_on_focus_lost_enabled() && self.was_running {
            self.was_running = false;
            self.commands.start();
        }
    }

    /// Unsubscribe from both buses and cancel any pending auto-run.
    pub fn shutdown(&mut self) {
        self.detach();
        self.auto_run.cancel();
    }

    fn detach(&mut self) {
        if let Some((commands, events)) = self.subscriptions.take() {
            commands.unsubscribe();
            events.unsubscribe();
        }
    }

    pub fn machine(&self) -> Option<&MachineHandle> {
        self.machine.as_ref()
    }

    pub fn disk_images(&self) -> &DiskImageSet {
        &self.disk_images
    }

    pub fn cart_name(&self) -> &str {
        &self.cart_name
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_auto_run_pending(&self) -> bool {
        self.auto_run.is_pending()
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    fn change_setting(&mut self, setting: Setting, value: bool) {
        if let Err(e) = self.settings.set(setting, value) {
            self.log.error(e.to_string());
        }
        if let Some(machine) = &self.machine {
            if let Err(e) = machine.with(|core| core.apply_setting(setting, value)) {
                self.log.error(e.to_string());
            }
        }
    }

    async fn save_state(&mut self) {
        let Some(machine) = self.machine.clone() else {
            self.log.error(CoreError::NoMachine.to_string());
            return;
        };
        let ctx = OrchestrationContext::new(machine, std::mem::take(&mut self.disk_images));
        self.orchestrator.save_state(&ctx).await;
        self.disk_images = ctx.disk_images;
    }

    async fn restore_state(&mut self) {
        let Some(machine) = self.machine.clone() else {
            self.log.error(CoreError::NoMachine.to_string());
            return;
        };
        let mut ctx = OrchestrationContext::new(machine, std::mem::take(&mut self.disk_images));
        self.orchestrator.restore_state(&mut ctx).await;
        self.disk_images = ctx.disk_images;
    }

    /// Read disk image files, add them to the collection and insert the
    /// first into `drive_index`.
    async fn open_disk(&mut self, files: &[PathBuf], drive_index: usize) {
        let mut first = None;
        for file in files {
            match read_disk_image(file).await {
                Ok(image) => {
                    self.log.info(format!("Disk image {} added", image.name));
                    first.get_or_insert_with(|| image.name.clone());
                    self.disk_images.insert(image);
                }
                Err(e) => self.log.error(format!("{e} {}", file.display())),
            }
        }

        let Some(name) = first else {
            return;
        };
        let Some(machine) = &self.machine else {
            self.log.error(CoreError::NoMachine.to_string());
            return;
        };
        let image = self.disk_images.get(&name);
        match machine.with(|core| core.insert_disk(drive_index, image)) {
            Ok(Ok(())) => self
                .log
                .info(format!("Disk image {name} inserted into drive {drive_index}")),
            Ok(Err(e)) | Err(e) => self.log.error(e.to_string()),
        }
    }
}

async fn read_disk_image(path: &Path) -> Result<DiskImage, CoreError> {
    let data = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("DISK")
        .to_string();
    Ok(DiskImage::new(name, data))
}
