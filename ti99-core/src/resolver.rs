//! Cartridge resolution: name → catalog entry → module image → LOAD_SOFTWARE.

use std::path::Path;

use crate::bus::CommandBus;
use crate::log::Log;
use crate::software::{ModuleLoader, SoftwareCatalog};

/// Resolves cartridge names and hands the loaded software to the bus.
pub struct CartridgeResolver<C, L> {
    catalog: C,
    loader: L,
    commands: CommandBus,
    log: Log,
}

impl<C: SoftwareCatalog, L: ModuleLoader> CartridgeResolver<C, L> {
    pub fn new(catalog: C, loader: L, commands: CommandBus, log: Log) -> Self {
        Self {
            catalog,
            loader,
            commands,
            log,
        }
    }

    pub fn with_log(mut self, log: Log) -> Self {
        self.log = log;
        self
    }

    /// Look up `cart_name` and load it. Underscores in the name stand for
    /// spaces. Returns true if LOAD_SOFTWARE was published.
    pub async fn load_cartridge(&self, cart_name: &str) -> bool {
        self.log.info(format!("Load cart: {cart_name}"));
        let name = cart_name.replace('_', " ");

        let cart = match self.catalog.get_by_name(&name).await {
            Ok(cart) => cart,
            Err(e) => {
                self.log.error(e.to_string());
                return false;
            }
        };

        match self.loader.load_from_url(&cart.url).await {
            Ok(software) => {
                self.commands.load_software(software);
                true
            }
            Err(e) => {
                self.log.error(format!("{e} {}", cart.url));
                false
            }
        }
    }

    /// Load a module from a local file. Returns true if LOAD_SOFTWARE was
    /// published.
    pub async fn load_module_file(&self, path: &Path) -> bool {
        match self.loader.load_from_file(path).await {
            Ok(software) => {
                self.commands.load_software(software);
                true
            }
            Err(e) => {
                self.log.error(format!("{e} {}", path.display()));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{Command, CommandType};
    use crate::error::{CoreError, CoreResult};
    use crate::log::MemoryLog;
    use crate::software::{JsonCatalog, Software};
    use std::sync::{Arc, Mutex};

    /// Loader that records every URL it is asked for.
    #[derive(Clone, Default)]
    struct RecordingLoader {
        requests: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl ModuleLoader for RecordingLoader {
        async fn load_from_url(&self, url: &str) -> CoreResult<Software> {
            self.requests.lock().unwrap().push(url.to_string());
            if self.fail {
                Err(CoreError::Fetch {
                    url: url.to_string(),
                    reason: "Http failure response: 404".to_string(),
                })
            } else {
                Ok(Software::new("Extended Basic", url))
            }
        }

        async fn load_from_file(&self, path: &Path) -> CoreResult<Software> {
            self.load_from_url(&path.display().to_string()).await
        }
    }

    fn catalog() -> JsonCatalog {
        JsonCatalog::from_json(r#"[ { "name": "Extended Basic", "url": "software/xb.rpk" } ]"#)
            .unwrap()
    }

    fn published(commands: &CommandBus) -> Arc<Mutex<Vec<Command>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        commands.subscribe(move |c| sink.lock().unwrap().push(c.clone()));
        seen
    }

    #[tokio::test]
    async fn test_load_cartridge_publishes_software() {
        let commands = CommandBus::new();
        let seen = published(&commands);
        let loader = RecordingLoader::default();
        let memory = MemoryLog::new();
        let resolver =
            CartridgeResolver::new(catalog(), loader.clone(), commands, Log::new(memory.clone()));

        assert!(resolver.load_cartridge("extended_basic").await);
        assert_eq!(*loader.requests.lock().unwrap(), vec!["software/xb.rpk"]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        match &seen[0] {
            Command::LoadSoftware(software) => assert_eq!(software.url, "software/xb.rpk"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(memory.contains("Load cart: extended_basic"));
    }

    #[tokio::test]
    async fn test_lookup_failure_skips_fetch() {
        let commands = CommandBus::new();
        let seen = published(&commands);
        let loader = RecordingLoader::default();
        let memory = MemoryLog::new();
        let empty = JsonCatalog::default();
        let resolver =
            CartridgeResolver::new(empty, loader.clone(), commands, Log::new(memory.clone()));

        assert!(!resolver.load_cartridge("extended_basic").await);
        assert!(loader.requests.lock().unwrap().is_empty());
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(memory.errors(), vec!["Not found: software 'extended basic'"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_logs_url() {
        let commands = CommandBus::new();
        let seen = published(&commands);
        let loader = RecordingLoader {
            fail: true,
            ..RecordingLoader::default()
        };
        let memory = MemoryLog::new();
        let resolver = CartridgeResolver::new(catalog(), loader, commands, Log::new(memory.clone()));

        assert!(!resolver.load_cartridge("extended_basic").await);
        assert!(seen
            .lock()
            .unwrap()
            .iter()
            .all(|c| c.kind() != CommandType::LoadSoftware));
        assert_eq!(
            memory.errors(),
            vec!["Http failure response: 404 software/xb.rpk"]
        );
    }
}
