use std::sync::Arc;
use std::time::Duration;

use super::{DatabaseEngine, Flavour, MysqlEngine, PostgresEngine};
use crate::config::AppConfig;

/// A flavour resolved to its adapter and the coordinates of its administrative server
#[derive(Clone)]
pub struct EngineBinding {
    pub flavour: Flavour,
    pub host: String,
    pub port: u16,
    pub engine: Arc<dyn DatabaseEngine>,
}

impl std::fmt::Debug for EngineBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBinding")
            .field("flavour", &self.flavour)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

/// Immutable flavour table, built once at startup and injected where needed.
/// Adding a flavour means adding an adapter and an entry here.
#[derive(Clone, Debug, Default)]
pub struct EngineRegistry {
    bindings: Vec<EngineBinding>,
}

impl EngineRegistry {
    pub fn new(bindings: Vec<EngineBinding>) -> Self {
        Self { bindings }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let ddl_timeout = Duration::from_secs(config.provisioning.ddl_timeout_secs);
        let probe_timeout = Duration::from_secs(config.provisioning.probe_timeout_secs);

        let bindings = Flavour::ALL
            .iter()
            .map(|&flavour| {
                let endpoint = config.flavours.endpoint(flavour).clone();
                let engine: Arc<dyn DatabaseEngine> = match flavour {
                    Flavour::Mysql => Arc::new(MysqlEngine::new(endpoint.clone(), ddl_timeout, probe_timeout)),
                    Flavour::Postgres => Arc::new(PostgresEngine::new(endpoint.clone(), ddl_timeout, probe_timeout)),
                };
                EngineBinding {
                    flavour,
                    host: endpoint.host,
                    port: endpoint.port,
                    engine,
                }
            })
            .collect();

        Self { bindings }
    }

    /// Look up a flavour by its wire name. Unknown names resolve to `None`.
    pub fn resolve(&self, flavour_name: &str) -> Option<&EngineBinding> {
        let flavour = flavour_name.parse::<Flavour>().ok()?;
        self.bindings.iter().find(|b| b.flavour == flavour)
    }

    pub fn bindings(&self) -> &[EngineBinding] {
        &self.bindings
    }
}
