// In-memory fakes for exercising the provisioning service and router
// without live database servers.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

use crate::database::models::{Project, ProjectDatabase};
use crate::database::{DatabaseError, ProjectDatabaseStore};
use crate::engines::{DatabaseEngine, EngineBinding, EngineError, EngineRegistry, Flavour, TenantConnection};

/// Record store backed by vectors, enforcing the same uniqueness as the real schema
#[derive(Default)]
pub struct MemoryStore {
    projects: RwLock<Vec<Project>>,
    records: RwLock<Vec<ProjectDatabase>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_project(&self, name: &str) -> Uuid {
        let project = Project {
            id: Uuid::new_v4(),
            name: name.to_string(),
            organisation_id: None,
            date_created: Utc::now(),
        };
        let id = project.id;
        self.projects.write().unwrap().push(project);
        id
    }

    pub fn add_record(&self, record: ProjectDatabase) -> ProjectDatabase {
        self.records.write().unwrap().push(record.clone());
        record
    }

    pub fn records(&self) -> Vec<ProjectDatabase> {
        self.records.read().unwrap().clone()
    }

    /// Make every insert and delete fail as if the store went away
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), DatabaseError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProjectDatabaseStore for MemoryStore {
    async fn find_project(&self, project_id: Uuid) -> Result<Option<Project>, DatabaseError> {
        Ok(self.projects.read().unwrap().iter().find(|p| p.id == project_id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<ProjectDatabase>, DatabaseError> {
        Ok(self.records.read().unwrap().iter().find(|r| r.name == name).cloned())
    }

    async fn find_by_user(&self, user: &str) -> Result<Option<ProjectDatabase>, DatabaseError> {
        Ok(self.records.read().unwrap().iter().find(|r| r.user == user).cloned())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ProjectDatabase>, DatabaseError> {
        Ok(self.records.read().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self, project_id: Option<Uuid>) -> Result<Vec<ProjectDatabase>, DatabaseError> {
        Ok(self
            .records
            .read()
            .unwrap()
            .iter()
            .filter(|r| project_id.is_none() || r.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, record: &ProjectDatabase) -> Result<ProjectDatabase, DatabaseError> {
        self.check_writable()?;
        let mut records = self.records.write().unwrap();
        if records.iter().any(|r| r.name == record.name) {
            return Err(DatabaseError::UniqueViolation("project_databases_unique_name".into()));
        }
        if records.iter().any(|r| r.user == record.user) {
            return Err(DatabaseError::UniqueViolation("project_databases_unique_user".into()));
        }
        records.push(record.clone());
        Ok(record.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        self.check_writable()?;
        let mut records = self.records.write().unwrap();
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() < before)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// One observed adapter call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    CheckConnection,
    Create { name: String, user: String, password: String },
    Delete { name: String },
    Reset { name: String, user: String, password: String },
    Connect { user: String, password: String, db_name: String },
}

/// Scriptable adapter that tracks which databases are "live"
pub struct MockEngine {
    flavour: Flavour,
    calls: Mutex<Vec<EngineCall>>,
    live: Mutex<HashSet<String>>,
    connection_ok: AtomicBool,
    create_ok: AtomicBool,
    reset_ok: AtomicBool,
    probe_ok: AtomicBool,
    open_probes: Arc<AtomicUsize>,
}

impl MockEngine {
    pub fn new(flavour: Flavour) -> Self {
        Self {
            flavour,
            calls: Mutex::new(Vec::new()),
            live: Mutex::new(HashSet::new()),
            connection_ok: AtomicBool::new(true),
            create_ok: AtomicBool::new(true),
            reset_ok: AtomicBool::new(true),
            probe_ok: AtomicBool::new(true),
            open_probes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn mysql() -> Self {
        Self::new(Flavour::Mysql)
    }

    pub fn postgres() -> Self {
        Self::new(Flavour::Postgres)
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mark_live(&self, name: &str) {
        self.live.lock().unwrap().insert(name.to_string());
    }

    pub fn is_live(&self, name: &str) -> bool {
        self.live.lock().unwrap().contains(name)
    }

    /// Probe connections opened but not yet closed
    pub fn open_probes(&self) -> usize {
        self.open_probes.load(Ordering::SeqCst)
    }

    pub fn set_connection_ok(&self, ok: bool) {
        self.connection_ok.store(ok, Ordering::SeqCst);
    }

    pub fn set_create_ok(&self, ok: bool) {
        self.create_ok.store(ok, Ordering::SeqCst);
    }

    pub fn set_reset_ok(&self, ok: bool) {
        self.reset_ok.store(ok, Ordering::SeqCst);
    }

    pub fn set_probe_ok(&self, ok: bool) {
        self.probe_ok.store(ok, Ordering::SeqCst);
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

struct MockConnection {
    open_probes: Arc<AtomicUsize>,
}

#[async_trait]
impl TenantConnection for MockConnection {
    async fn close(self: Box<Self>) {
        self.open_probes.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DatabaseEngine for MockEngine {
    fn flavour(&self) -> Flavour {
        self.flavour
    }

    async fn check_connection(&self) -> bool {
        self.record(EngineCall::CheckConnection);
        self.connection_ok.load(Ordering::SeqCst)
    }

    async fn create_database(&self, name: &str, user: &str, password: &str) -> bool {
        self.record(EngineCall::Create {
            name: name.into(),
            user: user.into(),
            password: password.into(),
        });
        // Servers refuse to create a database that already exists
        self.create_ok.load(Ordering::SeqCst) && self.live.lock().unwrap().insert(name.to_string())
    }

    async fn delete_database(&self, name: &str) -> bool {
        self.record(EngineCall::Delete { name: name.into() });
        self.live.lock().unwrap().remove(name)
    }

    async fn reset_database(&self, name: &str, user: &str, password: &str) -> bool {
        self.record(EngineCall::Reset {
            name: name.into(),
            user: user.into(),
            password: password.into(),
        });
        self.reset_ok.load(Ordering::SeqCst)
    }

    async fn create_db_connection(
        &self,
        user: &str,
        password: &str,
        db_name: &str,
    ) -> Result<Box<dyn TenantConnection>, EngineError> {
        self.record(EngineCall::Connect {
            user: user.into(),
            password: password.into(),
            db_name: db_name.into(),
        });
        if !self.probe_ok.load(Ordering::SeqCst) {
            return Err(EngineError::Timeout(std::time::Duration::from_secs(3)));
        }
        self.open_probes.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            open_probes: self.open_probes.clone(),
        }))
    }
}

/// Registry with both flavours bound to mocks on fixed test endpoints
pub fn registry_with(mysql: Arc<MockEngine>, postgres: Arc<MockEngine>) -> EngineRegistry {
    EngineRegistry::new(vec![
        EngineBinding {
            flavour: Flavour::Mysql,
            host: "mysql.test".to_string(),
            port: 3306,
            engine: mysql,
        },
        EngineBinding {
            flavour: Flavour::Postgres,
            host: "postgres.test".to_string(),
            port: 5432,
            engine: postgres,
        },
    ])
}

pub fn record(name: &str, user: &str, flavour: &str, project_id: Option<Uuid>) -> ProjectDatabase {
    ProjectDatabase {
        id: Uuid::new_v4(),
        name: name.to_string(),
        user: user.to_string(),
        password: format!("{user}_password"),
        project_id,
        database_flavour_name: flavour.to_string(),
        host: "db.test".to_string(),
        port: 5432,
        date_created: Utc::now(),
    }
}
