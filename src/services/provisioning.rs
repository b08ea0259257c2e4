// Provisioning orchestrator for tenant databases.
//
// Every mutating operation performs the live side effect on the database
// server first and only then touches the record store, so a record never
// describes a database that was not created. When the store fails after a
// successful live operation the error is a `PartialFailure`, logged under the
// `reconcile` target for manual repair.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::database::models::{CreatedProjectDatabase, Project, ProjectDatabase, ProjectDatabaseView};
use crate::database::{DatabaseError, ProjectDatabaseStore};
use crate::engines::{EngineBinding, EngineRegistry};
use crate::services::credentials;
use crate::services::error::{LiveOperation, ProvisionError};
use crate::services::locks::{name_key, user_key, KeyedLocks};
use crate::services::validation::{CreateDatabaseRequest, NewDatabase};

/// Whether an operation is confined to one project or spans all tenants.
/// Authorization for either has already happened upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Project(Uuid),
    Admin,
}

pub struct ProvisioningService {
    store: Arc<dyn ProjectDatabaseStore>,
    registry: EngineRegistry,
    locks: KeyedLocks,
}

impl ProvisioningService {
    pub fn new(store: Arc<dyn ProjectDatabaseStore>, registry: EngineRegistry) -> Self {
        Self {
            store,
            registry,
            locks: KeyedLocks::new(),
        }
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Provision a new tenant database and persist its record
    pub async fn create(&self, scope: Scope, body: Value) -> Result<CreatedProjectDatabase, ProvisionError> {
        let request = CreateDatabaseRequest::from_json(body).map_err(ProvisionError::validation)?;
        request.validate().map_err(ProvisionError::validation)?;

        let flavour_name = request.database_flavour_name.clone().unwrap_or_default();
        let binding = self.resolve(&flavour_name)?;

        let project_id = match scope {
            Scope::Project(project_id) => Some(project_id),
            Scope::Admin => request.project_uuid(),
        };

        let generated = credentials::generate();
        let new_database = NewDatabase {
            name: request.name.unwrap_or(generated.name),
            user: request.user.unwrap_or(generated.user),
            password: request.password.unwrap_or(generated.password),
            database_flavour_name: flavour_name,
            host: binding.host.clone(),
            port: binding.port,
            project_id,
        };
        new_database.validate().map_err(ProvisionError::validation)?;

        if let Some(project_id) = project_id {
            self.require_project(project_id).await?;
        }

        // Held from the uniqueness check until the record is written
        let _guard = self
            .locks
            .acquire([name_key(&new_database.name), user_key(&new_database.user)])
            .await;

        if self.store.find_by_name(&new_database.name).await?.is_some() {
            return Err(ProvisionError::DuplicateName(new_database.name));
        }
        if self.store.find_by_user(&new_database.user).await?.is_some() {
            return Err(ProvisionError::DuplicateUser(new_database.user));
        }

        let engine = &binding.engine;
        if !engine.check_connection().await {
            return Err(ProvisionError::ServiceUnavailable);
        }
        if !engine
            .create_database(&new_database.name, &new_database.user, &new_database.password)
            .await
        {
            return Err(ProvisionError::CreateFailed);
        }

        let record = ProjectDatabase {
            id: Uuid::new_v4(),
            name: new_database.name,
            user: new_database.user,
            password: new_database.password,
            project_id: new_database.project_id,
            database_flavour_name: new_database.database_flavour_name,
            host: new_database.host,
            port: i32::from(new_database.port),
            date_created: Utc::now(),
        };

        let saved = self
            .store
            .insert(&record)
            .await
            .map_err(|source| partial_failure(LiveOperation::Create, &record, source))?;

        info!(
            record_id = %saved.id,
            database = %saved.name,
            flavour = %saved.database_flavour_name,
            "Provisioned tenant database"
        );
        Ok(CreatedProjectDatabase::from(saved))
    }

    /// Records of one project, or all records for admins
    pub async fn list(&self, scope: Scope) -> Result<Vec<ProjectDatabaseView>, ProvisionError> {
        let project_filter = match scope {
            Scope::Project(project_id) => {
                self.require_project(project_id).await?;
                Some(project_id)
            }
            Scope::Admin => None,
        };

        let records = self.store.list(project_filter).await?;
        Ok(records.iter().map(ProjectDatabaseView::from).collect())
    }

    /// Load a record and probe whether its database accepts the tenant credentials.
    /// Probe failures only ever set `db_status: false`.
    pub async fn get_with_status(&self, scope: Scope, database_id: Uuid) -> Result<ProjectDatabaseView, ProvisionError> {
        let record = self.load(scope, database_id).await?;
        let binding = self.resolve(&record.database_flavour_name)?;

        let db_status = probe(binding, &record).await;
        Ok(ProjectDatabaseView::from(&record).with_status(db_status))
    }

    /// Drop the live database, then its record
    pub async fn delete(&self, scope: Scope, database_id: Uuid) -> Result<(), ProvisionError> {
        let record = self.load(scope, database_id).await?;
        let binding = self.resolve(&record.database_flavour_name)?;

        let _guard = self.locks.acquire([name_key(&record.name)]).await;
        let record = self.reload(database_id).await?;

        let engine = &binding.engine;
        if !engine.check_connection().await {
            return Err(ProvisionError::ServiceUnavailable);
        }
        if !engine.delete_database(&record.name).await {
            return Err(ProvisionError::DeleteFailed);
        }

        match self.store.delete(record.id).await {
            Ok(true) => {}
            Ok(false) => warn!(record_id = %record.id, "Record vanished before it could be deleted"),
            Err(source) => return Err(partial_failure(LiveOperation::Delete, &record, source)),
        }

        info!(record_id = %record.id, database = %record.name, "Deleted tenant database");
        Ok(())
    }

    /// Drop and recreate the live database with its stored credentials.
    /// The record itself is never modified.
    pub async fn reset(&self, scope: Scope, database_id: Uuid) -> Result<(), ProvisionError> {
        let record = self.load(scope, database_id).await?;
        let binding = self.resolve(&record.database_flavour_name)?;

        let _guard = self.locks.acquire([name_key(&record.name)]).await;
        let record = self.reload(database_id).await?;

        let engine = &binding.engine;
        if !engine.check_connection().await {
            return Err(ProvisionError::ServiceUnavailable);
        }
        if !engine
            .reset_database(&record.name, &record.user, &record.password)
            .await
        {
            return Err(ProvisionError::ResetFailed);
        }

        info!(record_id = %record.id, database = %record.name, "Reset tenant database");
        Ok(())
    }

    /// Re-read a record once its name lock is held; a delete may have won the lock first
    async fn reload(&self, database_id: Uuid) -> Result<ProjectDatabase, ProvisionError> {
        self.store
            .get(database_id)
            .await?
            .ok_or(ProvisionError::DatabaseNotFound(database_id))
    }

    fn resolve(&self, flavour_name: &str) -> Result<&EngineBinding, ProvisionError> {
        self.registry
            .resolve(flavour_name)
            .ok_or_else(|| ProvisionError::UnsupportedFlavour(flavour_name.to_string()))
    }

    async fn require_project(&self, project_id: Uuid) -> Result<Project, ProvisionError> {
        self.store
            .find_project(project_id)
            .await?
            .ok_or(ProvisionError::ProjectNotFound(project_id))
    }

    async fn load(&self, scope: Scope, database_id: Uuid) -> Result<ProjectDatabase, ProvisionError> {
        if let Scope::Project(project_id) = scope {
            self.require_project(project_id).await?;
        }

        let record = self
            .store
            .get(database_id)
            .await?
            .ok_or(ProvisionError::DatabaseNotFound(database_id))?;

        match scope {
            Scope::Project(project_id) if record.project_id != Some(project_id) => {
                Err(ProvisionError::DatabaseNotFound(database_id))
            }
            _ => Ok(record),
        }
    }
}

/// Open a tenant connection and close it again; any connect error means unreachable
async fn probe(binding: &EngineBinding, record: &ProjectDatabase) -> bool {
    match binding
        .engine
        .create_db_connection(&record.user, &record.password, &record.name)
        .await
    {
        Ok(connection) => {
            connection.close().await;
            true
        }
        Err(e) => {
            debug!(record_id = %record.id, database = %record.name, error = %e, "Tenant database unreachable");
            false
        }
    }
}

fn partial_failure(operation: LiveOperation, record: &ProjectDatabase, source: DatabaseError) -> ProvisionError {
    error!(
        target: "reconcile",
        partial_failure = true,
        operation = %operation,
        record_id = %record.id,
        database = %record.name,
        flavour = %record.database_flavour_name,
        error = %source,
        "Live database and record store diverged; manual reconciliation required"
    );
    ProvisionError::PartialFailure {
        operation,
        name: record.name.clone(),
        record_id: record.id,
        source,
    }
}
