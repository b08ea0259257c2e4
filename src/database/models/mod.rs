pub mod project;
pub mod project_database;

pub use project::Project;
pub use project_database::{CreatedProjectDatabase, ProjectDatabase, ProjectDatabaseView};
