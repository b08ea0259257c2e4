pub mod credentials;
pub mod error;
pub mod locks;
pub mod provisioning;
pub mod validation;

pub use credentials::{generate as generate_credentials, DbCredentials};
pub use error::{LiveOperation, ProvisionError};
pub use provisioning::{ProvisioningService, Scope};
