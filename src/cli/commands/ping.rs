use serde_json::json;

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::engines::EngineRegistry;

/// Run the adapter connectivity check; exits non-zero when the server is unreachable
pub async fn handle(config: &AppConfig, flavour: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let registry = EngineRegistry::from_config(config);
    let Some(binding) = registry.resolve(flavour) else {
        output_error(
            output_format,
            &format!("Database flavour with name {} is not mysql or postgres.", flavour),
            Some("UNSUPPORTED_FLAVOUR"),
        )?;
        anyhow::bail!("unsupported flavour {flavour}");
    };

    let target = format!("{}:{}", binding.host, binding.port);
    if binding.engine.check_connection().await {
        output_success(
            output_format,
            &format!("{} server at {} is reachable", binding.flavour, target),
            Some(json!({ "flavour": binding.flavour, "host": binding.host, "port": binding.port })),
        )
    } else {
        output_error(
            output_format,
            &format!("Failed to connect to the {} server at {}", binding.flavour, target),
            Some("SERVICE_UNAVAILABLE"),
        )?;
        anyhow::bail!("{} server unreachable", binding.flavour)
    }
}
