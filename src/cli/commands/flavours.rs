use serde_json::json;

use crate::cli::utils::output_record;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::engines::Flavour;

pub fn handle(config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let flavours: Vec<_> = Flavour::ALL
        .iter()
        .map(|&flavour| {
            let endpoint = config.flavours.endpoint(flavour);
            json!({
                "flavour": flavour.as_str(),
                "host": endpoint.host,
                "port": endpoint.port,
                "admin_user": endpoint.admin_user,
            })
        })
        .collect();

    match output_format {
        OutputFormat::Json => output_record(output_format, &json!({ "flavours": flavours }))?,
        OutputFormat::Text => {
            for flavour in &flavours {
                println!(
                    "{:<10} {}:{} (admin user {})",
                    flavour["flavour"].as_str().unwrap_or_default(),
                    flavour["host"].as_str().unwrap_or_default(),
                    flavour["port"],
                    flavour["admin_user"].as_str().unwrap_or_default(),
                );
            }
        }
    }
    Ok(())
}
