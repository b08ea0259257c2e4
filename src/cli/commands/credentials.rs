use serde_json::json;

use crate::cli::utils::output_record;
use crate::cli::OutputFormat;
use crate::services::generate_credentials;

pub fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let credentials = generate_credentials();
    output_record(
        output_format,
        &json!({
            "name": credentials.name,
            "user": credentials.user,
            "password": credentials.password,
        }),
    )
}
