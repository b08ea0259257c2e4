use serde_json::json;
use uuid::Uuid;

use crate::auth::{generate_jwt, Claims, ADMIN_ROLE, USER_ROLE};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;

pub fn handle(config: &AppConfig, user: Uuid, admin: bool, output_format: OutputFormat) -> anyhow::Result<()> {
    let role = if admin { ADMIN_ROLE } else { USER_ROLE };
    let claims = Claims::new(user, role, config.security.jwt_expiry_hours);
    let token = generate_jwt(&claims, &config.security.jwt_secret)?;

    match output_format {
        OutputFormat::Json => output_success(
            output_format,
            "Token generated",
            Some(json!({ "token": token, "role": role, "expires_at": claims.exp })),
        ),
        // Bare token so it can be captured by shell scripts
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
    }
}
