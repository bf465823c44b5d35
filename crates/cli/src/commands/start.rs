use concierge_db::ping;

use crate::commands::{load_config, migrated_pool, runtime, CommandResult, EXIT_DATABASE};

/// Preflight for `concierge-server`: config, database, schema and model key.
/// A missing key is reported but does not fail the preflight.
pub fn run() -> CommandResult {
    let config = match load_config("start") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("start") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let probe = ping(&pool).await;
        pool.close().await;
        probe.map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))
    });

    match result {
        Ok(()) => {
            let model = if config.llm.has_api_key() {
                format!("model `{}` configured", config.llm.model)
            } else {
                "model unconfigured: chat turns will be rejected".to_string()
            };
            CommandResult::success(
                "start",
                format!(
                    "preflight passed for {}:{}; {model}",
                    config.server.bind_address, config.server.port
                ),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("start", error_class, message, exit_code)
        }
    }
}
