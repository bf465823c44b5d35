use concierge_db::{DemoCatalog, SeedResult, DEMO_BOOKING_REFERENCE, DEMO_CLIENT_ID};

use crate::commands::{load_config, migrated_pool, runtime, CommandResult, EXIT_SEED};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;

        let loaded = DemoCatalog::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_SEED))?;
        let verification = DemoCatalog::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), EXIT_SEED))?;
        pool.close().await;

        let failed = verification
            .checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(*check))
            .collect::<Vec<_>>();
        if failed.is_empty() {
            Ok(loaded)
        } else {
            Err(("seed_verification", verification_failure_message(&failed), EXIT_SEED))
        }
    });

    match result {
        Ok(loaded) => CommandResult::success("seed", summary(&loaded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn summary(loaded: &SeedResult) -> String {
    format!(
        "demo catalog loaded: {} destinations, {} service rates, {} permits, {} client ({DEMO_CLIENT_ID}), {} booking ({DEMO_BOOKING_REFERENCE})",
        loaded.destinations, loaded.rates, loaded.permits, loaded.clients, loaded.bookings
    )
}

fn verification_failure_message(failed: &[&str]) -> String {
    format!("seed verification failed for checks: {}", failed.join(", "))
}

#[cfg(test)]
mod tests {
    use concierge_db::SeedResult;

    use super::{summary, verification_failure_message};

    #[test]
    fn summary_names_the_demo_client_and_booking() {
        let message = summary(&SeedResult {
            destinations: 5,
            rates: 16,
            permits: 5,
            clients: 1,
            bookings: 1,
        });

        assert!(message.starts_with("demo catalog loaded: 5 destinations, 16 service rates"));
        assert!(message.contains("client-demo-001"));
        assert!(message.contains("CNC-2026-0417"));
    }

    #[test]
    fn verification_message_lists_failed_checks() {
        assert_eq!(
            verification_failure_message(&["payment-schedule", "sell-above-cost"]),
            "seed verification failed for checks: payment-schedule, sell-above-cost"
        );
    }
}
