use crate::commands::{prepare, CommandResult};
use prodcat_db::{
    connect_with_settings, migrations, DbPool, DemoCatalog, RepositoryError, SqlProductRepository,
};

enum SeedOutcome {
    Loaded(usize),
    Skipped(u64),
}

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let repository = SqlProductRepository::new(pool.clone());
        let outcome = async {
            let existing = stored_rows(&pool).await?;
            if existing > 0 {
                return Ok(SeedOutcome::Skipped(existing));
            }
            let seeded = DemoCatalog::load(&repository).await?;
            Ok::<SeedOutcome, RepositoryError>(SeedOutcome::Loaded(seeded.created.len()))
        }
        .await
        .map_err(|error| ("seed_execution", error.to_string(), 6u8));

        pool.close().await;
        outcome
    });

    match result {
        Ok(outcome) => CommandResult::success("seed", seed_message(&outcome)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

/// Counts soft-deleted rows too, so a catalog whose products were all removed
/// is still treated as seeded.
async fn stored_rows(pool: &DbPool) -> Result<u64, RepositoryError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product").fetch_one(pool).await?;
    u64::try_from(total).map_err(|error| RepositoryError::Decode(error.to_string()))
}

fn seed_message(outcome: &SeedOutcome) -> String {
    match outcome {
        SeedOutcome::Loaded(count) => format!("demo catalog loaded: {count} products"),
        SeedOutcome::Skipped(existing) => {
            format!("catalog already holds {existing} products; seed skipped")
        }
    }
}
