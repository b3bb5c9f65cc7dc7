use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::warn;

use super::error::{MongoDaoError, MongoResult};

struct RetryPolicy;

impl RetryPolicy {
    const MAX_ATTEMPTS: u32 = 10;
    const INITIAL_DELAY_MS: u64 = 250;

    fn initial_delay() -> Duration {
        Duration::from_millis(Self::INITIAL_DELAY_MS)
    }

    fn next_delay(current: Duration) -> Duration {
        (current * 2).min(Duration::from_secs(5))
    }
}

/// Build a client, wait for the first successful ping and check the
/// deployment can run multi-document transactions.
pub async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let mut attempts = 0;
    let mut delay = RetryPolicy::initial_delay();

    loop {
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => break,
            Err(err) => {
                attempts += 1;
                if attempts >= RetryPolicy::MAX_ATTEMPTS {
                    return Err(MongoDaoError::InitialPing {
                        attempts,
                        source: err,
                    });
                }
                sleep(delay).await;
                delay = RetryPolicy::next_delay(delay);
            }
        }
    }

    warn_without_transactions(&database).await;
    Ok((client, database))
}

/// Pair commits need a replica set or sharded cluster; standalone servers
/// reject transactions at commit time.
async fn warn_without_transactions(database: &Database) {
    match database.run_command(doc! { "hello": 1 }).await {
        Ok(reply) => {
            let replicated =
                reply.contains_key("setName") || matches!(reply.get_str("msg"), Ok("isdbgrid"));
            if !replicated {
                warn!(
                    database = database.name(),
                    "MongoDB deployment is standalone; pair commits will fail without a replica set"
                );
            }
        }
        Err(err) => warn!(error = %err, "failed to inspect MongoDB topology"),
    }
}
