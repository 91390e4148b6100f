//! Process entrypoint: loads configuration from the environment, wires the
//! Postgres repositories and processor registry into an `Orchestrator`, and
//! polls each workflow topic in a loop until asked to shut down.

use std::sync::Arc;
use std::time::Duration;
use uw_broker::{topics, MemoryBroker, Subscriber};
use uw_core::Registry;
use uw_orchestrator::{Orchestrator, UnderwritingLocks};
use uw_storage::{
    config::{BrokerConfig, DatabaseConfig, ExecutionConfig},
    PostgresExecutionRepository, PostgresFactorRepository, PostgresProcessorRepository,
    PostgresUnderwritingRepository, PostgresWorkflowLogRepository,
};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

const WORKFLOW_TOPICS: &[&str] = &[
    topics::UNDERWRITING_UPDATED,
    topics::DOCUMENT_ANALYZED,
    topics::UNDERWRITING_PROCESSOR_EXECUTE,
    topics::UNDERWRITING_PROCESSOR_CONSOLIDATION,
    topics::UNDERWRITING_EXECUTION_ACTIVATE,
    topics::UNDERWRITING_EXECUTION_DISABLE,
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let db_config = DatabaseConfig::from_env();
    let broker_config = BrokerConfig::from_env();
    let execution_config = ExecutionConfig::from_env();

    tracing::info!(
        host = %db_config.host,
        database = %db_config.database,
        project_id = %broker_config.project_id,
        worker_pool_size = execution_config.worker_pool_size,
        "starting underwriting service"
    );

    let pool = uw_storage::pool::connect(&db_config).await?;
    sqlx::migrate!("../uw-storage/migrations").run(&pool).await?;

    let orchestrator = Arc::new(Orchestrator {
        underwriting_repo: Arc::new(PostgresUnderwritingRepository::new(pool.clone())),
        processor_repo: Arc::new(PostgresProcessorRepository::new(pool.clone())),
        execution_repo: Arc::new(PostgresExecutionRepository::new(pool.clone())),
        factor_repo: Arc::new(PostgresFactorRepository::new(pool.clone())),
        workflow_log: Arc::new(PostgresWorkflowLogRepository::new(pool.clone())),
        registry: Arc::new(Registry::from_constructors(uw_processors::ALL_PROCESSORS)),
        locks: Arc::new(UnderwritingLocks::new()),
        worker_pool_size: execution_config.worker_pool_size,
    });

    // `MemoryBroker` stands in until the `gcp` feature's `PubSubBroker` is
    // wired to real credentials; the subscriber loop below is identical
    // either way since both implement `Broker`.
    let broker: Arc<dyn uw_broker::Broker> = Arc::new(MemoryBroker::new());
    let subscriber = Arc::new(Subscriber::new(broker, orchestrator));

    run_poll_loop(subscriber).await;
    Ok(())
}

async fn run_poll_loop(subscriber: Arc<Subscriber>) {
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received, stopping poll loop");
                break;
            }
            _ = poll_all_topics(&subscriber) => {}
        }
    }
}

async fn poll_all_topics(subscriber: &Subscriber) {
    for topic in WORKFLOW_TOPICS {
        subscriber.poll_once(topic).await;
    }
    tokio::time::sleep(POLL_INTERVAL).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
