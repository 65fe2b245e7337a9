use axum::Router;
use flash_sale::access::{AccessControl, AccessRecords, ClusterAuthority};
use flash_sale::admission::{AdmissionClient, AdmissionController};
use flash_sale::config::{Config, Role};
use flash_sale::identity::{IdentityCookies, SignedIdentity};
use flash_sale::pipeline::{
    Broker, HttpBroker, InMemoryBroker, InMemoryStore, OrderConsumer, OrderProducer,
};
use flash_sale::purchase::PurchaseService;
use flash_sale::ring::{ClusterRing, HashRing, Node};
use flash_sale::server::{self, shutdown_signal};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const BROKER_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        // .with_max_level(tracing::Level::DEBUG)
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = Config::load()?;
    tracing::info!("Starting {:?} role", config.role);

    match config.role {
        Role::Node => run_node(&config).await,
        Role::Gate => run_gate(&config).await,
        Role::Broker => run_broker(&config).await,
        Role::Consumer => run_consumer(&config).await,
        Role::Standalone => run_standalone(&config).await,
        Role::Sign => print_cookies(&config),
    }
}

fn identity(config: &Config) -> anyhow::Result<Arc<SignedIdentity>> {
    let identity = SignedIdentity::new(config.signing_key()?, config.iv_mode)?;
    tracing::info!("Signed identity ready ({:?} IV)", config.iv_mode);
    Ok(Arc::new(identity))
}

fn access_control(config: &Config) -> Arc<AccessControl> {
    let ring = ClusterRing::new(HashRing::from_nodes(
        config.peers.iter().map(|p| Node::new(p.clone())),
        config.replicas,
    ));
    tracing::info!(
        "Hash ring: {:?} ({} replicas each), local node {}",
        config.peers,
        config.replicas,
        config.advertise
    );

    let records = Arc::new(AccessRecords::new(config.access_policy));
    AccessControl::new(
        Node::new(config.advertise.clone()),
        ring,
        Arc::new(ClusterAuthority::new(records, config.proxy_timeout)),
    )
}

async fn serve(config: &Config, app: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!("HTTP server listening on {}", config.bind);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn run_node(config: &Config) -> anyhow::Result<()> {
    let identity = identity(config)?;
    let access = access_control(config);

    tracing::info!("Gate at {}, broker at {}", config.gate_url, config.broker_url);
    let gate = Arc::new(AdmissionClient::remote(&config.gate_url, config.gate_timeout));
    let broker = Arc::new(HttpBroker::new(&config.broker_url, BROKER_REQUEST_TIMEOUT));
    let producer = OrderProducer::new(broker, &config.queue);
    let purchase = PurchaseService::new(access.clone(), gate, producer);

    serve(config, server::node_router(identity, access, purchase)).await
}

async fn run_gate(config: &Config) -> anyhow::Result<()> {
    let gate = AdmissionController::new(config.capacity, config.stride);
    tracing::info!(
        "Inventory gate: capacity {}, stride {}",
        config.capacity,
        config.stride
    );
    serve(config, server::gate_router(gate)).await
}

async fn run_broker(config: &Config) -> anyhow::Result<()> {
    let broker = InMemoryBroker::new(config.queue_settings());
    serve(config, server::broker_router(broker)).await
}

async fn run_consumer(config: &Config) -> anyhow::Result<()> {
    let store = InMemoryStore::with_products(config.products.clone());
    let broker: Arc<dyn Broker> = Arc::new(HttpBroker::new(&config.broker_url, BROKER_REQUEST_TIMEOUT));
    let consumer = OrderConsumer::new(broker, &config.queue, store.clone(), store.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = consumer.spawn(shutdown_rx);

    let served = serve(config, server::consumer_router(store)).await;

    let _ = shutdown_tx.send(true);
    worker.await?;
    served
}

async fn run_standalone(config: &Config) -> anyhow::Result<()> {
    let identity = identity(config)?;
    let access = access_control(config);

    let gate = AdmissionController::new(config.capacity, config.stride);
    let broker = InMemoryBroker::new(config.queue_settings());
    let store = InMemoryStore::with_products(config.products.clone());

    let producer = OrderProducer::new(broker.clone(), &config.queue);
    let purchase = PurchaseService::new(
        access.clone(),
        Arc::new(AdmissionClient::local(gate.clone())),
        producer,
    );
    let consumer = OrderConsumer::new(broker.clone(), &config.queue, store.clone(), store.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = consumer.spawn(shutdown_rx);

    let app = server::standalone_router(identity, access, purchase, gate, broker, store);
    let served = serve(config, app).await;

    let _ = shutdown_tx.send(true);
    worker.await?;
    served
}

fn print_cookies(config: &Config) -> anyhow::Result<()> {
    let uid = config
        .sign_uid
        .ok_or_else(|| anyhow::anyhow!("--uid <user id> is required for the sign role"))?;
    let identity = identity(config)?;
    let cookies = IdentityCookies::issue(&identity, uid);

    for value in cookies.set_cookie_headers() {
        println!("Set-Cookie: {}", value.to_str().unwrap_or_default());
    }
    println!("Cookie: {}", cookies.cookie_header());
    Ok(())
}
