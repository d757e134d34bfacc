//! switchyard demo server.
//!
//! Loads an optional TOML config, registers a small people directory plus
//! error pages and a filter, and serves until Ctrl+C.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clap::Parser;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use switchyard::config::load_config;
use switchyard::config::watcher::ConfigWatcher;
use switchyard::lifecycle::{shutdown_on_ctrl_c, Shutdown};
use switchyard::observability::{init_logging, init_metrics};
use switchyard::{Flow, HttpServer, MethodArbiter, RegistrationError, Router, ServerConfig};

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "Demo server for the switchyard router", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file; watched for changes.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Person {
    #[serde(default)]
    id: u64,
    name: String,
    age: u32,
}

#[derive(Default)]
struct People {
    next_id: AtomicU64,
    by_id: DashMap<u64, Person>,
}

impl People {
    fn insert(&self, mut person: Person) -> Person {
        person.id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.by_id.insert(person.id, person.clone());
        person
    }
}

fn register_demo_routes(router: &Router) -> Result<(), RegistrationError> {
    let people = Arc::new(People::default());
    for (name, age) in [("John", 20), ("Mary", 26), ("Jack", 45), ("Adam", 53)] {
        people.insert(Person {
            id: 0,
            name: name.to_string(),
            age,
        });
    }

    router.on(MethodArbiter::GET, "/hello", |ex| {
        ex.send("Hello!")?;
        Ok(())
    })?;

    router.on(MethodArbiter::GET, "/error", |_| {
        Err("this route always fails".into())
    })?;

    let all = Arc::clone(&people);
    router.register("/people", MethodArbiter::GET, Some("application/json"), move |ex| {
        let mut list: Vec<Person> = all.by_id.iter().map(|p| p.value().clone()).collect();
        list.sort_by_key(|p| p.id);
        ex.send(&list)?;
        Ok(())
    })?;

    let one = Arc::clone(&people);
    router.register("/people/:id", MethodArbiter::GET, Some("application/json"), move |ex| {
        let person = ex
            .param("id")
            .and_then(|id| id.parse::<u64>().ok())
            .and_then(|id| one.by_id.get(&id).map(|p| p.value().clone()));
        ex.send_opt(person.as_ref())?;
        Ok(())
    })?;

    let add = Arc::clone(&people);
    router.register("/people", MethodArbiter::POST, Some("application/json"), move |ex| {
        let person: Person = ex.receive()?;
        let stored = add.insert(person);
        ex.set_status(axum::http::StatusCode::CREATED);
        ex.send(&stored)?;
        Ok(())
    })?;

    router.register_filter("/people", |ex| {
        tracing::info!(method = %ex.method(), "People directory accessed");
        Ok(Flow::Continue)
    })?;

    router.on(MethodArbiter::any_method(), "/errors/page400", |ex| {
        ex.send("Page not found")?;
        Ok(())
    })?;
    router.on(MethodArbiter::any_method(), "/errors/page500", |ex| {
        ex.send("Internal Error")?;
        Ok(())
    })?;
    router.register_error_page_range(400, 499, "/errors/page400")?;
    router.register_error_page_range(500, 599, "/errors/page500")?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    init_logging(&config.observability.log_level);
    tracing::info!("switchyard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        codec = ?config.routing.codec,
        error_pages = config.error_pages.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let router = Arc::new(Router::from_config(&config)?);
    register_demo_routes(&router)?;
    tracing::debug!(routes = %router.dispatcher().tree_summary(), "Routes registered");

    // Keep the watcher handle alive for the lifetime of the server.
    let (config_updates, _watcher) = match &cli.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (rx, Some(watcher.run()?))
        }
        None => (mpsc::unbounded_channel().1, None),
    };

    let shutdown = Arc::new(Shutdown::new());
    tokio::spawn(shutdown_on_ctrl_c(Arc::clone(&shutdown)));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(&config, router);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
