// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{http::StatusCode, routing::get, Router};
use clap::Parser;
use deployment_manager::{
    config::ReconcilerConfig,
    constants::{
        CONTROLLER_NAME, DEFAULT_CONFIG_PATH, FACTORY_INSTALL_CONFIG_MAP,
        METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH, METRICS_SERVER_PORT,
        TOKIO_WORKER_THREADS,
    },
    context::Context,
    crd::{
        AddressPool, DataNetwork, Host, HostProfile, PlatformNetwork, PtpInstance, PtpInterface,
        System,
    },
    errors::ReconcileError,
    events::KubeEventPublisher,
    manager::{factory::factory_reconfig_allowed, Manager},
    metrics,
    platform::{install_crypto_provider, keystone::KeystoneConnector},
    reconcilers::{
        error_policy, reconcile_address_pool, reconcile_data_network, reconcile_host,
        reconcile_host_profile, reconcile_platform_network, reconcile_ptp_instance,
        reconcile_ptp_interface, reconcile_system, run_reconcile,
    },
    store::KubeObjectStore,
};
use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{
    runtime::{controller::Action, reflector::ObjectRef, watcher::Config, Controller},
    Api, Client, Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

/// StarlingX deployment manager
#[derive(Debug, Parser)]
#[command(name = "deployment-manager", version, about)]
struct Args {
    /// Reconciler configuration file
    #[arg(long, env = "MANAGER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Only watch resources in this namespace
    #[arg(long, env = "WATCH_NAMESPACE")]
    namespace: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("deployment-manager")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

fn init_logging() {
    // Respects RUST_LOG, defaulting to INFO, and RUST_LOG_FORMAT=json for structured output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(args: Args) -> Result<()> {
    init_logging();

    info!("Starting StarlingX Deployment Manager");
    debug!(config = %args.config.display(), namespace = ?args.namespace, "Command line parsed");

    let config = ReconcilerConfig::load(&args.config)?;

    if !install_crypto_provider() {
        debug!("rustls crypto provider already installed");
    }

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let store = Arc::new(KubeObjectStore::new(client.clone()));
    let connector = Arc::new(KeystoneConnector::new()?);
    let manager = Manager::new(store, connector);
    let events = Arc::new(KubeEventPublisher::new(client.clone(), CONTROLLER_NAME));
    let ctx = Context::new(manager, config, events);

    let watch = Watch {
        client,
        namespace: args.namespace,
        ctx,
    };

    info!("Starting all controllers");

    // Controllers should never exit - if one does, the process exits with it
    tokio::select! {
        result = run_metrics_server() => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("metrics server exited unexpectedly without error")
        }
        () = watch.run::<System, _, _>(reconcile_system) => {
            anyhow::bail!("System controller exited unexpectedly")
        }
        () = watch.run::<Host, _, _>(reconcile_host) => {
            anyhow::bail!("Host controller exited unexpectedly")
        }
        () = watch.run::<HostProfile, _, _>(reconcile_host_profile) => {
            anyhow::bail!("HostProfile controller exited unexpectedly")
        }
        () = watch.run::<PlatformNetwork, _, _>(reconcile_platform_network) => {
            anyhow::bail!("PlatformNetwork controller exited unexpectedly")
        }
        () = watch.run::<AddressPool, _, _>(reconcile_address_pool) => {
            anyhow::bail!("AddressPool controller exited unexpectedly")
        }
        () = watch.run::<DataNetwork, _, _>(reconcile_data_network) => {
            anyhow::bail!("DataNetwork controller exited unexpectedly")
        }
        () = watch.run::<PtpInstance, _, _>(reconcile_ptp_instance) => {
            anyhow::bail!("PtpInstance controller exited unexpectedly")
        }
        () = watch.run::<PtpInterface, _, _>(reconcile_ptp_interface) => {
            anyhow::bail!("PtpInterface controller exited unexpectedly")
        }
    }
}

/// Everything a controller needs to watch one kind.
struct Watch {
    client: Client,
    namespace: Option<String>,
    ctx: Arc<Context>,
}

impl Watch {
    fn api<K>(&self) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>,
    {
        match &self.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }

    /// Runs the controller for `K` until its watch stream ends.
    ///
    /// A `factory-install` config map entering factory mode re-queues every
    /// cached `K` in its namespace.
    async fn run<K, F, Fut>(&self, body: F)
    where
        K: Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + std::fmt::Debug
            + Send
            + Sync
            + 'static,
        F: Fn(Arc<K>, Arc<Context>) -> Fut + Copy + Send + Sync + 'static,
        Fut: Future<Output = Result<Action, ReconcileError>> + Send + 'static,
    {
        let kind = K::kind(&()).to_string();
        info!(kind = %kind, "Starting controller");

        let controller = Controller::new(self.api::<K>(), Config::default());
        let cache = controller.store();
        let watched = self.namespace.clone();

        controller
            .watches(
                self.api::<ConfigMap>(),
                Config::default().fields(&format!("metadata.name={FACTORY_INSTALL_CONFIG_MAP}")),
                move |config_map: ConfigMap| {
                    let namespace = watched
                        .clone()
                        .or_else(|| config_map.namespace())
                        .unwrap_or_default();
                    if !factory_reconfig_allowed(&namespace, &config_map) {
                        return Vec::new();
                    }
                    cache
                        .state()
                        .iter()
                        .filter(|object| object.namespace().as_deref() == Some(namespace.as_str()))
                        .map(|object| ObjectRef::from_obj(object.as_ref()))
                        .collect()
                },
            )
            .run(
                move |instance, ctx| run_reconcile(instance, ctx, body),
                error_policy::<K>,
                Arc::clone(&self.ctx),
            )
            .for_each(|_| futures::future::ready(()))
            .await;

        error!(kind = %kind, "CRITICAL: controller watch stream ended");
    }
}

async fn metrics_handler() -> (StatusCode, String) {
    match metrics::gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Serves the Prometheus registry until the listener fails.
async fn run_metrics_server() -> Result<()> {
    let address: SocketAddr =
        format!("{METRICS_SERVER_BIND_ADDRESS}:{METRICS_SERVER_PORT}").parse()?;
    let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));

    info!(%address, path = METRICS_SERVER_PATH, "Starting metrics server");
    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
