// Copyright 2024-2025 Golem Cloud
//
// Licensed under the Golem Source License v1.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://license.golem.cloud/LICENSE
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod api;
pub mod bootstrap;
pub mod clients;
pub mod config;
pub mod dynamic_config;
pub mod model;
pub mod service;
pub mod testing;

use crate::bootstrap::{Collaborators, Services};
use crate::config::FrontendServiceConfig;
use crate::service::HealthState;
use anyhow::{anyhow, Context};
use poem::endpoint::PrometheusExporter;
use poem::listener::{Acceptor, Listener};
use poem::middleware::Cors;
use poem::EndpointExt;
use poem::Route;
use prometheus::Registry;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument};

#[cfg(test)]
test_r::enable!();

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct RunDetails {
    pub http_port: u16,
}

/// The frontend process: the stateless API tier of a Cascade cluster. Owns
/// the HTTP surface, the composed service stack, the background domain cache
/// refresh and failover watcher, and the warmup/drain lifecycle.
pub struct FrontendService {
    config: FrontendServiceConfig,
    prometheus_registry: Registry,
    services: Services,
    shutdown: CancellationToken,
}

impl FrontendService {
    pub async fn new(
        config: FrontendServiceConfig,
        prometheus_registry: Registry,
        collaborators: Collaborators,
    ) -> Result<Self, anyhow::Error> {
        let services = Services::new(&config, collaborators);

        services
            .domain_cache
            .refresh()
            .await
            .map_err(|err| anyhow!(err).context("Initial domain cache refresh"))?;

        Ok(Self {
            config,
            prometheus_registry,
            services,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub async fn run(
        &self,
        join_set: &mut JoinSet<Result<(), anyhow::Error>>,
    ) -> Result<RunDetails, anyhow::Error> {
        let http_port = self.start_http_server(join_set).await?;
        self.start_background_tasks();
        self.start_warmup();

        info!("Started frontend service on port: http: {}", http_port);

        Ok(RunDetails { http_port })
    }

    /// Four-phase drain: flip the health probe, let peers notice and stop
    /// routing, then reject what still arrives, then let in-flight calls
    /// finish before stopping the subcomponents.
    pub async fn stop(&self) {
        info!("Stopping frontend service");
        self.services
            .lifecycle
            .set_health(HealthState::ShuttingDown);
        tokio::time::sleep(self.config.lifecycle.failure_detection_interval).await;

        self.services.lifecycle.start_rejecting();
        tokio::time::sleep(self.config.lifecycle.drain_interval).await;

        self.shutdown.cancel();
        info!("Frontend service stopped");
    }

    fn start_background_tasks(&self) {
        self.services.domain_cache.spawn_refresh_loop(
            self.config.lifecycle.domain_cache_refresh_interval,
            self.shutdown.clone(),
        );
        self.services.domain_service.spawn_failover_watcher(
            self.config.lifecycle.failover_watcher_interval,
            self.config.lifecycle.failover_watcher_jitter,
            self.shutdown.clone(),
        );
    }

    /// Load balancers keep traffic away until the warmup window has passed.
    fn start_warmup(&self) {
        let lifecycle = self.services.lifecycle.clone();
        let warmup = self.config.lifecycle.warmup_interval;
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(warmup) => {
                    if lifecycle.health() == HealthState::Warming {
                        lifecycle.set_health(HealthState::Serving);
                        info!("Warmup finished, serving traffic");
                    }
                }
            }
        });
    }

    async fn start_http_server(
        &self,
        join_set: &mut JoinSet<Result<(), anyhow::Error>>,
    ) -> Result<u16, anyhow::Error> {
        let api_service = api::make_open_api_service(
            self.services.workflow_service.clone(),
            self.services.admin_service.clone(),
            self.services.lifecycle.clone(),
            self.config.timeouts.clone(),
        );

        let ui = api_service.swagger_ui();
        let spec = api_service.spec_endpoint_yaml();
        let metrics = PrometheusExporter::new(self.prometheus_registry.clone());

        let cors = Cors::new()
            .allow_origin_regex(&self.config.cors_origin_regex)
            .allow_credentials(true);

        let app = Route::new()
            .nest("/", api_service)
            .nest("/docs", ui)
            .nest("/specs", spec)
            .nest("/metrics", metrics)
            .with(cors);

        let poem_listener =
            poem::listener::TcpListener::bind(format!("0.0.0.0:{}", self.config.http_port));
        let acceptor = poem_listener
            .into_acceptor()
            .await
            .context("Binding HTTP listener")?;
        let port = acceptor.local_addr()[0]
            .as_socket_addr()
            .expect("socket address")
            .port();

        let shutdown = self.shutdown.clone();
        join_set.spawn(
            async move {
                poem::Server::new_with_acceptor(acceptor)
                    .run_with_graceful_shutdown(app, shutdown.cancelled_owned(), None)
                    .await
                    .map_err(|e| e.into())
            }
            .in_current_span(),
        );

        Ok(port)
    }
}
