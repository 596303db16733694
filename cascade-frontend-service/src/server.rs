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

use cascade_frontend_service::bootstrap::Collaborators;
use cascade_frontend_service::clients::membership::StaticMembershipMonitor;
use cascade_frontend_service::clients::metadata::InMemoryMetadataStore;
use cascade_frontend_service::clients::replication_queue::InMemoryReplicationQueue;
use cascade_frontend_service::clients::unconnected::{
    UnconnectedHistoryArchiver, UnconnectedHistoryClient, UnconnectedMatchingClient,
    UnconnectedVisibilityArchiver, UnconnectedVisibilityManager,
};
use cascade_frontend_service::config::make_config_loader;
use cascade_frontend_service::service::access_control::NoopAuthorizer;
use cascade_frontend_service::FrontendService;
use cascade_common::model::HostInfo;
use cascade_common::SafeDisplay;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

fn main() -> Result<(), anyhow::Error> {
    match make_config_loader().load_or_dump_config() {
        Some(config) => {
            cascade_common::tracing::init_tracing(&config.tracing);
            info!("Frontend service configuration:\n{}", config.to_safe_string());

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(async_main(config))
        }
        None => Ok(()),
    }
}

async fn async_main(
    config: cascade_frontend_service::config::FrontendServiceConfig,
) -> Result<(), anyhow::Error> {
    let prometheus_registry = prometheus::default_registry().clone();

    // standalone wiring: the domain surface is fully functional against the
    // in-process metadata store, the other tiers answer "unavailable" until
    // their clients are configured
    warn!("Running with standalone backends; history, matching and visibility are not connected");
    let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    let collaborators = Collaborators {
        metadata_store: Arc::new(InMemoryMetadataStore::new()),
        history_client: Arc::new(UnconnectedHistoryClient),
        matching_client: Arc::new(UnconnectedMatchingClient),
        visibility: Arc::new(UnconnectedVisibilityManager),
        history_archiver: Arc::new(UnconnectedHistoryArchiver),
        visibility_archiver: Arc::new(UnconnectedVisibilityArchiver),
        replication_queue: Arc::new(InMemoryReplicationQueue::new()),
        membership: Arc::new(StaticMembershipMonitor::new(HostInfo {
            identity: format!("{hostname}:{}", config.http_port),
        })),
        remote_frontends: HashMap::new(),
        authorizer: Arc::new(NoopAuthorizer),
    };

    let service = FrontendService::new(config, prometheus_registry, collaborators).await?;

    let mut join_set = JoinSet::new();
    service.run(&mut join_set).await?;

    tokio::signal::ctrl_c().await?;
    service.stop().await;

    while let Some(result) = join_set.join_next().await {
        result??;
    }
    Ok(())
}
