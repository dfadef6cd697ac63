//! Transport selection from configuration.

use std::sync::Arc;

use tracing::{info, warn};

use crate::messaging::core::config::{MessagingConfig, TransportMode};
use crate::messaging::core::errors::MessagingResult;
use crate::messaging::store::fallback_store::LocalFallbackStore;
use crate::messaging::store::slot::{FileSlot, StorageSlot};
use crate::messaging::transport::MessageTransport;
use crate::messaging::transport::fallback::FallbackTransport;
use crate::messaging::transport::local::LocalTransport;
use crate::messaging::transport::remote::RemoteTransport;

/// Build the transport described by `config`, with a file-backed fallback store.
///
/// # Errors
/// Returns an error if the configuration is invalid or, in probe mode, the
/// remote API cannot be reached.
pub async fn build_transport(
    config: &MessagingConfig,
) -> MessagingResult<Arc<dyn MessageTransport>> {
    let slot = Arc::new(FileSlot::new(config.fallback.data_dir.clone()));
    build_transport_with_slot(config, slot).await
}

/// Build the transport described by `config` over an explicit storage slot.
///
/// # Errors
/// Same as [`build_transport`].
pub async fn build_transport_with_slot(
    config: &MessagingConfig,
    slot: Arc<dyn StorageSlot>,
) -> MessagingResult<Arc<dyn MessageTransport>> {
    config.validate()?;
    let local = || -> Arc<dyn MessageTransport> {
        Arc::new(LocalTransport::new(Arc::new(LocalFallbackStore::new(
            Arc::clone(&slot),
            &config.fallback,
        ))))
    };

    let transport: Arc<dyn MessageTransport> = match config.transport {
        TransportMode::Local => local(),
        TransportMode::Remote => Arc::new(RemoteTransport::new(&config.remote)?),
        TransportMode::Fallback => Arc::new(FallbackTransport::new(
            Arc::new(RemoteTransport::new(&config.remote)?),
            local(),
        )),
        TransportMode::Probe => {
            let remote = RemoteTransport::new(&config.remote)?;
            if remote.probe().await? {
                Arc::new(remote)
            } else {
                warn!(
                    base_url = %remote.base_url(),
                    "Messaging endpoints missing on remote API, using local store"
                );
                local()
            }
        }
    };

    info!(
        mode = config.transport.as_str(),
        transport = transport.name(),
        "Message transport ready"
    );
    Ok(transport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::core::config::TransportMode;
    use crate::messaging::store::slot::MemorySlot;

    #[tokio::test]
    async fn local_mode_builds_local_transport() {
        let config = MessagingConfig::new().with_transport(TransportMode::Local);
        let transport = build_transport_with_slot(&config, Arc::new(MemorySlot::new()))
            .await
            .unwrap();
        assert_eq!(transport.name(), "local");
    }

    #[tokio::test]
    async fn fallback_mode_builds_decorator() {
        let config = MessagingConfig::new().with_base_url("http://127.0.0.1:9/");
        let transport = build_transport_with_slot(&config, Arc::new(MemorySlot::new()))
            .await
            .unwrap();
        assert_eq!(transport.name(), "fallback");
    }

    #[tokio::test]
    async fn remote_mode_requires_base_url() {
        let config = MessagingConfig::new().with_transport(TransportMode::Remote);
        assert!(
            build_transport_with_slot(&config, Arc::new(MemorySlot::new()))
                .await
                .is_err()
        );
    }
}
