//! Shared AWS configuration.
//!
//! The SDK configuration is loaded once at startup and handed to every
//! AWS-backed collaborator. Collaborator contracts are blocking, so each client
//! also keeps a handle to the runtime and drives its futures with
//! [`AwsContext::block_on`]. Callers must be on a blocking thread (the fan-out
//! runs every domain inside `spawn_blocking`).

use std::future::Future;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use log::info;
use tokio::runtime::Handle;

#[derive(Clone, Debug)]
pub struct AwsContext {
    config: SdkConfig,
    runtime: Handle,
}

impl AwsContext {
    /// Loads credentials and region from the default provider chain.
    pub async fn load(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let config = loader.load().await;
        info!(
            "[aws] loaded SDK configuration (region: {})",
            config
                .region()
                .map(|r| r.as_ref().to_string())
                .unwrap_or_else(|| "unset".to_string())
        );
        Self {
            config,
            runtime: Handle::current(),
        }
    }

    /// Context with empty SDK configuration, for clients built by hand.
    #[cfg(test)]
    pub(crate) fn detached(runtime: Handle) -> Self {
        Self {
            config: SdkConfig::builder()
                .behavior_version(BehaviorVersion::latest())
                .build(),
            runtime,
        }
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
