//! AWS Systems Manager Parameter Store backend.
//!
//! Values are written as `SecureString` parameters and read with
//! decryption. The SDK is asynchronous, so each store drives its own
//! current-thread runtime and blocks on every call.

use std::sync::Arc;

use aws_config::{BehaviorVersion, ConfigLoader, Region};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_ssm::Client;
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::operation::get_parameter::GetParameterError;
use aws_sdk_ssm::types::ParameterType;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use super::{SecretStore, StoreError, StoreFactory};

/// Parameter Store client bound to one region.
#[derive(Debug, Clone)]
pub struct SsmParameterStore {
    client: Client,
    runtime: Arc<Runtime>,
}

impl SsmParameterStore {
    /// Loads the default AWS credential chain for `region`.
    ///
    /// # Errors
    ///
    /// As [`SsmParameterStore::connect_with`].
    pub fn connect(region: &str) -> Result<Self, StoreError> {
        Self::connect_with(region, aws_config::defaults(BehaviorVersion::latest()))
    }

    /// Builds a client from `loader` and resolves credentials immediately.
    ///
    /// Credentials are fetched here rather than on the first parameter call
    /// so a missing or expired identity is reported before the cluster is
    /// bootstrapped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connect`] when the runtime cannot start, no
    /// credentials provider is configured, or the provider yields no
    /// credentials.
    pub fn connect_with(region: &str, loader: ConfigLoader) -> Result<Self, StoreError> {
        let connect_failure = |message: String| StoreError::Connect {
            region: region.to_owned(),
            message,
        };
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| connect_failure(error.to_string()))?;
        let config = runtime.block_on(loader.region(Region::new(region.to_owned())).load());
        let provider = config
            .credentials_provider()
            .ok_or_else(|| connect_failure(String::from("no AWS credentials provider configured")))?;
        runtime
            .block_on(provider.provide_credentials())
            .map_err(|error| connect_failure(DisplayErrorContext(&error).to_string()))?;
        debug!(target: "nostrap::store", region, "parameter store client ready");
        Ok(Self {
            client: Client::new(&config),
            runtime: Arc::new(runtime),
        })
    }
}

impl SecretStore for SsmParameterStore {
    fn put_secure(&self, path: &str, value: &str) -> Result<(), StoreError> {
        let request = self
            .client
            .put_parameter()
            .name(path)
            .value(value)
            .r#type(ParameterType::SecureString)
            .overwrite(true)
            .send();
        self.runtime
            .block_on(request)
            .map_err(|error| StoreError::Backend {
                path: path.to_owned(),
                message: DisplayErrorContext(&error).to_string(),
            })?;
        Ok(())
    }

    fn get_decrypted(&self, path: &str) -> Result<String, StoreError> {
        let request = self
            .client
            .get_parameter()
            .name(path)
            .with_decryption(true)
            .send();
        let output = self.runtime.block_on(request).map_err(|error| {
            error.as_service_error().map_or_else(
                || StoreError::Backend {
                    path: path.to_owned(),
                    message: DisplayErrorContext(&error).to_string(),
                },
                |service| lookup_failure(path, service),
            )
        })?;
        output
            .parameter()
            .and_then(|parameter| parameter.value())
            .map(str::to_owned)
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_owned(),
            })
    }
}

fn lookup_failure(path: &str, error: &GetParameterError) -> StoreError {
    if error.is_parameter_not_found() {
        StoreError::NotFound {
            path: path.to_owned(),
        }
    } else {
        StoreError::Backend {
            path: path.to_owned(),
            message: DisplayErrorContext(error).to_string(),
        }
    }
}

/// Factory connecting a fresh [`SsmParameterStore`] per region.
#[derive(Debug, Default, Clone, Copy)]
pub struct SsmStoreFactory;

impl StoreFactory for SsmStoreFactory {
    fn connect(&self, region: &str) -> Result<Box<dyn SecretStore>, StoreError> {
        Ok(Box::new(SsmParameterStore::connect(region)?))
    }
}
