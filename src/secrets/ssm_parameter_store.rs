use aws_sdk_ssm::{Client, error::DisplayErrorContext, types::ParameterType};
use log::info;

use super::store::{SecretStore, SecretStoreError};
use crate::aws::AwsContext;

/// Stores secrets as `SecureString` parameters named `<prefix>/<key>`.
pub struct SsmParameterStore {
    aws: AwsContext,
    client: Client,
    prefix: String,
}

impl SsmParameterStore {
    pub fn new(aws: &AwsContext, prefix: impl Into<String>) -> Self {
        Self::with_client(aws, Client::new(aws.config()), prefix)
    }

    pub fn with_client(aws: &AwsContext, client: Client, prefix: impl Into<String>) -> Self {
        Self {
            aws: aws.clone(),
            client,
            prefix: prefix.into(),
        }
    }

    pub fn parameter_name(&self, key: &str) -> String {
        parameter_name(&self.prefix, key)
    }
}

pub(crate) fn parameter_name(prefix: &str, key: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        format!("/{key}")
    } else if prefix.starts_with('/') {
        format!("{prefix}/{key}")
    } else {
        format!("/{prefix}/{key}")
    }
}

impl SecretStore for SsmParameterStore {
    fn store(&self, key: &str, value: &str) -> Result<(), SecretStoreError> {
        let name = self.parameter_name(key);
        self.aws
            .block_on(
                self.client
                    .put_parameter()
                    .name(&name)
                    .value(value)
                    .r#type(ParameterType::SecureString)
                    .overwrite(true)
                    .send(),
            )
            .map_err(|err| {
                SecretStoreError::Store(format!(
                    "ssm-parameter-store: unable to put secret value: {}",
                    DisplayErrorContext(&err)
                ))
            })?;

        info!("[{key}] ssm-parameter-store: private key written to '{name}'");
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<String, SecretStoreError> {
        let name = self.parameter_name(key);
        let output = self
            .aws
            .block_on(
                self.client
                    .get_parameter()
                    .name(&name)
                    .with_decryption(true)
                    .send(),
            )
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_parameter_not_found() {
                    SecretStoreError::NotFound(name.clone())
                } else {
                    SecretStoreError::Store(format!(
                        "ssm-parameter-store: unable to get secret value: {}",
                        DisplayErrorContext(&service_err)
                    ))
                }
            })?;

        output
            .parameter()
            .and_then(|parameter| parameter.value())
            .map(str::to_string)
            .ok_or(SecretStoreError::NotFound(name))
    }
}
