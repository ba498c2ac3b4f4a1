use aws_sdk_secretsmanager::{Client, error::DisplayErrorContext};
use log::info;

use super::store::{SecretStore, SecretStoreError};
use crate::aws::AwsContext;

/// Stores secrets in AWS Secrets Manager under `<prefix>/<key>`.
///
/// A write updates the current secret value, creating the secret the first
/// time a key is seen.
pub struct SecretsManagerStore {
    aws: AwsContext,
    client: Client,
    prefix: String,
}

impl SecretsManagerStore {
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

    pub fn secret_name(&self, key: &str) -> String {
        secret_name(&self.prefix, key)
    }

    fn create(&self, name: &str, value: &str) -> Result<(), SecretStoreError> {
        self.aws
            .block_on(
                self.client
                    .create_secret()
                    .name(name)
                    .secret_string(value)
                    .send(),
            )
            .map(|_| ())
            .map_err(|err| {
                SecretStoreError::Store(format!(
                    "secret-manager-store: unable to create secret: {}",
                    DisplayErrorContext(&err)
                ))
            })
    }
}

pub(crate) fn secret_name(prefix: &str, key: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}/{key}")
    }
}

impl SecretStore for SecretsManagerStore {
    fn store(&self, key: &str, value: &str) -> Result<(), SecretStoreError> {
        let name = self.secret_name(key);
        let result = self.aws.block_on(
            self.client
                .put_secret_value()
                .secret_id(&name)
                .secret_string(value)
                .send(),
        );

        match result {
            Ok(_) => {}
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_resource_not_found_exception() {
                    self.create(&name, value)?;
                } else {
                    return Err(SecretStoreError::Store(format!(
                        "secret-manager-store: unable to put secret value: {}",
                        DisplayErrorContext(&service_err)
                    )));
                }
            }
        }

        info!("[{key}] secret-manager-store: private key written to '{name}'");
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<String, SecretStoreError> {
        let name = self.secret_name(key);
        let output = self
            .aws
            .block_on(self.client.get_secret_value().secret_id(&name).send())
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_resource_not_found_exception() {
                    SecretStoreError::NotFound(name.clone())
                } else {
                    SecretStoreError::Store(format!(
                        "secret-manager-store: unable to get secret value: {}",
                        DisplayErrorContext(&service_err)
                    ))
                }
            })?;

        output
            .secret_string()
            .map(str::to_string)
            .ok_or(SecretStoreError::NotFound(name))
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_secretsmanager::{
        operation::{
            create_secret::CreateSecretOutput,
            put_secret_value::{PutSecretValueError, PutSecretValueOutput},
        },
        types::error::ResourceNotFoundException,
    };
    use aws_smithy_mocks::{RuleMode, mock, mock_client};

    use super::*;

    fn store_with(client: Client, rt: &tokio::runtime::Runtime) -> SecretsManagerStore {
        SecretsManagerStore::with_client(&AwsContext::detached(rt.handle().clone()), client, "certpilot")
    }

    #[test]
    fn updates_existing_secret() {
        let put = mock!(aws_sdk_secretsmanager::Client::put_secret_value)
            .match_requests(|req| {
                req.secret_id() == Some("certpilot/a.example.com") && req.secret_string() == Some("pem")
            })
            .then_output(|| PutSecretValueOutput::builder().build());
        let client = mock_client!(aws_sdk_secretsmanager, RuleMode::MatchAny, [&put]);
        let rt = tokio::runtime::Runtime::new().unwrap();

        store_with(client, &rt).store("a.example.com", "pem").unwrap();
        assert_eq!(put.num_calls(), 1);
    }

    #[test]
    fn creates_secret_on_first_write() {
        let put = mock!(aws_sdk_secretsmanager::Client::put_secret_value).then_error(|| {
            PutSecretValueError::ResourceNotFoundException(ResourceNotFoundException::builder().build())
        });
        let create = mock!(aws_sdk_secretsmanager::Client::create_secret)
            .match_requests(|req| {
                req.name() == Some("certpilot/a.example.com") && req.secret_string() == Some("pem")
            })
            .then_output(|| CreateSecretOutput::builder().build());
        let client = mock_client!(aws_sdk_secretsmanager, RuleMode::MatchAny, [&put, &create]);
        let rt = tokio::runtime::Runtime::new().unwrap();

        store_with(client, &rt).store("a.example.com", "pem").unwrap();
        assert_eq!(put.num_calls(), 1);
        assert_eq!(create.num_calls(), 1);
    }

    #[test]
    fn joins_prefix_and_key() {
        assert_eq!(secret_name("/certpilot/", "a.example.com"), "certpilot/a.example.com");
        assert_eq!(secret_name("", "a.example.com"), "a.example.com");
    }
}
