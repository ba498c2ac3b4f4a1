use aws_sdk_sns::{Client, error::DisplayErrorContext};
use log::info;

use super::{Notifier, NotifyError};
use crate::aws::AwsContext;

/// Publishes notifications to an SNS topic ARN.
pub struct SnsNotifier {
    aws: AwsContext,
    client: Client,
}

impl SnsNotifier {
    pub fn new(aws: &AwsContext) -> Self {
        Self {
            client: Client::new(aws.config()),
            aws: aws.clone(),
        }
    }
}

impl Notifier for SnsNotifier {
    fn notify(&self, topic: &str, message: &str) -> Result<(), NotifyError> {
        let output = self
            .aws
            .block_on(
                self.client
                    .publish()
                    .topic_arn(topic)
                    .message(message)
                    .send(),
            )
            .map_err(|err| NotifyError::Publish(format!("sns: {}", DisplayErrorContext(&err))))?;

        info!(
            "[sns] notification published to '{topic}' (message id {})",
            output.message_id().unwrap_or("unknown")
        );
        Ok(())
    }
}
