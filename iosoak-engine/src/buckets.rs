//! Bucket and object lifecycle helpers.

use std::fmt;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretBox};

use crate::command::{CommandRunner, ShellCommand, run_checked};
use crate::config::{ConfigSecret, WorkloadConfig};
use crate::error::SoakResult;

/// A type-erased [`BucketOps`] instance.
pub type BoxedBuckets = Box<dyn BucketOps>;

/// Creates and removes buckets and objects on the object store.
#[async_trait::async_trait]
pub trait BucketOps: fmt::Debug + Send + Sync + 'static {
    async fn create_bucket(&self, bucket: &str) -> SoakResult<()>;

    /// Deletes the bucket. With `force`, objects still in the bucket are deleted first.
    async fn delete_bucket(&self, bucket: &str, force: bool) -> SoakResult<()>;

    /// Deletes every object whose name starts with `prefix`.
    async fn delete_objects(&self, bucket: &str, prefix: &str) -> SoakResult<()>;
}

/// [`BucketOps`] backed by the `aws` command line interface.
#[derive(Debug)]
pub struct AwsCliBuckets {
    binary: String,
    endpoint: String,
    region: String,
    access_key: String,
    secret_key: SecretBox<ConfigSecret>,
    skip_ssl_verification: bool,
    runner: Arc<dyn CommandRunner>,
}

impl AwsCliBuckets {
    pub fn new(config: &WorkloadConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: config.aws_binary.clone(),
            endpoint: config.endpoint_url(),
            region: config.region.clone(),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
            skip_ssl_verification: config.skip_ssl_verification,
            runner,
        }
    }

    fn s3(&self, subcommand: &str) -> ShellCommand {
        // Credentials go through the environment, not the arguments.
        let command = ShellCommand::new(&self.binary)
            .env("AWS_ACCESS_KEY_ID", &self.access_key)
            .secret_env(
                "AWS_SECRET_ACCESS_KEY",
                self.secret_key.expose_secret().as_str(),
            )
            .arg("s3")
            .arg(subcommand)
            .arg("--endpoint-url")
            .arg(&self.endpoint)
            .arg("--region")
            .arg(&self.region);

        if self.skip_ssl_verification {
            command.arg("--no-verify-ssl")
        } else {
            command
        }
    }
}

#[async_trait::async_trait]
impl BucketOps for AwsCliBuckets {
    async fn create_bucket(&self, bucket: &str) -> SoakResult<()> {
        let command = self.s3("mb").arg(format_args!("s3://{bucket}"));
        run_checked(self.runner.as_ref(), &command).await?;
        tracing::info!(bucket, "Created bucket: {bucket}");
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str, force: bool) -> SoakResult<()> {
        let command = self.s3("rb").arg(format_args!("s3://{bucket}"));
        let command = if force { command.arg("--force") } else { command };
        run_checked(self.runner.as_ref(), &command).await?;
        tracing::info!(bucket, force, "Deleted bucket: {bucket}");
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, prefix: &str) -> SoakResult<()> {
        let command = self
            .s3("rm")
            .arg(format_args!("s3://{bucket}/"))
            .arg("--recursive")
            .arg("--exclude")
            .arg("*")
            .arg("--include")
            .arg(format_args!("{prefix}*"));
        run_checked(self.runner.as_ref(), &command).await?;
        tracing::info!(bucket, prefix, "Deleted objects with prefix {prefix}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crate::command::CommandOutput;

    use super::*;

    #[derive(Debug, Default)]
    struct Recorder(Mutex<Vec<ShellCommand>>);

    #[async_trait::async_trait]
    impl CommandRunner for Recorder {
        async fn run(&self, command: &ShellCommand) -> SoakResult<CommandOutput> {
            self.0.lock().unwrap().push(command.clone());
            Ok(CommandOutput {
                code: Some(0),
                output: String::new(),
            })
        }
    }

    fn buckets(recorder: &Arc<Recorder>) -> AwsCliBuckets {
        let config = WorkloadConfig {
            endpoint: "http://127.0.0.1:9000".into(),
            access_key: "AKIA".into(),
            secret_key: SecretBox::new(Box::new("s3cr3t".into())),
            ..Default::default()
        };
        AwsCliBuckets::new(&config, Arc::clone(recorder) as Arc<dyn CommandRunner>)
    }

    #[tokio::test]
    async fn issues_aws_commands() {
        let recorder = Arc::new(Recorder::default());
        let buckets = buckets(&recorder);

        buckets.create_bucket("b1").await.unwrap();
        buckets.delete_objects("b1", "s3mix_object_ops_iter").await.unwrap();
        buckets.delete_bucket("b1", true).await.unwrap();

        let commands = recorder.0.lock().unwrap();
        let scripts: Vec<_> = commands.iter().map(ShellCommand::script).collect();
        let base = "AWS_ACCESS_KEY_ID=AKIA AWS_SECRET_ACCESS_KEY=s3cr3t aws s3";
        let options = "--endpoint-url http://127.0.0.1:9000 --region us-east-1 --no-verify-ssl";
        assert_eq!(
            scripts,
            vec![
                format!("{base} mb {options} s3://b1"),
                format!(
                    "{base} rm {options} s3://b1/ --recursive --exclude '*' --include 's3mix_object_ops_iter*'"
                ),
                format!("{base} rb {options} s3://b1 --force"),
            ]
        );

        assert!(commands.iter().all(|c| !c.redacted().contains("s3cr3t")));
    }
}
