//! S3-compatible object storage: upload, download, delete and list by prefix.

use crate::error::AppError;
use crate::schema::validators::validate_filename;
use crate::settings::S3Settings;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

pub struct S3Provider {
    client: Client,
    settings: S3Settings,
}

fn storage_error<E: std::error::Error>(action: &str, key: &str, err: E) -> AppError {
    let msg = format!("{} {:?} failed: {}", action, key, DisplayErrorContext(&err));
    tracing::error!(error = %msg, "s3 request failed");
    AppError::Storage(msg)
}

impl S3Provider {
    /// Build a client from settings. Credentials come from the settings, not the environment chain.
    pub async fn connect(settings: S3Settings) -> Self {
        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "weblite-settings",
        );
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::standard().with_max_attempts(settings.max_attempts))
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(settings.connect_timeout)
                    .read_timeout(settings.read_timeout)
                    .build(),
            )
            .load()
            .await;
        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(settings.path_style);
        if let Some(url) = &settings.endpoint_url {
            builder = builder.endpoint_url(url);
        }
        tracing::info!(bucket = %settings.bucket, region = %settings.region, "s3 client ready");
        S3Provider {
            client: Client::from_conf(builder.build()),
            settings,
        }
    }

    pub fn from_client(client: Client, settings: S3Settings) -> Self {
        S3Provider { client, settings }
    }

    pub fn settings(&self) -> &S3Settings {
        &self.settings
    }

    pub async fn upload_file(&self, filename: &str, data: Vec<u8>) -> Result<(), AppError> {
        validate_filename(filename)?;
        if data.is_empty() {
            return Err(AppError::validation("data is required"));
        }
        self.client
            .put_object()
            .bucket(&self.settings.bucket)
            .key(filename)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| storage_error("upload", filename, e))?;
        tracing::debug!(key = filename, "uploaded object");
        Ok(())
    }

    pub async fn get_file(&self, filename: &str) -> Result<Vec<u8>, AppError> {
        validate_filename(filename)?;
        let resp = self
            .client
            .get_object()
            .bucket(&self.settings.bucket)
            .key(filename)
            .send()
            .await
            .map_err(|e| storage_error("get", filename, e))?;
        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| storage_error("read", filename, e))?;
        Ok(body.into_bytes().to_vec())
    }

    pub async fn delete_file(&self, filename: &str) -> Result<(), AppError> {
        validate_filename(filename)?;
        self.client
            .delete_object()
            .bucket(&self.settings.bucket)
            .key(filename)
            .send()
            .await
            .map_err(|e| storage_error("delete", filename, e))?;
        tracing::debug!(key = filename, "deleted object");
        Ok(())
    }

    /// Keys under `prefix`, across all result pages.
    pub async fn get_files_list(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.settings.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();
        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| storage_error("list", prefix, e))?;
            keys.extend(page.contents().iter().filter_map(|o| o.key().map(str::to_string)));
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;

    fn settings() -> S3Settings {
        S3Settings {
            bucket: "files".into(),
            access_key: "key".into(),
            secret_key: "secret".into(),
            region: "us-east-1".into(),
            endpoint_url: Some("http://127.0.0.1:9".into()),
            path_style: true,
            max_attempts: 1,
            connect_timeout: Duration::from_millis(100),
            read_timeout: Duration::from_millis(100),
        }
    }

    fn provider() -> S3Provider {
        let conf = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("key", "secret", None, None, "test"))
            .endpoint_url("http://127.0.0.1:9")
            .force_path_style(true)
            .build();
        S3Provider::from_client(Client::from_conf(conf), settings())
    }

    #[tokio::test]
    async fn empty_filename_is_rejected_before_any_request() {
        let p = provider();
        assert_matches!(p.upload_file("", b"data".to_vec()).await, Err(AppError::Validation(_)));
        assert_matches!(p.get_file("").await, Err(AppError::Validation(_)));
        assert_matches!(p.delete_file("").await, Err(AppError::Validation(_)));
    }

    #[tokio::test]
    async fn upload_requires_data() {
        let p = provider();
        assert_matches!(
            p.upload_file("docs/a.txt", Vec::new()).await,
            Err(AppError::Validation(m)) if m.contains("data")
        );
    }

    #[tokio::test]
    async fn provider_keeps_settings() {
        assert_eq!(provider().settings().bucket, "files");
    }

    mod mocked {
        use super::settings;
        use crate::provider::S3Provider;
        use aws_sdk_s3::operation::delete_object::DeleteObjectOutput;
        use aws_sdk_s3::operation::get_object::GetObjectOutput;
        use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
        use aws_sdk_s3::operation::put_object::PutObjectOutput;
        use aws_sdk_s3::primitives::ByteStream;
        use aws_sdk_s3::types::Object;
        use aws_sdk_s3::Client;
        use aws_smithy_mocks::{mock, mock_client, RuleMode};

        #[tokio::test]
        async fn upload_puts_body_under_key() {
            let put = mock!(Client::put_object)
                .match_requests(|req| {
                    req.bucket() == Some("files")
                        && req.key() == Some("docs/a.txt")
                        && req.body().bytes() == Some(b"DATA".as_slice())
                })
                .then_output(|| PutObjectOutput::builder().build());
            let p = S3Provider::from_client(mock_client!(aws_sdk_s3, [&put]), settings());
            p.upload_file("docs/a.txt", b"DATA".to_vec()).await.unwrap();
            assert_eq!(put.num_calls(), 1);
        }

        #[tokio::test]
        async fn get_returns_object_bytes() {
            let get = mock!(Client::get_object)
                .match_requests(|req| {
                    req.bucket() == Some("files") && req.key() == Some("file.bin")
                })
                .then_output(|| {
                    GetObjectOutput::builder()
                        .body(ByteStream::from_static(b"hello"))
                        .build()
                });
            let p = S3Provider::from_client(mock_client!(aws_sdk_s3, [&get]), settings());
            assert_eq!(p.get_file("file.bin").await.unwrap(), b"hello");
            assert_eq!(get.num_calls(), 1);
        }

        #[tokio::test]
        async fn delete_targets_key() {
            let delete = mock!(Client::delete_object)
                .match_requests(|req| {
                    req.bucket() == Some("files") && req.key() == Some("to_remove.txt")
                })
                .then_output(|| DeleteObjectOutput::builder().build());
            let p = S3Provider::from_client(mock_client!(aws_sdk_s3, [&delete]), settings());
            p.delete_file("to_remove.txt").await.unwrap();
            assert_eq!(delete.num_calls(), 1);
        }

        #[tokio::test]
        async fn list_merges_keys_across_pages() {
            let first = mock!(Client::list_objects_v2)
                .match_requests(|req| {
                    req.bucket() == Some("files")
                        && req.prefix() == Some("x/")
                        && req.continuation_token().is_none()
                })
                .then_output(|| {
                    ListObjectsV2Output::builder()
                        .contents(Object::builder().key("x/a.txt").build())
                        .contents(Object::builder().key("x/b.txt").build())
                        .is_truncated(true)
                        .next_continuation_token("page-2")
                        .build()
                });
            let second = mock!(Client::list_objects_v2)
                .match_requests(|req| req.continuation_token() == Some("page-2"))
                .then_output(|| {
                    ListObjectsV2Output::builder()
                        .contents(Object::builder().key("x/c.txt").build())
                        .is_truncated(false)
                        .build()
                });
            let client = mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&first, &second]);
            let p = S3Provider::from_client(client, settings());
            let keys = p.get_files_list("x/").await.unwrap();
            assert_eq!(keys, ["x/a.txt", "x/b.txt", "x/c.txt"]);
            assert_eq!(first.num_calls(), 1);
            assert_eq!(second.num_calls(), 1);
        }

        #[tokio::test]
        async fn sdk_failure_is_a_storage_error() {
            let get = mock!(Client::get_object).then_error(|| {
                aws_sdk_s3::operation::get_object::GetObjectError::NoSuchKey(
                    aws_sdk_s3::types::error::NoSuchKey::builder().build(),
                )
            });
            let p = S3Provider::from_client(mock_client!(aws_sdk_s3, [&get]), settings());
            assert_matches::assert_matches!(
                p.get_file("missing.bin").await,
                Err(crate::error::AppError::Storage(msg)) if msg.contains("missing.bin")
            );
        }
    }
}
