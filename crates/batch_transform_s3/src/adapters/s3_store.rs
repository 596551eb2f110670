use std::future::Future;

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use batch_transform_core::{KeyPage, ObjectStore, StorageError};
use tokio::runtime::Handle;

/// [`ObjectStore`] backed by Amazon S3.
///
/// Worker threads are plain OS threads, so every SDK future is driven to
/// completion on the runtime behind `runtime`. Callers must not invoke this
/// store from inside that runtime's own worker threads.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    runtime: Handle,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, runtime: Handle) -> Self {
        Self { client, runtime }
    }

    /// Loads credentials and region from the default AWS provider chain.
    pub fn connect(runtime: &Handle) -> Self {
        let config = runtime.block_on(aws_config::load_defaults(
            aws_config::BehaviorVersion::latest(),
        ));
        Self::new(aws_sdk_s3::Client::new(&config), runtime.clone())
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// A truncated page must carry a token; otherwise the rest of the bucket
/// would be skipped without notice.
fn next_page_token(
    container: &str,
    is_truncated: Option<bool>,
    token: Option<&str>,
) -> Result<Option<String>, StorageError> {
    match (is_truncated.unwrap_or(false), token) {
        (true, Some(token)) => Ok(Some(token.to_string())),
        (true, None) => Err(StorageError::list(
            container,
            "truncated listing without continuation token",
        )),
        (false, _) => Ok(None),
    }
}

impl ObjectStore for S3ObjectStore {
    fn list_page(
        &self,
        container: &str,
        prefix: Option<&str>,
        continuation: Option<&str>,
    ) -> Result<KeyPage, StorageError> {
        let output = self
            .block_on(
                self.client
                    .list_objects_v2()
                    .bucket(container)
                    .set_prefix(prefix.map(str::to_string))
                    .set_continuation_token(continuation.map(str::to_string))
                    .send(),
            )
            .map_err(|error| StorageError::list(container, DisplayErrorContext(&error).to_string()))?;

        let keys = output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect();
        let next_token = next_page_token(
            container,
            output.is_truncated(),
            output.next_continuation_token(),
        )?;

        Ok(KeyPage { keys, next_token })
    }

    fn read_object(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.block_on(async {
            let output = self
                .client
                .get_object()
                .bucket(container)
                .key(key)
                .send()
                .await
                .map_err(|error| {
                    StorageError::read(container, key, DisplayErrorContext(&error).to_string())
                })?;
            let body = output.body.collect().await.map_err(|error| {
                StorageError::read(container, key, format!("failed to read body: {error}"))
            })?;
            Ok(body.into_bytes().to_vec())
        })
    }

    fn write_object(
        &self,
        container: &str,
        key: &str,
        body: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        self.block_on(
            self.client
                .put_object()
                .bucket(container)
                .key(key)
                .set_content_type(content_type.map(str::to_string))
                .body(ByteStream::from(body.to_vec()))
                .send(),
        )
        .map(|_| ())
        .map_err(|error| StorageError::write(container, key, DisplayErrorContext(&error).to_string()))
    }
}
