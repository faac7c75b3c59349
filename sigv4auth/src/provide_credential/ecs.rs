// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::constants::{
    AWS_CONTAINER_AUTHORIZATION_TOKEN, AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE,
    AWS_CONTAINER_CREDENTIALS_FULL_URI, AWS_CONTAINER_CREDENTIALS_RELATIVE_URI,
};
use crate::Credential;
use async_trait::async_trait;
use bytes::Bytes;
use http::header::AUTHORIZATION;
use http::{HeaderValue, Method, StatusCode};
use log::debug;
use serde::Deserialize;
use sigv4auth_core::time::parse_rfc3339;
use sigv4auth_core::{Context, Error, ProvideCredential, Result};
use std::time::Duration;

const ECS_ENDPOINT: &str = "http://169.254.170.2";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// EcsCredentialProvider loads credentials from the container credentials
/// endpoint of ECS tasks and EKS Pod Identity.
///
/// - `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI` is resolved against `http://169.254.170.2`.
/// - `AWS_CONTAINER_CREDENTIALS_FULL_URI` is used as is, the relative one wins if both are set.
/// - `AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE` or `AWS_CONTAINER_AUTHORIZATION_TOKEN`
///   is sent as `Authorization`, the file wins.
///
/// References:
/// - [IAM roles for tasks](https://docs.aws.amazon.com/AmazonECS/latest/developerguide/task-iam-roles.html)
#[derive(Debug, Clone)]
pub struct EcsCredentialProvider {
    timeout: Duration,
}

impl Default for EcsCredentialProvider {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl EcsCredentialProvider {
    /// Create a new `EcsCredentialProvider` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout for the credentials request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn authorization(&self, ctx: &Context) -> Result<Option<String>> {
        if let Some(path) = ctx.env_var_non_empty(AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE) {
            let token = ctx.file_read_as_string(&path).await.map_err(|e| {
                Error::config_invalid("failed to read container authorization token file")
                    .with_source(e)
                    .with_context(format!("token_file: {path}"))
            })?;
            return Ok(Some(token.trim().to_string()));
        }

        Ok(ctx.env_var_non_empty(AWS_CONTAINER_AUTHORIZATION_TOKEN))
    }
}

#[async_trait]
impl ProvideCredential for EcsCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let url = match (
            ctx.env_var_non_empty(AWS_CONTAINER_CREDENTIALS_RELATIVE_URI),
            ctx.env_var_non_empty(AWS_CONTAINER_CREDENTIALS_FULL_URI),
        ) {
            (Some(relative), _) => format!("{ECS_ENDPOINT}{relative}"),
            (None, Some(full)) => full,
            (None, None) => return Ok(None),
        };

        let mut req = http::Request::builder()
            .method(Method::GET)
            .uri(&url)
            .body(Bytes::new())
            .map_err(|e| {
                Error::config_invalid("invalid container credentials uri")
                    .with_source(e)
                    .with_context(format!("uri: {url}"))
            })?;
        if let Some(token) = self.authorization(ctx).await? {
            let mut value = HeaderValue::from_str(&token).map_err(|e| {
                Error::config_invalid("container authorization token is not a valid header value")
                    .with_source(e)
            })?;
            value.set_sensitive(true);
            req.headers_mut().insert(AUTHORIZATION, value);
        }

        debug!("loading container credentials from {url}");
        let resp = tokio::time::timeout(self.timeout, ctx.http_send_as_string(req))
            .await
            .map_err(|_| {
                Error::unexpected("container credentials request timed out")
                    .with_context(format!("timeout: {:?}", self.timeout))
                    .with_context(format!("uri: {url}"))
            })?
            .map_err(|e| {
                Error::unexpected("failed to send container credentials request")
                    .with_source(e)
                    .with_context(format!("uri: {url}"))
            })?;

        let status = resp.status();
        if status != StatusCode::OK {
            let err = Error::unexpected(format!(
                "container credentials request failed with status {status}"
            ))
            .with_context(format!("uri: {url}"))
            .with_context(format!("response: {}", resp.body()));
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    Error::credential_denied("container credentials request was rejected")
                        .with_source(err)
                }
                _ => err,
            });
        }

        let content = resp.into_body();
        let cred: EcsTaskCredentials = serde_json::from_str(&content).map_err(|e| {
            Error::unexpected("failed to parse container credentials response")
                .with_source(e)
                .with_context(format!("response_length: {}", content.len()))
        })?;

        Ok(Some(Credential {
            access_key_id: cred.access_key_id,
            secret_access_key: cred.secret_access_key,
            session_token: Some(cred.token).filter(|v| !v.is_empty()),
            expires_in: Some(parse_rfc3339(&cred.expiration).map_err(|e| {
                Error::unexpected("failed to parse container credential expiration")
                    .with_source(e)
                    .with_context(format!("expiration_value: {}", cred.expiration))
            })?),
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EcsTaskCredentials {
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    token: String,
    expiration: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sigv4auth_core::{ErrorKind, HttpSend, StaticEnv};
    use sigv4auth_file_read_tokio::TokioFileRead;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    const ECS_RESPONSE: &str = r#"{"RoleArn":"arn:aws:iam::123456789012:role/collector","AccessKeyId":"ASIAECSEXAMPLE","SecretAccessKey":"ecs-secret","Token":"ecs-session-token","Expiration":"2099-01-01T00:00:00Z"}"#;

    /// Captured (uri, authorization) of every request.
    type Captured = (String, Option<String>);

    #[derive(Debug, Clone)]
    struct MockEcs {
        status: StatusCode,
        requests: Arc<Mutex<Vec<Captured>>>,
    }

    impl MockEcs {
        fn new(status: StatusCode) -> Self {
            Self {
                status,
                requests: Arc::default(),
            }
        }

        fn requests(&self) -> Vec<Captured> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpSend for MockEcs {
        async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
            self.requests.lock().unwrap().push((
                req.uri().to_string(),
                req.headers()
                    .get(AUTHORIZATION)
                    .map(|v| v.to_str().unwrap().to_string()),
            ));

            Ok(http::Response::builder()
                .status(self.status)
                .body(Bytes::from_static(ECS_RESPONSE.as_bytes()))
                .unwrap())
        }
    }

    fn context(ecs: &MockEcs, envs: &[(&str, &str)]) -> Context {
        Context::new()
            .with_file_read(TokioFileRead)
            .with_http_send(ecs.clone())
            .with_env(StaticEnv {
                home_dir: None,
                envs: envs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<HashMap<_, _>>(),
            })
    }

    #[tokio::test]
    async fn test_ecs_relative_uri() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        let ecs = MockEcs::new(StatusCode::OK);
        let ctx = context(
            &ecs,
            &[
                (AWS_CONTAINER_CREDENTIALS_RELATIVE_URI, "/v2/credentials/task-1"),
                (AWS_CONTAINER_CREDENTIALS_FULL_URI, "http://127.0.0.1:8080/ignored"),
            ],
        );

        let cred = EcsCredentialProvider::new()
            .provide_credential(&ctx)
            .await?
            .expect("credential must be loaded");
        assert_eq!(cred.access_key_id, "ASIAECSEXAMPLE");
        assert_eq!(cred.secret_access_key, "ecs-secret");
        assert_eq!(cred.session_token.as_deref(), Some("ecs-session-token"));
        assert_eq!(cred.expires_in, Some(parse_rfc3339("2099-01-01T00:00:00Z")?));

        assert_eq!(
            ecs.requests(),
            vec![("http://169.254.170.2/v2/credentials/task-1".to_string(), None)]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_ecs_full_uri_with_token() -> anyhow::Result<()> {
        let ecs = MockEcs::new(StatusCode::OK);
        let ctx = context(
            &ecs,
            &[
                (
                    AWS_CONTAINER_CREDENTIALS_FULL_URI,
                    "http://169.254.170.23/v1/credentials",
                ),
                (AWS_CONTAINER_AUTHORIZATION_TOKEN, "static-token"),
            ],
        );

        EcsCredentialProvider::new()
            .provide_credential(&ctx)
            .await?
            .expect("credential must be loaded");
        assert_eq!(
            ecs.requests(),
            vec![(
                "http://169.254.170.23/v1/credentials".to_string(),
                Some("static-token".to_string())
            )]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_ecs_token_file_wins() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let token_file = dir.path().join("eks-pod-identity-token");
        std::fs::write(&token_file, "pod-identity-token\n")?;

        let ecs = MockEcs::new(StatusCode::OK);
        let ctx = context(
            &ecs,
            &[
                (
                    AWS_CONTAINER_CREDENTIALS_FULL_URI,
                    "http://169.254.170.23/v1/credentials",
                ),
                (AWS_CONTAINER_AUTHORIZATION_TOKEN, "static-token"),
                (
                    AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE,
                    token_file.to_str().unwrap(),
                ),
            ],
        );

        EcsCredentialProvider::new()
            .provide_credential(&ctx)
            .await?
            .expect("credential must be loaded");
        assert_eq!(
            ecs.requests()[0].1.as_deref(),
            Some("pod-identity-token")
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_ecs_not_configured() -> anyhow::Result<()> {
        let ecs = MockEcs::new(StatusCode::OK);
        let ctx = context(&ecs, &[]);

        let cred = EcsCredentialProvider::new().provide_credential(&ctx).await?;
        assert!(cred.is_none());
        assert!(ecs.requests().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_ecs_rejected() {
        let ecs = MockEcs::new(StatusCode::FORBIDDEN);
        let ctx = context(
            &ecs,
            &[(AWS_CONTAINER_CREDENTIALS_RELATIVE_URI, "/v2/credentials/task-1")],
        );

        let err = EcsCredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialDenied);
    }

    #[tokio::test]
    async fn test_ecs_server_error() {
        let ecs = MockEcs::new(StatusCode::INTERNAL_SERVER_ERROR);
        let ctx = context(
            &ecs,
            &[(AWS_CONTAINER_CREDENTIALS_RELATIVE_URI, "/v2/credentials/task-1")],
        );

        let err = EcsCredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert!(err
            .context()
            .contains(&"uri: http://169.254.170.2/v2/credentials/task-1".to_string()));
    }
}
