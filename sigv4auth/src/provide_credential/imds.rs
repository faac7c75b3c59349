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

use crate::{constants::*, Credential};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{Method, StatusCode};
use log::debug;
use serde::Deserialize;
use sigv4auth_core::time::{now, parse_rfc3339, DateTime};
use sigv4auth_core::{Context, Error, ProvideCredential, Result};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "http://169.254.169.254";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
// 21600s (6h) is recommended by AWS.
const TOKEN_TTL_SECONDS: i64 = 21600;

/// IMDSv2CredentialProvider loads the credentials of the role attached to
/// the EC2 instance from the instance metadata service.
///
/// - `AWS_EC2_METADATA_DISABLED=true` turns it off.
/// - `AWS_EC2_METADATA_SERVICE_ENDPOINT` overrides the endpoint.
///
/// Every call to the metadata service is bounded by a short timeout, off EC2
/// the link-local address usually doesn't answer at all.
#[derive(Debug, Clone)]
pub struct IMDSv2CredentialProvider {
    endpoint: Option<String>,
    timeout: Duration,
    token: Arc<Mutex<(String, DateTime)>>,
}

impl Default for IMDSv2CredentialProvider {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: DEFAULT_TIMEOUT,
            token: Arc::new(Mutex::new((String::new(), DateTime::default()))),
        }
    }
}

impl IMDSv2CredentialProvider {
    /// Create a new `IMDSv2CredentialProvider` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint for the metadata service.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the timeout for metadata requests.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn get_endpoint(&self, ctx: &Context) -> String {
        self.endpoint
            .clone()
            .or_else(|| ctx.env_var_non_empty(AWS_EC2_METADATA_SERVICE_ENDPOINT))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    async fn send(
        &self,
        ctx: &Context,
        operation: &str,
        req: http::Request<Bytes>,
    ) -> Result<String> {
        let resp = tokio::time::timeout(self.timeout, ctx.http_send_as_string(req))
            .await
            .map_err(|_| {
                Error::unexpected(format!("IMDS {operation} timed out"))
                    .with_context(format!("timeout: {:?}", self.timeout))
                    .with_context("hint: check if running on EC2 instance")
            })?
            .map_err(|e| {
                Error::unexpected(format!("failed to send IMDS {operation} request"))
                    .with_source(e)
                    .with_context("hint: check if running on EC2 instance")
            })?;

        if resp.status() != StatusCode::OK {
            return Err(Error::unexpected(format!(
                "IMDS {operation} failed with status {}",
                resp.status()
            ))
            .with_context(format!("response: {}", resp.body())));
        }
        Ok(resp.into_body())
    }

    async fn load_ec2_metadata_token(&self, ctx: &Context) -> Result<String> {
        {
            let (token, expires_in) = self
                .token
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if expires_in > now() {
                return Ok(token);
            }
        }

        let url = format!("{}/latest/api/token", self.get_endpoint(ctx));
        let req = http::Request::builder()
            .uri(&url)
            .method(Method::PUT)
            .header(CONTENT_LENGTH, "0")
            .header(
                "x-aws-ec2-metadata-token-ttl-seconds",
                TOKEN_TTL_SECONDS.to_string(),
            )
            .body(Bytes::new())
            .map_err(|e| {
                Error::request_invalid("failed to build IMDS token request")
                    .with_source(e)
                    .with_context(format!("url: {url}"))
            })?;

        let ec2_token = self.send(ctx, "token", req).await?;
        // Re-read the token 10 minutes before it expires.
        let expires_in = now() + chrono::TimeDelta::seconds(TOKEN_TTL_SECONDS - 600);

        *self.token.lock().unwrap_or_else(PoisonError::into_inner) =
            (ec2_token.clone(), expires_in);

        Ok(ec2_token)
    }
}

#[async_trait]
impl ProvideCredential for IMDSv2CredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        if ctx
            .env_var(AWS_EC2_METADATA_DISABLED)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            debug!("IMDS is disabled by {AWS_EC2_METADATA_DISABLED}");
            return Ok(None);
        }

        let token = self.load_ec2_metadata_token(ctx).await?;

        // List all credentials that node has.
        let url = format!(
            "{}/latest/meta-data/iam/security-credentials/",
            self.get_endpoint(ctx)
        );
        let req = http::Request::builder()
            .uri(&url)
            .method(Method::GET)
            .header("x-aws-ec2-metadata-token", &token)
            .body(Bytes::new())
            .map_err(|e| {
                Error::request_invalid("failed to build IMDS credentials list request")
                    .with_source(e)
                    .with_context(format!("url: {url}"))
            })?;
        let profile_name = self.send(ctx, "list_instance_profiles", req).await?;
        let Some(profile_name) = profile_name.lines().map(str::trim).find(|v| !v.is_empty())
        else {
            return Err(Error::config_invalid("no IAM role attached to EC2 instance")
                .with_context("hint: attach an IAM role to your EC2 instance"));
        };

        // Get the credentials via role_name.
        let url = format!(
            "{}/latest/meta-data/iam/security-credentials/{profile_name}",
            self.get_endpoint(ctx)
        );
        let req = http::Request::builder()
            .uri(&url)
            .method(Method::GET)
            .header("x-aws-ec2-metadata-token", &token)
            .body(Bytes::new())
            .map_err(|e| {
                Error::request_invalid("failed to build IMDS credentials fetch request")
                    .with_source(e)
                    .with_context(format!("profile: {profile_name}"))
            })?;
        let content = self
            .send(ctx, "fetch_credentials", req)
            .await
            .map_err(|e| e.with_context(format!("profile: {profile_name}")))?;

        let resp: Ec2MetadataIamSecurityCredentials =
            serde_json::from_str(&content).map_err(|e| {
                Error::unexpected("failed to parse IMDS credentials response")
                    .with_source(e)
                    .with_context(format!("response_length: {}", content.len()))
                    .with_context(format!("profile: {profile_name}"))
            })?;

        match resp.code.as_str() {
            "Success" => {}
            "AssumeRoleUnauthorizedAccess" => {
                return Err(Error::credential_denied(format!(
                    "EC2 instance not authorized to assume role: {}",
                    resp.message
                ))
                .with_context(format!("profile: {profile_name}"))
                .with_context("hint: check if the IAM role has a trust relationship with EC2"));
            }
            code if code.contains("Expired") => {
                return Err(Error::credential_expired(format!(
                    "IMDS credentials expired: {}",
                    resp.message
                ))
                .with_context(format!("profile: {profile_name}")));
            }
            code => {
                return Err(Error::unexpected(format!(
                    "IMDS returned error: [{code}] {}",
                    resp.message
                ))
                .with_context(format!("profile: {profile_name}")));
            }
        }

        let cred = Credential {
            access_key_id: resp.access_key_id,
            secret_access_key: resp.secret_access_key,
            session_token: Some(resp.token),
            expires_in: Some(parse_rfc3339(&resp.expiration).map_err(|e| {
                Error::unexpected("failed to parse IMDS credential expiration time")
                    .with_source(e)
                    .with_context(format!("expiration_value: {}", resp.expiration))
            })?),
        };

        Ok(Some(cred))
    }
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Ec2MetadataIamSecurityCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: String,
    expiration: String,

    code: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sigv4auth_core::{ErrorKind, HttpSend, StaticEnv};
    use std::collections::HashMap;

    #[derive(Debug, Clone, Default)]
    struct MockImds {
        role: &'static str,
        code: &'static str,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl MockImds {
        fn new(role: &'static str, code: &'static str) -> Self {
            Self {
                role,
                code,
                ..Default::default()
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpSend for MockImds {
        async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
            let path = req.uri().path().to_string();
            self.requests
                .lock()
                .unwrap()
                .push(format!("{} {}{}", req.method(), req.uri().authority().unwrap(), path));

            let body = if req.method() == Method::PUT && path == "/latest/api/token" {
                assert_eq!(
                    req.headers()["x-aws-ec2-metadata-token-ttl-seconds"],
                    "21600"
                );
                "imds-token".to_string()
            } else {
                assert_eq!(req.headers()["x-aws-ec2-metadata-token"], "imds-token");
                match path.strip_prefix("/latest/meta-data/iam/security-credentials/") {
                    Some("") => format!("{}\n", self.role),
                    Some(role) if role == self.role => format!(
                        r#"{{"Code":"{}","Message":"","LastUpdated":"2024-01-01T00:00:00Z","Type":"AWS-HMAC","AccessKeyId":"ASIAIMDSEXAMPLE","SecretAccessKey":"imds-secret","Token":"imds-session-token","Expiration":"2099-01-01T00:00:00Z"}}"#,
                        self.code
                    ),
                    _ => {
                        return Ok(http::Response::builder()
                            .status(StatusCode::NOT_FOUND)
                            .body(Bytes::from_static(b"not found"))
                            .unwrap())
                    }
                }
            };

            Ok(http::Response::new(Bytes::from(body)))
        }
    }

    fn context(imds: &MockImds, envs: &[(&str, &str)]) -> Context {
        Context::new().with_http_send(imds.clone()).with_env(StaticEnv {
            home_dir: None,
            envs: envs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        })
    }

    #[tokio::test]
    async fn test_imds_credential() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        let imds = MockImds::new("collector-role", "Success");
        let ctx = context(&imds, &[]);
        let provider = IMDSv2CredentialProvider::new();

        let cred = provider
            .provide_credential(&ctx)
            .await?
            .expect("credential must be loaded");
        assert_eq!(cred.access_key_id, "ASIAIMDSEXAMPLE");
        assert_eq!(cred.secret_access_key, "imds-secret");
        assert_eq!(cred.session_token.as_deref(), Some("imds-session-token"));
        assert_eq!(
            cred.expires_in,
            Some(parse_rfc3339("2099-01-01T00:00:00Z")?)
        );

        // The metadata token is reused by the next call.
        provider.provide_credential(&ctx).await?;
        assert_eq!(
            imds.requests(),
            vec![
                "PUT 169.254.169.254/latest/api/token",
                "GET 169.254.169.254/latest/meta-data/iam/security-credentials/",
                "GET 169.254.169.254/latest/meta-data/iam/security-credentials/collector-role",
                "GET 169.254.169.254/latest/meta-data/iam/security-credentials/",
                "GET 169.254.169.254/latest/meta-data/iam/security-credentials/collector-role",
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_imds_endpoint_from_env() -> anyhow::Result<()> {
        let imds = MockImds::new("collector-role", "Success");
        let ctx = context(
            &imds,
            &[(AWS_EC2_METADATA_SERVICE_ENDPOINT, "http://127.0.0.1:1338/")],
        );

        IMDSv2CredentialProvider::new()
            .provide_credential(&ctx)
            .await?
            .expect("credential must be loaded");
        assert_eq!(imds.requests()[0], "PUT 127.0.0.1:1338/latest/api/token");

        Ok(())
    }

    #[tokio::test]
    async fn test_imds_disabled() -> anyhow::Result<()> {
        let imds = MockImds::new("collector-role", "Success");
        let ctx = context(&imds, &[(AWS_EC2_METADATA_DISABLED, "true")]);

        let cred = IMDSv2CredentialProvider::new()
            .provide_credential(&ctx)
            .await?;
        assert!(cred.is_none());
        assert!(imds.requests().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_imds_error_code() {
        let imds = MockImds::new("collector-role", "AssumeRoleUnauthorizedAccess");
        let ctx = context(&imds, &[]);

        let err = IMDSv2CredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialDenied);
    }

    #[tokio::test]
    async fn test_imds_no_role() {
        let imds = MockImds::new("", "Success");
        let ctx = context(&imds, &[]);

        let err = IMDSv2CredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }
}
