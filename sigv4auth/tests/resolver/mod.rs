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

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use pretty_assertions::assert_eq;
use sigv4auth::{Config, CredentialResolver, Sigv4Auth};
use sigv4auth_core::{
    Context, ErrorKind, HttpSend, NoopHttpSend, ProvideCredential, Result, StaticEnv,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/aps-writer";

const ASSUME_ROLE_RESPONSE: &str = r#"<AssumeRoleResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <AssumeRoleResult>
    <Credentials>
      <AccessKeyId>ASIASTSEXAMPLE</AccessKeyId>
      <SecretAccessKey>sts-secret</SecretAccessKey>
      <SessionToken>sts-session-token</SessionToken>
      <Expiration>2099-01-01T00:00:00Z</Expiration>
    </Credentials>
  </AssumeRoleResult>
</AssumeRoleResponse>"#;

const ACCESS_DENIED_RESPONSE: &str = r#"<ErrorResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <Error>
    <Type>Sender</Type>
    <Code>AccessDenied</Code>
    <Message>not authorized to perform: sts:AssumeRole</Message>
  </Error>
  <RequestId>c6104cbe-af31-11e0-8154-cbc7ccf896c7</RequestId>
</ErrorResponse>"#;

/// Fake STS recording the host of every call.
#[derive(Debug, Clone)]
struct MockSts {
    status: StatusCode,
    body: &'static str,
    hosts: Arc<Mutex<Vec<String>>>,
}

impl MockSts {
    fn new(status: StatusCode, body: &'static str) -> Self {
        Self {
            status,
            body,
            hosts: Arc::default(),
        }
    }

    fn hosts(&self) -> Vec<String> {
        self.hosts.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpSend for MockSts {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        self.hosts
            .lock()
            .unwrap()
            .push(req.uri().host().unwrap_or_default().to_string());

        Ok(http::Response::builder()
            .status(self.status)
            .body(Bytes::from_static(self.body.as_bytes()))
            .unwrap())
    }
}

fn context(http: impl HttpSend, envs: &[(&str, &str)]) -> Context {
    Context::new().with_http_send(http).with_env(StaticEnv {
        home_dir: None,
        envs: envs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
    })
}

fn config(arn: &str) -> Config {
    let mut cfg = Config {
        region: "us-west-2".to_string(),
        service: "aps".to_string(),
        ..Default::default()
    };
    cfg.assume_role.arn = arn.to_string();
    cfg
}

#[tokio::test]
async fn test_static_override_wins_over_assume_role() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let sts = MockSts::new(StatusCode::OK, ASSUME_ROLE_RESPONSE);
    let ctx = context(
        sts.clone(),
        &[
            ("CUSTOM_AWS_ACCESS_KEY", "AKIDCUSTOM"),
            ("CUSTOM_AWS_SECRET_ACCESS_KEY", "custom-secret"),
            ("AWS_ACCESS_KEY_ID", "AKIDENV"),
            ("AWS_SECRET_ACCESS_KEY", "env-secret"),
        ],
    );

    let provider = CredentialResolver::new(ctx.clone())
        .resolve(&config(ROLE_ARN))
        .await?;
    let cred = provider
        .provide_credential(&ctx)
        .await?
        .expect("credential must be returned");

    assert_eq!(cred.access_key_id, "AKIDCUSTOM");
    assert_eq!(cred.secret_access_key, "custom-secret");
    assert_eq!(cred.session_token, None);
    assert!(sts.hosts().is_empty(), "STS must not be called");

    Ok(())
}

#[tokio::test]
async fn test_assume_role_session_is_cached() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let sts = MockSts::new(StatusCode::OK, ASSUME_ROLE_RESPONSE);
    let ctx = context(
        sts.clone(),
        &[
            ("AWS_ACCESS_KEY_ID", "AKIDENV"),
            ("AWS_SECRET_ACCESS_KEY", "env-secret"),
        ],
    );

    let provider = CredentialResolver::new(ctx.clone())
        .resolve(&config(ROLE_ARN))
        .await?;
    for _ in 0..3 {
        let cred = provider
            .provide_credential(&ctx)
            .await?
            .expect("credential must be returned");
        assert_eq!(cred.access_key_id, "ASIASTSEXAMPLE");
        assert_eq!(cred.session_token.as_deref(), Some("sts-session-token"));
    }

    // One call for the eager retrieval, then served from cache.
    assert_eq!(sts.hosts(), vec!["sts.us-west-2.amazonaws.com"]);

    Ok(())
}

#[tokio::test]
async fn test_sts_region_overrides_region() -> anyhow::Result<()> {
    let sts = MockSts::new(StatusCode::OK, ASSUME_ROLE_RESPONSE);
    let ctx = context(
        sts.clone(),
        &[
            ("AWS_ACCESS_KEY_ID", "AKIDENV"),
            ("AWS_SECRET_ACCESS_KEY", "env-secret"),
        ],
    );

    let mut cfg = config(ROLE_ARN);
    cfg.assume_role.sts_region = "cn-north-1".to_string();
    Sigv4Auth::new(cfg, ctx).await?;

    assert_eq!(sts.hosts(), vec!["sts.cn-north-1.amazonaws.com.cn"]);

    Ok(())
}

#[tokio::test]
async fn test_no_credentials_fails_construction() {
    let _ = env_logger::builder().is_test(true).try_init();

    let ctx = context(NoopHttpSend, &[]);

    let err = Sigv4Auth::new(config(""), ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigResolution);
}

#[tokio::test]
async fn test_denied_assume_role_fails_construction() {
    let _ = env_logger::builder().is_test(true).try_init();

    let sts = MockSts::new(StatusCode::FORBIDDEN, ACCESS_DENIED_RESPONSE);
    let ctx = context(
        sts.clone(),
        &[
            ("AWS_ACCESS_KEY_ID", "AKIDENV"),
            ("AWS_SECRET_ACCESS_KEY", "env-secret"),
        ],
    );

    let err = Sigv4Auth::new(config(ROLE_ARN), ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigResolution);

    let source = std::error::Error::source(&err)
        .expect("source must be kept")
        .to_string();
    assert!(source.contains("AccessDenied"), "source: {source}");
    assert_eq!(sts.hosts().len(), 1);
}
