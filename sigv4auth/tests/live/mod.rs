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

use anyhow::Result;
use log::warn;
use sigv4auth::{Config, Sigv4Auth};
use sigv4auth_core::{empty_body, full_body, Context, OsEnv, RoundTrip};
use sigv4auth_file_read_tokio::TokioFileRead;
use sigv4auth_http_send_reqwest::{ReqwestHttpSend, ReqwestRoundTrip};
use std::env;
use std::sync::Arc;

async fn init_extension() -> Option<(Sigv4Auth, String)> {
    let _ = env_logger::builder().is_test(true).try_init();
    let _ = dotenv::dotenv();

    if env::var("SIGV4AUTH_TEST").ok().as_deref() != Some("on") {
        return None;
    }

    let ctx = Context::new()
        .with_file_read(TokioFileRead)
        .with_http_send(ReqwestHttpSend::default())
        .with_env(OsEnv);

    let mut config = Config {
        region: env::var("SIGV4AUTH_REGION").expect("env SIGV4AUTH_REGION must set"),
        service: env::var("SIGV4AUTH_SERVICE").expect("env SIGV4AUTH_SERVICE must set"),
        ..Default::default()
    };
    if let Ok(arn) = env::var("SIGV4AUTH_ROLE_ARN") {
        config.assume_role.arn = arn;
    }

    let ext = Sigv4Auth::new(config, ctx)
        .await
        .expect("credentials must be resolved");
    let url = env::var("SIGV4AUTH_URL").expect("env SIGV4AUTH_URL must set");

    Some((ext, url))
}

#[tokio::test]
async fn test_signed_get() -> Result<()> {
    let Some((ext, url)) = init_extension().await else {
        warn!("SIGV4AUTH_TEST is not set, skipped");
        return Ok(());
    };

    let rt = ext.round_tripper(Arc::new(ReqwestRoundTrip::default()))?;

    let req = http::Request::get(&url).body(empty_body())?;
    let resp = rt.round_trip(req).await?;

    assert_ne!(
        resp.status(),
        http::StatusCode::FORBIDDEN,
        "signature rejected: {}",
        String::from_utf8_lossy(resp.body())
    );
    assert!(resp.status().is_success(), "status: {}", resp.status());

    Ok(())
}

#[tokio::test]
async fn test_signed_post_with_body() -> Result<()> {
    let Some((ext, url)) = init_extension().await else {
        warn!("SIGV4AUTH_TEST is not set, skipped");
        return Ok(());
    };

    let rt = ext.round_tripper(Arc::new(ReqwestRoundTrip::default()))?;

    let req = http::Request::post(&url)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(full_body("query=up"))?;
    let resp = rt.round_trip(req).await?;

    assert_ne!(
        resp.status(),
        http::StatusCode::FORBIDDEN,
        "signature rejected: {}",
        String::from_utf8_lossy(resp.body())
    );

    Ok(())
}
