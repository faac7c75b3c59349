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

//! Reqwest backed transports for sigv4auth.
//!
//! - [`ReqwestHttpSend`] implements [`HttpSend`], used by credential
//!   providers that talk to STS or the instance metadata service.
//! - [`ReqwestRoundTrip`] implements [`RoundTrip`], the base transport a
//!   signing round tripper delegates user requests to.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sigv4auth_core::Context;
//! use sigv4auth_http_send_reqwest::{ReqwestHttpSend, ReqwestRoundTrip};
//!
//! let client = reqwest::Client::new();
//! let ctx = Context::new().with_http_send(ReqwestHttpSend::new(client.clone()));
//! let base = Arc::new(ReqwestRoundTrip::new(client));
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::BodyExt;
use reqwest::{Client, Request};
use sigv4auth_core::{collect_body, Body, Error, HttpSend, Result, RoundTrip};

/// [`HttpSend`] on top of a [`reqwest::Client`].
#[derive(Debug, Default, Clone)]
pub struct ReqwestHttpSend {
    client: Client,
}

impl ReqwestHttpSend {
    /// Create a new ReqwestHttpSend with a reqwest::Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSend for ReqwestHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        execute(&self.client, req).await
    }
}

/// [`RoundTrip`] on top of a [`reqwest::Client`].
///
/// The request body is buffered before it's handed to reqwest.
#[derive(Debug, Default, Clone)]
pub struct ReqwestRoundTrip {
    client: Client,
}

impl ReqwestRoundTrip {
    /// Create a new ReqwestRoundTrip with a reqwest::Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RoundTrip for ReqwestRoundTrip {
    async fn round_trip(&self, req: http::Request<Body>) -> Result<http::Response<Bytes>> {
        let (parts, body) = req.into_parts();
        let bs = collect_body(body).await?;
        execute(&self.client, http::Request::from_parts(parts, bs)).await
    }
}

async fn execute(client: &Client, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
    let uri = req.uri().to_string();
    log::debug!("sending {} {uri}", req.method());

    let req = Request::try_from(req).map_err(|e| {
        Error::request_invalid("failed to convert request for reqwest")
            .with_source(e)
            .with_context(format!("uri: {uri}"))
    })?;
    let resp: http::Response<_> = client
        .execute(req)
        .await
        .map_err(|e| {
            Error::unexpected("failed to send http request")
                .with_source(e)
                .with_context(format!("uri: {uri}"))
        })?
        .into();

    let (parts, body) = resp.into_parts();
    let bs = BodyExt::collect(body)
        .await
        .map(|buf| buf.to_bytes())
        .map_err(|e| {
            Error::unexpected("failed to read http response body")
                .with_source(e)
                .with_context(format!("uri: {uri}"))
        })?;
    Ok(http::Response::from_parts(parts, bs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigv4auth_core::{full_body, ErrorKind};

    #[tokio::test]
    async fn test_round_trip_relative_uri() {
        let rt = ReqwestRoundTrip::default();
        let req = http::Request::builder()
            .uri("/relative/path")
            .body(full_body("Hello,World!"))
            .unwrap();

        let err = rt.round_trip(req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequestInvalid);
    }

    #[tokio::test]
    async fn test_http_send_unreachable() {
        let send = ReqwestHttpSend::default();
        let req = http::Request::builder()
            .uri("http://127.0.0.1:1/")
            .body(Bytes::new())
            .unwrap();

        let err = send.http_send(req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert!(err.context()[0].contains("127.0.0.1:1"));
    }
}
