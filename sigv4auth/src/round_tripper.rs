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

use crate::resolve::CredentialsProvider;
use crate::sign_request::payload_hash;
use crate::RequestSigner;
use async_trait::async_trait;
use bytes::Bytes;
use http::header::USER_AGENT;
use http::{HeaderMap, HeaderValue};
use log::debug;
use sigv4auth_core::time::now;
use sigv4auth_core::{collect_body, full_body, Body, Context, Error, Result, RoundTrip};
use std::sync::Arc;

/// Product token appended to `User-Agent`.
const USER_AGENT_SUFFIX: &str = concat!("sigv4auth/", env!("CARGO_PKG_VERSION"));

/// SigningRoundTripper signs every request with SigV4 and hands it to the
/// base transport.
///
/// Each call buffers the body to hash it, fetches credentials from the shared
/// provider and signs at the current time. Nothing is kept between calls, so
/// it can be used from any number of tasks at once. Failures on the way
/// (unreadable body, no credentials) fail that request only and nothing is
/// sent. Responses and errors of the base transport are returned unchanged.
#[derive(Debug, Clone)]
pub struct SigningRoundTripper {
    base: Arc<dyn RoundTrip>,
    signer: RequestSigner,
    provider: CredentialsProvider,
    ctx: Context,
}

impl SigningRoundTripper {
    /// Wrap `base` so requests are signed by `signer` with credentials from `provider`.
    pub fn new(
        base: Arc<dyn RoundTrip>,
        signer: RequestSigner,
        provider: CredentialsProvider,
        ctx: Context,
    ) -> Self {
        Self {
            base,
            signer,
            provider,
            ctx,
        }
    }

    /// The signer used for every request.
    pub fn signer(&self) -> &RequestSigner {
        &self.signer
    }
}

#[async_trait]
impl RoundTrip for SigningRoundTripper {
    async fn round_trip(&self, req: http::Request<Body>) -> Result<http::Response<Bytes>> {
        let (mut parts, body) = req.into_parts();

        let body = collect_body(body).await?;
        let payload_hash = payload_hash(&body);
        let now = now();

        let cred = match self.provider.provide_credential(&self.ctx).await {
            Ok(Some(cred)) => cred,
            Ok(None) => {
                return Err(Error::credential_retrieval("no credentials available for signing")
                    .with_context(format!("uri: {}", parts.uri)))
            }
            Err(e) => {
                return Err(Error::credential_retrieval("failed to retrieve credentials")
                    .with_context(format!("uri: {}", parts.uri))
                    .with_source(e))
            }
        };

        self.signer.sign(&mut parts, &payload_hash, &cred, now)?;
        append_user_agent(&mut parts.headers);
        debug!("signed {} {} for {}", parts.method, parts.uri, self.signer.service());

        self.base
            .round_trip(http::Request::from_parts(parts, full_body(body)))
            .await
    }
}

fn append_user_agent(headers: &mut HeaderMap) {
    let value = match headers.get(USER_AGENT) {
        Some(existing) if !existing.is_empty() => {
            let mut bs = existing.as_bytes().to_vec();
            bs.push(b' ');
            bs.extend_from_slice(USER_AGENT_SUFFIX.as_bytes());
            // Both parts are valid header bytes.
            HeaderValue::from_bytes(&bs).unwrap_or_else(|_| HeaderValue::from_static(USER_AGENT_SUFFIX))
        }
        _ => HeaderValue::from_static(USER_AGENT_SUFFIX),
    };
    headers.insert(USER_AGENT, value);
}
