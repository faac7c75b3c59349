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

use crate::constants::DEFAULT_ROLE_SESSION_NAME;
use crate::provide_credential::utils::{parse_sts_error, sts_endpoint, GLOBAL_STS_REGION};
use crate::{Credential, RequestSigner};
use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use log::debug;
use quick_xml::de;
use serde::Deserialize;
use sigv4auth_core::hash::EMPTY_STRING_SHA256;
use sigv4auth_core::time::{now, parse_rfc3339};
use sigv4auth_core::{Context, Error, ProvideCredential, Result};
use std::sync::Arc;

/// AssumeRoleCredentialProvider exchanges the credentials of a base provider
/// for a temporary session of another role through STS `AssumeRole`.
///
/// Calls to STS are signed with service `sts`. The returned credential
/// carries its expiration, wrap the provider in
/// [`CachedCredentialProvider`](sigv4auth_core::CachedCredentialProvider)
/// to reuse the session until it's about to expire.
#[derive(Debug, Clone)]
pub struct AssumeRoleCredentialProvider {
    role_arn: String,
    role_session_name: String,
    duration_seconds: u32,
    region: String,

    base_provider: Arc<dyn ProvideCredential<Credential = Credential>>,
}

impl AssumeRoleCredentialProvider {
    /// Create a new assume role provider on top of the given base provider.
    pub fn new(
        role_arn: impl Into<String>,
        base_provider: Arc<dyn ProvideCredential<Credential = Credential>>,
    ) -> Self {
        Self {
            role_arn: role_arn.into(),
            role_session_name: DEFAULT_ROLE_SESSION_NAME.to_string(),
            duration_seconds: 3600,
            region: String::new(),
            base_provider,
        }
    }

    /// Set the role session name.
    pub fn with_role_session_name(mut self, name: impl Into<String>) -> Self {
        self.role_session_name = name.into();
        self
    }

    /// Set the duration in seconds.
    pub fn with_duration_seconds(mut self, seconds: u32) -> Self {
        self.duration_seconds = seconds;
        self
    }

    /// Set the STS region, the global endpoint is used if it's empty.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }
}

#[async_trait]
impl ProvideCredential for AssumeRoleCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let base_cred = self
            .base_provider
            .provide_credential(ctx)
            .await
            .map_err(|e| e.with_context(format!("role_arn: {}", self.role_arn)))?
            .ok_or_else(|| {
                Error::credential_retrieval("no base credentials available to assume role")
                    .with_context(format!("role_arn: {}", self.role_arn))
            })?;

        let endpoint = sts_endpoint(&self.region);
        let signing_region = if self.region.is_empty() {
            GLOBAL_STS_REGION
        } else {
            self.region.as_str()
        };

        // Construct request to AWS STS Service.
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("Action", "AssumeRole")
            .append_pair("RoleArn", &self.role_arn)
            .append_pair("RoleSessionName", &self.role_session_name)
            .append_pair("Version", "2011-06-15")
            .append_pair("DurationSeconds", &self.duration_seconds.to_string())
            .finish();
        let url = format!("https://{endpoint}/?{query}");

        let req = http::Request::builder()
            .method(Method::GET)
            .uri(&url)
            .body(Bytes::new())
            .map_err(|e| {
                Error::request_invalid("failed to build STS AssumeRole request")
                    .with_source(e)
                    .with_context(format!("role_arn: {}", self.role_arn))
            })?;

        let (mut parts, body) = req.into_parts();
        RequestSigner::new("sts", signing_region).sign(
            &mut parts,
            EMPTY_STRING_SHA256,
            &base_cred,
            now(),
        )?;
        let req = http::Request::from_parts(parts, body);

        debug!("assuming role {} via {endpoint}", self.role_arn);
        let resp = ctx.http_send_as_string(req).await.map_err(|e| {
            Error::unexpected("failed to send AssumeRole request to STS")
                .with_source(e)
                .with_context(format!("role_arn: {}", self.role_arn))
                .with_context(format!("endpoint: https://{endpoint}"))
        })?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(parse_sts_error("AssumeRole", status, resp.body())
                .with_context(format!("role_arn: {}", self.role_arn))
                .with_context(format!("session_name: {}", self.role_session_name)));
        }

        let body = resp.into_body();
        let resp: AssumeRoleResponse = de::from_str(&body).map_err(|e| {
            Error::unexpected("failed to parse STS AssumeRole response")
                .with_source(e)
                .with_context(format!("response_length: {}", body.len()))
                .with_context(format!("role_arn: {}", self.role_arn))
        })?;
        let resp_cred = resp.result.credentials;

        let cred = Credential {
            access_key_id: resp_cred.access_key_id.trim().to_string(),
            secret_access_key: resp_cred.secret_access_key.trim().to_string(),
            session_token: Some(resp_cred.session_token.trim().to_string()),
            expires_in: Some(parse_rfc3339(&resp_cred.expiration).map_err(|e| {
                Error::unexpected("failed to parse AssumeRole credential expiration")
                    .with_source(e)
                    .with_context(format!("expiration_value: {}", resp_cred.expiration))
                    .with_context(format!("role_arn: {}", self.role_arn))
            })?),
        };

        Ok(Some(cred))
    }
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct AssumeRoleResponse {
    #[serde(rename = "AssumeRoleResult")]
    result: AssumeRoleResult,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct AssumeRoleResult {
    credentials: AssumeRoleCredentials,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct AssumeRoleCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: String,
}
