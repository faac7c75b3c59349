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
    AWS_DEFAULT_REGION, AWS_REGION, AWS_ROLE_ARN, AWS_ROLE_SESSION_NAME,
    AWS_WEB_IDENTITY_TOKEN_FILE, DEFAULT_ROLE_SESSION_NAME,
};
use crate::provide_credential::utils::{parse_sts_error, sts_endpoint};
use crate::Credential;
use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use log::debug;
use quick_xml::de;
use serde::Deserialize;
use sigv4auth_core::time::parse_rfc3339;
use sigv4auth_core::{Context, Error, ProvideCredential, Result};

/// AssumeRoleWithWebIdentityCredentialProvider exchanges an OIDC token file
/// for a role session through STS `AssumeRoleWithWebIdentity`.
///
/// This is how pods get credentials with EKS IAM roles for service accounts.
/// Without explicit settings it reads:
///
/// - `AWS_ROLE_ARN` and `AWS_WEB_IDENTITY_TOKEN_FILE`, both required
/// - `AWS_ROLE_SESSION_NAME`, defaults to `sigv4auth`
/// - `AWS_REGION` or `AWS_DEFAULT_REGION` for a regional STS endpoint
///
/// The call to STS is not signed, the token is the proof.
#[derive(Debug, Default, Clone)]
pub struct AssumeRoleWithWebIdentityCredentialProvider {
    role_arn: Option<String>,
    token_file: Option<String>,
    role_session_name: Option<String>,
    region: Option<String>,
}

impl AssumeRoleWithWebIdentityCredentialProvider {
    /// Create a provider that reads its settings from the environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the role ARN.
    pub fn with_role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.role_arn = Some(role_arn.into());
        self
    }

    /// Set the path of the web identity token file.
    pub fn with_web_identity_token_file(mut self, path: impl Into<String>) -> Self {
        self.token_file = Some(path.into());
        self
    }

    /// Set the role session name.
    pub fn with_role_session_name(mut self, name: impl Into<String>) -> Self {
        self.role_session_name = Some(name.into());
        self
    }

    /// Set the STS region, an empty region selects the global endpoint.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

#[async_trait]
impl ProvideCredential for AssumeRoleWithWebIdentityCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let role_arn = self
            .role_arn
            .clone()
            .or_else(|| ctx.env_var_non_empty(AWS_ROLE_ARN));
        let token_file = self
            .token_file
            .clone()
            .or_else(|| ctx.env_var_non_empty(AWS_WEB_IDENTITY_TOKEN_FILE));
        let (Some(role_arn), Some(token_file)) = (role_arn, token_file) else {
            return Ok(None);
        };

        let token = ctx.file_read_as_string(&token_file).await.map_err(|e| {
            Error::config_invalid("failed to read web identity token file")
                .with_source(e)
                .with_context(format!("token_file: {token_file}"))
        })?;

        let session_name = self
            .role_session_name
            .clone()
            .or_else(|| ctx.env_var_non_empty(AWS_ROLE_SESSION_NAME))
            .unwrap_or_else(|| DEFAULT_ROLE_SESSION_NAME.to_string());
        let region = self
            .region
            .clone()
            .or_else(|| ctx.env_var_non_empty(AWS_REGION))
            .or_else(|| ctx.env_var_non_empty(AWS_DEFAULT_REGION))
            .unwrap_or_default();
        let endpoint = sts_endpoint(&region);

        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("Action", "AssumeRoleWithWebIdentity")
            .append_pair("RoleArn", &role_arn)
            .append_pair("RoleSessionName", &session_name)
            .append_pair("WebIdentityToken", token.trim())
            .append_pair("Version", "2011-06-15")
            .finish();
        let req = http::Request::builder()
            .method(Method::GET)
            .uri(format!("https://{endpoint}/?{query}"))
            .body(Bytes::new())
            .map_err(|e| {
                Error::request_invalid("failed to build STS AssumeRoleWithWebIdentity request")
                    .with_source(e)
                    .with_context(format!("role_arn: {role_arn}"))
            })?;

        debug!("assuming role {role_arn} with web identity via {endpoint}");
        let resp = ctx.http_send_as_string(req).await.map_err(|e| {
            Error::unexpected("failed to send AssumeRoleWithWebIdentity request to STS")
                .with_source(e)
                .with_context(format!("role_arn: {role_arn}"))
                .with_context(format!("endpoint: https://{endpoint}"))
        })?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(
                parse_sts_error("AssumeRoleWithWebIdentity", status, resp.body())
                    .with_context(format!("role_arn: {role_arn}"))
                    .with_context(format!("token_file: {token_file}")),
            );
        }

        let body = resp.into_body();
        let resp: AssumeRoleWithWebIdentityResponse = de::from_str(&body).map_err(|e| {
            Error::unexpected("failed to parse STS AssumeRoleWithWebIdentity response")
                .with_source(e)
                .with_context(format!("response_length: {}", body.len()))
                .with_context(format!("role_arn: {role_arn}"))
        })?;
        let resp_cred = resp.result.credentials;

        Ok(Some(Credential {
            access_key_id: resp_cred.access_key_id.trim().to_string(),
            secret_access_key: resp_cred.secret_access_key.trim().to_string(),
            session_token: Some(resp_cred.session_token.trim().to_string()),
            expires_in: Some(parse_rfc3339(&resp_cred.expiration).map_err(|e| {
                Error::unexpected("failed to parse web identity credential expiration")
                    .with_source(e)
                    .with_context(format!("expiration_value: {}", resp_cred.expiration))
            })?),
        }))
    }
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct AssumeRoleWithWebIdentityResponse {
    #[serde(rename = "AssumeRoleWithWebIdentityResult")]
    result: AssumeRoleWithWebIdentityResult,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct AssumeRoleWithWebIdentityResult {
    credentials: AssumeRoleWithWebIdentityCredentials,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct AssumeRoleWithWebIdentityCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: String,
}
