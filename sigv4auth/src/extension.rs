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

//! Host facing surface: construction, lifecycle and the capabilities handed
//! to the host.

use crate::resolve::{CredentialResolver, CredentialsProvider};
use crate::{Config, RequestSigner, SigningRoundTripper};
use async_trait::async_trait;
use log::debug;
use sigv4auth_core::{Context, Error, Result, RoundTrip};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Lifecycle hooks called by the host around the extension's lifetime.
///
/// Both hooks do nothing by default.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Called once before the extension is used.
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Called once when the host stops.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Credentials attached to every call of an RPC channel.
#[async_trait]
pub trait PerRpcCredentials: Debug + Send + Sync {
    /// Metadata to attach to a call to `uri`.
    async fn request_metadata(&self, uri: &str) -> Result<HashMap<String, String>>;

    /// Whether the channel must use transport security.
    fn require_transport_security(&self) -> bool;
}

/// The SigV4 auth extension.
///
/// ```no_run
/// use std::sync::Arc;
/// use sigv4auth::{Config, Sigv4Auth};
/// use sigv4auth_core::{Context, OsEnv};
/// use sigv4auth_file_read_tokio::TokioFileRead;
/// use sigv4auth_http_send_reqwest::{ReqwestHttpSend, ReqwestRoundTrip};
///
/// # async fn example() -> sigv4auth_core::Result<()> {
/// let ctx = Context::new()
///     .with_file_read(TokioFileRead)
///     .with_http_send(ReqwestHttpSend::default())
///     .with_env(OsEnv);
/// let config = Config {
///     region: "us-east-1".to_string(),
///     service: "aps".to_string(),
///     ..Default::default()
/// };
///
/// let auth = Sigv4Auth::new(config, ctx).await?;
/// let transport = auth.round_tripper(Arc::new(ReqwestRoundTrip::default()))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Sigv4Auth {
    config: Config,
    ctx: Context,
    provider: CredentialsProvider,
}

impl Sigv4Auth {
    /// Validate the config and resolve credentials.
    ///
    /// Fails if the config is invalid or no credentials can be retrieved, the
    /// extension must not be used then.
    pub async fn new(config: Config, ctx: Context) -> Result<Self> {
        config.validate()?;

        let provider = CredentialResolver::new(ctx.clone())
            .resolve(&config)
            .await?;
        debug!(
            "sigv4auth ready for service {} in region {}",
            config.service, config.region
        );

        Ok(Self {
            config,
            ctx,
            provider,
        })
    }

    /// The config this extension was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Wrap `base` so every request sent through it is signed.
    pub fn round_tripper(&self, base: Arc<dyn RoundTrip>) -> Result<SigningRoundTripper> {
        Ok(SigningRoundTripper::new(
            base,
            RequestSigner::new(&self.config.service, &self.config.region),
            self.provider.clone(),
            self.ctx.clone(),
        ))
    }

    /// Signing RPC channels is not supported, this always fails.
    pub fn per_rpc_credentials(&self) -> Result<Arc<dyn PerRpcCredentials>> {
        Err(Error::unsupported("not implemented")
            .with_context("hint: only HTTP requests can be signed"))
    }
}

#[async_trait]
impl Lifecycle for Sigv4Auth {}
