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

use crate::constants::*;
use crate::provide_credential::{
    AssumeRoleCredentialProvider, DefaultCredentialProvider, StaticCredentialProvider,
};
use crate::{Config, Credential};
use log::{debug, warn};
use sigv4auth_core::{CachedCredentialProvider, Context, Error, ProvideCredential, Result};
use std::sync::Arc;

/// Shared handle to the credentials source picked by [`CredentialResolver`].
pub type CredentialsProvider = Arc<dyn ProvideCredential<Credential = Credential>>;

/// CredentialResolver builds the single credentials source used for signing.
///
/// Resolution order, later steps override earlier ones:
///
/// 1. The default chain (env, shared profile files, EC2 IMDSv2), cached.
/// 2. If `assume_role.arn` is set, an STS AssumeRole session on top of the
///    default chain, cached and refreshed before it expires.
/// 3. If `CUSTOM_AWS_ACCESS_KEY` and `CUSTOM_AWS_SECRET_ACCESS_KEY` are both
///    set, a static key pair. This wins over an assume-role ARN.
///
/// [`resolve`](Self::resolve) retrieves credentials once so a broken setup
/// fails at startup instead of on the first request.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    ctx: Context,
}

impl CredentialResolver {
    /// Create a resolver reading env, files and network through `ctx`.
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Region of the STS endpoint used to assume the role.
    ///
    /// Empty if nothing is configured, which selects the global endpoint.
    pub fn sts_region(&self, cfg: &Config) -> String {
        [&cfg.assume_role.sts_region, &cfg.region]
            .into_iter()
            .find(|v| !v.is_empty())
            .cloned()
            .or_else(|| self.ctx.env_var_non_empty(AWS_REGION))
            .or_else(|| self.ctx.env_var_non_empty(AWS_DEFAULT_REGION))
            .unwrap_or_default()
    }

    /// Build the credentials source without retrieving from it.
    pub fn build(&self, cfg: &Config) -> CredentialsProvider {
        let static_keys = (
            self.ctx.env_var_non_empty(CUSTOM_AWS_ACCESS_KEY),
            self.ctx.env_var_non_empty(CUSTOM_AWS_SECRET_ACCESS_KEY),
        );
        if let (Some(ak), Some(sk)) = static_keys {
            if !cfg.assume_role.arn.is_empty() {
                warn!(
                    "{CUSTOM_AWS_ACCESS_KEY} and {CUSTOM_AWS_SECRET_ACCESS_KEY} are set, ignoring assume_role.arn {}",
                    cfg.assume_role.arn
                );
            }
            debug!("using static credentials from {CUSTOM_AWS_ACCESS_KEY}");
            return Arc::new(StaticCredentialProvider::new(&ak, &sk));
        }

        let chain: CredentialsProvider =
            Arc::new(CachedCredentialProvider::new(DefaultCredentialProvider::new()));
        if cfg.assume_role.arn.is_empty() {
            debug!("using default credential chain");
            return chain;
        }

        let sts_region = self.sts_region(cfg);
        debug!(
            "assuming role {} with sts region {:?}",
            cfg.assume_role.arn, sts_region
        );
        let assume_role = AssumeRoleCredentialProvider::new(&cfg.assume_role.arn, chain)
            .with_role_session_name(cfg.assume_role.session_name())
            .with_region(sts_region);
        Arc::new(CachedCredentialProvider::new(assume_role))
    }

    /// Build the credentials source and make sure it can produce credentials.
    ///
    /// Fails with [`ErrorKind::ConfigResolution`](sigv4auth_core::ErrorKind::ConfigResolution)
    /// if the first retrieval errors or finds nothing.
    pub async fn resolve(&self, cfg: &Config) -> Result<CredentialsProvider> {
        let provider = self.build(cfg);

        match provider.provide_credential(&self.ctx).await {
            Ok(Some(_)) => Ok(provider),
            Ok(None) => Err(Error::config_resolution("no credentials found")
                .with_context(format!("provider: {provider:?}"))),
            Err(e) => Err(
                Error::config_resolution("failed to retrieve credentials")
                    .with_context(format!("assume_role.arn: {}", cfg.assume_role.arn))
                    .with_source(e),
            ),
        }
    }
}
