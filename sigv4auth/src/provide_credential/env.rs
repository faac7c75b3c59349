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
use sigv4auth_core::{Context, ProvideCredential, Result};

/// EnvCredentialProvider loads AWS credentials from environment variables.
///
/// - `AWS_ACCESS_KEY_ID`
/// - `AWS_SECRET_ACCESS_KEY`
/// - `AWS_SESSION_TOKEN` (optional)
///
/// Empty values count as unset.
#[derive(Debug, Default, Clone)]
pub struct EnvCredentialProvider;

impl EnvCredentialProvider {
    /// Create a new EnvCredentialProvider.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProvideCredential for EnvCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let access_key_id = ctx.env_var_non_empty(AWS_ACCESS_KEY_ID);
        let secret_access_key = ctx.env_var_non_empty(AWS_SECRET_ACCESS_KEY);

        match (access_key_id, secret_access_key) {
            (Some(ak), Some(sk)) => Ok(Some(Credential {
                access_key_id: ak,
                secret_access_key: sk,
                session_token: ctx.env_var_non_empty(AWS_SESSION_TOKEN),
                expires_in: None,
            })),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigv4auth_core::StaticEnv;
    use std::collections::HashMap;
    use test_case::test_case;

    fn context(envs: &[(&str, &str)]) -> Context {
        Context::new().with_env(StaticEnv {
            home_dir: None,
            envs: envs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        })
    }

    #[test_case(&[], None ; "empty env")]
    #[test_case(&[(AWS_ACCESS_KEY_ID, "env-ak")], None ; "missing secret")]
    #[test_case(&[(AWS_ACCESS_KEY_ID, ""), (AWS_SECRET_ACCESS_KEY, "env-sk")], None ; "empty access key")]
    #[test_case(&[(AWS_ACCESS_KEY_ID, "env-ak"), (AWS_SECRET_ACCESS_KEY, "env-sk")], Some(("env-ak", "env-sk", None)) ; "key pair")]
    #[test_case(&[(AWS_ACCESS_KEY_ID, "env-ak"), (AWS_SECRET_ACCESS_KEY, "env-sk"), (AWS_SESSION_TOKEN, "env-token")], Some(("env-ak", "env-sk", Some("env-token"))) ; "with session token")]
    #[tokio::test]
    async fn test_env_credential_provider(
        envs: &[(&str, &str)],
        expected: Option<(&str, &str, Option<&str>)>,
    ) {
        let cred = EnvCredentialProvider::new()
            .provide_credential(&context(envs))
            .await
            .expect("env provider never fails");

        assert_eq!(
            cred.as_ref().map(|c| (
                c.access_key_id.as_str(),
                c.secret_access_key.as_str(),
                c.session_token.as_deref()
            )),
            expected
        );
    }
}
