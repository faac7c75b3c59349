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
use ini::Ini;
use log::debug;
use sigv4auth_core::{Context, Error, ProvideCredential, Result};

/// ProfileCredentialProvider loads AWS credentials from the shared files.
///
/// Files are looked up in this order, the first one holding a key pair for
/// the profile wins:
///
/// - `~/.aws/credentials` (or the path specified by `AWS_SHARED_CREDENTIALS_FILE`),
///   section `[<profile>]`
/// - `~/.aws/config` (or the path specified by `AWS_CONFIG_FILE`),
///   section `[default]` or `[profile <profile>]`
///
/// The profile is `AWS_PROFILE` if set, then the one given by
/// [`with_profile`](Self::with_profile), then `default`.
///
/// Missing files or sections are not an error, a file that exists but can't
/// be parsed is.
#[derive(Debug)]
pub struct ProfileCredentialProvider {
    profile: String,
    config_file: Option<String>,
    credentials_file: Option<String>,
}

impl Default for ProfileCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileCredentialProvider {
    /// Create a new ProfileCredentialProvider with default settings.
    pub fn new() -> Self {
        Self {
            profile: "default".to_string(),
            config_file: None,
            credentials_file: None,
        }
    }

    /// Set the profile name to use.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    /// Set the path to the config file.
    pub fn with_config_file(mut self, path: impl Into<String>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Set the path to the credentials file.
    pub fn with_credentials_file(mut self, path: impl Into<String>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }
}

/// Load the key pair from `section` of the ini file at `path`.
async fn load_section(ctx: &Context, path: &str, section: &str) -> Result<Option<Credential>> {
    let Some(expanded_path) = ctx.expand_home_dir(path) else {
        debug!("failed to expand homedir for path: {path}");
        return Ok(None);
    };

    let content = match ctx.file_read_as_string(&expanded_path).await {
        Ok(content) => content,
        Err(err) => {
            debug!("failed to read profile file {expanded_path}: {err}");
            return Ok(None);
        }
    };

    let conf = Ini::load_from_str(&content).map_err(|e| {
        Error::config_invalid("failed to parse profile file")
            .with_source(e)
            .with_context(format!("path: {expanded_path}"))
    })?;

    let Some(props) = conf.section(Some(section)) else {
        debug!("section [{section}] not found in {expanded_path}");
        return Ok(None);
    };

    match (
        props.get("aws_access_key_id").filter(|v| !v.is_empty()),
        props.get("aws_secret_access_key").filter(|v| !v.is_empty()),
    ) {
        (Some(ak), Some(sk)) => Ok(Some(Credential {
            access_key_id: ak.to_string(),
            secret_access_key: sk.to_string(),
            session_token: props.get("aws_session_token").map(|s| s.to_string()),
            expires_in: None,
        })),
        _ => {
            debug!("section [{section}] in {expanded_path} has no key pair");
            Ok(None)
        }
    }
}

#[async_trait]
impl ProvideCredential for ProfileCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let profile = ctx
            .env_var_non_empty(AWS_PROFILE)
            .unwrap_or_else(|| self.profile.clone());

        let credentials_file = self
            .credentials_file
            .clone()
            .or_else(|| ctx.env_var_non_empty(AWS_SHARED_CREDENTIALS_FILE))
            .unwrap_or_else(|| "~/.aws/credentials".to_string());
        if let Some(cred) = load_section(ctx, &credentials_file, &profile).await? {
            return Ok(Some(cred));
        }

        let config_file = self
            .config_file
            .clone()
            .or_else(|| ctx.env_var_non_empty(AWS_CONFIG_FILE))
            .unwrap_or_else(|| "~/.aws/config".to_string());
        let section = match profile.as_str() {
            "default" => "default".to_string(),
            x => format!("profile {x}"),
        };
        load_section(ctx, &config_file, &section).await
    }
}
