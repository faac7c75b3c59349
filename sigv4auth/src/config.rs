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
use serde::{Deserialize, Serialize};
use sigv4auth_core::{Error, Result};

/// Config for the sigv4auth extension.
///
/// Loaded by the host from its own config file, e.g.
///
/// ```toml
/// region = "us-east-1"
/// service = "aps"
///
/// [assume_role]
/// arn = "arn:aws:iam::123456789012:role/aps-writer"
/// sts_region = "us-east-1"
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Region the signature is scoped to, e.g. `us-east-1`.
    pub region: String,
    /// Service the signature is scoped to, e.g. `aps` or `execute-api`.
    pub service: String,
    /// Optional role to assume before signing.
    pub assume_role: AssumeRole,
}

/// Role assumed through STS before signing.
///
/// An empty `arn` means no role is assumed.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssumeRole {
    /// ARN of the role to assume.
    pub arn: String,
    /// Region of the STS endpoint used to assume the role.
    pub sts_region: String,
    /// Session name attached to the assumed role session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
}

impl AssumeRole {
    /// Session name to use, falling back to `sigv4auth`.
    pub fn session_name(&self) -> &str {
        self.session_name
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_ROLE_SESSION_NAME)
    }
}

impl Config {
    /// Check that the config can be used to sign requests.
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(Error::config_invalid("region must be set"));
        }
        if self.service.trim().is_empty() {
            return Err(Error::config_invalid("service must be set")
                .with_context(format!("region: {}", self.region)));
        }
        Ok(())
    }
}
