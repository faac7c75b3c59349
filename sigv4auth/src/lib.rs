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

//! AWS SigV4 signing for outbound HTTP requests.
//!
//! [`Sigv4Auth`] resolves credentials once from its [`Config`] and the
//! environment, then wraps any [`RoundTrip`](sigv4auth_core::RoundTrip)
//! transport in a [`SigningRoundTripper`] that signs every request with
//! [`RequestSigner`].
//!
//! Credentials come from, in order of precedence:
//!
//! - `CUSTOM_AWS_ACCESS_KEY` / `CUSTOM_AWS_SECRET_ACCESS_KEY`
//! - an STS AssumeRole session when `assume_role.arn` is set
//! - the default chain: env, shared profile files, EC2 IMDSv2

mod config;
pub use config::{AssumeRole, Config};

mod constants;

mod credential;
pub use credential::Credential;

mod extension;
pub use extension::{Lifecycle, PerRpcCredentials, Sigv4Auth};

mod provide_credential;
pub use provide_credential::*;

mod resolve;
pub use resolve::{CredentialResolver, CredentialsProvider};

mod round_tripper;
pub use round_tripper::SigningRoundTripper;

mod sign_request;
pub use sign_request::{payload_hash, RequestSigner};
