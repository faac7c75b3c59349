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

use crate::{Context, ProvideCredential, Result, SigningCredential};
use async_trait::async_trait;
use log::debug;
use std::fmt::{self, Debug};
use std::sync::Arc;
use tokio::sync::Mutex;

/// CachedCredentialProvider keeps the last credential returned by the inner
/// provider and only calls it again once the credential is no longer valid.
///
/// The lock is held for the whole refresh, so concurrent callers wait for a
/// single in-flight refresh and then all observe the same new credential.
pub struct CachedCredentialProvider<P>
where
    P: ProvideCredential,
    P::Credential: SigningCredential,
{
    inner: P,
    cached: Arc<Mutex<Option<P::Credential>>>,
}

impl<P> CachedCredentialProvider<P>
where
    P: ProvideCredential,
    P::Credential: SigningCredential,
{
    /// Wrap the given provider with a cache.
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cached: Arc::new(Mutex::new(None)),
        }
    }
}

impl<P> Debug for CachedCredentialProvider<P>
where
    P: ProvideCredential,
    P::Credential: SigningCredential,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedCredentialProvider")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<P> ProvideCredential for CachedCredentialProvider<P>
where
    P: ProvideCredential,
    P::Credential: SigningCredential,
{
    type Credential = P::Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let mut cached = self.cached.lock().await;
        if cached.is_valid() {
            return Ok((*cached).clone());
        }

        debug!("cached credential is missing or about to expire, refreshing");
        let cred = self.inner.provide_credential(ctx).await?;
        *cached = cred.clone();
        Ok(cred)
    }
}
