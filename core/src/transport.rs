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

//! Transport abstraction used to send user requests.

use crate::{Error, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use std::fmt::Debug;
use std::sync::Arc;

/// Boxed error that request bodies may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Request body accepted by [`RoundTrip`].
///
/// Bodies may be streaming and may fail while being read.
pub type Body = BoxBody<Bytes, BoxError>;

/// Build a body from in-memory bytes.
pub fn full_body(content: impl Into<Bytes>) -> Body {
    Full::new(content.into())
        .map_err(|never| match never {})
        .boxed()
}

/// Build an empty body.
pub fn empty_body() -> Body {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

/// Read the whole body into memory.
///
/// Failures are reported as [`ErrorKind::BodyRead`](crate::ErrorKind::BodyRead).
pub async fn collect_body(body: Body) -> Result<Bytes> {
    body.collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| Error::body_read("failed to read request body").with_source(anyhow::anyhow!(e)))
}

/// RoundTrip executes a single HTTP transaction.
///
/// It's the seam between a request producer and whatever actually puts bytes
/// on the wire, so it can be decorated (for example to sign requests) without
/// the producer noticing.
#[async_trait::async_trait]
pub trait RoundTrip: Debug + Send + Sync + 'static {
    /// Send the request and return the response.
    async fn round_trip(&self, req: http::Request<Body>) -> Result<http::Response<Bytes>>;
}

#[async_trait::async_trait]
impl<T> RoundTrip for Arc<T>
where
    T: RoundTrip + ?Sized,
{
    async fn round_trip(&self, req: http::Request<Body>) -> Result<http::Response<Bytes>> {
        self.as_ref().round_trip(req).await
    }
}
