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

use async_trait::async_trait;
use aws_sigv4::http_request::{SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4::SigningParams;
use bytes::Bytes;
use criterion::{criterion_group, criterion_main, Criterion};
use sigv4auth::{payload_hash, Credential, RequestSigner, SigningRoundTripper, StaticCredentialProvider};
use sigv4auth_core::time::now;
use sigv4auth_core::{full_body, Context, Result, RoundTrip};
use std::sync::Arc;
use std::time::SystemTime;

criterion_group!(benches, bench);
criterion_main!(benches);

const URL: &str = "https://aps-workspaces.us-east-1.amazonaws.com/workspaces/ws-1/api/v1/remote_write";
const BODY: &[u8] = &[0u8; 4096];

#[derive(Debug)]
struct DiscardTransport;

#[async_trait]
impl RoundTrip for DiscardTransport {
    async fn round_trip(
        &self,
        _: http::Request<sigv4auth_core::Body>,
    ) -> Result<http::Response<Bytes>> {
        Ok(http::Response::new(Bytes::new()))
    }
}

pub fn bench(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("must success");

    let mut group = c.benchmark_group("sigv4");

    group.bench_function("sigv4auth", |b| {
        let cred = Credential {
            access_key_id: "access_key_id".to_string(),
            secret_access_key: "secret_access_key".to_string(),
            ..Default::default()
        };
        let signer = RequestSigner::new("aps", "us-east-1");

        b.iter(|| {
            let (mut parts, _) = http::Request::post(URL)
                .header("Content-Type", "application/x-protobuf")
                .body(())
                .expect("request must be valid")
                .into_parts();

            signer
                .sign(&mut parts, &payload_hash(BODY), &cred, now())
                .expect("must success")
        })
    });

    group.bench_function("round_trip", |b| {
        let rt = SigningRoundTripper::new(
            Arc::new(DiscardTransport),
            RequestSigner::new("aps", "us-east-1"),
            Arc::new(StaticCredentialProvider::new(
                "access_key_id",
                "secret_access_key",
            )),
            Context::new(),
        );

        b.to_async(&runtime).iter(|| async {
            let req = http::Request::post(URL)
                .header("Content-Type", "application/x-protobuf")
                .body(full_body(BODY))
                .expect("request must be valid");

            rt.round_trip(req).await.expect("must success")
        })
    });

    group.bench_function("aws_sigv4", |b| {
        let identity = aws_credential_types::Credentials::new(
            "access_key_id",
            "secret_access_key",
            None,
            None,
            "test",
        )
        .into();

        let sp = SigningParams::builder()
            .identity(&identity)
            .region("us-east-1")
            .name("aps")
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .expect("signing params must be valid")
            .into();

        let headers = [("content-type", "application/x-protobuf")];

        b.iter(|| {
            let _ = aws_sigv4::http_request::sign(
                SignableRequest::new(
                    "POST",
                    URL,
                    headers.into_iter(),
                    SignableBody::Bytes(BODY),
                )
                .expect("request must be signable"),
                &sp,
            )
            .expect("signing must succeed");
        })
    });

    group.finish();
}
