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
    AWS_QUERY_ENCODE_SET, AWS_URI_ENCODE_SET, UNSIGNED_HEADERS, X_AMZ_DATE, X_AMZ_SECURITY_TOKEN,
};
use crate::Credential;
use http::request::Parts;
use http::{header, HeaderValue};
use log::debug;
use percent_encoding::utf8_percent_encode;
use sigv4auth_core::hash::{hex_hmac_sha256, hex_sha256, hmac_sha256, EMPTY_STRING_SHA256};
use sigv4auth_core::time::{format_date, format_iso8601, DateTime};
use sigv4auth_core::{Error, Result, SigningRequest};
use std::fmt::Write;

/// RequestSigner that implement AWS SigV4.
///
/// - [Signature Version 4 signing process](https://docs.aws.amazon.com/IAM/latest/UserGuide/reference_sigv.html)
///
/// The signer is immutable and keeps no state between calls, so one instance
/// can sign any number of requests concurrently.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    service: String,
    region: String,
}

impl RequestSigner {
    /// Create a new AWS V4 signer for given service and region.
    pub fn new(service: &str, region: &str) -> Self {
        Self {
            service: service.into(),
            region: region.into(),
        }
    }

    /// Service this signer scopes signatures to.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Region this signer scopes signatures to.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Sign the request at the given time.
    ///
    /// `payload_hash` is the lowercase hex SHA-256 of the exact body that will
    /// be sent, see [`payload_hash`].
    ///
    /// Only `Authorization`, `X-Amz-Date` and `X-Amz-Security-Token` are
    /// written to the request. Method, URI and the other headers are left as
    /// they are.
    pub fn sign(
        &self,
        req: &mut Parts,
        payload_hash: &str,
        cred: &Credential,
        now: DateTime,
    ) -> Result<()> {
        let mut signed_req = SigningRequest::build(req)?;

        // canonicalize context
        canonicalize_header(&mut signed_req, cred, now)?;

        // build canonical request and string to sign.
        let creq = canonical_request_string(&signed_req, payload_hash)?;
        let encoded_req = hex_sha256(creq.as_bytes());
        debug!("calculated canonical request hash: {encoded_req}");

        // Scope: "20220313/<region>/<service>/aws4_request"
        let scope = format!(
            "{}/{}/{}/aws4_request",
            format_date(now),
            self.region,
            self.service
        );
        debug!("calculated scope: {scope}");

        // StringToSign:
        //
        // AWS4-HMAC-SHA256
        // 20220313T072004Z
        // 20220313/<region>/<service>/aws4_request
        // <hashed_canonical_request>
        let string_to_sign = {
            let mut f = String::new();
            writeln!(f, "AWS4-HMAC-SHA256")?;
            writeln!(f, "{}", format_iso8601(now))?;
            writeln!(f, "{}", &scope)?;
            write!(f, "{}", &encoded_req)?;
            f
        };
        debug!("calculated string to sign: {string_to_sign}");

        let signing_key =
            generate_signing_key(&cred.secret_access_key, now, &self.region, &self.service);
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let mut authorization = HeaderValue::from_str(&format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            cred.access_key_id,
            scope,
            signed_req.header_name_to_vec_sorted().join(";"),
            signature
        ))
        .map_err(|e| {
            Error::request_invalid("failed to create authorization header").with_source(e)
        })?;
        authorization.set_sensitive(true);

        // Apply to the request.
        req.headers.insert(header::AUTHORIZATION, authorization);
        if let Some(date) = signed_req.headers.remove(X_AMZ_DATE) {
            req.headers.insert(X_AMZ_DATE, date);
        }
        match signed_req.headers.remove(X_AMZ_SECURITY_TOKEN) {
            Some(token) => req.headers.insert(X_AMZ_SECURITY_TOKEN, token),
            None => req.headers.remove(X_AMZ_SECURITY_TOKEN),
        };

        Ok(())
    }
}

/// Lowercase hex SHA-256 of a request body.
pub fn payload_hash(body: &[u8]) -> String {
    if body.is_empty() {
        EMPTY_STRING_SHA256.to_string()
    } else {
        hex_sha256(body)
    }
}

fn canonical_request_string(ctx: &SigningRequest, payload_hash: &str) -> Result<String> {
    // 256 is specially chosen to avoid reallocation for most requests.
    let mut f = String::with_capacity(256);

    // Insert method
    writeln!(f, "{}", ctx.method)?;
    // Insert encoded path, the raw path gets encoded again.
    if ctx.path.is_empty() {
        writeln!(f, "/")?;
    } else {
        writeln!(f, "{}", utf8_percent_encode(&ctx.path, &AWS_URI_ENCODE_SET))?;
    }
    // Insert query
    let query = ctx
        .query_pairs()
        .into_iter()
        .map(|(k, v)| {
            (
                utf8_percent_encode(&k, &AWS_QUERY_ENCODE_SET).to_string(),
                utf8_percent_encode(&v, &AWS_QUERY_ENCODE_SET).to_string(),
            )
        })
        .collect();
    writeln!(f, "{}", SigningRequest::pairs_to_string(query, "=", "&"))?;
    // Insert signed headers
    let signed_headers = ctx.header_name_to_vec_sorted();
    for header in signed_headers.iter() {
        writeln!(f, "{}:{}", header, ctx.header_value_joined(*header)?)?;
    }
    writeln!(f)?;
    writeln!(f, "{}", signed_headers.join(";"))?;
    write!(f, "{payload_hash}")?;

    Ok(f)
}

fn canonicalize_header(ctx: &mut SigningRequest, cred: &Credential, now: DateTime) -> Result<()> {
    for name in UNSIGNED_HEADERS {
        ctx.headers.remove(name);
    }

    // Header names and values need to be normalized according to Step 4 of https://docs.aws.amazon.com/IAM/latest/UserGuide/create-signed-request.html
    for value in ctx.headers.values_mut() {
        SigningRequest::header_value_normalize(value)?;
    }

    // Insert HOST header if not present, without a default port.
    if ctx.headers.get(header::HOST).is_none() {
        let host = HeaderValue::try_from(ctx.host_value())?;
        ctx.headers.insert(header::HOST, host);
    }

    // Always use our own DATE, a stale one would never verify.
    ctx.headers
        .insert(X_AMZ_DATE, HeaderValue::try_from(format_iso8601(now))?);

    // Insert X_AMZ_SECURITY_TOKEN header only if security token exists.
    ctx.headers.remove(X_AMZ_SECURITY_TOKEN);
    if let Some(token) = &cred.session_token {
        let mut value = HeaderValue::from_str(token).map_err(|e| {
            Error::credential_invalid("session token is not a valid header value").with_source(e)
        })?;
        // Set token value sensitive to avoid leaking.
        value.set_sensitive(true);

        ctx.headers.insert(X_AMZ_SECURITY_TOKEN, value);
    }

    Ok(())
}

fn generate_signing_key(secret: &str, time: DateTime, region: &str, service: &str) -> Vec<u8> {
    // Sign secret
    let secret = format!("AWS4{secret}");
    // Sign date
    let sign_date = hmac_sha256(secret.as_bytes(), format_date(time).as_bytes());
    // Sign region
    let sign_region = hmac_sha256(sign_date.as_slice(), region.as_bytes());
    // Sign service
    let sign_service = hmac_sha256(sign_region.as_slice(), service.as_bytes());
    // Sign request
    hmac_sha256(sign_service.as_slice(), "aws4_request".as_bytes())
}
