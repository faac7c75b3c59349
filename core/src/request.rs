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

use crate::{Error, Result};
use http::header::AsHeaderName;
use http::uri::{Authority, Scheme};
use http::HeaderMap;
use http::HeaderValue;
use http::Method;

/// Signing context for request.
///
/// It's a snapshot of the parts of a request that go into a signature. The
/// original request is never rewritten from it, signers only add headers.
#[derive(Debug)]
pub struct SigningRequest {
    /// HTTP method.
    pub method: Method,
    /// URI scheme, if the request carries one.
    pub scheme: Option<Scheme>,
    /// HTTP authority.
    pub authority: Authority,
    /// HTTP path as sent on the wire, still percent encoded.
    pub path: String,
    /// HTTP query as sent on the wire, still percent encoded.
    pub query: Option<String>,
    /// HTTP headers.
    pub headers: HeaderMap,
}

impl SigningRequest {
    /// Build a signing context from http::request::Parts.
    pub fn build(parts: &http::request::Parts) -> Result<Self> {
        let authority = parts
            .uri
            .authority()
            .cloned()
            .ok_or_else(|| Error::request_invalid("request without authority is invalid for signing"))?;

        Ok(SigningRequest {
            method: parts.method.clone(),
            scheme: parts.uri.scheme().cloned(),
            authority,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(|v| v.to_string()),
            headers: parts.headers.clone(),
        })
    }

    /// Value of the `Host` header a client sends for this request.
    ///
    /// The port is dropped when it's the default one of the scheme, the same
    /// way hyper builds the header.
    pub fn host_value(&self) -> String {
        let host = self.authority.host();
        let default_port = match self.scheme.as_ref().map(|s| s.as_str()) {
            Some("http") => Some(80),
            Some("https") => Some(443),
            _ => None,
        };

        match self.authority.port_u16() {
            Some(port) if Some(port) != default_port => format!("{host}:{port}"),
            _ => host.to_string(),
        }
    }

    /// Get query pairs, percent decoded.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .as_deref()
            .map(|v| {
                form_urlencoded::parse(v.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Normalize header value: trim leading and trailing spaces and tabs and
    /// collapse inner runs of them into one space.
    pub fn header_value_normalize(v: &mut HeaderValue) -> Result<()> {
        let bs = v.as_bytes();

        let mut normalized = Vec::with_capacity(bs.len());
        for &b in bs.iter() {
            if b == b' ' || b == b'\t' {
                if normalized.last().map_or(false, |last| *last != b' ') {
                    normalized.push(b' ');
                }
                continue;
            }
            normalized.push(b);
        }
        if normalized.last() == Some(&b' ') {
            normalized.pop();
        }

        let sensitive = v.is_sensitive();
        *v = HeaderValue::from_bytes(&normalized)?;
        v.set_sensitive(sensitive);
        Ok(())
    }

    /// Get header names as sorted vector.
    pub fn header_name_to_vec_sorted(&self) -> Vec<&str> {
        let mut h = self
            .headers
            .keys()
            .map(|k| k.as_str())
            .collect::<Vec<&str>>();
        h.sort_unstable();

        h
    }

    /// Get all values of a header joined by `,`.
    pub fn header_value_joined<K: AsHeaderName>(&self, name: K) -> Result<String> {
        let mut values = Vec::new();
        for v in self.headers.get_all(name) {
            values.push(v.to_str()?);
        }
        Ok(values.join(","))
    }

    /// Convert sorted pairs to string.
    ///
    /// ```shell
    /// [(a, b), (c, d)] => "a:b\nc:d"
    /// ```
    pub fn pairs_to_string(mut pairs: Vec<(String, String)>, sep: &str, join: &str) -> String {
        let mut s = String::with_capacity(16);

        pairs.sort();

        for (idx, (k, v)) in pairs.into_iter().enumerate() {
            if idx != 0 {
                s.push_str(join);
            }

            s.push_str(&k);
            s.push_str(sep);
            s.push_str(&v);
        }

        s
    }
}
