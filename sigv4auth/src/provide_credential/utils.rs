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

use http::StatusCode;
use quick_xml::de;
use serde::Deserialize;
use sigv4auth_core::Error;

/// Region used to sign requests sent to the global STS endpoint.
pub const GLOBAL_STS_REGION: &str = "us-east-1";

/// Get the STS endpoint for the given region.
///
/// An empty region selects the global endpoint.
pub fn sts_endpoint(region: &str) -> String {
    if region.is_empty() {
        "sts.amazonaws.com".to_string()
    } else if region.starts_with("cn-") {
        format!("sts.{region}.amazonaws.com.cn")
    } else {
        format!("sts.{region}.amazonaws.com")
    }
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct StsErrorResponse {
    error: StsError,
    request_id: String,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct StsError {
    code: String,
    message: String,
}

/// Build an error out of a non-200 STS response.
///
/// The kind follows the error code: `AccessDenied` is a denied credential,
/// `ExpiredToken` an expired one, anything else is unexpected.
pub fn parse_sts_error(operation: &str, status: StatusCode, body: &str) -> Error {
    let resp = match de::from_str::<StsErrorResponse>(body) {
        Ok(resp) if !resp.error.code.is_empty() => resp,
        _ => {
            return Error::unexpected(format!("STS {operation} failed with status {status}"))
                .with_context(format!("response: {body}"))
        }
    };

    let code = resp.error.code;
    let message = format!("STS {operation} failed: [{code}] {}", resp.error.message);
    let err = match code.as_str() {
        "AccessDenied" => Error::credential_denied(message),
        "ExpiredToken" => Error::credential_expired(message),
        "InvalidClientTokenId" | "SignatureDoesNotMatch" => Error::credential_invalid(message),
        _ => Error::unexpected(message),
    };

    let err = err.with_context(format!("status: {status}"));
    if resp.request_id.is_empty() {
        err
    } else {
        err.with_context(format!("request_id: {}", resp.request_id))
    }
}
