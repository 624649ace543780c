//
// Copyright © 2025 Hardcore Engineering Inc.
//
// Licensed under the Eclipse Public License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License. You may
// obtain a copy of the License at https://www.eclipse.org/legal/epl-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//
// See the License for the specific language governing permissions and
// limitations under the License.
//

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest_middleware::ClientBuilder;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::*;
use url::Url;

use super::{ApiRequest, HttpClient, RequestBuilderExt, ResponseExt, TokenProvider, Transport};
use crate::{Config, Result};

const AUDIT_LOG_REASON: HeaderName = HeaderName::from_static("x-audit-log-reason");

/// Everything but the characters a URI component may carry unescaped
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn audit_reason(reason: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&utf8_percent_encode(reason, URI_COMPONENT).to_string()).ok()
}

#[cfg(feature = "reqwest_middleware")]
fn build_http_client(config: &Config) -> HttpClient {
    use reqwest::StatusCode;
    use reqwest_retry::{
        RetryTransientMiddleware, Retryable, RetryableStrategy, default_on_request_failure,
        policies::ExponentialBackoff,
    };

    let policy =
        ExponentialBackoff::builder().build_with_total_retry_duration(config.retry_total_duration);

    struct RestStrategy;

    impl RetryableStrategy for RestStrategy {
        #[tracing::instrument(level = "trace", skip_all)]
        fn handle(
            &self,
            res: &std::result::Result<reqwest::Response, reqwest_middleware::Error>,
        ) -> Option<Retryable> {
            match res {
                Ok(success) => match success.status() {
                    StatusCode::REQUEST_TIMEOUT
                    | StatusCode::TOO_MANY_REQUESTS
                    | StatusCode::BAD_GATEWAY => {
                        fn hstr(h: Option<&HeaderValue>) -> &str {
                            h.and_then(|h| h.to_str().ok()).unwrap_or("")
                        }

                        let retry_after = hstr(success.headers().get("Retry-After"));
                        let limit_remaining = hstr(success.headers().get("X-RateLimit-Remaining"));
                        let limit_reset = hstr(success.headers().get("X-RateLimit-Reset"));

                        trace!(
                            code = %success.status(),
                            retry_after, limit_remaining, limit_reset,
                            "Transient error"
                        );

                        Some(Retryable::Transient)
                    }

                    other => {
                        if other.is_success() {
                            None
                        } else {
                            Some(Retryable::Fatal)
                        }
                    }
                },
                Err(error) => default_on_request_failure(error),
            }
        }
    }

    ClientBuilder::new(reqwest::Client::new())
        .with(RetryTransientMiddleware::new_with_policy_and_strategy(
            policy,
            RestStrategy,
        ))
        .build()
}

#[cfg(not(feature = "reqwest_middleware"))]
fn build_http_client(_config: &Config) -> HttpClient {
    ClientBuilder::new(reqwest::Client::new()).build()
}

/// [`Transport`] over the service's REST api.
#[derive(Clone)]
pub struct RestClient {
    pub base: Url,
    token: Option<SecretString>,
    http: HttpClient,
}

impl RestClient {
    pub fn new(config: &Config) -> Self {
        Self {
            base: config.api_base.clone(),
            token: config.token.clone(),
            http: build_http_client(config),
        }
    }

    pub fn with_http(http: HttpClient, base: Url, token: Option<SecretString>) -> Self {
        Self { base, token, http }
    }
}

impl TokenProvider for RestClient {
    fn provide_token(&self) -> Option<&str> {
        self.token.as_ref().map(|token| token.expose_secret())
    }
}

fn multipart_form(request: &ApiRequest) -> Form {
    let mut form = Form::new();

    for (index, file) in request.files.iter().enumerate() {
        let part = Part::bytes(file.data.to_vec()).file_name(file.name.clone());
        form = form.part(format!("file{index}"), part);
    }

    if let Some(body) = &request.body {
        form = form.text("payload_json", body.to_string());
    }

    form
}

#[async_trait]
impl Transport for RestClient {
    #[tracing::instrument(
        level = "trace",
        skip(self, request),
        fields(route = request.route.name(), method = %request.route.method())
    )]
    async fn request(&self, request: ApiRequest) -> Result<Value> {
        let mut url = self.base.join(&request.route.path())?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }

        trace!(%url, body = ?request.body, files = request.files.len(), "http request");

        let mut builder = self.http.request(request.route.method(), url);

        if let Some(token) = self.provide_token() {
            builder = builder.bearer_auth(token);
        }

        if let Some(value) = request.reason.as_deref().and_then(audit_reason) {
            builder = builder.header(AUDIT_LOG_REASON, value);
        }

        builder = if !request.files.is_empty() {
            builder.multipart(multipart_form(&request))
        } else if let Some(body) = &request.body {
            builder.json(body)
        } else {
            builder
        };

        let response = builder.send_ext().await?.json_body::<Value>().await?;

        trace!(%response, "http response");

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{FileAttachment, Route};
    use crate::services::types::Snowflake;

    #[test]
    fn test_provide_token() {
        let config = crate::ConfigBuilder::default()
            .token(String::from("secret"))
            .build()
            .unwrap();

        let client = RestClient::new(&config);
        assert_eq!(client.provide_token(), Some("secret"));

        let anonymous = RestClient::new(&Config::default());
        assert_eq!(anonymous.provide_token(), None);
    }

    #[test]
    fn test_request_builder() {
        let request = ApiRequest::new(Route::GetMessages {
            channel_id: Snowflake(1),
        })
        .query("limit", 50)
        .query("before", Snowflake(99))
        .reason(Some("cleanup"))
        .files(vec![FileAttachment::new("a.txt", &b"hello"[..])]);

        assert_eq!(
            request.query,
            vec![
                ("limit".to_string(), "50".to_string()),
                ("before".to_string(), "99".to_string()),
            ]
        );
        assert_eq!(request.reason.as_deref(), Some("cleanup"));
        assert_eq!(request.files.len(), 1);
        assert!(request.body.is_none());
    }

    #[test]
    fn test_audit_reason_encoding() {
        assert_eq!(audit_reason("ci bot").unwrap(), "ci%20bot");
        assert_eq!(
            audit_reason("spam (again) & more!").unwrap(),
            "spam%20(again)%20%26%20more!"
        );
        assert_eq!(audit_reason("a+b/c?").unwrap(), "a%2Bb%2Fc%3F");
        assert_eq!(audit_reason("café").unwrap(), "caf%C3%A9");
    }
}
