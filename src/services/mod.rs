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
use bytes::Bytes;
use reqwest::{self, Response};
use reqwest_middleware::RequestBuilder;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{self as json, Value};
use tracing::*;

pub mod resolver;
pub mod rest;
pub mod routes;
pub mod types;

pub use reqwest_middleware::ClientWithMiddleware as HttpClient;
pub use routes::Route;

use super::{Error, Result};

pub(crate) trait RequestBuilderExt {
    fn send_ext(self) -> impl Future<Output = Result<Response>>;
}

pub trait TokenProvider {
    fn provide_token(&self) -> Option<&str>;
}

impl RequestBuilderExt for RequestBuilder {
    async fn send_ext(self) -> Result<Response> {
        let response = self.send().await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await?;

            Err(Error::HttpError(status, body))
        }
    }
}

pub trait ResponseExt {
    fn json_body<T: DeserializeOwned>(self) -> impl Future<Output = Result<T>>;
}

impl ResponseExt for reqwest::Response {
    async fn json_body<T: DeserializeOwned>(self) -> Result<T> {
        let body = self.text().await?;

        if body.is_empty() {
            return Ok(json::from_value(Value::Null)?);
        }

        serde_json::from_str::<T>(&body).map_err(|error| {
            error!(%body, %error);
            Error::Serde(error)
        })
    }
}

pub(crate) fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    json::from_value(value).map_err(|error| {
        error!(%error, "Cannot deserialize response");
        Error::Serde(error)
    })
}

/// A file uploaded alongside a message body.
#[derive(Debug, Clone, PartialEq)]
pub struct FileAttachment {
    pub name: String,
    pub data: Bytes,
}

impl FileAttachment {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub route: Route,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub files: Vec<FileAttachment>,

    /// Sent as the audit log reason header
    pub reason: Option<String>,
}

impl ApiRequest {
    pub fn new(route: Route) -> Self {
        Self {
            route,
            query: Vec::new(),
            body: None,
            files: Vec::new(),
            reason: None,
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn json<Q: Serialize>(mut self, body: &Q) -> Result<Self> {
        self.body = Some(json::to_value(body)?);
        Ok(self)
    }

    pub fn files(mut self, files: Vec<FileAttachment>) -> Self {
        self.files = files;
        self
    }

    pub fn reason(mut self, reason: Option<&str>) -> Self {
        self.reason = reason.map(str::to_owned);
        self
    }
}

/// The network boundary every channel operation goes through.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: ApiRequest) -> Result<Value>;
}

pub(crate) async fn call<R: DeserializeOwned>(
    transport: &dyn Transport,
    request: ApiRequest,
) -> Result<R> {
    from_value(transport.request(request).await?)
}
