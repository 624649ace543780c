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

use std::collections::HashMap;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use parking_lot::RwLock;
use reqwest_middleware::ClientBuilder;
use serde_json::Value;
use tracing::*;
use url::Url;

use super::types::{Snowflake, User};
use super::{HttpClient, RequestBuilderExt, from_value};
use crate::{Error, Result};

/// Anything that can become image bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageResolvable {
    /// Already encoded as `data:<mime>;base64,<payload>`
    DataUri(String),
    Url(Url),
    Bytes(Bytes),
}

impl ImageResolvable {
    pub fn parse(input: &str) -> Result<Self> {
        if input.starts_with("data:") {
            Ok(ImageResolvable::DataUri(input.to_owned()))
        } else {
            Ok(ImageResolvable::Url(Url::parse(input)?))
        }
    }

    pub fn is_data_uri(&self) -> bool {
        matches!(self, ImageResolvable::DataUri(_))
    }
}

impl From<Bytes> for ImageResolvable {
    fn from(bytes: Bytes) -> Self {
        ImageResolvable::Bytes(bytes)
    }
}

impl From<Vec<u8>> for ImageResolvable {
    fn from(bytes: Vec<u8>) -> Self {
        ImageResolvable::Bytes(bytes.into())
    }
}

impl From<Url> for ImageResolvable {
    fn from(url: Url) -> Self {
        ImageResolvable::Url(url)
    }
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "image/jpeg",
    }
}

pub fn data_uri(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", sniff_mime(bytes), STANDARD.encode(bytes))
}

fn decode_data_uri(uri: &str) -> Result<Bytes> {
    let (_, payload) = uri
        .split_once(";base64,")
        .ok_or(Error::InvalidArgument("data uri is not base64 encoded"))?;

    STANDARD
        .decode(payload)
        .map(Bytes::from)
        .map_err(|_| Error::InvalidArgument("data uri has an invalid base64 payload"))
}

#[async_trait]
pub trait ImageResolver: Send + Sync {
    async fn resolve_image(&self, input: ImageResolvable) -> Result<Bytes>;
}

/// Downloads url inputs, passes everything else through.
#[derive(Clone)]
pub struct HttpImageResolver {
    http: HttpClient,
}

impl Default for HttpImageResolver {
    fn default() -> Self {
        Self {
            http: ClientBuilder::new(reqwest::Client::new()).build(),
        }
    }
}

impl HttpImageResolver {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ImageResolver for HttpImageResolver {
    #[tracing::instrument(level = "trace", skip_all)]
    async fn resolve_image(&self, input: ImageResolvable) -> Result<Bytes> {
        match input {
            ImageResolvable::Bytes(bytes) => Ok(bytes),
            ImageResolvable::DataUri(uri) => decode_data_uri(&uri),
            ImageResolvable::Url(url) => {
                trace!(%url, "fetching image");
                let bytes = self.http.get(url).send_ext().await?.bytes().await?;
                Ok(bytes)
            }
        }
    }
}

pub trait UserResolver: Send + Sync {
    fn resolve_user(&self, payload: Value) -> Result<User>;
}

/// Keeps the latest known version of every user it has resolved.
#[derive(Default)]
pub struct UserStore {
    users: RwLock<HashMap<Snowflake, User>>,
}

impl UserStore {
    pub fn get(&self, id: Snowflake) -> Option<User> {
        self.users.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

impl UserResolver for UserStore {
    fn resolve_user(&self, payload: Value) -> Result<User> {
        let user: User = from_value(payload)?;
        self.users.write().insert(user.id, user.clone());
        Ok(user)
    }
}
