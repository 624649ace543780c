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

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::channel::ChannelContext;
use crate::services::resolver::{HttpImageResolver, UserStore};
use crate::services::types::{Message, Snowflake};
use crate::services::{ApiRequest, Route, Transport};
use crate::{Config, Error, Result, StatusCode};

pub(crate) const ME: Snowflake = Snowflake(4242);

pub(crate) fn message_json(id: u64, channel_id: u64, content: &str) -> Value {
    json!({
        "id": id.to_string(),
        "channel_id": channel_id.to_string(),
        "author": { "id": "77", "username": "author", "discriminator": "0001" },
        "content": content,
        "timestamp": "2025-03-01T12:00:00+00:00",
    })
}

pub(crate) fn message(id: u64, content: &str) -> Message {
    serde_json::from_value(message_json(id, 1, content)).unwrap()
}

type Responder = Box<dyn Fn(&ApiRequest) -> Result<Value> + Send + Sync>;

/// Records every request and answers with canned payloads.
pub(crate) struct MockTransport {
    requests: Mutex<Vec<ApiRequest>>,
    responder: Responder,
}

impl MockTransport {
    pub fn with(
        responder: impl Fn(&ApiRequest) -> Result<Value> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        })
    }

    pub fn ok() -> Arc<Self> {
        let next_id = AtomicU64::new(1000);

        Self::with(move |request| {
            Ok(match &request.route {
                Route::CreateMessage { channel_id } => {
                    let id = next_id.fetch_add(1, Ordering::Relaxed);
                    let content = request
                        .body
                        .as_ref()
                        .and_then(|body| body.get("content"))
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    message_json(id, channel_id.0, content)
                }
                Route::GetMessage {
                    channel_id,
                    message_id,
                } => message_json(message_id.0, channel_id.0, "fetched"),
                Route::GetMessages { channel_id } => json!([
                    message_json(11, channel_id.0, "older"),
                    message_json(12, channel_id.0, "newer"),
                ]),
                Route::GetPins { channel_id } => {
                    let mut pinned = message_json(5, channel_id.0, "pinned");
                    pinned["pinned"] = json!(true);
                    json!([pinned])
                }
                Route::SearchMessages { channel_id } => json!({
                    "total_results": 1,
                    "messages": [[message_json(21, channel_id.0, "needle")]],
                }),
                Route::GetWebhooks { channel_id } => json!([{
                    "id": "900",
                    "channel_id": channel_id.to_string(),
                    "name": "hook",
                }]),
                Route::CreateWebhook { channel_id } => {
                    let body = request.body.clone().unwrap_or_default();
                    json!({
                        "id": "901",
                        "channel_id": channel_id.to_string(),
                        "name": body.get("name").cloned().unwrap_or(Value::Null),
                        "avatar": body.get("avatar").cloned().unwrap_or(Value::Null),
                    })
                }
                Route::TriggerTyping { .. }
                | Route::DeleteMessage { .. }
                | Route::BulkDeleteMessages { .. }
                | Route::AckMessage { .. } => Value::Null,
            })
        })
    }

    pub fn failing() -> Arc<Self> {
        Self::with(|_| {
            Err(Error::HttpError(
                StatusCode::NOT_FOUND,
                String::from("Unknown Channel"),
            ))
        })
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&Route) -> bool) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|request| matches(&request.route))
            .count()
    }

    pub fn typing_calls(&self) -> usize {
        self.count(|route| matches!(route, Route::TriggerTyping { .. }))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, request: ApiRequest) -> Result<Value> {
        let response = (self.responder)(&request);
        self.requests.lock().push(request);
        response
    }
}

pub(crate) fn context(transport: Arc<MockTransport>) -> ChannelContext {
    ChannelContext {
        config: Arc::new(Config::default()),
        transport,
        users: Arc::new(UserStore::default()),
        images: Arc::new(HttpImageResolver::default()),
        me: ME,
    }
}
