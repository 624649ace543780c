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

use reqwest::Method;

use super::types::Snowflake;

#[derive(Debug, Clone, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Route {
    CreateMessage {
        channel_id: Snowflake,
    },
    GetMessage {
        channel_id: Snowflake,
        message_id: Snowflake,
    },
    GetMessages {
        channel_id: Snowflake,
    },
    GetPins {
        channel_id: Snowflake,
    },
    SearchMessages {
        channel_id: Snowflake,
    },
    TriggerTyping {
        channel_id: Snowflake,
    },
    DeleteMessage {
        channel_id: Snowflake,
        message_id: Snowflake,
    },
    BulkDeleteMessages {
        channel_id: Snowflake,
    },
    AckMessage {
        channel_id: Snowflake,
        message_id: Snowflake,
    },
    GetWebhooks {
        channel_id: Snowflake,
    },
    CreateWebhook {
        channel_id: Snowflake,
    },
}

impl Route {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn method(&self) -> Method {
        match self {
            Route::GetMessage { .. }
            | Route::GetMessages { .. }
            | Route::GetPins { .. }
            | Route::SearchMessages { .. }
            | Route::GetWebhooks { .. } => Method::GET,

            Route::DeleteMessage { .. } => Method::DELETE,

            Route::CreateMessage { .. }
            | Route::TriggerTyping { .. }
            | Route::BulkDeleteMessages { .. }
            | Route::AckMessage { .. }
            | Route::CreateWebhook { .. } => Method::POST,
        }
    }

    /// Path relative to the api base, without a leading slash.
    pub fn path(&self) -> String {
        match self {
            Route::CreateMessage { channel_id } | Route::GetMessages { channel_id } => {
                format!("channels/{channel_id}/messages")
            }
            Route::GetMessage {
                channel_id,
                message_id,
            }
            | Route::DeleteMessage {
                channel_id,
                message_id,
            } => format!("channels/{channel_id}/messages/{message_id}"),
            Route::GetPins { channel_id } => format!("channels/{channel_id}/pins"),
            Route::SearchMessages { channel_id } => {
                format!("channels/{channel_id}/messages/search")
            }
            Route::TriggerTyping { channel_id } => format!("channels/{channel_id}/typing"),
            Route::BulkDeleteMessages { channel_id } => {
                format!("channels/{channel_id}/messages/bulk-delete")
            }
            Route::AckMessage {
                channel_id,
                message_id,
            } => format!("channels/{channel_id}/messages/{message_id}/ack"),
            Route::GetWebhooks { channel_id } | Route::CreateWebhook { channel_id } => {
                format!("channels/{channel_id}/webhooks")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_paths() {
        let channel_id = Snowflake(10);
        let message_id = Snowflake(20);

        let check = |route: Route, method: Method, path: &str| {
            assert_eq!(route.method(), method);
            assert_eq!(route.path(), path);
        };

        check(
            Route::CreateMessage { channel_id },
            Method::POST,
            "channels/10/messages",
        );
        check(
            Route::GetMessage {
                channel_id,
                message_id,
            },
            Method::GET,
            "channels/10/messages/20",
        );
        check(
            Route::DeleteMessage {
                channel_id,
                message_id,
            },
            Method::DELETE,
            "channels/10/messages/20",
        );
        check(
            Route::BulkDeleteMessages { channel_id },
            Method::POST,
            "channels/10/messages/bulk-delete",
        );
        check(
            Route::AckMessage {
                channel_id,
                message_id,
            },
            Method::POST,
            "channels/10/messages/20/ack",
        );
        check(
            Route::SearchMessages { channel_id },
            Method::GET,
            "channels/10/messages/search",
        );
        check(Route::GetPins { channel_id }, Method::GET, "channels/10/pins");
        check(
            Route::TriggerTyping { channel_id },
            Method::POST,
            "channels/10/typing",
        );
        check(
            Route::CreateWebhook { channel_id },
            Method::POST,
            "channels/10/webhooks",
        );
    }

    #[test]
    fn test_route_name() {
        let route = Route::BulkDeleteMessages {
            channel_id: Snowflake(1),
        };
        assert_eq!(route.name(), "bulk_delete_messages");
    }
}
