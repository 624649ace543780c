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

use std::fmt;

use serde::Deserialize;

use super::capability::{MessageChannel, TextBasedChannel};
use super::{Channel, ChannelContext, ChannelType};
use crate::services::types::{Snowflake, Timestamp};

#[derive(Deserialize, Debug, Clone)]
pub struct TextChannelData {
    pub id: Snowflake,

    #[serde(default)]
    pub guild_id: Option<Snowflake>,

    pub name: String,

    #[serde(default)]
    pub topic: Option<String>,

    #[serde(default)]
    pub nsfw: bool,

    #[serde(default)]
    pub last_message_id: Option<Snowflake>,

    #[serde(default)]
    pub last_pin_timestamp: Option<Timestamp>,
}

/// A text channel of a guild. Supports every messaging operation.
pub struct TextChannel {
    guild_id: Option<Snowflake>,
    name: String,
    topic: Option<String>,
    nsfw: bool,
    messaging: MessageChannel,
}

impl TextChannel {
    pub fn new(context: &ChannelContext, data: TextChannelData) -> Self {
        Self {
            guild_id: data.guild_id,
            name: data.name,
            topic: data.topic,
            nsfw: data.nsfw,
            messaging: MessageChannel::new(
                data.id,
                context,
                data.last_message_id,
                data.last_pin_timestamp,
            ),
        }
    }

    pub fn guild_id(&self) -> Option<Snowflake> {
        self.guild_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn nsfw(&self) -> bool {
        self.nsfw
    }
}

impl Channel for TextChannel {
    fn id(&self) -> Snowflake {
        self.messaging.id()
    }

    fn kind(&self) -> ChannelType {
        ChannelType::Text
    }
}

impl TextBasedChannel for TextChannel {
    fn messaging(&self) -> &MessageChannel {
        &self.messaging
    }
}

impl fmt::Display for TextChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mention())
    }
}

impl fmt::Debug for TextChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextChannel")
            .field("id", &self.id())
            .field("guild_id", &self.guild_id)
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::capability::Operation;
    use crate::channel::ChannelEvent;
    use crate::channel::collector::CollectorOptions;
    use crate::services::Route;
    use crate::testing::{MockTransport, context, message};
    use serde_json::json;
    use std::sync::Arc;

    fn text(transport: Arc<MockTransport>) -> TextChannel {
        let data = serde_json::from_value(json!({
            "id": "1",
            "guild_id": "100",
            "name": "general",
            "topic": "anything goes",
            "nsfw": false,
        }))
        .unwrap();

        TextChannel::new(&context(transport), data)
    }

    #[test]
    fn test_properties_and_display() {
        let channel = text(MockTransport::ok());

        assert_eq!(channel.name(), "general");
        assert_eq!(channel.topic(), Some("anything goes"));
        assert_eq!(channel.guild_id(), Some(Snowflake(100)));
        assert!(!channel.nsfw());
        assert_eq!(channel.kind(), ChannelType::Text);
        assert_eq!(channel.to_string(), "<#1>");
        assert_eq!(channel.last_message_id().unwrap(), None);
    }

    #[tokio::test]
    async fn test_supports_everything() {
        let transport = MockTransport::ok();
        let channel = text(transport.clone());

        assert!(channel.supports(Operation::BulkDelete));

        channel.bulk_delete(vec![Snowflake(4), Snowflake(5)]).await.unwrap();
        assert_eq!(
            transport.requests()[0].route,
            Route::BulkDeleteMessages {
                channel_id: Snowflake(1)
            }
        );
        assert_eq!(
            transport.requests()[0].body.as_ref().unwrap()["messages"],
            json!(["4", "5"])
        );
    }

    #[tokio::test]
    async fn test_message_collector() {
        let channel = text(MockTransport::ok());

        let collector = channel
            .create_message_collector(|m| m.content.len() > 2, CollectorOptions::default())
            .unwrap();

        channel.dispatch(ChannelEvent::MessageCreate(message(1, "hi")));
        channel.dispatch(ChannelEvent::MessageCreate(message(2, "hello")));
        channel.dispatch(ChannelEvent::ChannelDelete);

        let outcome = collector.ended().await;
        assert_eq!(outcome.collected, vec![message(2, "hello")]);
        assert_eq!(channel.cached_message(Snowflake(1)), Some(message(1, "hi")));
    }
}
