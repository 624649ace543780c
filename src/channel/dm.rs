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
use std::fmt;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::*;

use super::capability::{MessageChannel, Operation, TextBasedChannel};
use super::{Channel, ChannelContext, ChannelType};
use crate::services::resolver::{ImageResolvable, data_uri};
use crate::services::types::{Snowflake, Timestamp, User, Webhook};
use crate::services::{ApiRequest, Route, call};
use crate::{Error, Result};

/// Creation payload of a direct message channel.
#[derive(Deserialize, Debug, Clone)]
pub struct DmChannelData {
    pub id: Snowflake,

    #[serde(default)]
    pub recipients: Vec<Value>,

    #[serde(default)]
    pub last_message_id: Option<Snowflake>,

    #[serde(default)]
    pub last_pin_timestamp: Option<Timestamp>,
}

/// A direct message channel between the client user and one recipient.
pub struct DmChannel {
    recipient: User,
    messaging: MessageChannel,
}

impl DmChannel {
    pub fn new(context: &ChannelContext, data: DmChannelData) -> Result<Self> {
        let payload = data
            .recipients
            .into_iter()
            .next()
            .ok_or(Error::MissingRecipient)?;

        let recipient = context.users.resolve_user(payload)?;

        Ok(Self {
            recipient,
            messaging: MessageChannel::new(
                data.id,
                context,
                data.last_message_id,
                data.last_pin_timestamp,
            ),
        })
    }

    pub fn recipient(&self) -> &User {
        &self.recipient
    }

    #[tracing::instrument(level = "trace", skip(self), fields(channel = %self.id()))]
    pub async fn fetch_webhooks(&self) -> Result<HashMap<Snowflake, Webhook>> {
        let context = self.messaging.context();
        let request = ApiRequest::new(Route::GetWebhooks {
            channel_id: self.id(),
        });

        let webhooks: Vec<Webhook> = call(context.transport.as_ref(), request).await?;

        Ok(webhooks
            .into_iter()
            .map(|webhook| (webhook.id, webhook))
            .collect())
    }

    #[tracing::instrument(level = "trace", skip(self, avatar), fields(channel = %self.id()))]
    pub async fn create_webhook(
        &self,
        name: &str,
        avatar: Option<ImageResolvable>,
        reason: Option<&str>,
    ) -> Result<Webhook> {
        let context = self.messaging.context();

        let avatar = match avatar {
            None => None,
            Some(ImageResolvable::DataUri(uri)) => Some(uri),
            Some(input) => {
                let bytes = context.images.resolve_image(input).await?;
                trace!(size = bytes.len(), "avatar resolved");
                Some(data_uri(&bytes))
            }
        };

        let request = ApiRequest::new(Route::CreateWebhook {
            channel_id: self.id(),
        })
        .json(&json!({ "name": name, "avatar": avatar }))?
        .reason(reason);

        call(context.transport.as_ref(), request).await
    }
}

impl Channel for DmChannel {
    fn id(&self) -> Snowflake {
        self.messaging.id()
    }

    fn kind(&self) -> ChannelType {
        ChannelType::Dm
    }
}

impl TextBasedChannel for DmChannel {
    const EXCLUDED: &'static [Operation] = &[Operation::BulkDelete];

    fn messaging(&self) -> &MessageChannel {
        &self.messaging
    }
}

/// Renders as the recipient.
impl fmt::Display for DmChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.recipient, f)
    }
}

impl fmt::Debug for DmChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DmChannel")
            .field("id", &self.id())
            .field("recipient", &self.recipient.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::resolver::UserStore;
    use crate::testing::{MockTransport, context};
    use bytes::Bytes;
    use std::sync::Arc;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    fn payload() -> DmChannelData {
        serde_json::from_value(json!({
            "id": "175928847299117063",
            "type": 1,
            "recipients": [{ "id": "31", "username": "bob", "discriminator": "0002" }],
            "last_message_id": "175928847299117100",
            "last_pin_timestamp": "2025-02-10T08:30:00+00:00",
        }))
        .unwrap()
    }

    fn dm(transport: Arc<MockTransport>) -> DmChannel {
        DmChannel::new(&context(transport), payload()).unwrap()
    }

    #[test]
    fn test_construction() {
        let users = Arc::new(UserStore::default());
        let context = context(MockTransport::ok()).with_users(users.clone());

        let channel = DmChannel::new(&context, payload()).unwrap();

        assert_eq!(channel.id(), Snowflake(175928847299117063));
        assert_eq!(channel.kind(), ChannelType::Dm);
        assert_eq!(channel.recipient().tag(), "bob#0002");
        assert_eq!(users.get(Snowflake(31)).unwrap().username, "bob");
        assert_eq!(
            channel.last_message_id().unwrap(),
            Some(Snowflake(175928847299117100))
        );
        assert_eq!(
            channel.last_pin_at().unwrap().unwrap().to_rfc3339(),
            "2025-02-10T08:30:00+00:00"
        );
        assert_eq!(channel.created_at().timestamp_millis(), 1462015105796);
    }

    #[test]
    fn test_missing_recipient() {
        let mut data = payload();
        data.recipients.clear();

        assert!(matches!(
            DmChannel::new(&context(MockTransport::ok()), data),
            Err(Error::MissingRecipient)
        ));
    }

    #[test]
    fn test_display_is_recipient() {
        let channel = dm(MockTransport::ok());

        assert_eq!(channel.to_string(), "<@31>");
        assert_eq!(channel.to_string(), channel.recipient().to_string());
        assert_ne!(channel.to_string(), channel.mention());
    }

    #[tokio::test]
    async fn test_bulk_delete_unsupported() {
        let transport = MockTransport::ok();
        let channel = dm(transport.clone());

        assert!(!channel.supports(Operation::BulkDelete));
        assert!(matches!(
            channel.bulk_delete(vec![Snowflake(1), Snowflake(2)]).await,
            Err(Error::Unsupported {
                operation: Operation::BulkDelete,
                channel: ChannelType::Dm
            })
        ));
        assert!(transport.requests().is_empty());

        channel.send("still works").await.unwrap();
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_webhooks() {
        let transport = MockTransport::ok();
        let channel = dm(transport.clone());

        let webhooks = channel.fetch_webhooks().await.unwrap();

        assert_eq!(webhooks.len(), 1);
        assert_eq!(webhooks[&Snowflake(900)].name.as_deref(), Some("hook"));
        assert_eq!(
            transport.requests()[0].route,
            Route::GetWebhooks {
                channel_id: channel.id()
            }
        );
    }

    #[tokio::test]
    async fn test_create_webhook_avatar_and_reason() {
        let transport = MockTransport::ok();
        let channel = dm(transport.clone());

        let webhook = channel
            .create_webhook(
                "deploys",
                Some(ImageResolvable::from(Bytes::from_static(PNG))),
                Some("ci bot"),
            )
            .await
            .unwrap();

        assert_eq!(webhook.id, Snowflake(901));
        assert_eq!(webhook.name.as_deref(), Some("deploys"));
        assert_eq!(webhook.avatar.as_deref(), Some(data_uri(PNG).as_str()));

        let request = &transport.requests()[0];
        assert_eq!(request.reason.as_deref(), Some("ci bot"));

        let inline = "data:image/gif;base64,R0lGODlh";
        let webhook = channel
            .create_webhook(
                "inline",
                Some(ImageResolvable::parse(inline).unwrap()),
                None,
            )
            .await
            .unwrap();
        assert_eq!(webhook.avatar.as_deref(), Some(inline));

        let webhook = channel.create_webhook("plain", None, None).await.unwrap();
        assert_eq!(webhook.avatar, None);
        assert_eq!(transport.requests()[2].reason, None);
    }

    #[tokio::test]
    async fn test_webhook_errors_propagate() {
        let channel = dm(MockTransport::failing());

        assert!(matches!(
            channel.fetch_webhooks().await,
            Err(Error::HttpError(_, _))
        ));
        assert!(channel.create_webhook("x", None, None).await.is_err());
    }
}
