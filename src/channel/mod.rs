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

use serde::{Deserialize, Serialize};

use crate::Config;
use crate::services::Transport;
use crate::services::resolver::{HttpImageResolver, ImageResolver, UserResolver, UserStore};
use crate::services::rest::RestClient;
use crate::services::types::{Message, Snowflake, Timestamp};

pub mod cache;
pub mod capability;
pub mod collector;
pub mod dm;
pub mod text;
pub mod typing;

#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChannelType {
    Dm,
    Text,
}

pub trait Channel {
    fn id(&self) -> Snowflake;

    fn kind(&self) -> ChannelType;

    fn created_at(&self) -> Timestamp {
        self.id().timestamp()
    }

    fn mention(&self) -> String {
        format!("<#{}>", self.id())
    }
}

/// Inbound events the gateway routes to a single channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    MessageCreate(Message),
    MessageDelete {
        message_id: Snowflake,
    },
    TypingStart {
        user_id: Snowflake,
        timestamp: Timestamp,
    },
    PinsUpdate {
        last_pin_timestamp: Option<Timestamp>,
    },
    ChannelDelete,
}

impl ChannelEvent {
    pub fn message(&self) -> Option<&Message> {
        match self {
            ChannelEvent::MessageCreate(message) => Some(message),
            _ => None,
        }
    }
}

/// Collaborators shared by every channel of one client.
#[derive(Clone)]
pub struct ChannelContext {
    pub config: Arc<Config>,
    pub transport: Arc<dyn Transport>,
    pub users: Arc<dyn UserResolver>,
    pub images: Arc<dyn ImageResolver>,

    /// The connected account, owner of the typing indicators we send
    pub me: Snowflake,
}

impl ChannelContext {
    pub fn new(config: Config, me: Snowflake) -> Self {
        let transport = Arc::new(RestClient::new(&config));

        Self {
            config: Arc::new(config),
            transport,
            users: Arc::new(UserStore::default()),
            images: Arc::new(HttpImageResolver::default()),
            me,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_users(mut self, users: Arc<dyn UserResolver>) -> Self {
        self.users = users;
        self
    }

    pub fn with_images(mut self, images: Arc<dyn ImageResolver>) -> Self {
        self.images = images;
        self
    }
}
