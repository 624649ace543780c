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

pub use reqwest::StatusCode;

pub mod channel;
mod config;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{
    Channel, ChannelContext, ChannelEvent, ChannelType,
    capability::{MessageChannel, Operation, TextBasedChannel},
    collector::{Collector, CollectorOptions, CollectorOutcome, EndReason},
    dm::DmChannel,
    text::TextChannel,
};
pub use config::{Config, ConfigBuilder, ConfigBuilderError};
pub use services::types::{Message, Snowflake, User, Webhook};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    ReqwestMiddleware(#[from] reqwest_middleware::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error("{0}")]
    HttpError(reqwest::StatusCode, String),

    #[error(transparent)]
    Config(#[from] ::config::ConfigError),

    #[error("{operation} is not supported on {channel} channels")]
    Unsupported {
        operation: channel::capability::Operation,
        channel: channel::ChannelType,
    },

    #[error("Collector ended: {reason}")]
    CollectorEnded {
        reason: channel::collector::EndReason,
        collected: Vec<Message>,
    },

    #[error("Direct message payload has no recipient")]
    MissingRecipient,

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
