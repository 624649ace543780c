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

//! Messaging operations shared by every text based channel type.
//!
//! A channel type gets the whole operation set by implementing
//! [`TextBasedChannel`] and handing out its [`MessageChannel`] state. Types
//! that cannot support some operations list them in
//! [`TextBasedChannel::EXCLUDED`]; calling one of those fails with
//! [`Error::Unsupported`] before anything else happens.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use derive_builder::Builder;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::*;

use super::cache::MessageCache;
use super::collector::{Collector, CollectorOptions, CollectorOutcome, CollectorSink, EndReason};
use super::typing::{TypingRegistry, TypingStopped};
use super::{Channel, ChannelContext, ChannelEvent};
use crate::services::types::{Message, Snowflake, Timestamp};
use crate::services::{ApiRequest, FileAttachment, Route, Transport, call};
use crate::{Error, Result};

const MAX_CONTENT_LENGTH: usize = 2000;
const MAX_BULK_DELETE: usize = 100;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "camelCase")]
pub enum Operation {
    Send,
    SendEmbed,
    SendFile,
    SendCode,
    FetchMessage,
    FetchMessages,
    FetchPinnedMessages,
    Search,
    StartTyping,
    StopTyping,
    Typing,
    TypingCount,
    #[strum(serialize = "lastMessageID")]
    LastMessageId,
    LastPinAt,
    CreateCollector,
    CreateMessageCollector,
    AwaitMessages,
    BulkDelete,
    Acknowledge,
    CacheMessage,
}

#[derive(Debug, Clone, Default, Builder)]
#[builder(default)]
pub struct MessageOptions {
    #[builder(setter(into, strip_option))]
    pub content: Option<String>,

    pub tts: bool,

    /// Generated when absent
    #[builder(setter(into, strip_option))]
    pub nonce: Option<String>,

    #[builder(setter(strip_option))]
    pub embed: Option<Value>,

    pub files: Vec<FileAttachment>,

    /// Wrap the content in a code block of this language, which may be empty
    #[builder(setter(into, strip_option))]
    pub code: Option<String>,

    /// Overrides [`crate::Config::disable_everyone`]
    #[builder(setter(strip_option))]
    pub disable_everyone: Option<bool>,
}

impl From<&str> for MessageOptions {
    fn from(content: &str) -> Self {
        content.to_owned().into()
    }
}

impl From<String> for MessageOptions {
    fn from(content: String) -> Self {
        Self {
            content: Some(content),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Builder)]
#[builder(default, setter(strip_option))]
pub struct FetchMessagesOptions {
    /// 1 to 100
    pub limit: Option<u8>,
    pub before: Option<Snowflake>,
    pub after: Option<Snowflake>,
    pub around: Option<Snowflake>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortBy {
    Timestamp,
    Relevance,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default, Builder)]
#[builder(default, setter(into, strip_option))]
pub struct SearchQuery {
    pub content: Option<String>,
    pub author_id: Option<Snowflake>,
    pub mentions: Option<Snowflake>,

    /// `link`, `embed`, `file`, `video`, `image` or `sound`
    pub has: Option<String>,

    pub max_id: Option<Snowflake>,
    pub min_id: Option<Snowflake>,

    /// Shorthand for `max_id`
    pub before: Option<Timestamp>,

    /// Shorthand for `min_id`
    pub after: Option<Timestamp>,

    pub channel_id: Option<Snowflake>,
    pub nsfw: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub sort_by: Option<SortBy>,
    pub sort_order: Option<SortOrder>,
}

impl SearchQuery {
    fn to_query(&self) -> Vec<(&'static str, String)> {
        let max_id = self.max_id.or(self.before.map(Snowflake::from_timestamp));
        let min_id = self.min_id.or(self.after.map(Snowflake::from_timestamp));

        let pairs = [
            ("content", self.content.clone()),
            ("author_id", self.author_id.map(|id| id.to_string())),
            ("mentions", self.mentions.map(|id| id.to_string())),
            ("has", self.has.clone()),
            ("max_id", max_id.map(|id| id.to_string())),
            ("min_id", min_id.map(|id| id.to_string())),
            ("channel_id", self.channel_id.map(|id| id.to_string())),
            ("include_nsfw", self.nsfw.map(|nsfw| nsfw.to_string())),
            ("limit", self.limit.map(|limit| limit.to_string())),
            ("offset", self.offset.map(|offset| offset.to_string())),
            ("sort_by", self.sort_by.map(|sort| sort.to_string())),
            ("sort_order", self.sort_order.map(|order| order.to_string())),
        ];

        pairs
            .into_iter()
            .filter_map(|(name, value)| value.map(|value| (name, value)))
            .collect()
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SearchResults {
    pub total_results: u64,

    /// Every hit comes with its surrounding context messages
    pub messages: Vec<Vec<Message>>,
}

#[derive(Debug, Clone, Default)]
pub struct AwaitMessagesOptions {
    pub collector: CollectorOptions,

    /// End reasons that fail the call instead of resolving it
    pub errors: Vec<EndReason>,
}

impl From<CollectorOptions> for AwaitMessagesOptions {
    fn from(collector: CollectorOptions) -> Self {
        Self {
            collector,
            errors: Vec::new(),
        }
    }
}

fn escape_code_block(content: &str) -> String {
    content.replace("```", "`\u{200b}``")
}

fn defuse_everyone(content: &str) -> String {
    content
        .replace("@everyone", "@\u{200b}everyone")
        .replace("@here", "@\u{200b}here")
}

fn generate_nonce() -> String {
    rand::random::<u64>().to_string()
}

fn message_filter<P>(predicate: P) -> impl Fn(&ChannelEvent) -> Option<Message> + Send + 'static
where
    P: Fn(&Message) -> bool + Send + 'static,
{
    move |event: &ChannelEvent| event.message().filter(|message| predicate(message)).cloned()
}

/// Messaging state a channel instance owns exclusively.
pub struct MessageChannel {
    id: Snowflake,
    context: ChannelContext,
    messages: Mutex<MessageCache>,
    typing: TypingRegistry,
    last_pin_at: Mutex<Option<Timestamp>>,
    collectors: Mutex<Vec<Weak<dyn CollectorSink>>>,
    deleted: AtomicBool,
}

impl MessageChannel {
    pub fn new(
        id: Snowflake,
        context: &ChannelContext,
        last_message_id: Option<Snowflake>,
        last_pin_at: Option<Timestamp>,
    ) -> Self {
        Self {
            id,
            context: context.clone(),
            messages: Mutex::new(MessageCache::new(
                context.config.message_cache_max_size,
                last_message_id,
            )),
            typing: TypingRegistry::new(
                id,
                context.transport.clone(),
                context.config.typing_refresh_interval,
            ),
            last_pin_at: Mutex::new(last_pin_at),
            collectors: Mutex::new(Vec::new()),
            deleted: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Snowflake {
        self.id
    }

    pub fn context(&self) -> &ChannelContext {
        &self.context
    }

    fn transport(&self) -> &dyn Transport {
        self.context.transport.as_ref()
    }

    pub fn typing_registry(&self) -> &TypingRegistry {
        &self.typing
    }

    pub fn cached_message(&self, id: Snowflake) -> Option<Message> {
        self.messages.lock().get(id).cloned()
    }

    /// Oldest first.
    pub fn cached_messages(&self) -> Vec<Message> {
        self.messages.lock().iter().cloned().collect()
    }

    pub fn last_message_id(&self) -> Option<Snowflake> {
        self.messages.lock().last_message_id()
    }

    pub fn last_pin_at(&self) -> Option<Timestamp> {
        *self.last_pin_at.lock()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    fn live_collectors(&self) -> Vec<Arc<dyn CollectorSink>> {
        let mut collectors = self.collectors.lock();
        collectors.retain(|sink| sink.upgrade().is_some_and(|sink| sink.is_active()));
        collectors.iter().filter_map(Weak::upgrade).collect()
    }

    /// Applies an inbound event to the channel state, then offers it to
    /// every live collector before returning.
    pub fn dispatch(&self, event: ChannelEvent) {
        match &event {
            ChannelEvent::MessageCreate(message) => {
                if message.channel_id != self.id {
                    debug!(
                        channel = %self.id,
                        message_channel = %message.channel_id,
                        "ignoring message of another channel"
                    );
                    return;
                }

                self.cache_message(message.clone());
            }
            ChannelEvent::MessageDelete { message_id } => {
                self.messages.lock().remove(*message_id);
            }
            ChannelEvent::PinsUpdate { last_pin_timestamp } => {
                *self.last_pin_at.lock() = *last_pin_timestamp;
            }
            ChannelEvent::TypingStart { .. } => {}
            ChannelEvent::ChannelDelete => {
                self.deleted.store(true, Ordering::Release);
                self.typing.clear();
            }
        }

        // Collector filters run without the registry lock held
        for sink in self.live_collectors() {
            sink.offer(&event);
        }
    }

    pub(crate) fn cache_message(&self, message: Message) {
        if let Some(evicted) = self.messages.lock().store(message) {
            trace!(channel = %self.id, evicted = %evicted.id, "message evicted from cache");
        }
    }

    #[tracing::instrument(level = "trace", skip(self, options), fields(channel = %self.id))]
    pub(crate) async fn send(&self, options: MessageOptions) -> Result<Message> {
        let MessageOptions {
            content,
            tts,
            nonce,
            embed,
            files,
            code,
            disable_everyone,
        } = options;

        let mut content = content.unwrap_or_default();

        if let Some(language) = code {
            content = format!("```{language}\n{}\n```", escape_code_block(&content));
        }

        if disable_everyone.unwrap_or(self.context.config.disable_everyone) {
            content = defuse_everyone(&content);
        }

        if content.is_empty() && embed.is_none() && files.is_empty() {
            return Err(Error::InvalidArgument("cannot send an empty message"));
        }

        if content.chars().count() > MAX_CONTENT_LENGTH {
            return Err(Error::InvalidArgument(
                "message content must be 2000 or fewer characters",
            ));
        }

        #[derive(Serialize)]
        struct CreateMessage<'a> {
            #[serde(skip_serializing_if = "str::is_empty")]
            content: &'a str,
            tts: bool,
            nonce: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            embed: Option<&'a Value>,
        }

        let nonce = nonce.unwrap_or_else(generate_nonce);
        let body = CreateMessage {
            content: &content,
            tts,
            nonce: &nonce,
            embed: embed.as_ref(),
        };

        let request = ApiRequest::new(Route::CreateMessage {
            channel_id: self.id,
        })
        .json(&body)?
        .files(files);

        let message: Message = call(self.transport(), request).await?;
        self.cache_message(message.clone());

        Ok(message)
    }

    pub(crate) async fn fetch_message(&self, message_id: Snowflake) -> Result<Message> {
        let request = ApiRequest::new(Route::GetMessage {
            channel_id: self.id,
            message_id,
        });

        let message: Message = call(self.transport(), request).await?;
        self.cache_message(message.clone());

        Ok(message)
    }

    pub(crate) async fn fetch_messages(
        &self,
        options: FetchMessagesOptions,
    ) -> Result<Vec<Message>> {
        let mut request = ApiRequest::new(Route::GetMessages {
            channel_id: self.id,
        });

        if let Some(limit) = options.limit {
            if !(1..=100).contains(&limit) {
                return Err(Error::InvalidArgument("limit must be between 1 and 100"));
            }
            request = request.query("limit", limit);
        }

        for (name, value) in [
            ("before", options.before),
            ("after", options.after),
            ("around", options.around),
        ] {
            if let Some(value) = value {
                request = request.query(name, value);
            }
        }

        let messages: Vec<Message> = call(self.transport(), request).await?;

        let mut chronological: Vec<&Message> = messages.iter().collect();
        chronological.sort_by_key(|message| message.id);
        for message in chronological {
            self.cache_message(message.clone());
        }

        Ok(messages)
    }

    pub(crate) async fn fetch_pinned_messages(&self) -> Result<Vec<Message>> {
        let request = ApiRequest::new(Route::GetPins {
            channel_id: self.id,
        });

        call(self.transport(), request).await
    }

    pub(crate) async fn search(&self, query: SearchQuery) -> Result<SearchResults> {
        let mut request = ApiRequest::new(Route::SearchMessages {
            channel_id: self.id,
        });

        for (name, value) in query.to_query() {
            request = request.query(name, value);
        }

        call(self.transport(), request).await
    }

    pub(crate) async fn bulk_delete(&self, ids: Vec<Snowflake>) -> Result<Vec<Snowflake>> {
        let request = match ids.as_slice() {
            [] => return Err(Error::InvalidArgument("no messages to delete")),
            [message_id] => ApiRequest::new(Route::DeleteMessage {
                channel_id: self.id,
                message_id: *message_id,
            }),
            ids if ids.len() > MAX_BULK_DELETE => {
                return Err(Error::InvalidArgument(
                    "cannot bulk delete more than 100 messages",
                ));
            }
            ids => ApiRequest::new(Route::BulkDeleteMessages {
                channel_id: self.id,
            })
            .json(&json!({ "messages": ids }))?,
        };

        self.transport().request(request).await?;

        let mut messages = self.messages.lock();
        for id in &ids {
            messages.remove(*id);
        }

        Ok(ids)
    }

    pub(crate) async fn acknowledge(&self) -> Result<()> {
        let Some(message_id) = self.last_message_id() else {
            return Ok(());
        };

        let request = ApiRequest::new(Route::AckMessage {
            channel_id: self.id,
            message_id,
        });

        self.transport().request(request).await?;
        Ok(())
    }

    pub(crate) fn create_collector<T, F>(
        &self,
        filter: F,
        options: CollectorOptions,
    ) -> Collector<T>
    where
        T: Clone + Send + 'static,
        F: Fn(&ChannelEvent) -> Option<T> + Send + 'static,
    {
        if self.is_deleted() {
            return Collector::ended_with(EndReason::ChannelGone);
        }

        let collector = Collector::new(filter, options);
        if !collector.is_ended() {
            self.collectors.lock().push(collector.sink());
        }

        collector
    }
}

impl Drop for MessageChannel {
    fn drop(&mut self) {
        for sink in self.collectors.get_mut().drain(..) {
            if let Some(sink) = sink.upgrade() {
                sink.close(EndReason::ChannelGone);
            }
        }
    }
}

/// The shared operation set of text based channels.
#[allow(async_fn_in_trait)]
pub trait TextBasedChannel: Channel {
    /// Operations this channel type does not support
    const EXCLUDED: &'static [Operation] = &[];

    fn messaging(&self) -> &MessageChannel;

    fn supports(&self, operation: Operation) -> bool {
        !Self::EXCLUDED.contains(&operation)
    }

    fn ensure_supported(&self, operation: Operation) -> Result<()> {
        if self.supports(operation) {
            Ok(())
        } else {
            Err(Error::Unsupported {
                operation,
                channel: self.kind(),
            })
        }
    }

    fn dispatch(&self, event: ChannelEvent) {
        self.messaging().dispatch(event)
    }

    /// Cache lookup only, `None` when the message is not cached.
    fn cached_message(&self, id: Snowflake) -> Option<Message> {
        self.messaging().cached_message(id)
    }

    async fn send(&self, options: impl Into<MessageOptions>) -> Result<Message> {
        self.ensure_supported(Operation::Send)?;
        self.messaging().send(options.into()).await
    }

    async fn send_embed(&self, embed: Value, content: Option<&str>) -> Result<Message> {
        self.ensure_supported(Operation::SendEmbed)?;
        self.messaging()
            .send(MessageOptions {
                content: content.map(str::to_owned),
                embed: Some(embed),
                ..Default::default()
            })
            .await
    }

    async fn send_file(&self, file: FileAttachment, content: Option<&str>) -> Result<Message> {
        self.ensure_supported(Operation::SendFile)?;
        self.messaging()
            .send(MessageOptions {
                content: content.map(str::to_owned),
                files: vec![file],
                ..Default::default()
            })
            .await
    }

    async fn send_code(&self, language: &str, content: &str) -> Result<Message> {
        self.ensure_supported(Operation::SendCode)?;
        self.messaging()
            .send(MessageOptions {
                content: Some(content.to_owned()),
                code: Some(language.to_owned()),
                ..Default::default()
            })
            .await
    }

    async fn fetch_message(&self, id: Snowflake) -> Result<Message> {
        self.ensure_supported(Operation::FetchMessage)?;
        self.messaging().fetch_message(id).await
    }

    async fn fetch_messages(&self, options: FetchMessagesOptions) -> Result<Vec<Message>> {
        self.ensure_supported(Operation::FetchMessages)?;
        self.messaging().fetch_messages(options).await
    }

    async fn fetch_pinned_messages(&self) -> Result<Vec<Message>> {
        self.ensure_supported(Operation::FetchPinnedMessages)?;
        self.messaging().fetch_pinned_messages().await
    }

    async fn search(&self, query: SearchQuery) -> Result<SearchResults> {
        self.ensure_supported(Operation::Search)?;
        self.messaging().search(query).await
    }

    /// Starts or extends our typing indicator in this channel.
    fn start_typing(&self, count: Option<u32>) -> Result<TypingStopped> {
        self.ensure_supported(Operation::StartTyping)?;
        let messaging = self.messaging();
        messaging.typing.start(messaging.context.me, count)
    }

    fn stop_typing(&self, force: bool) -> Result<()> {
        self.ensure_supported(Operation::StopTyping)?;
        let messaging = self.messaging();
        messaging.typing.stop(messaging.context.me, force);
        Ok(())
    }

    fn typing(&self) -> Result<bool> {
        self.ensure_supported(Operation::Typing)?;
        let messaging = self.messaging();
        Ok(messaging.typing.is_typing(messaging.context.me))
    }

    fn typing_count(&self) -> Result<u32> {
        self.ensure_supported(Operation::TypingCount)?;
        let messaging = self.messaging();
        Ok(messaging.typing.count(messaging.context.me))
    }

    fn last_message_id(&self) -> Result<Option<Snowflake>> {
        self.ensure_supported(Operation::LastMessageId)?;
        Ok(self.messaging().last_message_id())
    }

    fn last_pin_at(&self) -> Result<Option<Timestamp>> {
        self.ensure_supported(Operation::LastPinAt)?;
        Ok(self.messaging().last_pin_at())
    }

    fn create_collector<T, F>(&self, filter: F, options: CollectorOptions) -> Result<Collector<T>>
    where
        T: Clone + Send + 'static,
        F: Fn(&ChannelEvent) -> Option<T> + Send + 'static,
    {
        self.ensure_supported(Operation::CreateCollector)?;
        Ok(self.messaging().create_collector(filter, options))
    }

    fn create_message_collector<P>(
        &self,
        predicate: P,
        options: CollectorOptions,
    ) -> Result<Collector<Message>>
    where
        P: Fn(&Message) -> bool + Send + 'static,
    {
        self.ensure_supported(Operation::CreateMessageCollector)?;
        Ok(self
            .messaging()
            .create_collector(message_filter(predicate), options))
    }

    async fn await_messages<P>(
        &self,
        predicate: P,
        options: impl Into<AwaitMessagesOptions>,
    ) -> Result<Vec<Message>>
    where
        P: Fn(&Message) -> bool + Send + 'static,
    {
        self.ensure_supported(Operation::AwaitMessages)?;
        let options = options.into();

        let collector = self
            .messaging()
            .create_collector(message_filter(predicate), options.collector);

        let CollectorOutcome { collected, reason } = collector.ended().await;

        if options.errors.contains(&reason) {
            return Err(Error::CollectorEnded { reason, collected });
        }

        Ok(collected)
    }

    async fn bulk_delete(&self, ids: Vec<Snowflake>) -> Result<Vec<Snowflake>> {
        self.ensure_supported(Operation::BulkDelete)?;
        self.messaging().bulk_delete(ids).await
    }

    /// Marks the last message as read.
    async fn acknowledge(&self) -> Result<()> {
        self.ensure_supported(Operation::Acknowledge)?;
        self.messaging().acknowledge().await
    }

    fn cache_message(&self, message: Message) -> Result<()> {
        self.ensure_supported(Operation::CacheMessage)?;
        self.messaging().cache_message(message);
        Ok(())
    }
}
