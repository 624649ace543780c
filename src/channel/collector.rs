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

//! Predicate filtered, time boxed subscriptions over a channel's events.
//!
//! A [`Collector`] is ACTIVE until one of its stop conditions fires and then
//! ENDED for good: it stops listening, its collected items are frozen and
//! [`Collector::ended`] resolves with an [`EndReason`]. While active, each
//! match is also yielded through the collector's [`Stream`] implementation.

use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use derive_builder::Builder;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::*;

use super::ChannelEvent;

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
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EndReason {
    LimitReached,
    IdleTimeout,
    Cancelled,
    ChannelGone,
}

#[derive(Debug, Clone, Default, Builder)]
#[builder(default)]
pub struct CollectorOptions {
    /// End after this many matches
    #[builder(setter(strip_option))]
    pub max_matches: Option<usize>,

    /// End after this many inbound events, matching or not
    #[builder(setter(strip_option))]
    pub max_processed: Option<usize>,

    /// End when nothing matched for this long
    #[builder(setter(strip_option))]
    pub idle: Option<Duration>,

    /// Let every inbound event reset the idle timer, not only matches
    pub idle_resets_on_any_event: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectorOutcome<T> {
    pub collected: Vec<T>,
    pub reason: EndReason,
}

/// The channel side of a collector: events are offered to it inline, from
/// the handler that applies them to the channel.
pub(crate) trait CollectorSink: Send + Sync {
    fn offer(&self, event: &ChannelEvent);

    fn close(&self, reason: EndReason);

    fn is_active(&self) -> bool;
}

type Filter<T> = Box<dyn Fn(&ChannelEvent) -> Option<T> + Send>;

struct State<T> {
    collected: Vec<T>,
    reason: Option<EndReason>,
    processed: usize,
    deadline: Option<Instant>,
    matches: Option<mpsc::UnboundedSender<T>>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    filter: Mutex<Filter<T>>,
    options: CollectorOptions,
    ended: watch::Sender<Option<EndReason>>,
}

fn idle_deadline(idle: Option<Duration>) -> Option<Instant> {
    idle.map(|idle| Instant::now() + idle)
}

impl<T> Shared<T> {
    /// First caller wins, later calls are no-ops.
    fn finish(&self, reason: EndReason) -> bool {
        {
            let mut state = self.state.lock();
            if state.reason.is_some() {
                return false;
            }
            state.reason = Some(reason);
            state.matches = None;
            trace!(%reason, processed = state.processed, "collector ended");
        }

        self.ended.send_replace(Some(reason));
        true
    }
}

impl<T: Clone + Send + 'static> CollectorSink for Shared<T> {
    fn offer(&self, event: &ChannelEvent) {
        if matches!(event, ChannelEvent::ChannelDelete) {
            self.finish(EndReason::ChannelGone);
            return;
        }

        if !self.is_active() {
            return;
        }

        let item = (*self.filter.lock())(event);

        let limit_reached = {
            let mut state = self.state.lock();
            if state.reason.is_some() {
                return;
            }

            state.processed += 1;

            if self.options.idle_resets_on_any_event {
                state.deadline = idle_deadline(self.options.idle);
            }

            if let Some(item) = item {
                if let Some(matches) = &state.matches {
                    let _ = matches.send(item.clone());
                }
                state.collected.push(item);
                state.deadline = idle_deadline(self.options.idle);
            }

            self.options
                .max_matches
                .is_some_and(|max| state.collected.len() >= max)
                || self
                    .options
                    .max_processed
                    .is_some_and(|max| state.processed >= max)
        };

        if limit_reached {
            self.finish(EndReason::LimitReached);
        }
    }

    fn close(&self, reason: EndReason) {
        self.finish(reason);
    }

    fn is_active(&self) -> bool {
        self.state.lock().reason.is_none()
    }
}

pub struct Collector<T> {
    shared: Arc<Shared<T>>,
    matches: UnboundedReceiverStream<T>,
    timer: Option<JoinHandle<()>>,
}

impl<T: Clone + Send + 'static> Collector<T> {
    /// Starts an active collector. Events reach it through [`Self::sink`].
    pub(crate) fn new<F>(filter: F, options: CollectorOptions) -> Self
    where
        F: Fn(&ChannelEvent) -> Option<T> + Send + 'static,
    {
        let (matches_tx, matches_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                collected: Vec::new(),
                reason: None,
                processed: 0,
                deadline: idle_deadline(options.idle),
                matches: Some(matches_tx),
            }),
            filter: Mutex::new(Box::new(filter)),
            ended: watch::Sender::new(None),
            options,
        });

        if shared.options.max_matches == Some(0) {
            shared.finish(EndReason::LimitReached);
        }

        let timer = (shared.options.idle.is_some() && shared.is_active())
            .then(|| tokio::spawn(idle_timer(shared.clone())));

        Self {
            shared,
            matches: UnboundedReceiverStream::new(matches_rx),
            timer,
        }
    }

    pub(crate) fn ended_with(reason: EndReason) -> Self {
        let collector = Self::new(|_: &ChannelEvent| None, CollectorOptions::default());
        collector.shared.finish(reason);
        collector
    }

    pub(crate) fn sink(&self) -> Weak<dyn CollectorSink> {
        let sink: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        sink
    }

    pub fn collected(&self) -> Vec<T> {
        self.shared.state.lock().collected.clone()
    }

    /// Resolves once the collector has ended, immediately if it already has.
    pub async fn ended(&self) -> CollectorOutcome<T> {
        let mut ended = self.shared.ended.subscribe();

        let reason = match ended.wait_for(Option::is_some).await {
            Ok(reason) => reason.unwrap_or(EndReason::Cancelled),
            Err(_) => EndReason::Cancelled,
        };

        CollectorOutcome {
            collected: self.collected(),
            reason,
        }
    }
}

impl<T> Collector<T> {
    /// Cancels an active collector. Safe to call any number of times.
    pub fn stop(&self) {
        if self.shared.finish(EndReason::Cancelled) {
            debug!("collector cancelled");
        }
    }

    pub fn is_ended(&self) -> bool {
        self.end_reason().is_some()
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.shared.state.lock().reason
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().collected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Stream for Collector<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.matches.poll_next_unpin(cx)
    }
}

impl<T> Drop for Collector<T> {
    fn drop(&mut self) {
        self.shared.finish(EndReason::Cancelled);

        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Sleeps until the current idle deadline, which matches may push forward
/// in the meantime.
async fn idle_timer<T>(shared: Arc<Shared<T>>) {
    let mut ended = shared.ended.subscribe();

    loop {
        let Some(deadline) = shared.state.lock().deadline else {
            return;
        };

        tokio::select! {
            biased;

            _ = ended.wait_for(Option::is_some) => return,

            _ = sleep_until(deadline) => {
                let expired = shared
                    .state
                    .lock()
                    .deadline
                    .is_some_and(|deadline| deadline <= Instant::now());

                if expired {
                    shared.finish(EndReason::IdleTimeout);
                    return;
                }
            }
        }
    }
}
