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
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::*;

use crate::services::types::Snowflake;
use crate::services::{ApiRequest, Route, Transport};
use crate::{Error, Result};

/// How long the service shows an indicator after the last "begin typing".
pub const TYPING_TTL: Duration = Duration::from_secs(10);

struct TypingRecord {
    count: u32,
    expires_at: Instant,
    generation: u64,
    refresh: JoinHandle<()>,
    stopped: watch::Sender<bool>,
}

impl TypingRecord {
    fn finish(self) {
        self.refresh.abort();
        self.stopped.send_replace(true);
    }
}

type Records = Arc<Mutex<HashMap<Snowflake, TypingRecord>>>;

fn remove_generation(records: &Records, user: Snowflake, generation: u64) {
    let mut records = records.lock();

    if records
        .get(&user)
        .is_some_and(|record| record.generation == generation)
        && let Some(record) = records.remove(&user)
    {
        record.finish();
    }
}

/// Resolves once the indicator it was handed out for is gone.
#[derive(Clone, Debug)]
pub struct TypingStopped(watch::Receiver<bool>);

impl TypingStopped {
    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    pub async fn wait(mut self) {
        // A closed channel means the record is gone as well
        let _ = self.0.wait_for(|stopped| *stopped).await;
    }
}

/// Reference counted typing indicators of one channel, keyed by user.
///
/// Every record owns a refresh task that re-sends the indicator while the
/// record lives. Network failures on that path are logged and clear the
/// record, they never reach the caller.
pub struct TypingRegistry {
    channel_id: Snowflake,
    transport: Arc<dyn Transport>,
    refresh_interval: Duration,
    records: Records,
    next_generation: AtomicU64,
}

impl TypingRegistry {
    pub fn new(
        channel_id: Snowflake,
        transport: Arc<dyn Transport>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            channel_id,
            transport,
            refresh_interval,
            records: Arc::default(),
            next_generation: AtomicU64::new(0),
        }
    }

    /// `count` replaces the reference count instead of incrementing it.
    pub fn start(&self, user: Snowflake, count: Option<u32>) -> Result<TypingStopped> {
        if count == Some(0) {
            return Err(Error::InvalidArgument("typing count must be at least 1"));
        }

        let mut records = self.records.lock();

        if let Some(record) = records.get_mut(&user) {
            record.count = count.unwrap_or(record.count + 1);
            trace!(channel = %self.channel_id, %user, count = record.count, "typing count raised");
            return Ok(TypingStopped(record.stopped.subscribe()));
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (stopped, stopped_rx) = watch::channel(false);

        let refresh = tokio::spawn(refresh_task(
            self.records.clone(),
            self.transport.clone(),
            self.channel_id,
            user,
            generation,
            self.refresh_interval,
        ));

        records.insert(
            user,
            TypingRecord {
                count: count.unwrap_or(1),
                expires_at: Instant::now() + TYPING_TTL,
                generation,
                refresh,
                stopped,
            },
        );

        debug!(channel = %self.channel_id, %user, "typing started");

        Ok(TypingStopped(stopped_rx))
    }

    /// Returns whether the record was removed.
    pub fn stop(&self, user: Snowflake, force: bool) -> bool {
        let mut records = self.records.lock();

        let Some(record) = records.get_mut(&user) else {
            return false;
        };

        record.count = record.count.saturating_sub(1);

        if (record.count == 0 || force)
            && let Some(record) = records.remove(&user)
        {
            record.finish();
            debug!(channel = %self.channel_id, %user, force, "typing stopped");
            return true;
        }

        false
    }

    pub fn is_typing(&self, user: Snowflake) -> bool {
        self.records.lock().contains_key(&user)
    }

    pub fn count(&self, user: Snowflake) -> u32 {
        self.records
            .lock()
            .get(&user)
            .map(|record| record.count)
            .unwrap_or(0)
    }

    pub fn expires_at(&self, user: Snowflake) -> Option<Instant> {
        self.records.lock().get(&user).map(|record| record.expires_at)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        let records = std::mem::take(&mut *self.records.lock());

        for (_, record) in records {
            record.finish();
        }
    }
}

impl Drop for TypingRegistry {
    fn drop(&mut self) {
        self.clear();
    }
}

async fn refresh_task(
    records: Records,
    transport: Arc<dyn Transport>,
    channel_id: Snowflake,
    user: Snowflake,
    generation: u64,
    refresh_interval: Duration,
) {
    loop {
        let request = ApiRequest::new(Route::TriggerTyping { channel_id });

        if let Err(error) = transport.request(request).await {
            warn!(channel = %channel_id, %user, %error, "typing indicator failed, clearing");
            remove_generation(&records, user, generation);
            return;
        }

        match records.lock().get_mut(&user) {
            Some(record) if record.generation == generation => {
                record.expires_at = Instant::now() + TYPING_TTL;
            }
            _ => return,
        }

        sleep(refresh_interval).await;

        let expired = records
            .lock()
            .get(&user)
            .is_none_or(|record| {
                record.generation != generation || record.expires_at <= Instant::now()
            });

        if expired {
            trace!(channel = %channel_id, %user, "typing indicator expired");
            remove_generation(&records, user, generation);
            return;
        }
    }
}
