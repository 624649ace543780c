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

use std::collections::{HashMap, VecDeque};

use crate::services::types::{Message, Snowflake};

/// Insertion ordered, bounded message store of a single channel.
///
/// Also tracks the channel's last message pointer, which advances on every
/// [`MessageCache::store`] even when retention is disabled.
#[derive(Debug)]
pub struct MessageCache {
    capacity: usize,
    messages: HashMap<Snowflake, Message>,
    order: VecDeque<Snowflake>,
    last_message_id: Option<Snowflake>,
}

impl MessageCache {
    pub fn new(capacity: usize, last_message_id: Option<Snowflake>) -> Self {
        Self {
            capacity,
            messages: HashMap::new(),
            order: VecDeque::new(),
            last_message_id,
        }
    }

    /// Returns the evicted message, if any.
    pub fn store(&mut self, message: Message) -> Option<Message> {
        let id = message.id;
        self.last_message_id = Some(id);

        if self.capacity == 0 {
            return None;
        }

        if self.messages.insert(id, message).is_some() {
            return None;
        }

        self.order.push_back(id);

        if self.order.len() > self.capacity {
            let oldest = self.order.pop_front()?;
            return self.messages.remove(&oldest);
        }

        None
    }

    pub fn get(&self, id: Snowflake) -> Option<&Message> {
        self.messages.get(&id)
    }

    pub fn remove(&mut self, id: Snowflake) -> Option<Message> {
        let message = self.messages.remove(&id)?;
        self.order.retain(|cached| *cached != id);
        Some(message)
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.order.iter().filter_map(|id| self.messages.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last_message_id(&self) -> Option<Snowflake> {
        self.last_message_id
    }
}
