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
use std::str::FromStr;

use chrono::TimeZone;
use serde::{Deserialize, Serialize};
use serde_json as json;
use serde_with::{DisplayFromStr, serde_as};

pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Milliseconds since the Unix epoch at 2015-01-01T00:00:00Z
pub const SNOWFLAKE_EPOCH: i64 = 1_420_070_400_000;

/// Time-ordered 64-bit identifier, a decimal string on the wire
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Snowflake(#[serde_as(as = "DisplayFromStr")] pub u64);

impl Snowflake {
    /// Creation time encoded in the top 42 bits.
    pub fn timestamp(&self) -> Timestamp {
        let millis = (self.0 >> 22) as i64 + SNOWFLAKE_EPOCH;
        chrono::Utc
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or_default()
    }

    pub fn from_timestamp(timestamp: Timestamp) -> Self {
        let millis = (timestamp.timestamp_millis() - SNOWFLAKE_EPOCH).max(0) as u64;
        Snowflake(millis << 22)
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Snowflake {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Snowflake)
    }
}

impl From<u64> for Snowflake {
    fn from(value: u64) -> Self {
        Snowflake(value)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: Snowflake,
    pub username: String,

    #[serde(default)]
    pub discriminator: String,

    #[serde(default)]
    pub avatar: Option<String>,

    #[serde(default)]
    pub bot: bool,
}

impl User {
    pub fn tag(&self) -> String {
        format!("{}#{}", self.username, self.discriminator)
    }
}

/// Renders as a mention.
impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<@{}>", self.id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Attachment {
    pub id: Snowflake,
    pub filename: String,
    pub size: u64,
    pub url: String,

    #[serde(default)]
    pub proxy_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub author: User,

    #[serde(default)]
    pub content: String,

    pub timestamp: Timestamp,

    #[serde(default)]
    pub edited_timestamp: Option<Timestamp>,

    #[serde(default)]
    pub tts: bool,

    #[serde(default)]
    pub pinned: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    #[serde(default)]
    pub attachments: Vec<Attachment>,

    #[serde(default)]
    pub embeds: Vec<json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Webhook {
    pub id: Snowflake,
    pub channel_id: Snowflake,

    #[serde(default)]
    pub guild_id: Option<Snowflake>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub avatar: Option<String>,

    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub user: Option<User>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snowflake_wire_format() {
        let id: Snowflake = json::from_value(json::json!("175928847299117063")).unwrap();
        assert_eq!(id, Snowflake(175928847299117063));
        assert_eq!(json::to_value(id).unwrap(), json::json!("175928847299117063"));
    }

    #[test]
    fn test_snowflake_timestamp() {
        let id = Snowflake(175928847299117063);
        assert_eq!(id.timestamp().timestamp_millis(), 1462015105796);

        let back = Snowflake::from_timestamp(id.timestamp());
        assert_eq!(back.timestamp(), id.timestamp());
        assert!(back <= id);
    }

    #[test]
    fn test_user_display_is_mention() {
        let user: User = json::from_value(json::json!({
            "id": "80351110224678912",
            "username": "Nelly",
            "discriminator": "1337",
        }))
        .unwrap();

        assert_eq!(user.to_string(), "<@80351110224678912>");
        assert_eq!(user.tag(), "Nelly#1337");
        assert!(!user.bot);
    }
}
