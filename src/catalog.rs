//! Task catalog: the kinds of social task a link can require.
//!
//! The set is open. Known kinds carry a display name and say whether a
//! target (URL or handle) is expected; any other well-formed tag is kept
//! as [`TaskKind::Custom`] so links created by newer front ends still load.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::validate;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TaskKind {
    Manual,
    Youtube,
    Instagram,
    JoinTelegram,
    TwitterFollow,
    TiktokFollow,
    JoinDiscord,
    Custom(String),
}

/// Catalog metadata for one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KindInfo {
    pub tag: &'static str,
    pub display_name: &'static str,
    pub expects_target: bool,
}

const KNOWN: [KindInfo; 7] = [
    KindInfo {
        tag: "manual",
        display_name: "Manual Verification",
        expects_target: false,
    },
    KindInfo {
        tag: "youtube",
        display_name: "YouTube Subscribe",
        expects_target: true,
    },
    KindInfo {
        tag: "instagram",
        display_name: "Instagram Follow",
        expects_target: true,
    },
    KindInfo {
        tag: "join_telegram",
        display_name: "Join Telegram",
        expects_target: true,
    },
    KindInfo {
        tag: "twitter_follow",
        display_name: "X / Twitter Follow",
        expects_target: true,
    },
    KindInfo {
        tag: "tiktok_follow",
        display_name: "TikTok Follow",
        expects_target: true,
    },
    KindInfo {
        tag: "join_discord",
        display_name: "Join Discord",
        expects_target: true,
    },
];

/// All kinds with built-in metadata, in display order.
pub fn known_kinds() -> &'static [KindInfo] {
    &KNOWN
}

impl TaskKind {
    pub fn as_str(&self) -> &str {
        match self {
            TaskKind::Manual => "manual",
            TaskKind::Youtube => "youtube",
            TaskKind::Instagram => "instagram",
            TaskKind::JoinTelegram => "join_telegram",
            TaskKind::TwitterFollow => "twitter_follow",
            TaskKind::TiktokFollow => "tiktok_follow",
            TaskKind::JoinDiscord => "join_discord",
            TaskKind::Custom(tag) => tag,
        }
    }

    pub fn info(&self) -> Option<&'static KindInfo> {
        KNOWN.iter().find(|info| info.tag == self.as_str())
    }

    pub fn display_name(&self) -> String {
        match self.info() {
            Some(info) => info.display_name.to_string(),
            None => self.as_str().replace('_', " "),
        }
    }

    /// Custom kinds may or may not have a target; only known kinds say no.
    pub fn expects_target(&self) -> bool {
        self.info().map(|info| info.expects_target).unwrap_or(true)
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, TaskKind::Custom(_))
    }
}

impl FromStr for TaskKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tag = s.trim();
        validate::validate_tag("task type", tag)?;
        Ok(match tag {
            "manual" => TaskKind::Manual,
            "youtube" => TaskKind::Youtube,
            "instagram" => TaskKind::Instagram,
            "join_telegram" => TaskKind::JoinTelegram,
            "twitter_follow" => TaskKind::TwitterFollow,
            "tiktok_follow" => TaskKind::TiktokFollow,
            "join_discord" => TaskKind::JoinDiscord,
            other => TaskKind::Custom(other.to_string()),
        })
    }
}

impl TryFrom<String> for TaskKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TaskKind> for String {
    fn from(kind: TaskKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
