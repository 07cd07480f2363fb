use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::StoreError;

/// The kind of background material a context node holds.
///
/// Persisted as its display label (e.g. `人物设定`) so records stay readable
/// by the writers who curate them; parsing also accepts the enum name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContextType {
    Character,
    World,
    Outline,
    Events,
    History,
    Novel,
    Custom,
}

impl ContextType {
    pub const ALL: [ContextType; 7] = [
        ContextType::Character,
        ContextType::World,
        ContextType::Outline,
        ContextType::Events,
        ContextType::History,
        ContextType::Novel,
        ContextType::Custom,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Character => "人物设定",
            Self::World => "世界设定",
            Self::Outline => "作品大纲",
            Self::Events => "事件细纲",
            Self::History => "会话历史",
            Self::Novel => "小说数据",
            Self::Custom => "自定义",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Character => "CHARACTER",
            Self::World => "WORLD",
            Self::Outline => "OUTLINE",
            Self::Events => "EVENTS",
            Self::History => "HISTORY",
            Self::Novel => "NOVEL",
            Self::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ContextType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.label() == s || t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL
                    .iter()
                    .map(|t| format!("{} ({})", t.label(), t.name()))
                    .collect();
                StoreError::Validation(format!(
                    "Unknown context type '{s}'. Known types: {}",
                    known.join(", ")
                ))
            })
    }
}

impl Serialize for ContextType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for ContextType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
