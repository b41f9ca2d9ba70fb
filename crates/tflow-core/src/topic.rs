//! Broadcast topic names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::entity::EntityId;
use crate::error::CoreError;

const GLOBAL: &str = "global";
const ENTITY_PREFIX: &str = "entity-";

/// A broadcast topic: either the global feed or one entity's feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    Global,
    Entity(EntityId),
}

impl Topic {
    pub fn entity(id: EntityId) -> Self {
        Self::Entity(id)
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str(GLOBAL),
            Self::Entity(id) => write!(f, "{ENTITY_PREFIX}{id}"),
        }
    }
}

impl FromStr for Topic {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == GLOBAL {
            return Ok(Self::Global);
        }
        s.strip_prefix(ENTITY_PREFIX)
            .and_then(|id| id.parse::<u64>().ok())
            .map(|id| Self::Entity(EntityId::new(id)))
            .ok_or_else(|| CoreError::InvalidTopic(s.to_string()))
    }
}

impl Serialize for Topic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_names() {
        assert_eq!(Topic::Global.to_string(), "global");
        assert_eq!(Topic::entity(EntityId::new(7)).to_string(), "entity-7");
        assert_eq!("entity-7".parse::<Topic>().unwrap(), Topic::Entity(EntityId::new(7)));
        assert_eq!("global".parse::<Topic>().unwrap(), Topic::Global);
    }

    #[test]
    fn test_invalid_topics() {
        for bad in ["", "entity-", "entity-x", "Entity-7", "all"] {
            assert!(bad.parse::<Topic>().is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Topic::entity(EntityId::new(3))).unwrap();
        assert_eq!(json, "\"entity-3\"");
        let topic: Topic = serde_json::from_str("\"global\"").unwrap();
        assert!(topic.is_global());
    }
}
