#![allow(dead_code)]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Platform spending archetype. Only big spenders qualify for bidding wars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_archetype", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserArchetype {
    BigSpender,
    Budget,
    Standard,
}

impl UserArchetype {
    pub fn qualifies_for_bidding(&self) -> bool {
        matches!(self, UserArchetype::BigSpender)
    }
}

impl fmt::Display for UserArchetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UserArchetype::BigSpender => "big_spender",
            UserArchetype::Budget => "budget",
            UserArchetype::Standard => "standard",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for UserArchetype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "big_spender" => Ok(UserArchetype::BigSpender),
            "budget" => Ok(UserArchetype::Budget),
            "standard" => Ok(UserArchetype::Standard),
            _ => Err(format!("Invalid user archetype: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub user_archetype: UserArchetype,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_big_spender_qualifies() {
        assert!(UserArchetype::BigSpender.qualifies_for_bidding());
        assert!(!UserArchetype::Budget.qualifies_for_bidding());
        assert!(!UserArchetype::Standard.qualifies_for_bidding());
    }

    #[test]
    fn test_archetype_roundtrip() {
        for a in ["big_spender", "budget", "standard"] {
            let parsed: UserArchetype = a.parse().unwrap();
            assert_eq!(parsed.to_string(), a);
        }
    }
}
