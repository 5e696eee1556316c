use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Decrypted login material for one matchmaking account.
///
/// Supplied in batches by the account inventory and never persisted.
#[derive(Clone, Deserialize)]
pub struct Credential {
    pub id: String,
    pub token: String,
}

impl Credential {
    pub fn new(id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            token: token.into(),
        }
    }
}

// Keep the secret out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Matchmaking pool a search is restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPool {
    Prime,
    NonPrime,
}

impl fmt::Display for MatchPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prime => write!(f, "prime"),
            Self::NonPrime => write!(f, "non-prime"),
        }
    }
}

/// Parameters of one matchmaking search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchFilter {
    pub pool: MatchPool,
    pub min_rank: u32,
    pub game_mode: String,
}

impl SearchFilter {
    pub fn new(pool: MatchPool, min_rank: u32, game_mode: &str) -> Self {
        Self {
            pool,
            min_rank,
            game_mode: game_mode.to_string(),
        }
    }
}

/// A player returned by a matchmaking search.
///
/// Only `id` is stable; everything else describes this one sighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub pool: Option<MatchPool>,
}

impl Candidate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            rank: None,
            pool: None,
        }
    }
}

/// A tracked player that passed the watch list and cooldown gates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sighting {
    pub id: String,
    pub name: Option<String>,
    pub rank: Option<u32>,
    pub pool: Option<MatchPool>,
    pub seen_at: DateTime<Utc>,
}

impl Sighting {
    pub fn from_candidate(candidate: Candidate, seen_at: DateTime<Utc>) -> Self {
        Self {
            id: candidate.id,
            name: candidate.name,
            rank: candidate.rank,
            pool: candidate.pool,
            seen_at,
        }
    }
}

/// Granularity of the search timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickGrain {
    #[default]
    Minute,
    Hour,
}

impl TickGrain {
    pub fn period(self) -> Duration {
        match self {
            Self::Minute => Duration::from_secs(60),
            Self::Hour => Duration::from_secs(60 * 60),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minute" | "min" | "m" => Some(Self::Minute),
            "hour" | "h" => Some(Self::Hour),
            _ => None,
        }
    }
}
