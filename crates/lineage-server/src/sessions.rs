//! Reconnection sessions.
//!
//! Every born character gets a session token. When its connection drops the
//! character stays in the world for a grace period; a client presenting the
//! token within that window takes the character over.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;

pub const TOKEN_PREFIX: &str = "session_";
const TOKEN_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `session_<unix millis>_<9 base36 chars>`.
pub fn new_token(rng: &mut impl Rng) -> String {
    let suffix: String = (0..TOKEN_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{TOKEN_PREFIX}{}_{suffix}", chrono::Utc::now().timestamp_millis())
}

#[derive(Debug)]
struct Disconnected {
    player_id: String,
    since: Instant,
}

#[derive(Debug)]
pub struct SessionManager {
    grace: Duration,
    disconnected: HashMap<String, Disconnected>,
}

impl SessionManager {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            disconnected: HashMap::new(),
        }
    }

    pub fn start_grace(&mut self, token: String, player_id: &str, now: Instant) {
        self.disconnected.insert(
            token,
            Disconnected {
                player_id: player_id.to_string(),
                since: now,
            },
        );
    }

    /// Take over a waiting character. Unknown or malformed tokens yield `None`.
    pub fn claim(&mut self, token: &str) -> Option<String> {
        if !token.starts_with(TOKEN_PREFIX) {
            return None;
        }
        self.disconnected.remove(token).map(|d| d.player_id)
    }

    /// Drop every session whose grace period has run out and return the
    /// player ids left behind.
    pub fn expire(&mut self, now: Instant) -> Vec<String> {
        let grace = self.grace;
        let mut expired = Vec::new();
        self.disconnected.retain(|_, d| {
            let keep = now.saturating_duration_since(d.since) <= grace;
            if !keep {
                expired.push(d.player_id.clone());
            }
            keep
        });
        expired
    }

    pub fn waiting(&self) -> usize {
        self.disconnected.len()
    }
}
