use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use thresher_party::{Participant, PartyId};

/// Eviction window: a roster entry disappears if we haven't heard an
/// advertise from it in this long. Matches `participantTTL` in chat.go.
pub const ROSTER_TTL: Duration = Duration::from_secs(30);

/// Per-peer transient state in a Room (spec §3 "Roster entry").
#[derive(Clone, Debug)]
pub struct RosterEntry {
    pub participant: Participant,
    pub first_seen: Instant,
    pub last_seen: Instant,
}

/// The set of participants currently considered online in a room,
/// maintained by periodic heartbeats and TTL eviction. Reader-writer lock:
/// writers (advertise, TTL evict) are brief, matching spec §4.4/§5.
pub struct Roster {
    entries: RwLock<HashMap<PartyId, RosterEntry>>,
}

impl Roster {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    /// Upsert a participant's entry with `last_seen = now`, matching
    /// `AddParticipant`'s behavior (first-seen is fixed at the first
    /// advertise, unlike the original which resets `addedAt` on every
    /// advertise — we track both timestamps explicitly per spec §3).
    /// Returns `true` if this is the participant's first advertise (a new
    /// join), `false` if it refreshed an existing entry.
    pub async fn advertise(&self, participant: Participant) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        match entries.get_mut(&participant.party_id()) {
            Some(e) => {
                e.last_seen = now;
                e.participant = participant;
                false
            }
            None => {
                entries.insert(participant.party_id(), RosterEntry { participant, first_seen: now, last_seen: now });
                true
            }
        }
    }

    /// Remove every entry whose `now - last_seen > TTL`. Returns the removed
    /// entries so callers can log departures (spec §4.4, §8 Scenario F).
    pub async fn evict_expired(&self) -> Vec<RosterEntry> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let expired: Vec<PartyId> = entries
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_seen) > ROSTER_TTL)
            .map(|(id, _)| *id)
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for id in expired {
            if let Some(entry) = entries.remove(&id) {
                removed.push(entry);
            }
        }
        removed
    }

    pub async fn contains(&self, id: PartyId) -> bool {
        self.entries.read().await.contains_key(&id)
    }

    /// Snapshot of live participants, sorted by nickname (matches
    /// `ParticipantList`'s sort).
    pub async fn snapshot(&self) -> Vec<Participant> {
        let entries = self.entries.read().await;
        let mut out: Vec<Participant> = entries.values().map(|e| e.participant.clone()).collect();
        out.sort_by(|a, b| a.nick.cmp(&b.nick));
        out
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}
