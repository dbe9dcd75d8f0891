//! Peer directory for the conversation sidebar.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use magpie_shared::{Handle, Profile};

/// Directory profiles in sidebar order.
///
/// Peers with message activity sort first, most recent on top; peers
/// without any follow alphabetically.
#[derive(Debug, Default)]
pub struct Roster {
    profiles: Vec<Profile>,
    activity: HashMap<Handle, DateTime<Utc>>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the profile list, dropping `me` from it.
    pub fn update(&mut self, profiles: Vec<Profile>, me: &Handle) {
        self.profiles = profiles;
        self.profiles.retain(|p| p.handle != *me);
        self.sort();
    }

    /// Record message activity with a peer. Older timestamps never move a
    /// peer down.
    pub fn note_activity(&mut self, peer: &Handle, at: DateTime<Utc>) {
        let entry = self.activity.entry(peer.clone()).or_insert(at);
        if *entry < at {
            *entry = at;
        }
        self.sort();
    }

    /// All peers in sidebar order.
    pub fn peers(&self) -> &[Profile] {
        &self.profiles
    }

    /// Case-insensitive substring filter over handles. An empty term
    /// matches everyone.
    pub fn filter(&self, term: &str) -> Vec<&Profile> {
        let needle = term.to_lowercase();
        self.profiles
            .iter()
            .filter(|p| p.handle.as_str().to_lowercase().contains(&needle))
            .collect()
    }

    fn sort(&mut self) {
        let activity = &self.activity;
        self.profiles.sort_by(|a, b| {
            match (activity.get(&a.handle), activity.get(&b.handle)) {
                (Some(x), Some(y)) => y.cmp(x).then_with(|| a.handle.cmp(&b.handle)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => a.handle.cmp(&b.handle),
            }
        });
    }
}
