use std::collections::HashMap;
use teleconsult_core::{CallOffer, RoomId};

/// Pending (unanswered) offers, one per room at most.
///
/// Absence of an entry means no call is ringing in that room. It does not
/// mean no call is in progress: the entry is removed the moment the call is
/// answered. Constructed once at relay startup and owned by the relay event
/// loop, so plain map operations suffice.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: HashMap<RoomId, CallOffer>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a ringing call. A new offer for the same room replaces any
    /// prior one; competing offers are not queued. Returns the replaced
    /// offer, if any.
    pub fn insert(&mut self, offer: CallOffer) -> Option<CallOffer> {
        self.entries.insert(offer.room.clone(), offer)
    }

    /// Settle the room's pending call (answered, declined, or ended).
    pub fn settle(&mut self, room: &RoomId) -> Option<CallOffer> {
        self.entries.remove(room)
    }

    /// The offer still ringing in `room`, if any.
    pub fn pending(&self, room: &RoomId) -> Option<&CallOffer> {
        self.entries.get(room)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
