//! Deterministic ID coercion for backends that require string or UUID IDs
//! (spec §3 "Vector ID", §4.5 "ID coercion", §9 "ID coercion safety")
//!
//! The namespace constant below is fixed and checked in, not generated at
//! runtime, so the same integer ID produces the same UUID across restarts.
//! Grounded on `codetriever_meta_data::chunk_id`'s `Uuid::new_v5` pattern,
//! with a distinct namespace constant for this subsystem.

use uuid::Uuid;

/// Fixed namespace used to derive UUID v5 identifiers from integer vector
/// IDs. Distinct from any namespace used elsewhere in the surrounding
/// system so collections never collide across subsystems.
pub const VECTOR_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6f, 0x1a, 0x2d, 0x4e, 0x9c, 0x3b, 0x4a, 0x71, 0x8e, 0x05, 0x2c, 0x7f, 0x91, 0xab, 0x3d, 0x6a,
]);

/// Stringify an integer ID for backends whose wire format is string-keyed
/// (Pinecone, MongoDB, Redis).
#[must_use]
pub fn stringify(id: u64) -> String {
    id.to_string()
}

/// Parse a stringified integer ID back to its canonical form.
#[must_use]
pub fn parse_stringified(s: &str) -> Option<u64> {
    s.parse().ok()
}

/// Derive a deterministic UUID v5 for an integer ID, for backends that
/// require UUID-form identifiers (Weaviate).
#[must_use]
pub fn to_uuid(id: u64) -> Uuid {
    Uuid::new_v5(&VECTOR_ID_NAMESPACE, id.to_string().as_bytes())
}

/// Build a lookup table from derived UUID back to the originating integer
/// ID, needed because UUID v5 is one-way: the engine returns the UUID on
/// read and the adapter must recover the integer.
#[derive(Debug, Default)]
pub struct UuidIdMap {
    forward: std::collections::HashMap<u64, Uuid>,
    backward: std::collections::HashMap<Uuid, u64>,
}

impl UuidIdMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u64) -> Uuid {
        let uuid = to_uuid(id);
        self.forward.insert(id, uuid);
        self.backward.insert(uuid, id);
        uuid
    }

    pub fn remove(&mut self, id: u64) {
        if let Some(uuid) = self.forward.remove(&id) {
            self.backward.remove(&uuid);
        }
    }

    #[must_use]
    pub fn uuid_for(&self, id: u64) -> Uuid {
        self.forward.get(&id).copied().unwrap_or_else(|| to_uuid(id))
    }

    #[must_use]
    pub fn id_for(&self, uuid: Uuid) -> Option<u64> {
        self.backward.get(&uuid).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        assert_eq!(to_uuid(42), to_uuid(42));
    }

    #[test]
    fn distinct_ids_derive_distinct_uuids() {
        assert_ne!(to_uuid(1), to_uuid(2));
    }

    #[test]
    fn stringify_round_trips() {
        assert_eq!(parse_stringified(&stringify(123)), Some(123));
    }

    #[test]
    fn uuid_id_map_round_trips() {
        let mut map = UuidIdMap::new();
        let uuid = map.insert(7);
        assert_eq!(map.id_for(uuid), Some(7));
        map.remove(7);
        assert_eq!(map.id_for(uuid), None);
    }
}
