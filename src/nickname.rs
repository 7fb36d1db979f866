//! Nickname learning
//!
//! The server never receives an explicit registration. Instead it sniffs
//! names out of forwarded traffic through a `NicknameExtractor` and keeps a
//! best-effort table from name to the connection last seen using it.

use std::collections::HashMap;

use crate::types::ConnectionId;

/// Separator between nickname and text in a chat line
pub const SEPARATOR: &str = ": ";

/// Pulls a nickname out of a forwarded payload
pub trait NicknameExtractor: Send + Sync {
    fn extract<'a>(&self, payload: &'a [u8]) -> Option<&'a str>;
}

/// Takes everything before the first `": "` as the nickname
#[derive(Debug, Default, Clone, Copy)]
pub struct SeparatorExtractor;

impl NicknameExtractor for SeparatorExtractor {
    fn extract<'a>(&self, payload: &'a [u8]) -> Option<&'a str> {
        let sep = SEPARATOR.as_bytes();
        let end = payload.windows(sep.len()).position(|w| w == sep)?;
        if end == 0 {
            return None;
        }
        std::str::from_utf8(&payload[..end]).ok()
    }
}

/// Nickname to connection mapping
///
/// Entries are overwritten on every sighting, so two peers using one name
/// resolve to whoever spoke last.
#[derive(Debug, Default)]
pub struct NicknameTable {
    entries: HashMap<String, ConnectionId>,
}

impl NicknameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` as hosted by `id`, replacing any earlier owner
    pub fn learn(&mut self, name: &str, id: ConnectionId) {
        self.entries.insert(name.to_string(), id);
    }

    pub fn lookup(&self, name: &str) -> Option<ConnectionId> {
        self.entries.get(name).copied()
    }

    pub fn erase(&mut self, name: &str) -> Option<ConnectionId> {
        self.entries.remove(name)
    }

    /// Drop every name pointing at `id`
    pub fn forget(&mut self, id: ConnectionId) {
        self.entries.retain(|_, owner| *owner != id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Slot;

    #[test]
    fn test_extract_prefix_before_first_separator() {
        let extractor = SeparatorExtractor;
        assert_eq!(extractor.extract(b"A: hello"), Some("A"));
        assert_eq!(extractor.extract(b"Bob: time: 10:30"), Some("Bob"));
    }

    #[test]
    fn test_extract_rejects_missing_or_empty_name() {
        let extractor = SeparatorExtractor;
        assert_eq!(extractor.extract(b"no separator here"), None);
        assert_eq!(extractor.extract(b": orphan text"), None);
        assert_eq!(extractor.extract(b"12:30"), None);
        assert_eq!(extractor.extract(b""), None);
    }

    #[test]
    fn test_extract_rejects_invalid_utf8() {
        let extractor = SeparatorExtractor;
        assert_eq!(extractor.extract(b"\xff\xfe: hi"), None);
    }

    #[test]
    fn test_learn_overwrites_previous_owner() {
        let mut table = NicknameTable::new();
        let first = ConnectionId::new(Slot(0), 0);
        let second = ConnectionId::new(Slot(1), 0);

        table.learn("A", first);
        table.learn("A", second);

        assert_eq!(table.lookup("A"), Some(second));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_forget_removes_all_names_of_connection() {
        let mut table = NicknameTable::new();
        let id = ConnectionId::new(Slot(0), 0);
        let other = ConnectionId::new(Slot(1), 0);

        table.learn("A", id);
        table.learn("Alias", id);
        table.learn("B", other);
        table.forget(id);

        assert_eq!(table.lookup("A"), None);
        assert_eq!(table.lookup("Alias"), None);
        assert_eq!(table.lookup("B"), Some(other));
    }

    #[test]
    fn test_erase_unknown_is_none() {
        let mut table = NicknameTable::new();
        assert_eq!(table.erase("ghost"), None);
    }
}
