//! Clipboard ownership and cached contents.
//!
//! Every screen may own a clipboard.  Ownership moves when a screen *grabs*
//! the clipboard (the user copied something there), and the owner later
//! sends the data.  Grabs and updates carry the enter sequence number the
//! sender last saw, so a report that raced a screen switch can be told apart
//! from a fresh one and discarded.

use std::fmt;

/// Which clipboard an operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClipboardId {
    /// The system clipboard (Ctrl-C / Ctrl-V).
    Clipboard = 0,
    /// The primary selection (X11 middle-click paste).
    Selection = 1,
}

impl ClipboardId {
    pub const ALL: [ClipboardId; 2] = [ClipboardId::Clipboard, ClipboardId::Selection];
    pub const COUNT: usize = 2;

    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for ClipboardId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ClipboardId::Clipboard),
            1 => Ok(ClipboardId::Selection),
            other => Err(other),
        }
    }
}

impl fmt::Display for ClipboardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipboardId::Clipboard => f.write_str("clipboard"),
            ClipboardId::Selection => f.write_str("selection"),
        }
    }
}

/// Ownership and cached contents of one clipboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardInfo {
    /// Screen that last grabbed the clipboard.
    pub owner: Option<String>,
    /// Sequence number of the last accepted grab or update.
    pub seq: u32,
    /// Marshalled clipboard contents, opaque to the server.
    pub data: Vec<u8>,
    /// `true` once the owner has sent data since its last grab.
    pub ready: bool,
}

/// Result of [`ClipboardTable::grab`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabOutcome {
    Accepted,
    /// The grab carried an older sequence number than the stored one.
    Stale,
}

/// Result of [`ClipboardTable::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// New data was cached.
    Changed,
    /// The data matched the cache; nothing to propagate.
    Unchanged,
    /// The update carried an older sequence number than the stored one.
    Stale,
    /// The sender does not own the clipboard.
    NotOwner,
}

/// One [`ClipboardInfo`] per [`ClipboardId`].
#[derive(Debug, Clone, Default)]
pub struct ClipboardTable {
    entries: [ClipboardInfo; ClipboardId::COUNT],
}

impl ClipboardTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ClipboardId) -> &ClipboardInfo {
        &self.entries[id.index()]
    }

    /// Transfers ownership of `id` to `grabber`.
    ///
    /// Grabs from the primary screen are always accepted; the primary's own
    /// input is the source of truth.  Anyone else must present a sequence
    /// number no older than the stored one.
    pub fn grab(&mut self, grabber: &str, from_primary: bool, id: ClipboardId, seq: u32) -> GrabOutcome {
        let info = &mut self.entries[id.index()];
        if !from_primary && seq < info.seq {
            return GrabOutcome::Stale;
        }
        info.owner = Some(grabber.to_string());
        info.seq = info.seq.max(seq);
        info.data.clear();
        info.ready = false;
        GrabOutcome::Accepted
    }

    /// Caches new contents sent by the owner of `id`.
    pub fn update(&mut self, sender: &str, id: ClipboardId, seq: u32, data: Vec<u8>) -> UpdateOutcome {
        let info = &mut self.entries[id.index()];
        if seq < info.seq {
            return UpdateOutcome::Stale;
        }
        if info.owner.as_deref() != Some(sender) {
            return UpdateOutcome::NotOwner;
        }
        if info.ready && info.data == data {
            return UpdateOutcome::Unchanged;
        }
        info.seq = seq;
        info.data = data;
        info.ready = true;
        UpdateOutcome::Changed
    }

    /// Clipboards currently owned by `screen`.
    pub fn owned_by<'a>(&'a self, screen: &'a str) -> impl Iterator<Item = ClipboardId> + 'a {
        ClipboardId::ALL
            .into_iter()
            .filter(move |id| self.entries[id.index()].owner.as_deref() == Some(screen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_owned_by_b_at_seq_5() -> ClipboardTable {
        let mut table = ClipboardTable::new();
        assert_eq!(
            table.grab("b", false, ClipboardId::Clipboard, 5),
            GrabOutcome::Accepted
        );
        table
    }

    #[test]
    fn test_clipboard_id_from_u8() {
        assert_eq!(ClipboardId::try_from(0), Ok(ClipboardId::Clipboard));
        assert_eq!(ClipboardId::try_from(1), Ok(ClipboardId::Selection));
        assert_eq!(ClipboardId::try_from(2), Err(2));
    }

    #[test]
    fn test_stale_grab_from_secondary_is_rejected() {
        // Arrange
        let mut table = table_owned_by_b_at_seq_5();

        // Act
        let outcome = table.grab("c", false, ClipboardId::Clipboard, 4);

        // Assert
        assert_eq!(outcome, GrabOutcome::Stale);
        assert_eq!(table.get(ClipboardId::Clipboard).owner.as_deref(), Some("b"));
        assert_eq!(table.get(ClipboardId::Clipboard).seq, 5);
    }

    #[test]
    fn test_newer_grab_from_secondary_is_accepted() {
        let mut table = table_owned_by_b_at_seq_5();
        assert_eq!(
            table.grab("c", false, ClipboardId::Clipboard, 6),
            GrabOutcome::Accepted
        );
        assert_eq!(table.get(ClipboardId::Clipboard).owner.as_deref(), Some("c"));
    }

    #[test]
    fn test_primary_grab_is_accepted_even_with_old_seq() {
        let mut table = table_owned_by_b_at_seq_5();
        assert_eq!(
            table.grab("desk", true, ClipboardId::Clipboard, 1),
            GrabOutcome::Accepted
        );
        assert_eq!(table.get(ClipboardId::Clipboard).seq, 5, "seq never decreases");
    }

    #[test]
    fn test_stale_update_is_rejected_and_state_unchanged() {
        // Arrange
        let mut table = table_owned_by_b_at_seq_5();

        // Act
        let outcome = table.update("b", ClipboardId::Clipboard, 4, b"old".to_vec());

        // Assert
        assert_eq!(outcome, UpdateOutcome::Stale);
        assert!(table.get(ClipboardId::Clipboard).data.is_empty());
        assert!(!table.get(ClipboardId::Clipboard).ready);
    }

    #[test]
    fn test_newer_update_from_owner_is_cached() {
        // Arrange
        let mut table = table_owned_by_b_at_seq_5();

        // Act
        let outcome = table.update("b", ClipboardId::Clipboard, 6, b"hello".to_vec());

        // Assert
        assert_eq!(outcome, UpdateOutcome::Changed);
        let info = table.get(ClipboardId::Clipboard);
        assert_eq!(info.data, b"hello");
        assert_eq!(info.seq, 6);
        assert!(info.ready);
    }

    #[test]
    fn test_identical_update_is_reported_unchanged() {
        let mut table = table_owned_by_b_at_seq_5();
        table.update("b", ClipboardId::Clipboard, 5, b"same".to_vec());
        assert_eq!(
            table.update("b", ClipboardId::Clipboard, 5, b"same".to_vec()),
            UpdateOutcome::Unchanged
        );
    }

    #[test]
    fn test_update_from_non_owner_is_ignored() {
        let mut table = table_owned_by_b_at_seq_5();
        assert_eq!(
            table.update("c", ClipboardId::Clipboard, 9, b"x".to_vec()),
            UpdateOutcome::NotOwner
        );
    }

    #[test]
    fn test_grab_clears_cached_data() {
        // Arrange
        let mut table = table_owned_by_b_at_seq_5();
        table.update("b", ClipboardId::Clipboard, 5, b"text".to_vec());

        // Act
        table.grab("c", false, ClipboardId::Clipboard, 7);

        // Assert
        let info = table.get(ClipboardId::Clipboard);
        assert!(info.data.is_empty());
        assert!(!info.ready);
    }

    #[test]
    fn test_owned_by_lists_only_owned_clipboards() {
        let mut table = table_owned_by_b_at_seq_5();
        table.grab("desk", true, ClipboardId::Selection, 0);
        assert_eq!(table.owned_by("b").collect::<Vec<_>>(), vec![ClipboardId::Clipboard]);
        assert_eq!(table.owned_by("desk").collect::<Vec<_>>(), vec![ClipboardId::Selection]);
    }
}
