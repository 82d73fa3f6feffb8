//! Presence tracking for remote participants.
//!
//! Presence is best effort: every call either applies or silently does
//! nothing, since a lost update is corrected by the next one.

use crate::clock::Timestamp;
use crate::color::PaintColor;
use kurbo::Point;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Default time after which a silent participant is considered gone.
pub const DEFAULT_PRESENCE_TIMEOUT: Duration = Duration::from_secs(30);

/// What a participant is currently doing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveUser {
    pub address: String,
    pub cursor: Option<Point>,
    pub selected_color: Option<PaintColor>,
    pub is_drawing: bool,
    /// Last time any update was received for this participant.
    pub last_seen: Timestamp,
}

impl ActiveUser {
    fn new(address: String, now: Timestamp) -> Self {
        Self {
            address,
            cursor: None,
            selected_color: None,
            is_drawing: false,
            last_seen: now,
        }
    }

    /// Apply a merge patch. Omitted fields keep their value.
    fn apply(&mut self, patch: &PresencePatch, now: Timestamp) {
        if let Some(cursor) = patch.cursor {
            self.cursor = cursor;
        }
        if let Some(color) = patch.selected_color {
            self.selected_color = color;
        }
        if let Some(is_drawing) = patch.is_drawing {
            self.is_drawing = is_drawing;
        }
        self.last_seen = now;
    }
}

/// Partial presence update.
///
/// Nullable fields are doubly optional: `None` leaves the field untouched,
/// `Some(None)` clears it. On the wire a missing key is `None` and an
/// explicit `null` is `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresencePatch {
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Option<Point>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub selected_color: Option<Option<PaintColor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_drawing: Option<bool>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl PresencePatch {
    pub fn cursor(cursor: Option<Point>) -> Self {
        Self {
            cursor: Some(cursor),
            ..Self::default()
        }
    }

    pub fn selected_color(color: Option<PaintColor>) -> Self {
        Self {
            selected_color: Some(color),
            ..Self::default()
        }
    }

    pub fn drawing(is_drawing: bool) -> Self {
        Self {
            is_drawing: Some(is_drawing),
            ..Self::default()
        }
    }

    /// True if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.cursor.is_none() && self.selected_color.is_none() && self.is_drawing.is_none()
    }

    /// Fold a newer patch into this one; fields set in `newer` win.
    pub fn merge(&mut self, newer: PresencePatch) {
        if newer.cursor.is_some() {
            self.cursor = newer.cursor;
        }
        if newer.selected_color.is_some() {
            self.selected_color = newer.selected_color;
        }
        if newer.is_drawing.is_some() {
            self.is_drawing = newer.is_drawing;
        }
    }
}

/// Participants keyed by address.
#[derive(Debug, Clone, Default)]
pub struct PresenceTracker {
    users: HashMap<String, ActiveUser>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or merge-patch the participant at `address`.
    pub fn add_or_update_user(&mut self, address: impl Into<String>, patch: &PresencePatch) {
        self.add_or_update_user_at(address, patch, Timestamp::now());
    }

    /// [`Self::add_or_update_user`] with an explicit clock reading.
    pub fn add_or_update_user_at(
        &mut self,
        address: impl Into<String>,
        patch: &PresencePatch,
        now: Timestamp,
    ) {
        let address = address.into();
        self.users
            .entry(address)
            .or_insert_with_key(|address| ActiveUser::new(address.clone(), now))
            .apply(patch, now);
    }

    /// Remove a participant. Returns the removed record, if any.
    pub fn remove_user(&mut self, address: &str) -> Option<ActiveUser> {
        self.users.remove(address)
    }

    /// Move a known participant's cursor. Unknown addresses are ignored.
    /// Returns true if a record was updated.
    pub fn update_cursor(&mut self, address: &str, cursor: Option<Point>) -> bool {
        self.update_cursor_at(address, cursor, Timestamp::now())
    }

    /// [`Self::update_cursor`] with an explicit clock reading.
    pub fn update_cursor_at(&mut self, address: &str, cursor: Option<Point>, now: Timestamp) -> bool {
        match self.users.get_mut(address) {
            Some(user) => {
                user.cursor = cursor;
                user.last_seen = now;
                true
            }
            None => false,
        }
    }

    /// Remove everyone not heard from within `timeout` of `now`.
    /// Returns the removed addresses.
    pub fn prune_idle(&mut self, now: Timestamp, timeout: Duration) -> Vec<String> {
        let mut removed = Vec::new();
        self.users.retain(|address, user| {
            let keep = now.saturating_since(user.last_seen) <= timeout;
            if !keep {
                removed.push(address.clone());
            }
            keep
        });
        removed
    }

    pub fn active_user_count(&self) -> usize {
        self.users.len()
    }

    pub fn is_user_active(&self, address: &str) -> bool {
        self.users.contains_key(address)
    }

    pub fn get(&self, address: &str) -> Option<&ActiveUser> {
        self.users.get(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveUser> {
        self.users.values()
    }

    pub fn clear(&mut self) {
        self.users.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: u64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[test]
    fn test_add_and_remove() {
        let mut presence = PresenceTracker::new();
        assert_eq!(presence.active_user_count(), 0);

        presence.add_or_update_user("0xabc", &PresencePatch::cursor(Some(Point::new(1.0, 2.0))));
        assert_eq!(presence.active_user_count(), 1);
        assert!(presence.is_user_active("0xabc"));

        presence.remove_user("0xabc");
        assert_eq!(presence.active_user_count(), 0);
        assert!(!presence.is_user_active("0xabc"));
    }

    #[test]
    fn test_new_user_defaults() {
        let mut presence = PresenceTracker::new();
        presence.add_or_update_user("0xabc", &PresencePatch::default());

        let user = presence.get("0xabc").unwrap();
        assert_eq!(user.cursor, None);
        assert_eq!(user.selected_color, None);
        assert!(!user.is_drawing);
    }

    #[test]
    fn test_merge_patch_preserves_fields() {
        let mut presence = PresenceTracker::new();
        presence.add_or_update_user("0xabc", &PresencePatch::drawing(true));
        presence.add_or_update_user("0xabc", &PresencePatch::cursor(Some(Point::new(3.0, 4.0))));

        let user = presence.get("0xabc").unwrap();
        assert!(user.is_drawing);
        assert_eq!(user.cursor, Some(Point::new(3.0, 4.0)));
    }

    #[test]
    fn test_explicit_null_clears_field() {
        let mut presence = PresenceTracker::new();
        presence.add_or_update_user("0xabc", &PresencePatch::selected_color(Some(PaintColor::white())));
        presence.add_or_update_user("0xabc", &PresencePatch::selected_color(None));
        assert_eq!(presence.get("0xabc").unwrap().selected_color, None);
    }

    #[test]
    fn test_update_cursor_does_not_create() {
        let mut presence = PresenceTracker::new();
        assert!(!presence.update_cursor("0xdead", Some(Point::new(1.0, 1.0))));
        assert_eq!(presence.active_user_count(), 0);

        presence.add_or_update_user("0xabc", &PresencePatch::drawing(true));
        assert!(presence.update_cursor("0xabc", Some(Point::new(5.0, 6.0))));
        let user = presence.get("0xabc").unwrap();
        assert_eq!(user.cursor, Some(Point::new(5.0, 6.0)));
        assert!(user.is_drawing);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut presence = PresenceTracker::new();
        presence.add_or_update_user("0xabc", &PresencePatch::default());
        assert!(presence.remove_user("0xother").is_none());
        assert_eq!(presence.active_user_count(), 1);
    }

    #[test]
    fn test_one_entry_per_address() {
        let mut presence = PresenceTracker::new();
        for _ in 0..3 {
            presence.add_or_update_user("0xabc", &PresencePatch::drawing(false));
        }
        assert_eq!(presence.active_user_count(), 1);
    }

    #[test]
    fn test_prune_idle() {
        let mut presence = PresenceTracker::new();
        presence.add_or_update_user_at("0xold", &PresencePatch::default(), at(1_000));
        presence.add_or_update_user_at("0xnew", &PresencePatch::default(), at(20_000));

        let removed = presence.prune_idle(at(40_000), DEFAULT_PRESENCE_TIMEOUT);
        assert_eq!(removed, vec!["0xold".to_string()]);
        assert!(presence.is_user_active("0xnew"));
    }

    #[test]
    fn test_patch_wire_format() {
        let patch: PresencePatch = serde_json::from_str(r#"{"cursor":null,"is_drawing":true}"#).unwrap();
        assert_eq!(patch.cursor, Some(None));
        assert_eq!(patch.selected_color, None);
        assert_eq!(patch.is_drawing, Some(true));

        let json = serde_json::to_string(&PresencePatch::drawing(false)).unwrap();
        assert_eq!(json, r#"{"is_drawing":false}"#);
    }

    #[test]
    fn test_patch_merge() {
        let mut pending = PresencePatch::cursor(Some(Point::new(1.0, 1.0)));
        pending.merge(PresencePatch::drawing(true));
        pending.merge(PresencePatch::cursor(Some(Point::new(2.0, 2.0))));

        assert_eq!(pending.cursor, Some(Some(Point::new(2.0, 2.0))));
        assert_eq!(pending.is_drawing, Some(true));
        assert!(!pending.is_empty());
    }
}
