//! In-memory message store with optimistic-send reconciliation.
//!
//! The REST response to a send and the corresponding `new_message` push
//! are not mutually ordered; either may arrive first. This store
//! reconciles the two paths by message id so the caller-visible state
//! always contains exactly one record per message, and delivery status
//! never moves backwards.

use std::collections::HashMap;

use kn_models::{ChatMessage, DeliveryStatus};

/// Per-chat message store keyed by message id, insertion-ordered.
#[derive(Default)]
pub struct MessageOutbox {
    messages: HashMap<String, ChatMessage>,
    order: Vec<String>,
    /// Maps temporary (optimistic) ids to server-assigned ids once known.
    temp_to_real: HashMap<String, String>,
}

impl MessageOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an optimistic local placeholder in `sending` state.
    pub fn insert_optimistic(&mut self, message: ChatMessage) {
        debug_assert!(message.is_temp());
        self.insert(message);
    }

    /// Fold in a message that arrived from the server (push or history).
    ///
    /// Duplicate-safe: a record already present under the same id is
    /// merged rather than duplicated, and its status only advances.
    pub fn apply_incoming(&mut self, message: ChatMessage) {
        if let Some(existing) = self.messages.get_mut(&message.id) {
            existing.merge(&message);
        } else {
            self.insert(message);
        }
    }

    /// Reconcile an optimistic placeholder with the server-confirmed
    /// record.
    ///
    /// Handles both orderings: if the push already delivered the real
    /// record, the placeholder is simply dropped; otherwise the
    /// placeholder is replaced in place, keeping its position.
    pub fn confirm(&mut self, temp_id: &str, confirmed: ChatMessage) {
        let real_id = confirmed.id.clone();
        self.temp_to_real.insert(temp_id.to_string(), real_id.clone());

        if self.messages.contains_key(&real_id) {
            // Push beat the REST response; just merge and drop the temp.
            self.apply_incoming(confirmed);
            self.remove(temp_id);
            return;
        }

        if let Some(pos) = self.order.iter().position(|id| id == temp_id) {
            self.order[pos] = real_id.clone();
        } else {
            self.order.push(real_id.clone());
        }
        self.messages.remove(temp_id);

        let mut record = confirmed;
        record.status = record.status.advance(DeliveryStatus::Sent);
        self.messages.insert(real_id, record);
    }

    /// Drop a failed optimistic placeholder, returning it for the caller
    /// to surface.
    pub fn fail(&mut self, temp_id: &str) -> Option<ChatMessage> {
        self.remove(temp_id)
    }

    /// Advance a message's delivery status. Transitions never regress.
    pub fn advance_status(&mut self, message_id: &str, status: DeliveryStatus) {
        if let Some(msg) = self.get_mut(message_id) {
            msg.advance_status(status);
        }
    }

    /// Apply an edit to a message.
    pub fn apply_edit(&mut self, message_id: &str, new_text: &str, edited_at: Option<String>) {
        if let Some(msg) = self.get_mut(message_id) {
            msg.text = Some(new_text.to_string());
            msg.is_edited = true;
            msg.edited_at = edited_at;
        }
    }

    /// Mark a message deleted. Records are never physically removed once
    /// confirmed; deletion is a flag.
    pub fn apply_delete(&mut self, message_id: &str) {
        if let Some(msg) = self.get_mut(message_id) {
            msg.is_deleted = true;
        }
    }

    /// Look up a message by id, following the temp-to-real mapping.
    pub fn get(&self, id: &str) -> Option<&ChatMessage> {
        if let Some(msg) = self.messages.get(id) {
            return Some(msg);
        }
        self.temp_to_real
            .get(id)
            .and_then(|real| self.messages.get(real))
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut ChatMessage> {
        let key = if self.messages.contains_key(id) {
            id.to_string()
        } else {
            self.temp_to_real.get(id)?.clone()
        };
        self.messages.get_mut(&key)
    }

    /// All messages in insertion order.
    pub fn messages(&self) -> Vec<&ChatMessage> {
        self.order
            .iter()
            .filter_map(|id| self.messages.get(id))
            .collect()
    }

    /// Number of stored messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn insert(&mut self, message: ChatMessage) {
        let id = message.id.clone();
        if self.messages.insert(id.clone(), message).is_none() {
            self.order.push(id);
        }
    }

    fn remove(&mut self, id: &str) -> Option<ChatMessage> {
        self.order.retain(|existing| existing != id);
        self.messages.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kn_models::UserSummary;

    fn me() -> UserSummary {
        UserSummary { id: "me".into(), name: "Me".into(), ..Default::default() }
    }

    fn optimistic(temp_id: &str, text: &str) -> ChatMessage {
        ChatMessage::optimistic_text(temp_id, "c1", me(), text, None)
    }

    fn confirmed(id: &str, text: &str) -> ChatMessage {
        ChatMessage::from_server_map(&serde_json::json!({
            "id": id,
            "chatId": "c1",
            "sender": {"id": "me", "name": "Me"},
            "messageType": "text",
            "status": "sent",
            "text": text,
        }))
        .unwrap()
    }

    #[test]
    fn test_rest_response_before_push() {
        let mut outbox = MessageOutbox::new();
        outbox.insert_optimistic(optimistic("temp-1", "hi"));
        assert_eq!(outbox.get("temp-1").unwrap().status, DeliveryStatus::Sending);

        outbox.confirm("temp-1", confirmed("m1", "hi"));
        // The push for the same message arrives afterwards
        outbox.apply_incoming(confirmed("m1", "hi"));

        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox.messages()[0].id, "m1");
        assert_eq!(outbox.messages()[0].status, DeliveryStatus::Sent);
    }

    #[test]
    fn test_push_before_rest_response() {
        let mut outbox = MessageOutbox::new();
        outbox.insert_optimistic(optimistic("temp-1", "hi"));

        // The push carrying the confirmed record wins the race
        outbox.apply_incoming(confirmed("m1", "hi"));
        outbox.confirm("temp-1", confirmed("m1", "hi"));

        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox.messages()[0].id, "m1");
    }

    #[test]
    fn test_confirm_keeps_position() {
        let mut outbox = MessageOutbox::new();
        outbox.apply_incoming(confirmed("m1", "first"));
        outbox.insert_optimistic(optimistic("temp-2", "second"));
        outbox.apply_incoming(confirmed("m3", "third"));

        outbox.confirm("temp-2", confirmed("m2", "second"));

        let ids: Vec<&str> = outbox.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn test_temp_id_resolves_after_confirm() {
        let mut outbox = MessageOutbox::new();
        outbox.insert_optimistic(optimistic("temp-1", "hi"));
        outbox.confirm("temp-1", confirmed("m1", "hi"));

        // A late lookup by the temporary id still finds the record
        assert_eq!(outbox.get("temp-1").unwrap().id, "m1");
    }

    #[test]
    fn test_status_never_regresses() {
        let mut outbox = MessageOutbox::new();
        outbox.apply_incoming(confirmed("m1", "hi"));
        outbox.advance_status("m1", DeliveryStatus::Read);

        // A stale delivered receipt must not pull the status back
        outbox.advance_status("m1", DeliveryStatus::Delivered);
        assert_eq!(outbox.get("m1").unwrap().status, DeliveryStatus::Read);

        // Nor a replayed copy of the original record
        outbox.apply_incoming(confirmed("m1", "hi"));
        assert_eq!(outbox.get("m1").unwrap().status, DeliveryStatus::Read);
    }

    #[test]
    fn test_failed_send_removed() {
        let mut outbox = MessageOutbox::new();
        outbox.insert_optimistic(optimistic("temp-1", "hi"));

        let failed = outbox.fail("temp-1").unwrap();
        assert_eq!(failed.text.as_deref(), Some("hi"));
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_delete_is_soft() {
        let mut outbox = MessageOutbox::new();
        outbox.apply_incoming(confirmed("m1", "hi"));
        outbox.apply_delete("m1");

        assert_eq!(outbox.len(), 1);
        assert!(outbox.get("m1").unwrap().is_deleted);
    }

    #[test]
    fn test_edit_applied() {
        let mut outbox = MessageOutbox::new();
        outbox.apply_incoming(confirmed("m1", "hi"));
        outbox.apply_edit("m1", "hi, edited", Some("2026-02-01T10:00:00Z".into()));

        let msg = outbox.get("m1").unwrap();
        assert!(msg.is_edited);
        assert_eq!(msg.text.as_deref(), Some("hi, edited"));
    }
}
