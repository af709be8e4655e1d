//! Message visibility.
//!
//! Pure decision function: which of a message set a given requester may see
//! under the room's moderation policy.

use std::collections::HashSet;

use super::models::{Message, Moderation, RoomConfig};

/// Visible subset of `messages`, in input order, each id at most once.
///
/// Under `pre-moderate` moderators see everything; everyone else sees the
/// union of their own messages, replies directed at them and public ones.
/// Without a moderation policy nothing is hidden.
pub fn filter_visible<'a>(
    messages: &'a [Message],
    config: &RoomConfig,
    requester: &str,
) -> Vec<&'a Message> {
    let sees_everything =
        config.moderation == Moderation::None || config.is_moderator(requester);

    let mut seen = HashSet::new();
    messages
        .iter()
        .filter(|message| sees_everything || visible_to(message, requester))
        .filter(|message| seen.insert(message.id.clone()))
        .collect()
}

fn visible_to(message: &Message, requester: &str) -> bool {
    message.author_id() == Some(requester)
        || message.requester_id() == Some(requester)
        || message.is_public()
}
