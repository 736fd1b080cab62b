//! Message shapes recognized on the stream and the ordered classifier that
//! tells them apart.
//!
//! Each line is one JSON object. The shape is decided by which well-known
//! top-level key it carries; a key only counts when its value is not `null`.
//! Keys are checked in a fixed order so an envelope matching several shapes
//! always classifies the same way.

use serde_json::Value;

/// Top-level shape of a stream envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeKind {
    Status,
    Delete,
    Limit,
    ScrubGeo,
    Friends,
    DirectMessage,
    Event(UserEventKind),
    StallWarning,
    Disconnect,
}

/// Sub-type of an `event` envelope on the user stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserEventKind {
    Favorite,
    Unfavorite,
    Retweet,
    Follow,
    Unfollow,
    ListCreated,
    ListUpdated,
    ListDestroyed,
    ListMemberAdded,
    ListMemberRemoved,
    ListUserSubscribed,
    ListUserUnsubscribed,
    UserUpdate,
    Block,
    Unblock,
}

impl UserEventKind {
    /// Maps the `event` field value to its kind.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "favorite" => Self::Favorite,
            "unfavorite" => Self::Unfavorite,
            "retweet" => Self::Retweet,
            "follow" => Self::Follow,
            "unfollow" => Self::Unfollow,
            "list_created" => Self::ListCreated,
            "list_updated" => Self::ListUpdated,
            "list_destroyed" => Self::ListDestroyed,
            "list_member_added" => Self::ListMemberAdded,
            "list_member_removed" => Self::ListMemberRemoved,
            "list_user_subscribed" => Self::ListUserSubscribed,
            "list_user_unsubscribed" => Self::ListUserUnsubscribed,
            "user_update" => Self::UserUpdate,
            "block" => Self::Block,
            "unblock" => Self::Unblock,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Favorite => "favorite",
            Self::Unfavorite => "unfavorite",
            Self::Retweet => "retweet",
            Self::Follow => "follow",
            Self::Unfollow => "unfollow",
            Self::ListCreated => "list_created",
            Self::ListUpdated => "list_updated",
            Self::ListDestroyed => "list_destroyed",
            Self::ListMemberAdded => "list_member_added",
            Self::ListMemberRemoved => "list_member_removed",
            Self::ListUserSubscribed => "list_user_subscribed",
            Self::ListUserUnsubscribed => "list_user_unsubscribed",
            Self::UserUpdate => "user_update",
            Self::Block => "block",
            Self::Unblock => "unblock",
        }
    }
}

impl EnvelopeKind {
    /// Returns true for shapes that only the user stream delivers.
    pub fn is_user_stream_only(self) -> bool {
        matches!(self, Self::Friends | Self::DirectMessage | Self::Event(_))
    }
}

/// Precedence order for plain top-level keys checked before `event`.
const LEADING_KEYS: [(&str, EnvelopeKind); 6] = [
    ("text", EnvelopeKind::Status),
    ("delete", EnvelopeKind::Delete),
    ("limit", EnvelopeKind::Limit),
    ("scrub_geo", EnvelopeKind::ScrubGeo),
    ("friends", EnvelopeKind::Friends),
    ("direct_message", EnvelopeKind::DirectMessage),
];

/// Keys checked after `event`.
const TRAILING_KEYS: [(&str, EnvelopeKind); 2] = [
    ("warning", EnvelopeKind::StallWarning),
    ("disconnect", EnvelopeKind::Disconnect),
];

/// Classifies a parsed line. Returns `None` for shapes this reader does not
/// know, which callers drop without notifying anyone.
pub fn classify(json: &Value) -> Option<EnvelopeKind> {
    let object = json.as_object()?;
    let has = |key: &str| object.get(key).is_some_and(|value| !value.is_null());

    if let Some((_, kind)) = LEADING_KEYS.iter().find(|(key, _)| has(*key)) {
        return Some(*kind);
    }

    if has("event") {
        return object
            .get("event")
            .and_then(Value::as_str)
            .and_then(UserEventKind::from_name)
            .map(EnvelopeKind::Event);
    }

    TRAILING_KEYS
        .iter()
        .find(|(key, _)| has(*key))
        .map(|(_, kind)| *kind)
}
