//! Builds typed events from classified envelopes.

use serde_json::{Map, Value};

use crate::model::{
    build_deletion_notice, build_direct_message, build_disconnect_notice, build_stall_warning,
    build_status, build_user, build_user_list, DirectMessage, DisconnectNotice, StallWarning,
    Status, StatusDeletionNotice, User, UserList,
};
use crate::stream::error::StreamError;
use crate::stream::proto::{EnvelopeKind, UserEventKind};

/// Fully materialized notification derived from one envelope.
#[derive(Debug)]
pub enum DomainEvent {
    Status(Status),
    Deletion(StatusDeletionNotice),
    DirectMessageDeletion {
        direct_message_id: i64,
        user_id: i64,
    },
    TrackLimitation(u64),
    ScrubGeo {
        user_id: i64,
        up_to_status_id: i64,
    },
    StallWarning(StallWarning),
    Disconnect(DisconnectNotice),
    FriendsList(Vec<i64>),
    DirectMessage(DirectMessage),
    Favorite {
        source: User,
        target: User,
        status: Status,
    },
    Unfavorite {
        source: User,
        target: User,
        status: Status,
    },
    Retweet {
        source: User,
        target: User,
        status: Status,
    },
    Follow {
        source: User,
        target: User,
    },
    Unfollow {
        source: User,
        target: User,
    },
    ListMemberAdded {
        member: User,
        owner: User,
        list: UserList,
    },
    ListMemberRemoved {
        member: User,
        owner: User,
        list: UserList,
    },
    ListSubscribed {
        subscriber: User,
        owner: User,
        list: UserList,
    },
    ListUnsubscribed {
        subscriber: User,
        owner: User,
        list: UserList,
    },
    ListCreated {
        owner: User,
        list: UserList,
    },
    ListUpdated {
        owner: User,
        list: UserList,
    },
    ListDestroyed {
        owner: User,
        list: UserList,
    },
    UserProfileUpdate(User),
    Block {
        source: User,
        target: User,
    },
    Unblock {
        source: User,
        target: User,
    },
    /// A line could not be parsed or mapped.
    ParseException(StreamError),
}

impl DomainEvent {
    /// Returns true for events that only the user stream delivers.
    pub fn is_user_stream_only(&self) -> bool {
        matches!(
            self,
            Self::FriendsList(_)
                | Self::DirectMessage(_)
                | Self::Favorite { .. }
                | Self::Unfavorite { .. }
                | Self::Retweet { .. }
                | Self::Follow { .. }
                | Self::Unfollow { .. }
                | Self::ListMemberAdded { .. }
                | Self::ListMemberRemoved { .. }
                | Self::ListSubscribed { .. }
                | Self::ListUnsubscribed { .. }
                | Self::ListCreated { .. }
                | Self::ListUpdated { .. }
                | Self::ListDestroyed { .. }
                | Self::UserProfileUpdate(_)
                | Self::Block { .. }
                | Self::Unblock { .. }
        )
    }

    /// Short name used in log events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Deletion(_) => "deletion",
            Self::DirectMessageDeletion { .. } => "direct_message_deletion",
            Self::TrackLimitation(_) => "track_limitation",
            Self::ScrubGeo { .. } => "scrub_geo",
            Self::StallWarning(_) => "stall_warning",
            Self::Disconnect(_) => "disconnect",
            Self::FriendsList(_) => "friends",
            Self::DirectMessage(_) => "direct_message",
            Self::Favorite { .. } => "favorite",
            Self::Unfavorite { .. } => "unfavorite",
            Self::Retweet { .. } => "retweet",
            Self::Follow { .. } => "follow",
            Self::Unfollow { .. } => "unfollow",
            Self::ListMemberAdded { .. } => "list_member_added",
            Self::ListMemberRemoved { .. } => "list_member_removed",
            Self::ListSubscribed { .. } => "list_user_subscribed",
            Self::ListUnsubscribed { .. } => "list_user_unsubscribed",
            Self::ListCreated { .. } => "list_created",
            Self::ListUpdated { .. } => "list_updated",
            Self::ListDestroyed { .. } => "list_destroyed",
            Self::UserProfileUpdate(_) => "user_update",
            Self::Block { .. } => "block",
            Self::Unblock { .. } => "unblock",
            Self::ParseException(_) => "parse_exception",
        }
    }
}

/// Builds the event for an envelope already classified as `kind`.
pub fn build_event(kind: EnvelopeKind, json: &Value) -> Result<DomainEvent, StreamError> {
    let envelope = as_object(json, "envelope")?;
    let event = match kind {
        EnvelopeKind::Status => DomainEvent::Status(build_status(json)?),
        EnvelopeKind::Delete => build_deletion(object_field(envelope, "delete")?)?,
        EnvelopeKind::Limit => {
            let limit = object_field(envelope, "limit")?;
            DomainEvent::TrackLimitation(u64_field(limit, "track")?)
        }
        EnvelopeKind::ScrubGeo => {
            let scrub_geo = object_field(envelope, "scrub_geo")?;
            DomainEvent::ScrubGeo {
                user_id: i64_field(scrub_geo, "user_id")?,
                up_to_status_id: i64_field(scrub_geo, "up_to_status_id")?,
            }
        }
        EnvelopeKind::Friends => DomainEvent::FriendsList(friend_ids(envelope)?),
        EnvelopeKind::DirectMessage => {
            DomainEvent::DirectMessage(build_direct_message(required(envelope, "direct_message")?)?)
        }
        EnvelopeKind::Event(event) => build_user_event(event, envelope)?,
        EnvelopeKind::StallWarning => {
            DomainEvent::StallWarning(build_stall_warning(required(envelope, "warning")?)?)
        }
        EnvelopeKind::Disconnect => {
            DomainEvent::Disconnect(build_disconnect_notice(required(envelope, "disconnect")?)?)
        }
    };
    Ok(event)
}

fn build_deletion(delete: &Map<String, Value>) -> Result<DomainEvent, StreamError> {
    if let Some(status) = present(delete, "status") {
        return Ok(DomainEvent::Deletion(build_deletion_notice(status)?));
    }
    let direct_message = object_field(delete, "direct_message")?;
    Ok(DomainEvent::DirectMessageDeletion {
        direct_message_id: i64_field(direct_message, "id")?,
        user_id: i64_field(direct_message, "user_id")?,
    })
}

fn build_user_event(
    kind: UserEventKind,
    envelope: &Map<String, Value>,
) -> Result<DomainEvent, StreamError> {
    let source = || build_user(required(envelope, "source")?);
    let target = || build_user(required(envelope, "target")?);
    let target_status = || build_status(required(envelope, "target_object")?);
    let target_list = || build_user_list(required(envelope, "target_object")?);

    let event = match kind {
        UserEventKind::Favorite => DomainEvent::Favorite {
            source: source()?,
            target: target()?,
            status: target_status()?,
        },
        UserEventKind::Unfavorite => DomainEvent::Unfavorite {
            source: source()?,
            target: target()?,
            status: target_status()?,
        },
        UserEventKind::Retweet => DomainEvent::Retweet {
            source: source()?,
            target: target()?,
            status: target_status()?,
        },
        UserEventKind::Follow => DomainEvent::Follow {
            source: source()?,
            target: target()?,
        },
        UserEventKind::Unfollow => DomainEvent::Unfollow {
            source: source()?,
            target: target()?,
        },
        UserEventKind::ListMemberAdded => DomainEvent::ListMemberAdded {
            member: target()?,
            owner: source()?,
            list: target_list()?,
        },
        UserEventKind::ListMemberRemoved => DomainEvent::ListMemberRemoved {
            member: target()?,
            owner: source()?,
            list: target_list()?,
        },
        UserEventKind::ListUserSubscribed => DomainEvent::ListSubscribed {
            subscriber: source()?,
            owner: target()?,
            list: target_list()?,
        },
        UserEventKind::ListUserUnsubscribed => DomainEvent::ListUnsubscribed {
            subscriber: source()?,
            owner: target()?,
            list: target_list()?,
        },
        UserEventKind::ListCreated => DomainEvent::ListCreated {
            owner: source()?,
            list: target_list()?,
        },
        UserEventKind::ListUpdated => DomainEvent::ListUpdated {
            owner: source()?,
            list: target_list()?,
        },
        UserEventKind::ListDestroyed => DomainEvent::ListDestroyed {
            owner: source()?,
            list: target_list()?,
        },
        UserEventKind::UserUpdate => DomainEvent::UserProfileUpdate(source()?),
        UserEventKind::Block => DomainEvent::Block {
            source: source()?,
            target: target()?,
        },
        UserEventKind::Unblock => DomainEvent::Unblock {
            source: source()?,
            target: target()?,
        },
    };
    Ok(event)
}

fn friend_ids(envelope: &Map<String, Value>) -> Result<Vec<i64>, StreamError> {
    let friends = required(envelope, "friends")?
        .as_array()
        .ok_or(StreamError::InvalidField {
            field: "friends",
            expected: "an array",
        })?;

    friends
        .iter()
        .map(|id| {
            id.as_i64()
                .or_else(|| id.as_str().and_then(|text| text.parse().ok()))
                .ok_or(StreamError::InvalidField {
                    field: "friends",
                    expected: "a list of integer ids",
                })
        })
        .collect()
}

fn present<'a>(object: &'a Map<String, Value>, field: &'static str) -> Option<&'a Value> {
    object.get(field).filter(|value| !value.is_null())
}

fn required<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, StreamError> {
    present(object, field).ok_or(StreamError::MissingField { field })
}

fn as_object<'a>(
    value: &'a Value,
    field: &'static str,
) -> Result<&'a Map<String, Value>, StreamError> {
    value.as_object().ok_or(StreamError::InvalidField {
        field,
        expected: "an object",
    })
}

fn object_field<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Map<String, Value>, StreamError> {
    as_object(required(object, field)?, field)
}

fn i64_field(object: &Map<String, Value>, field: &'static str) -> Result<i64, StreamError> {
    required(object, field)?
        .as_i64()
        .ok_or(StreamError::InvalidField {
            field,
            expected: "an integer",
        })
}

fn u64_field(object: &Map<String, Value>, field: &'static str) -> Result<u64, StreamError> {
    required(object, field)?
        .as_u64()
        .ok_or(StreamError::InvalidField {
            field,
            expected: "a non-negative integer",
        })
}
