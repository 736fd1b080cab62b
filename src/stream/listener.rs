//! Listener callbacks and the dispatcher that drives them.
//!
//! Every callback has an empty default body, so a listener only implements
//! the events it cares about.

use tracing::{debug, info};

use crate::model::{
    DirectMessage, DisconnectNotice, StallWarning, Status, StatusDeletionNotice, User, UserList,
};
use crate::stream::error::StreamError;
use crate::stream::event::DomainEvent;
use crate::stream::reader::StreamKind;

/// Receives events from a [`StatusStream`](crate::stream::reader::StatusStream).
///
/// Callbacks run synchronously on the task calling `next()`. Implementations
/// that share state across streams must synchronize it themselves.
#[allow(unused_variables)]
pub trait StreamListener: Send + Sync {
    /// Raw text of every non-empty line, before it is parsed. Runs ahead of
    /// any typed callback for the same line.
    fn on_message(&self, raw: &str) {}

    /// A new status.
    fn on_status(&self, status: &Status) {}

    /// A status was deleted.
    fn on_deletion_notice(&self, notice: &StatusDeletionNotice) {}

    /// Number of statuses withheld because the track predicate matched too
    /// many of them.
    fn on_track_limitation_notice(&self, limited: u64) {}

    /// Geotags for `user_id`'s statuses up to `up_to_status_id` must be
    /// discarded.
    fn on_scrub_geo(&self, user_id: i64, up_to_status_id: i64) {}

    /// The client is falling behind the stream.
    fn on_stall_warning(&self, warning: &StallWarning) {}

    /// The server is about to close the connection.
    fn on_disconnect(&self, notice: &DisconnectNotice) {}

    /// Ids the account follows, sent once when a user stream opens.
    fn on_friend_list(&self, friend_ids: &[i64]) {}

    /// A direct message sent or received by the account.
    fn on_direct_message(&self, message: &DirectMessage) {}

    /// A direct message was deleted.
    fn on_direct_message_deletion(&self, direct_message_id: i64, user_id: i64) {}

    /// `source` liked `target`'s status.
    fn on_favorite(&self, source: &User, target: &User, status: &Status) {}

    /// `source` removed a like from `target`'s status.
    fn on_unfavorite(&self, source: &User, target: &User, status: &Status) {}

    /// `source` retweeted `target`'s status.
    fn on_retweet(&self, source: &User, target: &User, status: &Status) {}

    /// `source` followed another account.
    fn on_follow(&self, source: &User, followed: &User) {}

    /// `source` unfollowed another account.
    fn on_unfollow(&self, source: &User, unfollowed: &User) {}

    /// `owner` added `added_member` to `list`.
    fn on_user_list_member_addition(&self, added_member: &User, owner: &User, list: &UserList) {}

    /// `owner` removed `deleted_member` from `list`.
    fn on_user_list_member_deletion(&self, deleted_member: &User, owner: &User, list: &UserList) {}

    /// `subscriber` subscribed to `owner`'s list.
    fn on_user_list_subscription(&self, subscriber: &User, owner: &User, list: &UserList) {}

    /// `subscriber` unsubscribed from `owner`'s list.
    fn on_user_list_unsubscription(&self, subscriber: &User, owner: &User, list: &UserList) {}

    /// `owner` created `list`.
    fn on_user_list_creation(&self, owner: &User, list: &UserList) {}

    /// `owner` changed `list`.
    fn on_user_list_update(&self, owner: &User, list: &UserList) {}

    /// `owner` deleted `list`.
    fn on_user_list_deletion(&self, owner: &User, list: &UserList) {}

    /// The account's own profile changed.
    fn on_user_profile_update(&self, user: &User) {}

    /// `source` blocked another account.
    fn on_block(&self, source: &User, blocked: &User) {}

    /// `source` unblocked another account.
    fn on_unblock(&self, source: &User, unblocked: &User) {}

    /// Called for lines that could not be parsed or mapped, and by
    /// [`StreamDriver`](crate::stream::driver::StreamDriver) for fatal
    /// connection failures.
    fn on_exception(&self, error: &StreamError) {}
}

/// Delivers `event` to every listener in order.
///
/// Status streams skip user-stream-only events. User streams log scrub geo
/// notices instead of delivering them.
pub fn dispatch(kind: StreamKind, event: &DomainEvent, listeners: &[&dyn StreamListener]) {
    match (kind, event) {
        (StreamKind::User, DomainEvent::ScrubGeo { user_id, up_to_status_id }) => {
            info!(
                event = "scrub_geo_ignored",
                user_id = *user_id,
                up_to_status_id = *up_to_status_id
            );
            return;
        }
        (StreamKind::Status, event) if event.is_user_stream_only() => {
            debug!(event = "user_event_on_status_stream", kind = event.name());
            return;
        }
        _ => {}
    }

    for listener in listeners {
        deliver(*listener, event);
    }
}

fn deliver(listener: &dyn StreamListener, event: &DomainEvent) {
    match event {
        DomainEvent::Status(status) => listener.on_status(status),
        DomainEvent::Deletion(notice) => listener.on_deletion_notice(notice),
        DomainEvent::DirectMessageDeletion {
            direct_message_id,
            user_id,
        } => listener.on_direct_message_deletion(*direct_message_id, *user_id),
        DomainEvent::TrackLimitation(limited) => listener.on_track_limitation_notice(*limited),
        DomainEvent::ScrubGeo {
            user_id,
            up_to_status_id,
        } => listener.on_scrub_geo(*user_id, *up_to_status_id),
        DomainEvent::StallWarning(warning) => listener.on_stall_warning(warning),
        DomainEvent::Disconnect(notice) => listener.on_disconnect(notice),
        DomainEvent::FriendsList(ids) => listener.on_friend_list(ids),
        DomainEvent::DirectMessage(message) => listener.on_direct_message(message),
        DomainEvent::Favorite {
            source,
            target,
            status,
        } => listener.on_favorite(source, target, status),
        DomainEvent::Unfavorite {
            source,
            target,
            status,
        } => listener.on_unfavorite(source, target, status),
        DomainEvent::Retweet {
            source,
            target,
            status,
        } => listener.on_retweet(source, target, status),
        DomainEvent::Follow { source, target } => listener.on_follow(source, target),
        DomainEvent::Unfollow { source, target } => listener.on_unfollow(source, target),
        DomainEvent::ListMemberAdded {
            member,
            owner,
            list,
        } => listener.on_user_list_member_addition(member, owner, list),
        DomainEvent::ListMemberRemoved {
            member,
            owner,
            list,
        } => listener.on_user_list_member_deletion(member, owner, list),
        DomainEvent::ListSubscribed {
            subscriber,
            owner,
            list,
        } => listener.on_user_list_subscription(subscriber, owner, list),
        DomainEvent::ListUnsubscribed {
            subscriber,
            owner,
            list,
        } => listener.on_user_list_unsubscription(subscriber, owner, list),
        DomainEvent::ListCreated { owner, list } => listener.on_user_list_creation(owner, list),
        DomainEvent::ListUpdated { owner, list } => listener.on_user_list_update(owner, list),
        DomainEvent::ListDestroyed { owner, list } => listener.on_user_list_deletion(owner, list),
        DomainEvent::UserProfileUpdate(user) => listener.on_user_profile_update(user),
        DomainEvent::Block { source, target } => listener.on_block(source, target),
        DomainEvent::Unblock { source, target } => listener.on_unblock(source, target),
        DomainEvent::ParseException(error) => listener.on_exception(error),
    }
}
