//! Domain objects carried by stream messages.
//!
//! Every type maps from the JSON the streaming API sends. Optional fields
//! tolerate being absent or `null`; only identifiers are required.

use std::cmp::Ordering;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::stream::error::StreamError;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A single status update.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Status {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub truncated: bool,
    #[serde(default)]
    pub in_reply_to_status_id: Option<i64>,
    #[serde(default)]
    pub in_reply_to_user_id: Option<i64>,
    #[serde(default)]
    pub in_reply_to_screen_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub favorited: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub retweeted: bool,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub geo: Option<GeoLocation>,
    #[serde(default)]
    pub place: Option<Place>,
    #[serde(default)]
    pub entities: Option<Entities>,
    #[serde(default)]
    pub retweeted_status: Option<Box<Status>>,
}

impl Status {
    /// Returns true when this status is a retweet of another status.
    pub fn is_retweet(&self) -> bool {
        self.retweeted_status.is_some()
    }
}

/// An account.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub screen_name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub protected: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub verified: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub geo_enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub followers_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub friends_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub statuses_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub favourites_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub listed_count: i64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub utc_offset: Option<i32>,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    /// Most recent status, when the API embeds it.
    #[serde(default)]
    pub status: Option<Box<Status>>,
}

/// A private message between two accounts.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DirectMessage {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    pub sender_id: i64,
    pub recipient_id: i64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sender_screen_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recipient_screen_name: String,
    #[serde(default)]
    pub sender: Option<User>,
    #[serde(default)]
    pub recipient: Option<User>,
}

/// A curated list of accounts.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UserList {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subscriber_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub member_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub uri: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub following: bool,
    /// Owner of the list.
    #[serde(default)]
    pub user: Option<User>,
}

impl UserList {
    /// Lists are public unless the API marks them `private`.
    pub fn is_public(&self) -> bool {
        self.mode.as_deref() != Some("private")
    }
}

/// Identifies a status that was deleted and must be removed from storage.
///
/// Ordered by status id; the user id only breaks ties.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
pub struct StatusDeletionNotice {
    #[serde(rename = "id")]
    pub status_id: i64,
    pub user_id: i64,
}

impl Ord for StatusDeletionNotice {
    fn cmp(&self, other: &Self) -> Ordering {
        self.status_id
            .cmp(&other.status_id)
            .then(self.user_id.cmp(&other.user_id))
    }
}

impl PartialOrd for StatusDeletionNotice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Point geotag attached to a status.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(from = "GeoPoint")]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Deserialize)]
struct GeoPoint {
    coordinates: (f64, f64),
}

impl From<GeoPoint> for GeoLocation {
    fn from(point: GeoPoint) -> Self {
        Self {
            latitude: point.coordinates.0,
            longitude: point.coordinates.1,
        }
    }
}

/// Named location attached to a status.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Place {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub place_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Hashtags, links and mentions extracted from a status text.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Entities {
    #[serde(default, deserialize_with = "null_as_default")]
    pub hashtags: Vec<HashtagEntity>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub urls: Vec<UrlEntity>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_mentions: Vec<UserMentionEntity>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct HashtagEntity {
    pub text: String,
    #[serde(default)]
    pub indices: (u32, u32),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UrlEntity {
    pub url: String,
    #[serde(default)]
    pub expanded_url: Option<String>,
    #[serde(default)]
    pub display_url: Option<String>,
    #[serde(default)]
    pub indices: (u32, u32),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UserMentionEntity {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub screen_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub indices: (u32, u32),
}

/// Server notice that the client is falling behind and may be disconnected.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StallWarning {
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub percent_full: u32,
}

/// Server notice explaining why the connection is about to close.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DisconnectNotice {
    pub code: i32,
    #[serde(default)]
    pub stream_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
}

fn map_object<T: DeserializeOwned>(object: &'static str, json: &Value) -> Result<T, StreamError> {
    T::deserialize(json).map_err(|source| StreamError::Mapping { object, source })
}

pub fn build_status(json: &Value) -> Result<Status, StreamError> {
    map_object("status", json)
}

pub fn build_user(json: &Value) -> Result<User, StreamError> {
    map_object("user", json)
}

pub fn build_direct_message(json: &Value) -> Result<DirectMessage, StreamError> {
    map_object("direct message", json)
}

pub fn build_user_list(json: &Value) -> Result<UserList, StreamError> {
    map_object("user list", json)
}

pub fn build_deletion_notice(json: &Value) -> Result<StatusDeletionNotice, StreamError> {
    map_object("deletion notice", json)
}

pub fn build_stall_warning(json: &Value) -> Result<StallWarning, StreamError> {
    map_object("stall warning", json)
}

pub fn build_disconnect_notice(json: &Value) -> Result<DisconnectNotice, StreamError> {
    map_object("disconnect notice", json)
}
