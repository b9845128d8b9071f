//! Column descriptors of the harvested tables
//!
//! The order of each list is the insertion order; it must match the table's
//! declared column order.

use super::ColumnKind::*;
use super::{ColumnSpec, Schema};

const USER_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::flat("id", UInt64),
    ColumnSpec::flat("avatar_url", String),
    ColumnSpec::flat("city", String),
    ColumnSpec::flat("comments_count", Int32),
    ColumnSpec::flat("country_code", String),
    ColumnSpec::flat("created_at", DateTime),
    ColumnSpec::raw("creator_subscriptions", JsonArray { default: "[]" }),
    ColumnSpec::raw("creator_subscription", Json { default: "{}" }),
    ColumnSpec::flat("description", String),
    ColumnSpec::flat("followers_count", UInt32),
    ColumnSpec::flat("followings_count", UInt32),
    ColumnSpec::flat("first_name", String),
    ColumnSpec::flat("full_name", String),
    ColumnSpec::flat("groups_count", UInt32),
    ColumnSpec::flat("kind", String),
    ColumnSpec::flat("last_modified", DateTime),
    ColumnSpec::flat("last_name", String),
    ColumnSpec::flat("likes_count", UInt32),
    ColumnSpec::flat("playlist_likes_count", UInt32),
    ColumnSpec::flat("permalink", String),
    ColumnSpec::flat("permalink_url", String),
    ColumnSpec::flat("playlist_count", UInt32),
    ColumnSpec::raw("reposts_count", NullableInt32OrZero),
    ColumnSpec::flat("track_count", UInt32),
    ColumnSpec::flat("uri", String),
    ColumnSpec::flat("urn", String),
    ColumnSpec::flat("username", String),
    ColumnSpec::flat("verified", Flag),
    ColumnSpec::raw("visuals", Json { default: "{}" }),
    ColumnSpec::raw("badges", Json { default: "{}" }),
    ColumnSpec::flat("station_urn", String),
    ColumnSpec::flat("station_permalink", String),
    ColumnSpec::side_keys("_raw.key"),
    ColumnSpec::side_values("_raw.value"),
];

/// Users table, shared by the followers and snowball flows
///
/// Partitioned by `toYYYYMM(created_at)`, ordered by `(id, username, created_at)`;
/// `_raw` is a `Nested(key String, value String)` side channel.
pub const USER_SCHEMA: Schema = Schema {
    name: "user",
    columns: USER_COLUMNS,
};

const TRACK_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::flat("id", UInt64),
    ColumnSpec::flat("artwork_url", String),
    ColumnSpec::flat("caption", NullableString),
    ColumnSpec::flat("commentable", Bool),
    ColumnSpec::flat("comment_count", UInt32),
    ColumnSpec::flat("created_at", NullableDateTime),
    ColumnSpec::flat("description", NullableString),
    ColumnSpec::flat("downloadable", Bool),
    ColumnSpec::flat("download_count", UInt32),
    ColumnSpec::flat("duration", UInt32),
    ColumnSpec::flat("full_duration", UInt32),
    ColumnSpec::flat("embeddable_by", String),
    ColumnSpec::flat("genre", NullableString),
    ColumnSpec::flat("has_downloads_left", Bool),
    ColumnSpec::flat("kind", String),
    ColumnSpec::flat("label_name", NullableString),
    ColumnSpec::flat("last_modified", NullableDateTime),
    ColumnSpec::flat("license", String),
    ColumnSpec::flat("likes_count", UInt32),
    ColumnSpec::flat("permalink", String),
    ColumnSpec::flat("permalink_url", String),
    ColumnSpec::flat("playback_count", UInt32),
    ColumnSpec::flat("public", Bool),
    ColumnSpec::flat("purchase_title", NullableString),
    ColumnSpec::flat("purchase_url", NullableString),
    ColumnSpec::flat("release_date", NullableDatePost1970),
    ColumnSpec::flat("reposts_count", UInt32),
    ColumnSpec::flat("secret_token", NullableString),
    ColumnSpec::flat("sharing", String),
    ColumnSpec::flat("state", String),
    ColumnSpec::flat("streamable", Bool),
    ColumnSpec::flat("tag_list", String),
    ColumnSpec::flat("title", String),
    ColumnSpec::flat("uri", String),
    ColumnSpec::flat("urn", String),
    ColumnSpec::flat("user_id", UInt64),
    ColumnSpec::raw("visuals", NullableJson),
    ColumnSpec::flat("waveform_url", String),
    ColumnSpec::flat("display_date", NullableDateTime),
    ColumnSpec::flat("station_urn", String),
    ColumnSpec::flat("station_permalink", String),
    ColumnSpec::flat("track_authorization", String),
    ColumnSpec::flat("monetization_model", String),
    ColumnSpec::flat("policy", String),
    ColumnSpec::flat("publisher_metadata_id", NullableInt64),
    ColumnSpec::flat("publisher_metadata_urn", NullableString),
    ColumnSpec::flat("publisher_metadata_artist", NullableString),
    ColumnSpec::flat("publisher_metadata_album_title", NullableString),
    ColumnSpec::flat("publisher_metadata_contains_music", NullableBool),
    ColumnSpec::flat("publisher_metadata_upc_or_ean", NullableString),
    ColumnSpec::flat("publisher_metadata_isrc", NullableString),
    ColumnSpec::flat("publisher_metadata_explicit", NullableBool),
    ColumnSpec::flat("publisher_metadata_p_line", NullableString),
    ColumnSpec::flat("publisher_metadata_p_line_for_display", NullableString),
    ColumnSpec::flat("publisher_metadata_c_line", NullableString),
    ColumnSpec::flat("publisher_metadata_c_line_for_display", NullableString),
    ColumnSpec::flat("publisher_metadata_release_title", NullableString),
];

/// Tracks table; `publisher_metadata` is flattened into prefixed columns
pub const TRACK_SCHEMA: Schema = Schema {
    name: "track",
    columns: TRACK_COLUMNS,
};
