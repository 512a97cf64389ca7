//! Temporal filter applied to every fetched item.
//!
//! An item belongs to a snapshot iff its timestamp is at or before the
//! cutoff. Sources that can push the cutoff server-side still get this
//! re-applied client-side, so determinism never depends on what the remote
//! API happens to support.

use chrono::{DateTime, Utc};

use crate::item::ContentItem;

pub fn include(item: &ContentItem, cutoff: DateTime<Utc>) -> bool {
    item.created_at <= cutoff
}

/// Drop items created after the cutoff, preserving order.
pub fn apply(items: &mut Vec<ContentItem>, cutoff: DateTime<Utc>) {
    items.retain(|item| include(item, cutoff));
}
