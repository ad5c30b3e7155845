//! In-process cache for generated crawl documents.
//!
//! The sitemap is held in a single [`CacheSlot`]: either empty (the next
//! reader regenerates) or holding a complete document that may be served
//! as-is. Invalidation bumps an epoch so a regeneration that started before
//! the invalidation cannot repopulate the slot with stale data.

mod slot;

pub use slot::{CacheSlot, SlotStatus};
