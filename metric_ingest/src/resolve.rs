// Free-text entity resolution against the reference catalogs.

use crate::config::{Division, EntityId, MetricDef, Region};

/// Anything that can be looked up by name or slug. Implemented by the
/// catalog record types so one resolver serves metrics, divisions and
/// regions alike.
pub trait CatalogEntry {
    fn entry_id(&self) -> EntityId;
    fn entry_name(&self) -> &str;
    fn entry_slug(&self) -> Option<&str>;
}

impl CatalogEntry for MetricDef {
    fn entry_id(&self) -> EntityId {
        self.id
    }
    fn entry_name(&self) -> &str {
        &self.name
    }
    fn entry_slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }
}

impl CatalogEntry for Division {
    fn entry_id(&self) -> EntityId {
        self.id
    }
    fn entry_name(&self) -> &str {
        &self.name
    }
    fn entry_slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }
}

impl CatalogEntry for Region {
    fn entry_id(&self) -> EntityId {
        self.id
    }
    fn entry_name(&self) -> &str {
        &self.name
    }
    fn entry_slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }
}

/// Resolves free text to a catalog entry id, or `None`.
///
/// Rules in strict priority order, first rule to match any candidate wins:
/// 1. exact case-insensitive match on name;
/// 2. exact case-insensitive match on slug;
/// 3. substring both ways: candidate name contains the input, or the input
///    contains the candidate name.
///
/// Within a rule, candidates are scanned in catalog order and the first hit
/// is taken. The substring rule can therefore pick an earlier candidate
/// over a later, equally plausible one ("North" against both "North
/// Division" and "Northwest Division"); callers relying on the catalog
/// should keep the more specific entries first.
pub fn resolve_entity<T: CatalogEntry>(input: &str, candidates: &[T]) -> Option<EntityId> {
    let needle = input.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    for c in candidates {
        if c.entry_name().to_lowercase() == needle {
            return Some(c.entry_id());
        }
    }
    for c in candidates {
        if let Some(slug) = c.entry_slug() {
            if slug.to_lowercase() == needle {
                return Some(c.entry_id());
            }
        }
    }
    for c in candidates {
        let name = c.entry_name().to_lowercase();
        if name.contains(&needle) || needle.contains(&name) {
            return Some(c.entry_id());
        }
    }
    None
}

/// Region resolution, narrowed to the regions of an already-resolved
/// division when one is known. The narrowing prevents identically-named
/// regions in different divisions from colliding.
pub fn resolve_region(
    input: &str,
    regions: &[Region],
    division_id: Option<EntityId>,
) -> Option<EntityId> {
    match division_id {
        Some(did) => {
            let narrowed: Vec<Region> = regions
                .iter()
                .filter(|r| r.division_id == did)
                .cloned()
                .collect();
            resolve_entity(input, &narrowed)
        }
        None => resolve_entity(input, regions),
    }
}
