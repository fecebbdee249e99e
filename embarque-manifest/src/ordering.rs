use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use embarque_core::booking::Booking;
use embarque_core::store::BookingStore;
use embarque_core::{OrganizerError, OrganizerResult};

use crate::hierarchy::{build_hierarchy, CityGroupBy, OrganizeMode};

/// What a reorder actually persisted. Driver/broker views are legal to drag
/// around but never touch any stored order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderScope {
    Canonical,
    CityLocal,
    ViewOnly,
}

impl ReorderScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReorderScope::Canonical => "canonical",
            ReorderScope::CityLocal => "city_local",
            ReorderScope::ViewOnly => "view_only",
        }
    }
}

/// Maps drag-and-drop mutations back onto the canonical per-trip order, and
/// decides which reorders may touch it at all.
pub struct OrderingService<S> {
    store: Arc<S>,
}

impl<S: BookingStore> OrderingService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Persist a new flat order for the current view. The proposal must be a
    /// permutation of the trip's bookings and must keep every linked group
    /// contiguous; groups move as atomic units.
    pub async fn apply_reorder(
        &self,
        trip_id: i64,
        new_flat_order: &[i64],
        mode: OrganizeMode,
    ) -> OrganizerResult<ReorderScope> {
        let snapshot = self.store.list_bookings(trip_id).await?;
        validate_proposal(&snapshot, new_flat_order)?;

        let scope = match mode {
            OrganizeMode::Default => {
                self.store.update_order(trip_id, new_flat_order).await?;
                ReorderScope::Canonical
            }
            OrganizeMode::City => {
                self.store.update_city_order(trip_id, new_flat_order).await?;
                ReorderScope::CityLocal
            }
            OrganizeMode::Driver | OrganizeMode::Broker => ReorderScope::ViewOnly,
        };

        info!(trip_id, ?mode, scope = scope.as_str(), "reorder applied");
        Ok(scope)
    }

    /// Move the group containing `node_id` directly before the group
    /// containing `target_id`, in the given view.
    pub async fn move_before(
        &self,
        trip_id: i64,
        node_id: i64,
        target_id: i64,
        mode: OrganizeMode,
        city_group_by: CityGroupBy,
    ) -> OrganizerResult<ReorderScope> {
        let proposal = self
            .moved_units(trip_id, node_id, Some(target_id), mode, city_group_by)
            .await?;
        self.apply_reorder(trip_id, &proposal, mode).await
    }

    /// Move the group containing `node_id` to the end of the view.
    pub async fn move_to_end(
        &self,
        trip_id: i64,
        node_id: i64,
        mode: OrganizeMode,
        city_group_by: CityGroupBy,
    ) -> OrganizerResult<ReorderScope> {
        let proposal = self
            .moved_units(trip_id, node_id, None, mode, city_group_by)
            .await?;
        self.apply_reorder(trip_id, &proposal, mode).await
    }

    /// Copy the current city-view visual order into the canonical manual
    /// order. Explicit user action only, never triggered automatically.
    pub async fn sync_city_order(
        &self,
        trip_id: i64,
        city_group_by: CityGroupBy,
    ) -> OrganizerResult<()> {
        let snapshot = self.store.list_bookings(trip_id).await?;
        let tree = build_hierarchy(&snapshot, &HashMap::new(), OrganizeMode::City, city_group_by);
        let flat = tree.flat_ids();
        self.store.update_order(trip_id, &flat).await?;
        info!(trip_id, count = flat.len(), "city order synchronized to canonical");
        Ok(())
    }

    async fn moved_units(
        &self,
        trip_id: i64,
        node_id: i64,
        target_id: Option<i64>,
        mode: OrganizeMode,
        city_group_by: CityGroupBy,
    ) -> OrganizerResult<Vec<i64>> {
        let snapshot = self.store.list_bookings(trip_id).await?;
        let tree = build_hierarchy(&snapshot, &HashMap::new(), mode, city_group_by);
        let mut units = tree.group_units();

        let from = units
            .iter()
            .position(|unit| unit.contains(&node_id))
            .ok_or_else(|| {
                OrganizerError::NotFound(format!("booking {} not on trip", node_id))
            })?;

        if let Some(target_id) = target_id {
            if units[from].contains(&target_id) {
                return Err(OrganizerError::Validation(
                    "members of a linked group cannot be reordered within it".to_string(),
                ));
            }
        }

        let moved = units.remove(from);
        match target_id {
            Some(target_id) => {
                let to = units
                    .iter()
                    .position(|unit| unit.contains(&target_id))
                    .ok_or_else(|| {
                        OrganizerError::NotFound(format!("booking {} not on trip", target_id))
                    })?;
                units.insert(to, moved);
            }
            None => units.push(moved),
        }

        Ok(units.into_iter().flatten().collect())
    }
}

/// A proposal must cover exactly the trip's bookings and keep every linked
/// group contiguous.
fn validate_proposal(snapshot: &[Booking], proposal: &[i64]) -> OrganizerResult<()> {
    let current: HashSet<i64> = snapshot.iter().map(|b| b.id()).collect();
    let proposed: HashSet<i64> = proposal.iter().copied().collect();

    if proposal.len() != proposed.len() {
        return Err(OrganizerError::Validation(
            "reorder proposal contains duplicate ids".to_string(),
        ));
    }
    if current != proposed {
        return Err(OrganizerError::Validation(format!(
            "reorder proposal does not match the trip's bookings ({} proposed, {} on trip)",
            proposed.len(),
            current.len()
        )));
    }

    let group_of: HashMap<i64, Uuid> = snapshot
        .iter()
        .filter_map(|b| b.group_id().map(|gid| (b.id(), gid)))
        .collect();

    let mut closed: HashSet<Uuid> = HashSet::new();
    let mut open: Option<Uuid> = None;
    for id in proposal {
        let gid = group_of.get(id).copied();
        if gid != open {
            if let Some(previous) = open {
                closed.insert(previous);
            }
            if let Some(gid) = gid {
                if closed.contains(&gid) {
                    return Err(OrganizerError::Validation(
                        "reorder proposal splits a linked group".to_string(),
                    ));
                }
            }
            open = gid;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{passenger, with_pickup, TRIP};
    use embarque_store::MemoryStore;

    async fn seeded(bookings: Vec<Booking>) -> (Arc<MemoryStore>, OrderingService<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.seed_trip(TRIP, bookings, vec![], vec![]).await;
        let service = OrderingService::new(store.clone());
        (store, service)
    }

    fn orders(bookings: &[Booking]) -> Vec<(i64, i64)> {
        bookings.iter().map(|b| (b.id(), b.order_index())).collect()
    }

    #[tokio::test]
    async fn test_default_reorder_reindexes_densely() {
        let (store, ordering) = seeded(vec![
            passenger(10, 0, "Ana"),
            passenger(20, 1, "Bruno"),
            passenger(30, 2, "Carla"),
        ])
        .await;

        let scope = ordering
            .apply_reorder(TRIP, &[30, 10, 20], OrganizeMode::Default)
            .await
            .unwrap();
        assert_eq!(scope, ReorderScope::Canonical);

        let bookings = store.list_bookings(TRIP).await.unwrap();
        assert_eq!(orders(&bookings), vec![(30, 0), (10, 1), (20, 2)]);

        let mut indices: Vec<i64> = bookings.iter().map(|b| b.order_index()).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_reorder_rejects_non_permutation() {
        let (_, ordering) = seeded(vec![passenger(1, 0, "Ana"), passenger(2, 1, "Bruno")]).await;

        for proposal in [vec![1], vec![1, 2, 3], vec![1, 1]] {
            let err = ordering
                .apply_reorder(TRIP, &proposal, OrganizeMode::Default)
                .await
                .unwrap_err();
            assert!(matches!(err, OrganizerError::Validation(_)), "{:?}", proposal);
        }
    }

    #[tokio::test]
    async fn test_reorder_rejects_split_groups() {
        let gid = Uuid::new_v4();
        let mut a = passenger(1, 0, "Ana");
        let mut b = passenger(2, 1, "Bruno");
        a.core_mut().group_id = Some(gid);
        b.core_mut().group_id = Some(gid);
        let (_, ordering) = seeded(vec![a, b, passenger(3, 2, "Carla")]).await;

        let err = ordering
            .apply_reorder(TRIP, &[1, 3, 2], OrganizeMode::Default)
            .await
            .unwrap_err();
        assert!(matches!(err, OrganizerError::Validation(_)));

        // Contiguous proposals are fine in either member order.
        ordering
            .apply_reorder(TRIP, &[3, 2, 1], OrganizeMode::Default)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_city_reorder_leaves_canonical_order_alone() {
        let (store, ordering) = seeded(vec![
            with_pickup(passenger(1, 0, "Ana"), "Salvador", "Centro"),
            with_pickup(passenger(2, 1, "Bruno"), "Salvador", "Centro"),
        ])
        .await;

        let scope = ordering
            .apply_reorder(TRIP, &[2, 1], OrganizeMode::City)
            .await
            .unwrap();
        assert_eq!(scope, ReorderScope::CityLocal);

        let bookings = store.list_bookings(TRIP).await.unwrap();
        assert_eq!(orders(&bookings), vec![(1, 0), (2, 1)]);
        assert_eq!(bookings[0].core().city_order_index, Some(1));
        assert_eq!(bookings[1].core().city_order_index, Some(0));
    }

    #[tokio::test]
    async fn test_driver_mode_reorder_is_view_only() {
        let (store, ordering) = seeded(vec![passenger(1, 0, "Ana"), passenger(2, 1, "Bruno")]).await;

        let scope = ordering
            .apply_reorder(TRIP, &[2, 1], OrganizeMode::Driver)
            .await
            .unwrap();
        assert_eq!(scope, ReorderScope::ViewOnly);

        let bookings = store.list_bookings(TRIP).await.unwrap();
        assert_eq!(orders(&bookings), vec![(1, 0), (2, 1)]);
        assert!(bookings.iter().all(|b| b.core().city_order_index.is_none()));
    }

    #[tokio::test]
    async fn test_move_before_moves_whole_group() {
        let gid = Uuid::new_v4();
        let mut b = passenger(2, 1, "Bruno");
        let mut c = passenger(3, 2, "Carla");
        b.core_mut().group_id = Some(gid);
        c.core_mut().group_id = Some(gid);
        let (store, ordering) = seeded(vec![passenger(1, 0, "Ana"), b, c]).await;

        // Dragging one member drags the whole group.
        ordering
            .move_before(TRIP, 3, 1, OrganizeMode::Default, CityGroupBy::Pickup)
            .await
            .unwrap();

        let bookings = store.list_bookings(TRIP).await.unwrap();
        assert_eq!(orders(&bookings), vec![(2, 0), (3, 1), (1, 2)]);
    }

    #[tokio::test]
    async fn test_move_within_group_is_rejected() {
        let gid = Uuid::new_v4();
        let mut a = passenger(1, 0, "Ana");
        let mut b = passenger(2, 1, "Bruno");
        a.core_mut().group_id = Some(gid);
        b.core_mut().group_id = Some(gid);
        let (_, ordering) = seeded(vec![a, b]).await;

        let err = ordering
            .move_before(TRIP, 2, 1, OrganizeMode::Default, CityGroupBy::Pickup)
            .await
            .unwrap_err();
        assert!(matches!(err, OrganizerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_move_to_end() {
        let (store, ordering) = seeded(vec![
            passenger(1, 0, "Ana"),
            passenger(2, 1, "Bruno"),
            passenger(3, 2, "Carla"),
        ])
        .await;

        ordering
            .move_to_end(TRIP, 1, OrganizeMode::Default, CityGroupBy::Pickup)
            .await
            .unwrap();

        let bookings = store.list_bookings(TRIP).await.unwrap();
        assert_eq!(orders(&bookings), vec![(2, 0), (3, 1), (1, 2)]);
    }

    #[tokio::test]
    async fn test_sync_city_order_copies_visual_order() {
        let mut a = with_pickup(passenger(1, 0, "Ana"), "Salvador", "Centro");
        let mut b = with_pickup(passenger(2, 1, "Bruno"), "Feira de Santana", "");
        let c = with_pickup(passenger(3, 2, "Carla"), "Salvador", "");
        a.core_mut().city_order_index = Some(0);
        b.core_mut().city_order_index = Some(0);
        let (store, ordering) = seeded(vec![a, b, c]).await;

        ordering.sync_city_order(TRIP, CityGroupBy::Pickup).await.unwrap();

        // City view: FEIRA DE SANTANA first, then SALVADOR (GENERAL before
        // CENTRO); the canonical order now matches it.
        let bookings = store.list_bookings(TRIP).await.unwrap();
        assert_eq!(orders(&bookings), vec![(2, 0), (3, 1), (1, 2)]);
    }
}
