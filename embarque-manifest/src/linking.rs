use std::sync::Arc;

use tracing::{info, warn};

use embarque_core::booking::Booking;
use embarque_core::palette::TagPalette;
use embarque_core::store::BookingStore;
use embarque_core::{OrganizerError, OrganizerResult};

/// Merges and splits bookings into linked groups (families traveling
/// together) and cascades tag colors across members.
pub struct LinkingService<S> {
    store: Arc<S>,
    palette: TagPalette,
}

impl<S: BookingStore> LinkingService<S> {
    pub fn new(store: Arc<S>, palette: TagPalette) -> Self {
        Self { store, palette }
    }

    /// Attach `target_id` to the group anchored at `anchor_id`. The target
    /// must sit immediately next to the anchor's group in manual order and
    /// must not already belong to a different group. Re-linking an existing
    /// member is a no-op.
    pub async fn link(&self, trip_id: i64, target_id: i64, anchor_id: i64) -> OrganizerResult<()> {
        if target_id == anchor_id {
            return Err(OrganizerError::Validation(
                "cannot link a booking to itself".to_string(),
            ));
        }

        let snapshot = self.store.list_bookings(trip_id).await?;
        let target = find(&snapshot, target_id)?;
        let anchor = find(&snapshot, anchor_id)?;

        if !target.is_passenger() || !anchor.is_passenger() {
            return Err(OrganizerError::Validation(
                "parcels do not participate in linked groups".to_string(),
            ));
        }

        if let (Some(t), Some(a)) = (target.group_id(), anchor.group_id()) {
            if t == a {
                return Ok(());
            }
        }
        if target.group_id().is_some() {
            return Err(OrganizerError::Validation(format!(
                "booking {} already belongs to another group; unlink it first",
                target_id
            )));
        }

        // The target must be adjacent to the anchor's group span, not merely
        // to the anchor itself.
        let (span_min, span_max) = group_span(&snapshot, anchor);
        let order = target.order_index();
        if order != span_min - 1 && order != span_max + 1 {
            return Err(OrganizerError::Validation(format!(
                "booking {} is not adjacent to booking {} in manual order",
                target_id, anchor_id
            )));
        }

        self.store.link(target_id, anchor_id).await?;
        info!(trip_id, target_id, anchor_id, "linked booking into group");
        Ok(())
    }

    /// Remove a booking from its group. A group left with a single member is
    /// dissolved: the survivor's identifier is cleared too. Unlinking an
    /// ungrouped booking is a no-op.
    pub async fn unlink(&self, trip_id: i64, booking_id: i64) -> OrganizerResult<()> {
        let snapshot = self.store.list_bookings(trip_id).await?;
        let booking = find(&snapshot, booking_id)?;

        let gid = match booking.group_id() {
            Some(gid) => gid,
            None => return Ok(()),
        };

        let remaining: Vec<i64> = snapshot
            .iter()
            .filter(|b| b.group_id() == Some(gid) && b.id() != booking_id)
            .map(|b| b.id())
            .collect();

        self.store.unlink(booking_id).await?;
        if let [survivor] = remaining.as_slice() {
            self.store.unlink(*survivor).await?;
            info!(trip_id, booking_id, survivor, "group of two dissolved");
        } else {
            info!(trip_id, booking_id, "booking unlinked from group");
        }
        Ok(())
    }

    /// Set (or clear) the tag color on a booking and every member of its
    /// group. All rows must succeed; otherwise the already-written rows are
    /// restored and the failure is surfaced. Returns the affected ids.
    pub async fn set_tag(
        &self,
        trip_id: i64,
        booking_id: i64,
        color: Option<&str>,
    ) -> OrganizerResult<Vec<i64>> {
        self.palette.check(color)?;

        let snapshot = self.store.list_bookings(trip_id).await?;
        let booking = find(&snapshot, booking_id)?;

        let members: Vec<&Booking> = match booking.group_id() {
            Some(gid) => snapshot
                .iter()
                .filter(|b| b.group_id() == Some(gid))
                .collect(),
            None => vec![booking],
        };

        let mut written: Vec<(i64, Option<String>)> = Vec::new();
        for member in &members {
            match self.store.set_tag(member.id(), color).await {
                Ok(()) => written.push((member.id(), member.core().tag_color.clone())),
                Err(err) => {
                    warn!(
                        trip_id,
                        booking_id = member.id(),
                        %err,
                        "tag cascade failed, restoring previous colors"
                    );
                    for (id, previous) in written {
                        if let Err(restore_err) =
                            self.store.set_tag(id, previous.as_deref()).await
                        {
                            warn!(booking_id = id, %restore_err, "tag restore failed");
                        }
                    }
                    return Err(err);
                }
            }
        }

        info!(trip_id, booking_id, ?color, count = written.len(), "tag applied to group");
        Ok(written.into_iter().map(|(id, _)| id).collect())
    }
}

fn find(snapshot: &[Booking], booking_id: i64) -> OrganizerResult<&Booking> {
    snapshot
        .iter()
        .find(|b| b.id() == booking_id)
        .ok_or_else(|| OrganizerError::NotFound(format!("booking {} not on trip", booking_id)))
}

/// Manual-order span covered by the anchor's group (the anchor alone when
/// ungrouped).
fn group_span(snapshot: &[Booking], anchor: &Booking) -> (i64, i64) {
    match anchor.group_id() {
        Some(gid) => {
            let orders: Vec<i64> = snapshot
                .iter()
                .filter(|b| b.group_id() == Some(gid))
                .map(|b| b.order_index())
                .collect();
            (
                orders.iter().copied().min().unwrap_or(anchor.order_index()),
                orders.iter().copied().max().unwrap_or(anchor.order_index()),
            )
        }
        None => (anchor.order_index(), anchor.order_index()),
    }
}
