use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use embarque_core::palette::TagPalette;
use embarque_core::OrganizerResult;
use embarque_manifest::ManifestOrganizer;
use embarque_shared::ManifestEvent;
use embarque_store::MemoryStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub palette: TagPalette,
    pub events: broadcast::Sender<ManifestEvent>,
    organizers: Arc<RwLock<HashMap<i64, Arc<ManifestOrganizer<MemoryStore>>>>>,
}

impl AppState {
    pub fn new(store: Arc<MemoryStore>, palette: TagPalette) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            store,
            palette,
            events,
            organizers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// One organizer per trip, created on first use with a fresh snapshot.
    pub async fn organizer(
        &self,
        trip_id: i64,
    ) -> OrganizerResult<Arc<ManifestOrganizer<MemoryStore>>> {
        if let Some(organizer) = self.organizers.read().await.get(&trip_id) {
            return Ok(organizer.clone());
        }

        let organizer = Arc::new(ManifestOrganizer::new(
            self.store.clone(),
            trip_id,
            self.palette.clone(),
            self.events.clone(),
        ));
        organizer.refresh().await?;
        self.organizers
            .write()
            .await
            .insert(trip_id, organizer.clone());
        Ok(organizer)
    }
}
