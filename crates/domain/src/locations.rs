//! The fixed set of named inventory locations.
//!
//! Automated flows only ever touch three locations, looked up by name:
//! [`PRODUCTION`], [`FULFILLMENT`] and [`IN_TRANSIT`]. Their ids are resolved
//! once into a [`LocationMap`] and cached by the [`LocationRegistry`] until a
//! location is created, activated or deactivated.

use std::sync::Arc;

use common::{Location, LocationId};
use store::LocationRepository;
use tokio::sync::RwLock;

use crate::error::{DomainError, Result};

pub const PRODUCTION: &str = "Production";
pub const FULFILLMENT: &str = "Fulfillment";
pub const IN_TRANSIT: &str = "In Transit";

/// Canonical locations with their seed descriptions.
pub const DEFAULT_LOCATIONS: [(&str, &str); 3] = [
    (PRODUCTION, "Manufacturing/Production area"),
    (FULFILLMENT, "Ready for delivery"),
    (IN_TRANSIT, "Currently being delivered"),
];

/// Resolved ids of the three canonical locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationMap {
    pub production: LocationId,
    pub fulfillment: LocationId,
    pub in_transit: LocationId,
}

/// Creates each canonical location that does not exist yet.
///
/// Existing rows are left untouched, including their description and active
/// flag. Returns the number of rows created.
pub async fn ensure_default_locations<T: LocationRepository>(tx: &mut T) -> Result<usize> {
    let mut created = 0;
    for (name, description) in DEFAULT_LOCATIONS {
        let location = Location {
            id: LocationId::new(),
            name: name.to_string(),
            description: Some(description.to_string()),
            is_active: true,
        };
        if tx.insert_location_if_absent(&location).await? {
            tracing::info!(location = name, "created default location");
            created += 1;
        }
    }
    Ok(created)
}

/// Looks up the canonical locations by name.
///
/// Fails with a configuration error naming every location that is missing or
/// inactive.
pub async fn resolve_locations<T: LocationRepository>(tx: &mut T) -> Result<LocationMap> {
    let mut ids = Vec::with_capacity(DEFAULT_LOCATIONS.len());
    let mut problems = Vec::new();

    for (name, _) in DEFAULT_LOCATIONS {
        match tx.find_location_by_name(name).await? {
            Some(location) if location.is_active => ids.push(location.id),
            Some(_) => problems.push(format!("{name} (inactive)")),
            None => problems.push(format!("{name} (missing)")),
        }
    }

    if !problems.is_empty() {
        let message = format!("Required locations unavailable: {}", problems.join(", "));
        tracing::error!(%message, "location resolution failed");
        return Err(DomainError::Configuration(message));
    }

    Ok(LocationMap {
        production: ids[0],
        fulfillment: ids[1],
        in_transit: ids[2],
    })
}

/// Caches the resolved [`LocationMap`].
///
/// Resolution always runs inside the caller's transaction, and a map is only
/// cached when that transaction did not have to create any location, so a
/// rolled back seed never leaves stale ids behind. Every invalidation bumps a
/// generation; a map resolved under an older generation is not cached.
#[derive(Clone, Default)]
pub struct LocationRegistry {
    state: Arc<RwLock<CacheState>>,
}

#[derive(Default)]
struct CacheState {
    map: Option<LocationMap>,
    generation: u64,
}

impl LocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the location map, resolving it on a cache miss.
    pub async fn resolve<T: LocationRepository>(&self, tx: &mut T) -> Result<LocationMap> {
        let (cached, generation) = self.snapshot().await;
        if let Some(map) = cached {
            return Ok(map);
        }
        let map = resolve_locations(tx).await?;
        self.store(generation, map).await;
        Ok(map)
    }

    /// Seeds missing canonical locations, then resolves the map.
    pub async fn ensure_and_resolve<T: LocationRepository>(
        &self,
        tx: &mut T,
    ) -> Result<LocationMap> {
        let (cached, generation) = self.snapshot().await;
        if let Some(map) = cached {
            return Ok(map);
        }
        let created = ensure_default_locations(tx).await?;
        let map = resolve_locations(tx).await?;
        if created == 0 {
            self.store(generation, map).await;
        }
        Ok(map)
    }

    /// Drops the cached map.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.map = None;
        state.generation += 1;
    }

    async fn snapshot(&self) -> (Option<LocationMap>, u64) {
        let state = self.state.read().await;
        (state.map, state.generation)
    }

    async fn store(&self, generation: u64, map: LocationMap) {
        let mut state = self.state.write().await;
        if state.generation == generation {
            state.map = Some(map);
        } else {
            tracing::debug!("location map invalidated during resolution; not cached");
        }
    }
}
