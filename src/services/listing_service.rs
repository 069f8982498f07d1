use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::database::store::{KindCount, ListingStore, ParticipantDirectory};
use crate::dto::listing_dto::{CreateListingPayload, ListingDetailResponse, UpdateListingPayload};
use crate::error::{Error, Result};
use crate::models::listing::{Listing, ListingKind};
use crate::services::access::{AccessPolicy, AuthUser};
use crate::utils::time::Clock;

/// Fetches a listing and checks it is of the variant the route serves.
pub(crate) async fn load_listing(
    store: &dyn ListingStore,
    kind: ListingKind,
    id: Uuid,
) -> Result<Listing> {
    match store.find_listing(id).await? {
        Some(listing) if listing.kind == kind => Ok(listing),
        _ => Err(Error::NotFound(format!("{} not found", kind.label()))),
    }
}

#[derive(Clone)]
pub struct ListingService {
    store: Arc<dyn ListingStore>,
    directory: Arc<dyn ParticipantDirectory>,
    clock: Arc<dyn Clock>,
    access: AccessPolicy,
}

impl ListingService {
    pub fn new(
        store: Arc<dyn ListingStore>,
        directory: Arc<dyn ParticipantDirectory>,
        clock: Arc<dyn Clock>,
        access: AccessPolicy,
    ) -> Self {
        Self {
            store,
            directory,
            clock,
            access,
        }
    }

    pub async fn create(
        &self,
        caller: &AuthUser,
        kind: ListingKind,
        payload: CreateListingPayload,
    ) -> Result<Listing> {
        self.access.can_create(caller)?;
        let now = self.clock.now();
        let new_listing = payload.into_new_listing(kind, caller.id, now)?;
        let listing = self.store.create_listing(new_listing, now).await?;
        info!(listing_id = %listing.id, kind = %kind, owner_id = %caller.id, "listing created");
        Ok(listing)
    }

    pub async fn get(&self, kind: ListingKind, id: Uuid) -> Result<Listing> {
        load_listing(self.store.as_ref(), kind, id).await
    }

    /// The listing with owner display fields and its registry.
    pub async fn detail(&self, kind: ListingKind, id: Uuid) -> Result<ListingDetailResponse> {
        let listing = self.get(kind, id).await?;
        let registry = self.store.registry(id).await?;
        let owner = self
            .directory
            .resolve(&[listing.owner_id])
            .await?
            .into_iter()
            .next();
        Ok(ListingDetailResponse::new(listing, owner, &registry))
    }

    pub async fn update(
        &self,
        caller: &AuthUser,
        kind: ListingKind,
        id: Uuid,
        payload: UpdateListingPayload,
    ) -> Result<Listing> {
        let mut listing = self.get(kind, id).await?;
        self.access.can_manage(caller, &listing)?;
        let now = self.clock.now();
        payload.apply_to(&mut listing, now)?;
        let updated = self.store.update_listing(&listing, now).await?;
        info!(listing_id = %id, kind = %kind, "listing updated");
        Ok(updated)
    }

    pub async fn delete(&self, caller: &AuthUser, kind: ListingKind, id: Uuid) -> Result<()> {
        let listing = self.get(kind, id).await?;
        self.access.can_manage(caller, &listing)?;
        if !self.store.delete_listing(id).await? {
            return Err(Error::NotFound(format!("{} not found", kind.label())));
        }
        info!(listing_id = %id, kind = %kind, "listing deleted");
        Ok(())
    }

    /// Manual visibility toggle. Unhiding is never undone by the sweep until the
    /// listing is hidden again, even when its window has already closed.
    pub async fn set_hidden(
        &self,
        caller: &AuthUser,
        kind: ListingKind,
        id: Uuid,
        hidden: bool,
    ) -> Result<Listing> {
        let listing = self.get(kind, id).await?;
        self.access.can_manage(caller, &listing)?;
        let updated = self
            .store
            .set_hidden(id, hidden, self.clock.now())
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} not found", kind.label())))?;
        info!(listing_id = %id, kind = %kind, hidden, "listing visibility changed");
        Ok(updated)
    }

    /// Hides expired listings. The count is informational only.
    pub async fn sweep(&self, kind: Option<ListingKind>) -> Result<u64> {
        let hidden = self.store.hide_expired(kind, self.clock.now()).await?;
        if hidden > 0 {
            debug!(hidden, kind = ?kind, "expired listings hidden");
        }
        Ok(hidden)
    }

    /// Every visible listing of `kind`, newest first, after hiding the expired ones.
    pub async fn list_visible(&self, kind: ListingKind) -> Result<Vec<Listing>> {
        self.sweep(Some(kind)).await?;
        self.store.list_visible(kind).await
    }

    pub async fn list_owned(&self, caller: &AuthUser, kind: ListingKind) -> Result<Vec<Listing>> {
        self.access.can_create(caller)?;
        self.store.list_owned(kind, caller.id).await
    }

    pub async fn counts(&self) -> Result<Vec<KindCount>> {
        self.store.count_by_kind().await
    }
}
