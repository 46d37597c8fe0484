use crate::models::{Listing, NewListing};
use crate::services::clock::Clock;
use crate::services::gate::AuthorizationGate;
use crate::services::store::ListingStore;
use crate::services::ServiceError;
use std::sync::Arc;

const MAX_TITLE_LEN: usize = 120;
const MAX_DESCRIPTION_LEN: usize = 2000;

/// Creates listings behind the authorization gate.
#[derive(Clone)]
pub struct ListingService {
    gate: AuthorizationGate,
    listings: Arc<dyn ListingStore>,
    clock: Arc<dyn Clock>,
}

impl ListingService {
    pub fn new(
        gate: AuthorizationGate,
        listings: Arc<dyn ListingStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gate,
            listings,
            clock,
        }
    }

    /// Checks listing fields without touching any entitlement.
    pub fn validate(
        title: &str,
        description: &str,
        price: f64,
        category: &str,
    ) -> Result<NewListing, ServiceError> {
        let title = title.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(ServiceError::InvalidInput(format!(
                "title must be 1-{} characters",
                MAX_TITLE_LEN
            )));
        }
        let description = description.trim();
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ServiceError::InvalidInput(format!(
                "description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(ServiceError::InvalidInput(
                "price must be a positive number".to_string(),
            ));
        }
        let category = category.parse().map_err(ServiceError::InvalidInput)?;

        Ok(NewListing {
            title: title.to_string(),
            description: description.to_string(),
            price,
            category,
        })
    }

    /// Spends one entitlement and persists the listing.
    ///
    /// If persistence fails after the claim, the entitlement stays spent.
    pub async fn create(
        &self,
        token: Option<&str>,
        input: NewListing,
    ) -> Result<Listing, ServiceError> {
        let authorization = self.gate.authorize_creation(token).await?;

        let listing = Listing::new(
            input,
            &authorization.identity,
            authorization.entitlement_id.clone(),
            self.clock.now(),
        );

        if let Err(e) = self.listings.insert_listing(&listing).await {
            tracing::error!(
                error = %e,
                identity_id = %authorization.identity.id,
                entitlement_id = %authorization.entitlement_id,
                "Listing persistence failed after entitlement was consumed; manual reconciliation required"
            );
            return Err(e);
        }

        tracing::info!(
            listing_id = %listing.id,
            entitlement_id = %listing.entitlement_id,
            "Listing created"
        );
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    #[test]
    fn validate_rejects_bad_fields() {
        assert!(ListingService::validate("", "d", 10.0, "Notes").is_err());
        assert!(ListingService::validate("t", "d", 0.0, "Notes").is_err());
        assert!(ListingService::validate("t", "d", f64::NAN, "Notes").is_err());
        assert!(matches!(
            ListingService::validate("t", "d", 10.0, "Furniture"),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn validate_trims_and_parses_category() {
        let listing = ListingService::validate("  Casio fx-991 ", "barely used", 450.0, "Electronics")
            .unwrap();
        assert_eq!(listing.title, "Casio fx-991");
        assert_eq!(listing.category, Category::Electronics);
    }
}
