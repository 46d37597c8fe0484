pub mod entitlement;
pub mod listing;
pub mod session;
pub mod user;

pub use entitlement::{Entitlement, EntitlementStatus};
pub use listing::{Category, Listing, ListingStatus, NewListing};
pub use session::Session;
pub use user::{Identity, ProfileUpdate, Role, RoleProfile};
