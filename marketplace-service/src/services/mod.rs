pub mod clock;
pub mod database;
pub mod error;
pub mod gate;
pub mod gateway;
pub mod identity_provider;
pub mod ledger;
pub mod listing;
pub mod memory;
pub mod metrics;
pub mod razorpay;
pub mod registration;
pub mod session;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use database::MongoStore;
pub use error::ServiceError;
pub use gate::{Authorization, AuthorizationGate, GateStage};
pub use gateway::{GatewayOrder, MockPaymentGateway, PaymentGateway};
pub use identity_provider::{
    HttpIdentityProvider, IdentityProvider, MockIdentityProvider, ProviderProfile,
};
pub use ledger::{EntitlementLedger, ListingFee, OrderHandle};
pub use listing::ListingService;
pub use memory::MemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use razorpay::RazorpayClient;
pub use registration::{PhoneRule, RegistrationInput, RegistrationValidator};
pub use session::{SessionAuthenticator, SessionToken};
pub use store::{EntitlementStore, IdentityStore, ListingStore, SessionStore, Store};
