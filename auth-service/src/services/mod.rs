//! Services layer: token codec, reset flow, gates, delivery and storage.

pub mod clock;
pub mod database;
pub mod email;
pub mod error;
pub mod gate;
pub mod link;
pub mod memory;
pub mod policy;
pub mod reset;
pub mod store;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use database::PgStore;
pub use email::{RecordingSender, ResetLinkSender, SentLink, SmtpResetLinkSender};
pub use error::{DeliveryError, ResetError, StoreError, INVALID_RESET_LINK_MESSAGE};
pub use gate::{Ability, Gate, GateName, ACCESS_DENIED_MESSAGE};
pub use link::ResetLink;
pub use memory::MemoryStore;
pub use policy::{PolicyError, PolicyService};
pub use reset::{DeliveryReport, PendingDelivery, ResetRequestOutcome, ResetService};
pub use store::{ConsumeOutcome, CredentialStore, ResetStore, TokenStore};
pub use token::{IssuedToken, ResetTokenValue, TokenCodec};
