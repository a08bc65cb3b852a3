pub mod delivery;
pub mod media;
pub mod phone_resolver;
pub mod session;
pub mod upsell;

#[cfg(test)]
pub(crate) mod testing;

pub use delivery::{DeliveryError, Dispatcher};
pub use media::{ensure_local_image, prepare_offer_media};
pub use phone_resolver::{CandidateFinder, PhoneCandidate, PhoneResolver};
pub use session::{spawn_ready_watch, ReadyClock};
pub use upsell::UpsellMessage;
