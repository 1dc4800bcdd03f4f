pub mod sms;

mod error;

pub use error::{DeliveryError, Error, Result};
