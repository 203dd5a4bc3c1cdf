//! `cradle` - child identification records and lost-child contact cards
//!
//! This library keeps parent accounts, the child records each parent owns,
//! the identification payload printed on each child's contact card, and a
//! process-lifetime SOS alert log.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod account;
pub mod app;
pub mod child;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod payload;
pub mod session;
pub mod sos;
pub mod store;

pub use account::{AccountRegistry, User};
pub use app::{Cradle, Status};
pub use child::{Child, ChildId, ChildRegistry, Guardian, NewChild, PhotoUpload};
pub use config::Config;
pub use error::{AuthError, ChildError, Error, ErrorClass, RegistrationError, Result};
pub use logging::init_logging;
pub use payload::{encode_payload, PayloadEncoder, Rasterizer, TextCardRasterizer};
pub use session::Session;
pub use sos::{AlertLog, SosEvent};
pub use store::{Collection, JsonStore};
