//! The assembled registry.
//!
//! [`Cradle`] wires the store, both registries, the payload encoder and the
//! alert log together from a [`Config`]. It is the complete surface a front
//! end needs.

use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::account::AccountRegistry;
use crate::child::ChildRegistry;
use crate::config::Config;
use crate::error::{AuthError, ChildError, Result};
use crate::payload::{PayloadEncoder, Rasterizer, TextCardRasterizer};
use crate::session::Session;
use crate::sos::{AlertLog, SosEvent};
use crate::store::{BlobStore, JsonStore};

/// Snapshot of the durable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    /// Root of all durable state.
    pub data_dir: PathBuf,
    /// Registered accounts.
    pub users: usize,
    /// Child records across all owners.
    pub children: usize,
    /// Stored photos.
    pub photos: usize,
    /// Stored identification images.
    pub images: usize,
    /// Alerts raised in this process.
    pub alerts: usize,
}

/// Accounts, children, identification images and alerts over one data
/// directory.
#[derive(Debug)]
pub struct Cradle {
    store: JsonStore,
    accounts: AccountRegistry,
    children: ChildRegistry,
    alerts: AlertLog,
}

impl Cradle {
    /// Open the registry described by `config` with the plain-text card
    /// rasterizer.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directories cannot be created.
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_with_rasterizer(config, Box::new(TextCardRasterizer))
    }

    /// Open the registry with a custom rasterizer.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directories cannot be created.
    pub fn open_with_rasterizer(config: &Config, rasterizer: Box<dyn Rasterizer>) -> Result<Self> {
        let data_dir = config.data_dir();
        let store = JsonStore::open(&data_dir, &config.storage)?;
        let photos = BlobStore::open(config.photos_dir())?;
        let images = BlobStore::open(config.qrcodes_dir())?;

        let encoder = PayloadEncoder::new(images, config.payload, rasterizer);
        let accounts = AccountRegistry::new(store.clone(), &config.accounts);
        let children = ChildRegistry::new(
            store.clone(),
            photos,
            config.storage.photos_dir.clone(),
            &config.children,
            encoder,
        );

        info!("Opened registry at {}", data_dir.display());
        Ok(Self {
            store,
            accounts,
            children,
            alerts: AlertLog::new(),
        })
    }

    /// The account registry.
    #[must_use]
    pub fn accounts(&self) -> &AccountRegistry {
        &self.accounts
    }

    /// The child registry.
    #[must_use]
    pub fn children(&self) -> &ChildRegistry {
        &self.children
    }

    /// The alert log.
    #[must_use]
    pub fn alerts(&self) -> &AlertLog {
        &self.alerts
    }

    /// Authenticate and open a session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if the credentials are
    /// rejected.
    pub fn login(&self, email: &str, password: &str) -> std::result::Result<Session, AuthError> {
        self.accounts
            .authenticate(email, password)
            .map(Session::for_authenticated)
    }

    /// Raise an SOS alert for one of the session's children.
    ///
    /// # Errors
    ///
    /// Returns [`ChildError::NotFound`] if the child is not visible to the
    /// session.
    pub fn raise_alert(
        &self,
        session: &Session,
        child_id: &str,
    ) -> std::result::Result<SosEvent, ChildError> {
        let child = self.children.get_child(session, child_id)?;
        Ok(self.alerts.raise_alert(&child.name))
    }

    /// Count what is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection or directory cannot be read.
    pub fn status(&self) -> Result<Status> {
        let stats = self.store.stats()?;
        Ok(Status {
            data_dir: self.store.root().to_path_buf(),
            users: stats.users,
            children: stats.children,
            photos: self.children.photo_count()?,
            images: self.children.encoder().stored()?,
            alerts: self.alerts.len(),
        })
    }
}
