//! Command implementations for deskflow.
//!
//! This module contains the implementation of all CLI commands.

mod profile;
mod rule;
mod sweep;
mod ticket;

use std::sync::Arc;

pub use profile::{agent, profile};
pub use rule::rule;
pub use sweep::{sweep, watch};
pub use ticket::{task, ticket};

use crate::config::{Config, Paths};
use crate::desk::Desk;
use crate::error::DeskError;
use crate::storage::Database;

/// Everything a command needs: settings, paths and the open database.
pub struct AppContext {
    pub config: Config,
    pub paths: Paths,
    pub database: Arc<Database>,
}

impl AppContext {
    /// Resolve paths, load the config, and open the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created, the config
    /// is invalid, or the database cannot be opened.
    pub fn open() -> Result<Self, DeskError> {
        let paths = Paths::new()?;
        paths.ensure_dirs()?;
        let config = Config::load_from_path(&paths.config_file)?;
        let database = Arc::new(Database::open_at(&paths.database)?);

        Ok(Self {
            config,
            paths,
            database,
        })
    }

    /// A desk over this context's database.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Config` if the business hours are invalid.
    pub fn desk(&self) -> Result<Desk, DeskError> {
        Desk::new(Arc::clone(&self.database), &self.config)
    }
}
