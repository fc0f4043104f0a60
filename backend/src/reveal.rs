use chrono::Utc;
use santa_core::{admit_reveal, Rejection, RevealState};
use serde::Serialize;
use thiserror::Error;

use crate::config::Settings;
use crate::store::{self, Store, StoreError};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Revealed {
    pub giver: String,
    pub receiver: String,
}

#[derive(Debug, Error)]
pub enum RevealError {
    #[error("{0}")]
    Rejected(#[from] Rejection),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Hands each giver their receiver exactly once.
pub struct Gatekeeper<'a> {
    settings: &'a Settings,
    store: &'a Store,
}

impl<'a> Gatekeeper<'a> {
    pub fn new(settings: &'a Settings, store: &'a Store) -> Self {
        Self { settings, store }
    }

    /// The reveal mark commits in the same transaction that reads the
    /// receiver, so a disclosed receiver is always already marked.
    pub async fn reveal(&self, giver: &str, supplied_pin: &str) -> Result<Revealed, RevealError> {
        let giver = giver.trim();
        let supplied_pin = supplied_pin.trim();

        self.store
            .atomically(|tx| {
                let state = RevealState::from(store::is_revealed(tx, giver)?);
                admit_reveal(
                    &self.settings.roster,
                    &self.settings.pins,
                    giver,
                    supplied_pin,
                    state,
                )?;

                let receiver =
                    store::load_receiver(tx, giver)?.ok_or(Rejection::MissingAssignment)?;
                store::insert_reveal(tx, giver, Utc::now())?;

                Ok(Revealed {
                    giver: giver.to_string(),
                    receiver,
                })
            })
            .await
    }
}
