use santa_core::{generate_with_thread_rng, Assignment, Pair, SantaError};
use serde::Serialize;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::Settings;
use crate::store::{RevealRecord, Store, StoreError};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("unauthorized")]
    Unauthorized,
    #[error(transparent)]
    Generation(#[from] SantaError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AdminOverview {
    pub pairs: Vec<Pair>,
    pub revealed: Vec<RevealRecord>,
}

pub struct AdminController<'a> {
    settings: &'a Settings,
    store: &'a Store,
}

impl<'a> AdminController<'a> {
    pub fn new(settings: &'a Settings, store: &'a Store) -> Self {
        Self { settings, store }
    }

    /// No configured key means nobody is authorized.
    pub fn authorize(&self, supplied: &str) -> Result<(), AdminError> {
        match self.settings.admin_key.as_deref() {
            Some(expected) if keys_match(expected, supplied) => Ok(()),
            _ => Err(AdminError::Unauthorized),
        }
    }

    /// Draws again from scratch and drops every reveal.
    pub async fn reset(&self, supplied: &str) -> Result<Assignment, AdminError> {
        self.authorize(supplied)?;
        let assignment = generate_with_thread_rng(&self.settings.roster, &self.settings.forbidden)?;
        self.store.create_or_replace(&assignment).await?;
        tracing::info!(participants = assignment.len(), "draw reset by admin");
        Ok(assignment)
    }

    pub async fn overview(&self, supplied: &str) -> Result<AdminOverview, AdminError> {
        self.authorize(supplied)?;
        let pairs = self
            .store
            .assignment()
            .await?
            .map(|a| a.pairs().to_vec())
            .unwrap_or_default();
        let revealed = self.store.reveal_records().await?;
        Ok(AdminOverview { pairs, revealed })
    }
}

fn keys_match(expected: &str, supplied: &str) -> bool {
    bool::from(expected.as_bytes().ct_eq(supplied.as_bytes()))
}
