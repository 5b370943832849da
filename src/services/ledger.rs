//! Participation ledger: gates every write to the participant and
//! registration pools so that each user holds at most one entry per
//! giveaway or tournament.

use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

use crate::database::models::{NewRegistration, NewUser};
use crate::database::{EntityKind, StorageError, Store, StoreResult};
use crate::utils::logging::{log_participation, log_validation_error};
use crate::utils::validation::{validate_age, validate_required_field, validate_user_id, FieldValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipationOutcome {
    /// The entry was written; `participants` is the pool size right after it.
    Added { participants: i64 },
    AlreadyExists,
    EntityNotFound,
    /// Giveaway completed/finished or tournament registration closed.
    EntityClosed,
}

impl ParticipationOutcome {
    fn label(&self) -> &'static str {
        match self {
            ParticipationOutcome::Added { .. } => "added",
            ParticipationOutcome::AlreadyExists => "already exists",
            ParticipationOutcome::EntityNotFound => "entity not found",
            ParticipationOutcome::EntityClosed => "entity closed",
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Tournament sign-up fields as submitted by the web app.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationForm {
    pub age: Option<FieldValue>,
    pub phone_brand: Option<FieldValue>,
    pub nickname: Option<FieldValue>,
    pub game_id: Option<FieldValue>,
}

impl RegistrationForm {
    fn validate(&self, tournament_id: i64, user_id: i64) -> anyhow::Result<NewRegistration> {
        Ok(NewRegistration {
            tournament_id,
            user_id: validate_user_id(Some(user_id))?,
            age: validate_age(self.age.as_ref())?,
            phone_brand: validate_required_field("phone_brand", self.phone_brand.as_ref())?,
            nickname: validate_required_field("nickname", self.nickname.as_ref())?,
            game_id: validate_required_field("game_id", self.game_id.as_ref())?,
        })
    }
}

#[derive(Clone)]
pub struct ParticipationLedger {
    store: Arc<dyn Store>,
}

impl ParticipationLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Records `user` in the pool of the given entity. Tournaments require
    /// a registration form; a missing form fails validation like a form with
    /// every field missing.
    pub async fn participate(
        &self,
        kind: EntityKind,
        id: i64,
        user: &NewUser,
        form: Option<&RegistrationForm>,
    ) -> Result<ParticipationOutcome, LedgerError> {
        match kind {
            EntityKind::Giveaway => self.join_giveaway(id, user).await,
            EntityKind::Tournament => {
                let empty = RegistrationForm::default();
                self.register_for_tournament(id, user, form.unwrap_or(&empty)).await
            }
        }
    }

    pub async fn join_giveaway(
        &self,
        giveaway_id: i64,
        user: &NewUser,
    ) -> Result<ParticipationOutcome, LedgerError> {
        let kind = EntityKind::Giveaway;

        let giveaway = match self.store.get_giveaway(giveaway_id).await? {
            Some(giveaway) => giveaway,
            None => return Ok(report(kind, giveaway_id, user.user_id, ParticipationOutcome::EntityNotFound)),
        };
        if giveaway.status.is_terminal() {
            return Ok(report(kind, giveaway_id, user.user_id, ParticipationOutcome::EntityClosed));
        }

        validate_user_id(Some(user.user_id)).map_err(|e| validation_error("join_giveaway", e))?;

        self.store.upsert_user(user).await?;
        let written = self.store.add_giveaway_participant(giveaway_id, user.user_id).await;
        self.settle(kind, giveaway_id, user.user_id, written).await
    }

    pub async fn register_for_tournament(
        &self,
        tournament_id: i64,
        user: &NewUser,
        form: &RegistrationForm,
    ) -> Result<ParticipationOutcome, LedgerError> {
        let kind = EntityKind::Tournament;

        let tournament = match self.store.get_tournament(tournament_id).await? {
            Some(tournament) => tournament,
            None => return Ok(report(kind, tournament_id, user.user_id, ParticipationOutcome::EntityNotFound)),
        };
        if !tournament.registration_status.is_open() {
            return Ok(report(kind, tournament_id, user.user_id, ParticipationOutcome::EntityClosed));
        }

        let registration = form
            .validate(tournament_id, user.user_id)
            .map_err(|e| validation_error("register_for_tournament", e))?;

        self.store.upsert_user(user).await?;
        let written = self.store.add_tournament_registration(&registration).await;
        self.settle(kind, tournament_id, user.user_id, written).await
    }

    /// Turns the raw write result into an outcome, counting the pool on success.
    async fn settle(
        &self,
        kind: EntityKind,
        id: i64,
        user_id: i64,
        written: StoreResult<()>,
    ) -> Result<ParticipationOutcome, LedgerError> {
        let outcome = match written {
            Ok(()) => ParticipationOutcome::Added {
                participants: self.store.count_participants(kind, id).await?,
            },
            Err(StorageError::ConstraintViolation(_)) => ParticipationOutcome::AlreadyExists,
            // Deleted between the lookup and the write
            Err(StorageError::NotFound { .. }) => ParticipationOutcome::EntityNotFound,
            Err(e) => return Err(e.into()),
        };
        Ok(report(kind, id, user_id, outcome))
    }
}

fn report(kind: EntityKind, id: i64, user_id: i64, outcome: ParticipationOutcome) -> ParticipationOutcome {
    log_participation(kind.as_str(), id, user_id, outcome.label());
    outcome
}

fn validation_error(operation: &str, error: anyhow::Error) -> LedgerError {
    let message = error.to_string();
    log_validation_error(operation, &message);
    LedgerError::Validation(message)
}
