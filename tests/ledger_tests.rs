mod common;

use anyhow::Result;
use std::sync::Arc;

use common::{giveaway, kv_db, sqlite_db, tournament, user};
use giveaway_bot::database::models::{GiveawayStatus, RegistrationStatus};
use giveaway_bot::database::{EntityKind, Store};
use giveaway_bot::services::ledger::{LedgerError, ParticipationLedger, ParticipationOutcome, RegistrationForm};
use giveaway_bot::utils::validation::FieldValue;

fn form(nickname: &str) -> RegistrationForm {
    RegistrationForm {
        age: Some(FieldValue::Number(21)),
        phone_brand: Some(FieldValue::Text("Xiaomi".to_string())),
        nickname: Some(FieldValue::Text(nickname.to_string())),
        game_id: Some(FieldValue::Text("5123456789".to_string())),
    }
}

#[tokio::test]
async fn test_join_giveaway_counts_pool() -> Result<()> {
    let (db, _temp_dir) = sqlite_db().await;
    let ledger = ParticipationLedger::new(db.store.clone());
    let id = db.store.create_giveaway(&giveaway("Skins", 1)).await?;

    assert_eq!(
        ledger.join_giveaway(id, &user(1)).await?,
        ParticipationOutcome::Added { participants: 1 }
    );
    assert_eq!(
        ledger.join_giveaway(id, &user(2)).await?,
        ParticipationOutcome::Added { participants: 2 }
    );

    // Joining also records the user
    let stored = db.store.get_user(2).await?.expect("user should be stored");
    assert_eq!(stored.first_name.as_deref(), Some("User 2"));
    Ok(())
}

#[tokio::test]
async fn test_second_join_is_rejected_and_pool_unchanged() -> Result<()> {
    let (db, _temp_dir) = sqlite_db().await;
    let ledger = ParticipationLedger::new(db.store.clone());
    let id = db.store.create_giveaway(&giveaway("Skins", 1)).await?;

    ledger.join_giveaway(id, &user(7)).await?;
    assert_eq!(ledger.join_giveaway(id, &user(7)).await?, ParticipationOutcome::AlreadyExists);
    assert_eq!(db.store.count_participants(EntityKind::Giveaway, id).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_missing_and_closed_giveaways() -> Result<()> {
    let (db, _temp_dir) = sqlite_db().await;
    let ledger = ParticipationLedger::new(db.store.clone());

    assert_eq!(ledger.join_giveaway(404, &user(1)).await?, ParticipationOutcome::EntityNotFound);

    let id = db.store.create_giveaway(&giveaway("Closed", 1)).await?;
    db.store
        .transition_giveaway_status(id, GiveawayStatus::Active, GiveawayStatus::Finished)
        .await?;
    assert_eq!(ledger.join_giveaway(id, &user(1)).await?, ParticipationOutcome::EntityClosed);
    assert_eq!(db.store.count_participants(EntityKind::Giveaway, id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_tournament_registration_validates_form() -> Result<()> {
    let (db, _temp_dir) = sqlite_db().await;
    let ledger = ParticipationLedger::new(db.store.clone());
    let id = db.store.create_tournament(&tournament("Cup")).await?;

    let mut bad = form("Ghost");
    bad.age = Some(FieldValue::Text("old".to_string()));
    let result = ledger.register_for_tournament(id, &user(3), &bad).await;
    assert!(matches!(result, Err(LedgerError::Validation(_))));

    let missing = ledger.participate(EntityKind::Tournament, id, &user(3), None).await;
    assert!(matches!(missing, Err(LedgerError::Validation(_))));

    assert_eq!(
        ledger.register_for_tournament(id, &user(3), &form("Ghost")).await?,
        ParticipationOutcome::Added { participants: 1 }
    );

    let registrations = db.store.registrations(id).await?;
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].nickname, "Ghost");
    assert_eq!(registrations[0].age, 21);
    assert_eq!(registrations[0].first_name.as_deref(), Some("User 3"));
    Ok(())
}

#[tokio::test]
async fn test_closed_registration_rejects_even_invalid_forms() -> Result<()> {
    let (db, _temp_dir) = sqlite_db().await;
    let ledger = ParticipationLedger::new(db.store.clone());
    let id = db.store.create_tournament(&tournament("Cup")).await?;
    db.store.set_registration_status(id, RegistrationStatus::Closed).await?;

    assert_eq!(
        ledger.register_for_tournament(id, &user(3), &form("Ghost")).await?,
        ParticipationOutcome::EntityClosed
    );
    assert_eq!(
        ledger.register_for_tournament(id, &user(3), &RegistrationForm::default()).await?,
        ParticipationOutcome::EntityClosed
    );
    assert_eq!(db.store.count_participants(EntityKind::Tournament, id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_registrations_leave_exactly_one() -> Result<()> {
    let (db, _temp_dir) = sqlite_db().await;
    let ledger = ParticipationLedger::new(db.store.clone());

    let mut tournament_id = 0;
    while tournament_id < 5 {
        tournament_id = db.store.create_tournament(&tournament("Cup")).await?;
    }
    assert_eq!(tournament_id, 5);

    let attempts: Vec<_> = (0..8)
        .map(|i| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .register_for_tournament(5, &user(42), &form(&format!("Ghost{i}")))
                    .await
            })
        })
        .collect();

    let mut added = 0;
    let mut duplicates = 0;
    for attempt in attempts {
        match attempt.await?? {
            ParticipationOutcome::Added { .. } => added += 1,
            ParticipationOutcome::AlreadyExists => duplicates += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(added, 1);
    assert_eq!(duplicates, 7);
    assert_eq!(db.store.count_participants(EntityKind::Tournament, 5).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_key_value_backend_rejects_duplicates() -> Result<()> {
    let (db, kv) = kv_db().await;
    let store: Arc<dyn Store> = db.store.clone();
    let ledger = ParticipationLedger::new(store.clone());
    let id = store.create_giveaway(&giveaway("KV", 1)).await?;

    assert_eq!(
        ledger.join_giveaway(id, &user(9)).await?,
        ParticipationOutcome::Added { participants: 1 }
    );
    assert_eq!(ledger.join_giveaway(id, &user(9)).await?, ParticipationOutcome::AlreadyExists);
    assert_eq!(kv.keys_with_prefix(&format!("giveaway_participant_{id}_")).len(), 1);
    Ok(())
}
