// Demo data seeding (dev only, behind FOLLOWUP_SEED_DEMO)

use anyhow::Result;
use chrono::{TimeZone, Utc};

use followup_core::{EventSource, EventStore, NewEvent};
use followup_storage::{CreateUser, Database, PgEventStore};

use crate::auth::password_digest;

const DEMO_USERS: &[(&str, &str)] = &[
    ("alice", "Alice"),
    ("bob", "Bob"),
    ("jane", "Jane"),
    ("xiao", "Xiao"),
];

/// Seed demo users and sample events; skipped when the users already exist
pub async fn seed_demo_data(db: &Database, store: &PgEventStore) -> Result<()> {
    if db.get_user_by_username("alice").await?.is_some() {
        tracing::info!("Demo data already present, skipping seed");
        return Ok(());
    }

    let mut alice_id = None;
    for (username, display_name) in DEMO_USERS {
        let user = db
            .create_user(CreateUser {
                username: username.to_string(),
                display_name: display_name.to_string(),
                // Demo credentials follow the <name><123> convention
                password_digest: password_digest(&format!("{username}123")),
            })
            .await?;
        if *username == "alice" {
            alice_id = Some(user.id);
        }
    }

    let alice = alice_id.ok_or_else(|| anyhow::anyhow!("demo user alice missing after seed"))?;
    for event in sample_events() {
        store.create(alice, event).await?;
    }

    tracing::info!("Seeded {} demo users and sample events", DEMO_USERS.len());
    Ok(())
}

fn sample_events() -> Vec<NewEvent> {
    vec![
        NewEvent {
            title: "Hamburg Philharmonic Concert".to_string(),
            start_time: Utc.with_ymd_and_hms(2026, 2, 15, 19, 30, 0).unwrap(),
            end_time: Some(Utc.with_ymd_and_hms(2026, 2, 15, 22, 0, 0).unwrap()),
            location: Some("Elbphilharmonie, Hamburg".to_string()),
            description: Some("Beethoven's Ninth Symphony".to_string()),
            source_type: EventSource::Image,
            is_followed: true,
            recurrence_rule: None,
            recurrence_end: None,
        },
        NewEvent {
            title: "Class reunion dinner".to_string(),
            start_time: Utc.with_ymd_and_hms(2026, 2, 8, 19, 0, 0).unwrap(),
            end_time: None,
            location: Some("The Old Place Sichuan Restaurant".to_string()),
            description: Some("University classmates get-together".to_string()),
            source_type: EventSource::Text,
            is_followed: true,
            recurrence_rule: None,
            recurrence_end: None,
        },
        NewEvent {
            title: "Project review meeting".to_string(),
            start_time: Utc.with_ymd_and_hms(2026, 2, 5, 14, 0, 0).unwrap(),
            end_time: Some(Utc.with_ymd_and_hms(2026, 2, 5, 16, 0, 0).unwrap()),
            location: Some("Office meeting room A".to_string()),
            description: Some("Q1 project progress review".to_string()),
            source_type: EventSource::Text,
            is_followed: false,
            recurrence_rule: None,
            recurrence_end: None,
        },
    ]
}
