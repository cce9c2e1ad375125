use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::test_fixtures::{connect_test, create_verified_user};
use counsel_core::{most_common_emotion, EmotionLabel, NewEmotion};

fn observation(user_id: Uuid, room: &str, emotion: EmotionLabel, confidence: f32) -> NewEmotion {
    NewEmotion {
        user_id,
        chatroom_id: room.to_string(),
        emotion,
        confidence,
        is_final: false,
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_chatroom_results_and_most_common() {
    let db = connect_test().await.unwrap();
    let user = create_verified_user(&db).await.unwrap();
    let room = format!("room-{}", Uuid::new_v4());

    for (emotion, conf) in [
        (EmotionLabel::Sadness, 0.8),
        (EmotionLabel::Happy, 0.75),
        (EmotionLabel::Sadness, 0.9),
    ] {
        db.emotions.save(observation(user, &room, emotion, conf)).await.unwrap();
    }

    let records = db.emotions.for_chatroom(&room, Some(user)).await.unwrap();
    assert_eq!(records.len(), 3);
    let top = most_common_emotion(&records).unwrap();
    assert_eq!(top.emotion, EmotionLabel::Sadness);
    assert_eq!(top.count, 2);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_is_authorized_requires_exclusive_ownership() {
    let db = connect_test().await.unwrap();
    let owner = create_verified_user(&db).await.unwrap();
    let intruder = create_verified_user(&db).await.unwrap();
    let room = format!("room-{}", Uuid::new_v4());

    assert!(!db.emotions.is_authorized(owner, &room).await.unwrap());

    db.emotions
        .save(observation(owner, &room, EmotionLabel::Happy, 0.9))
        .await
        .unwrap();
    assert!(db.emotions.is_authorized(owner, &room).await.unwrap());
    assert!(!db.emotions.is_authorized(intruder, &room).await.unwrap());

    assert!(db.emotions.delete_for_chatroom(&room).await.unwrap());
    assert!(!db.emotions.delete_for_chatroom(&room).await.unwrap());
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_statistics_and_auto_end() {
    let db = connect_test().await.unwrap();
    let user = create_verified_user(&db).await.unwrap();
    let room = format!("room-{}", Uuid::new_v4());

    db.emotions
        .save(observation(user, &room, EmotionLabel::Angry, 0.8))
        .await
        .unwrap();
    db.emotions
        .save(observation(user, &room, EmotionLabel::Angry, 0.6))
        .await
        .unwrap();

    let stats = db
        .emotions
        .statistics(user, Some(Utc::now() - Duration::hours(1)), None)
        .await
        .unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].count, 2);
    assert!((stats[0].avg_confidence - 0.7).abs() < 1e-4);

    let ended = db
        .emotions
        .auto_end_before(Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    assert!(ended.len() >= 2);
    assert!(db.emotions.history(user).await.unwrap().iter().all(|r| r.ended));
}
