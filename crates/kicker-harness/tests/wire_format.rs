//! Wire shapes of everything published to presence topics or written to
//! the backend. Other clients and the database read these as-is.

use kicker_core::Timestamp;
use kicker_harness::SimEnv;
use kicker_ledger::{ConversationScope, ReadCursor, badge_title};
use kicker_presence::{LocalParticipant, PresenceStatus, TypingPayload};

fn wall(offset_ms: u64) -> Timestamp {
    SimEnv::WALL_ORIGIN.saturating_add(std::time::Duration::from_millis(offset_ms))
}

#[test]
fn presence_record_shape() {
    let me = LocalParticipant::new("alice", "Alice").with_avatar("avatars/alice.png");
    let record = me.record(PresenceStatus::Idle, wall(0), wall(5_000));

    insta::assert_json_snapshot!(record, @r#"
    {
      "participant_id": "alice",
      "display_name": "Alice",
      "avatar_ref": "avatars/alice.png",
      "status": "idle",
      "last_activity_at": 1704067200000,
      "updated_at": 1704067205000
    }
    "#);
}

#[test]
fn typing_payload_shape() {
    let payload =
        TypingPayload { participant_id: "bob".into(), name: "Bob".into(), typing_at: wall(250) };

    insta::assert_json_snapshot!(payload, @r#"
    {
      "participant_id": "bob",
      "name": "Bob",
      "typing_at": 1704067200250
    }
    "#);
}

#[test]
fn read_cursor_shape() {
    let cursor = ReadCursor {
        participant_id: "me".into(),
        scope: ConversationScope::MatchComments(42),
        last_read_at: wall(1_000),
    };

    insta::assert_json_snapshot!(cursor, @r#"
    {
      "participant_id": "me",
      "scope": {
        "kind": "match_comments",
        "id": 42
      },
      "last_read_at": 1704067201000
    }
    "#);
}

#[test]
fn badge_titles() {
    let titles: Vec<String> = [0, 1, 12].into_iter().map(|n| badge_title("Kicker", n)).collect();

    insta::assert_json_snapshot!(titles, @r#"
    [
      "Kicker",
      "(1) Kicker",
      "(12) Kicker"
    ]
    "#);
}
