mod common;

use common::{UserDir, assistant, body_key, head, user};
use crossbeam_channel::unbounded;
use cursor_chat_watch::poller::ConversationSource;
use cursor_chat_watch::workspace::{Workspace, discover_workspaces};
use cursor_chat_watch::{Assembler, CursorSource, Poller, Role, StoreLocation};
use serde_json::json;

fn only_workspace(user_dir: &UserDir) -> Workspace {
    let mut found = discover_workspaces(user_dir.path()).unwrap();
    assert_eq!(found.len(), 1);
    found.remove(0)
}

fn assembler(user_dir: &UserDir) -> Assembler {
    let global = Some(user_dir.global_db()).filter(|p| p.is_file());
    Assembler::open(&StoreLocation::for_workspace(&only_workspace(user_dir), global))
}

fn fixed_clock() -> i64 {
    7_777
}

#[test]
fn global_body_is_preferred_over_workspace_body() {
    let dir = UserDir::new();
    dir.put_index("ws1", &json!({"allComposers": [head("c1", "Fix parser", 3_000)]}));
    dir.put_global(
        "cursorDiskKV",
        &body_key("c1"),
        &json!({"conversation": [user("from global", 10), assistant("reply", 20)]}),
    );
    dir.put_workspace(
        "ws1",
        "ItemTable",
        &body_key("c1"),
        &json!({"conversation": [user("from workspace", 10)]}),
    );

    let messages = assembler(&dir).load("c1");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text, "from global");
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
}

#[test]
fn falls_back_to_workspace_store() {
    let dir = UserDir::new();
    dir.put_index("ws1", &json!({"allComposers": [head("c1", "Old chat", 3_000)]}));
    dir.put_workspace(
        "ws1",
        "ItemTable",
        &body_key("c1"),
        &json!({"messages": [user("legacy", 10)]}),
    );

    // No global store at all.
    let messages = assembler(&dir).load("c1");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "legacy");

    // A global store without this conversation changes nothing.
    dir.put_global("cursorDiskKV", &body_key("other"), &json!({"conversation": [user("x", 1)]}));
    assert_eq!(assembler(&dir).load("c1"), messages);
}

#[test]
fn assemble_fills_conversation_metadata() {
    let dir = UserDir::new();
    dir.put_index(
        "ws1",
        &json!({"allComposers": [head("c1", "Fix parser", 3_000), {"composerId": "c2"}]}),
    );
    dir.put_global(
        "cursorDiskKV",
        &body_key("c1"),
        &json!({"conversation": [user("q", 1_500), assistant("a", 2_500)]}),
    );
    dir.put_global(
        "cursorDiskKV",
        &body_key("c2"),
        &json!({"conversation": [user("q", 400), assistant("a", 900)]}),
    );

    let conversations = assembler(&dir).conversations();
    assert_eq!(conversations.len(), 2);

    let c1 = &conversations[0];
    assert_eq!(c1.name.as_deref(), Some("Fix parser"));
    assert_eq!(c1.created_at, 1_000);
    assert_eq!(c1.last_updated_at, 3_000);

    let c2 = &conversations[1];
    assert_eq!(c2.display_name(), "c2");
    assert_eq!(c2.created_at, 400);
    assert_eq!(c2.last_updated_at, 900);
}

#[test]
fn loading_is_idempotent_with_fixed_clock() {
    let dir = UserDir::new();
    dir.put_index("ws1", &json!({"allComposers": [{"composerId": "c1"}]}));
    dir.put_global(
        "cursorDiskKV",
        &body_key("c1"),
        &json!({"conversation": [{"type": 1, "text": "no time"}, {"type": 2, "text": "none here"}]}),
    );

    let assembler = assembler(&dir).with_clock(fixed_clock);
    let first = assembler.load("c1");
    let second = assembler.load("c1");
    assert_eq!(first, second);
    assert!(first.iter().all(|m| m.timestamp == 7_777));
}

#[test]
fn record_time_is_used_before_the_clock() {
    let dir = UserDir::new();
    dir.put_index("ws1", &json!({"allComposers": [head("c1", "Named", 5_000)]}));
    dir.put_global(
        "cursorDiskKV",
        &body_key("c1"),
        &json!({"lastUpdatedAt": 4_000, "conversation": [{"type": 1, "text": "q"}]}),
    );
    let messages = assembler(&dir).with_clock(fixed_clock).load("c1");
    assert_eq!(messages[0].timestamp, 4_000);
}

#[test]
fn headers_only_body_is_rebuilt_from_bubble_rows() {
    let dir = UserDir::new();
    dir.put_index("ws1", &json!({"allComposers": [head("c1", "Bubbles", 3_000)]}));
    dir.put_global(
        "cursorDiskKV",
        &body_key("c1"),
        &json!({"fullConversationHeadersOnly": [
            {"bubbleId": "b1", "type": 1},
            {"bubbleId": "gone", "type": 2},
            {"bubbleId": "b2", "type": 2},
        ]}),
    );
    dir.put_global("cursorDiskKV", "bubbleId:c1:b1", &user("question", 10));
    dir.put_global("cursorDiskKV", "bubbleId:c1:b2", &assistant("answer", 20));

    let messages = assembler(&dir).load("c1");
    let texts: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["question", "answer"]);
}

#[test]
fn checkpoint_edits_are_attached_by_end_time() {
    let dir = UserDir::new();
    dir.put_index("ws1", &json!({"allComposers": [head("c1", "Edits", 3_000)]}));
    dir.put_global(
        "cursorDiskKV",
        &body_key("c1"),
        &json!({"conversation": [
            user("please edit", 100),
            {
                "type": 2,
                "text": "Done",
                "timingInfo": {"clientEndTime": 500},
                "cachedConversationSummary": {"inlineDiffs": [{"path": "/p/a.rs"}]},
                "checkpoint": {"inlineDiffs": [{
                    "uri": {"path": "/p/src/lib.rs"},
                    "original": {"startLineNumber": 10, "endLineNumberExclusive": 12, "content": ""},
                    "modified": ["fn a() {}", "fn b() {}"],
                }]},
            },
        ]}),
    );

    let messages = assembler(&dir).load("c1");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].timestamp, 500);
    assert_eq!(
        messages[1].text,
        "Added lib.rs (L10-11)\n\nModified a.rs\n\nDone"
    );
    assert!(messages[1].is_action);
    assert!(!messages[0].is_action);
}

#[test]
fn unrecognized_shapes_yield_nothing() {
    let dir = UserDir::new();
    dir.put_index("ws1", &json!({"allComposers": [head("c1", "Weird", 3_000)]}));
    dir.put_global("cursorDiskKV", &body_key("c1"), &json!({"payload": {"items": [1, 2]}}));
    dir.put_workspace_raw("ws1", "ItemTable", &body_key("c2"), "{not json");

    let assembler = assembler(&dir);
    assert!(assembler.load("c1").is_empty());
    assert!(assembler.load("c2").is_empty());
    assert!(assembler.load("missing").is_empty());
}

#[test]
fn source_only_reports_tracked_conversations() {
    let dir = UserDir::new();
    dir.put_index(
        "ws1",
        &json!({
            "allComposers": [
                head("named", "Fix parser", 3_000),
                head("picked", "New Chat", 3_000),
                head("scratch", "New Chat", 3_000),
            ],
            "selectedComposerIds": ["picked"],
        }),
    );
    dir.put_index("ws2", &json!({"allComposers": [head("other", "Release notes", 3_000)]}));
    dir.put_global(
        "cursorDiskKV",
        &body_key("named"),
        &json!({"conversation": [user("hi", 1)]}),
    );

    let mut source = CursorSource::new(dir.path().to_path_buf());
    let snapshots = source.snapshot();
    let ids: Vec<_> = snapshots.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["named", "picked", "other"]);
    assert_eq!(snapshots[0].messages.len(), 1);
    assert_eq!(snapshots[1].name, "New Chat");
    assert!(snapshots[1].messages.is_empty());
}

#[test]
fn poller_reports_new_assistant_reply() {
    let dir = UserDir::new();
    dir.put_index("ws1", &json!({"allComposers": [head("c1", "Fix parser", 3_000)]}));
    dir.put_global(
        "cursorDiskKV",
        &body_key("c1"),
        &json!({"conversation": [user("q", 90), assistant("a", 100)]}),
    );

    let (tx, rx) = unbounded();
    let mut poller = Poller::new(CursorSource::new(dir.path().to_path_buf()), tx);
    assert_eq!(poller.poll_once(), 0);
    assert_eq!(poller.poll_once(), 0);

    // User-only growth stays quiet.
    dir.put_global(
        "cursorDiskKV",
        &body_key("c1"),
        &json!({"conversation": [user("q", 90), assistant("a", 100), user("more", 120)]}),
    );
    assert_eq!(poller.poll_once(), 0);

    dir.put_global(
        "cursorDiskKV",
        &body_key("c1"),
        &json!({"conversation": [
            user("q", 90), assistant("a", 100), user("more", 120), assistant("b", 150),
        ]}),
    );
    assert_eq!(poller.poll_once(), 1);
    assert_eq!(poller.poll_once(), 0);

    let events: Vec<_> = rx.try_iter().collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].conversation_id, "c1");
    assert_eq!(events[0].conversation_name, "Fix parser");
    assert_eq!(events[0].new_messages, 1);
}
