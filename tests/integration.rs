//! Integration tests for the notice registry.

use notice_registry::{
    DefineOutcome, Gated, NoticeBoard, NoticeOutcome, QueryOutcome, RegistryConfig,
    SubscribeOutcome, UnsubscribeOutcome,
};
use std::sync::Once;
use tempfile::TempDir;

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

fn test_config(dir: &TempDir) -> RegistryConfig {
    RegistryConfig {
        sync_interval_secs: 0,
        verbose: true,
        owners: vec!["@owner".to_string()],
        ..RegistryConfig::in_dir(dir.path())
    }
}

fn test_board(dir: &TempDir) -> NoticeBoard {
    init_tracing();
    NoticeBoard::open(test_config(dir)).unwrap()
}

fn subscribers(outcome: NoticeOutcome) -> Vec<String> {
    match outcome {
        NoticeOutcome::Notice { subscribers, .. } => subscribers,
        NoticeOutcome::Unknown { subject } => panic!("Expected Notice for {}", subject),
    }
}

// --- Realistic Workflow Tests ---

#[test]
fn test_guild_notice_workflow() {
    let dir = TempDir::new().unwrap();
    let board = test_board(&dir);

    assert_eq!(
        board.subscribe("guild1", "@bob", "sunset shimmer").unwrap(),
        SubscribeOutcome::Added
    );
    assert_eq!(
        board.query("guild1", "@bob", "Sunset Shimmer").unwrap(),
        QueryOutcome::Known { subscribed: true }
    );

    assert_eq!(
        board.define_alias("guild1", "Sunny", "Sunset Shimmer").unwrap(),
        DefineOutcome::Defined
    );
    assert_eq!(
        board.subscribe("guild1", "@amy", "sunny").unwrap(),
        SubscribeOutcome::Added
    );

    let notice = board.notice("guild1", "SUNNY").unwrap();
    match notice {
        NoticeOutcome::Notice {
            subject,
            subscribers,
        } => {
            assert_eq!(subject, "Sunset Shimmer");
            assert_eq!(subscribers, vec!["@bob".to_string(), "@amy".to_string()]);
        }
        other => panic!("Expected Notice, got {:?}", other),
    }

    // The other guild knows nothing about it
    assert_eq!(
        board.query("guild2", "@bob", "Sunset Shimmer").unwrap(),
        QueryOutcome::Unknown
    );

    assert_eq!(
        board.unsubscribe("guild1", "@bob", "sunny").unwrap(),
        UnsubscribeOutcome::Removed
    );
    assert_eq!(
        subscribers(board.notice("guild1", "Sunset Shimmer").unwrap()),
        vec!["@amy".to_string()]
    );
}

#[test]
fn test_subscribe_query_round_trip() {
    let dir = TempDir::new().unwrap();
    let board = test_board(&dir);

    let subjects = ["twilight sparkle", "RAINBOW dash", "pinkie-pie"];
    for subject in subjects {
        board.subscribe("g", "@bob", subject).unwrap();
    }
    for subject in subjects {
        assert_eq!(
            board.query("g", "@bob", subject).unwrap(),
            QueryOutcome::Known { subscribed: true }
        );
        assert_eq!(
            board.query("g", "@amy", subject).unwrap(),
            QueryOutcome::Known { subscribed: false }
        );
    }

    let listed = board.list_subjects("g", "@bob").unwrap().ready().unwrap();
    assert_eq!(
        listed,
        vec![
            "Pinkie-Pie".to_string(),
            "Rainbow Dash".to_string(),
            "Twilight Sparkle".to_string(),
        ]
    );
}

#[test]
fn test_unsubscribe_symmetry() {
    let dir = TempDir::new().unwrap();
    let board = test_board(&dir);

    board.subscribe("g", "@amy", "Rarity").unwrap();
    board.subscribe("g", "@bob", "Rarity").unwrap();
    assert_eq!(
        board.unsubscribe("g", "@bob", "Rarity").unwrap(),
        UnsubscribeOutcome::Removed
    );
    assert_eq!(
        board.query("g", "@bob", "Rarity").unwrap(),
        QueryOutcome::Known { subscribed: false }
    );
    assert_eq!(
        board.unsubscribe("g", "@bob", "Rarity").unwrap(),
        UnsubscribeOutcome::NotSubscribed
    );
}

#[test]
fn test_multi_subject_notices() {
    let dir = TempDir::new().unwrap();
    let board = test_board(&dir);

    let outcomes = board
        .subscribe_many("g", "@bob", &["rarity", "applejack", "rarity"])
        .unwrap();
    assert_eq!(
        outcomes,
        vec![
            ("Rarity".to_string(), SubscribeOutcome::Added),
            ("Applejack".to_string(), SubscribeOutcome::Added),
            ("Rarity".to_string(), SubscribeOutcome::AlreadyJoined),
        ]
    );

    let notices = board.notices("g", &["Rarity", "Spike"]).unwrap();
    assert_eq!(notices.len(), 2);
    assert!(matches!(notices[0], NoticeOutcome::Notice { .. }));
    assert_eq!(
        notices[1],
        NoticeOutcome::Unknown {
            subject: "Spike".to_string()
        }
    );
}

// --- Cooldowns ---

#[test]
fn test_cooldown_gate_with_owner_bypass() {
    let dir = TempDir::new().unwrap();
    let board = test_board(&dir);
    board.subscribe("g", "@bob", "Rarity").unwrap();
    board.subscribe("g", "@bob", "Applejack").unwrap();

    let first = board.unsubscribe_all("g", "@bob").unwrap();
    assert_eq!(
        first,
        Gated::Ready(vec!["Applejack".to_string(), "Rarity".to_string()])
    );

    board.subscribe("g", "@amy", "Rarity").unwrap();
    assert!(board.unsubscribe_all("g", "@amy").unwrap().is_on_cooldown());
    assert_eq!(
        board.query("g", "@amy", "Rarity").unwrap(),
        QueryOutcome::Known { subscribed: true }
    );

    // Owners are never turned away
    assert!(!board.unsubscribe_all("g", "@owner").unwrap().is_on_cooldown());
    assert!(!board.my_notices("g", "@owner").unwrap().is_on_cooldown());
    assert!(!board.my_notices("g", "@owner").unwrap().is_on_cooldown());
}

// --- Persistence ---

#[test]
fn test_persistence_across_reopen() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    {
        let board = NoticeBoard::open(config.clone()).unwrap();
        board.subscribe("g", "@bob", "Rarity").unwrap();
        board.define_alias("g", "Rara", "Rarity").unwrap();
        board.shutdown().unwrap();
    }

    let board = NoticeBoard::open(config).unwrap();
    assert_eq!(
        subscribers(board.notice("g", "rara").unwrap()),
        vec!["@bob".to_string()]
    );
    let aliases = board.list_aliases("g", "@owner").unwrap().ready().unwrap();
    assert_eq!(aliases.len(), 1);
    assert_eq!(aliases[0].alias, "Rara");
    assert_eq!(aliases[0].target, "Rarity");
}

#[test]
fn test_drop_without_shutdown_still_persists() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    {
        let board = NoticeBoard::open(config.clone()).unwrap();
        board.subscribe("g", "@bob", "Rarity").unwrap();
    }

    let board = NoticeBoard::open(config).unwrap();
    assert_eq!(
        board.query("g", "@bob", "Rarity").unwrap(),
        QueryOutcome::Known { subscribed: true }
    );
}

#[test]
fn test_background_sync_keeps_data() {
    let dir = TempDir::new().unwrap();
    init_tracing();
    let config = RegistryConfig {
        sync_interval_secs: 1,
        ..test_config(&dir)
    };
    let board = NoticeBoard::open(config).unwrap();

    board.subscribe("g", "@bob", "Rarity").unwrap();
    std::thread::sleep(std::time::Duration::from_millis(1500));

    assert!(board.is_ready());
    assert_eq!(
        board.query("g", "@bob", "Rarity").unwrap(),
        QueryOutcome::Known { subscribed: true }
    );
    board.shutdown().unwrap();
}

// --- Administration ---

#[test]
fn test_admin_workflow() {
    let dir = TempDir::new().unwrap();
    let board = test_board(&dir);

    board.subscribe("g", "@bob", "Sunset").unwrap();
    board.subscribe("h", "@amy", "Sunset").unwrap();
    board.define_alias("g", "Sunny", "Sunset").unwrap();

    board.rename("g", "Sunset", "Sunset Shimmer").unwrap();
    assert_eq!(
        board.query("g", "@bob", "Sunny").unwrap(),
        QueryOutcome::Known { subscribed: true }
    );

    let dump = board.dump();
    assert_eq!(dump.len(), 2);
    assert_eq!((dump[0].realm.as_str(), dump[0].subject.as_str()), ("g", "Sunset Shimmer"));
    assert_eq!((dump[1].realm.as_str(), dump[1].subject.as_str()), ("h", "Sunset"));

    assert_eq!(board.drop_realm("g").unwrap(), 1);
    assert_eq!(board.drop_realm_aliases("g").unwrap(), 1);
    assert_eq!(board.dump().len(), 1);

    board.drop_all();
    assert!(board.dump().is_empty());
}
