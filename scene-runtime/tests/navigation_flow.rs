//! 导航回合的端到端场景测试

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use scene_runtime::{
    Choice, CompletionTracker, EndCode, EngineContext, MemoryPersistence, MemoryStore, NavState,
    NavigationController, NavigatorConfig, Notice, Persistence, PlayerCommand, PresenterEvent,
    RecordingPresenter, SceneDefinition, SelectOutcome, StoryCode,
};

struct Harness {
    store: Arc<MemoryStore>,
    persistence: Arc<MemoryPersistence>,
    completion: Arc<CompletionTracker>,
    presenter: Arc<RecordingPresenter>,
}

impl Harness {
    fn new(store: MemoryStore) -> Self {
        let persistence = Arc::new(MemoryPersistence::new());
        Self {
            store: Arc::new(store),
            completion: Arc::new(CompletionTracker::load(persistence.clone())),
            persistence,
            presenter: Arc::new(RecordingPresenter::new()),
        }
    }

    fn controller(&self, base_delay: Duration) -> NavigationController {
        let context = EngineContext {
            store: self.store.clone(),
            persistence: self.persistence.clone(),
            completion: self.completion.clone(),
            presenter: self.presenter.clone(),
        };
        NavigationController::new(context, NavigatorConfig { base_delay })
    }

    fn fast(&self) -> NavigationController {
        self.controller(Duration::from_millis(1))
    }
}

fn end(id: &str, code: u32) -> SceneDefinition {
    SceneDefinition::end(id, format!("{id}.txt"), EndCode::new(code).unwrap())
}

/// start ─┬─ "Left"  → mid ─┬─ "Stay" → good (1)
///        ├─ "Right" → bad (2)   └─ "Seven" → seven (7)
///        └─ "Gone"  → missing
fn story_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert(
        SceneDefinition::choice(
            "start",
            "start.txt",
            vec![
                Choice::new("Left", "mid"),
                Choice::new("Right", "bad"),
                Choice::new("Gone", "missing"),
            ],
        ),
        "Where to?",
    );
    store.insert(
        SceneDefinition::choice(
            "mid",
            "mid.txt",
            vec![Choice::new("Stay", "good"), Choice::new("Seven", "seven")],
        ),
        "Halfway.",
    );
    store.insert(end("good", 1), "Good end.");
    store.insert(end("bad", 2), "Bad end.");
    store.insert(end("seven", 7), "Seventh end.");
    store
}

#[test]
fn test_three_choice_batch_has_three_entries() {
    let harness = Harness::new(story_store());
    let mut nav = harness.fast();

    nav.start("start", 'A').unwrap();
    assert_eq!(nav.choices().len(), 3);
    assert_eq!(nav.wait_display(), NavState::AwaitingChoice);
    let deadline = Instant::now() + Duration::from_secs(2);
    while !nav.is_prefetch_ready() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(nav.is_prefetch_ready());

    // 预加载完成后修改资源：选择结果必须来自本回合已加载的批次
    harness.store.insert(end("bad", 2), "Rewritten.");
    harness
        .store
        .insert(end("missing", 3), "Appeared too late.");

    nav.on_move_cursor(2).unwrap();
    assert_eq!(
        nav.on_select().unwrap(),
        SelectOutcome::BrokenLink {
            index: 2,
            target: "missing".to_string()
        }
    );

    nav.on_move_cursor(-1).unwrap();
    assert_eq!(
        nav.on_select().unwrap(),
        SelectOutcome::Advanced {
            scene: "bad".to_string()
        }
    );
    assert_eq!(nav.current_scene().unwrap().display_text(), "Bad end.");
}

#[test]
fn test_skip_mid_reveal_shows_full_text() {
    let store = MemoryStore::new();
    let body = "abcdefghijklmnopqrstuvwxyz abcdefghijklmnopqrstuvwxyz";
    store.insert(end("slow", 1), body);
    let harness = Harness::new(store);
    let mut nav = harness.controller(Duration::from_millis(40));

    let appended = || {
        harness
            .presenter
            .events()
            .iter()
            .filter(|e| matches!(e, PresenterEvent::Append(_)))
            .count()
    };

    nav.start("slow", 'A').unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while appended() < 3 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(appended() >= 3);

    assert!(nav.on_skip());
    assert_eq!(nav.wait_display(), NavState::Ended);

    let events = harness.presenter.events();
    let texts: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, PresenterEvent::Text(_)))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(texts.len(), 1);
    assert_eq!(events[texts[0]], PresenterEvent::Text(body.to_string()));
    assert!(
        events[texts[0]..]
            .iter()
            .all(|e| !matches!(e, PresenterEvent::Append(_)))
    );
    assert!(appended() < body.chars().count());
    assert_eq!(harness.presenter.current_text(), body);
}

#[test]
fn test_full_playthrough_event_log() {
    let harness = Harness::new(story_store());
    let mut nav = harness.fast();

    nav.start("start", 'A').unwrap();
    nav.wait_display();
    nav.on_select().unwrap();
    nav.wait_display();
    nav.on_move_cursor(1).unwrap();
    nav.on_select().unwrap();
    assert_eq!(nav.wait_display(), NavState::Ended);

    insta::assert_snapshot!(event_log(&harness.presenter.events()), @r"
    clear
    text: Where to?
    choices: Left | Right | Gone (cursor 0)
    clear
    text: Halfway.
    choices: Stay | Seven (cursor 0)
    choices: Stay | Seven (cursor 1)
    clear
    text: Seventh end.
    ending: A 7
    ");
}

/// 把事件序列折叠成逐行日志，连续的逐字追加合并为一行
fn event_log(events: &[PresenterEvent]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut pending = String::new();
    for event in events {
        if let PresenterEvent::Append(chunk) = event {
            pending.push_str(chunk);
            continue;
        }
        if !pending.is_empty() {
            lines.push(format!("text: {}", std::mem::take(&mut pending)));
        }
        lines.push(match event {
            PresenterEvent::Clear => "clear".to_string(),
            PresenterEvent::Text(text) => format!("text: {text}"),
            PresenterEvent::Choices { choices, cursor } => {
                let labels: Vec<&str> = choices.iter().map(|c| c.text.as_str()).collect();
                format!("choices: {} (cursor {cursor})", labels.join(" | "))
            }
            PresenterEvent::Error(notice) => format!("error: {notice}"),
            PresenterEvent::Ending { story, end } => format!("ending: {story} {end}"),
            PresenterEvent::Append(_) => unreachable!(),
        });
    }
    if !pending.is_empty() {
        lines.push(format!("text: {pending}"));
    }
    lines.join("\n")
}

#[test]
fn test_skip_renders_full_text_at_once() {
    let store = MemoryStore::new();
    let body = "A long sentence. Another one! And a question?\nThen a new line.";
    store.insert(
        SceneDefinition::choice("start", "start.txt", vec![Choice::new("Go", "end")]),
        body,
    );
    store.insert(end("end", 1), "Fin.");
    let harness = Harness::new(store);
    let mut nav = harness.controller(Duration::from_millis(200));

    let started = Instant::now();
    nav.start("start", 'A').unwrap();
    assert!(nav.on_skip());
    assert_eq!(nav.wait_display(), NavState::AwaitingChoice);

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(harness.presenter.current_text(), body);
    assert!(
        harness
            .presenter
            .events()
            .contains(&PresenterEvent::Text(body.to_string()))
    );
}

#[test]
fn test_broken_link_keeps_state() {
    let harness = Harness::new(story_store());
    let mut nav = harness.fast();

    nav.start("start", 'A').unwrap();
    nav.wait_display();
    nav.on_move_cursor(2).unwrap();
    let choices_before = nav.choices().to_vec();

    let outcome = nav.on_select().unwrap();

    assert_eq!(
        outcome,
        SelectOutcome::BrokenLink {
            index: 2,
            target: "missing".to_string()
        }
    );
    assert_eq!(nav.state(), NavState::AwaitingChoice);
    assert_eq!(nav.cursor(), Some(2));
    assert_eq!(nav.choices(), choices_before.as_slice());
    assert_eq!(nav.current_scene().unwrap().id(), "start");
    assert_eq!(
        harness.presenter.last_error(),
        Some(Notice::BrokenLink {
            target: "missing".to_string()
        })
    );

    // 仍可选择其他选项
    nav.on_move_cursor(-1).unwrap();
    assert!(matches!(
        nav.on_select().unwrap(),
        SelectOutcome::Advanced { .. }
    ));
}

#[test]
fn test_ending_seven_in_story_b() {
    let harness = Harness::new(story_store());
    let mut nav = harness.fast();

    nav.start("start", 'B').unwrap();
    nav.wait_display();
    nav.on_select().unwrap();
    nav.wait_display();
    nav.on_move_cursor(1).unwrap();
    nav.on_select().unwrap();

    assert_eq!(nav.wait_display(), NavState::Ended);
    assert_eq!(nav.end_code(), EndCode::new(7).ok());
    assert!(harness.completion.is_reached('B', 7).unwrap());
    assert!(!harness.completion.is_reached('A', 7).unwrap());

    let b = StoryCode::new('B').unwrap();
    assert_eq!(harness.persistence.ending_bitmask(b) & 0x40, 0x40);
    assert!(
        harness
            .presenter
            .events()
            .contains(&PresenterEvent::Ending {
                story: b,
                end: EndCode::new(7).unwrap()
            })
    );
}

#[test]
fn test_load_resumes_saved_scene() {
    let harness = Harness::new(story_store());
    let mut nav = harness.fast();

    nav.start("start", 'A').unwrap();
    nav.wait_display();
    nav.on_select().unwrap();
    nav.on_save().unwrap();
    assert_eq!(harness.persistence.save_pointer().as_deref(), Some("mid"));
    nav.on_menu();

    nav.on_load('A').unwrap();
    let resumed = nav.current_scene().cloned().unwrap();
    assert_eq!(nav.wait_display(), NavState::AwaitingChoice);

    let mut direct = harness.fast();
    direct.start("mid", 'A').unwrap();
    assert_eq!(direct.current_scene(), Some(&resumed));
    assert_eq!(direct.choices(), nav.choices());
}

#[test]
fn test_rapid_commands_leave_single_workers() {
    let store = story_store();
    store.set_latency("bad", Duration::from_millis(30));
    let harness = Harness::new(store);
    let mut nav = harness.fast();

    for _ in 0..5 {
        nav.start("start", 'A').unwrap();
        for command in [
            PlayerCommand::Skip,
            PlayerCommand::Select,
            PlayerCommand::Skip,
            PlayerCommand::MoveDown,
        ] {
            nav.handle(command).unwrap();
            let live = nav.live_workers();
            assert!(live.display <= 1 && live.prefetch <= 1);
        }

        nav.wait_display();
        nav.handle(PlayerCommand::Select).unwrap();
        let live = nav.live_workers();
        assert!(live.display <= 1 && live.prefetch <= 1);

        nav.handle(PlayerCommand::Skip).unwrap();
        nav.handle(PlayerCommand::Menu).unwrap();
        let live = nav.live_workers();
        assert_eq!((live.display, live.prefetch), (0, 0));
    }
}

#[test]
fn test_bitmask_round_trip_after_restart() {
    let persistence = Arc::new(MemoryPersistence::new());
    let tracker = CompletionTracker::load(persistence.clone());
    for end in [1, 7, 64] {
        tracker.set_reached('Q', end).unwrap();
    }
    let q = StoryCode::new('Q').unwrap();
    let mask = persistence.ending_bitmask(q);
    assert_eq!(mask, 1 | (1 << 6) | (1 << 63));
    drop(tracker);

    let restarted = CompletionTracker::load(persistence.clone());
    assert!(restarted.is_reached('Q', 64).unwrap());
    assert!(!restarted.is_reached('Q', 2).unwrap());
    assert_eq!(persistence.ending_bitmask(q), mask);
    assert!(restarted.is_story_started('Q').unwrap());
}
