//! End-to-end tests: scenarios built against a mocked OpenAI endpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use colloquy::agent::{FileMemoryStore, MemoryStore};
use colloquy::config::ColloquyConfig;
use colloquy::error::ColloquyError;
use colloquy::groupchat::{ChatEvent, RunState};
use colloquy::scenario::{presets, BuildOptions, Scenario};

const PAIR: &str = r#"
name = "pair"
max_rounds = 6
temperature = 0.2
termination = { ends_with = "TERMINATE" }
initiator = "user"
message = "Write a haiku about Rust."

[[participants]]
name = "user"
kind = "human_proxy"
human_input_mode = "never"
default_auto_reply = "more please"

[[participants]]
name = "poet"
kind = "assistant"
system_prompt = "You write short poems."
"#;

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    }))
}

/// Answers with each reply in turn, repeating the last one.
struct Sequence {
    replies: Vec<&'static str>,
    next: AtomicUsize,
}

impl Sequence {
    fn new(replies: Vec<&'static str>) -> Self {
        Self {
            replies,
            next: AtomicUsize::new(0),
        }
    }
}

impl Respond for Sequence {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .replies
            .get(index)
            .or(self.replies.last())
            .copied()
            .unwrap_or_default();
        completion(reply)
    }
}

fn config_for(server: &MockServer) -> ColloquyConfig {
    ColloquyConfig {
        openai_api_key: Some("test-key".into()),
        openai_base_url: Some(server.uri()),
        ..ColloquyConfig::default()
    }
}

fn request_bodies(requests: &[Request]) -> Vec<serde_json::Value> {
    requests
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn toml_scenario_runs_until_terminate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(Sequence::new(vec![
            "Borrowed, not stolen",
            "Ownership moves on\nTERMINATE",
        ]))
        .expect(2)
        .mount(&server)
        .await;

    let scenario = Scenario::from_toml(PAIR).unwrap();
    let (mut chat, kickoff) = scenario
        .build(&config_for(&server), &BuildOptions::non_interactive())
        .unwrap();
    let outcome = chat.run(&kickoff.initiator, kickoff.message).await.unwrap();

    assert_eq!(outcome.status, RunState::TerminatedByPredicate);
    assert_eq!(outcome.transcript.speakers(), vec!["user", "poet", "user", "poet"]);
    assert_eq!(outcome.transcript.appended()[1].content, "more please");

    let bodies = request_bodies(&server.received_requests().await.unwrap());
    assert_eq!(bodies[0]["model"], "gpt-4");
    assert_eq!(bodies[0]["seed"], 42);
    assert_eq!(bodies[0]["temperature"], 0.2);
    assert_eq!(bodies[0]["messages"][0]["content"], "You write short poems.");
    assert_eq!(bodies[0]["messages"][1]["name"], "user");
    assert_eq!(bodies[1]["messages"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn scenario_file_is_loaded_from_disk() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("pair.toml");
    std::fs::write(&file, PAIR).unwrap();

    let scenario = Scenario::load(&file).unwrap();

    assert_eq!(scenario.name, "pair");
    assert_eq!(scenario.participants.len(), 2);
    assert_eq!(scenario.kickoff().initiator, "user");
}

#[test]
fn unknown_initiator_is_rejected() {
    let raw = PAIR.replace("initiator = \"user\"", "initiator = \"nobody\"");
    let err = Scenario::from_toml(&raw).unwrap_err();
    assert!(matches!(err, ColloquyError::Configuration(_)));
    assert!(err.to_string().contains("nobody"));
}

#[test]
fn assistants_need_credentials() {
    let scenario = Scenario::from_toml(PAIR).unwrap();
    let err = scenario
        .build(&ColloquyConfig::default(), &BuildOptions::non_interactive())
        .unwrap_err();
    assert!(matches!(err, ColloquyError::MissingCredential { .. }), "got {err:?}");
}

#[tokio::test]
async fn proxies_only_scenario_needs_no_backend() {
    let raw = r#"
name = "echo"
max_rounds = 3
initiator = "a"
message = "hello"

[[participants]]
name = "a"
kind = "human_proxy"
human_input_mode = "never"
default_auto_reply = "from a"

[[participants]]
name = "b"
kind = "human_proxy"
human_input_mode = "never"
default_auto_reply = "from b"
"#;
    let scenario = Scenario::from_toml(raw).unwrap();
    let (mut chat, kickoff) = scenario
        .build(&ColloquyConfig::default(), &BuildOptions::non_interactive())
        .unwrap();

    let outcome = chat.run(&kickoff.initiator, kickoff.message).await.unwrap();

    assert_eq!(outcome.status, RunState::TerminatedByRoundLimit);
    let contents: Vec<&str> = outcome
        .transcript
        .appended()
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["from b", "from a", "from b"]);
}

#[tokio::test]
async fn auto_selection_follows_the_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("You are in a role play game"))
        .respond_with(Sequence::new(vec!["Planner", "Critic.", "Admin"]))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion("noted"))
        .mount(&server)
        .await;

    let mut scenario = presets::research_team();
    scenario.max_rounds = 3;
    let (mut chat, kickoff) = scenario
        .build(&config_for(&server), &BuildOptions::non_interactive())
        .unwrap();
    let outcome = chat.run(&kickoff.initiator, kickoff.message).await.unwrap();

    assert_eq!(
        outcome.transcript.speakers(),
        vec!["Admin", "Planner", "Critic", "Admin"]
    );

    let bodies = request_bodies(&server.received_requests().await.unwrap());
    let selector_requests = bodies
        .iter()
        .filter(|b| b.to_string().contains("You are in a role play game"))
        .count();
    assert_eq!(selector_requests, 3);
    let first = &bodies[0];
    assert_eq!(first["temperature"], json!(null));
    assert!(first.to_string().contains("Engineer: Engineer. You follow an approved plan."));
}

#[tokio::test]
async fn unmatched_selection_falls_back_to_round_robin() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("You are in a role play game"))
        .respond_with(completion("I am not sure who should go next"))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion("noted"))
        .mount(&server)
        .await;

    let mut scenario = presets::research_team();
    scenario.max_rounds = 2;
    let (mut chat, kickoff) = scenario
        .build(&config_for(&server), &BuildOptions::non_interactive())
        .unwrap();
    let outcome = chat.run(&kickoff.initiator, kickoff.message).await.unwrap();

    assert_eq!(
        outcome.transcript.speakers(),
        vec!["Admin", "Engineer", "Scientist"]
    );
}

#[test]
fn save_all_memory_only_touches_memory_participants() {
    let mut scenario = presets::product_team();
    assert!(scenario.participants.iter().all(|p| !p.auto_save));

    scenario.save_all_memory();

    let saving: Vec<&str> = scenario
        .participants
        .iter()
        .filter(|p| p.auto_save)
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(saving, vec!["MemGPT_coder"]);
}

#[tokio::test]
async fn product_team_uses_the_supplied_memory_store() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion("Let's build a ride-sharing app."))
        .mount(&server)
        .await;

    let memory_dir = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();
    let store: Arc<dyn MemoryStore> = Arc::new(FileMemoryStore::new(memory_dir.path()));

    let mut scenario = presets::product_team();
    scenario.max_rounds = 4;
    scenario.save_all_memory();

    let events: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink_events = Arc::clone(&events);
    let options = BuildOptions::non_interactive()
        .with_memory_store(Arc::clone(&store))
        .with_base_dir(work_dir.path())
        .with_event_sink(Arc::new(move |event: ChatEvent| {
            if let ChatEvent::MessageAppended { message, .. } = event {
                sink_events.lock().unwrap().push(message.speaker);
            }
        }));

    let (mut chat, kickoff) = scenario.build(&config_for(&server), &options).unwrap();
    let outcome = chat.run(&kickoff.initiator, kickoff.message).await.unwrap();

    assert_eq!(
        outcome.transcript.speakers(),
        vec![
            "User_proxy",
            "Product_manager",
            "MemGPT_coder",
            "User_proxy",
            "Product_manager",
        ]
    );
    assert_eq!(outcome.transcript.appended()[2].content, "...");
    assert_eq!(
        *events.lock().unwrap(),
        vec!["Product_manager", "MemGPT_coder", "User_proxy", "Product_manager"]
    );

    let saved = store.load("MemGPT_coder").unwrap().unwrap();
    assert!(saved.persona.contains("first engineer at Uber"));
    assert_eq!(saved.recall.len(), 3);
    assert!(saved.human.contains("Product_manager (assistant)"));
}
