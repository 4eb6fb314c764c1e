//! Setup session tests across every provider
//!
//! User answers come from a `ScriptedPrompter`, host commands from a table-driven mock
//! runner, and hardware from a fixed profile.

mod support;

use localbox::backend::{HardwareProfile, ModelCatalog, ModelSpec, SupervisorError};
use localbox::progress::NoOpHandler;
use localbox::prompt::{Answer, Prompter, ScriptedPrompter};
use localbox::provider::{Provider, ProviderKind};
use localbox::{LocalSetup, LocalboxConfig, SetupError};
use std::sync::Arc;
use support::{MockResponse, MockRunner};
use tempfile::TempDir;

const OLLAMA_LIST: &str = "NAME            \tID          \tSIZE  \tMODIFIED\n\
                           llama3:latest   \t365c0bd3c000\t4.7 GB\t2 days ago\n";

fn roomy() -> HardwareProfile {
    HardwareProfile::new(16.0, 100.0)
}

fn setup(
    models_dir: &TempDir,
    profile: HardwareProfile,
    answers: Vec<Answer>,
    runner: MockRunner,
) -> LocalSetup {
    let config = LocalboxConfig::default()
        .with_models_dir(models_dir.path().to_path_buf())
        .with_ready_timeout_secs(10)
        .with_ready_marker(support::MARKER);

    LocalSetup::new(config)
        .with_profile(profile)
        .with_prompter(Arc::new(ScriptedPrompter::new(answers)))
        .with_runner(Arc::new(runner))
        .with_progress(Arc::new(NoOpHandler))
}

fn choose(text: &str) -> Answer {
    Answer::Choose(text.to_string())
}

fn text(value: &str) -> Answer {
    Answer::Text(value.to_string())
}

#[tokio::test]
async fn test_lm_studio_static_endpoint() {
    let temp = TempDir::new().unwrap();
    let outcome = setup(&temp, roomy(), vec![], MockRunner::new())
        .run(Provider::LmStudio)
        .await
        .unwrap();

    let config = outcome.config;
    assert_eq!(outcome.provider, ProviderKind::LmStudio);
    assert_eq!(config.api_base.as_deref(), Some("http://localhost:1234/v1"));
    assert_eq!(config.api_key.as_deref(), Some("x"));
    assert!(!config.supports_functions);
    assert!(outcome.process.is_none());
}

#[tokio::test]
async fn test_token_limits_boundary() {
    let temp = TempDir::new().unwrap();

    let large = setup(&temp, HardwareProfile::new(10.0, 50.0), vec![], MockRunner::new())
        .run(Provider::LmStudio)
        .await
        .unwrap()
        .config;
    assert_eq!((large.max_tokens, large.context_window), (1200, 8000));

    let small = setup(&temp, HardwareProfile::new(9.99, 50.0), vec![], MockRunner::new())
        .run(Provider::LmStudio)
        .await
        .unwrap()
        .config;
    assert_eq!((small.max_tokens, small.context_window), (1000, 3000));
}

#[tokio::test]
async fn test_jan_prefixes_model_id() {
    let temp = TempDir::new().unwrap();
    let config = setup(&temp, roomy(), vec![text(" mistral-ins-7b-q4 ")], MockRunner::new())
        .run(Provider::Jan { model: None })
        .await
        .unwrap()
        .config;

    assert_eq!(config.model_id, "jan/mistral-ins-7b-q4");
    assert_eq!(config.api_base.as_deref(), Some("http://localhost:1337/v1"));
}

#[tokio::test]
async fn test_jan_preselected_model_skips_prompt() {
    let temp = TempDir::new().unwrap();
    let config = setup(&temp, roomy(), vec![], MockRunner::new())
        .run(Provider::Jan {
            model: Some("tinyllama-1.1b".to_string()),
        })
        .await
        .unwrap()
        .config;

    assert_eq!(config.model_id, "jan/tinyllama-1.1b");
}

#[tokio::test]
async fn test_jan_empty_model_rejected() {
    let temp = TempDir::new().unwrap();
    let result = setup(&temp, roomy(), vec![text("   ")], MockRunner::new())
        .run(Provider::Jan { model: None })
        .await;

    assert!(matches!(result, Err(SetupError::InvalidInput(_))));
}

#[tokio::test]
async fn test_no_answer_is_clean_abort() {
    let temp = TempDir::new().unwrap();
    let result = setup(&temp, roomy(), vec![Answer::Abort], MockRunner::new())
        .run(Provider::Jan { model: None })
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, SetupError::UserAborted));
    assert_eq!(err.exit_code(), 0);
}

#[tokio::test]
async fn test_ollama_installed_model() {
    let temp = TempDir::new().unwrap();
    let runner = MockRunner::new().on("ollama list", MockResponse::Stdout(OLLAMA_LIST.into()));
    let setup = setup(&temp, roomy(), vec![choose("llama3")], runner);

    let config = setup.run(Provider::Ollama { model: None }).await.unwrap().config;

    assert_eq!(config.model_id, "ollama/llama3");
    assert!(config.api_base.is_none());
}

#[tokio::test]
async fn test_ollama_pulls_default_model() {
    let temp = TempDir::new().unwrap();
    let runner = Arc::new(
        MockRunner::new()
            .on("ollama list", MockResponse::Stdout(OLLAMA_LIST.into()))
            .on("ollama pull phi3", MockResponse::Stdout(String::new())),
    );
    let config = LocalboxConfig::default().with_models_dir(temp.path().to_path_buf());
    let setup = LocalSetup::new(config)
        .with_profile(roomy())
        .with_prompter(Arc::new(ScriptedPrompter::new(vec![choose("Download phi3")])))
        .with_runner(runner.clone())
        .with_progress(Arc::new(NoOpHandler));

    let outcome = setup.run(Provider::Ollama { model: None }).await.unwrap();

    assert_eq!(outcome.config.model_id, "ollama/phi3");
    assert_eq!(runner.calls(), vec!["ollama list", "ollama pull phi3"]);
}

#[tokio::test]
async fn test_ollama_preselected_missing_model_is_pulled() {
    let temp = TempDir::new().unwrap();
    let runner = Arc::new(
        MockRunner::new()
            .on("ollama list", MockResponse::Stdout(OLLAMA_LIST.into()))
            .on("ollama pull wizardlm2", MockResponse::Stdout(String::new())),
    );
    let config = LocalboxConfig::default().with_models_dir(temp.path().to_path_buf());
    let setup = LocalSetup::new(config)
        .with_profile(roomy())
        .with_prompter(Arc::new(ScriptedPrompter::default()))
        .with_runner(runner.clone())
        .with_progress(Arc::new(NoOpHandler));

    let outcome = setup
        .run(Provider::Ollama {
            model: Some("wizardlm2".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(outcome.config.model_id, "ollama/wizardlm2");
    assert!(runner.calls().contains(&"ollama pull wizardlm2".to_string()));
}

#[tokio::test]
async fn test_ollama_not_installed() {
    let temp = TempDir::new().unwrap();
    let result = setup(&temp, roomy(), vec![], MockRunner::new())
        .run(Provider::Ollama { model: None })
        .await;

    let err = result.unwrap_err();
    match &err {
        SetupError::ExternalToolMissing { tool, install_url } => {
            assert_eq!(tool, "ollama");
            assert!(install_url.contains("ollama.com"));
        }
        other => panic!("Expected ExternalToolMissing, got {:?}", other),
    }
    assert_eq!(err.exit_code(), 1);
    assert!(err.help_message().is_some());
}

#[tokio::test]
async fn test_ollama_failed_pull_is_command_error() {
    let temp = TempDir::new().unwrap();
    let runner = MockRunner::new()
        .on("ollama list", MockResponse::Stdout(OLLAMA_LIST.into()))
        .on("ollama pull phi3", MockResponse::Exit(1));

    let result = setup(&temp, roomy(), vec![choose("Download phi3")], runner)
        .run(Provider::Ollama { model: None })
        .await;

    assert!(matches!(result, Err(SetupError::Command(_))));
}

#[tokio::test]
async fn test_llamafile_no_viable_model() {
    let temp = TempDir::new().unwrap();
    let runner = MockRunner::new().on("xcode-select -p", MockResponse::Stdout(String::new()));

    let result = setup(&temp, HardwareProfile::new(16.0, 0.5), vec![], runner)
        .run(Provider::Llamafile { model: None })
        .await;

    assert!(matches!(result, Err(SetupError::NoViableModel { .. })));
}

#[tokio::test]
async fn test_llamafile_unknown_model_rejected() {
    let temp = TempDir::new().unwrap();
    let runner = MockRunner::new().on("xcode-select -p", MockResponse::Stdout(String::new()));

    let result = setup(&temp, roomy(), vec![], runner)
        .run(Provider::Llamafile {
            model: Some("gpt-5.llamafile".to_string()),
        })
        .await;

    assert!(matches!(result, Err(SetupError::InvalidInput(_))));
}

#[tokio::test]
async fn test_llamafile_named_model_too_large() {
    let temp = TempDir::new().unwrap();
    let runner = MockRunner::new().on("xcode-select -p", MockResponse::Stdout(String::new()));

    let result = setup(&temp, HardwareProfile::new(64.0, 10.0), vec![], runner)
        .run(Provider::Llamafile {
            model: Some(ModelSpec::MIXTRAL_8X7B_INSTRUCT.name.to_string()),
        })
        .await;

    assert!(matches!(result, Err(SetupError::NoViableModel { .. })));
}

#[tokio::test]
async fn test_llamafile_menu_abort() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("a.llamafile"), b"x").unwrap();
    let runner = MockRunner::new().on("xcode-select -p", MockResponse::Stdout(String::new()));

    let result = setup(&temp, roomy(), vec![Answer::Abort], runner)
        .run(Provider::Llamafile { model: None })
        .await;

    assert!(matches!(result, Err(SetupError::UserAborted)));
}

/// Host prompter that answers one past the last choice
struct PastTheEnd;

impl Prompter for PastTheEnd {
    fn select(&self, _message: &str, choices: &[String]) -> Option<usize> {
        Some(choices.len())
    }

    fn input(&self, _message: &str) -> Option<String> {
        None
    }
}

#[tokio::test]
async fn test_ollama_out_of_range_choice_rejected() {
    let temp = TempDir::new().unwrap();
    let runner = MockRunner::new().on("ollama list", MockResponse::Stdout(OLLAMA_LIST.into()));
    let setup = setup(&temp, roomy(), vec![], runner).with_prompter(Arc::new(PastTheEnd));

    let result = setup.run(Provider::Ollama { model: None }).await;

    assert!(matches!(result, Err(SetupError::InvalidInput(_))));
}

#[tokio::test]
async fn test_llamafile_out_of_range_download_choice_rejected() {
    let temp = TempDir::new().unwrap();
    let runner = MockRunner::new().on("xcode-select -p", MockResponse::Stdout(String::new()));
    let setup = setup(&temp, roomy(), vec![], runner).with_prompter(Arc::new(PastTheEnd));

    let result = setup.run(Provider::Llamafile { model: None }).await;

    assert!(matches!(result, Err(SetupError::InvalidInput(_))));
    assert!(std::fs::read_dir(temp.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_llamafile_out_of_range_installed_choice_does_not_download() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("a.llamafile"), b"x").unwrap();
    let runner = MockRunner::new().on("xcode-select -p", MockResponse::Stdout(String::new()));
    let setup = setup(&temp, roomy(), vec![], runner).with_prompter(Arc::new(PastTheEnd));

    let result = setup.run(Provider::Llamafile { model: None }).await;

    assert!(matches!(result, Err(SetupError::InvalidInput(_))));
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[cfg(unix)]
mod launch {
    use super::*;
    use support::{pid_alive, write_script};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn xcode_ok() -> MockRunner {
        MockRunner::new().on("xcode-select -p", MockResponse::Stdout(String::new()))
    }

    #[tokio::test]
    async fn test_installed_llamafile_is_launched() {
        let temp = TempDir::new().unwrap();
        let body = format!("echo '{}'; echo \"args: $*\"; sleep 30", support::MARKER);
        write_script(temp.path(), "fake.llamafile", &body);

        let outcome = setup(&temp, roomy(), vec![choose("fake.llamafile")], xcode_ok())
            .run(Provider::Llamafile { model: None })
            .await
            .unwrap();

        let config = &outcome.config;
        assert_eq!(config.model_id, "openai/local");
        assert_eq!(config.api_base.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(config.temperature, Some(0.0));
        assert!(!config.supports_functions);
        assert_eq!((config.max_tokens, config.context_window), (1200, 8000));

        let mut process = outcome.process.expect("backend should be running");
        assert!(process.is_running());
        let args = process.next_output_line().await.unwrap();
        assert_eq!(args, "args: --nobrowser -ngl 9999");

        let pid = process.pid();
        process.terminate().await;
        assert!(!pid_alive(pid));
    }

    #[tokio::test]
    async fn test_preselected_installed_file() {
        let temp = TempDir::new().unwrap();
        write_script(
            temp.path(),
            "fake.llamafile",
            &format!("echo '{}'; sleep 30", support::MARKER),
        );

        let outcome = setup(&temp, roomy(), vec![], xcode_ok())
            .run(Provider::Llamafile {
                model: Some("fake.llamafile".to_string()),
            })
            .await
            .unwrap();

        let process = outcome.process.unwrap();
        process.terminate().await;
    }

    #[tokio::test]
    async fn test_crashing_llamafile_fails_session() {
        let temp = TempDir::new().unwrap();
        write_script(temp.path(), "broken.llamafile", "echo 'bad magic'; exit 2");

        let result = setup(&temp, roomy(), vec![choose("broken.llamafile")], xcode_ok())
            .run(Provider::Llamafile { model: None })
            .await;

        match result {
            Err(SetupError::Supervisor(err @ SupervisorError::ExitedBeforeReady { .. })) => {
                assert!(!pid_alive(err.pid().unwrap()));
            }
            other => panic!("Expected ExitedBeforeReady, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_download_then_launch() {
        let script = format!("#!/bin/sh\necho '{}'\nsleep 30\n", support::MARKER);
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fake.llamafile"))
            .respond_with(ResponseTemplate::new(200).set_body_string(script))
            .mount(&server)
            .await;

        let url = format!("{}/fake.llamafile?download=true", server.uri());
        let entries: &'static [ModelSpec] = Box::leak(Box::new([ModelSpec {
            name: "Fake",
            file_name: "fake.llamafile",
            size_gb: 0.01,
            source_url: Box::leak(url.into_boxed_str()),
        }]));

        let temp = TempDir::new().unwrap();
        let outcome = setup(&temp, roomy(), vec![choose("Fake")], xcode_ok())
            .with_catalog(ModelCatalog::with_entries(entries))
            .run(Provider::Llamafile { model: None })
            .await
            .unwrap();

        assert!(temp.path().join("fake.llamafile").is_file());
        assert_eq!(outcome.config.model_id, "openai/local");

        let process = outcome.process.expect("downloaded model should be launched");
        process.terminate().await;
    }

    #[tokio::test]
    async fn test_installed_menu_offers_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!("#!/bin/sh\necho '{}'\nsleep 30\n", support::MARKER)),
            )
            .mount(&server)
            .await;

        let url = format!("{}/second.llamafile", server.uri());
        let entries: &'static [ModelSpec] = Box::leak(Box::new([ModelSpec {
            name: "Second",
            file_name: "second.llamafile",
            size_gb: 0.01,
            source_url: Box::leak(url.into_boxed_str()),
        }]));

        let temp = TempDir::new().unwrap();
        write_script(temp.path(), "first.llamafile", "exit 1");

        let outcome = setup(
            &temp,
            roomy(),
            vec![choose("Download new model"), choose("Second")],
            xcode_ok(),
        )
        .with_catalog(ModelCatalog::with_entries(entries))
        .run(Provider::Llamafile { model: None })
        .await
        .unwrap();

        assert!(temp.path().join("second.llamafile").is_file());
        outcome.process.unwrap().terminate().await;
    }
}
