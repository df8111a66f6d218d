// CLI commands driving the engine against the local Docker daemon
use anyhow::{Context, Result};
use codesphere_common::types::{ExecutionRequest, JudgeRequest, Language, Limits, RunResponse, TestCase};
use codesphere_engine::recipe::recipe;
use codesphere_engine::{DockerSandbox, Engine, EngineConfig};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LanguageRow<'a> {
    language: Language,
    image: &'a str,
    source_file: &'static str,
    compile_command: Option<&'static str>,
    run_command: &'static str,
}

fn load_config() -> Result<EngineConfig> {
    EngineConfig::load_default().context("Failed to load engine configuration")
}

async fn docker_engine() -> Result<Engine> {
    let config = load_config()?;
    let sandbox = DockerSandbox::connect(config.clone()).context("Failed to connect to Docker")?;
    Ok(Engine::new(Arc::new(sandbox), &config))
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Parse a JSON array of test cases
pub fn load_cases(path: &Path) -> Result<Vec<TestCase>> {
    let contents = read_file(path)?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid test case file {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run(
    language: Language,
    file: &Path,
    input: Option<&Path>,
    time_limit: Option<u64>,
    memory_limit: Option<u64>,
) -> Result<()> {
    let source = read_file(file)?;
    let stdin = match input {
        Some(path) => read_file(path)?,
        None => String::new(),
    };

    let engine = docker_engine().await?;
    let request = ExecutionRequest::new(language, source, stdin, Limits::new(time_limit, memory_limit));
    let outcome = engine.run_code(&request).await?;

    print_json(&RunResponse::from(&outcome))
}

pub async fn judge(
    language: Language,
    file: &Path,
    cases: &Path,
    time_limit: Option<u64>,
    memory_limit: Option<u64>,
) -> Result<()> {
    let source = read_file(file)?;
    let test_cases = load_cases(cases)?;

    let engine = docker_engine().await?;
    let request = JudgeRequest::new(language, source, test_cases, Limits::new(time_limit, memory_limit));
    let report = engine.judge_submission(&request).await.context("Judging failed")?;

    print_json(&report)
}

pub fn list_languages() -> Result<()> {
    let config = load_config()?;
    let rows: Vec<LanguageRow> = Language::ALL
        .iter()
        .map(|&language| {
            let r = recipe(language);
            LanguageRow {
                language,
                image: config.image_for(language),
                source_file: r.source_file,
                compile_command: r.compile_command,
                run_command: r.run_command,
            }
        })
        .collect();

    print_json(&rows)
}

pub async fn check() -> Result<()> {
    let config = load_config()?;
    let sandbox = DockerSandbox::connect(config.clone()).context("Failed to connect to Docker")?;

    println!("🔍 Checking Docker daemon and sandbox images...");
    sandbox.prepare().await.context("Sandbox is not ready")?;

    for image in config.all_images() {
        println!("  ✓ {}", image);
    }
    println!("✅ Sandbox ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("codesphere-cli-{}-{}", std::process::id(), name));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_cases() {
        let path = write_temp(
            "cases.json",
            r#"[{"input": "1 2", "output": "3"}, {"input": "", "expectedOutput": "0"}]"#,
        );

        let cases = load_cases(&path).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].input, "1 2");
        assert_eq!(cases[0].expected_output, "3");
        assert_eq!(cases[1].expected_output, "0");

        fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_cases_rejects_bad_json() {
        let path = write_temp("bad.json", "{not json");
        let err = load_cases(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid test case file"));
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = read_file(Path::new("/definitely/not/here.cpp")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.cpp"));
    }
}
