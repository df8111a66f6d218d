use crate::config::{
    DEFAULT_MEMORY_LIMIT_MB, DEFAULT_TIME_LIMIT_MS, MAX_MEMORY_LIMIT_MB, MAX_TIME_LIMIT_MS,
    MIN_MEMORY_LIMIT_MB, MIN_TIME_LIMIT_MS,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Languages the judge can compile and run.
///
/// Closed set: every variant has a recipe in the engine, checked exhaustively
/// at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cpp,
    Java,
    Python,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::C, Language::Cpp, Language::Java, Language::Python];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::Python => "python",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported language: {0}")]
pub struct UnsupportedLanguage(pub String);

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "c" => Ok(Language::C),
            "cpp" | "c++" => Ok(Language::Cpp),
            "java" => Ok(Language::Java),
            "python" | "py" => Ok(Language::Python),
            _ => Err(UnsupportedLanguage(s.to_string())),
        }
    }
}

/// Per-submission resource envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub time_limit_ms: u64,
    pub memory_limit_mb: u64,
}

impl Limits {
    /// Build limits from optional caller values.
    ///
    /// Missing values fall back to the defaults; the rest are clamped into
    /// `[MIN, MAX]` so a submission can never run unbounded.
    pub fn new(time_limit_ms: Option<u64>, memory_limit_mb: Option<u64>) -> Self {
        Self {
            time_limit_ms: time_limit_ms
                .unwrap_or(DEFAULT_TIME_LIMIT_MS)
                .clamp(MIN_TIME_LIMIT_MS, MAX_TIME_LIMIT_MS),
            memory_limit_mb: memory_limit_mb
                .unwrap_or(DEFAULT_MEMORY_LIMIT_MB)
                .clamp(MIN_MEMORY_LIMIT_MB, MAX_MEMORY_LIMIT_MB),
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// A single "Run" action: one program, one input
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub id: Uuid,
    pub language: Language,
    pub source_code: String,
    pub stdin: String,
    pub limits: Limits,
}

impl ExecutionRequest {
    pub fn new(language: Language, source_code: impl Into<String>, stdin: impl Into<String>, limits: Limits) -> Self {
        Self {
            id: Uuid::new_v4(),
            language,
            source_code: source_code.into(),
            stdin: stdin.into(),
            limits,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    #[serde(rename = "output", alias = "expectedOutput")]
    pub expected_output: String,
}

/// A full submission judged against an ordered battery of test cases
#[derive(Debug, Clone)]
pub struct JudgeRequest {
    pub id: Uuid,
    pub language: Language,
    pub source_code: String,
    pub limits: Limits,
    pub test_cases: Vec<TestCase>,
}

impl JudgeRequest {
    pub fn new(language: Language, source_code: impl Into<String>, test_cases: Vec<TestCase>, limits: Limits) -> Self {
        Self {
            id: Uuid::new_v4(),
            language,
            source_code: source_code.into(),
            limits,
            test_cases,
        }
    }
}

/// Terminal classification of one compile-or-run attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    CompileError(String),
    RuntimeError(String),
    TimeLimitExceeded,
    MemoryLimitExceeded,
    InternalError(String),
}

impl Outcome {
    pub fn status(&self) -> RunStatus {
        match self {
            Outcome::Success(_) => RunStatus::Success,
            Outcome::CompileError(_) => RunStatus::CompilerError,
            Outcome::RuntimeError(_) => RunStatus::RuntimeError,
            Outcome::TimeLimitExceeded => RunStatus::TimeLimitExceeded,
            Outcome::MemoryLimitExceeded => RunStatus::MemoryLimitExceeded,
            Outcome::InternalError(_) => RunStatus::InternalError,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Success,
    #[serde(rename = "Compiler Error")]
    CompilerError,
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    #[serde(rename = "Time Limit Exceeded")]
    TimeLimitExceeded,
    #[serde(rename = "Memory Limit Exceeded")]
    MemoryLimitExceeded,
    #[serde(rename = "Internal Error")]
    InternalError,
}

/// Response body of a "Run" action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResponse {
    pub output: String,
    pub error: String,
    pub status: RunStatus,
}

impl From<&Outcome> for RunResponse {
    fn from(outcome: &Outcome) -> Self {
        let (output, error) = match outcome {
            Outcome::Success(output) => (output.clone(), String::new()),
            Outcome::CompileError(msg) | Outcome::RuntimeError(msg) | Outcome::InternalError(msg) => {
                (String::new(), msg.clone())
            }
            Outcome::TimeLimitExceeded => (String::new(), "Time Limit Exceeded".to_string()),
            Outcome::MemoryLimitExceeded => (String::new(), "Memory Limit Exceeded".to_string()),
        };
        Self {
            output,
            error,
            status: outcome.status(),
        }
    }
}

/// Per-test-case judgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    Passed,
    #[serde(rename = "Wrong Answer")]
    WrongAnswer,
    #[serde(rename = "Time Limit Exceeded")]
    TimeLimitExceeded,
    #[serde(rename = "Memory Limit Exceeded")]
    MemoryLimitExceeded,
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    #[serde(rename = "Compilation Error")]
    CompilationError,
}

/// Overall judgement of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Accepted,
    #[serde(rename = "Wrong Answer")]
    WrongAnswer,
    #[serde(rename = "Time Limit Exceeded")]
    TimeLimitExceeded,
    #[serde(rename = "Memory Limit Exceeded")]
    MemoryLimitExceeded,
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    #[serde(rename = "Compilation Error")]
    CompilationError,
}

impl From<TestStatus> for Verdict {
    fn from(status: TestStatus) -> Self {
        match status {
            TestStatus::Passed => Verdict::Accepted,
            TestStatus::WrongAnswer => Verdict::WrongAnswer,
            TestStatus::TimeLimitExceeded => Verdict::TimeLimitExceeded,
            TestStatus::MemoryLimitExceeded => Verdict::MemoryLimitExceeded,
            TestStatus::RuntimeError => Verdict::RuntimeError,
            TestStatus::CompilationError => Verdict::CompilationError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    /// 1-based position of the test case; 0 for the compile stage
    pub test_case: usize,
    pub status: TestStatus,
    pub actual_output: String,
    pub expected_output: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeReport {
    pub verdict: Verdict,
    pub test_results: Vec<TestCaseResult>,
    /// Index into `test_results` of the first failure
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub failed_case_index: Option<usize>,
}

impl JudgeReport {
    /// Build a report from results recorded in evaluation order.
    ///
    /// The caller stops recording at the first non-Passed result, so the
    /// failure, if any, is always the last entry.
    pub fn from_results(test_results: Vec<TestCaseResult>) -> Self {
        let failed_case_index = test_results.iter().position(|r| r.status != TestStatus::Passed);
        let verdict = failed_case_index
            .map(|idx| Verdict::from(test_results[idx].status))
            .unwrap_or(Verdict::Accepted);

        Self {
            verdict,
            test_results,
            failed_case_index,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accepted
    }
}
