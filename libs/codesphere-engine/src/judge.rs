/// Judge Engine - Fail-Fast Grading Against Hidden Test Cases
///
/// **Core Responsibility:**
/// Compile a submission once, run it against each test case in order, compare
/// outputs, and stop at the first case that does not pass.
///
/// **Critical Properties:**
/// - One workspace and one compiled artifact per submission
/// - Test cases run strictly sequentially, in the given order
/// - `test_results` is always a prefix of the test cases
///
/// **Normalization Rules:**
/// - Trim leading whitespace: YES
/// - Trim trailing whitespace: YES
/// - Internal whitespace: significant
/// - Case sensitivity: YES (exact match required)
use crate::error::Result;
use crate::executor::{validate_sizes, Engine};
use crate::recipe::{recipe, INPUT_FILE_NAME};
use crate::workspace::Workspace;
use codesphere_common::types::{JudgeReport, JudgeRequest, Outcome, TestCase, TestCaseResult, TestStatus};
use tracing::{debug, error, info};

/// Normalize output string for comparison
///
/// **Preserves:**
/// - Internal whitespace
/// - Case sensitivity
/// - Empty lines within content
fn normalize_output(output: &str) -> &str {
    output.trim()
}

/// Turn the outcome of running one test case into its result
///
/// `ordinal` is the 1-based position of the test case.
pub fn evaluate_test(ordinal: usize, outcome: &Outcome, test_case: &TestCase) -> TestCaseResult {
    let expected = normalize_output(&test_case.expected_output).to_string();

    let (status, actual_output, error) = match outcome {
        Outcome::Success(stdout) => {
            let actual = normalize_output(stdout);
            let status = if actual == expected {
                TestStatus::Passed
            } else {
                TestStatus::WrongAnswer
            };
            (status, actual.to_string(), String::new())
        }
        Outcome::TimeLimitExceeded => (TestStatus::TimeLimitExceeded, String::new(), "Time Limit Exceeded".to_string()),
        Outcome::MemoryLimitExceeded => (
            TestStatus::MemoryLimitExceeded,
            String::new(),
            "Memory Limit Exceeded".to_string(),
        ),
        Outcome::RuntimeError(msg) | Outcome::InternalError(msg) => (TestStatus::RuntimeError, String::new(), msg.clone()),
        // Compilation already succeeded once; kept for exhaustiveness
        Outcome::CompileError(msg) => (TestStatus::CompilationError, String::new(), msg.clone()),
    };

    TestCaseResult {
        test_case: ordinal,
        status,
        actual_output,
        expected_output: expected,
        error,
    }
}

/// Report for a submission that never produced a runnable artifact
fn compilation_failed(outcome: Outcome) -> JudgeReport {
    let error = match outcome {
        Outcome::CompileError(msg) | Outcome::RuntimeError(msg) | Outcome::InternalError(msg) => msg,
        Outcome::TimeLimitExceeded => "Compilation timed out".to_string(),
        Outcome::MemoryLimitExceeded => "Compilation exceeded its memory limit".to_string(),
        Outcome::Success(_) => String::new(),
    };

    JudgeReport::from_results(vec![TestCaseResult {
        test_case: 0,
        status: TestStatus::CompilationError,
        actual_output: String::new(),
        expected_output: String::new(),
        error,
    }])
}

impl Engine {
    /// Judge a submission against its ordered test cases
    ///
    /// Returns `Err` for rejected requests and for harness faults; the workspace
    /// is released before returning in both cases.
    #[tracing::instrument(
        skip(self, request),
        fields(job_id = %request.id, language = %request.language, test_count = request.test_cases.len())
    )]
    pub async fn judge_submission(&self, request: &JudgeRequest) -> Result<JudgeReport> {
        validate_sizes(
            &request.source_code,
            request.test_cases.iter().map(|tc| tc.input.as_str()),
        )?;

        let _permit = self.permit().await?;
        let workspace = self.workspaces().acquire().await.map_err(|e| {
            error!(job_id = %request.id, error = %e, "Failed to acquire workspace");
            e
        })?;

        let report = self.judge_in_workspace(&workspace, request).await;
        workspace.release().await;

        match &report {
            Ok(report) => info!(
                verdict = ?report.verdict,
                cases_run = report.test_results.len(),
                failed_case_index = ?report.failed_case_index,
                "Judging completed"
            ),
            Err(e) => error!(job_id = %request.id, error = %e, "Judging failed inside the harness"),
        }

        report
    }

    async fn judge_in_workspace(&self, workspace: &Workspace, request: &JudgeRequest) -> Result<JudgeReport> {
        workspace
            .materialize(recipe(request.language).source_file, &request.source_code)
            .await?;

        // Step 1: Compile once; every case runs against this artifact
        let compiled = self.compile(workspace, request.language).await?;
        if !compiled.is_success() {
            return Ok(compilation_failed(compiled));
        }

        // Step 2: Run cases in order, stopping at the first failure
        let mut results = Vec::with_capacity(request.test_cases.len());

        for (idx, test_case) in request.test_cases.iter().enumerate() {
            let ordinal = idx + 1;
            workspace.materialize(INPUT_FILE_NAME, &test_case.input).await?;

            let outcome = self.run_step(workspace, request.language, request.limits).await?;
            let result = evaluate_test(ordinal, &outcome, test_case);

            debug!(test_case = ordinal, status = ?result.status, "Test case evaluated");

            let passed = result.status == TestStatus::Passed;
            results.push(result);

            if !passed {
                info!(
                    test_case = ordinal,
                    remaining = request.test_cases.len() - ordinal,
                    "Stopping at first failing test case"
                );
                break;
            }
        }

        Ok(JudgeReport::from_results(results))
    }
}
