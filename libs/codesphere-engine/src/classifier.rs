/// Outcome Classifier
///
/// Pure mapping from what the sandbox observed to one taxonomy member.
/// Precedence: timeout, then OOM kill, then non-zero exit, then success.
///
/// Only structured signals are consulted. Output text is never inspected: a
/// program printing "timeout" or "Killed" must not change its verdict.
use crate::sandbox::{RawExecutionResult, Stage};
use codesphere_common::types::Outcome;

pub fn classify(stage: Stage, raw: &RawExecutionResult) -> Outcome {
    if raw.timed_out {
        return Outcome::TimeLimitExceeded;
    }

    if raw.oom_killed {
        return Outcome::MemoryLimitExceeded;
    }

    // No exit code without a timeout means the process vanished abnormally
    if raw.exit_code != Some(0) {
        return match stage {
            Stage::Compile => Outcome::CompileError(raw.output.clone()),
            Stage::Run => Outcome::RuntimeError(raw.output.clone()),
        };
    }

    Outcome::Success(raw.output.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_exit_is_success() {
        let raw = RawExecutionResult::exited(0, "42\n");
        assert_eq!(classify(Stage::Run, &raw), Outcome::Success("42\n".to_string()));
        assert_eq!(classify(Stage::Compile, &raw), Outcome::Success("42\n".to_string()));
    }

    #[test]
    fn test_non_zero_exit_depends_on_stage() {
        let raw = RawExecutionResult::exited(1, "main.cpp:1:1: error: expected ';'");
        assert_eq!(
            classify(Stage::Compile, &raw),
            Outcome::CompileError("main.cpp:1:1: error: expected ';'".to_string())
        );
        assert_eq!(
            classify(Stage::Run, &raw),
            Outcome::RuntimeError("main.cpp:1:1: error: expected ';'".to_string())
        );
    }

    #[test]
    fn test_timeout_wins_over_everything() {
        let raw = RawExecutionResult {
            exit_code: Some(137),
            timed_out: true,
            oom_killed: true,
            ..Default::default()
        };
        assert_eq!(classify(Stage::Run, &raw), Outcome::TimeLimitExceeded);
        assert_eq!(classify(Stage::Compile, &raw), Outcome::TimeLimitExceeded);
    }

    #[test]
    fn test_oom_is_not_a_runtime_error() {
        let raw = RawExecutionResult::oom_killed();
        assert_eq!(classify(Stage::Run, &raw), Outcome::MemoryLimitExceeded);
    }

    #[test]
    fn test_segfault_is_runtime_error() {
        let raw = RawExecutionResult::exited(139, "Segmentation fault");
        assert!(matches!(classify(Stage::Run, &raw), Outcome::RuntimeError(_)));
    }

    #[test]
    fn test_sigkill_without_oom_flag_is_runtime_error() {
        let raw = RawExecutionResult::exited(137, "Killed");
        assert!(matches!(classify(Stage::Run, &raw), Outcome::RuntimeError(_)));
    }

    #[test]
    fn test_output_text_is_never_a_signal() {
        let raw = RawExecutionResult::exited(0, "timeout Killed out of memory");
        assert!(matches!(classify(Stage::Run, &raw), Outcome::Success(_)));
    }

    #[test]
    fn test_missing_exit_code_is_failure() {
        let raw = RawExecutionResult::default();
        assert!(matches!(classify(Stage::Run, &raw), Outcome::RuntimeError(_)));
    }
}
