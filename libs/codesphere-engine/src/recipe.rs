//! Language recipe table
//!
//! Pure mapping from a language to the file names and shell commands used to
//! build and run it. Commands run with the workspace as working directory and
//! read stdin from [`INPUT_FILE_NAME`].

use codesphere_common::types::Language;
use serde::Serialize;

/// Name of the stdin file materialized in every workspace
pub const INPUT_FILE_NAME: &str = "input.txt";

/// Replaced in run commands by the submission's memory limit in MB
const MEMORY_LIMIT_PLACEHOLDER: &str = "{memory_limit_mb}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Recipe {
    pub source_file: &'static str,
    pub compile_command: Option<&'static str>,
    pub run_command: &'static str,
    /// Exit code the runtime uses when it aborts on exhausted memory
    #[serde(skip)]
    pub memory_exhausted_exit_code: Option<i64>,
}

impl Recipe {
    /// Run command with the memory limit filled in
    pub fn run_script(&self, memory_limit_mb: u64) -> String {
        self.run_command
            .replace(MEMORY_LIMIT_PLACEHOLDER, &memory_limit_mb.to_string())
    }

    /// True when `exit_code` is the runtime's own out-of-memory exit
    pub fn reports_memory_exhaustion(&self, exit_code: Option<i64>) -> bool {
        self.memory_exhausted_exit_code.is_some() && exit_code == self.memory_exhausted_exit_code
    }
}

const C: Recipe = Recipe {
    source_file: "main.c",
    compile_command: Some("gcc -O2 -std=c11 main.c -o main.out -lm"),
    run_command: "./main.out < input.txt",
    memory_exhausted_exit_code: None,
};

const CPP: Recipe = Recipe {
    source_file: "main.cpp",
    compile_command: Some("g++ -O2 -std=c++17 main.cpp -o main.out"),
    run_command: "./main.out < input.txt",
    memory_exhausted_exit_code: None,
};

const JAVA: Recipe = Recipe {
    source_file: "Main.java",
    compile_command: Some("javac Main.java"),
    // Heap sized to the container limit; a heap OOM exits with 3 instead of a catchable error
    run_command: "java -Xss64m -Xmx{memory_limit_mb}m -XX:+UseSerialGC -XX:+ExitOnOutOfMemoryError Main < input.txt",
    memory_exhausted_exit_code: Some(3),
};

const PYTHON: Recipe = Recipe {
    source_file: "main.py",
    compile_command: None,
    run_command: "python3 main.py < input.txt",
    memory_exhausted_exit_code: None,
};

pub fn recipe(language: Language) -> &'static Recipe {
    match language {
        Language::C => &C,
        Language::Cpp => &CPP,
        Language::Java => &JAVA,
        Language::Python => &PYTHON,
    }
}
