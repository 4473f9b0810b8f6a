//! Pattern-based filtering of shell commands and generated code
//!
//! This is a best-effort denylist, not a sandbox or security boundary. Any
//! construct that does not literally match a pattern is permitted, including
//! obfuscated or indirect equivalents of the listed operations. The filter
//! exists to stop the obvious accidents a code-suggesting model produces,
//! while real isolation would require OS-level process confinement that this
//! subsystem does not provide.

use crate::errors::PipelineError;
use regex::Regex;

/// Shell constructs that destroy data or take the host down.
const DANGEROUS_SHELL_PATTERNS: &[&str] = &[
    r"\brm\s",
    r"\brm -",
    r"\bshutdown\b",
    r"\breboot\b",
    r"\bpoweroff\b",
    r":\s*>",
    r"\bmkfs\b",
    r"\bdd\b",
    r"\bformat\b",
];

/// Code constructs that escape the interpreter into the host.
const DANGEROUS_PYTHON_PATTERNS: &[&str] = &[
    r"import\s+os",
    r"os\.system\s*\(",
    r"subprocess\.Popen\s*\(",
    r"subprocess\.call\s*\(",
    r"eval\s*\(",
    r"exec\s*\(",
];

pub struct SafetyFilter {
    shell_patterns: Vec<Regex>,
    code_patterns: Vec<Regex>,
}

impl SafetyFilter {
    pub fn new() -> Result<Self, PipelineError> {
        Ok(Self {
            shell_patterns: compile_all(DANGEROUS_SHELL_PATTERNS)?,
            code_patterns: compile_all(DANGEROUS_PYTHON_PATTERNS)?,
        })
    }

    /// Returns false if any dangerous shell pattern appears in the command.
    /// Matching is done on a lowercased copy of the input.
    pub fn is_shell_command_safe(&self, command: &str) -> bool {
        let lowered = command.to_lowercase();
        for pattern in &self.shell_patterns {
            if pattern.is_match(&lowered) {
                log::warn!(
                    "Shell command matched dangerous pattern '{}': {}",
                    pattern.as_str(),
                    command
                );
                return false;
            }
        }
        true
    }

    /// Returns false if any dangerous code pattern is detected.
    pub fn is_python_code_safe(&self, code: &str) -> bool {
        for pattern in &self.code_patterns {
            if pattern.is_match(code) {
                log::warn!("Code matched dangerous pattern '{}'", pattern.as_str());
                log::debug!("Rejected code: {}", code);
                return false;
            }
        }
        true
    }
}

fn compile_all(patterns: &[&str]) -> Result<Vec<Regex>, PipelineError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p)
                .map_err(|e| PipelineError::ConfigError(format!("Invalid safety pattern '{}': {}", p, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> SafetyFilter {
        SafetyFilter::new().unwrap()
    }

    #[test]
    fn test_plain_install_commands_are_safe() {
        let f = filter();
        assert!(f.is_shell_command_safe("pip install requests"));
        assert!(f.is_shell_command_safe("pip3 install numpy==1.26.0 pandas"));
    }

    #[test]
    fn test_destructive_shell_commands_are_rejected() {
        let f = filter();
        assert!(!f.is_shell_command_safe("rm -rf /"));
        assert!(!f.is_shell_command_safe("sudo shutdown now"));
        assert!(!f.is_shell_command_safe("mkfs /dev/sda1"));
        assert!(!f.is_shell_command_safe("dd if=/dev/zero of=/dev/sda"));
        assert!(!f.is_shell_command_safe(": > /dev/sda"));
    }

    #[test]
    fn test_shell_matching_is_case_insensitive() {
        let f = filter();
        assert!(!f.is_shell_command_safe("RM -rf build"));
        assert!(!f.is_shell_command_safe("Shutdown -h now"));
    }

    #[test]
    fn test_plain_python_code_is_safe() {
        let f = filter();
        assert!(f.is_python_code_safe("print(1)"));
        assert!(f.is_python_code_safe(
            "import matplotlib.pyplot as plt\nplt.plot([1, 2])\nplt.savefig('plot.png')"
        ));
    }

    #[test]
    fn test_dangerous_python_code_is_rejected() {
        let f = filter();
        assert!(!f.is_python_code_safe("import os\nos.system('ls')"));
        assert!(!f.is_python_code_safe("subprocess.Popen(['ls'])"));
        assert!(!f.is_python_code_safe("subprocess.call(['ls'])"));
        assert!(!f.is_python_code_safe("eval('1+1')"));
        assert!(!f.is_python_code_safe("exec(payload)"));
    }

    #[test]
    fn test_filter_is_a_denylist_not_a_sandbox() {
        // Indirect equivalents pass; documented limitation of pattern matching.
        let f = filter();
        assert!(f.is_python_code_safe("__import__('o' + 's')"));
    }
}
