//! Extraction of install commands and runnable code from model replies
//!
//! The model is instructed to answer with ```bash fences for installs and
//! ```python fences for code, but replies drift: installs show up as bare
//! lines or inside comments, fences lose their closing marker, languages get
//! capitalized. Extraction is therefore purely pattern based and degrades to
//! "no match" on anything malformed rather than failing the pipeline.

use crate::errors::PipelineError;
use regex::Regex;
use std::collections::BTreeSet;

pub struct ReplyExtractor {
    bash_fence: Regex,
    bare_install: Regex,
    comment_install: Regex,
    code_fence: Regex,
}

impl ReplyExtractor {
    pub fn new() -> Result<Self, PipelineError> {
        Ok(Self {
            bash_fence: compile(r"(?si)```bash\s*(.*?)```")?,
            bare_install: compile(r"(?m)^[ \t]*(pip\s+install\s+[^\n\r]+)")?,
            comment_install: compile(r"(?mi)^[ \t]*#\s*pip\s+install\s+([^\n\r]+)")?,
            code_fence: compile(r"(?si)```python\s*(.*?)```")?,
        })
    }

    /// Collects `pip install` directives from three places: lines inside
    /// ```bash fences, bare lines, and `# pip install ...` comments. The
    /// result is de-duplicated and sorted.
    pub fn install_commands(&self, reply: &str) -> Vec<String> {
        let mut commands = BTreeSet::new();

        for captures in self.bash_fence.captures_iter(reply) {
            if let Some(block) = captures.get(1) {
                for line in block.as_str().lines() {
                    let line = line.trim();
                    if line.to_lowercase().starts_with("pip install") {
                        commands.insert(line.to_string());
                    }
                }
            }
        }

        for captures in self.bare_install.captures_iter(reply) {
            if let Some(command) = captures.get(1) {
                commands.insert(command.as_str().trim().to_string());
            }
        }

        for captures in self.comment_install.captures_iter(reply) {
            if let Some(rest) = captures.get(1) {
                commands.insert(format!("pip install {}", rest.as_str().trim()));
            }
        }

        commands.into_iter().collect()
    }

    /// Concatenates every ```python fenced block, trimmed, separated by a
    /// blank line. Returns an empty string when the reply has none.
    pub fn code(&self, reply: &str) -> String {
        let blocks: Vec<String> = self
            .code_fence
            .captures_iter(reply)
            .filter_map(|captures| captures.get(1))
            .map(|block| block.as_str().trim().to_string())
            .collect();

        blocks.join("\n\n")
    }
}

fn compile(pattern: &str) -> Result<Regex, PipelineError> {
    Regex::new(pattern)
        .map_err(|e| PipelineError::ParsingError(format!("Invalid extraction pattern: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ReplyExtractor {
        ReplyExtractor::new().unwrap()
    }

    #[test]
    fn test_no_fences_yields_empty_results() {
        let e = extractor();
        let reply = "Here is a plain explanation with no code at all.";
        assert!(e.install_commands(reply).is_empty());
        assert_eq!(e.code(reply), "");
    }

    #[test]
    fn test_bash_and_python_fences() {
        let e = extractor();
        let reply = "Run ```bash\npip install requests\n``` then ```python\nprint(1)\n```";
        assert_eq!(e.install_commands(reply), vec!["pip install requests"]);
        assert_eq!(e.code(reply), "print(1)");
    }

    #[test]
    fn test_install_commands_from_all_three_sources() {
        let e = extractor();
        let reply = concat!(
            "```bash\npip install requests\n```\n",
            "pip install numpy\n",
            "# pip install pandas\n",
        );
        let commands = e.install_commands(reply);
        assert_eq!(
            commands,
            vec![
                "pip install numpy",
                "pip install pandas",
                "pip install requests",
            ]
        );
    }

    #[test]
    fn test_duplicate_commands_collapse() {
        let e = extractor();
        let reply = "```bash\npip install requests\n```\npip install requests\n";
        assert_eq!(e.install_commands(reply), vec!["pip install requests"]);
    }

    #[test]
    fn test_fence_language_is_case_insensitive() {
        let e = extractor();
        let reply = "```Python\nprint('hi')\n```";
        assert_eq!(e.code(reply), "print('hi')");
    }

    #[test]
    fn test_multiple_code_blocks_join_with_blank_line() {
        let e = extractor();
        let reply = "```python\na = 1\n```\ntext\n```python\nprint(a)\n```";
        assert_eq!(e.code(reply), "a = 1\n\nprint(a)");
    }

    #[test]
    fn test_unclosed_fence_degrades_to_no_match() {
        let e = extractor();
        let reply = "```python\nprint('never closed')";
        assert_eq!(e.code(reply), "");
    }

    #[test]
    fn test_non_install_lines_in_bash_fence_are_ignored() {
        let e = extractor();
        let reply = "```bash\ncd /tmp\npip install rich\nls -la\n```";
        assert_eq!(e.install_commands(reply), vec!["pip install rich"]);
    }
}
