//! Pipeline coordination from user prompt to published artifacts
//!
//! One invocation runs the linear stage machine: parse embedded resource
//! links out of the prompt, fetch them into the input workspace, reset the
//! output workspace, describe the inputs to the model, generate install and
//! code suggestions, extract and filter them, execute what survives, then
//! publish whatever landed in the output directory.
//!
//! Failure semantics: per-item failures (one download, one install, one
//! upload) are absorbed into the report's outcome lists and never abort the
//! run. The LLM call is the single stage that short-circuits; without a
//! reply there is nothing left to do. No stage is retried.

use crate::config::KilnConfig;
use crate::core_types::Message;
use crate::errors::{ExecError, PipelineError};
use crate::extract::ReplyExtractor;
use crate::fetch::{FetchOutcome, ResourceFetcher};
use crate::llm::{ClientPool, OpenAIClient, LLM};
use crate::packages::{self, PreinstalledPackages};
use crate::publish::{publish_all, ArtifactStore, PublishOutcome, PublishStatus, SupabaseStore};
use crate::runner::{LogSink, ProcessRunner, StdLogSink};
use crate::safety::SafetyFilter;
use crate::workspace::{InputFile, Workspace};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const SYSTEM_DIRECTIVE: &str = "You are a helpful assistant that only outputs valid bash `pip install` commands \
or Python code blocks wrapped in proper triple backtick fences. \
Do not output anything else. \
When Python code involves graph creation or visualization, you MUST use NetworkX and Matplotlib. \
Crucial Matplotlib instruction: NEVER use `plt.show()`. \
Instead, ALWAYS save plots to files (e.g., `plt.savefig('my_plot.png')`) because the environment is server-side and lacks a display. \
When generating files in PDF, Word (.docx), PowerPoint (.pptx), or Excel (.xlsx) formats, \
you MUST use pure Python libraries with no external software dependencies: \
 - PDF: reportlab \
 - Word: python-docx \
 - Excel: openpyxl \
 - PowerPoint: python-pptx \
Always write complete, runnable Python examples for file generation, saving outputs to files.";

const PROMPT_SUFFIX: &str = "\n\nPlease reply with any needed `pip install ...` commands inside \
```bash``` fences and/or Python code inside ```python``` fences.";

/// Reported instead of output when generated code fails the safety filter.
pub const REFUSAL_MESSAGE: &str = "Generated code contains unsafe patterns; execution skipped.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InstallStatus {
    /// A named package is already present; the whole command was skipped.
    SkippedPreinstalled { package: String },
    /// The command failed tokenization, the safety filter, or the pip check.
    Rejected { reason: String },
    /// The command ran to completion; non-zero exit codes land here too.
    Completed { exit_code: Option<i32> },
    /// The command could not be run at all, or hit the deadline.
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallOutcome {
    pub command: String,
    pub status: InstallStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    /// The reply contained no code.
    NotRun,
    /// The code failed the safety filter; nothing was spawned.
    Refused { message: String },
    Completed {
        exit_code: Option<i32>,
        output: String,
    },
    TimedOut {
        timeout_secs: u64,
        output: String,
    },
    Failed { error: String },
}

/// Everything one pipeline invocation produced, in one place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Prompt text with resource tags stripped.
    pub prompt: String,
    pub fetches: Vec<FetchOutcome>,
    pub installs: Vec<InstallOutcome>,
    /// Code extracted from the reply, empty when there was none.
    pub code: String,
    pub execution: ExecutionOutcome,
    pub artifacts: Vec<PublishOutcome>,
}

impl PipelineReport {
    pub fn artifact_urls(&self) -> Vec<String> {
        self.artifacts
            .iter()
            .filter_map(|outcome| match &outcome.status {
                PublishStatus::Uploaded { artifact } => Some(artifact.public_url.clone()),
                PublishStatus::Failed { .. } => None,
            })
            .collect()
    }

    pub fn execution_output(&self) -> Option<&str> {
        match &self.execution {
            ExecutionOutcome::Completed { output, .. } => Some(output),
            ExecutionOutcome::TimedOut { output, .. } => Some(output),
            ExecutionOutcome::Refused { message } => Some(message),
            _ => None,
        }
    }

    /// One line the chat layer can paste into its reply.
    pub fn summary(&self) -> String {
        let urls = self.artifact_urls();
        if !urls.is_empty() {
            format!("Generated artifacts: {}", urls.join(", "))
        } else if let Some(output) = self.execution_output() {
            format!("Execution output:\n{}", output)
        } else {
            "No code was executed.".to_string()
        }
    }
}

pub struct Pipeline {
    llm: Arc<dyn LLM>,
    safety: SafetyFilter,
    extractor: ReplyExtractor,
    packages: PreinstalledPackages,
    fetcher: ResourceFetcher,
    runner: ProcessRunner,
    store: Option<Arc<dyn ArtifactStore>>,
    sink: Arc<dyn LogSink>,
    python_bin: String,
    workspace_root: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(llm: Arc<dyn LLM>) -> Result<Self, PipelineError> {
        Ok(Self {
            llm,
            safety: SafetyFilter::new()?,
            extractor: ReplyExtractor::new()?,
            packages: PreinstalledPackages::new(),
            fetcher: ResourceFetcher::new()?,
            runner: ProcessRunner::new(Duration::from_secs(30)),
            store: None,
            sink: Arc::new(StdLogSink),
            python_bin: "python3".to_string(),
            workspace_root: None,
        })
    }

    /// Builds the full pipeline from configuration: one client per API key
    /// behind a rotation pool, the configured runner deadline, and the
    /// artifact store when storage is set up.
    pub fn from_config(config: &KilnConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let clients: Vec<Arc<dyn LLM>> = config
            .llm
            .resolve_api_keys()?
            .into_iter()
            .map(|api_key| {
                Arc::new(
                    OpenAIClient::new(api_key, config.llm.model.clone())
                        .with_api_base(config.llm.api_base.clone())
                        .with_temperature(config.llm.temperature)
                        .with_max_tokens(config.llm.max_tokens),
                ) as Arc<dyn LLM>
            })
            .collect();
        let pool = ClientPool::new(clients)?;

        let mut pipeline = Self::new(Arc::new(pool))?
            .with_runner(ProcessRunner::new(Duration::from_secs(
                config.execution.timeout_secs,
            )))
            .with_python_bin(config.execution.python_bin.clone());

        if let Some(storage) = &config.storage {
            let api_key = storage.resolve_api_key()?;
            pipeline = pipeline.with_store(Arc::new(SupabaseStore::new(
                storage.endpoint.clone(),
                storage.bucket.clone(),
                api_key,
            )));
        }
        if let Some(root) = &config.workspace.root {
            pipeline = pipeline.with_workspace_root(root.clone());
        }
        Ok(pipeline)
    }

    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_runner(mut self, runner: ProcessRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_python_bin(mut self, python_bin: impl Into<String>) -> Self {
        self.python_bin = python_bin.into();
        self
    }

    /// Use a persistent workspace root instead of a fresh temporary
    /// directory per invocation.
    pub fn with_workspace_root(mut self, root: PathBuf) -> Self {
        self.workspace_root = Some(root);
        self
    }

    /// Runs one full pipeline invocation for `prompt`.
    pub async fn run(&self, prompt: &str) -> Result<PipelineReport, PipelineError> {
        let (urls, clean_prompt) = self.fetcher.extract_links(prompt);
        let workspace = self.open_workspace()?;

        let fetches = if urls.is_empty() {
            Vec::new()
        } else {
            self.fetcher
                .download_all(&urls, &workspace.input_dir())
                .await
        };

        workspace.reset_output()?;

        let manifest = workspace.input_manifest()?;
        let user_content = compose_user_message(&clean_prompt, &manifest);

        let reply = self
            .llm
            .generate(vec![
                Message::system(SYSTEM_DIRECTIVE),
                Message::user(user_content),
            ])
            .await?;

        let commands = self.extractor.install_commands(&reply.content);
        let code = self.extractor.code(&reply.content);
        log::info!(
            "Extracted {} install command(s) and {} bytes of code",
            commands.len(),
            code.len()
        );

        let installs = self.run_installs(&commands).await;
        let execution = self.execute_code(&code, &workspace).await;
        let artifacts = self.publish_outputs(&workspace).await;

        Ok(PipelineReport {
            prompt: clean_prompt,
            fetches,
            installs,
            code,
            execution,
            artifacts,
        })
    }

    /// Ad-hoc execution of a user-supplied snippet, under the same safety
    /// filter and deadline as pipeline-generated code. Always runs in a
    /// throwaway workspace; nothing is published and nothing persists.
    pub async fn run_snippet(&self, code: &str) -> Result<ExecutionOutcome, PipelineError> {
        let workspace = Workspace::ephemeral()?;
        Ok(self.execute_code(code, &workspace).await)
    }

    fn open_workspace(&self) -> Result<Workspace, PipelineError> {
        match &self.workspace_root {
            Some(root) => Workspace::at(root.clone()),
            None => Workspace::ephemeral(),
        }
    }

    async fn run_installs(&self, commands: &[String]) -> Vec<InstallOutcome> {
        let mut outcomes = Vec::with_capacity(commands.len());
        for command in commands {
            log::info!("Install command: {}", command);
            let status = self.install_one(command).await;
            outcomes.push(InstallOutcome {
                command: command.clone(),
                status,
            });
        }
        outcomes
    }

    async fn install_one(&self, raw_command: &str) -> InstallStatus {
        let parts = match packages::tokenize_install(raw_command) {
            Some(parts) => parts,
            None => {
                return InstallStatus::Rejected {
                    reason: "command is not valid shell".to_string(),
                }
            }
        };

        let requested = packages::requested_packages(&parts);
        if let Some(package) = self.packages.first_preinstalled(&requested) {
            log::info!("Skipping already-installed package: {}", package);
            return InstallStatus::SkippedPreinstalled { package };
        }

        if !self.safety.is_shell_command_safe(raw_command) {
            log::warn!("Skipping unsafe install command: {}", raw_command);
            return InstallStatus::Rejected {
                reason: "matched a dangerous shell pattern".to_string(),
            };
        }

        if !packages::is_pip_install(&parts) {
            log::warn!("Not a pip install invocation, skipping: {}", raw_command);
            return InstallStatus::Rejected {
                reason: "not a pip install invocation".to_string(),
            };
        }

        match self
            .runner
            .run(&parts[0], &parts[1..], None, self.sink.as_ref())
            .await
        {
            Ok(run) => {
                if run.success() {
                    log::info!("Install command succeeded: {}", raw_command);
                } else {
                    log::warn!(
                        "Install command exited with {:?}: {}",
                        run.exit_code,
                        raw_command
                    );
                }
                InstallStatus::Completed {
                    exit_code: run.exit_code,
                }
            }
            Err(e) => {
                log::warn!("Install command failed: {}: {}", raw_command, e);
                InstallStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn execute_code(&self, code: &str, workspace: &Workspace) -> ExecutionOutcome {
        if code.trim().is_empty() {
            return ExecutionOutcome::NotRun;
        }

        if !self.safety.is_python_code_safe(code) {
            log::warn!("{}", REFUSAL_MESSAGE);
            return ExecutionOutcome::Refused {
                message: REFUSAL_MESSAGE.to_string(),
            };
        }

        let script = match write_temp_script(code) {
            Ok(script) => script,
            Err(e) => {
                return ExecutionOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        let script_path = script.path().to_string_lossy().to_string();

        // The output directory is the working directory, so relative writes
        // from the generated code land where artifact collection looks.
        let result = self
            .runner
            .run(
                &self.python_bin,
                &[script_path],
                Some(&workspace.output_dir()),
                self.sink.as_ref(),
            )
            .await;
        // `script` drops here and removes the temp file.

        match result {
            Ok(run) => {
                if !run.success() {
                    log::warn!("Generated code exited with {:?}", run.exit_code);
                }
                ExecutionOutcome::Completed {
                    exit_code: run.exit_code,
                    output: run.output,
                }
            }
            Err(ExecError::Timeout {
                timeout_secs,
                output,
            }) => ExecutionOutcome::TimedOut {
                timeout_secs,
                output,
            },
            Err(e) => ExecutionOutcome::Failed {
                error: e.to_string(),
            },
        }
    }

    async fn publish_outputs(&self, workspace: &Workspace) -> Vec<PublishOutcome> {
        let files = match workspace.output_files() {
            Ok(files) => files,
            Err(e) => {
                log::warn!("Could not enumerate output files: {}", e);
                return Vec::new();
            }
        };

        let store = match &self.store {
            Some(store) => store,
            None => {
                if !files.is_empty() {
                    log::debug!(
                        "No artifact store configured; {} output file(s) stay local",
                        files.len()
                    );
                }
                return Vec::new();
            }
        };

        publish_all(store.as_ref(), &files).await
    }
}

fn compose_user_message(clean_prompt: &str, manifest: &[InputFile]) -> String {
    let mut content = clean_prompt.to_string();
    if !manifest.is_empty() {
        let entries: Vec<String> = manifest
            .iter()
            .map(|file| format!("{} ({})", file.path.display(), file.extension))
            .collect();
        content.push_str(&format!(
            " The following input files are provided: {}.",
            entries.join(", ")
        ));
    }
    content.push_str(PROMPT_SUFFIX);
    content
}

fn write_temp_script(code: &str) -> Result<tempfile::NamedTempFile, PipelineError> {
    let mut file = tempfile::Builder::new()
        .prefix("kiln-script-")
        .suffix(".py")
        .tempfile()
        .map_err(|e| PipelineError::ExecutionError(format!("Could not create script file: {}", e)))?;
    file.write_all(code.as_bytes())?;
    file.flush()?;
    Ok(file)
}
