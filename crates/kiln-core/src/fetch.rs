//! Resource reference parsing and input downloads
//!
//! User messages can embed resource links between `<up-img>...</up-img>`
//! tags. The fetcher strips the tags out of the prompt, downloads each link
//! into the workspace input directory under a collision-safe filename, and
//! reports a per-URL outcome list. A failed download never fails the
//! pipeline; the outcome records the error instead.

use crate::errors::PipelineError;
use futures_util::StreamExt;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(15);

/// Outcome of one download attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FetchStatus {
    Downloaded { path: PathBuf },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub url: String,
    pub status: FetchStatus,
}

pub struct ResourceFetcher {
    client: Client,
    tag_pattern: Regex,
}

impl ResourceFetcher {
    pub fn new() -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| PipelineError::FetchError(format!("Could not build HTTP client: {}", e)))?;
        let tag_pattern = Regex::new(r"(?si)<up-img>(.*?)</up-img>")
            .map_err(|e| PipelineError::ParsingError(format!("Invalid resource tag pattern: {}", e)))?;
        Ok(Self {
            client,
            tag_pattern,
        })
    }

    /// Extracts every URL between `<up-img>` tags and returns them together
    /// with the message text with all tags removed.
    pub fn extract_links(&self, message: &str) -> (Vec<String>, String) {
        let urls: Vec<String> = self
            .tag_pattern
            .captures_iter(message)
            .filter_map(|captures| captures.get(1))
            .map(|url| url.as_str().trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();

        let remaining = self.tag_pattern.replace_all(message, "").trim().to_string();
        (urls, remaining)
    }

    /// Downloads every URL into `input_dir`, best-effort.
    pub async fn download_all(&self, urls: &[String], input_dir: &Path) -> Vec<FetchOutcome> {
        let mut outcomes = Vec::with_capacity(urls.len());
        for url in urls {
            let status = match self.download_one(url, input_dir).await {
                Ok(path) => {
                    log::info!("Downloaded {} to {}", url, path.display());
                    FetchStatus::Downloaded { path }
                }
                Err(e) => {
                    log::warn!("Failed to download {}: {}", url, e);
                    FetchStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            outcomes.push(FetchOutcome {
                url: url.clone(),
                status,
            });
        }
        outcomes
    }

    async fn download_one(&self, url: &str, input_dir: &Path) -> Result<PathBuf, PipelineError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::FetchError(format!("Request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| PipelineError::FetchError(format!("Bad status: {}", e)))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or("").trim().to_string());

        let filename = safe_filename_from_url(url, content_type.as_deref());
        let file_path = input_dir.join(filename);

        let mut file = tokio::fs::File::create(&file_path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| PipelineError::FetchError(format!("Body read failed: {}", e)))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(file_path)
    }
}

/// Derives a collision-safe filename from a URL: keeps the original name when
/// the path has one, supplements a missing extension from the content type,
/// and always prepends a random 8-hex token.
pub fn safe_filename_from_url(url: &str, content_type: Option<&str>) -> String {
    let name = url
        .rsplit('/')
        .next()
        .unwrap_or("")
        .split('?')
        .next()
        .unwrap_or("")
        .trim()
        .to_string();

    let guessed_extension = content_type
        .and_then(|ct| mime_guess::get_mime_extensions_str(ct))
        .and_then(|extensions| extensions.first())
        .map(|ext| format!(".{}", ext));

    let name = if name.is_empty() || !name.contains('.') {
        match (name.is_empty(), guessed_extension) {
            (true, extension) => format!(
                "{}{}",
                Uuid::new_v4().simple(),
                extension.unwrap_or_default()
            ),
            (false, Some(extension)) => format!("{}{}", name, extension),
            (false, None) => name,
        }
    } else {
        name
    };

    format!("{}_{}", short_token(), name)
}

fn short_token() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> ResourceFetcher {
        ResourceFetcher::new().unwrap()
    }

    #[test]
    fn test_extract_links_and_clean_prompt() {
        let f = fetcher();
        let message = "Plot this file <up-img>https://example.com/data.csv</up-img> as a bar chart";
        let (urls, remaining) = f.extract_links(message);
        assert_eq!(urls, vec!["https://example.com/data.csv"]);
        assert_eq!(remaining, "Plot this file  as a bar chart");
    }

    #[test]
    fn test_extract_links_without_tags() {
        let f = fetcher();
        let (urls, remaining) = f.extract_links("no resources here");
        assert!(urls.is_empty());
        assert_eq!(remaining, "no resources here");
    }

    #[test]
    fn test_extract_multiple_links() {
        let f = fetcher();
        let message = "<up-img>https://a.test/x.png</up-img><up-img>https://b.test/y.png</up-img>";
        let (urls, remaining) = f.extract_links(message);
        assert_eq!(urls.len(), 2);
        assert!(remaining.is_empty());
    }

    #[test]
    fn test_tag_matching_is_case_insensitive() {
        let f = fetcher();
        let (urls, _) = f.extract_links("<UP-IMG>https://a.test/x.png</UP-IMG>");
        assert_eq!(urls, vec!["https://a.test/x.png"]);
    }

    #[test]
    fn test_safe_filename_keeps_original_name() {
        let name = safe_filename_from_url("https://example.com/report.pdf", None);
        assert!(name.ends_with("_report.pdf"));
        assert_eq!(name.len(), "report.pdf".len() + 9);
    }

    #[test]
    fn test_safe_filename_strips_query_params() {
        let name = safe_filename_from_url("https://example.com/img.png?size=large", None);
        assert!(name.ends_with("_img.png"));
    }

    #[test]
    fn test_safe_filename_supplements_extension_from_content_type() {
        let name = safe_filename_from_url("https://example.com/download", Some("image/png"));
        assert!(name.ends_with(".png"), "got {}", name);
        assert!(name.contains("_download"));
    }

    #[test]
    fn test_safe_filename_for_bare_host() {
        let name = safe_filename_from_url("https://example.com/", Some("image/png"));
        // Random name with a guessed extension.
        assert!(name.contains('_'));
        assert!(name.ends_with(".png"), "got {}", name);
    }

    #[test]
    fn test_safe_filenames_do_not_collide() {
        let a = safe_filename_from_url("https://example.com/data.csv", None);
        let b = safe_filename_from_url("https://example.com/data.csv", None);
        assert_ne!(a, b);
    }
}
