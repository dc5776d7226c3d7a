//! yt-dlp backed extractor.
//!
//! Runs the `yt-dlp` executable on a blocking worker thread and reports the
//! final file path through `--print after_move:filepath`.

use super::{ExtractError, Extractor};
use crate::artifact::{artifact_stem, remove_stem_files, Artifact};
use crate::config::RelaySettings;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Prefer 720p video merged with the best audio, then anything available.
const FORMAT_SELECTOR: &str = "bestvideo[height<=720]+bestaudio/bestvideo+bestaudio/best";

/// Container used when separate video and audio streams are merged.
const MERGE_FORMAT: &str = "mp4";

/// Diagnostics meaning the URL will never yield media, however often we retry.
const FATAL_ERROR_PATTERNS: &[&str] = &[
    "Unsupported URL",
    "is not a valid URL",
    "Video unavailable",
    "Private video",
    "This video is private",
    "This video is not available",
    "This video has been removed",
    "removed by the uploader",
    "no longer available",
    "blocked it in your country",
    "geo-restricted",
    "who has blocked it on copyright grounds",
    "terminated account",
    "Sign in to confirm your age",
    "members-only",
    "There's no video in this",
    "No video formats found",
    "HTTP Error 403",
    "HTTP Error 404",
];

/// Longest slice of stderr carried into an error message.
const MAX_ERROR_LENGTH: usize = 500;

/// Check if a yt-dlp diagnostic marks the URL as permanently unusable
fn is_fatal_ytdlp_error(error_msg: &str) -> bool {
    FATAL_ERROR_PATTERNS
        .iter()
        .any(|pattern| error_msg.contains(pattern))
}

/// Extractor invoking the `yt-dlp` command line tool.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    binary: String,
    download_dir: PathBuf,
    cookies_file: PathBuf,
    max_file_size: u64,
}

impl YtDlpExtractor {
    /// Create an extractor from relay settings.
    #[must_use]
    pub fn new(settings: &RelaySettings) -> Self {
        Self {
            binary: settings.ytdlp_bin.clone(),
            download_dir: settings.download_dir.clone(),
            cookies_file: settings.cookies_file.clone(),
            max_file_size: settings.max_file_size,
        }
    }

    /// Command line arguments for downloading `url` into `<stem>.<ext>`.
    #[must_use]
    pub fn build_args(&self, url: &str, stem: &str) -> Vec<OsString> {
        let template = self.download_dir.join(format!("{stem}.%(ext)s"));

        let mut args: Vec<OsString> = vec![
            "--format".into(),
            FORMAT_SELECTOR.into(),
            "--merge-output-format".into(),
            MERGE_FORMAT.into(),
            "--max-filesize".into(),
            self.max_file_size.to_string().into(),
            "--no-playlist".into(),
            "--quiet".into(),
            "--no-warnings".into(),
            "--no-simulate".into(),
            "--print".into(),
            "after_move:filepath".into(),
            "--output".into(),
            template.into_os_string(),
        ];

        if self.cookies_file.exists() {
            args.push("--cookies".into());
            args.push(self.cookies_file.clone().into_os_string());
        }

        // Everything after "--" is a URL, never an option.
        args.push("--".into());
        args.push(url.into());
        args
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn fetch(&self, url: &str) -> Result<Artifact, ExtractError> {
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| {
                ExtractError::Transient(format!(
                    "cannot create download directory {}: {e}",
                    self.download_dir.display()
                ))
            })?;

        let stem = artifact_stem();
        let args = self.build_args(url, &stem);
        let binary = self.binary.clone();
        let url_owned = url.to_string();

        debug!(url = %url, binary = %binary, stem = %stem, "Starting yt-dlp");

        let result = tokio::task::spawn_blocking(move || run_ytdlp(&binary, &args, &url_owned))
            .await
            .map_err(|e| ExtractError::Transient(format!("extraction worker failed: {e}")))
            .and_then(|result| result);

        match result {
            Ok(path) => {
                info!(url = %url, path = %path.display(), "Download finished");
                Ok(Artifact::new(path))
            }
            Err(e) => {
                let removed = remove_stem_files(&self.download_dir, &stem).await;
                if removed > 0 {
                    debug!(url = %url, stem = %stem, removed, "Removed leftovers of failed download");
                }
                Err(e)
            }
        }
    }
}

/// Run yt-dlp to completion and classify the result.
fn run_ytdlp(binary: &str, args: &[OsString], url: &str) -> Result<PathBuf, ExtractError> {
    let output = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| ExtractError::Transient(format!("failed to run {binary}: {e}")))?;

    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        let message = truncate_error(stderr.trim());

        if is_fatal_ytdlp_error(&message) {
            return Err(ExtractError::NonRetryable {
                url: url.to_string(),
                reason: message,
            });
        }

        warn!(url = %url, status = %output.status, error = %message, "yt-dlp exited with an error");
        return Err(ExtractError::Transient(format!(
            "{binary} exited with {}: {message}",
            output.status
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let reported = stdout
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(PathBuf::from);

    match reported {
        Some(path) if path.is_file() => Ok(path),
        Some(path) => Err(ExtractError::NonRetryable {
            url: url.to_string(),
            reason: format!("reported file {} does not exist", path.display()),
        }),
        None => Err(ExtractError::NonRetryable {
            url: url.to_string(),
            reason: "no file was downloaded".to_string(),
        }),
    }
}

fn truncate_error(message: &str) -> String {
    if message.chars().count() > MAX_ERROR_LENGTH {
        let truncated: String = message.chars().take(MAX_ERROR_LENGTH).collect();
        format!("{truncated}...")
    } else {
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn extractor(dir: &Path) -> YtDlpExtractor {
        YtDlpExtractor::new(&RelaySettings {
            download_dir: dir.join("downloads"),
            cookies_file: dir.join("cookies.txt"),
            ..RelaySettings::default()
        })
    }

    fn args_as_strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_fatal_patterns() {
        assert!(is_fatal_ytdlp_error(
            "ERROR: Unsupported URL: https://example.com/"
        ));
        assert!(is_fatal_ytdlp_error("ERROR: [youtube] abc: Private video"));
        assert!(!is_fatal_ytdlp_error("ERROR: Connection reset by peer"));
        assert!(!is_fatal_ytdlp_error("HTTP Error 503: Service Unavailable"));
    }

    #[test]
    fn test_args_carry_extraction_policy() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let args = args_as_strings(&extractor(dir.path()).build_args("https://v.example/1", "42"));

        let value_after = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };

        assert_eq!(value_after("--format").as_deref(), Some(FORMAT_SELECTOR));
        assert_eq!(value_after("--merge-output-format").as_deref(), Some("mp4"));
        assert_eq!(value_after("--max-filesize").as_deref(), Some("47185920"));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(!args.contains(&"--cookies".to_string()), "no cookie file on disk");

        let output = value_after("--output").unwrap_or_default();
        assert!(output.ends_with("42.%(ext)s"), "unexpected template: {output}");
        assert_eq!(args.last().map(String::as_str), Some("https://v.example/1"));
        Ok(())
    }

    #[test]
    fn test_cookie_file_passed_when_present() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("cookies.txt"), "# Netscape HTTP Cookie File\n")?;

        let args = args_as_strings(&extractor(dir.path()).build_args("https://v.example/1", "1"));
        let idx = args.iter().position(|a| a == "--cookies");
        let Some(idx) = idx else {
            panic!("--cookies missing from {args:?}");
        };
        assert!(args[idx + 1].ends_with("cookies.txt"));
        Ok(())
    }

    #[test]
    fn test_long_errors_are_truncated() {
        let long = "x".repeat(MAX_ERROR_LENGTH + 10);
        let truncated = truncate_error(&long);
        assert_eq!(truncated.chars().count(), MAX_ERROR_LENGTH + 3);
    }

    #[tokio::test]
    async fn test_missing_binary_is_transient() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let extractor = YtDlpExtractor {
            binary: dir
                .path()
                .join("no-such-yt-dlp")
                .to_string_lossy()
                .into_owned(),
            ..extractor(dir.path())
        };

        let result = extractor.fetch("https://v.example/1").await;
        let Err(err) = result else {
            panic!("expected failure");
        };
        assert!(err.is_retryable(), "unexpected error: {err}");
        Ok(())
    }

    #[cfg(unix)]
    mod fake_binary {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Write an executable shell script standing in for yt-dlp.
        fn fake_ytdlp(dir: &Path, body: &str) -> std::io::Result<String> {
            let path = dir.join("fake-yt-dlp");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
            Ok(path.to_string_lossy().into_owned())
        }

        fn with_binary(dir: &Path, binary: String) -> YtDlpExtractor {
            YtDlpExtractor {
                binary,
                ..extractor(dir)
            }
        }

        #[tokio::test]
        async fn test_successful_download_yields_artifact() -> std::io::Result<()> {
            let dir = tempfile::tempdir()?;
            let script = r#"
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "--output" ]; then out="$arg"; fi
  prev="$arg"
done
file=$(printf '%s' "$out" | sed 's/%(ext)s/mp4/')
printf 'video' > "$file"
printf '%s\n' "$file"
"#;
            let extractor = with_binary(dir.path(), fake_ytdlp(dir.path(), script)?);

            let artifact = match extractor.fetch("https://v.example/1").await {
                Ok(artifact) => artifact,
                Err(err) => panic!("fetch failed: {err}"),
            };
            assert!(artifact.path().starts_with(dir.path().join("downloads")));
            assert_eq!(
                artifact.path().extension().and_then(|e| e.to_str()),
                Some("mp4")
            );
            assert_eq!(artifact.size().await?, 5);

            let path = artifact.path().to_path_buf();
            assert!(artifact.discard());
            assert!(!path.exists());
            Ok(())
        }

        #[tokio::test]
        async fn test_no_output_is_non_retryable() -> std::io::Result<()> {
            let dir = tempfile::tempdir()?;
            let extractor = with_binary(dir.path(), fake_ytdlp(dir.path(), "exit 0")?);

            let result = extractor.fetch("https://v.example/empty").await;
            assert!(
                matches!(result, Err(ExtractError::NonRetryable { .. })),
                "unexpected result: {result:?}"
            );
            Ok(())
        }

        #[tokio::test]
        async fn test_unsupported_url_is_non_retryable() -> std::io::Result<()> {
            let dir = tempfile::tempdir()?;
            let body = "echo 'ERROR: Unsupported URL: https://v.example/x' >&2\nexit 1";
            let extractor = with_binary(dir.path(), fake_ytdlp(dir.path(), body)?);

            let result = extractor.fetch("https://v.example/x").await;
            assert!(
                matches!(result, Err(ExtractError::NonRetryable { .. })),
                "unexpected result: {result:?}"
            );
            Ok(())
        }

        #[tokio::test]
        async fn test_failed_download_leaves_no_partial_files() -> std::io::Result<()> {
            let dir = tempfile::tempdir()?;
            let script = r#"
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "--output" ]; then out="$arg"; fi
  prev="$arg"
done
printf 'half' > "$(printf '%s' "$out" | sed 's/%(ext)s/mp4.part/')"
printf 'video' > "$(printf '%s' "$out" | sed 's/%(ext)s/f137.mp4/')"
echo 'ERROR: Unable to download video data: Connection reset' >&2
exit 1
"#;
            let extractor = with_binary(dir.path(), fake_ytdlp(dir.path(), script)?);
            let keep = dir.path().join("downloads").join("unrelated.mp4");
            std::fs::create_dir_all(dir.path().join("downloads"))?;
            std::fs::write(&keep, "x")?;

            for _ in 0..3 {
                let result = extractor.fetch("https://v.example/flaky").await;
                assert!(
                    matches!(result, Err(ExtractError::Transient(_))),
                    "unexpected result: {result:?}"
                );
            }

            let left: Vec<PathBuf> = std::fs::read_dir(dir.path().join("downloads"))?
                .map(|entry| entry.map(|e| e.path()))
                .collect::<std::io::Result<_>>()?;
            assert_eq!(left, vec![keep]);
            Ok(())
        }

        #[tokio::test]
        async fn test_unreported_file_is_removed() -> std::io::Result<()> {
            let dir = tempfile::tempdir()?;
            let script = r#"
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "--output" ]; then out="$arg"; fi
  prev="$arg"
done
printf 'video' > "$(printf '%s' "$out" | sed 's/%(ext)s/webm/')"
"#;
            let extractor = with_binary(dir.path(), fake_ytdlp(dir.path(), script)?);

            let result = extractor.fetch("https://v.example/silent").await;
            assert!(
                matches!(result, Err(ExtractError::NonRetryable { .. })),
                "unexpected result: {result:?}"
            );
            assert_eq!(std::fs::read_dir(dir.path().join("downloads"))?.count(), 0);
            Ok(())
        }

        #[tokio::test]
        async fn test_network_error_is_transient() -> std::io::Result<()> {
            let dir = tempfile::tempdir()?;
            let body = "echo 'ERROR: Unable to download webpage: Connection reset' >&2\nexit 1";
            let extractor = with_binary(dir.path(), fake_ytdlp(dir.path(), body)?);

            let result = extractor.fetch("https://v.example/x").await;
            assert!(
                matches!(result, Err(ExtractError::Transient(_))),
                "unexpected result: {result:?}"
            );
            Ok(())
        }
    }
}
