//! Best-effort download of the public data file.
//!
//! Candidate URLs are tried once each, in order, with a blocking HTTP
//! client. The first response that looks like a real data file is saved
//! atomically; otherwise the caller gets the attempt log and prints
//! manual download steps.

use crate::config::FetchConfig;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Maximum redirects followed per candidate.
const MAX_REDIRECTS: usize = 10;

/// Options for probing candidate URLs.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub urls: Vec<String>,
    /// Bodies at or below this size are treated as error pages.
    pub min_bytes: u64,
    pub timeout: Duration,
    pub user_agent: String,
    pub output_dir: PathBuf,
    /// Saved file name without extension.
    pub output_stem: String,
    pub show_progress: bool,
}

impl FetchOptions {
    pub fn from_config(config: &FetchConfig, output_dir: PathBuf, show_progress: bool) -> Self {
        Self {
            urls: config.urls.clone(),
            min_bytes: config.min_bytes,
            timeout: Duration::from_secs(config.timeout_seconds),
            user_agent: config.user_agent.clone(),
            output_dir,
            output_stem: config.output_stem.clone(),
            show_progress,
        }
    }
}

/// How one candidate URL fared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptStatus {
    Accepted { bytes: u64 },
    BadStatus { status: u16 },
    TooSmall { bytes: u64 },
    Failed { reason: String },
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptStatus::Accepted { bytes } => write!(f, "accepted ({} bytes)", bytes),
            AttemptStatus::BadStatus { status } => write!(f, "HTTP {}", status),
            AttemptStatus::TooSmall { bytes } => {
                write!(f, "only {} bytes, likely an error page", bytes)
            }
            AttemptStatus::Failed { reason } => write!(f, "request failed: {}", reason),
        }
    }
}

/// One probed candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub url: String,
    pub status: AttemptStatus,
}

/// Result of probing every candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched {
        url: String,
        bytes: u64,
        content_type: Option<String>,
        saved_to: PathBuf,
    },
    ManualInterventionRequired {
        attempts: Vec<Attempt>,
    },
}

/// Decide whether a response is a usable data file.
pub fn evaluate_response(status: u16, len: u64, min_bytes: u64) -> AttemptStatus {
    if !(200..300).contains(&status) {
        AttemptStatus::BadStatus { status }
    } else if len <= min_bytes {
        AttemptStatus::TooSmall { bytes: len }
    } else {
        AttemptStatus::Accepted { bytes: len }
    }
}

/// File extension for a fetched payload.
pub fn extension_for(content_type: Option<&str>, url: &str) -> &'static str {
    let content_type = content_type.unwrap_or("").to_lowercase();
    if content_type.contains("excel")
        || content_type.contains("spreadsheet")
        || url.to_lowercase().ends_with(".xlsx")
    {
        "xlsx"
    } else {
        "csv"
    }
}

/// Write `bytes` to `dir/name` through a temp file in the same directory.
fn save_atomically(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let target = dir.join(name);
    let mut temp = NamedTempFile::new_in(dir).context("Failed to create temporary file")?;
    temp.write_all(bytes).context("Failed to write downloaded data")?;
    temp.persist(&target)
        .with_context(|| format!("Failed to save {}", target.display()))?;

    Ok(target)
}

/// Try each candidate URL once and save the first acceptable payload.
pub fn probe(options: &FetchOptions) -> Result<FetchOutcome> {
    let client = Client::builder()
        .timeout(options.timeout)
        .user_agent(options.user_agent.as_str())
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .context("Failed to build HTTP client")?;

    let progress_bar = if options.show_progress {
        let pb = ProgressBar::new(options.urls.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut attempts = Vec::with_capacity(options.urls.len());

    for url in &options.urls {
        if let Some(ref pb) = progress_bar {
            pb.set_message(url.clone());
        }
        debug!("Trying {}", url);

        let response = match client.get(url).send() {
            Ok(response) => response,
            Err(e) => {
                warn!("{}: {}", url, e);
                attempts.push(Attempt {
                    url: url.clone(),
                    status: AttemptStatus::Failed {
                        reason: e.to_string(),
                    },
                });
                if let Some(ref pb) = progress_bar {
                    pb.inc(1);
                }
                continue;
            }
        };

        let code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        // Only read the body when the status is usable.
        let (status, body) = if (200..300).contains(&code) {
            match response.bytes() {
                Ok(body) => (
                    evaluate_response(code, body.len() as u64, options.min_bytes),
                    Some(body),
                ),
                Err(e) => (
                    AttemptStatus::Failed {
                        reason: e.to_string(),
                    },
                    None,
                ),
            }
        } else {
            (evaluate_response(code, 0, options.min_bytes), None)
        };

        if let Some(ref pb) = progress_bar {
            pb.inc(1);
        }

        if let (AttemptStatus::Accepted { bytes }, Some(body)) = (&status, body.as_ref()) {
            let name = format!(
                "{}.{}",
                options.output_stem,
                extension_for(content_type.as_deref(), url)
            );
            let saved_to = save_atomically(&options.output_dir, &name, body)?;

            if let Some(ref pb) = progress_bar {
                pb.finish_with_message("Download complete");
            }
            info!("Saved {} bytes from {} to {}", bytes, url, saved_to.display());

            return Ok(FetchOutcome::Fetched {
                url: url.clone(),
                bytes: *bytes,
                content_type,
                saved_to,
            });
        }

        warn!("{}: {}", url, status);
        attempts.push(Attempt {
            url: url.clone(),
            status,
        });
    }

    if let Some(pb) = progress_bar {
        pb.finish_with_message("No candidate succeeded");
    }

    Ok(FetchOutcome::ManualInterventionRequired { attempts })
}

/// Operator steps for downloading the data file by hand.
pub fn manual_instructions(portal_url: &str, input_path: &str) -> String {
    let mut text = String::new();
    text.push_str("Manual download required:\n");
    text.push_str(&format!("  1. Visit {}\n", portal_url));
    text.push_str("  2. Download the public data file (CSV format)\n");
    text.push_str(&format!("  3. Save it as: {}\n", input_path));
    text.push_str("  4. Run: surveytally analyze\n");
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_response() {
        assert_eq!(
            evaluate_response(200, 50_000, 10_000),
            AttemptStatus::Accepted { bytes: 50_000 }
        );
        assert_eq!(
            evaluate_response(200, 10_000, 10_000),
            AttemptStatus::TooSmall { bytes: 10_000 }
        );
        assert_eq!(
            evaluate_response(404, 50_000, 10_000),
            AttemptStatus::BadStatus { status: 404 }
        );
        assert_eq!(
            evaluate_response(302, 50_000, 10_000),
            AttemptStatus::BadStatus { status: 302 }
        );
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(
            extension_for(
                Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
                "https://example.org/download"
            ),
            "xlsx"
        );
        assert_eq!(
            extension_for(Some("application/vnd.ms-excel"), "https://example.org/x"),
            "xlsx"
        );
        assert_eq!(extension_for(None, "https://example.org/data.XLSX"), "xlsx");
        assert_eq!(extension_for(Some("text/csv"), "https://example.org/data.csv"), "csv");
        assert_eq!(extension_for(None, "https://example.org/data"), "csv");
    }

    #[test]
    fn test_save_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("data");

        let path = save_atomically(&nested, "file.csv", b"a,b\n1,2\n").unwrap();

        assert_eq!(path, nested.join("file.csv"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n1,2\n");
        // Only the persisted file remains.
        assert_eq!(std::fs::read_dir(&nested).unwrap().count(), 1);
    }

    #[test]
    fn test_unreachable_candidate_requires_manual_step() {
        let dir = tempfile::tempdir().unwrap();
        let options = FetchOptions {
            urls: vec!["http://127.0.0.1:1/missing.csv".to_string()],
            min_bytes: 10,
            timeout: Duration::from_secs(2),
            user_agent: "test".to_string(),
            output_dir: dir.path().to_path_buf(),
            output_stem: "data".to_string(),
            show_progress: false,
        };

        match probe(&options).unwrap() {
            FetchOutcome::ManualInterventionRequired { attempts } => {
                assert_eq!(attempts.len(), 1);
                assert!(matches!(attempts[0].status, AttemptStatus::Failed { .. }));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    /// Serve `routes` (path, content type, body) once each on a local port.
    fn serve(routes: Vec<(&'static str, &'static str, Vec<u8>)>) -> String {
        use std::io::{BufRead, BufReader};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let expected = routes.len();

        std::thread::spawn(move || {
            for stream in listener.incoming().take(expected) {
                let mut stream = stream.unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());

                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                let path = request_line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("/")
                    .to_string();
                loop {
                    let mut header = String::new();
                    if reader.read_line(&mut header).unwrap() == 0 || header == "\r\n" {
                        break;
                    }
                }

                let (status, content_type, body) = match routes.iter().find(|r| r.0 == path) {
                    Some((_, content_type, body)) => ("200 OK", *content_type, body.clone()),
                    None => ("404 Not Found", "text/plain", b"missing".to_vec()),
                };
                let head = format!(
                    "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\
                     Connection: close\r\n\r\n",
                    status,
                    content_type,
                    body.len()
                );
                stream.write_all(head.as_bytes()).unwrap();
                stream.write_all(&body).unwrap();
                stream.flush().unwrap();
            }
        });

        base
    }

    #[test]
    fn test_fetch_saves_first_acceptable_payload() {
        let base = serve(vec![
            ("/a", "text/html", b"<html>too small</html>".to_vec()),
            ("/b", "application/vnd.ms-excel", vec![b'x'; 50]),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let options = FetchOptions {
            urls: vec![
                format!("{}/a", base),
                format!("{}/b", base),
                // Never requested once /b is accepted.
                "http://127.0.0.1:1/never.csv".to_string(),
            ],
            min_bytes: 30,
            timeout: Duration::from_secs(5),
            user_agent: "test".to_string(),
            output_dir: dir.path().to_path_buf(),
            output_stem: "data".to_string(),
            show_progress: false,
        };

        match probe(&options).unwrap() {
            FetchOutcome::Fetched {
                url,
                bytes,
                content_type,
                saved_to,
            } => {
                assert_eq!(url, format!("{}/b", base));
                assert_eq!(bytes, 50);
                assert_eq!(content_type.as_deref(), Some("application/vnd.ms-excel"));
                assert_eq!(saved_to, dir.path().join("data.xlsx"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        assert_eq!(std::fs::read(dir.path().join("data.xlsx")).unwrap(), vec![b'x'; 50]);
        // Only the saved file remains; the rejected body was never written.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_manual_instructions() {
        let text = manual_instructions("https://example.org/portal", "data.csv");
        assert!(text.contains("Visit https://example.org/portal"));
        assert!(text.contains("Save it as: data.csv"));
    }

    #[test]
    fn test_attempt_status_display() {
        assert_eq!(AttemptStatus::BadStatus { status: 404 }.to_string(), "HTTP 404");
        assert_eq!(
            AttemptStatus::TooSmall { bytes: 512 }.to_string(),
            "only 512 bytes, likely an error page"
        );
    }
}
