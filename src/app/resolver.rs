//! URL classification
//!
//! Decomposes an input URL into one of the supported resource shapes and
//! derives the effective transfer URL. Classification is pure string work and
//! never touches the network.

use serde::{Deserialize, Serialize};
use url::{Origin, Url};

use crate::constants::github;
use crate::errors::{ResolveError, ResolveResult};

/// Shape of a remote resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceKind {
    /// Any http(s) URL outside GitHub, downloaded as-is
    DirectFile,
    /// `raw.githubusercontent.com/<user>/<repo>/<branch>/<path>`
    RawFile {
        user: String,
        repo: String,
        branch: String,
        path: String,
    },
    /// `github.com/<user>/<repo>/releases/download/<tag>[/<file>]`
    ReleaseFile {
        user: String,
        repo: String,
        tag: String,
        filename: Option<String>,
    },
    /// `github.com/<user>/<repo>/blob/<branch>/<path>`, rewritten to raw content
    RepoFile {
        user: String,
        repo: String,
        branch: String,
        path: String,
    },
    /// `github.com/<user>/<repo>`, fetched as a branch archive
    Repository {
        user: String,
        repo: String,
        branch: String,
    },
    /// Input that matches none of the above
    Unknown { reason: String },
}

impl ResourceKind {
    /// Short label for logs and CLI output
    pub fn label(&self) -> &'static str {
        match self {
            Self::DirectFile => "direct_file",
            Self::RawFile { .. } => "raw_file",
            Self::ReleaseFile { .. } => "release_file",
            Self::RepoFile { .. } => "repo_file",
            Self::Repository { .. } => "repository",
            Self::Unknown { .. } => "unknown",
        }
    }
}

/// A classified input URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSource {
    /// URL as given by the caller
    pub input: String,
    /// Detected shape
    pub kind: ResourceKind,
    /// URL the transfer should fetch (empty for unknown input)
    pub download_url: String,
}

impl ResolvedSource {
    /// Whether the download is a repository archive
    pub fn is_archive(&self) -> bool {
        matches!(self.kind, ResourceKind::Repository { .. })
    }

    /// Filename implied by the shape, if any
    pub fn suggested_filename(&self) -> Option<String> {
        match &self.kind {
            ResourceKind::Repository { repo, .. } => Some(format!("{repo}.zip")),
            _ => None,
        }
    }

    /// Directory names that mean a repository archive was already extracted
    pub fn extracted_dir_candidates(&self) -> Vec<String> {
        let ResourceKind::Repository { repo, branch, .. } = &self.kind else {
            return Vec::new();
        };

        let mut names = vec![format!("{repo}-{branch}")];
        for known in github::KNOWN_BRANCH_DIRS {
            let name = format!("{repo}-{known}");
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names.push(repo.clone());
        names
    }
}

/// Classifies input URLs
#[derive(Debug, Clone)]
pub struct UrlResolver {
    archive_branch: String,
    /// Base of generated archive URLs, without a trailing slash
    web_origin: String,
    /// Extra origin treated like github.com (mirrors, enterprise hosts)
    extra_origin: Option<Origin>,
}

impl Default for UrlResolver {
    fn default() -> Self {
        Self::new(github::DEFAULT_ARCHIVE_BRANCH)
    }
}

impl UrlResolver {
    /// Create a resolver that builds repository archives for `archive_branch`
    pub fn new(archive_branch: impl Into<String>) -> Self {
        Self {
            archive_branch: archive_branch.into(),
            web_origin: github::WEB_ORIGIN.to_string(),
            extra_origin: None,
        }
    }

    /// Serve GitHub web URLs from `origin` instead of github.com
    ///
    /// URLs on `origin` are classified like github.com links and repository
    /// archives are built against it. The default hosts keep classifying as
    /// before.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError` if `origin` is not an http(s) URL
    pub fn with_web_origin(mut self, origin: &str) -> ResolveResult<Self> {
        let parsed = Url::parse(origin.trim()).map_err(|e| ResolveError::InvalidUrl {
            url: origin.to_string(),
            error: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ResolveError::UnsupportedScheme {
                url: origin.to_string(),
                scheme: parsed.scheme().to_string(),
            });
        }

        let origin = parsed.origin();
        self.web_origin = origin.ascii_serialization();
        self.extra_origin = Some(origin);
        Ok(self)
    }

    /// Classify `input`, recording failures as [`ResourceKind::Unknown`]
    pub fn classify(&self, input: &str) -> ResolvedSource {
        match self.decompose(input) {
            Ok((kind, download_url)) => ResolvedSource {
                input: input.to_string(),
                kind,
                download_url,
            },
            Err(e) => ResolvedSource {
                input: input.to_string(),
                kind: ResourceKind::Unknown {
                    reason: e.to_string(),
                },
                download_url: String::new(),
            },
        }
    }

    /// Classify `input`, returning an error for unknown shapes
    ///
    /// # Errors
    ///
    /// Returns `ResolveError` for malformed, non-http or unrecognized URLs
    pub fn resolve(&self, input: &str) -> ResolveResult<ResolvedSource> {
        let (kind, download_url) = self.decompose(input)?;
        Ok(ResolvedSource {
            input: input.to_string(),
            kind,
            download_url,
        })
    }

    fn decompose(&self, input: &str) -> ResolveResult<(ResourceKind, String)> {
        let trimmed = input.trim();
        let url = Url::parse(trimmed).map_err(|e| ResolveError::InvalidUrl {
            url: input.to_string(),
            error: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ResolveError::UnsupportedScheme {
                url: input.to_string(),
                scheme: url.scheme().to_string(),
            });
        }

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let parts: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        if host == github::RAW_HOST {
            return Self::raw_file(input, trimmed, &parts);
        }
        if github::WEB_HOSTS.contains(&host.as_str())
            || self.extra_origin.as_ref() == Some(&url.origin())
        {
            return self.github_path(input, trimmed, &parts);
        }

        Ok((ResourceKind::DirectFile, trimmed.to_string()))
    }

    fn raw_file(input: &str, url: &str, parts: &[&str]) -> ResolveResult<(ResourceKind, String)> {
        if parts.len() < 4 {
            return Err(unrecognized(input, "raw content URL needs user, repo, branch and path"));
        }
        let kind = ResourceKind::RawFile {
            user: parts[0].to_string(),
            repo: parts[1].to_string(),
            branch: parts[2].to_string(),
            path: parts[3..].join("/"),
        };
        Ok((kind, url.to_string()))
    }

    fn github_path(
        &self,
        input: &str,
        url: &str,
        parts: &[&str],
    ) -> ResolveResult<(ResourceKind, String)> {
        if parts.len() < 2 {
            return Err(unrecognized(input, "Unable to parse GitHub URL"));
        }
        let user = parts[0].to_string();
        let repo = parts[1].trim_end_matches(".git").to_string();

        if parts.len() >= 5 && parts[2] == "releases" && parts[3] == "download" {
            let kind = ResourceKind::ReleaseFile {
                user,
                repo,
                tag: parts[4].to_string(),
                filename: parts.get(5).map(|s| s.to_string()),
            };
            return Ok((kind, url.to_string()));
        }

        if parts.len() >= 5 && parts[2] == "blob" {
            let branch = parts[3].to_string();
            let path = parts[4..].join("/");
            let raw = format!(
                "https://{}/{}/{}/{}/{}",
                github::RAW_HOST,
                user,
                repo,
                branch,
                path
            );
            return Ok((ResourceKind::RepoFile { user, repo, branch, path }, raw));
        }

        let archive = format!(
            "{}/{}/{}/archive/refs/heads/{}.zip",
            self.web_origin, user, repo, self.archive_branch
        );
        let kind = ResourceKind::Repository {
            user,
            repo,
            branch: self.archive_branch.clone(),
        };
        Ok((kind, archive))
    }
}

fn unrecognized(input: &str, reason: &str) -> ResolveError {
    ResolveError::Unrecognized {
        url: input.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_asset_keeps_input_url() {
        let url = "https://github.com/acme/models/releases/download/v1.0/model.bin";
        let source = UrlResolver::default().resolve(url).unwrap();

        assert_eq!(source.download_url, url);
        assert_eq!(
            source.kind,
            ResourceKind::ReleaseFile {
                user: "acme".to_string(),
                repo: "models".to_string(),
                tag: "v1.0".to_string(),
                filename: Some("model.bin".to_string()),
            }
        );
    }

    #[test]
    fn test_blob_link_is_rewritten_to_raw_content() {
        let url = "https://github.com/acme/tools/blob/main/path/file.txt";
        let source = UrlResolver::default().resolve(url).unwrap();

        assert_eq!(source.kind.label(), "repo_file");
        assert_eq!(
            source.download_url,
            "https://raw.githubusercontent.com/acme/tools/main/path/file.txt"
        );
    }

    #[test]
    fn test_raw_content_url() {
        let url = "https://raw.githubusercontent.com/acme/tools/dev/a/b/c.json";
        let source = UrlResolver::default().resolve(url).unwrap();

        assert_eq!(source.download_url, url);
        match source.kind {
            ResourceKind::RawFile { branch, path, .. } => {
                assert_eq!(branch, "dev");
                assert_eq!(path, "a/b/c.json");
            }
            other => panic!("unexpected kind: {other:?}"),
        }

        let short = UrlResolver::default().classify("https://raw.githubusercontent.com/acme/tools");
        assert_eq!(short.kind.label(), "unknown");
    }

    #[test]
    fn test_repository_becomes_branch_archive() {
        let source = UrlResolver::default()
            .resolve("https://github.com/acme/tools")
            .unwrap();

        assert!(source.is_archive());
        assert_eq!(
            source.download_url,
            "https://github.com/acme/tools/archive/refs/heads/main.zip"
        );
        assert_eq!(source.suggested_filename().as_deref(), Some("tools.zip"));
        assert_eq!(
            source.extracted_dir_candidates(),
            vec!["tools-main", "tools-master", "tools"]
        );

        let dev = UrlResolver::new("dev")
            .resolve("https://github.com/acme/tools.git")
            .unwrap();
        assert_eq!(
            dev.download_url,
            "https://github.com/acme/tools/archive/refs/heads/dev.zip"
        );
        assert_eq!(
            dev.extracted_dir_candidates(),
            vec!["tools-dev", "tools-main", "tools-master", "tools"]
        );
    }

    #[test]
    fn test_unclassifiable_inputs_are_unknown() {
        let resolver = UrlResolver::default();

        for input in ["not a url", "ftp://example.com/file", "https://github.com/acme"] {
            let source = resolver.classify(input);
            assert_eq!(source.kind.label(), "unknown", "input: {input}");
            assert!(source.download_url.is_empty());
            assert!(resolver.resolve(input).is_err());
        }

        assert!(matches!(
            resolver.resolve("ftp://example.com/file"),
            Err(ResolveError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn test_other_hosts_are_direct_files() {
        let url = "https://cdn.example.com/weights/model.safetensors";
        let source = UrlResolver::default().resolve(url).unwrap();
        assert_eq!(source.kind, ResourceKind::DirectFile);
        assert_eq!(source.download_url, url);
    }

    #[test]
    fn test_custom_web_origin() {
        let resolver = UrlResolver::default()
            .with_web_origin("http://127.0.0.1:8080/")
            .unwrap();

        let source = resolver.resolve("http://127.0.0.1:8080/acme/tools").unwrap();
        assert!(source.is_archive());
        assert_eq!(
            source.download_url,
            "http://127.0.0.1:8080/acme/tools/archive/refs/heads/main.zip"
        );

        // Same host on another port stays a plain file
        let other = resolver.resolve("http://127.0.0.1:9090/acme/tools").unwrap();
        assert_eq!(other.kind, ResourceKind::DirectFile);

        // github.com links are still recognized
        let github = resolver.resolve("https://github.com/acme/tools").unwrap();
        assert!(github.is_archive());

        assert!(UrlResolver::default().with_web_origin("ftp://mirror").is_err());
        assert!(UrlResolver::default().with_web_origin("not a url").is_err());
    }

    #[test]
    fn test_classification_is_idempotent() {
        let resolver = UrlResolver::default();
        let url = "https://github.com/acme/tools/blob/main/README.md";
        assert_eq!(resolver.classify(url), resolver.classify(url));
    }
}
