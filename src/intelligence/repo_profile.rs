//! Phase 1 — clone+analyze (spec §4.4.1). Shallow-clones the target repo
//! into a scratch dir, then infers language, framework, exposed ports, env
//! vars, and Dockerfile/compose presence.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::error::{ClankerError, Result};
use crate::path_safety::normalize_under_root;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoProfile {
    pub repo_url: String,
    pub language: String,
    pub framework: Option<String>,
    pub ports: Vec<u16>,
    pub env_vars: Vec<String>,
    pub has_dockerfile: bool,
    pub has_compose: bool,
    pub dockerfile_path: Option<String>,
    pub file_tree: Vec<String>,
}

const LANGUAGE_MARKERS: &[(&str, &str)] = &[
    ("Cargo.toml", "rust"),
    ("package.json", "javascript"),
    ("go.mod", "go"),
    ("requirements.txt", "python"),
    ("pyproject.toml", "python"),
    ("pom.xml", "java"),
    ("build.gradle", "java"),
    ("Gemfile", "ruby"),
];

const FRAMEWORK_MARKERS: &[(&str, &str)] = &[
    ("next.config.js", "next.js"),
    ("next.config.ts", "next.js"),
    ("manage.py", "django"),
    ("artisan", "laravel"),
    ("Gemfile", "rails"),
];

/// Shallow-clones `repo_url` into a temp directory and inspects its tree.
/// The clone is scoped to a `TempDir` so it is cleaned up once this call
/// returns, regardless of success; all path joins are checked with
/// [`normalize_under_root`] so a crafted file tree inside the clone can't
/// walk the scanner outside the scratch directory.
pub async fn clone_and_analyze(repo_url: &str) -> Result<RepoProfile> {
    let scratch = TempDir::new().map_err(ClankerError::Io)?;
    clone_shallow(repo_url, scratch.path()).await?;
    analyze_tree(repo_url, scratch.path())
}

async fn clone_shallow(repo_url: &str, dest: &Path) -> Result<()> {
    let output = tokio::process::Command::new("git")
        .args(["clone", "--depth", "1", repo_url])
        .arg(dest)
        .output()
        .await?;

    if !output.status.success() {
        return Err(ClankerError::Capability {
            operation: "clone_repo".into(),
            message: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

fn analyze_tree(repo_url: &str, root: &Path) -> Result<RepoProfile> {
    let mut profile = RepoProfile { repo_url: repo_url.to_string(), ..Default::default() };
    let mut file_tree = Vec::new();

    for entry in WalkDir::new(root).max_depth(4).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_dir() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else { continue };
        if relative.components().any(|c| c.as_os_str() == ".git") {
            continue;
        }
        let relative_str = relative.to_string_lossy().to_string();
        file_tree.push(relative_str.clone());

        let file_name = entry.file_name().to_string_lossy().to_string();

        if file_name == "Dockerfile" {
            profile.has_dockerfile = true;
            profile.dockerfile_path = Some(relative_str.clone());
        }
        if file_name == "docker-compose.yml" || file_name == "docker-compose.yaml" {
            profile.has_compose = true;
        }

        if profile.language.is_empty()
            && let Some((_, lang)) = LANGUAGE_MARKERS.iter().find(|(marker, _)| *marker == file_name)
        {
            profile.language = lang.to_string();
        }
        if profile.framework.is_none()
            && let Some((_, framework)) = FRAMEWORK_MARKERS.iter().find(|(marker, _)| *marker == file_name)
        {
            profile.framework = Some(framework.to_string());
        }
    }

    if profile.language.is_empty() {
        profile.language = "unknown".to_string();
    }

    scan_key_files(root, &file_tree, &mut profile)?;
    profile.file_tree = file_tree;
    Ok(profile)
}

/// Scans the small set of files worth reading in full (Dockerfile, compose
/// file, `.env.example`) for listening ports and env var names.
fn scan_key_files(root: &Path, file_tree: &[String], profile: &mut RepoProfile) -> Result<()> {
    for candidate in file_tree {
        let name = Path::new(candidate).file_name().map(|n| n.to_string_lossy().to_string());
        let interesting = matches!(
            name.as_deref(),
            Some("Dockerfile") | Some("docker-compose.yml") | Some("docker-compose.yaml") | Some(".env.example")
        );
        if !interesting {
            continue;
        }

        let Ok(path) = normalize_under_root(root, Path::new(candidate)) else { continue };
        let Ok(contents) = std::fs::read_to_string(&path) else { continue };
        extract_ports(&contents, &mut profile.ports);
        extract_env_vars(&contents, &mut profile.env_vars);
    }
    Ok(())
}

fn extract_ports(contents: &str, ports: &mut Vec<u16>) {
    for line in contents.lines() {
        let line = line.trim();
        let candidate = if let Some(rest) = line.strip_prefix("EXPOSE ") {
            rest
        } else if line.starts_with('-') && line.contains(':') {
            // docker-compose port mapping, e.g. `- "8080:8080"`.
            line.trim_start_matches(['-', ' ', '"'])
        } else {
            continue
        };

        for token in candidate.split([':', ' ']) {
            let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
            if let Ok(port) = digits.parse::<u16>()
                && port > 0
                && !ports.contains(&port)
            {
                ports.push(port);
            }
        }
    }
}

fn extract_env_vars(contents: &str, env_vars: &mut Vec<String>) {
    for line in contents.lines() {
        let line = line.trim();
        let candidate = line
            .strip_prefix("ENV ")
            .or_else(|| line.strip_prefix("- "))
            .unwrap_or(line);
        let name: String = candidate.chars().take_while(|c| c.is_ascii_uppercase() || *c == '_').collect();
        if name.len() >= 2 && !env_vars.contains(&name) {
            env_vars.push(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn extracts_expose_port_from_dockerfile() {
        let mut ports = Vec::new();
        extract_ports("FROM node:20\nEXPOSE 8080\nCMD [\"node\", \"index.js\"]", &mut ports);
        assert_eq!(ports, vec![8080]);
    }

    #[test]
    fn extracts_env_names_from_dockerfile() {
        let mut vars = Vec::new();
        extract_env_vars("ENV PORT=8080\nENV DATABASE_URL=postgres://x", &mut vars);
        assert_eq!(vars, vec!["PORT".to_string(), "DATABASE_URL".to_string()]);
    }

    #[test]
    fn analyze_tree_detects_dockerfile_and_language() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM node:20\nEXPOSE 3000\n").unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();

        let profile = analyze_tree("https://example.com/repo.git", dir.path()).unwrap();
        assert!(profile.has_dockerfile);
        assert_eq!(profile.language, "javascript");
        assert_eq!(profile.dockerfile_path.as_deref(), Some("Dockerfile"));
    }
}
