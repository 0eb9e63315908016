//! Credential resolution for the S3 and CloudFront clients.
//!
//! Resolution order:
//! 1. A named profile (`--profile` / `AWS_PROFILE`) from the shared credentials file
//! 2. `AWS_ACCESS_KEY_ID` + `AWS_SECRET_ACCESS_KEY` (+ `AWS_SESSION_TOKEN`)
//! 3. The `default` profile from the shared credentials file
//!
//! The shared credentials file is `AWS_SHARED_CREDENTIALS_FILE`, else
//! `$HOME/.aws/credentials`.

use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info};

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Resolve credentials, preferring `profile` when given.
pub fn resolve_credentials(profile: Option<&str>) -> Result<Credentials> {
    if let Some(profile) = profile.filter(|p| !p.is_empty()) {
        let path = shared_credentials_path()?;
        let creds = load_profile(&path, profile)?
            .ok_or_else(|| anyhow!("profile '{profile}' not found in {}", path.display()))?;
        info!(profile, "Using credentials from shared credentials profile");
        return Ok(creds);
    }

    if let Some(creds) = from_env() {
        info!("Using credentials from environment");
        return Ok(creds);
    }

    let path = shared_credentials_path()?;
    match load_profile(&path, "default")? {
        Some(creds) => {
            info!("Using credentials from default shared credentials profile");
            Ok(creds)
        }
        None => Err(anyhow!(
            "no AWS credentials found: set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY or use --profile"
        )),
    }
}

fn from_env() -> Option<Credentials> {
    let access_key_id = env::var("AWS_ACCESS_KEY_ID").ok().filter(|v| !v.is_empty())?;
    let secret_access_key = env::var("AWS_SECRET_ACCESS_KEY").ok().filter(|v| !v.is_empty())?;
    Some(Credentials {
        access_key_id,
        secret_access_key,
        session_token: env::var("AWS_SESSION_TOKEN").ok().filter(|v| !v.is_empty()),
    })
}

fn shared_credentials_path() -> Result<PathBuf> {
    if let Ok(path) = env::var("AWS_SHARED_CREDENTIALS_FILE") {
        return Ok(PathBuf::from(path));
    }
    let home = env::var("HOME").context("HOME is not set, cannot locate ~/.aws/credentials")?;
    Ok(PathBuf::from(home).join(".aws").join("credentials"))
}

fn load_profile(path: &PathBuf, profile: &str) -> Result<Option<Credentials>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(parse_profile(&contents, profile)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Shared credentials file does not exist");
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Read one profile out of an INI-style shared credentials file.
pub fn parse_profile(contents: &str, profile: &str) -> Option<Credentials> {
    let mut in_section = false;
    let mut access_key_id = None;
    let mut secret_access_key = None;
    let mut session_token = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_section = section.trim() == profile;
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().to_string();
            match key.trim() {
                "aws_access_key_id" => access_key_id = Some(value),
                "aws_secret_access_key" => secret_access_key = Some(value),
                "aws_session_token" => session_token = Some(value),
                _ => {}
            }
        }
    }

    Some(Credentials {
        access_key_id: access_key_id?,
        secret_access_key: secret_access_key?,
        session_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = "\
[default]
aws_access_key_id = AKIDDEFAULT
aws_secret_access_key = secret-default

# deploy account
[work-account]
aws_access_key_id=AKIDWORK
aws_secret_access_key=secret-work
aws_session_token=token-work
region = eu-west-1
";

    #[test]
    fn reads_named_profile() {
        let creds = parse_profile(FILE, "work-account").unwrap();
        assert_eq!(creds.access_key_id, "AKIDWORK");
        assert_eq!(creds.secret_access_key, "secret-work");
        assert_eq!(creds.session_token.as_deref(), Some("token-work"));
    }

    #[test]
    fn profiles_do_not_leak_into_each_other() {
        let creds = parse_profile(FILE, "default").unwrap();
        assert_eq!(creds.access_key_id, "AKIDDEFAULT");
        assert_eq!(creds.session_token, None);
    }

    #[test]
    fn missing_profile_or_fields_yield_none() {
        assert!(parse_profile(FILE, "nope").is_none());
        assert!(parse_profile("[x]\naws_access_key_id=only\n", "x").is_none());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let creds = parse_profile(FILE, "work-account").unwrap();
        let shown = format!("{creds:?}");
        assert!(!shown.contains("secret-work"));
        assert!(!shown.contains("token-work"));
    }
}
