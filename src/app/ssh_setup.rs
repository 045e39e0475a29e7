//! Installs the SSH key pair used to reach a remote Ollama server.
//!
//! Key material is always supplied by the caller, from files or from the
//! `JARVIS_SSH_PRIVATE_KEY` / `JARVIS_SSH_PUBLIC_KEY` variables. The target
//! directory is created when absent, the private key is restricted to its
//! owner, and re-running with the same material leaves identical files.

use crate::utils::error::{JarvisError, Result};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const PRIVATE_KEY_ENV: &str = "JARVIS_SSH_PRIVATE_KEY";
pub const PUBLIC_KEY_ENV: &str = "JARVIS_SSH_PUBLIC_KEY";
pub const DEFAULT_KEY_NAME: &str = "id_rsa";

const PUBLIC_KEY_PREFIXES: [&str; 3] = ["ssh-", "ecdsa-", "sk-"];

/// `~/.ssh`, resolved from `HOME` or, on Windows, `USERPROFILE`.
pub fn default_ssh_dir() -> Result<PathBuf> {
    default_ssh_dir_from(|key| std::env::var(key).ok())
}

pub fn default_ssh_dir_from<F>(lookup: F) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    ["HOME", "USERPROFILE"]
        .iter()
        .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
        .map(|home| Path::new(&home).join(".ssh"))
        .ok_or_else(|| JarvisError::MissingConfigError {
            field: "HOME or USERPROFILE".to_string(),
        })
}

#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    private_key: String,
    public_key: String,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

impl KeyMaterial {
    pub fn new(private_key: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            private_key: private_key.into(),
            public_key: public_key.into(),
        }
    }

    pub fn from_files(private_key: &Path, public_key: &Path) -> Result<Self> {
        let material = Self::new(fs::read_to_string(private_key)?, fs::read_to_string(public_key)?);
        tracing::debug!(
            "Read key material from {} and {}",
            private_key.display(),
            public_key.display()
        );
        Ok(material)
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| JarvisError::MissingConfigError {
                    field: key.to_string(),
                })
        };
        Ok(Self::new(get(PRIVATE_KEY_ENV)?, get(PUBLIC_KEY_ENV)?))
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Private key must be PEM/OpenSSH armoured with a matching END line;
    /// the public key must be one line starting with a known algorithm.
    pub fn validate(&self) -> Result<()> {
        validate_private_key(&self.private_key)?;
        validate_public_key(&self.public_key)
    }
}

fn invalid(source_name: &str, reason: impl Into<String>) -> JarvisError {
    JarvisError::InvalidKeyMaterial {
        source_name: source_name.to_string(),
        reason: reason.into(),
    }
}

fn validate_private_key(key: &str) -> Result<()> {
    let mut lines = key.lines().map(str::trim).filter(|l| !l.is_empty());

    let first = lines.next().ok_or_else(|| invalid("private key", "key is empty"))?;
    let label = first
        .strip_prefix("-----BEGIN ")
        .and_then(|rest| rest.strip_suffix("-----"))
        .ok_or_else(|| invalid("private key", "missing '-----BEGIN ... PRIVATE KEY-----' header"))?;
    if !label.ends_with("PRIVATE KEY") {
        return Err(invalid("private key", format!("'{}' is not a private key", label)));
    }

    let footer = format!("-----END {}-----", label);
    let body: Vec<&str> = lines.collect();
    match body.split_last() {
        Some((last, payload)) if *last == footer && !payload.is_empty() => Ok(()),
        Some((last, _)) if *last == footer => Err(invalid("private key", "key body is empty")),
        _ => Err(invalid("private key", format!("missing '{}' footer", footer))),
    }
}

fn validate_public_key(key: &str) -> Result<()> {
    let line = key.trim_end_matches(['\r', '\n']);
    if line.contains('\n') {
        return Err(invalid("public key", "must be a single line"));
    }

    let mut parts = line.split_whitespace();
    let algorithm = parts.next().unwrap_or_default();
    if !PUBLIC_KEY_PREFIXES.iter().any(|p| algorithm.starts_with(p)) {
        return Err(invalid(
            "public key",
            format!("unknown key type '{}', expected ssh-*, ecdsa-* or sk-*", algorithm),
        ));
    }
    if parts.next().is_none() {
        return Err(invalid("public key", "missing base64 key data"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub dir: PathBuf,
    pub created_dir: bool,
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SshKeyInstaller {
    dir: PathBuf,
    key_name: String,
}

impl SshKeyInstaller {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            key_name: DEFAULT_KEY_NAME.to_string(),
        }
    }

    pub fn with_key_name(mut self, key_name: &str) -> Self {
        self.key_name = key_name.to_string();
        self
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.dir.join(&self.key_name)
    }

    pub fn public_key_path(&self) -> PathBuf {
        self.dir.join(format!("{}.pub", self.key_name))
    }

    pub fn install(&self, material: &KeyMaterial) -> Result<InstallReport> {
        material.validate()?;

        let created_dir = !self.dir.is_dir();
        if created_dir {
            fs::create_dir_all(&self.dir)?;
            tracing::info!("Created {}", self.dir.display());
        } else {
            tracing::debug!("{} already exists", self.dir.display());
        }

        let private_key_path = self.private_key_path();
        write_private_key(&private_key_path, material.private_key())?;
        restrict_to_owner(&private_key_path)?;
        tracing::info!("Private key written to {}", private_key_path.display());

        let public_key_path = self.public_key_path();
        fs::write(&public_key_path, material.public_key())?;
        tracing::info!("Public key written to {}", public_key_path.display());

        Ok(InstallReport {
            dir: self.dir.clone(),
            created_dir,
            private_key_path,
            public_key_path,
        })
    }
}

#[cfg(unix)]
fn write_private_key(path: &Path, content: &str) -> Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private_key(path: &Path, content: &str) -> Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// `mode` only applies to new files, so an existing key is narrowed here.
#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(windows)]
fn restrict_to_owner(path: &Path) -> Result<()> {
    let user = std::env::var("USERNAME").map_err(|_| JarvisError::MissingConfigError {
        field: "USERNAME".to_string(),
    })?;
    let target = path.display().to_string();
    let grant = format!("{}:(R,W)", user);

    run_icacls(&[target.as_str(), "/inheritance:r"])?;
    run_icacls(&[target.as_str(), "/grant:r", grant.as_str()])
}

#[cfg(windows)]
fn run_icacls(args: &[&str]) -> Result<()> {
    let output = std::process::Command::new("icacls")
        .args(args)
        .output()
        .map_err(|e| JarvisError::CommandError {
            command: "icacls".to_string(),
            message: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(JarvisError::CommandError {
            command: format!("icacls {}", args.join(" ")),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn restrict_to_owner(path: &Path) -> Result<()> {
    tracing::warn!("Cannot restrict permissions of {} on this platform", path.display());
    Ok(())
}
