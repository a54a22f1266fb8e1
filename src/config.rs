//! YAML build profiles.
//!
//! A profile is loaded with [`load_profile`], which fills unset backends
//! from the distro defaults; [`Profile::validate`] then rejects anything the
//! build could not carry out, before a working container is created.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::Display;
use url::Url;

use crate::backend::Backends;
use crate::container::ClearConfig;
use crate::container::buildah::StorageOptions;
use crate::distro::Distro;
use crate::error::RsocistrapError;
use crate::user::CreateUserOptions;

/// Annotation key carrying the digest of the profile file.
pub const SPEC_DIGEST_ANNOTATION: &str = "org.rsocistrap.spec.digest";

const MAX_NAME_LENGTH: usize = 32;
const MIN_UID: u32 = 1000;
const MAX_UID: u32 = 60000;

static POSIX_PORTABLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Za-z]$|^[0-9A-Za-z][-._0-9A-Za-z]*[0-9A-Za-z]$").expect("valid regex")
});

static ALL_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("valid regex"));

static REVERSE_DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\.?([0-9A-Za-z]|[0-9A-Za-z][-0-9A-Za-z]*[0-9A-Za-z]\.)*[0-9A-Za-z]$")
        .expect("valid regex")
});

static REPOSITORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([0-9A-Za-z.-]+(:[0-9]+)?/)?[0-9a-z]+([._-][0-9a-z]+)*(/[0-9a-z]+([._-][0-9a-z]+)*)*$",
    )
    .expect("valid regex")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z_][0-9A-Za-z_.-]{0,127}$").expect("valid regex"));

static DIGEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+([+._-][a-z0-9]+)*:[0-9A-Fa-f]{32,}$").expect("valid regex")
});

fn default_tag() -> String {
    "latest".to_string()
}

/// The image being built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageSpec {
    pub repository: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Keep per-step layers and timestamps instead of squashing.
    #[serde(default)]
    pub keep_history: bool,
}

impl ImageSpec {
    /// `repository:tag`
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

/// The base image the working container is created from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaseImage {
    pub repository: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub digest: Option<String>,
}

impl BaseImage {
    /// `repository[:tag][@digest]`
    pub fn reference(&self) -> String {
        let mut reference = self.repository.clone();
        if let Some(tag) = &self.tag {
            reference.push(':');
            reference.push_str(tag);
        }
        if let Some(digest) = &self.digest {
            reference.push('@');
            reference.push_str(digest);
        }
        reference
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSpec {
    /// Upgrade packages that ship with the base image.
    #[serde(default)]
    pub upgrade: bool,
    #[serde(default)]
    pub install: Vec<String>,
    /// Remove package caches after installing.
    #[serde(default)]
    pub clean: bool,
}

/// The sole unprivileged user of the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserSpec {
    pub name: String,
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub user_group: bool,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub create_home: bool,
    /// Shell name or path; resolved in the container when it is not the
    /// distro default.
    #[serde(default)]
    pub login_shell: Option<String>,
}

impl UserSpec {
    /// Creation options, without the login shell (resolved at build time).
    pub fn create_options(&self) -> CreateUserOptions {
        CreateUserOptions {
            id: self.id,
            comment: self.comment.clone(),
            user_group: self.user_group,
            groups: self.groups.clone(),
            create_home: self.create_home,
            login_shell: None,
        }
    }
}

/// Files copied from a host directory into the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyRule {
    /// Absolute host directory the sources are relative to.
    pub base: Utf8PathBuf,
    /// Absolute destination in the image.
    pub dest: String,
    pub srcs: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    /// Octal permission bits, e.g. `"0644"`.
    #[serde(default)]
    pub mode: Option<String>,
    /// `user[:group]`
    #[serde(default)]
    pub owner: Option<String>,
    /// Strip setuid and setgid bits from the copied files.
    #[serde(default)]
    pub remove_s: bool,
}

impl CopyRule {
    pub fn mode_bits(&self) -> Result<Option<u32>, RsocistrapError> {
        let Some(mode) = &self.mode else {
            return Ok(None);
        };
        let digits = mode.strip_prefix("0o").unwrap_or(mode);
        match u32::from_str_radix(digits, 8) {
            Ok(bits) if bits <= 0o7777 => Ok(Some(bits)),
            _ => Err(RsocistrapError::Validation(format!(
                "invalid mode {:?} in copy rule for {}",
                mode, self.dest
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecialFilesSpec {
    /// Remove setuid and setgid bits from every file outside /home.
    #[serde(default)]
    pub remove_s: bool,
    /// Absolute paths that keep their bits.
    #[serde(default)]
    pub excludes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecuritySpec {
    #[serde(default)]
    pub special_files: SpecialFilesSpec,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    #[default]
    #[serde(alias = "TCP")]
    Tcp,
    #[serde(alias = "UDP")]
    Udp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortSpec {
    pub number: u16,
    #[serde(default)]
    pub protocol: Protocol,
}

impl std::fmt::Display for PortSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.number, self.protocol)
    }
}

/// OCI image configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageConfigSpec {
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub cmd: Option<Vec<String>>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub entrypoint: Option<Vec<String>>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub ports: Vec<PortSpec>,
    #[serde(default)]
    pub work_dir: Option<String>,
    /// Inherited settings to discard first.
    #[serde(default)]
    pub clear: ClearConfig,
}

/// A complete build profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    pub distro: Distro,
    pub image: ImageSpec,
    pub from: BaseImage,
    #[serde(default)]
    pub backends: Backends,
    #[serde(default)]
    pub packages: PackageSpec,
    #[serde(default)]
    pub user: Option<UserSpec>,
    #[serde(default)]
    pub copy: Vec<CopyRule>,
    #[serde(default)]
    pub security: SecuritySpec,
    #[serde(default)]
    pub config: ImageConfigSpec,
    #[serde(default)]
    pub storage: StorageOptions,
}

impl Profile {
    /// Parses a profile from YAML and fills distro defaults.
    pub fn from_yaml(text: &str) -> Result<Self, RsocistrapError> {
        let mut profile: Profile =
            serde_yaml::from_str(text).map_err(|e| RsocistrapError::Config(e.to_string()))?;
        profile.fill();
        Ok(profile)
    }

    /// Replaces unset backends with the distro defaults.
    pub fn fill(&mut self) {
        self.backends.fill(self.distro);
    }

    /// Paths excluded from the special-file sweep.
    pub fn special_file_excludes(&self) -> BTreeSet<String> {
        self.security.special_files.excludes.iter().cloned().collect()
    }

    pub fn validate(&self) -> Result<(), RsocistrapError> {
        self.backends.validate()?;
        self.validate_images()?;
        self.validate_packages()?;
        if let Some(user) = &self.user {
            validate_user(user)?;
        }
        for rule in &self.copy {
            validate_copy_rule(rule)?;
        }
        for path in &self.security.special_files.excludes {
            if !path.starts_with('/') {
                return Err(RsocistrapError::Validation(format!(
                    "special file exclude must be an absolute path: {}",
                    path
                )));
            }
        }
        validate_image_config(&self.config)
    }

    fn validate_images(&self) -> Result<(), RsocistrapError> {
        if self.image.repository.is_empty() {
            return Err(RsocistrapError::Validation("missing image repository".to_string()));
        }
        if !REPOSITORY.is_match(&self.image.repository) {
            return Err(RsocistrapError::Validation(format!(
                "invalid image repository '{}'",
                self.image.repository
            )));
        }
        if !TAG.is_match(&self.image.tag) {
            return Err(RsocistrapError::Validation(format!(
                "invalid image tag '{}'",
                self.image.tag
            )));
        }

        let from = &self.from;
        if from.repository.is_empty() || (from.tag.is_none() && from.digest.is_none()) {
            return Err(RsocistrapError::Validation(
                "missing base image repository or tag/digest".to_string(),
            ));
        }
        if !REPOSITORY.is_match(&from.repository) {
            return Err(RsocistrapError::Validation(format!(
                "invalid base image repository '{}'",
                from.repository
            )));
        }
        if let Some(tag) = &from.tag
            && !TAG.is_match(tag)
        {
            return Err(RsocistrapError::Validation(format!("invalid base image tag '{}'", tag)));
        }
        if let Some(digest) = &from.digest
            && !DIGEST.is_match(digest)
        {
            return Err(RsocistrapError::Validation(format!(
                "invalid base image digest '{}'",
                digest
            )));
        }
        Ok(())
    }

    fn validate_packages(&self) -> Result<(), RsocistrapError> {
        let backend = self.backends.package;
        for package in &self.packages.install {
            if !backend.is_valid_package_name(package) {
                return Err(RsocistrapError::Validation(format!(
                    "invalid {} package name '{}'",
                    backend, package
                )));
            }
        }
        Ok(())
    }
}

fn validate_name(kind: &str, name: &str) -> Result<(), RsocistrapError> {
    if name.is_empty() {
        return Err(RsocistrapError::Validation(format!("{} name must not be empty", kind)));
    }
    if name == "root" {
        return Err(RsocistrapError::Validation(format!(
            "won't use {} name 'root' for an unprivileged user",
            kind
        )));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(RsocistrapError::Validation(format!(
            "{} name '{}' too long (limit: {} chars)",
            kind, name, MAX_NAME_LENGTH
        )));
    }
    if !POSIX_PORTABLE_NAME.is_match(name) || ALL_DIGITS.is_match(name) {
        return Err(RsocistrapError::Validation(format!("invalid {} name '{}'", kind, name)));
    }
    Ok(())
}

fn validate_user(user: &UserSpec) -> Result<(), RsocistrapError> {
    validate_name("user", &user.name)?;
    if user.id != 0 && !(MIN_UID..=MAX_UID).contains(&user.id) {
        return Err(RsocistrapError::Validation(format!(
            "UID {} outside allowed range [{}-{}]",
            user.id, MIN_UID, MAX_UID
        )));
    }
    for group in &user.groups {
        validate_name("group", group)?;
    }
    if let Some(comment) = &user.comment
        && comment.contains([':', '\n'])
    {
        return Err(RsocistrapError::Validation(format!(
            "user comment must not contain ':' or newlines: {:?}",
            comment
        )));
    }
    if user.login_shell.as_deref().is_some_and(|s| s.trim().is_empty()) {
        return Err(RsocistrapError::Validation("login shell must not be empty".to_string()));
    }
    Ok(())
}

fn validate_copy_rule(rule: &CopyRule) -> Result<(), RsocistrapError> {
    if !rule.base.is_absolute() {
        return Err(RsocistrapError::Validation(format!(
            "copy base must be an absolute path: {}",
            rule.base
        )));
    }
    if !rule.dest.starts_with('/') {
        return Err(RsocistrapError::Validation(format!(
            "copy destination must be an absolute path: {}",
            rule.dest
        )));
    }
    if rule.srcs.is_empty() {
        return Err(RsocistrapError::Validation(format!(
            "copy rule for {} has no sources",
            rule.dest
        )));
    }
    for src in &rule.srcs {
        if src.is_empty() {
            return Err(RsocistrapError::Validation(format!(
                "copy rule for {} has an empty source",
                rule.dest
            )));
        }
        if Url::parse(src).is_ok_and(|u| u.scheme().len() > 1) {
            return Err(RsocistrapError::Validation(format!(
                "copy sources must be local paths, not URLs: {}",
                src
            )));
        }
    }
    rule.mode_bits()?;
    Ok(())
}

fn validate_image_config(config: &ImageConfigSpec) -> Result<(), RsocistrapError> {
    for key in config.annotations.keys() {
        if !REVERSE_DOMAIN.is_match(key) {
            return Err(RsocistrapError::Validation(format!("invalid annotation key '{}'", key)));
        }
    }
    for key in config.labels.keys() {
        if !REVERSE_DOMAIN.is_match(key) {
            return Err(RsocistrapError::Validation(format!("invalid label key '{}'", key)));
        }
    }
    for key in config.env.keys() {
        if key.is_empty() || key.contains('=') {
            return Err(RsocistrapError::Validation(format!(
                "invalid environment variable name '{}'",
                key
            )));
        }
    }
    if let Some(port) = config.ports.iter().find(|p| p.number == 0) {
        return Err(RsocistrapError::Validation(format!("invalid port {}", port)));
    }
    Ok(())
}

/// Returns `sha256:<hex>` over the raw profile bytes.
pub fn spec_digest(bytes: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(bytes))
}

/// A profile together with the digest of the file it was read from.
#[derive(Debug, Clone)]
pub struct LoadedProfile {
    pub profile: Profile,
    pub digest: String,
}

/// Reads, parses and fills the profile at `path`.
pub fn load_profile(path: &Utf8Path) -> Result<LoadedProfile> {
    let bytes = fs::read(path).map_err(|e| RsocistrapError::io(path.to_string(), e))?;
    let text = String::from_utf8(bytes.clone())
        .map_err(|e| RsocistrapError::Config(format!("{} is not valid UTF-8: {}", path, e)))?;
    let profile =
        Profile::from_yaml(&text).with_context(|| format!("failed to parse profile: {}", path))?;
    Ok(LoadedProfile {
        profile,
        digest: spec_digest(&bytes),
    })
}
