// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for trialrun.
//!
//! Configuration is read from `.config/trialrun.toml` in the workspace root (or an explicitly
//! specified file), layered on top of the [default config](TrialrunConfig::DEFAULT_CONFIG).
//! Runner settings are grouped into named profiles, obtained through
//! [`TrialrunConfig::profile`].

use crate::{
    errors::{ConfigParseError, ProfileNotFound},
    order::{OrderStrategy, RunSeed},
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use indexmap::IndexMap;
use serde::Deserialize;
use std::{collections::BTreeSet, num::NonZeroUsize, time::Duration};
use tracing::warn;

/// Overall configuration for trialrun.
#[derive(Clone, Debug)]
pub struct TrialrunConfig {
    workspace_root: Utf8PathBuf,
    default_profile: DefaultProfileImpl,
    other_profiles: IndexMap<String, CustomProfileImpl>,
    unknown_keys: BTreeSet<String>,
}

impl TrialrunConfig {
    /// The default location of the config within the workspace root.
    pub const CONFIG_PATH: &'static str = ".config/trialrun.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Workspace-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// The name of the default profile.
    pub const DEFAULT_PROFILE: &'static str = "default";

    /// Reads the config from the given file, or if not specified from `.config/trialrun.toml` in
    /// the workspace root.
    ///
    /// If no config file is specified and the workspace has no `.config/trialrun.toml`, the
    /// default config is used. Unknown keys are logged as warnings.
    pub fn from_sources(
        workspace_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let workspace_root = workspace_root.into();
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = workspace_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (deserialized, unknown_keys) = Self::build_and_deserialize_config(&builder)
            .map_err(|err| ConfigParseError::new(&config_file, err))?;

        if !unknown_keys.is_empty() {
            warn!(
                "ignoring unknown configuration keys in {config_file}: {}",
                unknown_keys.iter().cloned().collect::<Vec<_>>().join(", "),
            );
        }

        Self::from_deserialized(workspace_root, deserialized, unknown_keys)
            .map_err(|err| ConfigParseError::new(&config_file, err))
    }

    /// Returns the default config.
    pub fn default_config(workspace_root: impl Into<Utf8PathBuf>) -> Self {
        Self::from_sources_default(workspace_root.into())
    }

    /// Returns the profile with the given name, or an error if it isn't defined.
    pub fn profile(&self, name: impl AsRef<str>) -> Result<TrialrunProfile<'_>, ProfileNotFound> {
        let name = name.as_ref();
        let custom_profile = match self.other_profiles.get(name) {
            Some(profile) => Some(profile),
            None if name == Self::DEFAULT_PROFILE => None,
            None => {
                return Err(ProfileNotFound::new(name, self.all_profiles()));
            }
        };
        Ok(TrialrunProfile {
            name: name.to_owned(),
            workspace_root: &self.workspace_root,
            default_profile: &self.default_profile,
            custom_profile,
        })
    }

    /// Returns the names of all known profiles.
    pub fn all_profiles(&self) -> impl Iterator<Item = &str> + '_ {
        std::iter::once(Self::DEFAULT_PROFILE).chain(
            self.other_profiles
                .keys()
                .map(String::as_str)
                .filter(|name| *name != Self::DEFAULT_PROFILE),
        )
    }

    /// Configuration keys that were present in the config file but not recognized.
    pub fn unknown_keys(&self) -> &BTreeSet<String> {
        &self.unknown_keys
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn from_sources_default(workspace_root: Utf8PathBuf) -> Self {
        let built = Self::build_and_deserialize_config(&Self::make_default_config())
            .and_then(|(deserialized, unknown)| {
                Self::from_deserialized(workspace_root, deserialized, unknown)
            });
        match built {
            Ok(config) => config,
            Err(err) => panic!("default config is always valid: {err}"),
        }
    }

    fn from_deserialized(
        workspace_root: Utf8PathBuf,
        mut deserialized: TrialrunConfigDeserialize,
        unknown_keys: BTreeSet<String>,
    ) -> Result<Self, config::ConfigError> {
        let default_profile = deserialized
            .profiles
            .shift_remove(Self::DEFAULT_PROFILE)
            .ok_or_else(|| config::ConfigError::NotFound("profile.default".to_owned()))?;
        let default_profile = DefaultProfileImpl::new(default_profile)?;

        Ok(Self {
            workspace_root,
            default_profile,
            other_profiles: deserialized.profiles,
            unknown_keys,
        })
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(TrialrunConfigDeserialize, BTreeSet<String>), config::ConfigError> {
        let config = builder.build_cloned()?;

        let mut ignored = BTreeSet::new();
        let deserialized: TrialrunConfigDeserialize =
            serde_ignored::deserialize(config, |path: serde_ignored::Path| {
                ignored.insert(path.to_string());
            })?;

        Ok((deserialized, ignored))
    }
}

/// A named set of runner settings.
///
/// Settings that a custom profile leaves unset fall back to the default profile.
#[derive(Clone, Debug)]
pub struct TrialrunProfile<'cfg> {
    name: String,
    workspace_root: &'cfg Utf8Path,
    default_profile: &'cfg DefaultProfileImpl,
    custom_profile: Option<&'cfg CustomProfileImpl>,
}

impl<'cfg> TrialrunProfile<'cfg> {
    /// The name of the profile.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The ordering strategy for suites that don't declare one.
    pub fn order(&self) -> OrderStrategy {
        self.custom_profile
            .and_then(|profile| profile.order)
            .unwrap_or(self.default_profile.order)
    }

    /// The seed for random ordering, if configured.
    pub fn seed(&self) -> Option<RunSeed> {
        self.custom_profile
            .and_then(|profile| profile.seed)
            .or(self.default_profile.seed)
    }

    /// The period after which a running execution is reported as slow.
    pub fn slow_timeout(&self) -> Duration {
        self.custom_profile
            .and_then(|profile| profile.slow_timeout)
            .unwrap_or(self.default_profile.slow_timeout)
    }

    /// The number of root suites that may run concurrently.
    pub fn suite_threads(&self) -> NonZeroUsize {
        self.custom_profile
            .and_then(|profile| profile.suite_threads)
            .unwrap_or(self.default_profile.suite_threads)
    }

    /// Returns the JUnit configuration, if a JUnit path is set.
    pub fn junit(&self) -> Option<JunitConfig<'cfg>> {
        let custom = self.custom_profile.map(|profile| &profile.junit);
        let default = &self.default_profile.junit;

        let path = custom
            .and_then(|junit| junit.path.as_deref())
            .or(default.path.as_deref())?;
        let report_name = custom
            .and_then(|junit| junit.report_name.as_deref())
            .unwrap_or(&default.report_name);

        Some(JunitConfig {
            path: self.workspace_root.join(path),
            report_name,
        })
    }

    /// Returns a JUnit configuration that writes to `path` instead of the configured path.
    ///
    /// Relative paths are resolved against the workspace root. The report name still comes from
    /// the profile.
    pub fn junit_at(&self, path: &Utf8Path) -> JunitConfig<'cfg> {
        let report_name = self
            .custom_profile
            .and_then(|profile| profile.junit.report_name.as_deref())
            .unwrap_or(&self.default_profile.junit.report_name);
        JunitConfig {
            path: self.workspace_root.join(path),
            report_name,
        }
    }
}

/// JUnit configuration stored within a profile.
#[derive(Clone, Debug)]
pub struct JunitConfig<'cfg> {
    path: Utf8PathBuf,
    report_name: &'cfg str,
}

impl<'cfg> JunitConfig<'cfg> {
    /// Returns the absolute path to the JUnit report.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the name of the JUnit report.
    pub fn report_name(&self) -> &'cfg str {
        self.report_name
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TrialrunConfigDeserialize {
    #[serde(default, rename = "profile")]
    profiles: IndexMap<String, CustomProfileImpl>,
}

#[derive(Clone, Debug)]
struct DefaultProfileImpl {
    order: OrderStrategy,
    seed: Option<RunSeed>,
    slow_timeout: Duration,
    suite_threads: NonZeroUsize,
    junit: DefaultJunitImpl,
}

impl DefaultProfileImpl {
    fn new(p: CustomProfileImpl) -> Result<Self, config::ConfigError> {
        fn required<T>(value: Option<T>, key: &str) -> Result<T, config::ConfigError> {
            value.ok_or_else(|| config::ConfigError::NotFound(format!("profile.default.{key}")))
        }

        Ok(Self {
            order: required(p.order, "order")?,
            seed: p.seed,
            slow_timeout: required(p.slow_timeout, "slow-timeout")?,
            suite_threads: required(p.suite_threads, "suite-threads")?,
            junit: DefaultJunitImpl {
                path: p.junit.path,
                report_name: required(p.junit.report_name, "junit.report-name")?,
            },
        })
    }
}

#[derive(Clone, Debug)]
struct DefaultJunitImpl {
    path: Option<Utf8PathBuf>,
    report_name: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CustomProfileImpl {
    #[serde(default)]
    order: Option<OrderStrategy>,
    #[serde(default)]
    seed: Option<RunSeed>,
    #[serde(default, with = "humantime_serde")]
    slow_timeout: Option<Duration>,
    #[serde(default)]
    suite_threads: Option<NonZeroUsize>,
    #[serde(default)]
    junit: JunitImpl,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct JunitImpl {
    #[serde(default)]
    path: Option<Utf8PathBuf>,
    #[serde(default)]
    report_name: Option<String>,
}
