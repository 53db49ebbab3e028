//! Job-start validation and resolution of the effective job description.
//!
//! # Design
//! - Runs before any filesystem access; every failure is a configuration error.
//! - The deprecated `overwrite` / `delete_in_advance` pair is translated once into a
//!   single [`Mode`]; nothing downstream sees the legacy flags.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use tracing::warn;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{DeleteInAdvancePolicy, JobSpec, Mode, OutputConfig};
use crate::sequence::SequenceFormat;
use crate::template::expand_time_template_at;

/// Translate the configured mode and the deprecated options into one effective mode.
///
/// # Errors
///
/// Returns [`ConfigError::ConflictingMode`] when a non-default `mode` is combined with
/// either deprecated option.
pub fn resolve_mode(
    mode: Option<Mode>,
    overwrite: Option<bool>,
    delete_in_advance: Option<DeleteInAdvancePolicy>,
) -> ConfigResult<Mode> {
    let configured = mode.unwrap_or_default();
    if overwrite.is_none() && delete_in_advance.is_none() {
        return Ok(configured);
    }

    if overwrite.is_some() {
        warn!("`overwrite` option is deprecated; use `mode` instead");
    }
    if delete_in_advance.is_some() {
        warn!("`delete_in_advance` option is deprecated; use `mode` instead");
    }
    if !configured.is_default() {
        return Err(ConfigError::ConflictingMode);
    }

    let resolved = match delete_in_advance {
        None | Some(DeleteInAdvancePolicy::None) => {
            if overwrite == Some(true) {
                Mode::Overwrite
            } else {
                Mode::AbortIfExist
            }
        }
        Some(DeleteInAdvancePolicy::FileOnly) => Mode::DeleteFilesInAdvance,
        Some(DeleteInAdvancePolicy::Recursive) => Mode::DeleteRecursiveInAdvance,
    };
    warn!(mode = %resolved, "selected mode for compatibility");
    Ok(resolved)
}

impl JobSpec {
    /// Validate a job document and resolve it against the current local time.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when any field is missing or invalid.
    pub fn resolve(config: OutputConfig) -> ConfigResult<Self> {
        Self::resolve_at(config, &Local::now())
    }

    /// Validate a job document and resolve time placeholders against `now`.
    ///
    /// # Errors
    ///
    /// See [`JobSpec::resolve`].
    pub fn resolve_at(config: OutputConfig, now: &DateTime<Local>) -> ConfigResult<Self> {
        if config.path_prefix.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "path_prefix",
            });
        }

        let mode = resolve_mode(config.mode, config.overwrite, config.delete_in_advance)?;
        let sequence_format = SequenceFormat::parse(&config.sequence_format)?;
        if !sequence_format.references_both_slots() {
            warn!(
                sequence_format = %sequence_format,
                "sequence format does not reference both the task index and the file counter; output paths may collide"
            );
        }

        if config.retry.limit == 0 {
            return Err(ConfigError::InvalidField {
                field: "retry.limit",
                value: Some("0".to_string()),
                reason: "must allow at least one attempt",
            });
        }

        if mode == Mode::Replace {
            validate_replace(&config, &sequence_format)?;
        }

        let path_prefix = expand_time_template_at(&config.path_prefix, config.rewind_seconds, now)?;

        Ok(Self {
            path_prefix,
            file_ext: config.file_ext,
            sequence_format,
            mode,
            workspace: PathBuf::from(config.workspace),
            connection: config.connection,
            retry: config.retry,
        })
    }
}

fn validate_replace(config: &OutputConfig, sequence_format: &SequenceFormat) -> ConfigResult<()> {
    if sequence_format.contains_separator() {
        return Err(ConfigError::InvalidField {
            field: "sequence_format",
            value: Some(sequence_format.to_string()),
            reason: "must not include `/` in replace mode",
        });
    }
    if config.workspace.trim().is_empty() {
        return Err(ConfigError::MissingField { field: "workspace" });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConnectionSettings, RetrySettings};

    type TestResult<T> = anyhow::Result<T>;

    fn base_config() -> OutputConfig {
        OutputConfig {
            path_prefix: "/out/data_".to_string(),
            file_ext: "csv".to_string(),
            sequence_format: "%03d.%02d.".to_string(),
            rewind_seconds: 0,
            mode: None,
            overwrite: None,
            delete_in_advance: None,
            workspace: "/tmp".to_string(),
            connection: ConnectionSettings::default(),
            retry: RetrySettings::default(),
        }
    }

    #[test]
    fn mode_passes_through_without_legacy_flags() -> TestResult<()> {
        assert_eq!(resolve_mode(None, None, None)?, Mode::AbortIfExist);
        assert_eq!(resolve_mode(Some(Mode::Replace), None, None)?, Mode::Replace);
        Ok(())
    }

    #[test]
    fn legacy_flags_translate_to_modes() -> TestResult<()> {
        assert_eq!(resolve_mode(None, Some(true), None)?, Mode::Overwrite);
        assert_eq!(resolve_mode(None, Some(false), None)?, Mode::AbortIfExist);
        assert_eq!(
            resolve_mode(None, Some(true), Some(DeleteInAdvancePolicy::None))?,
            Mode::Overwrite
        );
        assert_eq!(
            resolve_mode(None, None, Some(DeleteInAdvancePolicy::None))?,
            Mode::AbortIfExist
        );
        assert_eq!(
            resolve_mode(None, Some(false), Some(DeleteInAdvancePolicy::FileOnly))?,
            Mode::DeleteFilesInAdvance
        );
        assert_eq!(
            resolve_mode(
                Some(Mode::AbortIfExist),
                None,
                Some(DeleteInAdvancePolicy::Recursive)
            )?,
            Mode::DeleteRecursiveInAdvance
        );
        Ok(())
    }

    #[test]
    fn legacy_flags_conflict_with_explicit_mode() {
        let result = resolve_mode(Some(Mode::Replace), Some(true), None);
        assert!(matches!(result, Err(ConfigError::ConflictingMode)));
    }

    #[test]
    fn resolve_builds_spec_and_sample_path() -> TestResult<()> {
        let spec = JobSpec::resolve(base_config())?;
        assert_eq!(spec.path_prefix(), "/out/data_");
        assert_eq!(spec.mode(), Mode::AbortIfExist);
        assert_eq!(spec.sample_path(), "/out/data_000.00.csv");
        assert_eq!(spec.sequence_format().render(1, 0), "001.00.");
        Ok(())
    }

    #[test]
    fn resolve_rejects_empty_prefix() {
        let config = OutputConfig {
            path_prefix: "  ".to_string(),
            ..base_config()
        };
        assert!(matches!(
            JobSpec::resolve(config),
            Err(ConfigError::MissingField {
                field: "path_prefix"
            })
        ));
    }

    #[test]
    fn resolve_rejects_separator_in_replace_mode() -> TestResult<()> {
        let config = OutputConfig {
            sequence_format: "%03d/%02d.".to_string(),
            mode: Some(Mode::Replace),
            ..base_config()
        };
        assert!(matches!(
            JobSpec::resolve(config),
            Err(ConfigError::InvalidField {
                field: "sequence_format",
                ..
            })
        ));

        let other_mode = OutputConfig {
            sequence_format: "%03d/%02d.".to_string(),
            mode: Some(Mode::Overwrite),
            ..base_config()
        };
        assert_eq!(JobSpec::resolve(other_mode)?.mode(), Mode::Overwrite);
        Ok(())
    }

    #[test]
    fn resolve_rejects_zero_retry_limit() {
        let config = OutputConfig {
            retry: RetrySettings {
                limit: 0,
                ..RetrySettings::default()
            },
            ..base_config()
        };
        assert!(matches!(
            JobSpec::resolve(config),
            Err(ConfigError::InvalidField {
                field: "retry.limit",
                ..
            })
        ));
    }
}
