//! Configuration loading for the front ends.
//!
//! Leading configuration flags (see `CONFIG_CLI_FLAGS`) are handed to
//! `ortho_config`; everything from the first other token onwards is parsed
//! by `clap` as the command.

use std::ffi::{OsStr, OsString};

use ragcli_config::Config;

use crate::AppError;

pub(crate) trait ConfigLoader {
    /// Loads configuration for the CLI.
    ///
    /// # Flag Ordering
    ///
    /// Configuration flags must appear before the subcommand. Later
    /// occurrences are parsed as command flags, which only `--socket` and
    /// `--output` accept.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Skip,
}

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_args(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

impl OrthoConfigLoader {
    fn process_config_flag(argument: &OsStr) -> FlagAction {
        let text = argument.to_string_lossy();
        if !text.starts_with("--") {
            return FlagAction::Skip;
        }

        let (flag, has_inline_value) = text
            .split_once('=')
            .map_or((&*text, false), |(flag, _)| (flag, true));
        if super::CONFIG_CLI_FLAGS.contains(&flag) {
            FlagAction::Include {
                needs_value: !has_inline_value,
            }
        } else {
            FlagAction::Skip
        }
    }
}

pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_start: usize,
}

/// Separates the leading configuration flags from the command tokens.
///
/// The program name is kept as the first configuration argument.
pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let mut remaining = args.iter();
    let Some(program) = remaining.next() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_start: 0,
        };
    };

    let mut config_arguments = vec![program.clone()];
    let mut pending_value = false;
    for argument in remaining {
        if pending_value {
            config_arguments.push(argument.clone());
            pending_value = false;
            continue;
        }
        match OrthoConfigLoader::process_config_flag(argument) {
            FlagAction::Include { needs_value } => {
                config_arguments.push(argument.clone());
                pending_value = needs_value;
            }
            FlagAction::Skip => break,
        }
    }

    ConfigArgumentSplit {
        command_start: config_arguments.len(),
        config_arguments,
    }
}

/// Program name followed by the command tokens.
pub(crate) fn prepare_cli_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    args.first()
        .into_iter()
        .chain(args.get(split.command_start..).unwrap_or_default())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn os_args(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[rstest]
    #[case("--log-filter=debug", FlagAction::Include { needs_value: false })]
    #[case("--log-filter", FlagAction::Include { needs_value: true })]
    #[case("--socket", FlagAction::Include { needs_value: true })]
    #[case("health", FlagAction::Skip)]
    #[case("--unknown", FlagAction::Skip)]
    fn flags_are_classified(#[case] argument: &str, #[case] expected: FlagAction) {
        assert_eq!(
            OrthoConfigLoader::process_config_flag(OsStr::new(argument)),
            expected
        );
    }

    #[test]
    fn leading_config_flags_are_split_from_the_command() {
        let args = os_args(&[
            "ragadmin",
            "--socket",
            "/tmp/backend.sock",
            "--log-filter=debug",
            "sources",
            "list",
            "--socket",
            "/ignored",
        ]);
        let split = split_config_arguments(&args);

        assert_eq!(
            split.config_arguments,
            os_args(&["ragadmin", "--socket", "/tmp/backend.sock", "--log-filter=debug"])
        );
        assert_eq!(split.command_start, 4);
        assert_eq!(
            prepare_cli_arguments(&args, &split),
            os_args(&["ragadmin", "sources", "list", "--socket", "/ignored"])
        );
    }

    #[test]
    fn empty_arguments_split_cleanly() {
        let split = split_config_arguments(&[]);
        assert!(split.config_arguments.is_empty());
        assert!(prepare_cli_arguments(&[], &split).is_empty());
    }

    #[test]
    fn loader_without_flags_yields_built_in_defaults() {
        let config = OrthoConfigLoader
            .load(&os_args(&["ragadmin"]))
            .expect("configuration loads with no flags");

        config.validate().expect("defaults validate");
        assert_eq!(config.request_timeout(), ragcli_config::DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(
            config.stream_stall_timeout(),
            ragcli_config::DEFAULT_STREAM_STALL_TIMEOUT
        );
    }

    #[test]
    fn trailing_flag_without_value_stays_with_the_config() {
        let args = os_args(&["ragman", "--client-id"]);
        let split = split_config_arguments(&args);
        assert_eq!(split.config_arguments, args);
        assert_eq!(prepare_cli_arguments(&args, &split), os_args(&["ragman"]));
    }
}
