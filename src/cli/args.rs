use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::utils::{Error, Result};

#[derive(Parser, Debug)]
#[command(author, version, about)]
#[command(name = "vr180-prep")]
#[command(about = "Pairs, calibrates and merges dual-fisheye VR180 footage from a two-camera rig")]
#[command(long_about = "
Prepares footage from a two-camera VR180 fisheye rig for viewing. Scans a
directory of recordings, matches left/right files of the same take by filename
marker and creation time, drives an interactive per-pair alignment session with
live preview frames, and merges calibrated pairs into side-by-side (optionally
equirectangular) output files.

EXAMPLES:
  # Inspect which files pair up before touching anything
  vr180-prep pairs ~/Footage/raw/

  # Calibrate every matched pair interactively
  vr180-prep calibrate ~/Footage/raw/

  # Calibrate only pairs without a stored record
  vr180-prep calibrate ~/Footage/raw/ --skip-calibrated

  # Merge calibrated pairs into per-day folders under the egress directory
  vr180-prep merge ~/Footage/raw/ ~/Footage/merged/

  # Merge without the per-day folders
  vr180-prep merge ~/Footage/raw/ ~/Footage/merged/ --flat
")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<CliCommand>,

    /// Configuration file path
    #[arg(long, global = true, default_value = "config.yaml", value_name = "FILE")]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Interactively align each matched pair and store the result
    Calibrate {
        /// Directory scanned recursively for camera files
        #[arg(value_name = "INGRESS")]
        ingress: PathBuf,

        /// Leave pairs that already have a stored calibration untouched
        #[arg(long)]
        skip_calibrated: bool,
    },

    /// Merge matched pairs into single VR180 files
    Merge {
        /// Directory scanned recursively for camera files
        #[arg(value_name = "INGRESS")]
        ingress: PathBuf,

        /// Directory receiving the merged files
        #[arg(value_name = "EGRESS")]
        egress: PathBuf,

        /// Write merged files directly into the egress directory
        #[arg(long)]
        flat: bool,
    },

    /// List the pairs the matcher would form
    Pairs {
        /// Directory scanned recursively for camera files
        #[arg(value_name = "INGRESS")]
        ingress: PathBuf,
    },

    /// Validate the configuration file
    ValidateConfig,
}

impl CliArgs {
    pub fn get_log_level<'a>(&self, config_level: &'a str) -> &'a str {
        if self.debug {
            "debug"
        } else {
            // Use config level if debug flag is not set
            config_level
        }
    }

    pub fn should_use_color(&self) -> bool {
        !self.no_color
    }

    pub fn validate(&self) -> Result<()> {
        match &self.command {
            Some(CliCommand::Calibrate { ingress, .. })
            | Some(CliCommand::Pairs { ingress }) => ensure_exists(ingress),
            // The egress directory is created on demand; only the scan root
            // has to exist up front.
            Some(CliCommand::Merge { ingress, .. }) => ensure_exists(ingress),
            // Config loading handles missing files with fallbacks.
            Some(CliCommand::ValidateConfig) | None => Ok(()),
        }
    }
}

fn ensure_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::validation(format!(
            "Input path does not exist: {}",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_subcommand_parses() {
        let args =
            CliArgs::try_parse_from(["vr180-prep", "merge", "/in", "/out", "--flat"]).unwrap();
        match args.command {
            Some(CliCommand::Merge {
                ingress,
                egress,
                flat,
            }) => {
                assert_eq!(ingress, PathBuf::from("/in"));
                assert_eq!(egress, PathBuf::from("/out"));
                assert!(flat);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_work_after_subcommand() {
        let args = CliArgs::try_parse_from([
            "vr180-prep",
            "calibrate",
            "/in",
            "--skip-calibrated",
            "--no-color",
        ])
        .unwrap();
        assert!(!args.should_use_color());
        assert!(matches!(
            args.command,
            Some(CliCommand::Calibrate {
                skip_calibrated: true,
                ..
            })
        ));
    }

    #[test]
    fn test_debug_flag_overrides_config_level() {
        let args = CliArgs::try_parse_from(["vr180-prep", "--debug", "pairs", "/in"]).unwrap();
        assert_eq!(args.get_log_level("warn"), "debug");

        let args = CliArgs::try_parse_from(["vr180-prep", "pairs", "/in"]).unwrap();
        assert_eq!(args.get_log_level("warn"), "warn");
    }

    #[test]
    fn test_no_subcommand_is_allowed() {
        let args = CliArgs::try_parse_from(["vr180-prep"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.config, PathBuf::from("config.yaml"));
    }
}
