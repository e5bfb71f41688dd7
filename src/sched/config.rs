//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Errors produced while parsing scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The strategy name isn't one of the known strategies.
    #[error("unknown scheduling strategy `{0}`")]
    UnknownStrategy(String),

    /// The list pass policy name isn't one of the known policies.
    #[error("unknown list pass policy `{0}`")]
    UnknownPassPolicy(String),

    /// The option key isn't recognized.
    #[error("unknown scheduler option `{0}`")]
    UnknownOption(String),

    /// A boolean option got something other than `true`/`false`.
    #[error("option `{option}` expects `true` or `false`, got `{value}`")]
    InvalidBool {
        /// The option being set
        option: String,
        /// The value it was given
        value: String,
    },

    /// An option wasn't written as `key=value`.
    #[error("malformed option `{0}`, expected `key=value`")]
    Malformed(String),
}

/// The top-level scheduling strategy run once all regions are collected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum StrategyKind {
    /// Minimize register pressure, stopping once regions stop improving.
    #[cfg_attr(feature = "enable-serde", serde(rename = "minimum-register"))]
    MinReg,
    /// Minimize register pressure in every region.
    #[cfg_attr(feature = "enable-serde", serde(rename = "minimum-register-forced"))]
    MinRegForced,
    /// Reach the target occupancy with the default list scheduler, falling
    /// back on minimum-register schedules.
    #[default]
    #[cfg_attr(feature = "enable-serde", serde(rename = "legacy-max-occupancy"))]
    LegacyMaxOccupancy,
    /// Maximize instruction-level parallelism as long as occupancy holds.
    #[cfg_attr(feature = "enable-serde", serde(rename = "ilp"))]
    Ilp,
}

impl StrategyKind {
    /// The name used on the command line and in dumps.
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::MinReg => "minimum-register",
            StrategyKind::MinRegForced => "minimum-register-forced",
            StrategyKind::LegacyMaxOccupancy => "legacy-max-occupancy",
            StrategyKind::Ilp => "ilp",
        }
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimum-register" => Ok(StrategyKind::MinReg),
            "minimum-register-forced" => Ok(StrategyKind::MinRegForced),
            "legacy-max-occupancy" => Ok(StrategyKind::LegacyMaxOccupancy),
            "ilp" => Ok(StrategyKind::Ilp),
            _ => Err(ConfigError::UnknownStrategy(s.to_owned())),
        }
    }
}

impl Display for StrategyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How many passes of the default list scheduler the legacy strategy runs.
///
/// Running it once with no occupancy constraint before a constrained pass
/// gives better results on GCN in practice. That doesn't necessarily carry
/// over to other targets, so it's a policy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum ListPassPolicy {
    /// One unconstrained pass, then a constrained pass if occupancy is below
    /// the hardware target. Only the unconstrained pass when it isn't.
    #[default]
    #[cfg_attr(feature = "enable-serde", serde(rename = "unconstrained-then-constrained"))]
    UnconstrainedThenConstrained,
    /// A single pass constrained by the target occupancy.
    #[cfg_attr(feature = "enable-serde", serde(rename = "constrained-only"))]
    ConstrainedOnly,
}

impl ListPassPolicy {
    /// The number of list passes to run given the occupancy reached so far.
    pub fn passes(self, achieved: u32, hw_target: u32) -> u32 {
        match self {
            ListPassPolicy::UnconstrainedThenConstrained if achieved < hw_target => 2,
            _ => 1,
        }
    }

    /// The occupancy the list scheduler is constrained to in pass `pass`,
    /// `0` meaning unconstrained.
    pub fn list_target(self, pass: u32, target: u32) -> u32 {
        match self {
            ListPassPolicy::UnconstrainedThenConstrained if pass == 0 => 0,
            _ => target,
        }
    }

    /// The name used on the command line and in dumps.
    pub fn name(self) -> &'static str {
        match self {
            ListPassPolicy::UnconstrainedThenConstrained => "unconstrained-then-constrained",
            ListPassPolicy::ConstrainedOnly => "constrained-only",
        }
    }
}

impl FromStr for ListPassPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unconstrained-then-constrained" => Ok(ListPassPolicy::UnconstrainedThenConstrained),
            "constrained-only" => Ok(ListPassPolicy::ConstrainedOnly),
            _ => Err(ConfigError::UnknownPassPolicy(s.to_owned())),
        }
    }
}

impl Display for ListPassPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Options for [`schedule_function`](crate::sched::schedule_function).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct SchedulerConfig {
    /// The strategy run at the end of the pass
    pub strategy: StrategyKind,
    /// Pass policy of the legacy strategy
    pub list_passes: ListPassPolicy,
    /// Whether the legacy strategy tries minimum-register schedules before
    /// list scheduling when occupancy is below target
    pub try_maximize_occupancy: bool,
    /// Same, for the ILP strategy
    pub ilp_maximize_occupancy: bool,
    /// Whether commits check predicted pressure against the pressure actually
    /// measured afterwards, panicking on a mismatch
    pub verify: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            list_passes: ListPassPolicy::default(),
            try_maximize_occupancy: true,
            ilp_maximize_occupancy: false,
            verify: cfg!(debug_assertions),
        }
    }
}

impl SchedulerConfig {
    /// Parses a comma-separated list of `key=value` options on top of the
    /// defaults, e.g. `strategy=ilp,verify=true`.
    ///
    /// ```
    /// # use itersched::sched::{SchedulerConfig, StrategyKind};
    /// let config = SchedulerConfig::parse("strategy=minimum-register, verify=false").unwrap();
    ///
    /// assert_eq!(config.strategy, StrategyKind::MinReg);
    /// assert!(!config.verify);
    /// assert!(SchedulerConfig::parse("strategy=fastest").is_err());
    /// ```
    pub fn parse(options: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for option in options.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = option
                .split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .ok_or_else(|| ConfigError::Malformed(option.to_owned()))?;

            match key {
                "strategy" => config.strategy = value.parse()?,
                "list-passes" => config.list_passes = value.parse()?,
                "try-maximize-occupancy" => config.try_maximize_occupancy = parse_bool(key, value)?,
                "ilp-maximize-occupancy" => config.ilp_maximize_occupancy = parse_bool(key, value)?,
                "verify" => config.verify = parse_bool(key, value)?,
                _ => return Err(ConfigError::UnknownOption(key.to_owned())),
            }
        }

        Ok(config)
    }
}

impl FromStr for SchedulerConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_bool(option: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" | "on" | "1" => Ok(true),
        "false" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            option: option.to_owned(),
            value: value.to_owned(),
        }),
    }
}
