// Command-line surface of the `classopt` binary

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use crate::application::scenarios::{self, Scenario};
use crate::domain::{ModelError, SolverBackend, VariableType};

#[derive(Parser, Debug)]
#[command(name = "classopt")]
#[command(about = "Build, solve and report the coursework optimization models", long_about = None)]
pub struct Cli {
    /// Engine to solve with
    #[arg(long, value_enum, default_value_t = BackendArg::Auto, global = true)]
    pub backend: BackendArg,

    /// Wall-clock limit in seconds
    #[arg(long, value_parser = parse_seconds, global = true)]
    pub time_limit: Option<Duration>,

    /// Seed for the nonlinear multistart
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Also write the model in CPLEX LP format to this file
    #[arg(long, global = true)]
    pub write_lp: Option<PathBuf>,

    /// Log filter, overrides CLASSOPT_LOG
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Maximize 3 x1^2 - 4 x2 inside a disk and below a hyperbola
    Nlp1,
    /// Select projects under three yearly budgets
    Projectsip1 {
        /// Variable domain: the binary model, its integer variant or the LP relaxation
        #[arg(long, value_enum, default_value_t = DomainArg::Binary)]
        domain: DomainArg,
        /// Run presolve (off unless given)
        #[arg(long)]
        presolve: Option<bool>,
        /// Run primal heuristics (off unless given)
        #[arg(long)]
        heuristics: Option<bool>,
        /// Generate cuts (off unless given)
        #[arg(long)]
        cuts: Option<bool>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    Auto,
    Builtin,
    CoinCbc,
    Highs,
}

impl From<BackendArg> for SolverBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => SolverBackend::Auto,
            BackendArg::Builtin => SolverBackend::Builtin,
            BackendArg::CoinCbc => SolverBackend::CoinCbc,
            BackendArg::Highs => SolverBackend::Highs,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainArg {
    Binary,
    Integer,
    Continuous,
}

impl From<DomainArg> for VariableType {
    fn from(arg: DomainArg) -> Self {
        match arg {
            DomainArg::Binary => VariableType::Binary,
            DomainArg::Integer => VariableType::Integer,
            DomainArg::Continuous => VariableType::Continuous,
        }
    }
}

impl Cli {
    /// Build the selected scenario with the command-line overrides applied.
    pub fn scenario(&self) -> Result<Scenario, ModelError> {
        let mut scenario = match &self.command {
            Command::Nlp1 => scenarios::nlp1()?,
            Command::Projectsip1 {
                domain,
                presolve,
                heuristics,
                cuts,
            } => {
                let mut scenario = scenarios::projectsip1((*domain).into())?;
                let options = &mut scenario.options;
                options.presolve = presolve.unwrap_or(options.presolve);
                options.heuristics = heuristics.unwrap_or(options.heuristics);
                options.cuts = cuts.unwrap_or(options.cuts);
                scenario
            }
        };

        scenario.options.backend = self.backend.into();
        if let Some(limit) = self.time_limit {
            scenario.options.time_limit = Some(limit);
        }
        if let Some(seed) = self.seed {
            scenario.options.seed = seed;
        }
        Ok(scenario)
    }
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|err| format!("'{value}' is not a number of seconds: {err}"))?;
    Duration::try_from_secs_f64(seconds).map_err(|err| format!("invalid time limit '{value}': {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projectsip1_defaults_keep_acceleration_off() {
        let cli = Cli::try_parse_from(["classopt", "projectsip1"]).unwrap();
        let scenario = cli.scenario().unwrap();
        assert!(!scenario.options.presolve);
        assert!(!scenario.options.heuristics);
        assert!(!scenario.options.cuts);
        assert_eq!(scenario.options.backend, SolverBackend::Auto);
    }

    #[test]
    fn flags_override_scenario_options() {
        let cli = Cli::try_parse_from([
            "classopt",
            "projectsip1",
            "--domain",
            "continuous",
            "--cuts",
            "true",
            "--backend",
            "builtin",
            "--time-limit",
            "2.5",
            "--seed",
            "7",
        ])
        .unwrap();
        let scenario = cli.scenario().unwrap();
        assert!(scenario.options.cuts);
        assert!(!scenario.options.presolve);
        assert_eq!(scenario.options.backend, SolverBackend::Builtin);
        assert_eq!(scenario.options.time_limit, Some(Duration::from_millis(2500)));
        assert_eq!(scenario.options.seed, 7);
        assert_eq!(scenario.model.num_integer_variables(), 0);
    }

    #[test]
    fn negative_time_limit_is_rejected() {
        assert!(Cli::try_parse_from(["classopt", "--time-limit", "-1", "nlp1"]).is_err());
    }

    #[test]
    fn backend_names_are_kebab_case() {
        let cli = Cli::try_parse_from(["classopt", "--backend", "coin-cbc", "nlp1"]).unwrap();
        assert_eq!(cli.backend, BackendArg::CoinCbc);
        assert_eq!(cli.command, Command::Nlp1);
    }
}
