//! Command-Line Surface
//!
//! Only the global flags are known up front. Everything from the command
//! name on is collected raw and parsed later, once the command is resolved.

use clap::Parser;
use feflow_core::ParsedArgs;

use crate::services::update::GateOptions;
use crate::services::DispatchRequest;
use crate::utils::logging::Verbosity;

#[derive(Parser, Debug)]
#[command(name = "fef")]
#[command(about = "Front-end workflow tool")]
#[command(version)]
#[command(disable_help_flag = true)]
/// Command-line arguments.
pub struct Cli {
    /// Print debug logs
    #[arg(long)]
    pub debug: bool,

    /// Only print errors
    #[arg(long)]
    pub silent: bool,

    /// Skip the update check
    #[arg(long)]
    pub disable_check: bool,

    /// Update without asking when a newer version exists
    #[arg(long)]
    pub auto_update: bool,

    /// Command name followed by its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    /// Split the trailing arguments into the command and its arguments.
    /// Global flags typed after the command still count.
    pub fn into_request(self) -> (Verbosity, DispatchRequest) {
        let mut rest = self.args.into_iter();
        let first = rest.next();
        let (command, tail): (Option<String>, Vec<String>) = match first {
            Some(arg) if !arg.starts_with('-') => (Some(arg), rest.collect()),
            Some(arg) => (None, std::iter::once(arg).chain(rest).collect()),
            None => (None, Vec::new()),
        };
        let args = ParsedArgs::parse(tail);

        let verbosity = Verbosity::from_flags(
            self.debug || args.flag("debug"),
            self.silent || args.flag("silent"),
        );
        let options = GateOptions {
            auto_update: self.auto_update || args.flag("auto-update"),
            disable_check: self.disable_check || args.flag("disable-check"),
        };

        (
            verbosity,
            DispatchRequest {
                command,
                args,
                options,
            },
        )
    }
}
