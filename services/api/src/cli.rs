use crate::commands::{run_reconcile, ReconcileArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use member_match::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "member-match-api",
    about = "Reconcile membership and community exports and prepare renewal reminders",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Join two CSV exports, print the renewal report and write the export file
    Reconcile(ReconcileArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Reconcile(args) => run_reconcile(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn reconcile_flags_parse() {
        let cli = Cli::try_parse_from([
            "member-match",
            "reconcile",
            "--source",
            "members.csv",
            "--target",
            "community.csv",
            "--month",
            "March 2025",
            "--start",
            "2025-03-01",
            "--active-only",
            "--hide-undated",
        ])
        .expect("flags parse");

        match cli.command {
            Some(Command::Reconcile(args)) => {
                assert_eq!(args.month.as_deref(), Some("March 2025"));
                assert!(args.active_only);
                assert!(args.hide_undated);
                assert!(args.end.is_none());
            }
            other => panic!("expected reconcile command, got {other:?}"),
        }
    }

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["member-match"]).expect("no args parse");
        assert!(cli.command.is_none());
    }
}
