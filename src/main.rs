mod cmd;

use clap::{Parser, Subcommand};
use cmd::{
    balance::BalanceCommand, gains::GainsCommand, lots::LotsCommand, schema::SchemaCommand,
    summary::SummaryCommand,
};

/// FIFO profit and loss for crypto trading histories
#[derive(Parser, Debug)]
#[command(name = "pnlc", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Realised gains per year, cost basis and holdings
    Summary(SummaryCommand),
    /// Every disposal with its proceeds, basis and gain
    Gains(GainsCommand),
    /// Lots remaining after processing all trades
    Lots(LotsCommand),
    /// Reconcile holdings with a Kraken ledger export
    Balance(BalanceCommand),
    /// Describe the accepted input formats
    Schema(SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Summary(cmd) => cmd.exec(),
        Command::Gains(cmd) => cmd.exec(),
        Command::Lots(cmd) => cmd.exec(),
        Command::Balance(cmd) => cmd.exec(),
        Command::Schema(cmd) => cmd.exec(),
    }
}
