use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Import a brokerage transaction file (e.g. OFX) -- not implemented;
    /// feed already-parsed transactions via `load`/JSON instead.
    Import {
        /// Input file paths
        files: Vec<PathBuf>,
    },

    /// Load lots from CSV into the repository
    Load {
        /// Lots CSV file paths
        files: Vec<PathBuf>,
    },

    /// Run the driver and wash-sale pass over a date window
    Calc {
        /// Start of the window (ISO date/datetime, or long form); defaults to the earliest representable date
        #[arg(long)]
        dtstart: Option<String>,

        /// End of the window; defaults to the latest representable date
        #[arg(long)]
        dtend: Option<String>,
    },

    /// Export open lots to CSV
    #[command(alias = "dump")]
    Lots {
        /// Output CSV path
        csv: PathBuf,

        /// As-of date; defaults to the latest representable date
        #[arg(long)]
        dtasof: Option<String>,

        /// Sum units/cost per (account, security), dropping dtopen/washcost
        #[arg(long)]
        consolidate: bool,
    },

    /// Export realized gains to CSV
    Gains {
        /// Output CSV path
        csv: PathBuf,

        /// Start of the window; defaults to the earliest representable date
        #[arg(long)]
        dtstart: Option<String>,

        /// End of the window; defaults to the latest representable date
        #[arg(long)]
        dtend: Option<String>,
    },
}
