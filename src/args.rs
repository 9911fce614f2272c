use clap::{Parser, Subcommand};

/// Dashboard over the monthly retrospective survey exports.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration file. Relative directories in this file are
    /// resolved against the directory of the file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (directory, optional) The directory containing the retrospective spreadsheets. It overrides
    /// the directory that may be specified with the --config option. Defaults to the current directory.
    #[clap(short, long, value_parser)]
    pub data_dir: Option<String>,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Runs the HTTP API. This is the default command.
    Serve {
        /// (default 127.0.0.1) The address to listen on.
        #[clap(long, value_parser)]
        host: Option<String>,
        /// (default 3001) The port to listen on.
        #[clap(short, long, value_parser)]
        port: Option<u16>,
    },
    /// Loads the spreadsheets once and prints the analysis in JSON format.
    Report {
        /// (question, optional) Only report this question. All the questions of the most recent
        /// period are reported otherwise.
        #[clap(short, long, value_parser)]
        question: Option<String>,
        /// (file path) A reference report in JSON format. If provided, the report is checked
        /// against it and the differences are printed.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
        /// (file path, 'stdout' or empty) Where to write the report. Standard output by default.
        #[clap(short, long, value_parser)]
        out: Option<String>,
    },
}
