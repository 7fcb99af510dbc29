use clap::Parser;

/// This program cleans and scores survey and test responses.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the sources, the rules and the outputs of a run.
    /// If not provided, the --responses, --participants and --items options must be given.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A reference file containing the summary of a run in JSON format. If provided, psychscore will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the run will be written in JSON format to the given
    /// location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (directory path) If specified, all the output tables are written to this directory in CSV format. Setting this
    /// option overrides the directory that may be specified with the --config option.
    #[clap(long, value_parser)]
    pub output_dir: Option<String>,

    /// (file path) The responses table. Overrides the responses source of the --config option.
    #[clap(long, value_parser)]
    pub responses: Option<String>,

    /// (file path) The participants table. Overrides the participants source of the --config option.
    #[clap(long, value_parser)]
    pub participants: Option<String>,

    /// (file path) The item catalog. Overrides the items source of the --config option.
    #[clap(long, value_parser)]
    pub items: Option<String>,

    /// (default csv) The type of the input files given on the command line: csv or xlsx.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (column name, may be repeated) A column to remove from all the input tables, for example personal data
    /// such as email addresses.
    #[clap(long, value_parser)]
    pub drop_column: Option<Vec<String>>,

    /// (listwise or mean) How respondents with gaps in a scale are treated when computing reliability.
    #[clap(long, value_parser)]
    pub missing_data_policy: Option<String>,

    /// If passed as an argument, items with an invalid scoring configuration stop the run.
    #[clap(long, takes_value = false)]
    pub abort_on_error: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
