use clap::Parser;

/// This is a scoring program for chapter member activity reports.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file with the settings and the list of reports to ingest.
    /// Relative paths in this file are resolved against its directory.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path, .xlsx, .xls or .csv) The main report to ingest. If not provided, the
    /// reports listed in the configuration are ingested, or nothing if there are none.
    /// The summary is then computed from all the periods in the store.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (file path, optional) The training report that goes with the main report. Each row
    /// counts as one training event for the member named in it.
    #[clap(short, long, value_parser)]
    pub training: Option<String>,

    /// (file path) The JSON file where the periods are stored. Setting this option overrides
    /// the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub store: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary will be written in JSON format to the given
    /// location. Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing a summary in JSON format. If provided, scorecard will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (member name, optional) Adds the history, the latest scores and the suggestions of
    /// this member to the summary.
    #[clap(short, long, value_parser)]
    pub member: Option<String>,

    /// (FROM:TO, optional) Removes from the store every period lying entirely between the
    /// two dates (YYYY-MM-DD), before the reports are ingested.
    #[clap(long, value_parser)]
    pub remove_period: Option<String>,

    /// If passed as an argument, removes all the periods from the store before the reports
    /// are ingested.
    #[clap(long, takes_value = false)]
    pub reset: bool,

    /// (date, optional) Only the periods starting on or after this date (YYYY-MM-DD) are
    /// summarized. The store is not modified.
    #[clap(long, value_parser)]
    pub from: Option<String>,

    /// (date, optional) Only the periods ending on or before this date (YYYY-MM-DD) are
    /// summarized.
    #[clap(long, value_parser)]
    pub to: Option<String>,

    /// (default: first worksheet) When using an Excel file, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
