pub mod preview;

use std::path::PathBuf;

use ansi_term::Colour;
use anyhow::Result;
use clap::{Parser, Subcommand};
use preview::{process_preview_command, PreviewCommand};
use tracing::{info, level_filters::LevelFilter};

use crate::{
    config::{Config, DEFAULT_CONFIG_PATH},
    history::CommandHistorySource,
    report::{
        review::{ConsoleReviewer, SilentReviewer},
        shortcuts::ShortcutTable,
        ReportRunner, RunSummary,
    },
    sheet::{file_sheet::FileSheet, ColumnNames},
    utils::{
        clock::DefaultClock,
        dir::create_application_default_path,
        logging::{enable_logging, REPORT_PREFIX},
        time::parse_human_date,
    },
};

#[derive(Parser, Debug)]
#[command(name = "Commitsheet", version, long_about = None)]
#[command(about = "Application for filling version control history into a timesheet", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH, help = "Path to the configuration file")]
    config: PathBuf,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Fill every day after the last date of the sheet up to yesterday")]
    Report {
        #[arg(
            long,
            help = "First day to fill when the sheet has no dates yet. Examples are \"2025-03-15\", \"15/03/2025\", \"2 weeks ago\""
        )]
        from: Option<String>,
        #[arg(long, help = "Accept every computed timetable without asking")]
        silent: bool,
    },
    #[command(about = "Print computed timetables without touching the sheet")]
    Preview {
        #[command(flatten)]
        command: PreviewCommand,
    },
    #[command(about = "Create the sheet file with a header built from the configuration")]
    InitSheet {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let app_dir = create_application_default_path()?;
    enable_logging(REPORT_PREFIX, &app_dir.join("logs"), logging_level, args.log)?;

    let config = Config::load(&args.config).await?;

    match args.commands {
        Commands::Report { from, silent } => {
            let from = from
                .map(|v| parse_human_date(&v, config.general.date_style))
                .transpose()?;
            let summary = run_report(&config, from, silent || config.general.silent_mode).await?;
            if summary.interrupted {
                println!("Stopped after {} days", summary.days_written);
            } else {
                println!("Done! Filled {} days", summary.days_written);
            }
            Ok(())
        }
        Commands::Preview { command } => {
            let output =
                process_preview_command(command, &config, &CommandHistorySource, &DefaultClock)
                    .await?;
            print!("{output}");
            Ok(())
        }
        Commands::InitSheet {} => {
            let header = ColumnNames::from(&config.sheet).default_header(&config.project_names());
            FileSheet::create(config.sheet.path.clone(), &header, config.general.date_style)
                .await?;
            println!("Created {:?}", config.sheet.path);
            Ok(())
        }
    }
}

async fn run_report(config: &Config, from: Option<chrono::NaiveDate>, silent: bool) -> Result<RunSummary> {
    println!(
        "{}",
        Colour::Red.paint(
            "This will append rows to the sheet and remove trailing rows without a date.\n\
             It is suggested to keep a copy of the sheet before running it."
        )
    );

    let sheet = FileSheet::new(config.sheet.path.clone(), config.general.date_style);
    info!("Filling {:?}, silent mode: {silent}", sheet.path());

    if silent {
        let mut runner = ReportRunner::new(
            CommandHistorySource,
            sheet,
            SilentReviewer,
            Box::new(DefaultClock),
        );
        runner.run(config, from).await
    } else {
        let reviewer = ConsoleReviewer::stdio(ShortcutTable::from_config(config));
        let mut runner =
            ReportRunner::new(CommandHistorySource, sheet, reviewer, Box::new(DefaultClock));
        runner.run(config, from).await
    }
}
