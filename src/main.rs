use clap::Parser;
use std::process;

use tracestats::cancel::CancelToken;
use tracestats::config::TracestatsConfig;
use tracestats::styling::{eprintln, format_error};

mod cli;
mod commands;

use cli::{Cli, Commands, ConfigCommand};
use commands::{
    ParseOptions, SearchOptions, handle_config_init, handle_config_show, handle_import,
    handle_list, handle_parse, handle_remove, handle_search, handle_summary,
};

/// Map the current thread to a single character (a-z, then A-Z).
fn thread_char() -> char {
    let thread_id = format!("{:?}", std::thread::current().id());
    thread_id
        .strip_prefix("ThreadId(")
        .and_then(|s| s.strip_suffix(")"))
        .and_then(|s| s.parse::<usize>().ok())
        .map(|n| {
            if (1..=26).contains(&n) {
                char::from(b'a' + (n - 1) as u8)
            } else if (27..=52).contains(&n) {
                char::from(b'A' + (n - 27) as u8)
            } else {
                '?'
            }
        })
        .unwrap_or('?')
}

fn init_logging(verbose: bool) {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if verbose { "debug" } else { "warn" }),
    )
    .format(|buf, record| {
        use anstyle::{AnsiColor, Color, Style};
        use std::io::Write;

        let msg = record.args().to_string();
        let thread = thread_char();
        let dim = Style::new().dimmed();

        // Commands start with $, make only the command bold (not $ or [context])
        if let Some(rest) = msg.strip_prefix("$ ") {
            let bold = Style::new().bold();
            if let Some(bracket_pos) = rest.find(" [") {
                let command = &rest[..bracket_pos];
                let context = &rest[bracket_pos..];
                writeln!(buf, "{dim}[{thread}]{dim:#} $ {bold}{command}{bold:#}{context}")
            } else {
                writeln!(buf, "{dim}[{thread}]{dim:#} $ {bold}{rest}{bold:#}")
            }
        } else if msg.starts_with("[ts-trace]") {
            writeln!(buf, "{dim}[{thread}] {msg}{dim:#}")
        } else if record.level() <= log::Level::Warn {
            let red = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));
            writeln!(buf, "{dim}[{thread}]{dim:#} {red}{msg}{red:#}")
        } else {
            writeln!(buf, "{dim}[{thread}]{dim:#} {msg}")
        }
    })
    .init();
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    // Init must work even when the existing file doesn't load
    if let Commands::Config {
        action: ConfigCommand::Init { force },
    } = cli.command
    {
        handle_config_init(force)?;
        return Ok(true);
    }
    let config = TracestatsConfig::load()?;

    match cli.command {
        Commands::Parse {
            traces,
            threads,
            output,
            name,
            link,
            skip_apis,
            apitrace,
            api,
            shader_dump,
            timeout,
            chunk_calls,
        } => {
            let cancel = CancelToken::new();
            cancel.cancel_on_signals()?;
            let options = ParseOptions {
                traces,
                threads,
                output,
                name,
                link,
                skip_apis,
                apitrace,
                api,
                shader_dump,
                timeout,
                chunk_calls,
            };
            handle_parse(options, config, cancel)
        }
        Commands::Import { files, store } => handle_import(&files, store.store, &config),
        Commands::Search {
            query,
            store,
            api,
            stat_type,
            scope,
            limit,
            format,
        } => {
            let options = SearchOptions {
                query,
                api,
                stat_type,
                scope,
                limit,
                format,
            };
            handle_search(options, store.store, &config).map(|()| true)
        }
        Commands::List {
            store,
            sort,
            format,
        } => handle_list(store.store, sort, format, &config).map(|()| true),
        Commands::Summary { store } => handle_summary(store.store, &config).map(|()| true),
        Commands::Remove {
            application,
            api,
            store,
        } => handle_remove(application, api, store.store, &config).map(|()| true),
        Commands::Config { action } => match action {
            ConfigCommand::Init { .. } => Ok(true),
            ConfigCommand::Show => handle_config_show(&config).map(|()| true),
        },
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{}", format_error(&format!("{e:#}")));
            process::exit(1);
        }
    }
}
