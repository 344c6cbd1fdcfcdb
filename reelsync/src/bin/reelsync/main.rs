mod commands;
mod context;
mod examples;
mod output;
mod session;
mod theme;

use anyhow::Result;
use clap::{
    ColorChoice, Command, CommandFactory, FromArgMatches, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Color as ClapColor, RgbColor, Style},
    },
    error::ErrorKind,
};

use colored::{Color as ThemeColor, Colorize, control::ShouldColorize};
use reelsync::store::DocumentStore;
use std::fmt::Write;
use std::io::{self, Write as IoWrite};

use commands::{
    actions::{CommentArgs, ReactArgs, ToggleAction, ToggleArgs, ViewArgs, handle_comment, handle_react, handle_toggle, handle_view},
    feeds::{
        NotificationsArgs, SearchArgs, StatsArgs, WatchArgs, handle_notifications, handle_search, handle_stats,
        handle_watch,
    },
    index::{IndexArgs, handle_index},
    init::{InitArgs, handle_init},
    media::{UploadArgs, handle_upload},
};
use context::{Backend, ProjectContext};
use examples::{ExampleGroup, command_examples};
use output::{GlobalOptions, OutputFormat, OutputManager};
use session::Session;
use theme::{ICONS, THEME};

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[
    ("REDIS_URL", "Redis connection URL referenced by the default [store] url"),
    ("RUST_LOG", "Log filter for mirror and mutation diagnostics (e.g. reelsync=debug)"),
];

#[derive(Parser)]
#[command(name = "reelsync")]
#[command(version)]
#[command(
    about = "Live mirror and social actions for a short-video document store",
    long_about = r#"Operator CLI for the reelsync mirror and social mutation layer:

• Live, wholesale-replaced snapshots of every application collection
• Sorted feeds with client-side ordering when the store lacks an index
• Idempotent toggles (likes, reposts, follows, reactions) with notification fan-out

Configuration is read from .reelsync/config.toml in the current directory or
the nearest parent; run 'reelsync init' to create one.
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn parse_with_styles() -> Self {
        let command = build_cli_command();
        let matches = match command.styles(help_styles()).try_get_matches() {
            Ok(matches) => matches,
            Err(err) => exit_with_clap_error(err),
        };
        match Cli::from_arg_matches(&matches) {
            Ok(cli) => cli,
            Err(err) => exit_with_clap_error(err),
        }
    }
}

fn exit_with_clap_error(err: clap::error::Error) -> ! {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = print_blank_line_stdout();
            if let Err(print_err) = err.print()
                && print_err.kind() != io::ErrorKind::BrokenPipe
            {
                eprintln!("Failed to display help: {print_err}");
            }
            let _ = print_blank_line_stdout();
            std::process::exit(0);
        }
        ErrorKind::MissingSubcommand => handle_missing_subcommand(err),
        _ => {
            let exit_code = err.exit_code();
            let _ = print_blank_line_stderr();
            if let Err(print_err) = err.print()
                && print_err.kind() != io::ErrorKind::BrokenPipe
            {
                eprintln!("Failed to display error: {print_err}");
            }
            let _ = print_blank_line_stderr();
            std::process::exit(exit_code);
        }
    }
}

fn handle_missing_subcommand(error: clap::error::Error) -> ! {
    let mut command = build_cli_command();
    let command_name = command
        .get_display_name()
        .unwrap_or_else(|| command.get_name())
        .to_string();

    let _ = print_blank_line_stderr();
    eprintln!("error: '{command_name}' requires a subcommand but one was not provided");
    let _ = print_blank_line_stderr();

    command = command.styles(help_styles());

    let mut stderr = io::stderr();
    if command.write_long_help(&mut stderr).is_ok() {
        let _ = IoWrite::write_all(&mut stderr, b"\n");
        let _ = IoWrite::flush(&mut stderr);
    }

    let _ = print_blank_line_stderr();
    std::process::exit(error.exit_code());
}

fn build_cli_command() -> Command {
    let use_color = detect_color_support();
    let appendix = render_top_level_appendix(use_color);
    let mut command = Cli::command().after_long_help(appendix);
    command = command.color(if use_color { ColorChoice::Auto } else { ColorChoice::Never });
    attach_command_examples(&mut command, use_color);
    command
}

fn attach_command_examples(command: &mut Command, use_color: bool) {
    for example in command_examples() {
        if let Some(subcommand) = command.find_subcommand_mut(example.name) {
            let help_text = render_examples(example.groups, use_color);
            *subcommand = subcommand.clone().after_long_help(help_text);
        }
    }
}

fn render_examples(groups: &[ExampleGroup], use_color: bool) -> String {
    let theme = &THEME;
    let mut buffer = String::new();

    let heading = stylize("Examples:", theme.highlight, true, use_color);
    let _ = writeln!(buffer, "{heading}");

    for (index, group) in groups.iter().enumerate() {
        let title = stylize(group.title, theme.primary, true, use_color);
        let _ = writeln!(buffer, "  {title}");

        for command in group.commands {
            let arrow = stylize(ICONS.arrow, theme.secondary, false, use_color);
            let command_text = stylize(command, theme.secondary, false, use_color);
            let _ = writeln!(buffer, "    {arrow} {command_text}");
        }

        if index + 1 < groups.len() {
            buffer.push('\n');
        }
    }

    buffer
}

fn render_top_level_appendix(use_color: bool) -> String {
    let theme = &THEME;
    let mut buffer = String::new();

    let env_heading = stylize("Environment Variables:", theme.highlight, true, use_color);
    let _ = writeln!(buffer, "{env_heading}");
    for (key, description) in ENVIRONMENT_VARIABLES {
        let key_text = stylize(key, theme.key, true, use_color);
        let value_text = stylize(description, theme.value, false, use_color);
        let _ = writeln!(buffer, "  {key_text}  {value_text}");
    }

    buffer.push('\n');

    let tip_heading = stylize("Tip:", theme.highlight, true, use_color);
    let tip_text = stylize(
        "Use 'reelsync <command> --help' to view examples for each command.",
        theme.secondary,
        false,
        use_color,
    );
    let _ = writeln!(buffer, "{tip_heading} {tip_text}");

    buffer
}

fn print_blank_line_stdout() -> io::Result<()> {
    let mut stdout = io::stdout();
    IoWrite::write_all(&mut stdout, b"\n")?;
    IoWrite::flush(&mut stdout)
}

fn print_blank_line_stderr() -> io::Result<()> {
    let mut stderr = io::stderr();
    IoWrite::write_all(&mut stderr, b"\n")?;
    IoWrite::flush(&mut stderr)
}

fn stylize(text: &str, color: ThemeColor, bold: bool, use_color: bool) -> String {
    if !use_color {
        return text.to_string();
    }
    let styled = text.color(color);
    if bold { styled.bold().to_string() } else { styled.to_string() }
}

fn detect_color_support() -> bool {
    ShouldColorize::from_env().should_colorize()
}

fn help_styles() -> Styles {
    let theme = &THEME;
    Styles::styled()
        .usage(style_from_color(theme.primary).bold())
        .header(style_from_color(theme.highlight).bold())
        .literal(style_from_color(theme.secondary))
        .placeholder(style_from_color(theme.muted))
        .valid(style_from_color(theme.success))
        .invalid(style_from_color(theme.warning))
        .error(style_from_color(theme.error).bold())
}

fn style_from_color(color: ThemeColor) -> Style {
    Style::new().fg_color(Some(color_to_clap_color(color)))
}

fn color_to_clap_color(color: ThemeColor) -> ClapColor {
    match color {
        ThemeColor::Black => ClapColor::Ansi(AnsiColor::Black),
        ThemeColor::Red => ClapColor::Ansi(AnsiColor::Red),
        ThemeColor::Green => ClapColor::Ansi(AnsiColor::Green),
        ThemeColor::Yellow => ClapColor::Ansi(AnsiColor::Yellow),
        ThemeColor::Blue => ClapColor::Ansi(AnsiColor::Blue),
        ThemeColor::Magenta => ClapColor::Ansi(AnsiColor::Magenta),
        ThemeColor::Cyan => ClapColor::Ansi(AnsiColor::Cyan),
        ThemeColor::White => ClapColor::Ansi(AnsiColor::White),
        ThemeColor::BrightBlack => ClapColor::Ansi(AnsiColor::BrightBlack),
        ThemeColor::BrightRed => ClapColor::Ansi(AnsiColor::BrightRed),
        ThemeColor::BrightGreen => ClapColor::Ansi(AnsiColor::BrightGreen),
        ThemeColor::BrightYellow => ClapColor::Ansi(AnsiColor::BrightYellow),
        ThemeColor::BrightBlue => ClapColor::Ansi(AnsiColor::BrightBlue),
        ThemeColor::BrightMagenta => ClapColor::Ansi(AnsiColor::BrightMagenta),
        ThemeColor::BrightCyan => ClapColor::Ansi(AnsiColor::BrightCyan),
        ThemeColor::BrightWhite => ClapColor::Ansi(AnsiColor::BrightWhite),
        ThemeColor::TrueColor { r, g, b } => ClapColor::Rgb(RgbColor(r, g, b)),
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write .reelsync/config.toml in the current directory
    Init(InitArgs),

    /// Create the Redis search indexes used by sorted feeds
    Index(IndexArgs),

    #[command(flatten)]
    Session(SessionCommands),
}

/// Commands that run against a loaded mirror.
#[derive(Subcommand)]
enum SessionCommands {
    /// Print a collection's snapshot every time it changes
    Watch(WatchArgs),

    /// Like or unlike a video
    Like(ToggleArgs),

    /// Repost or un-repost a video
    Repost(ToggleArgs),

    /// Add or remove a video from favorites
    Favorite(ToggleArgs),

    /// Follow or unfollow a user
    Follow(ToggleArgs),

    /// Block or unblock a user
    Block(ToggleArgs),

    /// Toggle a reaction on a comment
    React(ReactArgs),

    /// Comment on a video
    Comment(CommentArgs),

    /// Count one view of a video
    View(ViewArgs),

    /// Search mirrored videos or users
    Search(SearchArgs),

    /// Show derived statistics for a video
    Stats(StatsArgs),

    /// List a user's notifications
    Notifications(NotificationsArgs),

    /// Upload a video or story
    Upload(UploadArgs),
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse_with_styles();
    let global_options = GlobalOptions {
        output_format: cli.output.clone(),
        quiet: cli.quiet,
        verbose: cli.verbose,
        no_color: cli.no_color,
    };
    if global_options.no_color {
        colored::control::set_override(false);
    }
    let output = OutputManager::new(global_options);

    let _ = print_blank_line_stdout();

    match execute(cli.command, &output).await {
        Ok(()) => {
            let _ = print_blank_line_stdout();
        }
        Err(err) => {
            output.error(&format!("{err:#}"));
            let _ = print_blank_line_stdout();
            std::process::exit(1);
        }
    }
}

async fn execute(command: Commands, output: &OutputManager) -> Result<()> {
    match command {
        Commands::Init(args) => handle_init(args, output),
        Commands::Index(args) => {
            let ctx = ProjectContext::find()?;
            handle_index(args, &ctx, output).await
        }
        Commands::Session(command) => {
            let ctx = ProjectContext::find()?;
            if !ctx.initialized {
                output.warning("No .reelsync/config.toml found; using the in-memory defaults.");
                output.info("Run 'reelsync init' to create a configuration.");
            }
            match ctx.config.store.backend {
                Backend::Memory => run_session(command, session::memory_store(output), &ctx, output).await,
                Backend::Redis => {
                    let store = session::redis_store(&ctx, output).await?;
                    run_session(command, store, &ctx, output).await
                }
            }
        }
    }
}

async fn run_session<S: DocumentStore>(
    command: SessionCommands,
    store: S,
    ctx: &ProjectContext,
    output: &OutputManager,
) -> Result<()> {
    let session = Session::open(store, ctx, output).await?;
    let result = match command {
        SessionCommands::Watch(args) => handle_watch(args, &session, output).await,
        SessionCommands::Like(args) => handle_toggle(ToggleAction::Like, args, &session, output).await,
        SessionCommands::Repost(args) => handle_toggle(ToggleAction::Repost, args, &session, output).await,
        SessionCommands::Favorite(args) => handle_toggle(ToggleAction::Favorite, args, &session, output).await,
        SessionCommands::Follow(args) => handle_toggle(ToggleAction::Follow, args, &session, output).await,
        SessionCommands::Block(args) => handle_toggle(ToggleAction::Block, args, &session, output).await,
        SessionCommands::React(args) => handle_react(args, &session, output).await,
        SessionCommands::Comment(args) => handle_comment(args, &session, output).await,
        SessionCommands::View(args) => handle_view(args, &session, output).await,
        SessionCommands::Search(args) => handle_search(args, &session, output).await,
        SessionCommands::Stats(args) => handle_stats(args, &session, output).await,
        SessionCommands::Notifications(args) => handle_notifications(args, &session, output).await,
        SessionCommands::Upload(args) => handle_upload(args, &session, output).await,
    };
    session.close();
    result
}
