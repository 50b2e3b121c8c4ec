//! zgate CLI entry point

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

use zgate::cli::commands;
use zgate::cli::output::Output;

#[derive(Parser)]
#[command(name = "zg")]
#[command(author, version, about = "CI gate for Zephyr firmware workspaces", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show changed files grouped by kind
    Status {
        /// List every file per group
        #[arg(short, long)]
        verbose: bool,
    },
    /// Run the full verification chain
    Verify {
        /// Rules file path (default: .agent_rules.json)
        #[arg(short, long)]
        rules: Option<PathBuf>,
        /// Project type to check
        #[arg(short, long)]
        project: Option<String>,
        /// Build the unit tests after the checks pass; an optional value is
        /// passed to the test builder
        #[arg(short, long, num_args = 0..=1, default_missing_value = "")]
        build: Option<String>,
        /// Run the unit tests; an optional value is passed to the test runner
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        run_tests: Option<String>,
    },
    /// Run a single check
    Check {
        #[command(subcommand)]
        action: CheckCommands,
    },
    /// Clean build of the unit tests
    Build {
        /// Rules file path (default: .agent_rules.json)
        #[arg(short, long)]
        rules: Option<PathBuf>,
        /// Project type to check
        #[arg(short, long)]
        project: Option<String>,
        /// Keep the ambient SDK toolchain instead of forcing the host compiler
        #[arg(long)]
        sdk_compiler: bool,
    },
    /// Run the unit tests through ctest
    Test {
        /// Rules file path (default: .agent_rules.json)
        #[arg(short, long)]
        rules: Option<PathBuf>,
        /// Project type to check
        #[arg(short, long)]
        project: Option<String>,
        /// Build before running
        #[arg(short, long)]
        build_first: bool,
        /// Keep the ambient SDK toolchain instead of forcing the host compiler
        #[arg(long)]
        sdk_compiler: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum CheckCommands {
    /// Verify changed files against the allow-list
    Files(CheckArgs),
    /// Lint changed CMakeLists.txt files
    Cmake(CheckArgs),
    /// Lint C/C++ sources for forbidden includes
    Includes(CheckArgs),
    /// Audit mock library linkage
    Mocks(CheckArgs),
    /// Verify the coverage report against the threshold
    Coverage(CheckArgs),
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Rules file path (default: .agent_rules.json)
    #[arg(short, long)]
    rules: Option<PathBuf>,
    /// Project type to check
    #[arg(short, long)]
    project: Option<String>,
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Status { verbose }) => commands::run_status(verbose),
        Some(Commands::Verify {
            rules,
            project,
            build,
            run_tests,
        }) => commands::run_verify(
            rules.as_deref(),
            project.as_deref(),
            build.as_deref(),
            run_tests.as_deref(),
        ),
        Some(Commands::Check { action }) => match action {
            CheckCommands::Files(args) => {
                commands::run_check_files(args.rules.as_deref(), args.project.as_deref())
            }
            CheckCommands::Cmake(args) => {
                commands::run_check_cmake(args.rules.as_deref(), args.project.as_deref())
            }
            CheckCommands::Includes(args) => {
                commands::run_check_includes(args.rules.as_deref(), args.project.as_deref())
            }
            CheckCommands::Mocks(args) => {
                commands::run_check_mocks(args.rules.as_deref(), args.project.as_deref())
            }
            CheckCommands::Coverage(args) => {
                commands::run_check_coverage(args.rules.as_deref(), args.project.as_deref())
            }
        },
        Some(Commands::Build {
            rules,
            project,
            sdk_compiler,
        }) => commands::run_build(rules.as_deref(), project.as_deref(), sdk_compiler),
        Some(Commands::Test {
            rules,
            project,
            build_first,
            sdk_compiler,
        }) => commands::run_test(
            rules.as_deref(),
            project.as_deref(),
            build_first,
            sdk_compiler,
        ),
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "zg", &mut std::io::stdout());
            Ok(0)
        }
        None => {
            println!("zgate - CI gate for Zephyr firmware workspaces");
            println!("Run 'zg --help' for usage");
            Ok(0)
        }
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            Output::error(&format!("{:#}", e));
            std::process::exit(2);
        }
    }
}
