//! Operator CLI: validate configuration and inspect scanned components.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use component_server::component::tree::{ComponentId, ComponentTree};
use component_server::component::scan_roots;
use component_server::config::load_config;

#[derive(Parser)]
#[command(name = "server-cli", about = "Component server operator tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a configuration file.
    Validate {
        /// Path to the TOML config.
        config: PathBuf,
    },
    /// Scan the configured component roots and print the tree.
    Components {
        /// Path to the TOML config.
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => match load_config(&config) {
            Ok(parsed) => {
                println!("{} is valid", config.display());
                println!("  listener: {}", parsed.listener.bind_address);
                println!("  component roots: {}", parsed.components.roots.len());
                println!(
                    "  socket: {}",
                    if parsed.socket.enabled {
                        parsed.socket.path.as_str()
                    } else {
                        "disabled"
                    }
                );
                ExitCode::SUCCESS
            }
            Err(error) => {
                eprintln!("{}: {error}", config.display());
                ExitCode::FAILURE
            }
        },
        Commands::Components { config } => {
            let parsed = match load_config(&config) {
                Ok(parsed) => parsed,
                Err(error) => {
                    eprintln!("{}: {error}", config.display());
                    return ExitCode::FAILURE;
                }
            };

            let roots: Vec<PathBuf> =
                parsed.components.roots.iter().map(PathBuf::from).collect();
            let mut tree = ComponentTree::new();
            match scan_roots(&mut tree, &roots) {
                Ok(visited) => {
                    println!("{visited} components from {} roots", roots.len());
                    print_subtree(&tree, tree.root(), 0);
                    ExitCode::SUCCESS
                }
                Err(error) => {
                    eprintln!("scan failed: {error}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn print_subtree(tree: &ComponentTree, id: ComponentId, depth: usize) {
    if depth > 0 {
        println!(
            "{indent}{path}  ({sources} source{plural})",
            indent = "  ".repeat(depth),
            path = tree.path(id),
            sources = tree.source_paths(id).len(),
            plural = if tree.source_paths(id).len() == 1 { "" } else { "s" },
        );
    }
    for child in tree.children(id) {
        print_subtree(tree, child, depth + 1);
    }
}
