//! Trellis command-line tool.
//!
//! Reads block rows, templates and overrides from JSON files and prints
//! trees, integrity reports, resolved instances and position patches.
//!
//! Usage:
//!   trellis tree rows.json
//!   trellis tree rows.json --root 0192ab --descend unslotted
//!   trellis validate rows.json
//!   trellis resolve card.json --overrides instance.json
//!   trellis instantiate card.json --parent 0192ab --slot main --position 2
//!   trellis move rows.json 0192cd right
//!   trellis reparent rows.json 0192cd --parent 0192ab --slot main --index 0
//!   trellis repair rows.json
//!
//! Logs go to stderr; set RUST_LOG=trellis_tree=debug for planner detail.

mod input;
mod tree;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt};

use trellis_tree::{
    CloneTarget, DropTarget, EngineConfig, IdSource, InstantiationCloner, MoveDirection,
    PositionPlanner, SequentialIds, SlotFilter, TreeAssembler, Uuid7Ids, detach, integrity,
    resolve_instance, template_subtree,
};
use trellis_types::{BlockId, PageId};

use crate::tree::format_block_tree;

/// Inspect and plan Trellis block trees.
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(about = "Inspect and plan Trellis block trees")]
struct Args {
    /// Engine config (RON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of ASCII
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the assembled tree of a row file
    Tree {
        rows: PathBuf,
        /// Only the subtree under this block (id or unique prefix)
        #[arg(long)]
        root: Option<String>,
        /// Slot filter below the root: `*`, `-` or a slot name
        #[arg(long)]
        descend: Option<SlotFilter>,
        /// Known block types; others are flagged
        #[arg(long = "type", value_name = "TYPE")]
        types: Vec<String>,
    },

    /// Report integrity issues; exits non-zero if any
    Validate { rows: PathBuf },

    /// Resolve a template against an instance's overrides
    Resolve {
        template: PathBuf,
        #[arg(long)]
        overrides: Option<PathBuf>,
        /// Emit plain rows without the template reference
        #[arg(long)]
        detach: bool,
    },

    /// Clone a template into fresh rows
    Instantiate {
        template: PathBuf,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        slot: Option<String>,
        #[arg(long, default_value_t = 0.0)]
        position: f64,
        #[arg(long)]
        page: Option<String>,
        /// Sequential ids with this prefix instead of UUIDv7
        #[arg(long, value_name = "PREFIX")]
        seq: Option<String>,
    },

    /// Plan an adjacent move
    Move {
        rows: PathBuf,
        block: String,
        /// left/right (or up/down)
        direction: MoveDirection,
    },

    /// Plan a drop into a (possibly new) sibling group
    Reparent {
        rows: PathBuf,
        block: String,
        /// New parent (id or unique prefix); omit for the page root
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        slot: Option<String>,
        #[arg(long)]
        index: usize,
    },

    /// Plan renumbering for every group with duplicate positions
    Repair { rows: PathBuf },
}

fn main() -> Result<()> {
    // Logs to stderr; stdout carries command output
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into())
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    run(args.command, &config, args.json, &mut std::io::stdout().lock())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn run(command: Command, config: &EngineConfig, json: bool, out: &mut dyn Write) -> Result<()> {
    match command {
        Command::Tree {
            rows,
            root,
            descend,
            types,
        } => {
            let rows = input::load_rows(&rows)?;
            let mut assembler = TreeAssembler::with_config(&rows, &config.assembly);
            if let Some(filter) = descend {
                assembler = assembler.descend(filter);
            }
            if !types.is_empty() {
                assembler = assembler.with_registry(&types);
            }
            let tree = match root {
                Some(query) => assembler.subtree(&input::find_block(&rows, &query)?.id),
                None => assembler.assemble_page(),
            };
            if json {
                print_json(out, &tree)
            } else {
                print_lines(out, format_block_tree(&tree))
            }
        }

        Command::Validate { rows } => {
            let rows = input::load_rows(&rows)?;
            let issues = integrity::check(&rows);
            if json {
                print_json(out, &issues)?;
            } else {
                print_lines(out, issues.iter().map(ToString::to_string))?;
            }
            if !issues.is_empty() {
                bail!("{} integrity issue(s) in {} rows", issues.len(), rows.len());
            }
            Ok(())
        }

        Command::Resolve {
            template,
            overrides,
            detach: plain,
        } => {
            let template = input::load_template(&template)?;
            let overrides = input::load_overrides(overrides.as_deref())?;
            let subtree = template_subtree(&template)?;
            let resolved = resolve_instance(&subtree, &overrides);
            if plain {
                print_json(out, &detach(&resolved))
            } else if json {
                print_json(out, &resolved)
            } else {
                print_lines(out, format_block_tree(&resolved))
            }
        }

        Command::Instantiate {
            template,
            parent,
            slot,
            position,
            page,
            seq,
        } => {
            let template = input::load_template(&template)?;
            let mut target = CloneTarget {
                parent_block_id: parent.map(BlockId::new),
                slot,
                position,
                page_id: None,
            };
            if let Some(page) = page {
                target = target.on_page(PageId::new(page));
            }
            let mut ids: Box<dyn IdSource> = match seq {
                Some(prefix) => Box::new(SequentialIds::new(prefix)),
                None => Box::new(Uuid7Ids),
            };
            let cloner = InstantiationCloner::new(config.instances.tracking);
            let instance = cloner.instantiate(&template, &target, ids.as_mut())?;
            print_json(out, &instance)
        }

        Command::Move {
            rows,
            block,
            direction,
        } => {
            let rows = input::load_rows(&rows)?;
            let node = input::find_block(&rows, &block)?;
            let planner = PositionPlanner::new(config.positions.clone());
            let patch = planner.plan_move(node, &rows, direction)?;
            print_json(out, &patch)
        }

        Command::Reparent {
            rows,
            block,
            parent,
            slot,
            index,
        } => {
            let rows = input::load_rows(&rows)?;
            let node = input::find_block(&rows, &block)?;
            let parent = parent
                .map(|query| input::find_block(&rows, &query).map(|p| p.id.clone()))
                .transpose()?;
            let planner = PositionPlanner::new(config.positions.clone());
            let patch = planner.plan_reparent(node, &rows, &DropTarget::new(parent, slot, index))?;
            print_json(out, &patch)
        }

        Command::Repair { rows } => {
            let rows = input::load_rows(&rows)?;
            let planner = PositionPlanner::new(config.positions.clone());
            print_json(out, &planner.plan_repair(&rows))
        }
    }
}

fn print_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    writeln!(out, "{text}")?;
    Ok(())
}

fn print_lines(out: &mut dyn Write, lines: impl IntoIterator<Item = String>) -> Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
