// SPDX-License-Identifier: AGPL-3.0-only

//! `sssp`: load a graph into an accelerator-shareable arena and run one query.
//!
//! ```text
//! USAGE:
//!   sssp run <graph> --start S --goal G [--mode MODE]   Answer one query
//!   sssp check <graph>                                  Load and report sizes
//!   sssp info                                           Describe the arena backing
//! ```
//!
//! Modes: `software` (heap arena), `software-on-device` (device arena, host
//! search) and `delegated` (device arena, accelerator search). Device modes
//! default to the udmabuf backing.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sssp_driver::channel::parse_poll_limit;
use sssp_driver::{
    Arena, ArenaBacking, ArenaConfig, ChannelConfig, ChannelVariant, CoherencyMode, MmioChannel,
};
use sssp_graph::{
    read_graph_file, ExecutionMode, GraphStore, IndexStrategy, PathEngine, Query,
    ReplayAccelerator,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sssp", about = "Accelerator-shareable shortest path engine", version)]
struct Cli {
    /// Log at debug level when RUST_LOG is unset.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Load a graph and answer one start/goal query.
    Run {
        /// Graph file (plain header + triples, or DIMACS).
        graph: PathBuf,
        /// Start node id.
        #[arg(long)]
        start: u32,
        /// Goal node id.
        #[arg(long)]
        goal: u32,
        /// software | software-on-device | delegated (or 0 / 1 / 2).
        #[arg(long, default_value = "software")]
        mode: ExecutionMode,
        #[command(flatten)]
        arena: ArenaArgs,
        #[command(flatten)]
        channel: ChannelArgs,
    },
    /// Load a graph and print its size and arena usage.
    Check {
        /// Graph file.
        graph: PathBuf,
        #[command(flatten)]
        arena: ArenaArgs,
    },
    /// Open the arena backing and print what was discovered.
    Info {
        #[command(flatten)]
        arena: ArenaArgs,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BackingKind {
    Heap,
    Udmabuf,
    Uio,
}

#[derive(Args)]
struct ArenaArgs {
    /// Arena backing; device modes default to udmabuf, software to heap.
    #[arg(long, value_enum)]
    backing: Option<BackingKind>,
    /// udmabuf instance name (overrides SSSP_UDMABUF).
    #[arg(long)]
    udmabuf: Option<String>,
    /// Coherency mode written to sync_mode (0-3 or a name).
    #[arg(long, default_value = "sync")]
    sync_mode: CoherencyMode,
    /// N in /sys/class/uio/uioN.
    #[arg(long, default_value_t = 0)]
    uio_index: u32,
    /// M in maps/mapM.
    #[arg(long, default_value_t = 0)]
    uio_map: u32,
    /// Heap backing size in MiB.
    #[arg(long, default_value_t = 64)]
    heap_mb: usize,
    /// Allocation granule in bytes (power of two).
    #[arg(long, default_value_t = ArenaConfig::DEFAULT_GRANULE)]
    granule: usize,
    /// Use a dense id table for ids 0..=MAX instead of the hashed index.
    #[arg(long, value_name = "MAX")]
    dense_max_id: Option<u32>,
    /// Bucket count of the hashed index.
    #[arg(long, default_value_t = 1024)]
    buckets: u32,
}

impl ArenaArgs {
    fn config(&self, device_memory: bool) -> ArenaConfig {
        let kind = self.backing.unwrap_or(if device_memory {
            BackingKind::Udmabuf
        } else {
            BackingKind::Heap
        });
        let backing = match kind {
            BackingKind::Heap => ArenaBacking::heap(self.heap_mb * 1024 * 1024),
            BackingKind::Udmabuf => match &self.udmabuf {
                Some(name) => ArenaBacking::Udmabuf {
                    name: name.clone(),
                    mode: self.sync_mode,
                },
                None => ArenaBacking::udmabuf(self.sync_mode),
            },
            BackingKind::Uio => ArenaBacking::Uio {
                index: self.uio_index,
                map: self.uio_map,
            },
        };
        ArenaConfig::new(backing).with_granule(self.granule)
    }

    fn index(&self) -> IndexStrategy {
        match self.dense_max_id {
            Some(max_id) => IndexStrategy::Dense { max_id },
            None => IndexStrategy::Hashed {
                buckets: self.buckets,
            },
        }
    }

    fn open(&self, device_memory: bool) -> Result<Arena> {
        let config = self.config(device_memory);
        Arena::open(&config).with_context(|| format!("opening arena {:?}", config.backing))
    }
}

#[derive(Args)]
struct ChannelArgs {
    /// Register window device (overrides SSSP_CHANNEL_DEVICE).
    #[arg(long)]
    channel_device: Option<PathBuf>,
    /// Skip STATUS polling around register accesses.
    #[arg(long)]
    unguarded: bool,
    /// Polls before a register wait times out; 0 or "unbounded" waits forever.
    #[arg(long)]
    poll_limit: Option<String>,
    /// Answer delegated queries with the software replay model.
    #[arg(long)]
    replay: bool,
}

impl ChannelArgs {
    fn config(&self) -> Result<ChannelConfig> {
        let mut config = ChannelConfig::from_env();
        if let Some(device) = &self.channel_device {
            config = config.with_device(device);
        }
        if self.unguarded {
            config = config.with_variant(ChannelVariant::Unguarded);
        }
        if let Some(limit) = &self.poll_limit {
            let Some(max_polls) = parse_poll_limit(limit) else {
                bail!("invalid --poll-limit {limit:?}");
            };
            config.poll.max_polls = max_polls;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .init();

    match cli.command {
        Cmd::Run {
            graph,
            start,
            goal,
            mode,
            arena,
            channel,
        } => cmd_run(&graph, Query::new(start, goal).with_mode(mode), &arena, &channel)?,
        Cmd::Check { graph, arena } => cmd_check(&graph, &arena)?,
        Cmd::Info { arena } => cmd_info(&arena)?,
    }

    Ok(())
}

fn load(path: &Path, arena: &ArenaArgs, device_memory: bool) -> Result<GraphStore> {
    let memory = arena.open(device_memory)?;
    tracing::debug!("Loading {} with {} index", path.display(), arena.index());
    read_graph_file(path, memory, arena.index())
        .with_context(|| format!("loading graph {}", path.display()))
}

fn cmd_run(path: &Path, query: Query, arena: &ArenaArgs, channel: &ChannelArgs) -> Result<()> {
    let mut graph = load(path, arena, query.mode.needs_device_memory())?;
    println!("num_nodes:{} num_edges:{}", graph.node_count(), graph.edge_count());

    let result = match query.mode {
        ExecutionMode::Delegated if channel.replay => {
            let mut replay = ReplayAccelerator::for_graph(&graph);
            let mut engine = PathEngine::with_channel(&mut graph, &mut replay);
            engine.run(&query)
        }
        ExecutionMode::Delegated => {
            let config = channel.config()?;
            let mut mmio = MmioChannel::open(&config)
                .with_context(|| format!("opening channel {}", config.device.display()))?;
            let mut engine = PathEngine::with_channel(&mut graph, &mut mmio);
            engine.run(&query)
        }
        ExecutionMode::Software | ExecutionMode::SoftwareOnDevice => {
            PathEngine::new(&mut graph).run(&query)
        }
    }
    .with_context(|| format!("query {} -> {}", query.start, query.goal))?;

    println!("{result}");
    Ok(())
}

fn cmd_check(path: &Path, arena: &ArenaArgs) -> Result<()> {
    let graph = load(path, arena, false)?;
    let config = graph.config();
    println!("Nodes        : {} (bound {})", graph.node_count(), config.node_bound);
    println!("Edges        : {} (bound {})", graph.edge_count(), config.edge_bound);
    println!("Edge pages   : {}", graph.page_count());
    println!("Index        : {}", config.index);
    println!("Frontier     : {} slots @ {:#010x}", graph.queue().capacity(), graph.queue().base_address());
    println!("Arena        : {}", graph.arena_stats());
    Ok(())
}

fn cmd_info(arena: &ArenaArgs) -> Result<()> {
    let arena = arena.open(false)?;
    println!("Backing      : {}", arena.backing_type());
    println!("Physical base: {:#010x}", arena.physical_base());
    println!("Capacity     : {} bytes", arena.capacity());
    println!("Coherency    : {} ({})", arena.coherency(), arena.coherency().as_raw());
    println!("Granule      : {} bytes", arena.granule());
    arena.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cmd {
        Cli::try_parse_from(args).expect("arguments").command
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn backing_follows_mode() {
        let Cmd::Run { mode, arena, .. } =
            parse(&["sssp", "run", "g.txt", "--start", "1", "--goal", "3", "--mode", "2"])
        else {
            panic!("expected run");
        };
        assert_eq!(mode, ExecutionMode::Delegated);
        assert!(matches!(
            arena.config(mode.needs_device_memory()).backing,
            ArenaBacking::Udmabuf { mode: CoherencyMode::Sync, .. }
        ));
        assert!(matches!(arena.config(false).backing, ArenaBacking::Heap { .. }));
    }

    #[test]
    fn arena_flags() {
        let Cmd::Check { arena, .. } = parse(&[
            "sssp", "check", "g.txt", "--backing", "uio", "--uio-index", "2", "--uio-map", "1",
            "--granule", "128", "--dense-max-id", "500",
        ]) else {
            panic!("expected check");
        };
        let config = arena.config(false);
        assert_eq!(config.backing, ArenaBacking::Uio { index: 2, map: 1 });
        assert_eq!(config.granule, 128);
        assert_eq!(arena.index(), IndexStrategy::Dense { max_id: 500 });
    }

    #[test]
    fn channel_flags() {
        let Cmd::Run { channel, .. } = parse(&[
            "sssp", "run", "g.txt", "--start", "1", "--goal", "2", "--unguarded",
            "--channel-device", "/dev/uio7", "--poll-limit", "unbounded",
        ]) else {
            panic!("expected run");
        };
        let config = channel.config().expect("config");
        assert_eq!(config.variant, ChannelVariant::Unguarded);
        assert_eq!(config.device, PathBuf::from("/dev/uio7"));
        assert_eq!(config.poll.max_polls, None);
    }

    #[test]
    fn bad_poll_limit_is_rejected() {
        let Cmd::Run { channel, .. } = parse(&[
            "sssp", "run", "g.txt", "--start", "1", "--goal", "2", "--poll-limit", "soon",
        ]) else {
            panic!("expected run");
        };
        assert!(channel.config().is_err());
    }
}
