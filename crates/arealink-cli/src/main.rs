use arealink::{encoding, max_cost, ClusterId, Graph, GraphDef, LinkDef, NodeDef, NodeId};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsStr;
use std::fmt::Write as _;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Parse(encoding::Error),
    EdgeList { line: usize, text: String },
    BulkFailed,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Parse(err) => write!(f, "parse error: {err}"),
            CliError::EdgeList { line, text } => {
                write!(f, "malformed edge-list line {line}: {text:?}")
            }
            CliError::BulkFailed => write!(f, "one or more conversions failed"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<encoding::Error> for CliError {
    fn from(value: encoding::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
enum Command {
    #[default]
    Simulate,
    Analyze,
    Convert,
    BulkConvert,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    graph: Option<String>,
    input: Option<String>,
    output: Option<String>,
    format: Option<String>,
    clusters: Option<String>,
    basic: bool,
    advanced: bool,
    basic_cluster: bool,
    max_cost: bool,
    verbose: bool,
}

fn usage() -> &'static str {
    "arealink-cli\n\
\n\
USAGE:\n\
  arealink-cli simulate --graph <file> [--output <dir>]\n\
  arealink-cli analyze --graph <file> [--basic] [--advanced] [--clusters <list|all>] [--basic-cluster] [--max-cost]\n\
  arealink-cli convert [--input <file|->] [--output <file|->] [--format edge-list]\n\
  arealink-cli bulk-convert [--input <dir>] [--output <dir>] [--format edge-list] [--verbose]\n\
\n\
NOTES:\n\
  - simulate writes the graph state to <dir>/NNNN.def before each round and\n\
    the round's pairings to <dir>/NNNN-merge.log; <dir> defaults to '.'.\n\
  - analyze's --clusters takes a comma-separated list of cluster ids, or\n\
    'all'; per-cluster output needs --basic-cluster and/or --max-cost.\n\
  - convert reads stdin/writes stdout when a path is omitted or '-'.\n\
  - the edge-list format is one 'a<TAB>b' pair per line; self-links are\n\
    dropped with a warning.\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut it = argv.iter().skip(1);
    let Some(cmd) = it.next() else {
        return Err(CliError::Usage(usage()));
    };
    let command = match cmd.as_str() {
        "simulate" => Command::Simulate,
        "analyze" => Command::Analyze,
        "convert" => Command::Convert,
        "bulk-convert" => Command::BulkConvert,
        "--help" | "-h" => return Err(CliError::Usage(usage())),
        _ => return Err(CliError::Usage(usage())),
    };

    let mut args = Args {
        command,
        ..Default::default()
    };

    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "--graph" => {
                let Some(v) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.graph = Some(v.clone());
            }
            "--input" => {
                let Some(v) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.input = Some(v.clone());
            }
            "--output" => {
                let Some(v) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.output = Some(v.clone());
            }
            "--format" => {
                let Some(v) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.format = Some(v.clone());
            }
            "--clusters" => {
                let Some(v) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.clusters = Some(v.clone());
            }
            "--basic" => args.basic = true,
            "--advanced" => args.advanced = true,
            "--basic-cluster" => args.basic_cluster = true,
            "--max-cost" => args.max_cost = true,
            "--verbose" => args.verbose = true,
            _ => return Err(CliError::Usage(usage())),
        }
    }

    Ok(args)
}

fn run(args: Args) -> Result<(), CliError> {
    match args.command {
        Command::Simulate => run_simulate(&args),
        Command::Analyze => run_analyze(&args),
        Command::Convert => run_convert(&args),
        Command::BulkConvert => run_bulk_convert(&args),
    }
}

fn load_graph(path: &str) -> Result<Graph, CliError> {
    let data = std::fs::read(path)?;
    let def = encoding::decode(&data)?;
    Ok(Graph::new(&def, max_cost))
}

fn run_simulate(args: &Args) -> Result<(), CliError> {
    let Some(graph_path) = args.graph.as_deref() else {
        return Err(CliError::Usage(usage()));
    };
    let out_dir = PathBuf::from(args.output.as_deref().unwrap_or("."));
    if !out_dir.is_dir() {
        return Err(CliError::Io(std::io::Error::other(format!(
            "bad output directory: {} is not a directory",
            out_dir.display()
        ))));
    }

    let mut g = load_graph(graph_path)?;

    // Pairings buffer up per round; the log flushes when the next round
    // starts (and once more after the stable round). Logfile failures are
    // reported but do not stop the run.
    let merge_log = RefCell::new(String::new());
    let mut round = 0usize;
    let t0 = Instant::now();
    let mut tprev = t0;

    g.merge_with(
        |g: &Graph| {
            if round == 0 {
                if let Err(err) = write_state(&out_dir, g, round) {
                    eprintln!("{err}");
                }
                println!("ROUND {round}...");
                round += 1;
                return;
            }

            let now = Instant::now();
            println!("Round {} took {:?}", round - 1, now - tprev);
            tprev = now;

            let mut log = merge_log.borrow_mut();
            if let Err(err) = write_merge_log(&out_dir, &log, round - 1) {
                eprintln!("{err}");
            }
            log.clear();
            if let Err(err) = write_state(&out_dir, g, round) {
                eprintln!("{err}");
            }
            println!();
            println!("ROUND {round}...");
            round += 1;
        },
        |c: &ClusterId, d: &ClusterId| {
            let _ = writeln!(merge_log.borrow_mut(), "{c}\t{d}");
        },
    );

    let now = Instant::now();
    println!("Round {} took {:?}", round - 1, now - tprev);
    if let Err(err) = write_merge_log(&out_dir, &merge_log.borrow(), round - 1) {
        eprintln!("{err}");
    }
    if let Err(err) = write_state(&out_dir, &g, round) {
        eprintln!("{err}");
    }

    println!();
    println!("Graph stabilized.");
    println!("{} rounds completed in {:?}", round - 1, now - t0);
    if round > 1 {
        println!("Average time per round: {:?}", (now - t0) / (round - 1) as u32);
    }
    Ok(())
}

fn write_state(dir: &Path, g: &Graph, round: usize) -> Result<(), CliError> {
    let data = encoding::encode(&g.graph_def())?;
    std::fs::write(dir.join(format!("{round:04}.def")), data)?;
    Ok(())
}

fn write_merge_log(dir: &Path, log: &str, round: usize) -> Result<(), CliError> {
    std::fs::write(dir.join(format!("{round:04}-merge.log")), log)?;
    Ok(())
}

fn run_analyze(args: &Args) -> Result<(), CliError> {
    let Some(graph_path) = args.graph.as_deref() else {
        return Err(CliError::Usage(usage()));
    };
    let g = load_graph(graph_path)?;

    let mut selected: Vec<ClusterId> = match args.clusters.as_deref() {
        Some("all") => g.clusters().map(|c| c.id().clone()).collect(),
        Some(list) => {
            let mut ids = Vec::new();
            for part in list.split(',') {
                // Allow a trailing comma (or "all," should a cluster be
                // literally named "all").
                if part.is_empty() {
                    continue;
                }
                if g.cluster(part).is_none() {
                    eprintln!("Nonexistent cluster ID: {part}");
                    continue;
                }
                ids.push(ClusterId::from(part));
            }
            ids
        }
        None => Vec::new(),
    };
    selected.sort();
    selected.dedup();

    let mut printed = false;
    if args.basic {
        println!("BASIC STATISTICS");
        print_basic(&g);
        printed = true;
    }

    if args.advanced {
        if printed {
            println!();
        }
        printed = true;
        println!("ADVANCED STATISTICS");
        if args.max_cost {
            print_overall_max_cost(&g);
        }
    }

    if !selected.is_empty() {
        if printed {
            println!();
        }
        println!("PER-CLUSTER ANALYSIS");
        for cid in &selected {
            println!("  {cid}:");
            let Some(c) = g.cluster(cid.as_str()) else {
                continue;
            };
            if args.basic_cluster {
                println!("    Number of nodes: {}", c.num_nodes());
                println!("    Number of border nodes: {}", c.num_border_nodes(&g));
                println!("    Number of border edges: {}", c.num_border_edges(&g));
                println!("    Number of internal edges: {}", c.num_edges(&g));
            }
            if args.max_cost {
                println!("    MaxCost: {}", max_cost(&g, cid));
            }
        }
    }

    Ok(())
}

fn sorted_clusters(g: &Graph) -> Vec<&arealink::Cluster> {
    let mut clusters: Vec<_> = g.clusters().collect();
    clusters.sort_by(|a, b| a.id().cmp(b.id()));
    clusters
}

fn print_basic(g: &Graph) {
    let num_nodes = g.num_nodes();
    let num_clusters = g.num_clusters();
    println!("  Number of nodes: {num_nodes}");
    println!("  Number of clusters: {num_clusters}");
    println!(
        "  Average nodes per cluster: {:.2}",
        num_nodes as f64 / num_clusters as f64
    );

    let border_nodes = g.nodes().filter(|n| n.is_border_node(g)).count();
    println!("  Number of border nodes: {border_nodes}");
    println!(
        "  Average border nodes per cluster: {:.2}",
        border_nodes as f64 / num_clusters as f64
    );

    let edges: usize = g.nodes().map(|n| n.num_edges()).sum::<usize>() / 2;
    println!("  Number of edges: {edges}");
    println!(
        "  Average edges per node: {:.2}",
        (2 * edges) as f64 / num_nodes as f64
    );

    let border_edges: usize = g.nodes().map(|n| n.num_edges_out_cluster(g)).sum::<usize>() / 2;
    println!("  Number of border edges: {border_edges}");
    println!(
        "  Average border edges per cluster: {:.2}",
        (2 * border_edges) as f64 / num_clusters as f64
    );
    println!();

    let mut biggest: Option<(&ClusterId, usize)> = None;
    let mut smallest: Option<(&ClusterId, usize)> = None;
    let mut border_biggest: Option<(&ClusterId, usize)> = None;
    let mut border_smallest: Option<(&ClusterId, usize)> = None;
    for c in sorted_clusters(g) {
        let n = c.num_nodes();
        if biggest.is_none_or(|(_, best)| n > best) {
            biggest = Some((c.id(), n));
        }
        if smallest.is_none_or(|(_, best)| n < best) {
            smallest = Some((c.id(), n));
        }

        let b = c.num_border_nodes(g);
        if border_biggest.is_none_or(|(_, best)| b > best) {
            border_biggest = Some((c.id(), b));
        }
        if border_smallest.is_none_or(|(_, best)| b < best) {
            border_smallest = Some((c.id(), b));
        }
    }
    if let Some((id, n)) = biggest {
        println!("  Cluster with most nodes: {id} ({n})");
    }
    if let Some((id, n)) = smallest {
        println!("  Cluster with fewest nodes: {id} ({n})");
    }
    if let Some((id, n)) = border_biggest {
        println!("  Cluster with most border nodes: {id} ({n})");
    }
    if let Some((id, n)) = border_smallest {
        println!("  Cluster with fewest border nodes: {id} ({n})");
    }
}

fn print_overall_max_cost(g: &Graph) {
    let mut total = 0usize;
    let mut highest: Option<(&ClusterId, usize)> = None;
    let mut lowest: Option<(&ClusterId, usize)> = None;
    for c in sorted_clusters(g) {
        let cost = max_cost(g, c.id());
        total += cost;
        if highest.is_none_or(|(_, best)| cost > best) {
            highest = Some((c.id(), cost));
        }
        if lowest.is_none_or(|(_, best)| cost < best) {
            lowest = Some((c.id(), cost));
        }
    }

    println!(
        "    Average MaxCost: {}",
        total as f64 / g.num_clusters() as f64
    );
    println!("    Total MaxCost: {total}");
    if let Some((id, cost)) = highest {
        println!("    Cluster with highest MaxCost: {id} ({cost})");
    }
    if let Some((id, cost)) = lowest {
        println!("    Cluster with lowest MaxCost: {id} ({cost})");
    }
}

fn run_convert(args: &Args) -> Result<(), CliError> {
    check_format(args)?;

    let input = args.input.as_deref().unwrap_or("-");
    let data = if input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(input)?
    };

    let def = parse_edge_list(&data)?;
    let encoded = encoding::encode(&def)?;

    let output = args.output.as_deref().unwrap_or("-");
    if output == "-" {
        use std::io::Write;
        std::io::stdout().lock().write_all(&encoded)?;
    } else {
        std::fs::write(output, &encoded)?;
    }
    Ok(())
}

fn check_format(args: &Args) -> Result<(), CliError> {
    match args.format.as_deref() {
        None | Some("edge-list") => Ok(()),
        Some(_) => Err(CliError::Usage(usage())),
    }
}

// One tab-separated node pair per line. Every endpoint becomes a node in its
// own singleton cluster; each undirected link appears once with cost 1.
fn parse_edge_list(data: &str) -> Result<GraphDef, CliError> {
    let mut nodes: BTreeMap<NodeId, NodeDef> = BTreeMap::new();
    let mut links: BTreeSet<(NodeId, NodeId)> = BTreeSet::new();

    for (i, line) in data.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let &[a, b] = fields.as_slice() else {
            return Err(CliError::EdgeList {
                line: i + 1,
                text: line.to_string(),
            });
        };
        if a.is_empty() || b.is_empty() {
            return Err(CliError::EdgeList {
                line: i + 1,
                text: line.to_string(),
            });
        }

        let a = NodeId::from(a);
        let b = NodeId::from(b);
        if a == b {
            eprintln!("Omitting illegal self-link for node {a}");
        }
        for id in [&a, &b] {
            nodes.insert(
                id.clone(),
                NodeDef {
                    id: id.clone(),
                    cluster: ClusterId::from(id.as_str()),
                },
            );
        }
        if a != b {
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            links.insert((lo, hi));
        }
    }

    Ok(GraphDef {
        nodes: nodes.into_values().collect(),
        links: links
            .into_iter()
            .map(|(a, b)| LinkDef { a, b, cost: 1 })
            .collect(),
    })
}

fn run_bulk_convert(args: &Args) -> Result<(), CliError> {
    check_format(args)?;

    let input = PathBuf::from(args.input.as_deref().unwrap_or("."));
    let output = PathBuf::from(args.output.as_deref().unwrap_or("."));
    for dir in [&input, &output] {
        if !dir.is_dir() {
            return Err(CliError::Io(std::io::Error::other(format!(
                "{} is not a directory",
                dir.display()
            ))));
        }
    }
    if input.canonicalize()? == output.canonicalize()? {
        return Err(CliError::Usage(usage()));
    }

    let mut entries: Vec<_> = std::fs::read_dir(&input)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    let mut failed = false;
    for entry in entries {
        match entry.file_type() {
            Ok(ty) if ty.is_dir() => continue,
            Ok(_) => {}
            Err(err) => {
                // One unreadable entry must not end the sweep.
                eprintln!("{}: I/O error: {err}", entry.path().display());
                failed = true;
                continue;
            }
        }
        let from = entry.path();
        let to = output.join(sanitize(&entry.file_name()));
        if args.verbose {
            println!("{} -> {}", from.display(), to.display());
        }
        if let Err(err) = convert_file(&from, &to) {
            eprintln!("{}: {err}", from.display());
            failed = true;
        }
    }

    if failed {
        return Err(CliError::BulkFailed);
    }
    Ok(())
}

fn convert_file(from: &Path, to: &Path) -> Result<(), CliError> {
    let data = std::fs::read_to_string(from)?;
    let def = parse_edge_list(&data)?;
    std::fs::write(to, encoding::encode(&def)?)?;
    Ok(())
}

// "graph.txt" -> "graph.def"; an extensionless name just gains ".def".
fn sanitize(name: &OsStr) -> PathBuf {
    let path = Path::new(name);
    let stem = path.file_stem().unwrap_or(name);
    let mut out = stem.to_os_string();
    out.push(".def");
    PathBuf::from(out)
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(args) {
        eprintln!("{err}");
        let code = match err {
            CliError::Usage(_) => 2,
            CliError::Io(_) => 3,
            CliError::Parse(_) | CliError::EdgeList { .. } => 4,
            CliError::BulkFailed => 1,
        };
        std::process::exit(code);
    }
}
