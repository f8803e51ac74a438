use arealink::{encoding, max_cost, Graph, GraphDef, LinkDef, NodeDef};
use assert_cmd::Command;

fn cli() -> Command {
    Command::cargo_bin("arealink-cli").expect("binary builds")
}

fn sample_def() -> GraphDef {
    GraphDef {
        nodes: vec![
            NodeDef { id: "A".into(), cluster: "C1".into() },
            NodeDef { id: "B".into(), cluster: "C1".into() },
            NodeDef { id: "C".into(), cluster: "C1".into() },
            NodeDef { id: "D".into(), cluster: "C2".into() },
            NodeDef { id: "E".into(), cluster: "C2".into() },
            NodeDef { id: "F".into(), cluster: "C3".into() },
        ],
        links: vec![
            LinkDef { a: "A".into(), b: "B".into(), cost: 1 },
            LinkDef { a: "B".into(), b: "C".into(), cost: 2 },
            LinkDef { a: "C".into(), b: "A".into(), cost: 3 },
            LinkDef { a: "C".into(), b: "D".into(), cost: 4 },
            LinkDef { a: "D".into(), b: "E".into(), cost: 5 },
            LinkDef { a: "E".into(), b: "F".into(), cost: 6 },
            LinkDef { a: "F".into(), b: "D".into(), cost: 7 },
        ],
    }
}

#[test]
fn no_subcommand_exits_with_usage() {
    cli().assert().failure().code(2);
}

#[test]
fn convert_turns_an_edge_list_into_a_graph_def() {
    let assert = cli()
        .arg("convert")
        .write_stdin("a\tb\nb\tc\n\nc\ta\n")
        .assert()
        .success();

    let def = encoding::decode(&assert.get_output().stdout).expect("valid def JSON");
    assert_eq!(def.nodes.len(), 3);
    assert_eq!(def.links.len(), 3);
    for n in &def.nodes {
        assert_eq!(n.id.as_str(), n.cluster.as_str());
    }
    for l in &def.links {
        assert!(l.a < l.b);
        assert_eq!(l.cost, 1);
    }
}

#[test]
fn convert_drops_self_links_with_a_warning() {
    let assert = cli()
        .arg("convert")
        .write_stdin("a\ta\na\tb\n")
        .assert()
        .success();

    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("self-link"), "stderr was: {stderr}");

    let def = encoding::decode(&assert.get_output().stdout).expect("valid def JSON");
    assert_eq!(def.nodes.len(), 2);
    assert_eq!(def.links.len(), 1);
}

#[test]
fn convert_rejects_malformed_lines() {
    cli()
        .arg("convert")
        .write_stdin("a\tb\tc\n")
        .assert()
        .failure()
        .code(4);
}

#[test]
fn simulate_writes_round_state_and_merge_logs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let graph_file = dir.path().join("input.json");
    std::fs::write(
        &graph_file,
        encoding::encode(&sample_def()).expect("encode"),
    )
    .expect("write input");

    let out_dir = tempfile::tempdir().expect("tempdir");
    cli()
        .args(["simulate", "--graph"])
        .arg(&graph_file)
        .arg("--output")
        .arg(out_dir.path())
        .assert()
        .success();

    let initial = out_dir.path().join("0000.def");
    assert!(initial.exists(), "missing initial state file");
    let data = std::fs::read(&initial).expect("read state");
    let def = encoding::decode(&data).expect("state file parses");
    let g = Graph::new(&def, max_cost);
    assert_eq!(g, Graph::new(&sample_def(), max_cost));

    assert!(
        out_dir.path().join("0000-merge.log").exists(),
        "missing merge log"
    );
}

#[test]
fn analyze_prints_basic_statistics() {
    let dir = tempfile::tempdir().expect("tempdir");
    let graph_file = dir.path().join("input.json");
    std::fs::write(
        &graph_file,
        encoding::encode(&sample_def()).expect("encode"),
    )
    .expect("write input");

    let assert = cli()
        .args(["analyze", "--basic", "--graph"])
        .arg(&graph_file)
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("Number of nodes: 6"), "stdout was: {stdout}");
    assert!(stdout.contains("Number of clusters: 3"));
    assert!(stdout.contains("Number of edges: 7"));
}

#[test]
fn analyze_reports_per_cluster_max_cost() {
    let dir = tempfile::tempdir().expect("tempdir");
    let graph_file = dir.path().join("input.json");
    std::fs::write(
        &graph_file,
        encoding::encode(&sample_def()).expect("encode"),
    )
    .expect("write input");

    // The repeated id and the trailing comma are both tolerated.
    let assert = cli()
        .args(["analyze", "--max-cost", "--clusters", "C2,C2,", "--graph"])
        .arg(&graph_file)
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("PER-CLUSTER ANALYSIS"), "stdout was: {stdout}");
    assert_eq!(stdout.matches("MaxCost: 3").count(), 1, "stdout was: {stdout}");
}

#[test]
fn bulk_convert_sweeps_a_directory() {
    let in_dir = tempfile::tempdir().expect("tempdir");
    let out_dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(in_dir.path().join("one.txt"), "a\tb\n").expect("write");
    std::fs::write(in_dir.path().join("two.txt"), "x\ty\ny\tz\n").expect("write");

    cli()
        .args(["bulk-convert", "--input"])
        .arg(in_dir.path())
        .arg("--output")
        .arg(out_dir.path())
        .assert()
        .success();

    for (name, links) in [("one.def", 1), ("two.def", 2)] {
        let data = std::fs::read(out_dir.path().join(name)).expect("converted file");
        let def = encoding::decode(&data).expect("parses");
        assert_eq!(def.links.len(), links, "{name}");
    }
}
