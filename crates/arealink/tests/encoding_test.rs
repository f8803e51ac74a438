use arealink::{encoding, max_cost, Graph, GraphDef, LinkDef, NodeDef};

fn bridged_def(singletons: bool) -> GraphDef {
    let cluster = |grouped: &str, own: &str| {
        if singletons {
            own.to_string()
        } else {
            grouped.to_string()
        }
    };
    GraphDef {
        nodes: vec![
            NodeDef { id: "A".into(), cluster: cluster("C1", "C1").into() },
            NodeDef { id: "B".into(), cluster: cluster("C1", "C2").into() },
            NodeDef { id: "C".into(), cluster: cluster("C1", "C3").into() },
            NodeDef { id: "D".into(), cluster: cluster("C2", "C4").into() },
            NodeDef { id: "E".into(), cluster: cluster("C2", "C5").into() },
            NodeDef { id: "F".into(), cluster: cluster("C3", "C6").into() },
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
fn json_round_trip_preserves_the_graph() {
    for singletons in [false, true] {
        let g = Graph::new(&bridged_def(singletons), max_cost);

        let data = encoding::encode(&g.graph_def()).expect("encode");
        let def = encoding::decode(&data).expect("decode");
        let h = Graph::new(&def, max_cost);

        assert_eq!(g, h, "round trip changed the graph (singletons: {singletons})");
    }
}

#[test]
fn wire_format_uses_capitalized_field_names() {
    let def = GraphDef {
        nodes: vec![NodeDef { id: "A".into(), cluster: "C1".into() }],
        links: vec![LinkDef { a: "A".into(), b: "B".into(), cost: 9 }],
    };
    let data = encoding::encode(&def).expect("encode");
    let value: serde_json::Value = serde_json::from_slice(&data).expect("valid JSON");

    assert_eq!(value["Nodes"][0]["ID"], "A");
    assert_eq!(value["Nodes"][0]["Cluster"], "C1");
    assert_eq!(value["Links"][0]["A"], "A");
    assert_eq!(value["Links"][0]["B"], "B");
    assert_eq!(value["Links"][0]["Cost"], 9);
}

#[test]
fn decode_rejects_malformed_json() {
    assert!(encoding::decode(b"{\"Nodes\": [").is_err());
    assert!(encoding::decode(b"[]").is_err());
}

#[test]
fn emission_is_canonical() {
    let g = Graph::new(&bridged_def(false), max_cost);
    let def = g.graph_def();

    assert_eq!(def.nodes.len(), 6);
    assert_eq!(def.links.len(), 7);
    for l in &def.links {
        assert!(l.a < l.b, "link {}-{} not in ascending order", l.a, l.b);
    }
    for pair in def.links.windows(2) {
        assert!(
            (&pair[0].a, &pair[0].b) < (&pair[1].a, &pair[1].b),
            "links not sorted"
        );
    }
    let mut nodes = def.nodes.clone();
    nodes.sort_by(|x, y| x.id.cmp(&y.id));
    assert_eq!(def.nodes, nodes);
}

#[test]
fn loader_tolerates_links_listed_in_both_directions() {
    let once = GraphDef {
        nodes: vec![
            NodeDef { id: "A".into(), cluster: "C1".into() },
            NodeDef { id: "B".into(), cluster: "C2".into() },
        ],
        links: vec![LinkDef { a: "A".into(), b: "B".into(), cost: 5 }],
    };
    let twice = GraphDef {
        nodes: once.nodes.clone(),
        links: vec![
            LinkDef { a: "A".into(), b: "B".into(), cost: 5 },
            LinkDef { a: "B".into(), b: "A".into(), cost: 5 },
        ],
    };

    let g = Graph::new(&once, max_cost);
    let h = Graph::new(&twice, max_cost);
    assert_eq!(g, h);
    assert_eq!(h.graph_def().links.len(), 1);
}
