// tests/unit_export.rs - Canonical text contract and round-trip
use flowprint_core::{analyze, TextCfg};

const SUM: &str = r#"
public class Sum {
    public int run(int n) {
        int sum = 0;
        for (i = 0; i < n; i++) {
            sum += i;
        }
        return sum;
    }
}
"#;

#[test]
fn rendering_matches_the_contract_byte_for_byte() {
    let graph = analyze(SUM, None, None).unwrap();
    let expected = "\
G describes a control flow graph of Method `Sum.run()`
In this graph:
Entry Point: Block 0 represents code snippet: int sum = 0;.
END Block: Block 4 represents code snippet: END.
Block 0 represents code snippet: int sum = 0;.
Block 1 represents code snippet: for (i = 0; i < n; i++) {.
Block 2 represents code snippet: sum += i;.
Block 3 represents code snippet: return sum;.
Block 4 represents code snippet: END.
Block 0 unconditional points to Block 1.
Block 1 match case \"i = 0; i < n; i++\" points to Block 2.
Block 1 not match case \"i = 0; i < n; i++\" points to Block 3.
Block 2 loop back to Block 1.
Block 3 unconditional points to Block 4.
";
    assert_eq!(graph.render(), expected);
}

#[test]
fn edges_are_sorted_and_deduplicated() {
    let graph = analyze(SUM, None, None).unwrap();
    let parsed = TextCfg::parse(&graph.render());
    let pairs: Vec<(u32, u32)> = parsed.edges.iter().map(|e| (e.0, e.2)).collect();
    let mut sorted = pairs.clone();
    sorted.sort_unstable();
    assert_eq!(pairs, sorted);

    let mut unique: Vec<_> = parsed.edges.clone();
    unique.dedup();
    assert_eq!(unique.len(), parsed.edges.len());
}

#[test]
fn round_trip_reconstructs_an_isomorphic_graph() {
    let graph = analyze(SUM, None, None).unwrap();
    let parsed = TextCfg::parse(&graph.render());

    // Every real block plus END, under its own id.
    assert_eq!(parsed.blocks.len(), graph.blocks.len() + 1);
    for (i, (id, code)) in parsed.blocks.iter().enumerate() {
        assert_eq!(*id as usize, i);
        if i < graph.blocks.len() {
            assert_eq!(code, &graph.blocks[i].code);
        } else {
            assert_eq!(code, "END");
        }
    }
    assert_eq!(parsed.edges.len(), graph.edges.len());
    for e in &graph.edges {
        assert!(
            parsed.edges.iter().any(|(f, _, t)| *f == e.from && *t == e.to),
            "edge {} -> {} lost in round trip",
            e.from,
            e.to
        );
    }
}

#[test]
fn json_export_carries_the_graph() {
    let graph = analyze(SUM, None, None).unwrap();
    let json = serde_json::to_string(&graph).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["signature"], "Sum.run()");
    assert_eq!(value["blocks"].as_array().unwrap().len(), 4);
    assert_eq!(value["partial"], false);
    assert!(value["edges"].as_array().unwrap().len() >= 5);
}

#[test]
fn rendering_a_second_time_changes_nothing() {
    let graph = analyze(SUM, None, None).unwrap();
    assert_eq!(graph.render(), graph.render());
}
