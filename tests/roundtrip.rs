//! End-to-end decode/encode/diff tests over both dialects.

use cyberiadaml::diff::DiffOptions;
use cyberiadaml::meta::{EventPropagation, TransitionOrder};
use cyberiadaml::model::{ActionKind, NodeKind};
use cyberiadaml::{
    Dialect, ReadOptions, Verdict, WriteOptions, check_isomorphism, decode_document,
    encode_document,
};

const MINIMAL: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <data key="gFormat">Cyberiada-GraphML-1.0</data>
  <graph id="G" edgedefault="directed">
    <data key="dStateMachine"/>
    <data key="dName">Lamp</data>
    <node id="i1">
      <data key="dVertex">initial</data>
    </node>
    <node id="s1">
      <data key="dName">On</data>
      <data key="dData">entry/ led_on()</data>
    </node>
    <edge id="e1" source="i1" target="s1">
      <data key="dData"></data>
    </edge>
  </graph>
</graphml>
"#;

fn read_opts() -> ReadOptions {
    ReadOptions {
        check_initial: true,
        ..ReadOptions::default()
    }
}

#[test]
fn minimal_document_decodes_with_default_metadata() {
    let doc = decode_document(MINIMAL.as_bytes(), None, &read_opts()).unwrap();
    assert_eq!(doc.format.as_deref(), Some("Cyberiada-GraphML-1.0"));
    assert_eq!(doc.state_machines.len(), 1);

    let meta = doc.meta.as_ref().unwrap();
    assert_eq!(meta.standard_version, "1.0");
    assert_eq!(meta.transition_order(), TransitionOrder::TransitionFirst);
    assert_eq!(meta.event_propagation(), EventPropagation::Block);

    let sm = &doc.state_machines[0];
    assert_eq!(sm.root.title.as_deref(), Some("Lamp"));
    assert_eq!(sm.find_node("i1").unwrap().kind, NodeKind::Initial);
    let on = sm.find_node("s1").unwrap();
    assert_eq!(on.actions.len(), 1);
    assert_eq!(on.actions[0].kind, ActionKind::Entry);
    assert_eq!(on.actions[0].behavior, "led_on()");
    assert_eq!(sm.edges.len(), 1);
    assert!(sm.edges[0].action.is_none());
}

#[test]
fn simple_state_with_children_is_promoted() {
    let input = r#"<?xml version="1.0" encoding="utf-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <data key="gFormat">Cyberiada-GraphML-1.0</data>
  <graph id="G" edgedefault="directed">
    <data key="dStateMachine"/>
    <data key="dName">Nested</data>
    <node id="c">
      <graph id="c:" edgedefault="directed">
        <node id="s"/>
      </graph>
    </node>
  </graph>
</graphml>
"#;
    let doc = decode_document(input.as_bytes(), None, &ReadOptions::default()).unwrap();
    let c = doc.state_machines[0].find_node("c").unwrap();
    assert_eq!(c.kind, NodeKind::CompositeState);
    assert_eq!(c.children.len(), 1);
}

#[test]
fn unnamed_nodes_and_edges_get_ids() {
    let input = r#"<?xml version="1.0" encoding="utf-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <data key="gFormat">Cyberiada-GraphML-1.0</data>
  <graph id="G" edgedefault="directed">
    <data key="dStateMachine"/>
    <data key="dName">Anon</data>
    <node id=""/>
    <node id=""/>
    <node id=""/>
    <node id="s1"/>
    <edge source="" target="s1"/>
  </graph>
</graphml>
"#;
    let doc = decode_document(input.as_bytes(), None, &ReadOptions::default()).unwrap();
    let sm = &doc.state_machines[0];
    let ids: Vec<&str> = sm.root.children.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["n0", "n1", "n2", "s1"]);
    assert_eq!(sm.edges[0].source, "n0");
    assert_eq!(sm.edges[0].id, "n0-s1");
}

#[test]
fn metadata_comment_round_trips() {
    let input = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n\
  <data key=\"gFormat\">Cyberiada-GraphML-1.0</data>\n\
  <graph id=\"G\" edgedefault=\"directed\">\n\
    <data key=\"dStateMachine\"/>\n\
    <data key=\"dName\">Demo SM</data>\n\
    <node id=\"nMeta\">\n\
      <data key=\"dNote\">formal</data>\n\
      <data key=\"dName\">CGML_META</data>\n\
      <data key=\"dData\">standardVersion/ 1.0\n\nname/ Demo\n\ntransitionOrder/ exitFirst\n\neventPropagation/ propagate</data>\n\
    </node>\n\
    <node id=\"s1\"/>\n\
  </graph>\n\
</graphml>\n";
    let doc = decode_document(input.as_bytes(), None, &ReadOptions::default()).unwrap();
    let meta = doc.meta.clone().unwrap();
    assert_eq!(meta.name.as_deref(), Some("Demo"));
    assert_eq!(meta.transition_order(), TransitionOrder::ExitFirst);
    assert_eq!(meta.event_propagation(), EventPropagation::Propagate);

    let bytes = encode_document(&doc, Dialect::Cyberiada10, &WriteOptions::default()).unwrap();
    let again = decode_document(&bytes, None, &ReadOptions::default()).unwrap();
    assert_eq!(again.meta, doc.meta);
}

const RICH: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <data key="gFormat">Cyberiada-GraphML-1.0</data>
  <graph id="G" edgedefault="directed">
    <data key="dStateMachine"/>
    <data key="dName">Player</data>
    <node id="i1">
      <data key="dVertex">initial</data>
      <data key="dGeometry">
        <point x="10" y="20"/>
      </data>
    </node>
    <node id="idle">
      <data key="dName">Idle</data>
      <data key="dData">entry/ stop()</data>
      <data key="dGeometry">
        <rect x="0" y="40" width="120" height="60"/>
      </data>
      <data key="dColor">#88aaff</data>
    </node>
    <node id="play">
      <data key="dName">Playing</data>
      <graph id="play:" edgedefault="directed">
        <node id="play::fast">
          <data key="dName">Fast</data>
          <data key="dData">entry/ speed(2)</data>
        </node>
        <node id="play::hist">
          <data key="dVertex">shallowHistory</data>
        </node>
      </graph>
    </node>
    <node id="choice1">
      <data key="dVertex">choice</data>
      <data key="dGeometry">
        <rect x="5" y="5" width="30" height="30"/>
      </data>
    </node>
    <node id="linked">
      <data key="dSubmachineState">Player2</data>
    </node>
    <node id="note1">
      <data key="dNote">informal</data>
      <data key="dData">remember to tune</data>
      <data key="dMarkup">md</data>
    </node>
    <edge id="e1" source="i1" target="idle"/>
    <edge id="e2" source="idle" target="play">
      <data key="dData">play [ready] / start()</data>
      <data key="dGeometry">
        <point x="1" y="2"/>
        <point x="3" y="4"/>
      </data>
      <data key="dSourcePoint">
        <point x="0" y="1"/>
      </data>
      <data key="dTargetPoint">
        <point x="2" y="3"/>
      </data>
      <data key="dLabelGeometry">
        <rect x="7" y="8" width="20" height="10"/>
      </data>
    </edge>
    <edge id="e3" source="play" target="choice1"/>
    <edge id="e4" source="choice1" target="idle">
      <data key="dData">[tired] / rest()</data>
    </edge>
    <edge id="c1" source="note1" target="idle">
      <data key="dPivot">dName</data>
      <data key="dChunk">Idle</data>
    </edge>
  </graph>
</graphml>
"#;

#[test]
fn native_round_trip_is_diff_equal() {
    let doc = decode_document(RICH.as_bytes(), None, &read_opts()).unwrap();
    let bytes = encode_document(&doc, Dialect::Cyberiada10, &WriteOptions::default()).unwrap();
    let again = decode_document(&bytes, None, &read_opts()).unwrap();

    let opts = DiffOptions {
        ignore_comments: true,
        require_initial: true,
    };
    let result = check_isomorphism(
        &doc.state_machines[0],
        &again.state_machines[0],
        opts,
    )
    .unwrap();
    assert!(
        matches!(result.verdict, Verdict::Identical | Verdict::Equal),
        "round trip verdict was {:?}",
        result.verdict
    );
}

#[test]
fn native_round_trip_preserves_details() {
    let doc = decode_document(RICH.as_bytes(), None, &read_opts()).unwrap();
    let bytes = encode_document(&doc, Dialect::Cyberiada10, &WriteOptions::default()).unwrap();
    let again = decode_document(&bytes, None, &read_opts()).unwrap();
    let sm = &again.state_machines[0];

    // geometry survives byte-exact through the writer
    let initial = sm.find_node("i1").unwrap();
    assert_eq!(initial.geometry_point().map(|p| (p.x, p.y)), Some((10.0, 20.0)));
    let idle = sm.find_node("idle").unwrap();
    let rect = idle.geometry_rect().unwrap();
    assert_eq!((rect.x, rect.y, rect.width, rect.height), (0.0, 40.0, 120.0, 60.0));
    assert_eq!(idle.color.as_deref(), Some("#88aaff"));

    // nested structure and pseudostates
    let play = sm.find_node("play").unwrap();
    assert_eq!(play.kind, NodeKind::CompositeState);
    assert_eq!(
        sm.find_node("play::hist").unwrap().kind,
        NodeKind::ShallowHistory
    );
    assert_eq!(
        sm.find_node("linked").unwrap().link.as_ref().unwrap().r#ref,
        "Player2"
    );

    // comment and its subject edge
    let note = sm.find_node("note1").unwrap();
    assert_eq!(note.kind, NodeKind::Comment);
    let data = note.comment_data.as_ref().unwrap();
    assert_eq!(data.body.as_deref(), Some("remember to tune"));
    assert_eq!(data.markup.as_deref(), Some("md"));
    let subject_edge = sm.find_edge("c1").unwrap();
    assert!(subject_edge.comment_subject.is_some());

    // transition details
    let e2 = sm.find_edge("e2").unwrap();
    let action = e2.action.as_ref().unwrap();
    assert_eq!(action.trigger, "play");
    assert_eq!(action.guard, "ready");
    assert_eq!(action.behavior, "start()");
    assert_eq!(e2.polyline.as_ref().map(Vec::len), Some(2));
    assert!(e2.source_point.is_some());
    assert!(e2.target_point.is_some());
    assert!(e2.label.is_some());
}

#[test]
fn legacy_round_trip_is_diff_equal() {
    let doc = decode_document(MINIMAL.as_bytes(), None, &read_opts()).unwrap();
    let bytes = encode_document(&doc, Dialect::LegacyYed, &WriteOptions::default()).unwrap();
    let again = decode_document(&bytes, None, &read_opts()).unwrap();
    assert_eq!(again.format.as_deref(), Some("yEd Ostranna"));

    let opts = DiffOptions {
        ignore_comments: true,
        require_initial: true,
    };
    let result = check_isomorphism(
        &doc.state_machines[0],
        &again.state_machines[0],
        opts,
    )
    .unwrap();
    assert!(
        matches!(result.verdict, Verdict::Identical | Verdict::Equal),
        "legacy round trip verdict was {:?}",
        result.verdict
    );
}

#[test]
fn legacy_round_trip_keeps_the_hierarchy() {
    let input = r#"<?xml version="1.0" encoding="utf-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <data key="gFormat">Cyberiada-GraphML-1.0</data>
  <graph id="G" edgedefault="directed">
    <data key="dStateMachine"/>
    <data key="dName">Nested</data>
    <node id="i1">
      <data key="dVertex">initial</data>
      <data key="dGeometry">
        <point x="50" y="50"/>
      </data>
    </node>
    <node id="top">
      <data key="dName">Top</data>
      <graph id="top:" edgedefault="directed">
        <node id="top::inner">
          <data key="dName">Inner</data>
          <data key="dData">entry/ beep()</data>
        </node>
      </graph>
    </node>
    <edge id="e1" source="i1" target="top"/>
    <edge id="e2" source="top" target="top::inner">
      <data key="dData">dive / enter()</data>
    </edge>
  </graph>
</graphml>
"#;
    let doc = decode_document(input.as_bytes(), None, &read_opts()).unwrap();
    let bytes = encode_document(&doc, Dialect::LegacyYed, &WriteOptions::default()).unwrap();
    let again = decode_document(&bytes, None, &read_opts()).unwrap();
    let sm = &again.state_machines[0];

    let top = sm.find_node("top").unwrap();
    assert_eq!(top.kind, NodeKind::CompositeState);
    assert_eq!(top.title.as_deref(), Some("Top"));
    let inner = sm.find_node("top::inner").unwrap();
    assert_eq!(inner.title.as_deref(), Some("Inner"));
    assert_eq!(inner.actions.len(), 1);
    assert_eq!(inner.actions[0].behavior, "beep()");

    // the initial point survives via the rect-center conversion
    let initial = sm.find_node("i1").unwrap();
    assert_eq!(initial.geometry_point().map(|p| (p.x, p.y)), Some((50.0, 50.0)));

    let dive = sm
        .edges
        .iter()
        .find(|e| e.action.as_ref().is_some_and(|a| a.trigger == "dive"))
        .unwrap();
    assert_eq!(dive.action.as_ref().unwrap().behavior, "enter()");
}

#[test]
fn legacy_export_requires_a_single_machine() {
    let two = r#"<?xml version="1.0" encoding="utf-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <data key="gFormat">Cyberiada-GraphML-1.0</data>
  <graph id="G1" edgedefault="directed">
    <data key="dStateMachine"/>
    <data key="dName">First</data>
    <node id="a"/>
  </graph>
  <graph id="G2" edgedefault="directed">
    <data key="dStateMachine"/>
    <data key="dName">Second</data>
    <node id="b"/>
  </graph>
</graphml>
"#;
    let doc = decode_document(two.as_bytes(), None, &ReadOptions::default()).unwrap();
    assert_eq!(doc.state_machines.len(), 2);
    assert!(encode_document(&doc, Dialect::LegacyYed, &WriteOptions::default()).is_err());
    assert!(encode_document(&doc, Dialect::Cyberiada10, &WriteOptions::default()).is_ok());
}

#[test]
fn dialect_hint_conflicts_are_xml_errors() {
    let result = decode_document(
        MINIMAL.as_bytes(),
        Some(Dialect::LegacyYed),
        &ReadOptions::default(),
    );
    assert!(matches!(
        result,
        Err(cyberiadaml::CyberiadaError::Xml(_))
    ));
}

#[test]
fn skip_geometry_drops_every_coordinate() {
    let opts = ReadOptions {
        skip_geometry: true,
        ..ReadOptions::default()
    };
    let doc = decode_document(RICH.as_bytes(), None, &opts).unwrap();
    assert!(!doc.has_geometry());
}

#[test]
fn document_supplied_key_ids_override_the_defaults() {
    let input = r#"<?xml version="1.0" encoding="utf-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <data key="gFormat">Cyberiada-GraphML-1.0</data>
  <key id="x7" for="node" attr.name="name" attr.type="string"/>
  <key id="x9" for="node" attr.name="vertex" attr.type="string"/>
  <graph id="G" edgedefault="directed">
    <data key="dStateMachine"/>
    <data key="dName">Custom</data>
    <node id="i1">
      <data key="x9">initial</data>
    </node>
    <node id="s1">
      <data key="x7">Renamed key</data>
    </node>
  </graph>
</graphml>
"#;
    let doc = decode_document(input.as_bytes(), None, &ReadOptions::default()).unwrap();
    let sm = &doc.state_machines[0];
    assert_eq!(sm.find_node("i1").unwrap().kind, NodeKind::Initial);
    assert_eq!(
        sm.find_node("s1").unwrap().title.as_deref(),
        Some("Renamed key")
    );
}

#[test]
fn round_geometry_truncates_to_integers_on_export() {
    let input = r#"<?xml version="1.0" encoding="utf-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <data key="gFormat">Cyberiada-GraphML-1.0</data>
  <graph id="G" edgedefault="directed">
    <data key="dStateMachine"/>
    <data key="dName">Fract</data>
    <node id="s1">
      <data key="dGeometry">
        <rect x="10.4" y="19.6" width="100.2" height="59.9"/>
      </data>
    </node>
  </graph>
</graphml>
"#;
    let doc = decode_document(input.as_bytes(), None, &ReadOptions::default()).unwrap();
    let opts = WriteOptions {
        round_geometry: true,
        ..WriteOptions::default()
    };
    let bytes = encode_document(&doc, Dialect::Cyberiada10, &opts).unwrap();
    let again = decode_document(&bytes, None, &ReadOptions::default()).unwrap();
    let rect = again.state_machines[0]
        .find_node("s1")
        .unwrap()
        .geometry_rect()
        .unwrap();
    assert_eq!((rect.x, rect.y, rect.width, rect.height), (10.0, 20.0, 100.0, 60.0));

    // the caller's document is untouched
    let rect = doc.state_machines[0]
        .find_node("s1")
        .unwrap()
        .geometry_rect()
        .unwrap();
    assert_eq!(rect.x, 10.4);
}

#[test]
fn renamed_documents_compare_equal() {
    let renamed = RICH
        .replace("\"idle\"", "\"state_a\"")
        .replace("\"play\"", "\"state_b\"")
        .replace("\"play:\"", "\"state_b:\"")
        .replace("\"play::fast\"", "\"state_b::fast\"")
        .replace("\"play::hist\"", "\"state_b::hist\"");
    let doc1 = decode_document(RICH.as_bytes(), None, &read_opts()).unwrap();
    let doc2 = decode_document(renamed.as_bytes(), None, &read_opts()).unwrap();
    let opts = DiffOptions {
        ignore_comments: true,
        require_initial: true,
    };
    let result = check_isomorphism(
        &doc1.state_machines[0],
        &doc2.state_machines[0],
        opts,
    )
    .unwrap();
    assert_eq!(result.verdict, Verdict::Equal);
    assert!(result.diff_nodes.iter().all(|(_, _, d)| d.id));
}
