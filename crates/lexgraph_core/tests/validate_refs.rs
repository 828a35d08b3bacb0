use lexgraph_core::{
    CopyPolicy, Destination, FindingKind, GraphStore, MemoryGraph, MultiText, NodeId,
    PropertyKind, ReferenceValidator, Schema, SchemaBuilder, Sequencer, Severity, WritingSystem,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn ws(tag: &str) -> WritingSystem {
    WritingSystem::parse(tag).unwrap()
}

/// Entry with two senses pointing at two distinct parts of speech, plus an
/// example under the second sense.
fn source_graph() -> (MemoryGraph, NodeId, Vec<NodeId>, Vec<NodeId>) {
    let mut graph = MemoryGraph::new(Schema::lexicon());
    let mut seq = Sequencer::new(&mut graph);

    let noun = seq.create("PartOfSpeech", &Destination::Root, |_| Ok(())).unwrap();
    let verb = seq.create("PartOfSpeech", &Destination::Root, |_| Ok(())).unwrap();
    let entry = seq
        .create("LexEntry", &Destination::Root, |node| {
            node.copy_alternatives_from(
                "CitationForm",
                &MultiText::new().with(ws("en"), "run"),
            )?;
            node.set_basic("HomographNumber", lexgraph_core::BasicValue::Integer(1))
        })
        .unwrap();

    let mut senses = Vec::new();
    for pos in [noun, verb] {
        let sense = seq
            .create("LexSense", &Destination::append(entry, "SensesOS"), |node| {
                node.set_references("PartOfSpeechRA", vec![pos])
            })
            .unwrap();
        senses.push(sense);
    }
    seq.create(
        "LexExampleSentence",
        &Destination::append(senses[1], "ExamplesOS"),
        |_| Ok(()),
    )
    .unwrap();

    (graph, entry, senses, vec![noun, verb])
}

#[test]
fn unresolved_references_are_critical_in_visit_order() {
    let (graph, entry, senses, parts) = source_graph();
    let target = MemoryGraph::new(Schema::lexicon());
    let validator = ReferenceValidator::new(Schema::lexicon(), CopyPolicy::deep());

    let report = validator.validate(&graph, &[entry], &target);

    assert!(report.has_critical());
    assert_eq!(report.visited(), 4);
    let criticals = report.criticals();
    assert_eq!(criticals.len(), 2);
    for (finding, (sense, pos)) in criticals.iter().zip(senses.iter().zip(&parts)) {
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(finding.node_id, *sense);
        assert_eq!(finding.class, "LexSense");
        assert_eq!(finding.property.as_deref(), Some("PartOfSpeechRA"));
        assert_eq!(finding.kind, FindingKind::UnresolvedReference { missing: *pos });
    }
}

#[test]
fn identity_set_target_resolves_references() {
    let (graph, entry, _, parts) = source_graph();
    let validator = ReferenceValidator::new(Schema::lexicon(), CopyPolicy::deep());

    let known: BTreeSet<NodeId> = parts.iter().copied().collect();
    let report = validator.validate(&graph, &[entry], &known);
    assert!(!report.has_critical());
    assert!(report.is_empty());

    let only_noun: BTreeSet<NodeId> = parts[..1].iter().copied().collect();
    let report = validator.validate(&graph, &[entry], &only_noun);
    assert_eq!(report.criticals().len(), 1);
}

#[test]
fn excluded_owned_content_is_a_warning_with_count() {
    let (graph, entry, senses, parts) = source_graph();
    let known: BTreeSet<NodeId> = parts.into_iter().collect();
    let validator = ReferenceValidator::new(
        Schema::lexicon(),
        CopyPolicy::deep().exclude("LexSense", "ExamplesOS"),
    );

    let report = validator.validate(&graph, &[entry], &known);

    assert!(!report.has_critical());
    assert_eq!(report.visited(), 3);
    let warnings = report.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].node_id, senses[1]);
    assert_eq!(
        warnings[0].kind,
        FindingKind::DroppedOwnedContent { child_count: 1 }
    );
}

#[test]
fn excluded_reference_property_is_not_checked() {
    let (graph, entry, _, _) = source_graph();
    let target = MemoryGraph::new(Schema::lexicon());
    let validator = ReferenceValidator::new(
        Schema::lexicon(),
        CopyPolicy::deep().exclude("LexSense", "PartOfSpeechRA"),
    );

    assert!(!validator.validate(&graph, &[entry], &target).has_critical());
}

#[test]
fn properties_unknown_to_target_schema_are_warnings() {
    let (graph, entry, _, parts) = source_graph();
    let known: BTreeSet<NodeId> = parts.into_iter().collect();
    let narrow = SchemaBuilder::new("narrow")
        .property("LexEntry", "CitationForm", PropertyKind::MultiText)
        .inferred("LexEntry", "SensesOS")
        .inferred("LexSense", "PartOfSpeechRA")
        .inferred("LexSense", "ExamplesOS")
        .class("LexExampleSentence")
        .build()
        .unwrap();
    let validator = ReferenceValidator::new(Arc::new(narrow), CopyPolicy::deep());

    let report = validator.validate(&graph, &[entry], &known);

    assert!(!report.has_critical());
    let warnings = report.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].node_id, entry);
    assert_eq!(warnings[0].property.as_deref(), Some("HomographNumber"));
    assert!(matches!(
        warnings[0].kind,
        FindingKind::UnclassifiedProperty { .. }
    ));
}

#[test]
fn missing_root_is_reported_and_scan_continues() {
    let (graph, entry, _, _) = source_graph();
    let target = MemoryGraph::new(Schema::lexicon());
    let validator = ReferenceValidator::new(Schema::lexicon(), CopyPolicy::deep());
    let missing = uuid::Uuid::new_v4();

    let report = validator.validate(&graph, &[missing, entry], &target);

    assert_eq!(report.findings()[0].node_id, missing);
    assert_eq!(report.findings()[0].kind, FindingKind::MissingSourceNode);
    assert_eq!(report.criticals().len(), 2);
    assert_eq!(graph.node_count(), 6);
}

#[test]
fn records_serialize_as_flat_list() {
    let (graph, entry, senses, parts) = source_graph();
    let target = MemoryGraph::new(Schema::lexicon());
    let validator = ReferenceValidator::new(Schema::lexicon(), CopyPolicy::deep());

    let records = validator.validate(&graph, &[entry], &target).records();
    let json = serde_json::to_value(&records).unwrap();

    let first = &json[0];
    assert_eq!(first["severity"], "critical");
    assert_eq!(first["node_id"], senses[0].to_string());
    assert_eq!(first["property"], "PartOfSpeechRA");
    assert_eq!(first["detail"], parts[0].to_string());
    assert!(first["message"]
        .as_str()
        .unwrap()
        .contains(&parts[0].to_string()));
    assert_eq!(json.as_array().unwrap().len(), 2);
}
