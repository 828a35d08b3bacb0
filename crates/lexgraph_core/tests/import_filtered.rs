use lexgraph_core::{
    BasicValue, CopyPolicy, Destination, DuplicateError, FindingKind, GraphError, GraphStore,
    ImportError, ImportFilter, ImportRequest, ImportService, ImportState, MemoryGraph, MultiText,
    NodeId, NodeImportOutcome, PropertyValue, Schema, SchemaError, Sequencer, WritingSystem,
};
use std::collections::BTreeSet;

fn ws(tag: &str) -> WritingSystem {
    WritingSystem::parse(tag).unwrap()
}

struct Scenario {
    source: MemoryGraph,
    entry_a: NodeId,
    s1: NodeId,
    s2: NodeId,
    p1: NodeId,
}

/// Entry A owns senses [S1, S2]; S1 references part of speech P1.
fn scenario() -> Scenario {
    let mut source = MemoryGraph::new(Schema::lexicon());

    source.set_clock(1_000);
    let p1 = Sequencer::new(&mut source)
        .create("PartOfSpeech", &Destination::Root, |node| {
            node.multi_text_mut("Name")?.set(ws("en"), "verb");
            Ok(())
        })
        .unwrap();
    source.set_clock(2_000);
    let entry_a = Sequencer::new(&mut source)
        .create("LexEntry", &Destination::Root, |node| {
            let form = MultiText::new().with(ws("seh"), "-famba");
            node.copy_alternatives_from("CitationForm", &form)
        })
        .unwrap();
    source.set_clock(3_000);
    let s1 = Sequencer::new(&mut source)
        .create("LexSense", &Destination::append(entry_a, "SensesOS"), |node| {
            node.multi_text_mut("Gloss")?.set(ws("en"), "walk");
            node.set_references("PartOfSpeechRA", vec![p1])
        })
        .unwrap();
    source.set_clock(4_000);
    let s2 = Sequencer::new(&mut source)
        .create("LexSense", &Destination::append(entry_a, "SensesOS"), |node| {
            node.multi_text_mut("Gloss")?.set(ws("en"), "travel");
            Ok(())
        })
        .unwrap();

    Scenario {
        source,
        entry_a,
        s1,
        s2,
        p1,
    }
}

fn only(id: NodeId) -> ImportFilter {
    ImportFilter::Ids(BTreeSet::from([id]))
}

/// Target holding the shared part-of-speech node under the same identity.
fn target_with(p1: NodeId) -> MemoryGraph {
    let mut target = MemoryGraph::new(Schema::lexicon());
    let mut seq = Sequencer::new(&mut target);
    let handle = seq.allocate_with_id("PartOfSpeech", p1).unwrap();
    seq.attach(handle, &Destination::Root).unwrap();
    target
}

#[test]
fn missing_reference_target_blocks_import() {
    let sc = scenario();
    let mut target = MemoryGraph::new(Schema::lexicon());
    let request = ImportRequest::new("LexEntry").with_filter(only(sc.entry_a));

    let result = ImportService::new(&sc.source)
        .import_filtered(&mut target, &request)
        .unwrap();

    assert_eq!(
        result.trace,
        vec![
            ImportState::Selecting,
            ImportState::Validating,
            ImportState::Blocked
        ]
    );
    assert!(result.is_blocked());
    assert_eq!(result.counts.created_roots, 0);
    assert_eq!(result.counts.created_nodes, 0);
    assert_eq!(target.node_count(), 0);

    let criticals = result.criticals();
    assert_eq!(criticals.len(), 1);
    assert_eq!(criticals[0].node_id, sc.s1);
    assert_eq!(criticals[0].property.as_deref(), Some("PartOfSpeechRA"));
    assert_eq!(
        criticals[0].kind,
        FindingKind::UnresolvedReference { missing: sc.p1 }
    );
}

#[test]
fn present_reference_target_allows_import_with_fresh_identities() {
    let sc = scenario();
    let mut target = target_with(sc.p1);
    let request = ImportRequest::new("LexEntry").with_filter(only(sc.entry_a));

    let result = ImportService::new(&sc.source)
        .import_filtered(&mut target, &request)
        .unwrap();

    assert_eq!(result.final_state(), ImportState::Done);
    assert_eq!(result.counts.created_roots, 1);
    assert_eq!(result.counts.created_nodes, 3);
    assert_eq!(target.node_count(), 4);

    let report = match &result.outcomes[0].outcome {
        NodeImportOutcome::Created(report) => report,
        other => panic!("expected created outcome, got {other:?}"),
    };
    let new_entry = target.resolve(report.root).unwrap();
    let senses = new_entry.owned("SensesOS");
    assert_eq!(senses.len(), 2);

    let glosses: Vec<_> = senses
        .iter()
        .map(|id| {
            target
                .resolve(*id)
                .unwrap()
                .multi_text("Gloss")
                .unwrap()
                .get(&ws("en"))
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(glosses, vec!["walk", "travel"]);

    let originals = [sc.entry_a, sc.s1, sc.s2];
    let fresh = [report.root, senses[0], senses[1]];
    assert!(fresh.iter().all(|id| !originals.contains(id)));
    assert_eq!(fresh.iter().collect::<BTreeSet<_>>().len(), 3);
    assert_eq!(
        target.resolve(senses[0]).unwrap().references("PartOfSpeechRA"),
        &[sc.p1]
    );
}

#[test]
fn dry_run_reports_without_writing() {
    let sc = scenario();
    let mut target = target_with(sc.p1);
    let before = target.node_count();
    let request = ImportRequest::new("LexEntry").with_dry_run(true);

    let result = ImportService::new(&sc.source)
        .import_filtered(&mut target, &request)
        .unwrap();

    assert_eq!(target.node_count(), before);
    assert_eq!(
        result.trace,
        vec![
            ImportState::Selecting,
            ImportState::Validating,
            ImportState::Ready,
            ImportState::Reporting,
            ImportState::Done
        ]
    );
    assert_eq!(result.final_state(), ImportState::Done);
    assert_eq!(result.counts.planned_nodes, 3);
    assert_eq!(result.counts.created_nodes, 0);
    assert_eq!(
        result.outcomes[0].outcome,
        NodeImportOutcome::Planned { node_count: 3 }
    );
}

#[test]
fn dry_run_with_criticals_is_still_blocked() {
    let sc = scenario();
    let mut target = MemoryGraph::new(Schema::lexicon());
    let request = ImportRequest::new("LexEntry").with_dry_run(true);

    let result = ImportService::new(&sc.source)
        .import_filtered(&mut target, &request)
        .unwrap();

    assert!(result.is_blocked());
    assert!(result.outcomes.is_empty());
    assert_eq!(target.node_count(), 0);
}

#[test]
fn override_writes_despite_criticals() {
    let sc = scenario();
    let mut target = MemoryGraph::new(Schema::lexicon());
    let request = ImportRequest::new("LexEntry").with_allow_critical(true);

    let result = ImportService::new(&sc.source)
        .import_filtered(&mut target, &request)
        .unwrap();

    assert_eq!(result.final_state(), ImportState::Done);
    assert_eq!(result.criticals().len(), 1);
    assert_eq!(target.node_count(), 3);
}

#[test]
fn skipping_validation_goes_straight_to_ready() {
    let sc = scenario();
    let mut target = MemoryGraph::new(Schema::lexicon());
    let request = ImportRequest::new("LexSense").with_validation(false);

    let result = ImportService::new(&sc.source)
        .import_filtered(&mut target, &request)
        .unwrap();

    assert_eq!(
        result.trace,
        vec![
            ImportState::Selecting,
            ImportState::Ready,
            ImportState::Writing,
            ImportState::Done
        ]
    );
    assert!(result.report.is_none());
    assert_eq!(result.selected, vec![sc.s1, sc.s2]);
    assert_eq!(target.node_count(), 2);
}

#[test]
fn filters_select_by_time_and_predicate() {
    let mut source = MemoryGraph::new(Schema::lexicon());
    let mut ids = Vec::new();
    for (stamp, form) in [(1_000, "old"), (2_000, "mid"), (3_000, "new")] {
        source.set_clock(stamp);
        let id = Sequencer::new(&mut source)
            .create("LexEntry", &Destination::Root, |node| {
                node.multi_text_mut("CitationForm")?.set(ws("en"), form);
                Ok(())
            })
            .unwrap();
        ids.push(id);
    }
    source.set_clock(5_000);
    source
        .set_property(
            ids[0],
            "HomographNumber",
            PropertyValue::Basic(BasicValue::Integer(1)),
        )
        .unwrap();

    let service = ImportService::new(&source);
    let select = |filter: ImportFilter| {
        let mut target = MemoryGraph::new(Schema::lexicon());
        let request = ImportRequest::new("LexEntry")
            .with_filter(filter)
            .with_dry_run(true);
        service.import_filtered(&mut target, &request).unwrap().selected
    };

    assert_eq!(select(ImportFilter::All), ids);
    assert_eq!(select(ImportFilter::CreatedAfter(1_500)), ids[1..].to_vec());
    assert_eq!(select(ImportFilter::ModifiedAfter(4_000)), vec![ids[0]]);
    assert_eq!(
        select(ImportFilter::matching(|node| {
            node.multi_text("CitationForm")
                .and_then(|form| form.get(&WritingSystem::parse("en").unwrap()))
                == Some("mid")
        })),
        vec![ids[1]]
    );
}

#[test]
fn import_under_destination_parent_and_policy() {
    let sc = scenario();
    let mut target = target_with(sc.p1);
    let host = Sequencer::new(&mut target)
        .create("LexEntry", &Destination::Root, |_| Ok(()))
        .unwrap();
    let request = ImportRequest::new("LexSense")
        .with_filter(only(sc.s1))
        .with_destination(Destination::append(host, "SensesOS"))
        .with_policy(CopyPolicy::deep().exclude("LexSense", "ExamplesOS"));

    let result = ImportService::new(&sc.source)
        .import_filtered(&mut target, &request)
        .unwrap();

    assert_eq!(result.counts.created_roots, 1);
    assert_eq!(target.resolve(host).unwrap().owned("SensesOS").len(), 1);
}

#[test]
fn import_rejects_unknown_class_and_missing_destination() {
    let sc = scenario();
    let mut target = MemoryGraph::new(Schema::lexicon());
    let service = ImportService::new(&sc.source);

    let err = service
        .import_filtered(&mut target, &ImportRequest::new("Lemma"))
        .unwrap_err();
    assert_eq!(
        err,
        ImportError::Schema(SchemaError::UnknownClass("Lemma".to_string()))
    );

    let missing = uuid::Uuid::new_v4();
    let request = ImportRequest::new("LexEntry")
        .with_destination(Destination::append(missing, "EntriesOC"));
    assert_eq!(
        service.import_filtered(&mut target, &request).unwrap_err(),
        ImportError::DestinationNotFound(missing)
    );
}

#[test]
fn allocation_failure_skips_remaining_nodes() {
    let sc = scenario();
    let mut target = MemoryGraph::with_capacity_limit(Schema::lexicon(), 1);
    let request = ImportRequest::new("LexSense").with_validation(false);

    let result = ImportService::new(&sc.source)
        .import_filtered(&mut target, &request)
        .unwrap();

    assert_eq!(result.final_state(), ImportState::Done);
    assert_eq!(result.counts.created_roots, 1);
    assert_eq!(result.counts.failed, 1);
    assert_eq!(result.counts.skipped, 0);
    assert!(matches!(
        &result.outcomes[1].outcome,
        NodeImportOutcome::Failed(err) if err.is_allocation()
    ));

    let mut tiny = MemoryGraph::with_capacity_limit(Schema::lexicon(), 0);
    let result = ImportService::new(&sc.source)
        .import_filtered(&mut tiny, &request)
        .unwrap();
    assert_eq!(result.counts.failed, 1);
    assert_eq!(result.counts.skipped, 1);
    assert_eq!(result.outcomes[1].outcome, NodeImportOutcome::Skipped);
    assert!(matches!(
        &result.outcomes[0].outcome,
        NodeImportOutcome::Failed(DuplicateError::Graph(GraphError::Allocation { .. }))
    ));
}

#[test]
fn interrupted_copy_reports_nodes_left_in_target() {
    let sc = scenario();
    let mut target = MemoryGraph::with_capacity_limit(Schema::lexicon(), 2);
    let request = ImportRequest::new("LexEntry").with_validation(false);

    let result = ImportService::new(&sc.source)
        .import_filtered(&mut target, &request)
        .unwrap();

    assert_eq!(result.final_state(), ImportState::Done);
    assert_eq!(target.node_count(), 2);
    assert_eq!(result.counts.created_roots, 0);
    assert_eq!(result.counts.created_nodes, 2);
    assert_eq!(result.counts.failed, 1);

    let err = match &result.outcomes[0].outcome {
        NodeImportOutcome::Failed(err) => err,
        other => panic!("expected failed outcome, got {other:?}"),
    };
    assert!(err.is_allocation());
    let created: Vec<NodeId> = err.created().iter().map(|(source, _)| *source).collect();
    assert_eq!(created, vec![sc.entry_a, sc.s1]);
    let partial = target.resolve(err.partial_root().unwrap()).unwrap();
    assert_eq!(partial.owned("SensesOS").len(), 1);
}
