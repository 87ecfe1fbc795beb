use flag_arbiter_core::*;
use serde_json::json;

fn payload(v: serde_json::Value) -> Params {
    v.as_object().cloned().unwrap_or_default()
}

fn push(facts: &mut FactStore, cat: &str, v: serde_json::Value, ts: f64) {
    facts.push(Fact::new(cat, payload(v), ts));
}

fn quake_graph() -> FlagGraph {
    [
        Flag::upper("alert", "Alert").with_priority(Some(1)).with_link("quake"),
        Flag::lower("quake", "Quake")
            .with_on_condition(Condition::fact(FactTrigger::EewNew))
            .with_off_condition(Condition::fact(FactTrigger::EewCancel)),
    ]
    .into_iter()
    .collect()
}

#[test]
fn eew_started_lights_lower_and_upper_in_one_tick() {
    let mut g = quake_graph();
    let mut facts = FactStore::default();
    let mut engine = StabilizationEngine::default();
    push(&mut facts, category::EEW_STARTED, json!({ "is_new": true }), 0.0);

    let report = engine.tick(&mut g, &facts, 0.0);
    assert!(report.converged);
    assert!(g.state_of("quake"));
    assert!(g.state_of("alert"));
    assert_eq!(select_winner(g.iter()).map(|f| f.id.as_str()), Some("alert"));
    let ids: Vec<&str> = report.changes.iter().map(|c| c.flag_id.as_str()).collect();
    assert_eq!(ids, ["quake", "alert"]);
}

#[test]
fn tick_without_new_facts_is_idempotent() {
    let mut g = quake_graph();
    let mut facts = FactStore::default();
    let mut engine = StabilizationEngine::default();
    push(&mut facts, category::EEW_STARTED, json!({ "is_new": true }), 0.0);
    engine.tick(&mut g, &facts, 0.0);

    let before = g.clone();
    for t in 1..5 {
        let report = engine.tick(&mut g, &facts, t as f64);
        assert!(report.is_quiet());
        assert_eq!(report.passes, 1);
    }
    assert_eq!(g, before);
}

#[test]
fn chained_lowers_settle_within_one_tick() {
    let mut g: FlagGraph = [
        Flag::upper("u", "U").with_link("b"),
        Flag::lower("a", "A").with_on_condition(Condition::fact(FactTrigger::DetailReceived)),
        Flag::lower("b", "B").with_on_condition(Condition::flag_on("a")),
    ]
    .into_iter()
    .collect();
    let mut facts = FactStore::default();
    push(&mut facts, category::DETAIL_RECEIVED, json!({}), 3.0);

    let report = StabilizationEngine::default().tick(&mut g, &facts, 3.0);
    assert!(report.converged);
    assert_eq!(report.passes, 3);
    assert!(g.state_of("a") && g.state_of("b") && g.state_of("u"));
}

#[test]
fn delayed_on_condition_waits_full_delay() {
    let mut g: FlagGraph = [Flag::lower("quake", "Quake")
        .with_on_condition(Condition::fact(FactTrigger::EewNew).with_delay(5.0))]
    .into_iter()
    .collect();
    let mut facts = FactStore::default();
    let mut engine = StabilizationEngine::default();
    push(&mut facts, category::EEW_STARTED, json!({ "is_new": true }), 0.0);

    let r0 = engine.tick(&mut g, &facts, 0.0);
    assert_eq!(r0.scheduled, 1);
    assert!(!g.state_of("quake"));

    // Still satisfied on later ticks, but the first ready_at stands.
    let r3 = engine.tick(&mut g, &facts, 3.0);
    assert_eq!(r3.scheduled, 0);
    assert_eq!(engine.scheduler().entries()[0].ready_at, 5.0);

    engine.tick(&mut g, &facts, 4.999);
    assert!(!g.state_of("quake"));

    let r5 = engine.tick(&mut g, &facts, 5.0);
    assert_eq!(r5.fired, 1);
    assert!(g.state_of("quake"));
    assert_eq!(g.get("quake").unwrap().last_change_time, Some(5.0));
}

#[test]
fn pending_transition_fires_once_without_revalidation() {
    let mut g: FlagGraph = [Flag::lower("quake", "Quake")
        .with_on_condition(Condition::fact(FactTrigger::EewNew).with_delay(2.0))]
    .into_iter()
    .collect();
    let mut facts = FactStore::default();
    let mut engine = StabilizationEngine::default();

    push(&mut facts, category::EEW_STARTED, json!({ "is_new": true }), 0.0);
    engine.tick(&mut g, &facts, 0.0);
    // The condition stops holding before the delay runs out.
    push(&mut facts, category::EEW_STARTED, json!({ "is_new": false }), 1.0);
    engine.tick(&mut g, &facts, 1.0);

    let fired = engine.tick(&mut g, &facts, 2.0);
    assert_eq!(fired.fired, 1);
    assert!(g.state_of("quake"));
    assert!(engine.scheduler().is_empty());
    assert_eq!(engine.tick(&mut g, &facts, 3.0).fired, 0);
}

#[test]
fn off_wins_when_both_directions_hold() {
    let mut g = quake_graph();
    let mut facts = FactStore::default();
    let mut engine = StabilizationEngine::default();
    push(&mut facts, category::EEW_STARTED, json!({ "is_new": true }), 0.0);
    push(&mut facts, category::EEW_CANCELED, json!({ "is_canceled": true }), 0.0);

    let report = engine.tick(&mut g, &facts, 0.0);
    assert!(report.is_quiet());
    assert!(!g.state_of("quake"));
}

#[test]
fn upper_tracks_or_of_lowers_when_both_drop_together() {
    let lower = |id: &str| {
        Flag::lower(id, id)
            .with_on_condition(Condition::fact(FactTrigger::EewNew))
            .with_off_condition(Condition::fact(FactTrigger::EewCancel))
    };
    let mut g: FlagGraph = [Flag::upper("u", "U").with_link("l1").with_link("l2"), lower("l1"), lower("l2")]
        .into_iter()
        .collect();
    let mut facts = FactStore::default();
    let mut engine = StabilizationEngine::default();
    let or_holds = |g: &FlagGraph| g.state_of("u") == (g.state_of("l1") || g.state_of("l2"));

    push(&mut facts, category::EEW_STARTED, json!({ "is_new": true }), 0.0);
    engine.tick(&mut g, &facts, 0.0);
    assert!(g.state_of("u"));
    assert!(or_holds(&g));

    push(&mut facts, category::EEW_CANCELED, json!({ "is_canceled": true }), 1.0);
    let report = engine.tick(&mut g, &facts, 1.0);
    assert!(!g.state_of("l1") && !g.state_of("l2"));
    assert!(!g.state_of("u"));
    assert!(or_holds(&g));
    assert_eq!(report.net_changes().len(), 3);
}

#[test]
fn cyclic_flags_hit_the_pass_cap_and_keep_partial_state() {
    let mut g: FlagGraph = [
        Flag::lower("a", "A")
            .with_on_condition(Condition::flag_off("b"))
            .with_off_condition(Condition::flag_on("b")),
        Flag::lower("b", "B")
            .with_on_condition(Condition::flag_off("a"))
            .with_off_condition(Condition::flag_on("a")),
    ]
    .into_iter()
    .collect();
    let cfg = EngineCfg {
        max_passes: 7,
        ..EngineCfg::default()
    };
    let report = StabilizationEngine::new(cfg).tick(&mut g, &FactStore::default(), 0.0);
    assert!(!report.converged);
    assert_eq!(report.passes, 7);
    assert_eq!(report.changes.len(), 14);
    // Odd pass count leaves both on.
    assert!(g.state_of("a") && g.state_of("b"));
}

#[test]
fn winner_scenarios() {
    let up = |id: &str, p: Option<i64>, t: f64| Flag::upper(id, id).with_priority(p).with_state(true, Some(t));
    let win = |flags: [Flag; 2]| select_winner(&flags).map(|f| f.id.clone());

    assert_eq!(win([up("A", Some(1), 0.0), up("B", Some(2), 0.0)]).as_deref(), Some("A"));
    assert_eq!(win([up("A", None, 10.0), up("B", None, 20.0)]).as_deref(), Some("B"));
    assert_eq!(win([up("A", Some(3), 5.0), up("B", Some(3), 8.0)]).as_deref(), Some("B"));
}

#[test]
fn arbitration_is_a_pure_function_of_the_snapshot() {
    let g: FlagGraph = [
        Flag::upper("x", "X").with_state(true, Some(2.0)),
        Flag::upper("y", "Y").with_state(true, Some(2.0)),
        Flag::upper("z", "Z").with_priority(Some(9)).with_state(true, Some(1.0)),
    ]
    .into_iter()
    .collect();
    let first = select_winner(g.iter()).map(|f| f.id.clone());
    for _ in 0..10 {
        assert_eq!(select_winner(g.clone().iter()).map(|f| f.id.clone()), first);
    }
    assert_eq!(first.as_deref(), Some("z"));
}

#[test]
fn document_round_trip_is_exact() {
    let g: FlagGraph = [
        Flag::upper("a", "A").with_state(true, Some(1_700_000_000.123_456_7)).with_link("l"),
        Flag::upper("b", "B").with_priority(Some(-3)),
        Flag::upper("c", "C").with_priority(Some(i64::MAX)).with_state(false, Some(0.1)),
        Flag::lower("l", "L")
            .with_state(true, Some(1_700_000_000.123_456_7))
            .with_on_condition(Condition::fact(FactTrigger::EewWarningNew).with_delay(2.5))
            .with_on_action(Action::show_subitem("Main", 7)),
    ]
    .into_iter()
    .collect();

    let first = FlagDocument::from_graph(&g).to_json_pretty().unwrap();
    let restored = FlagDocument::from_json(&first).unwrap().into_graph();
    let second = FlagDocument::from_graph(&restored).to_json_pretty().unwrap();
    assert_eq!(first, second);
    assert_eq!(restored, g);
    assert_eq!(restored.get("b").unwrap().priority(), Some(-3));
    assert_eq!(restored.get("a").unwrap().priority(), None);
}

#[test]
fn unknown_kinds_survive_round_trip() {
    let raw = json!({
        "metadata": { "version": "2.0" },
        "upper_flags": [],
        "lower_flags": [{
            "id": "l", "name": "L", "type": "lower", "priority": null,
            "last_state_change_time": null, "state": false,
            "on_actions": [{ "type": "ring_bell", "params": { "times": 3 } }],
            "off_actions": [],
            "on_conditions": [{ "type": "moon_phase", "params": { "phase": "full" }, "delay": 0.0 }],
            "off_conditions": []
        }]
    });
    let g = serde_json::from_value::<FlagDocument>(raw.clone()).unwrap().into_graph();
    let mut facts = FactStore::default();
    push(&mut facts, category::EEW_STARTED, json!({ "is_new": true }), 0.0);
    let mut gg = g.clone();
    assert!(StabilizationEngine::default().tick(&mut gg, &facts, 0.0).is_quiet());

    let back = serde_json::to_value(FlagDocument::from_graph(&g)).unwrap();
    assert_eq!(back["lower_flags"], raw["lower_flags"]);
}

#[test]
fn known_kinds_keep_unread_params_on_round_trip() {
    let raw = json!({
        "metadata": { "version": "2.0" },
        "upper_flags": [{
            "id": "u", "name": "U", "type": "upper", "priority": 1,
            "last_state_change_time": null, "state": false,
            "linked_lower_flags": ["l"],
            "on_actions": [{ "type": "switch_resource", "params": { "name": "Quake", "transition": "fade" } }],
            "off_actions": []
        }],
        "lower_flags": [{
            "id": "l", "name": "L", "type": "lower", "priority": null,
            "last_state_change_time": null, "state": false,
            "on_actions": [{ "type": "show_subitem", "params": { "resource": "Main", "item_id": "7" } }],
            "off_actions": [],
            "on_conditions": [{
                "type": "eew_new",
                "params": { "intensity_filter": "5강", "note": "keep me" },
                "delay": 0.0
            }],
            "off_conditions": []
        }]
    });
    let g = serde_json::from_value::<FlagDocument>(raw.clone()).unwrap().into_graph();
    let u = g.get("u").unwrap();
    assert_eq!(u.on_actions, vec![Action::switch_resource("Quake")]);
    assert_eq!(g.get("l").unwrap().on_actions, vec![Action::show_subitem("Main", 7)]);

    let back = serde_json::to_value(FlagDocument::from_graph(&g)).unwrap();
    assert_eq!(back["lower_flags"][0]["on_conditions"], raw["lower_flags"][0]["on_conditions"]);
    assert_eq!(back["lower_flags"][0]["on_actions"], raw["lower_flags"][0]["on_actions"]);
    assert_eq!(back["upper_flags"][0]["on_actions"], raw["upper_flags"][0]["on_actions"]);
}

#[test]
fn labelled_document_loads_and_ticks() {
    let raw = json!({
        "upper_flags": [{
            "id": "alert", "name": "Alert", "type": "upper", "priority": 1,
            "linked_lower_flags": ["quake"],
            "on_actions": [{ "type": "장면 전환", "params": { "scene_name": "Quake" } }]
        }],
        "lower_flags": [{
            "id": "quake", "name": "Quake", "type": "lower",
            "on_conditions": [{ "type": "EEW 신규 발표", "params": { "intensity_filter": "필터 없음" }, "delay": 0 }],
            "off_conditions": [{ "type": "EEW 취소보", "params": { "intensity_filter": "진도 5약 이상" } }],
            "on_actions": [{ "type": "필터 활성화", "params": { "source_name": "Cam", "filter_name": "Red" } }]
        }]
    });
    let doc: FlagDocument = serde_json::from_value(raw.clone()).unwrap();
    let mut g = doc.into_graph();
    let quake = g.get("quake").unwrap();
    assert_eq!(quake.on_conditions(), [Condition::fact(FactTrigger::EewNew)]);
    assert_eq!(
        quake.off_conditions(),
        [Condition::fact_filtered(
            FactTrigger::EewCancel,
            AnnouncementFilter::default().min_intensity(Intensity::FiveLower)
        )]
    );
    assert_eq!(quake.on_actions, vec![Action::enable_filter("Cam", "Red")]);
    assert_eq!(g.get("alert").unwrap().on_actions, vec![Action::switch_resource("Quake")]);

    let mut facts = FactStore::default();
    push(&mut facts, category::EEW_STARTED, json!({ "is_new": true }), 0.0);
    StabilizationEngine::default().tick(&mut g, &facts, 0.0);
    assert!(g.get("quake").unwrap().state);
    assert!(g.get("alert").unwrap().state);

    let back = serde_json::to_value(FlagDocument::from_graph(&g)).unwrap();
    assert_eq!(back["upper_flags"][0]["on_actions"], raw["upper_flags"][0]["on_actions"]);
    assert_eq!(back["lower_flags"][0]["on_conditions"][0]["type"], json!("EEW 신규 발표"));
}
