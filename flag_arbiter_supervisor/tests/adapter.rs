use flag_arbiter_core::category;
use flag_arbiter_supervisor::*;
use serde_json::{json, Value};

fn eew(event: &str) -> EewBulletin {
    EewBulletin {
        event_id: event.into(),
        ..EewBulletin::default()
    }
}

fn categories(drafts: &[FactDraft]) -> Vec<&'static str> {
    drafts.iter().map(|d| d.category).collect()
}

#[test]
fn first_sighting_starts_and_later_bulletins_update() {
    let mut a = BulletinAdapter::new();
    let batch = [
        Bulletin::Eew(eew("ev1")),
        Bulletin::Eew(eew("ev1")),
        Bulletin::Eew(eew("ev2")),
    ];
    let drafts = build_fact_batch(&mut a, &batch);
    assert_eq!(
        categories(&drafts),
        [category::EEW_STARTED, category::EEW_UPDATED, category::EEW_STARTED]
    );
    assert_eq!(drafts[0].payload["is_new"], Value::Bool(true));
    assert_eq!(drafts[1].payload["is_new"], Value::Bool(false));
    assert_eq!(a.seen_len(), 2);
}

#[test]
fn cancel_beats_final_beats_warning() {
    let mut a = BulletinAdapter::new();
    let all = EewBulletin {
        is_canceled: true,
        is_final: true,
        is_warning: true,
        ..eew("ev")
    };
    let fin = EewBulletin {
        is_canceled: false,
        ..all.clone()
    };
    let warn = EewBulletin {
        is_final: false,
        ..fin.clone()
    };
    let drafts = build_fact_batch(&mut a, &[Bulletin::Eew(all), Bulletin::Eew(fin), Bulletin::Eew(warn)]);
    assert_eq!(
        categories(&drafts),
        [category::EEW_CANCELED, category::EEW_FINAL, category::EEW_WARNING]
    );
    // Still counted as the first sighting even though it was a cancellation.
    assert_eq!(drafts[0].payload["is_new"], Value::Bool(true));
}

#[test]
fn eew_payload_carries_intensity_and_serial() {
    let mut a = BulletinAdapter::new();
    let b = EewBulletin {
        serial_no: Some(3),
        max_intensity: Some("5-".into()),
        source: "feed".into(),
        ..eew("ev")
    };
    let d = a.build(&Bulletin::Eew(b)).remove(0);
    assert_eq!(d.payload["max_intensity"], json!("5-"));
    assert_eq!(d.payload["serial_no"], json!(3));
    assert_eq!(d.payload["source"], json!("feed"));

    let bare = a.build(&Bulletin::Eew(eew("other"))).remove(0);
    assert_eq!(bare.payload["max_intensity"], Value::Null);
    assert!(!bare.payload.contains_key("serial_no"));
}

#[test]
fn reports_open_the_event_and_unknown_types_are_dropped() {
    let mut a = BulletinAdapter::new();
    let report = |kind: &str| {
        Bulletin::Report(ReportBulletin {
            event_id: "ev".into(),
            report_type: kind.into(),
            ..ReportBulletin::default()
        })
    };
    let drafts = build_fact_batch(
        &mut a,
        &[report("sokuhou"), report("epicenter"), report("detail"), report("hypocenter")],
    );
    assert_eq!(
        categories(&drafts),
        [
            category::SOKUHOU_RECEIVED,
            category::EPICENTER_RECEIVED,
            category::DETAIL_RECEIVED
        ]
    );
    assert!(a.has_seen("ev"));

    let follow = a.build(&Bulletin::Eew(eew("ev")));
    assert_eq!(categories(&follow), [category::EEW_UPDATED]);
}

#[test]
fn tsunami_bulletins_split_on_cancellation() {
    let mut a = BulletinAdapter::new();
    let t = |canceled| {
        Bulletin::Tsunami(TsunamiBulletin {
            event_id: "ts".into(),
            is_canceled: canceled,
            ..TsunamiBulletin::default()
        })
    };
    let drafts = build_fact_batch(&mut a, &[t(false), t(true)]);
    assert_eq!(
        categories(&drafts),
        [category::TSUNAMI_RECEIVED, category::TSUNAMI_CANCELED]
    );
    assert!(a.forget_event("ts"));
    assert!(!a.has_seen("ts"));
}

#[test]
fn bulletins_deserialize_by_kind_tag() {
    let b: Bulletin = serde_json::from_value(json!({
        "kind": "eew",
        "event_id": "2024-01",
        "max_intensity": "6+",
        "is_warning": true
    }))
    .unwrap();
    assert_eq!(
        b,
        Bulletin::Eew(EewBulletin {
            event_id: "2024-01".into(),
            max_intensity: Some("6+".into()),
            is_warning: true,
            ..EewBulletin::default()
        })
    );

    let r: Bulletin = serde_json::from_str(r#"{"kind":"report","event_id":"e","report_type":"detail"}"#).unwrap();
    assert!(matches!(r, Bulletin::Report(ReportBulletin { ref report_type, .. }) if report_type == "detail"));

    assert!(serde_json::from_value::<Bulletin>(json!({ "kind": "volcano" })).is_err());
}
