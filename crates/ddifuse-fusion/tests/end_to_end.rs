use std::cell::Cell;

use ddifuse_core::cache::{CacheManager, ResponseParams};
use ddifuse_core::config::FusionConfig;
use ddifuse_fusion::budget::{CAVEATS, PD_SUMMARY, PK_SUMMARY};
use ddifuse_fusion::offline::OfflineBundle;
use ddifuse_fusion::{FusionEngine, Mode, PairContext, build_prompt_blocks, fuse_cached, respond_cached};
use serde_json::{Value, json};

fn bundle() -> OfflineBundle {
    serde_json::from_value(json!({
        "pair": ["drug_a", "drug_b"],
        "mechanistic": {
            "targets_a": ["Target1", "Target2"],
            "targets_b": ["target1", "other"],
            "enzymes": {
                "a": {"substrate": ["CYP2C9"]},
                "b": {"inhibitor": [{"label": "Cytochrome P450 2C9"}]}
            },
            "ids_a": {"drugbank": "DB00001"}
        },
        "tabular": {
            "pair_prr": 3.1,
            "side_effects": {"drug_a": ["nausea", "bruising", "bleeding"]},
            "side_effect_prr": {"bleeding": 2.5, "bruising": 1.2, "nausea": 0.8}
        },
        "adverse_events": {
            "top_reactions": {"drug_a": [["bleeding", 50]]},
            "combination": [["haemorrhage", 7]]
        },
        "datasets": {"mechanistic": ["PubChem RDF subset"], "tabular": ["TwoSides"]}
    }))
    .expect("bundle")
}

fn engine(bundle: &OfflineBundle) -> FusionEngine<'_> {
    FusionEngine::new(FusionConfig::default())
        .with_mechanistic(bundle)
        .with_tabular(bundle)
        .with_adverse_events(bundle)
}

#[test]
fn overlapping_targets_are_found_and_ranked_first() {
    let bundle = bundle();
    let ctx = engine(&bundle).fuse("drug_a", "drug_b");
    let pkpd = ctx.pkpd.as_ref().expect("pkpd");
    assert_eq!(pkpd.pd.overlap_targets, vec!["target1"]);
    assert_eq!(ctx.mechanistic.targets_a, vec!["target1", "target2"]);
    assert_eq!(ctx.mechanistic.targets_b, vec!["target1", "other"]);
    assert!(pkpd.overlaps.inhibition.contains("cyp2c9"));
    assert_eq!(ctx.drugs.a.ids["drugbank"], json!("DB00001"));
}

#[test]
fn side_effects_are_ranked_by_prr() {
    let bundle = bundle();
    let ctx = engine(&bundle).fuse("drug_a", "drug_b");
    assert_eq!(ctx.signals.side_effects_a, vec!["bleeding", "bruising", "nausea"]);
    assert!(ctx.signals.side_effects_b.is_empty());
    assert_eq!(ctx.signals.prr, Some(3.1));
    assert_eq!(ctx.faers.combo_reactions[0].term, "haemorrhage");
    assert_eq!(ctx.sources["tabular"], vec!["TwoSides"]);
    assert!(ctx.caveats.is_empty(), "{:?}", ctx.caveats);
}

#[test]
fn side_effect_limit_applies_after_ranking() {
    let bundle = bundle();
    let mut config = FusionConfig::default();
    config.evidence.side_effect_limit = 1;
    let ctx = FusionEngine::new(config).with_tabular(&bundle).fuse("drug_a", "drug_b");
    assert_eq!(ctx.signals.side_effects_a, vec!["bleeding"]);
}

#[test]
fn prompt_blocks_lead_with_pk_overlap() {
    let bundle = bundle();
    let ctx = engine(&bundle).fuse("drug_a", "drug_b");
    let blocks = build_prompt_blocks(&ctx, Mode::parse("physician"), &FusionConfig::default().budget);
    assert_eq!(blocks.mode, Mode::Doctor);
    assert_eq!(blocks.budget, 2400);
    assert!(!blocks.truncated);
    assert_eq!(blocks.get(PK_SUMMARY), "Potential ↑ exposure via inhibition at cyp2c9");
    assert_eq!(blocks.get(PD_SUMMARY), "Overlapping targets: target1");
    assert_eq!(blocks.get(CAVEATS), "(none)");
}

#[test]
fn cached_pipeline_reuses_context_and_response() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = CacheManager::new(dir.path(), 1);
    let bundle = bundle();
    let engine = engine(&bundle);

    let (first, key) = fuse_cached(&engine, &cache, "drug_a", "drug_b", false).expect("fuse");
    assert!(cache.contexts.path_for(&key).exists());

    let (swapped, swapped_key) = fuse_cached(&engine, &cache, "DRUG_B", "drug_a", false).expect("fuse");
    assert_eq!(swapped_key, key);
    assert_eq!(swapped, first);

    let params = ResponseParams {
        mode: "doctor".into(),
        seed: Some(7),
        temperature: 0.2,
        model: "local".into(),
    };
    let calls = Cell::new(0);
    let generate = |_: &PairContext, _: &ResponseParams| -> anyhow::Result<Value> {
        calls.set(calls.get() + 1);
        Ok(json!({"answer": "monitor INR"}))
    };
    let one = respond_cached(&cache, &first, &params, generate).expect("respond");
    let two = respond_cached(&cache, &first, &params, generate).expect("respond");
    assert_eq!(one, two);
    assert_eq!(calls.get(), 1);
}

#[test]
fn force_refresh_rebuilds_the_context() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = CacheManager::new(dir.path(), 1);
    let key = cache.context_key("drug_a", "drug_b");
    cache.put_context(&key, &json!({"drugs": {"a": {"name": "stale"}, "b": {"name": "stale"}}})).expect("seed");

    let bundle = bundle();
    let engine = engine(&bundle);
    let (cached, _) = fuse_cached(&engine, &cache, "drug_a", "drug_b", false).expect("fuse");
    assert_eq!(cached.drugs.a.name, "stale");

    let (fresh, _) = fuse_cached(&engine, &cache, "drug_a", "drug_b", true).expect("fuse");
    assert_eq!(fresh.drugs.a.name, "drug_a");
}
