use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use clap::Args;
use ddifuse_core::cache::CacheManager;
use ddifuse_core::config::load_config;
use ddifuse_fusion::budget::PROMPT_KEYS;
use ddifuse_fusion::filter::{FilterMetadata, QueryContext, Section, filter_context_sections};
use ddifuse_fusion::offline::OfflineBundle;
use ddifuse_fusion::{FusionEngine, Mode, PairContext, PromptBlocks, build_prompt_blocks, fuse_cached};
use serde::Serialize;
use tracing::{debug, info};

use crate::output::{CliError, OutputMode, kv, render, render_error, section};

#[derive(Args, Debug)]
pub struct FuseArgs {
    /// Recorded offline bundle (JSON) to replay as the upstream sources.
    #[arg(short, long)]
    pub input: PathBuf,

    /// First drug; defaults to the bundle's recorded pair.
    #[arg(long = "drug-a", requires = "drug_b")]
    pub drug_a: Option<String>,

    /// Second drug; defaults to the bundle's recorded pair.
    #[arg(long = "drug-b", requires = "drug_a")]
    pub drug_b: Option<String>,

    /// Audience for the prompt budget (doctor, patient, pharma).
    #[arg(short, long, default_value = "patient")]
    pub mode: String,

    /// Skip the on-disk context cache.
    #[arg(long)]
    pub no_cache: bool,

    /// Rebuild the context even when a cached copy exists.
    #[arg(long, conflicts_with = "no_cache")]
    pub refresh: bool,

    /// Print the full pair context instead of the prompt blocks.
    #[arg(long)]
    pub context: bool,

    /// Drop side effects, targets and pathways scoring below this relevance.
    #[arg(long = "min-relevance", value_name = "SCORE")]
    pub min_relevance: Option<f64>,

    /// Restrict relevance filtering to these sections (side_effects,
    /// targets, pathways); all of them by default.
    #[arg(long = "section", requires = "min_relevance", value_parser = parse_section)]
    pub sections: Vec<Section>,
}

fn parse_section(s: &str) -> Result<Section, String> {
    Section::parse(s).ok_or_else(|| format!("unknown section '{s}' (expected side_effects, targets or pathways)"))
}

#[derive(Debug, Serialize)]
struct FuseReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<FilterMetadata>,
    #[serde(flatten)]
    prompt: PromptBlocks,
}

pub fn run_fuse(args: &FuseArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let mut config = match load_config(project_root) {
        Ok(config) => config,
        Err(err) => {
            render_error(output, &CliError::from(&err))?;
            return Err(err.into());
        }
    };
    config.apply_env_overrides(|k| std::env::var(k).ok());

    let bundle = OfflineBundle::from_path(&args.input)?;
    let (a, b) = resolve_pair(args, &bundle)?;
    let mode = Mode::parse(&args.mode);
    let budget = config.budget.clone();
    let cache = (!args.no_cache)
        .then(|| CacheManager::new(config.cache_root(project_root), config.cache.schema_version));

    let engine = attach(FusionEngine::new(config), &bundle);
    let (context, cache_key) = match &cache {
        Some(cache) => {
            let (context, key) = fuse_cached(&engine, cache, &a, &b, args.refresh)
                .with_context(|| format!("fusing {a} + {b}"))?;
            (context, Some(key))
        }
        None => (engine.fuse(&a, &b), None),
    };
    let (context, filter) = match args.min_relevance {
        Some(min) => {
            let (filtered, meta) = filter_by_relevance(&context, args, &bundle, min);
            (filtered, Some(meta))
        }
        None => (context, None),
    };

    if args.context {
        return render(output, &context, render_context);
    }

    let prompt = build_prompt_blocks(&context, mode, &budget);
    let report = FuseReport {
        cache_key,
        filter,
        prompt,
    };
    render(output, &report, render_blocks)
}

fn resolve_pair(args: &FuseArgs, bundle: &OfflineBundle) -> Result<(String, String)> {
    match (&args.drug_a, &args.drug_b, &bundle.pair) {
        (Some(a), Some(b), _) => Ok((a.clone(), b.clone())),
        (_, _, Some((a, b))) => Ok((a.clone(), b.clone())),
        _ => bail!(
            "{} records no pair; pass --drug-a and --drug-b",
            args.input.display()
        ),
    }
}

/// Narrow the fused context using the bundle's per-term PRR as the query
/// signal. The cached context stays unfiltered.
fn filter_by_relevance(
    context: &PairContext,
    args: &FuseArgs,
    bundle: &OfflineBundle,
    min: f64,
) -> (PairContext, FilterMetadata) {
    let query = QueryContext {
        side_effect_prr: bundle
            .tabular
            .as_ref()
            .map(|t| t.side_effect_prr.clone())
            .unwrap_or_default(),
        ..QueryContext::default()
    };
    let sections: &[Section] = if args.sections.is_empty() {
        &Section::ALL
    } else {
        &args.sections
    };
    let (filtered, meta) = filter_context_sections(context, sections, &query, min);
    info!(
        before = meta.items_before,
        after = meta.items_after,
        ratio = meta.filter_ratio,
        "context filtered"
    );
    (filtered, meta)
}

/// Wire each section the bundle actually carries; absent sections stay
/// unattached so the engine reports them as unavailable.
fn attach<'a>(mut engine: FusionEngine<'a>, bundle: &'a OfflineBundle) -> FusionEngine<'a> {
    if bundle.mechanistic.is_some() {
        engine = engine.with_mechanistic(bundle);
    }
    if bundle.structured.is_some() {
        engine = engine.with_structured(bundle);
    }
    if bundle.potency.is_some() {
        engine = engine.with_potency(bundle);
    }
    if bundle.tabular.is_some() {
        engine = engine.with_tabular(bundle);
    }
    if bundle.adverse_events.is_some() {
        engine = engine.with_adverse_events(bundle);
    }
    debug!(config = ?engine.config().fallback, "engine assembled");
    engine
}

fn render_blocks(report: &FuseReport, w: &mut dyn Write) -> std::io::Result<()> {
    let prompt = &report.prompt;
    kv(w, "mode", prompt.mode.as_str())?;
    kv(w, "budget", format!("{} / {} chars", prompt.used, prompt.budget))?;
    if prompt.truncated {
        kv(w, "truncated", "yes")?;
    }
    if let Some(key) = &report.cache_key {
        kv(w, "cache key", key)?;
    }
    if let Some(meta) = &report.filter {
        kv(
            w,
            "filtered",
            format!("{} of {} items kept", meta.items_after, meta.items_before),
        )?;
    }
    for key in PROMPT_KEYS {
        writeln!(w)?;
        section(w, key)?;
        writeln!(w, "{}", prompt.get(key))?;
    }
    Ok(())
}

fn render_context(context: &PairContext, w: &mut dyn Write) -> std::io::Result<()> {
    kv(w, "drug A", &context.drugs.a.name)?;
    kv(w, "drug B", &context.drugs.b.name)?;
    if let Some(pkpd) = &context.pkpd {
        kv(w, "PK", &pkpd.pk_summary)?;
        kv(w, "PD", &pkpd.pd_summary)?;
    }
    kv(w, "targets A", context.mechanistic.targets_a.join(", "))?;
    kv(w, "targets B", context.mechanistic.targets_b.join(", "))?;
    let enzymes: Vec<&str> = context.enzymes_mentioned().into_iter().collect();
    kv(w, "enzymes", enzymes.join(", "))?;
    if !context.caveats.is_empty() {
        writeln!(w)?;
        section(w, "caveats")?;
        for caveat in &context.caveats {
            writeln!(w, "- {caveat}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddifuse_core::config::FusionConfig;

    fn args(drug_a: Option<&str>, drug_b: Option<&str>) -> FuseArgs {
        FuseArgs {
            input: PathBuf::from("bundle.json"),
            drug_a: drug_a.map(str::to_string),
            drug_b: drug_b.map(str::to_string),
            mode: "patient".into(),
            no_cache: true,
            refresh: false,
            context: false,
            min_relevance: None,
            sections: Vec::new(),
        }
    }

    #[test]
    fn explicit_pair_wins_over_recorded_pair() {
        let bundle = OfflineBundle {
            pair: Some(("x".into(), "y".into())),
            ..OfflineBundle::default()
        };
        let pair = resolve_pair(&args(Some("a"), Some("b")), &bundle).expect("pair");
        assert_eq!(pair, ("a".to_string(), "b".to_string()));
        let pair = resolve_pair(&args(None, None), &bundle).expect("pair");
        assert_eq!(pair, ("x".to_string(), "y".to_string()));
    }

    #[test]
    fn missing_pair_is_an_error() {
        let err = resolve_pair(&args(None, None), &OfflineBundle::default()).expect_err("no pair");
        assert!(err.to_string().contains("--drug-a"));
    }

    #[test]
    fn empty_bundle_attaches_nothing() {
        let bundle = OfflineBundle::default();
        let ctx = attach(FusionEngine::new(FusionConfig::default()), &bundle).fuse("a", "b");
        assert!(
            ctx.caveats
                .iter()
                .any(|c| c.starts_with("Mechanistic source unavailable"))
        );
        let mut buf = Vec::new();
        render_context(&ctx, &mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("caveats"));
    }

    #[test]
    fn section_flags_parse_known_names_only() {
        assert_eq!(parse_section("targets"), Ok(Section::Targets));
        assert!(parse_section("faers").expect_err("unknown").contains("side_effects"));
    }

    #[test]
    fn relevance_filter_uses_the_bundle_prr() {
        let bundle: OfflineBundle = serde_json::from_value(serde_json::json!({
            "tabular": {"side_effect_prr": {"bleeding": 3.0}}
        }))
        .expect("bundle");
        let mut ctx = PairContext::default();
        ctx.signals.side_effects_a = vec!["nausea".into(), "bleeding".into()];
        ctx.mechanistic.targets_a = vec!["vkorc1".into()];

        let mut only_side_effects = args(None, None);
        only_side_effects.sections = vec![Section::SideEffects];
        let (filtered, meta) = filter_by_relevance(&ctx, &only_side_effects, &bundle, 0.1);
        assert_eq!(filtered.signals.side_effects_a, vec!["bleeding"]);
        assert_eq!(filtered.mechanistic.targets_a, vec!["vkorc1"]);
        assert_eq!((meta.items_before, meta.items_after), (2, 1));
    }
}
