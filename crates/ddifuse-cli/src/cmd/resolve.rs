use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::Args;
use ddifuse_core::config::load_config;
use ddifuse_fusion::offline::OfflineBundle;
use ddifuse_fusion::{DrugResolution, FusionEngine};

use crate::output::{OutputMode, kv, render};

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Recorded offline bundle (JSON) carrying a drug_index section.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Free-text drug name to resolve.
    pub name: String,

    /// Known synonyms to try after the name itself.
    #[arg(long = "synonym")]
    pub synonyms: Vec<String>,
}

pub fn run_resolve(args: &ResolveArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let config = load_config(project_root)?;
    let bundle = OfflineBundle::from_path(&args.input)?;
    if bundle.drug_index.is_none() {
        bail!("{} records no drug_index section", args.input.display());
    }

    let engine = FusionEngine::new(config).with_drug_index(&bundle);
    let Some(resolution) = engine.resolve_drug(&args.name, &args.synonyms) else {
        bail!("no drug index attached");
    };
    render(output, &resolution, render_resolution)
}

fn render_resolution(res: &DrugResolution, w: &mut dyn Write) -> std::io::Result<()> {
    kv(w, "query", &res.query)?;
    kv(w, "resolved", res.resolved.as_deref().unwrap_or("(no match)"))?;
    if let Some(term) = &res.matched_term {
        kv(w, "via term", term)?;
        kv(w, "score", format!("{:.3}", res.score))?;
    }
    kv(w, "terms tried", res.terms.len().to_string())?;
    for (name, score) in res.candidates.iter().skip(1) {
        writeln!(w, "  {name} ({score:.3})")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_resolution_says_so() {
        let res = DrugResolution {
            query: "zzz".into(),
            terms: vec!["zzz".into(), "ZZZ".into()],
            ..DrugResolution::default()
        };
        let mut buf = Vec::new();
        render_resolution(&res, &mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("(no match)"));
        assert!(text.contains("terms tried:     2"));
        assert!(!text.contains("via term"));
    }
}
