use anyhow::{bail, Context, Result};
use slantscope::models::Article;
use slantscope::services::config_store::{ConfigStore, DetectorKind, EngineConfig};
use slantscope::services::detection::{BiasDetector, BiasEngine, Placement};
use slantscope::services::text_processor::{normalize_text, preview};
use std::io::Read;
use std::path::PathBuf;

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn load_config(args: &[String]) -> Result<EngineConfig> {
    let mut config = match parse_arg_value(args, "--config") {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("read config failed: {}", path))?;
            serde_json::from_str(&raw).with_context(|| format!("parse config failed: {}", path))?
        }
        None => match ConfigStore::default_config_dir() {
            Some(dir) => ConfigStore::new(dir).load().context("load config failed")?,
            None => EngineConfig::default(),
        },
    };
    config.apply_env_overrides();

    if let Some(name) = parse_arg_value(args, "--detector") {
        match DetectorKind::parse(&name) {
            Some(kind) => config.detector = kind,
            None => bail!("unknown detector '{}' (hybrid|lexicon|statistical|model|embedding)", name),
        }
    }
    if let Some(mode) = parse_arg_value(args, "--placement") {
        config.placement = match mode.as_str() {
            "first" => Placement::FirstOccurrence,
            "offsets" => Placement::SentenceOffsets,
            other => bail!("unknown placement '{}' (first|offsets)", other),
        };
    }
    if has_flag(args, "--offline") {
        config.classifier.enabled = false;
        config.embedder.enabled = false;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || has_flag(&args, "--help") {
        eprintln!(
            "Usage:\n  analyze_text <path.txt | -> [--title <title>] [--url <source_url>] [--detector <hybrid|lexicon|statistical|model|embedding>] [--config <config.json>] [--placement <first|offsets>] [--offline] [--normalize] [--segments <n>] [--out <json_path>]\n\nNotes:\n  - `-` reads the article from stdin.\n  - `--offline` disables the remote classifier and uses the hashing embedder.\n  - Logs go to stderr and the log file; the report JSON goes to stdout unless --out is given."
        );
        return Ok(());
    }

    slantscope::init_logging();

    let path = args[1].clone();
    let mut content = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read stdin failed")?;
        buf
    } else {
        std::fs::read_to_string(&path).with_context(|| format!("read file failed: {}", path))?
    };
    if has_flag(&args, "--normalize") {
        content = normalize_text(&content);
    }

    let title = parse_arg_value(&args, "--title").unwrap_or_else(|| {
        PathBuf::from(&path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Untitled".to_string())
    });
    let mut article = Article::new(title, content);
    if let Some(url) = parse_arg_value(&args, "--url") {
        article = article.with_source_url(url);
    }

    let segments_n: usize = parse_arg_value(&args, "--segments")
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);
    let out_path = parse_arg_value(&args, "--out");

    let config = load_config(&args)?;
    let engine = BiasEngine::from_config(&config).await?;
    if !engine.detector().is_ready() {
        eprintln!("Warning: detector '{}' is not ready; no findings will be produced.", engine.detector().name());
    }

    let report = engine.analyze(&article).await;

    eprintln!("Article: {}", report.result.article_title);
    eprintln!("Detector: {}", report.detector);
    eprintln!(
        "Sentences: {}  Words: {}  Degraded: {}",
        report.sentence_count, report.word_count, report.degraded_sentences
    );
    eprintln!("Overall score: {:.3} ({})", report.result.overall_score, report.tier.as_str());
    eprintln!("Summary: {}", report.summary);
    for (i, seg) in report.result.segments.iter().take(segments_n).enumerate() {
        eprintln!(
            "[S{:04}] score={} {}  {}",
            i,
            seg.score.map(|s| format!("{:.2}", s)).unwrap_or_else(|| "-".to_string()),
            seg.reason,
            preview(&seg.text, 100)
        );
    }
    if report.result.segments.len() > segments_n {
        eprintln!("... ({} more segments)", report.result.segments.len() - segments_n);
    }

    let json = serde_json::to_string_pretty(&report)?;
    match out_path {
        Some(out_path) => {
            std::fs::write(&out_path, json).with_context(|| format!("write out failed: {}", out_path))?;
            eprintln!("Wrote JSON: {}", out_path);
        }
        None => println!("{}", json),
    }

    Ok(())
}
