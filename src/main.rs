//! musicqna - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use musicqna::{
    cli::{Args, Commands, Verbosity},
    config::Config,
    curriculum::CurriculumLoader,
    embedding::{needs_regeneration, CandleEmbedder, Embedder, EmbeddingBundle, EmbeddingGenerator},
    eval::{load_questions, EvalLabel, Evaluator},
    llm::ChatClient,
    rag::{Confidence, RAGPipeline, RagResponse, ReRanker, SearchResult, VectorRetriever},
    session::GapAnalyzer,
};

fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_env();
    config.validate()?;
    Ok(config)
}

fn load_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let embedder = CandleEmbedder::load(&config.embedding.model)
        .with_context(|| format!("Failed to load embedding model {}", config.embedding.model))?;
    Ok(Arc::new(embedder))
}

fn open_retriever(config: &Config) -> Result<VectorRetriever> {
    let embedder = load_embedder(config)?;
    let mut retriever =
        VectorRetriever::new(embedder).with_reranker(ReRanker::with_config(config.rerank_config()));
    retriever.load(&config.paths.embeddings).with_context(|| {
        format!(
            "Failed to load embeddings from {} (run `musicqna embed` first)",
            config.paths.embeddings.display()
        )
    })?;
    retriever.build_index()?;
    retriever.prepare()?;
    Ok(retriever)
}

fn progress_bar(len: u64, label: &str, verbosity: Verbosity) -> Result<ProgressBar> {
    if !verbosity.show_progress() {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} {msg} [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("=>-"),
    );
    pb.set_message(label.to_string());
    Ok(pb)
}

/// Embed the curriculum and persist the bundle
fn run_embed(config: &Config, force: bool, verbosity: Verbosity) -> Result<()> {
    let paths = &config.paths;

    if !force && !needs_regeneration(&paths.curriculum, &paths.embeddings)? {
        println!(
            "{} Embeddings are up to date: {}",
            "✓".green(),
            paths.embeddings.display()
        );
        return Ok(());
    }

    let mut loader = CurriculumLoader::new(&paths.curriculum);
    let records = loader.load()?;
    println!("Loaded {} concepts from {}", records.len(), paths.curriculum.display());

    let embedder = load_embedder(config)?;
    let generator = EmbeddingGenerator::with_batch_size(embedder.as_ref(), config.embedding.batch_size);

    let pb = progress_bar(records.len() as u64, "Embedding", verbosity)?;
    let bundle = generator.generate(records, |done, _| pb.set_position(done as u64))?;
    pb.finish_and_clear();

    bundle.save(&paths.embeddings)?;
    println!(
        "{} Saved {} vectors ({} dims, {}) to {}",
        "✓".green(),
        bundle.len(),
        bundle.dimension,
        bundle.model_name,
        paths.embeddings.display()
    );
    Ok(())
}

fn print_source(source: &SearchResult) {
    let english = if source.record.concept_en.is_empty() {
        String::new()
    } else {
        format!(" ({})", source.record.concept_en)
    };
    println!(
        "  {}. {}{}  {}",
        source.rank,
        source.record.concept_ko.bold(),
        english,
        format!(
            "score {:.4} (raw {:.4}, {:?})",
            source.score, source.base_score, source.alias_match
        )
        .dimmed()
    );
}

fn run_search(config: &Config, query: &str, top_k: Option<usize>, min_score: Option<f32>) -> Result<()> {
    let retriever = open_retriever(config)?;
    let params = config.search_params();
    let results = retriever.search(
        query,
        top_k.unwrap_or(params.top_k),
        min_score.unwrap_or(params.min_score),
    )?;

    if results.is_empty() {
        println!("{}", "No results.".yellow());
        return Ok(());
    }
    for result in &results {
        print_source(result);
    }
    Ok(())
}

fn print_response(response: &RagResponse) {
    let confidence = match response.confidence {
        Confidence::High => "high".green(),
        Confidence::Medium => "medium".yellow(),
        Confidence::None => "none".red(),
        Confidence::Error => "error".red().bold(),
    };

    println!("\n{}", response.answer.trim());
    println!(
        "\n{} {}  {} {:?}",
        "confidence:".dimmed(),
        confidence,
        "coverage:".dimmed(),
        response.coverage
    );
    if !response.detected_terms.is_empty() {
        println!("{} {}", "terms:".dimmed(), response.detected_terms.join(", "));
    }
    if !response.sources.is_empty() {
        println!("{}", "sources:".dimmed());
        for source in &response.sources {
            print_source(source);
        }
    }
}

async fn run_ask(config: &Config, questions: &[String], json: bool) -> Result<()> {
    let retriever = open_retriever(config)?;
    let chat = ChatClient::from_env(&config.llm.api_key_env, config.chat_client_config())?;
    let mut pipeline = RAGPipeline::with_config(Arc::new(retriever), Arc::new(chat), config.rag_config());

    for question in questions {
        println!("{} {}", "Q:".cyan().bold(), question);
        let response = pipeline.answer(question).await;
        if json {
            println!("{}", serde_json::to_string_pretty(&response)?);
        } else {
            print_response(&response);
        }
        println!();
    }

    let stats = pipeline.stats();
    info!(
        total = stats.total_queries,
        successful = stats.successful_answers,
        partial = stats.partial_answers,
        no_data = stats.no_data_answers,
        errors = stats.errors,
        "session finished"
    );

    if let Some(path) = pipeline.save_gap_report(&config.paths.gaps_dir)? {
        println!(
            "{} {} gap(s) recorded: {}",
            "!".yellow(),
            pipeline.gaps().len(),
            path.display()
        );
    }
    Ok(())
}

fn run_stats(config: &Config) -> Result<()> {
    let paths = &config.paths;

    let mut loader = CurriculumLoader::new(&paths.curriculum);
    loader.load()?;
    let stats = loader.statistics();
    println!("{}", "Curriculum".bold());
    println!("  file:                {}", paths.curriculum.display());
    println!("  records:             {}", stats.total_records);
    println!("  avg definition:      {:.1} chars", stats.avg_definition_length);
    println!("  unique names (ko):   {}", stats.unique_concepts_ko);
    println!("  unique names (en):   {}", stats.unique_concepts_en);

    println!("{}", "Embeddings".bold());
    match EmbeddingBundle::load(&paths.embeddings) {
        Ok(bundle) => {
            let stats = bundle.stats();
            println!("  file:                {}", paths.embeddings.display());
            println!("  model:               {}", stats.model_name);
            println!("  vectors:             {}", stats.num_embeddings);
            println!("  dimension:           {}", stats.dimension);
            println!("  norm mean/std:       {:.4} / {:.4}", stats.mean_norm, stats.std_norm);
            if needs_regeneration(&paths.curriculum, &paths.embeddings)? {
                println!("  {}", "stale: curriculum changed since last embed".yellow());
            }
        }
        Err(e) => println!("  {}", e.to_string().yellow()),
    }
    Ok(())
}

fn run_gaps(config: &Config) -> Result<()> {
    let analysis = GapAnalyzer::new().analyze(&config.paths.gaps_dir)?;

    if analysis.total_gaps == 0 {
        println!("No gaps recorded in {}", config.paths.gaps_dir.display());
        return Ok(());
    }

    println!(
        "{} gaps across {} report(s)",
        analysis.total_gaps.to_string().bold(),
        analysis.reports_read
    );
    for (kind, count) in &analysis.by_kind {
        println!("  {:<18} {}", kind.as_str(), count);
    }

    if !analysis.missing_terms.is_empty() {
        println!("{}", "Most frequent missing terms".bold());
        for (term, count) in &analysis.missing_terms {
            println!("  {:<24} {}", term, count);
        }
    }

    for (kind, queries) in &analysis.example_queries {
        println!("{} {}", "Uncovered queries:".bold(), kind.as_str());
        for query in queries {
            println!("  - {}", query);
        }
    }
    Ok(())
}

fn run_eval(
    config: &Config,
    questions_path: &Path,
    top_k: Option<usize>,
    limit: Option<usize>,
    output: Option<PathBuf>,
    verbosity: Verbosity,
) -> Result<()> {
    let mut questions = load_questions(questions_path)?;
    if let Some(limit) = limit {
        questions.truncate(limit);
    }

    let retriever = open_retriever(config)?;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    let evaluator = Evaluator::new(&retriever, retriever.records(), top_k);

    let pb = progress_bar(questions.len() as u64, "Evaluating", verbosity)?;
    let report = evaluator.run(&questions, |done, _| pb.set_position(done as u64));
    pb.finish_and_clear();

    let summary = &report.summary;
    println!(
        "{} {}  {} {}  {} {}  (hit rate {:.1}%)",
        "success".green(),
        summary.success,
        "partial".yellow(),
        summary.partial,
        "fail".red(),
        summary.fail,
        summary.hit_rate() * 100.0
    );
    for outcome in report.outcomes.iter().filter(|o| o.label == EvalLabel::Fail) {
        println!("  {} {}", "✗".red(), outcome.question);
    }

    let dir = output.unwrap_or_else(|| {
        PathBuf::from("data/musicqna/eval").join(chrono::Local::now().format("%Y%m%d_%H%M").to_string())
    });
    report.save(&dir)?;
    println!("Results written to {}", dir.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbosity());

    let config = load_config(&args)?;
    let verbosity = args.verbosity();

    match &args.command {
        Commands::Embed { force } => run_embed(&config, *force, verbosity)?,
        Commands::Search {
            query,
            top_k,
            min_score,
        } => run_search(&config, query, *top_k, *min_score)?,
        Commands::Ask { questions, json } => run_ask(&config, questions, *json).await?,
        Commands::Stats => run_stats(&config)?,
        Commands::Gaps => run_gaps(&config)?,
        Commands::Eval {
            questions,
            top_k,
            limit,
            output,
        } => run_eval(&config, questions, *top_k, *limit, output.clone(), verbosity)?,
    }

    Ok(())
}
