//! Command implementations for the falx CLI.

use std::collections::BTreeMap;
use std::fs;
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

use crate::bulk::{BulkDocumentItem, BulkJobOptions, JobStatus};
use crate::cli::args::*;
use crate::cli::output::output_result;
use crate::engine::{CreateIndexRequest, EngineConfig, SearchEngine};
use crate::error::{FalxError, Result};
use crate::lifecycle::{IndexMappings, IndexSettings, IndexStatus};
use crate::query::dto::{FacetSpec, HighlightRequest, SearchRequest, SuggestRequest};

/// Execute a CLI command.
pub fn execute_command(args: FalxArgs) -> Result<()> {
    let engine = SearchEngine::open_on_disk(&args.data_dir, EngineConfig::default())?;
    match &args.command {
        Command::CreateIndex(create_args) => create_index(&engine, create_args.clone(), &args),
        Command::DeleteIndex(delete_args) => delete_index(&engine, delete_args.clone(), &args),
        Command::AddDocuments(add_args) => add_documents(&engine, add_args.clone(), &args),
        Command::Search(search_args) => search_index(&engine, search_args.clone(), &args),
        Command::Suggest(suggest_args) => suggest_terms(&engine, suggest_args.clone(), &args),
        Command::Stats(stats_args) => show_stats(&engine, stats_args.clone(), &args),
        Command::Rebuild(rebuild_args) => rebuild_index(&engine, rebuild_args.clone(), &args),
        Command::List(list_args) => list_indices(&engine, list_args.clone(), &args),
    }
}

/// Create a new index.
fn create_index(engine: &SearchEngine, args: CreateIndexArgs, cli_args: &FalxArgs) -> Result<()> {
    if cli_args.verbosity() > 1 {
        println!(
            "Creating index '{}' in {}",
            args.name,
            cli_args.data_dir.display()
        );
    }

    let mappings: IndexMappings = match &args.mappings_file {
        Some(file) => {
            let raw = fs::read_to_string(file)?;
            serde_json::from_str(&raw)?
        }
        None => IndexMappings::default(),
    };
    let settings = IndexSettings {
        shards: args.shards,
        ..IndexSettings::default()
    };

    let response = engine.create_index(CreateIndexRequest {
        name: args.name,
        settings,
        mappings,
    })?;
    output_result("Index created", &response, cli_args)
}

/// Delete an index.
fn delete_index(engine: &SearchEngine, args: DeleteIndexArgs, cli_args: &FalxArgs) -> Result<()> {
    engine.delete_index(&args.name)?;
    output_result("Index deleted", &json!({"name": args.name}), cli_args)
}

/// Bulk-index documents from a JSON array or JSONL file.
fn add_documents(engine: &SearchEngine, args: AddDocumentsArgs, cli_args: &FalxArgs) -> Result<()> {
    if cli_args.verbosity() > 1 {
        println!(
            "Adding documents from {} to index '{}'",
            args.document_file.display(),
            args.index
        );
    }

    let documents = read_documents(&fs::read_to_string(&args.document_file)?)?;
    if documents.is_empty() {
        return Err(FalxError::validation("document file contains no documents"));
    }

    let options = BulkJobOptions {
        batch_size: args.batch_size,
        concurrency: args.concurrency.unwrap_or(0),
        enable_term_postings_persistence: !args.no_persist,
        ..BulkJobOptions::default()
    };
    let handle = engine.start_bulk_indexing(&args.index, documents, options)?;

    // Follow the background job to completion.
    let status = loop {
        let status = engine.bulk_job_status(&handle.batch_id)?;
        if status.status.is_terminal() {
            break status;
        }
        if cli_args.verbosity() > 1 {
            println!(
                "  {}/{} documents ({:.1}%)",
                status.progress.processed, status.progress.total, status.progress.percentage
            );
        }
        thread::sleep(Duration::from_millis(100));
    };
    engine.persist_all()?;

    output_result("Bulk indexing finished", &status, cli_args)?;
    if status.status == JobStatus::Failed {
        return Err(FalxError::internal(format!(
            "bulk job {} failed ({} of {} documents)",
            status.batch_id, status.progress.failed, status.progress.total
        )));
    }
    Ok(())
}

/// Search the index.
fn search_index(engine: &SearchEngine, args: SearchArgs, cli_args: &FalxArgs) -> Result<()> {
    let mut request = SearchRequest {
        query: Some(parse_query(&args.query)),
        size: Some(args.size),
        from: Some(args.from),
        ..SearchRequest::default()
    };
    if !args.field.is_empty() {
        request.fields = Some(args.field.clone());
    }
    if let Some(filter) = &args.filter {
        request.filter = Some(serde_json::from_str(filter).map_err(|e| {
            FalxError::validation(format!("filter must be valid JSON: {e}"))
        })?);
    }
    if let Some(sort) = &args.sort {
        request.sort = Some(Value::String(sort.clone()));
    }
    if args.highlight {
        request.highlight = Some(HighlightRequest::default());
    }
    if !args.facet.is_empty() {
        let mut facets = BTreeMap::new();
        for field in &args.facet {
            let spec: FacetSpec = serde_json::from_value(json!({"terms": {"field": field}}))?;
            facets.insert(field.clone(), spec);
        }
        request.facets = Some(facets);
    }

    let response = engine.search(&args.index, request)?;
    output_result("Search completed", &response, cli_args)
}

/// Suggest terms completing a prefix.
fn suggest_terms(engine: &SearchEngine, args: SuggestArgs, cli_args: &FalxArgs) -> Result<()> {
    let response = engine.suggest(
        &args.index,
        SuggestRequest {
            text: args.text,
            field: args.field,
            size: Some(args.size),
        },
    )?;
    output_result("Suggestions", &response, cli_args)
}

/// Show index statistics.
fn show_stats(engine: &SearchEngine, args: StatsArgs, cli_args: &FalxArgs) -> Result<()> {
    let stats = engine.index_stats(&args.index)?;
    output_result("Index statistics", &stats, cli_args)
}

/// Rebuild postings, or only the document count with `--count-only`.
fn rebuild_index(engine: &SearchEngine, args: RebuildArgs, cli_args: &FalxArgs) -> Result<()> {
    if args.count_only {
        let count = engine.rebuild_doc_count(&args.index)?;
        return output_result(
            "Document count rebuilt",
            &json!({"documentCount": count}),
            cli_args,
        );
    }
    let response = engine.rebuild_all(&args.index)?;
    output_result("Index rebuilt", &response, cli_args)
}

/// List indices, optionally filtered by status.
fn list_indices(engine: &SearchEngine, args: ListArgs, cli_args: &FalxArgs) -> Result<()> {
    let status = args
        .status
        .as_deref()
        .map(IndexStatus::parse)
        .transpose()?;
    let response = engine.list_indices(status);
    output_result("Indices", &response, cli_args)
}

/// A query argument is either a JSON query object or plain query text.
fn parse_query(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.starts_with('{')
        && let Ok(value @ Value::Object(_)) = serde_json::from_str(trimmed)
    {
        return value;
    }
    Value::String(raw.to_string())
}

/// Parse a document file: a JSON array of documents, or one JSON document
/// per line. Items shaped `{"id": ..., "document": {...}}` keep that
/// envelope; bare objects become the document itself, with a string `id`
/// field used as the document id when present.
fn read_documents(raw: &str) -> Result<Vec<BulkDocumentItem>> {
    let trimmed = raw.trim();
    let values: Vec<Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        trimmed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(serde_json::from_str)
            .collect::<std::result::Result<_, _>>()?
    };

    Ok(values.into_iter().map(to_bulk_item).collect())
}

fn to_bulk_item(value: Value) -> BulkDocumentItem {
    if value.get("document").is_some()
        && let Ok(item) = serde_json::from_value::<BulkDocumentItem>(value.clone())
    {
        return item;
    }
    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .map(String::from);
    BulkDocumentItem {
        id,
        document: value,
    }
}
