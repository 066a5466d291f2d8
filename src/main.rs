use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use stockgrid::io::file_backend::JsonFileBackend;
use stockgrid::state::i18n;
use stockgrid::{Dashboard, GridConfig};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: stockgrid <catalog.json> [filter] [sort-column]";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(catalog) = args.next().map(PathBuf::from) else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };
    let filter = args.next();
    let sort_column = args.next();

    match run(&catalog, filter.as_deref(), sort_column.as_deref()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "stockgrid failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    catalog: &Path,
    filter: Option<&str>,
    sort_column: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::var_os("STOCKGRID_CONFIG") {
        Some(path) => GridConfig::load(Path::new(&path))?,
        None => GridConfig::default(),
    };
    let storage_dir = catalog
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("storage");
    let base_url = format!("file://{}", storage_dir.display());
    let backend = JsonFileBackend::open(catalog, &storage_dir, &base_url, config.columns.clone())?;

    let dashboard = Dashboard::new(Arc::new(backend), config);
    let total = dashboard.refresh().await?;
    tracing::info!(total, catalog = %catalog.display(), "catalog loaded");

    if let Some(filter) = filter {
        dashboard.set_filter(filter);
    }
    if let Some(column) = sort_column {
        dashboard.toggle_sort(column);
    }

    let columns: Vec<String> = dashboard
        .config()
        .columns
        .columns()
        .map(|(name, _)| name.to_string())
        .collect();
    println!("{}", columns.join("\t"));
    for entity in dashboard.page_rows() {
        let cells: Vec<String> = columns.iter().map(|column| entity.display(column)).collect();
        println!("{}", cells.join("\t"));
    }

    let view = dashboard.view();
    println!(
        "-- page {}/{} ({} of {} rows, {} {})",
        view.page_index + 1,
        view.page_count,
        view.page_ids.len(),
        view.total,
        view.filtered_ids.len(),
        i18n::tr(dashboard.config().language, "label.matching"),
    );
    Ok(())
}
