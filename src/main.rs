//! unify – command-line document → PDF normalizer.
//!
//! Usage:
//!   unify <inputs...> [-o out.pdf] [--separate] [--config cfg.json] ...
//!
//! Every input is converted on its own; failures are reported and skipped.
//! The successful outputs are merged into one PDF (or written one per input
//! with `--separate`). The exit status is non-zero only when nothing could
//! be produced.

use std::{env, fs, path::Path, path::PathBuf, process};

use pdf_unify::batch::{BatchReport, Converter, Selection};
use pdf_unify::command::CommandRenderer;
use pdf_unify::error::ConvertError;
use pdf_unify::pipeline::{PageOrientation, PageSize, PipelineConfig};
use pdf_unify::render::NativeRenderer;
use pdf_unify::source::SourceDocument;

#[derive(Debug, Default)]
struct Options {
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    separate: bool,
    config: Option<PathBuf>,
    margin_mm: Option<u32>,
    page_size: Option<PageSize>,
    landscape: bool,
    no_preserve_layout: bool,
    no_sanitize: bool,
    title: Option<String>,
    renderer: Option<String>,
    order: Vec<u32>,
    exclude: Vec<String>,
    report: Option<PathBuf>,
    lenient: bool,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let opts = match parse_args(&args[1..]) {
        Ok(Some(opts)) => opts,
        Ok(None) => {
            print_usage(&args[0]);
            process::exit(0);
        }
        Err(msg) => {
            eprintln!("Error: {msg}");
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    match run(&opts) {
        Ok(0) => {
            eprintln!("Error: no output could be produced.");
            process::exit(1);
        }
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

/// `Ok(None)` means help was requested.
fn parse_args(args: &[String]) -> Result<Option<Options>, String> {
    let mut opts = Options::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = || {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{arg} expects a value"))
        };
        match arg.as_str() {
            "--output" | "-o" => opts.output = Some(PathBuf::from(value()?)),
            "--separate" => opts.separate = true,
            "--config" | "-c" => opts.config = Some(PathBuf::from(value()?)),
            "--margin-mm" => {
                let v = value()?;
                opts.margin_mm = Some(v.parse().map_err(|_| format!("invalid margin `{v}`"))?);
            }
            "--page-size" => opts.page_size = Some(value()?.parse()?),
            "--landscape" | "-l" => opts.landscape = true,
            "--no-preserve-layout" => opts.no_preserve_layout = true,
            "--no-sanitize" => opts.no_sanitize = true,
            "--title" | "-t" => opts.title = Some(value()?),
            "--renderer" => opts.renderer = Some(value()?),
            "--order" => opts.order = parse_order(&value()?)?,
            "--exclude" => opts.exclude.push(value()?),
            "--report" => opts.report = Some(PathBuf::from(value()?)),
            "--lenient" => opts.lenient = true,
            "--help" | "-h" => return Ok(None),
            other if other.starts_with('-') => return Err(format!("unknown flag: {other}")),
            path => opts.inputs.push(PathBuf::from(path)),
        }
    }
    if opts.inputs.is_empty() {
        return Err("no input files specified".to_string());
    }
    Ok(Some(opts))
}

/// `"2,1,3"` → `[2, 1, 3]`.
fn parse_order(list: &str) -> Result<Vec<u32>, String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|_| format!("invalid order entry `{s}`")))
        .collect()
}

fn build_config(opts: &Options) -> Result<PipelineConfig, ConvertError> {
    let mut config = match &opts.config {
        Some(path) => PipelineConfig::from_path(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(m) = opts.margin_mm {
        config.margin_mm = m;
    }
    if let Some(size) = opts.page_size {
        config.page_size = size;
    }
    if opts.landscape {
        config.orientation = PageOrientation::Landscape;
    }
    if opts.no_preserve_layout {
        config.preserve_layout = false;
    }
    if opts.no_sanitize {
        config.sanitize = false;
    }
    if let Some(title) = &opts.title {
        config.title = title.clone();
    }
    if opts.separate {
        config.combine = false;
    }
    Ok(config)
}

/// Returns the number of PDFs written.
fn run(opts: &Options) -> Result<usize, ConvertError> {
    let config = build_config(opts)?;

    let converter = match &opts.renderer {
        Some(line) => {
            let renderer =
                CommandRenderer::from_command_line(line).map_err(ConvertError::MalformedInput)?;
            log::info!("rendering with `{}`", renderer.program());
            Converter::new(config.clone(), renderer)
        }
        None => {
            let renderer = NativeRenderer::new(&config).strict(!opts.lenient);
            Converter::new(config.clone(), renderer)
        }
    };

    let mut docs = Vec::new();
    let mut positions = Vec::new();
    let mut unreadable = 0usize;
    for (path, position) in opts.inputs.iter().zip(1u32..) {
        match SourceDocument::from_path(path) {
            Ok(doc) => {
                docs.push(doc);
                positions.push(position);
            }
            Err(e) => {
                eprintln!("✗ {}: {e}", path.display());
                unreadable += 1;
            }
        }
    }

    let report = converter.convert_batch(&docs);
    for (name, converted) in report.successes() {
        let how = converted.tier.map_or("passthrough", |t| t.label());
        eprintln!("✓ {name} ({how}, {} bytes)", converted.bytes.len());
    }
    for (name, err) in report.failures() {
        eprintln!("✗ {name}: {err}");
    }
    if unreadable > 0 {
        log::warn!("{unreadable} input(s) could not be read");
    }

    if let Some(path) = &opts.report {
        fs::write(path, report.to_json()?)?;
        eprintln!("Wrote report '{}'", path.display());
    }

    let selections = selections_for(&report, &positions, opts);
    if selections.iter().all(|s| !s.include) {
        return Ok(0);
    }

    if config.combine {
        let bytes = report.assemble(&selections)?;
        let output = opts
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(config.output_file_name()));
        write_output(&output, &bytes)?;
        Ok(1)
    } else {
        let dir = opts.output.clone().unwrap_or_else(|| PathBuf::from("unified"));
        let ordered = report.ordered(&selections);
        for (name, converted) in &ordered {
            write_output(&dir.join(output_name(name)), &converted.bytes)?;
        }
        Ok(ordered.len())
    }
}

/// One selection per successful document. `--order` positions and
/// `--exclude` names refer to the inputs as given on the command line.
fn selections_for(report: &BatchReport, positions: &[u32], opts: &Options) -> Vec<Selection> {
    report
        .outcomes
        .iter()
        .zip(positions.iter().copied())
        .filter(|(outcome, _)| outcome.result.is_ok())
        .map(|(outcome, position)| Selection {
            include: !opts.exclude.iter().any(|x| *x == outcome.name),
            order: opts
                .order
                .get(position as usize - 1)
                .copied()
                .unwrap_or(position),
        })
        .collect()
}

fn output_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    format!("{stem}.pdf")
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), ConvertError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, bytes)?;
    eprintln!("Wrote '{}' ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn print_usage(prog: &str) {
    eprintln!("unify – normalize HTML, images and PDFs into one PDF (pdf-unify)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <inputs...> [-o out.pdf] [flags]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <inputs...>    .html/.htm, .pdf and image files to convert");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --output, -o        Merged PDF path, or the directory with --separate");
    eprintln!("  --separate          Write one PDF per input instead of merging");
    eprintln!("  --config, -c        JSON pipeline config; flags override it");
    eprintln!("  --margin-mm N       Left/right margin in mm (clamped to 5..=25)");
    eprintln!("  --page-size S       A4 or Letter");
    eprintln!("  --landscape, -l     Landscape orientation");
    eprintln!("  --no-preserve-layout  Pin paper size and orientation in @page");
    eprintln!("  --no-sanitize       Send the first tier without CSS filtering");
    eprintln!("  --title, -t         Document title in PDF metadata");
    eprintln!("  --renderer CMD      External renderer, e.g. \"wkhtmltopdf {{input}} {{output}}\"");
    eprintln!("  --order 2,1,3       Output position of each input");
    eprintln!("  --exclude NAME      Leave an input out of the output (repeatable)");
    eprintln!("  --report PATH       Write a JSON conversion report");
    eprintln!("  --lenient           Built-in renderer accepts unsupported CSS");
    eprintln!("  --help              Print this message");
}
