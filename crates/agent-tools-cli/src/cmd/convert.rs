use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use adf_model::{Document, WriterOptions, document_to_markdown};
use anyhow::{Context, Result};
use clap::Args;
use md2adf::ConvertOptions;
use rayon::prelude::*;

use crate::config::Config;

#[derive(Args, Debug)]
#[command(after_help = "Examples:
  agent-tools convert notes.md              # Print ADF JSON for one file
  echo '**hi**' | agent-tools convert       # Read markdown from stdin
  agent-tools convert docs/ -o adf/ -j4     # Convert a directory with 4 jobs")]
pub struct ConvertArgs {
    /// Markdown file or directory (stdin when omitted or `-`)
    pub input: Option<PathBuf>,

    /// Output file or directory (stdout for single inputs when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of parallel jobs for directories (defaults to number of CPUs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Pretty-print the JSON
    #[arg(long)]
    pub pretty: bool,

    /// Keep single line breaks as hard breaks
    #[arg(long)]
    pub preserve_line_breaks: bool,
}

#[derive(Args, Debug)]
pub struct ToMarkdownArgs {
    /// ADF JSON file (stdin when omitted or `-`)
    pub input: Option<PathBuf>,

    /// Bullet list marker
    #[arg(long, default_value = "-", value_parser = ["-", "*", "+"])]
    pub bullet: String,
}

/// Settings shared by every file of one run
struct Settings {
    options: ConvertOptions,
    pretty: bool,
}

impl Settings {
    fn render(&self, markdown: &str) -> Result<String> {
        let doc = md2adf::convert_with_options(markdown, &self.options);
        let mut json = if self.pretty {
            serde_json::to_string_pretty(&doc)
        } else {
            serde_json::to_string(&doc)
        }
        .context("Failed to serialize ADF")?;
        json.push('\n');
        Ok(json)
    }
}

pub fn run(config: &Config, args: ConvertArgs, quiet: bool) -> Result<()> {
    let settings = Settings {
        options: ConvertOptions {
            preserve_line_breaks: args.preserve_line_breaks
                || config.convert.preserve_line_breaks.unwrap_or(false),
        },
        pretty: args.pretty || config.convert.pretty.unwrap_or(false),
    };

    match args.input.as_deref() {
        None => convert_stdin(&settings, args.output.as_deref()),
        Some(p) if p == Path::new("-") => convert_stdin(&settings, args.output.as_deref()),
        Some(p) if p.is_file() => convert_file(&settings, p, args.output.as_deref(), quiet),
        Some(p) if p.is_dir() => convert_directory(
            &settings,
            p,
            args.output.as_deref(),
            args.recursive,
            quiet,
            args.jobs,
        ),
        Some(p) => anyhow::bail!("Input path does not exist: {}", p.display()),
    }
}

pub fn run_to_markdown(args: ToMarkdownArgs) -> Result<()> {
    let content = read_input(args.input.as_deref())?;
    let doc: Document = serde_json::from_str(&content).context("Failed to parse ADF document")?;
    let options = WriterOptions {
        bullet: args.bullet.chars().next().unwrap_or('-'),
    };
    print!("{}", document_to_markdown(&doc, &options));
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => {
            fs::read_to_string(p).with_context(|| format!("Failed to read: {}", p.display()))
        }
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn convert_stdin(settings: &Settings, output: Option<&Path>) -> Result<()> {
    let markdown = read_input(None)?;
    let json = settings.render(&markdown)?;
    match output {
        Some(path) => write_output(path, &json),
        None => {
            print!("{json}");
            Ok(())
        }
    }
}

/// Convert a single markdown file
fn convert_file(
    settings: &Settings,
    input: &Path,
    output: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    tracing::debug!(input = %input.display(), "converting file");
    let markdown =
        fs::read_to_string(input).with_context(|| format!("Failed to read: {}", input.display()))?;
    let json = settings.render(&markdown)?;

    match output {
        Some(path) => {
            write_output(path, &json)?;
            if !quiet {
                println!("{}", path.display());
            }
        }
        None => print!("{json}"),
    }
    Ok(())
}

/// Convert a directory of markdown files, one `.json` per input
fn convert_directory(
    settings: &Settings,
    input: &Path,
    output: Option<&Path>,
    recursive: bool,
    quiet: bool,
    jobs: Option<usize>,
) -> Result<()> {
    let output_dir = output.unwrap_or(input);
    let files = collect_markdown_files(input, recursive)?;

    if files.is_empty() {
        if !quiet {
            eprintln!("No markdown files found in {}", input.display());
        }
        return Ok(());
    }
    tracing::info!(count = files.len(), dir = %input.display(), "found markdown files");

    if let Some(n) = jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .ok(); // Ignore error if already initialized
    }

    let success = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let errors: Vec<_> = files
        .par_iter()
        .filter_map(|file| {
            let relative = file.strip_prefix(input).unwrap_or(file);
            let output_file = output_dir.join(relative).with_extension("json");

            let result = fs::read_to_string(file)
                .with_context(|| format!("Failed to read: {}", file.display()))
                .and_then(|markdown| settings.render(&markdown))
                .and_then(|json| write_output(&output_file, &json));

            match result {
                Ok(()) => {
                    success.fetch_add(1, Ordering::Relaxed);
                    if !quiet {
                        println!("{}", output_file.display());
                    }
                    None
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    Some((file.clone(), e))
                }
            }
        })
        .collect();

    for (file, e) in &errors {
        eprintln!("Error converting {}: {:#}", file.display(), e);
    }

    let success_count = success.load(Ordering::Relaxed);
    let failed_count = failed.load(Ordering::Relaxed);

    if !quiet {
        eprintln!("Converted {} files, {} failed", success_count, failed_count);
    }

    if failed_count > 0 {
        anyhow::bail!("{} files failed to convert", failed_count);
    }

    Ok(())
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write: {}", path.display()))
}

/// Collect all `.md` / `.markdown` files in a directory, sorted
fn collect_markdown_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();

        if path.is_file() {
            let is_markdown = path.extension().is_some_and(|ext| {
                ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown")
            });
            if is_markdown {
                files.push(path);
            }
        } else if path.is_dir() && recursive {
            files.extend(collect_markdown_files(&path, recursive)?);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_respects_options() {
        let compact = Settings {
            options: ConvertOptions::default(),
            pretty: false,
        };
        assert_eq!(
            compact.render("").unwrap(),
            "{\"type\":\"doc\",\"version\":1,\"content\":[]}\n"
        );

        let breaks = Settings {
            options: ConvertOptions {
                preserve_line_breaks: true,
            },
            pretty: true,
        };
        let json = breaks.render("a\nb").unwrap();
        assert!(json.contains("hardBreak"));
        assert!(json.contains("\n  \"version\": 1"));
    }

    #[test]
    fn collects_markdown_files() {
        let dir = std::env::temp_dir().join(format!("agent-tools-collect-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("b.md"), "b").unwrap();
        fs::write(dir.join("a.MARKDOWN"), "a").unwrap();
        fs::write(dir.join("notes.txt"), "x").unwrap();
        fs::write(dir.join("sub/c.md"), "c").unwrap();

        let names = |files: Vec<PathBuf>| -> Vec<String> {
            files
                .iter()
                .map(|f| f.strip_prefix(&dir).unwrap().to_string_lossy().replace('\\', "/"))
                .collect()
        };
        assert_eq!(
            names(collect_markdown_files(&dir, false).unwrap()),
            vec!["a.MARKDOWN", "b.md"]
        );
        assert_eq!(
            names(collect_markdown_files(&dir, true).unwrap()),
            vec!["a.MARKDOWN", "b.md", "sub/c.md"]
        );
        let _ = fs::remove_dir_all(&dir);
    }
}
