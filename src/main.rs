//! Command-line interface for listing and extracting ZIP archives, local or
//! remote. Remote archives are accessed through HTTP Range requests so only
//! the members actually extracted are downloaded.

use anyhow::Result;
use clap::Parser;
use std::fs::File;
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use rangezip::{Cli, MemberEntry, RemoteArchive, ZipReader};

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.is_http_url() {
        let mut archive = RemoteArchive::builder(&cli.file)
            .initial_buffer_size(cli.buffer_size)
            .support_suffix_range(!cli.no_suffix_range)
            .open()?;
        process(&mut archive, &cli)?;

        if !cli.is_quiet() {
            eprintln!(
                "\nTotal bytes transferred: {}",
                format_size(archive.transferred_bytes())
            );
        }
    } else {
        let mut archive = ZipReader::new(File::open(Path::new(&cli.file))?)?;
        process(&mut archive, &cli)?;
    }

    Ok(())
}

/// List or extract according to the CLI options.
fn process<R: Read + Seek>(archive: &mut ZipReader<R>, cli: &Cli) -> Result<()> {
    if cli.list || cli.verbose {
        return list_files(archive.entries(), cli.verbose);
    }

    // Pick the members to extract: skip directories, honor the positional
    // name/glob filters and the -x exclusions.
    let selected: Vec<MemberEntry> = archive
        .entries()
        .iter()
        .filter(|e| {
            if e.is_directory {
                return false;
            }
            if !cli.files.is_empty() {
                let matches = cli.files.iter().any(|f| {
                    if has_glob_chars(f) {
                        glob_match(f, &e.name)
                    } else {
                        let basename = Path::new(&e.name)
                            .file_name()
                            .map(|s| s.to_string_lossy())
                            .unwrap_or_default();
                        e.name == *f || basename == *f
                    }
                });
                if !matches {
                    return false;
                }
            }
            !cli
                .exclude
                .iter()
                .any(|x| e.name.contains(x) || glob_match(x, &e.name))
        })
        .cloned()
        .collect();

    let multiple_files = cli.pipe && selected.len() > 1;
    for entry in &selected {
        extract_file(archive, entry, cli, multiple_files)?;
    }

    Ok(())
}

/// Print the archive listing, either plain names or an unzip-style table.
fn list_files(entries: &[MemberEntry], verbose: bool) -> Result<()> {
    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in entries {
        if verbose {
            let (year, month, day) = entry.mod_date();
            let (hour, minute, _second) = entry.mod_time();
            let ratio = compression_ratio(entry.compressed_size, entry.uncompressed_size);

            println!(
                "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
                entry.uncompressed_size,
                entry.compressed_size,
                ratio,
                year,
                month,
                day,
                hour,
                minute,
                entry.name
            );

            if !entry.is_directory {
                total_uncompressed += entry.uncompressed_size;
                total_compressed += entry.compressed_size;
                file_count += 1;
            }
        } else {
            println!("{}", entry.name);
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        let total_ratio = compression_ratio(total_compressed, total_uncompressed);
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed, total_compressed, total_ratio, "", file_count
        );
    }

    Ok(())
}

fn compression_ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// Extract a single member to stdout or to disk, honoring the overwrite and
/// path options.
fn extract_file<R: Read + Seek>(
    archive: &mut ZipReader<R>,
    entry: &MemberEntry,
    cli: &Cli,
    show_filename: bool,
) -> Result<()> {
    if cli.pipe {
        let stdout = io::stdout();
        let mut stdout = stdout.lock();
        if show_filename {
            writeln!(stdout, "--- {} ---", entry.name)?;
        }
        let mut member = archive.open(entry)?;
        io::copy(&mut member, &mut stdout)?;
        return Ok(());
    }

    let file_name = if cli.junk_paths {
        Path::new(&entry.name)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| entry.name.clone())
    } else {
        entry.name.clone()
    };
    let output_path = match &cli.extract_dir {
        Some(dir) => PathBuf::from(dir).join(&file_name),
        None => PathBuf::from(&file_name),
    };

    if output_path.exists() {
        if cli.never_overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", entry.name);
            }
            return Ok(());
        }
        if !cli.overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", entry.name);
            }
            return Ok(());
        }
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", entry.name);
    }

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut member = archive.open(entry)?;
    let mut file = File::create(&output_path)?;
    io::copy(&mut member, &mut file)?;

    Ok(())
}

/// Whether a pattern contains `*` or `?` wildcards.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Minimal glob matching: `*` matches any run of characters, `?` matches
/// exactly one.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    do_match(&pattern, &text)
}

/// Format a byte count with the unit that fits it.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
