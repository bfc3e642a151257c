//! Command implementations for the CLI tool.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use sevenz_decode::progress::format_bytes_iec;
use sevenz_decode::read::{FilesystemSink, NullSink};
use sevenz_decode::{
    Archive, EntryStatus, ExtractOptions, ExtractResult, PipelineCache, Selection, Threads,
};

use crate::exit_codes::{ExitCode, error_to_exit_code};
use crate::progress::CliProgress;

type FileArchive = Archive<BufReader<File>>;

/// Configuration for the extract command.
pub struct ExtractConfig<'a> {
    pub archive_path: &'a Path,
    pub output_dir: &'a Path,
    pub names: &'a [String],
    pub preserve_permissions: bool,
    pub quiet: bool,
    pub thread_count: usize,
}

/// List command implementation
pub fn list(archive_path: &Path, technical: bool) -> ExitCode {
    let archive = match open_archive(archive_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    println!("{:>12}  {:>10}  {:<19}  Name", "Size", "CRC", "Modified");
    println!("{}", "-".repeat(60));
    for entry in archive.entries() {
        let crc = entry
            .crc
            .map(|c| format!("{c:08X}"))
            .unwrap_or_default();
        let modified = entry
            .mtime
            .map(|t| t.as_unix_secs().to_string())
            .unwrap_or_default();
        let kind = if entry.is_directory { "/" } else { "" };
        println!(
            "{:>12}  {:>10}  {:<19}  {}{}",
            entry.size, crc, modified, entry.name, kind
        );
    }
    println!("{}", "-".repeat(60));

    let info = archive.info();
    println!(
        "{} entries, {} unpacked, {} packed",
        info.entry_count,
        format_bytes_iec(info.total_size),
        format_bytes_iec(info.packed_size)
    );

    if technical {
        println!();
        println!("Folders:        {}", info.folder_count);
        println!("Solid:          {}", if info.is_solid { "yes" } else { "no" });
        println!("Methods:        {}", info.methods.join(", "));
        println!("Ratio:          {:.1}%", info.compression_ratio() * 100.0);
        if info.sfx_offset > 0 {
            println!("SFX offset:     {}", info.sfx_offset);
        }
        if info.encoded_header_depth > 0 {
            println!("Encoded header: {} level(s)", info.encoded_header_depth);
        }
        if let Some(comment) = info.comment() {
            println!("Comment:        {comment}");
        }
    }

    ExitCode::Success
}

/// Test command implementation
pub fn test(archive_path: &Path, names: &[String], quiet: bool, thread_count: usize) -> ExitCode {
    let archive = match open_archive(archive_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let selection = match select(&archive, names) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let options = ExtractOptions::new()
        .test_only(true)
        .threads(threads(thread_count));
    let mut progress = CliProgress::new(quiet);
    progress.set_message("Testing...");

    let mut cache = PipelineCache::new(options.cache_capacity);
    let result = archive.extract_with(
        &selection,
        &mut NullSink::new(),
        &options,
        &mut cache,
        &mut progress,
    );
    finish(result, &progress, "Everything is Ok")
}

/// Extract command implementation
pub fn extract(config: &ExtractConfig<'_>) -> ExitCode {
    let archive = match open_archive(config.archive_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let selection = match select(&archive, config.names) {
        Ok(s) => s,
        Err(code) => return code,
    };

    if let Err(e) = std::fs::create_dir_all(config.output_dir) {
        eprintln!("Error creating output directory: {e}");
        return ExitCode::IoError;
    }

    let options = ExtractOptions::new().threads(threads(config.thread_count));
    let mut sink =
        FilesystemSink::new(config.output_dir).preserve_permissions(config.preserve_permissions);
    let mut progress = CliProgress::new(config.quiet);
    progress.set_message("Extracting...");

    let mut cache = PipelineCache::new(options.cache_capacity);
    let result = archive.extract_with(&selection, &mut sink, &options, &mut cache, &mut progress);
    finish(result, &progress, "Done")
}

fn open_archive(path: &Path) -> Result<FileArchive, ExitCode> {
    Archive::open_path(path).map_err(|e| {
        eprintln!("Error opening {}: {e}", path.display());
        error_to_exit_code(&e)
    })
}

fn threads(count: usize) -> Threads {
    match count {
        0 => Threads::Auto,
        n => Threads::count_or_single(n),
    }
}

fn select(archive: &FileArchive, names: &[String]) -> Result<Selection, ExitCode> {
    if names.is_empty() {
        return Ok(Selection::All);
    }

    let mut indices = Vec::with_capacity(names.len());
    for name in names {
        match archive.entry_index(name) {
            Some(index) => indices.push(index),
            None => {
                eprintln!("Error: no entry named '{name}'");
                return Err(ExitCode::BadArgs);
            }
        }
    }
    Ok(Selection::indices(indices))
}

fn finish(
    result: sevenz_decode::Result<ExtractResult>,
    progress: &CliProgress,
    ok_message: &str,
) -> ExitCode {
    let result = match result {
        Ok(r) => r,
        Err(e) => {
            progress.finish_with_message("Failed");
            eprintln!("Error: {e}");
            return error_to_exit_code(&e);
        }
    };

    if result.is_ok() {
        progress.finish_with_message(ok_message.to_string());
    } else {
        progress.finish_with_message(format!("{} failed", progress.failed()));
    }

    for failure in result.failures() {
        let reason = match &failure.status {
            EntryStatus::Unsupported { reason } => format!("unsupported: {reason}"),
            EntryStatus::DataError { reason } => format!("data error: {reason}"),
            EntryStatus::CrcMismatch { expected, actual } => {
                format!("CRC mismatch (expected {expected:08X}, got {actual:08X})")
            }
            EntryStatus::Ok => continue,
        };
        eprintln!("{}: {reason}", failure.name);
    }

    println!(
        "{} entries, {} ok, {} failed, {} decoded",
        result.entries.len(),
        result.entries_succeeded(),
        result.entries_failed(),
        format_bytes_iec(result.bytes_produced)
    );

    if result.is_ok() {
        ExitCode::Success
    } else {
        ExitCode::Warning
    }
}
