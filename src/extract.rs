use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::sync::LazyLock;

use flate2::read::MultiGzDecoder;
use regex::Regex;

use crate::error::KiraError;

/// Image URLs pulled out of a log. Only membership matters.
pub type FailedUrls = BTreeSet<String>;

// Anything after the extension (query strings included) is not captured.
static IMAGE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+\.(?i:jpe?g|png)").expect("static pattern"));

/// Collects every image URL that appears in `line`.
pub fn extract_from_line(line: &str, urls: &mut FailedUrls) {
    for found in IMAGE_URL.find_iter(line) {
        urls.insert(found.as_str().to_string());
    }
}

pub fn extract_from_text(text: &str) -> FailedUrls {
    let mut urls = FailedUrls::new();
    for line in text.lines() {
        extract_from_line(line, &mut urls);
    }
    urls
}

/// Scans a reader one line at a time. Invalid UTF-8 is replaced, not fatal.
pub fn extract_from_reader<R: BufRead>(mut reader: R) -> io::Result<FailedUrls> {
    let mut urls = FailedUrls::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        extract_from_line(&String::from_utf8_lossy(&buf), &mut urls);
    }
    Ok(urls)
}

/// Reads a log file (plain or `.gz`) and returns the image URLs it mentions.
/// Concatenated gzip members are all read, as `gzip -d` does.
pub fn extract_from_log(path: &Path) -> Result<FailedUrls, KiraError> {
    let file = File::open(path).map_err(|err| KiraError::LogRead {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let reader: Box<dyn Read> = if is_gzip(path) {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    extract_from_reader(BufReader::new(reader)).map_err(|err| KiraError::LogRead {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}
