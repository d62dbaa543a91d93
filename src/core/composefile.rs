//! Line-oriented helpers over declarative stack content.
//!
//! These deliberately avoid a full document parse: the deploy path treats
//! the content as an opaque blob and only needs a light scan. The
//! attribution rule is indentation-based: a bare-colon line opens a block,
//! and an `image:` line belongs to the nearest preceding open block at
//! equal-or-shallower indent.

use std::collections::BTreeMap;

fn indent_width(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').count()
}

fn is_block_header(trimmed: &str) -> bool {
    trimmed.ends_with(':') && !trimmed.starts_with('#') && !trimmed.contains("image:")
}

/// Extract the service → image mapping from compose content.
pub fn extract_images(content: &[u8]) -> BTreeMap<String, String> {
    let mut images = BTreeMap::new();
    // Stack of open blocks, strictly increasing in indent.
    let mut blocks: Vec<(usize, String)> = Vec::new();

    for line in String::from_utf8_lossy(content).lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let indent = indent_width(line);

        if is_block_header(trimmed) {
            while blocks.last().is_some_and(|(i, _)| *i >= indent) {
                blocks.pop();
            }
            blocks.push((indent, trimmed.trim_end_matches(':').to_string()));
            continue;
        }

        if let Some(image) = trimmed.strip_prefix("image:") {
            let owner = blocks
                .iter()
                .rev()
                .find(|(i, _)| *i <= indent)
                .map(|(_, name)| name.clone());
            if let Some(owner) = owner {
                images.insert(owner, image.trim().to_string());
            }
        }
    }

    images
}

/// Reduce compose content to a single service's block, leaving whatever
/// precedes the `services:` section untouched.
pub fn filter_service(content: &[u8], service_name: &str) -> Vec<u8> {
    let text = String::from_utf8_lossy(content);
    let mut result: Vec<&str> = Vec::new();
    let mut in_services = false;
    let mut in_target = false;
    let mut service_indent = 0usize;

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed == "services:" {
            in_services = true;
            result.push(line);
            continue;
        }

        if !in_services {
            result.push(line);
            continue;
        }

        if trimmed.ends_with(':') && !trimmed.starts_with('#') {
            let name = trimmed.trim_end_matches(':');
            if name == service_name {
                in_target = true;
                service_indent = indent_width(line);
                result.push(line);
            } else {
                in_target = false;
            }
            continue;
        }

        if in_target {
            if indent_width(line) >= service_indent || trimmed.is_empty() {
                result.push(line);
            } else {
                in_target = false;
            }
        }
    }

    let mut filtered = result.join("\n");
    if !filtered.contains("services:") {
        filtered = format!("services:\n{}", filtered);
    }
    filtered.into_bytes()
}
