//! YAML frontmatter parsing.
//!
//! ```text
//! ---
//! title: Hello
//! tags: [a, b]
//! ---
//! body...
//! ```

use crate::{FrontmatterSample, NbhdError};

const FENCE: &str = "---";

/// Split a markdown document into its frontmatter and body.
///
/// A document without an opening fence, or whose fence is never closed, has
/// no frontmatter: the map is empty and the body is the whole text. YAML
/// dates are not resolved by `serde_yaml` and stay strings.
///
/// # Errors
///
/// `InvalidTemplate` if the fenced block is not valid YAML or not a mapping
/// with string keys.
pub fn parse_frontmatter(text: &str) -> Result<(FrontmatterSample, &str), NbhdError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let Some((yaml, body)) = split_fences(text) else {
        return Ok((FrontmatterSample::new(), text));
    };

    let parsed: serde_yaml::Value = serde_yaml::from_str(yaml)
        .map_err(|e| NbhdError::InvalidTemplate(format!("frontmatter YAML: {e}")))?;

    let map = match parsed {
        serde_yaml::Value::Null => FrontmatterSample::new(),
        serde_yaml::Value::Mapping(_) => match serde_json::to_value(&parsed) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => {
                return Err(NbhdError::InvalidTemplate(
                    "frontmatter is not a mapping".to_string(),
                ));
            }
            Err(e) => {
                return Err(NbhdError::InvalidTemplate(format!(
                    "frontmatter keys must be strings: {e}"
                )));
            }
        },
        _ => {
            return Err(NbhdError::InvalidTemplate(
                "frontmatter is not a mapping".to_string(),
            ));
        }
    };

    Ok((map, body))
}

/// `(yaml, body)` if the text opens and closes a fence.
fn split_fences(text: &str) -> Option<(&str, &str)> {
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != FENCE {
        return None;
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if line.trim_end() == FENCE {
            return Some((&text[yaml_start..offset], &text[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}
