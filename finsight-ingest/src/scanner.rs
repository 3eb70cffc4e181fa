//! Structure scanner - locates transaction-like lists in arbitrary JSON
//!
//! Accounting exports nest their rows in unpredictable places
//! (`{"Header": {..}, "Rows": {"Row": [..]}}`, `{"data": {"items": [..]}}`, ...).
//! The scanner walks the whole tree depth-first and reports every array whose
//! first element is a JSON object. All candidates are kept: exports regularly
//! spread rows over several sibling arrays.

use serde_json::{Map, Value};

use crate::error::IngestError;

/// Maximum container nesting the scanner will follow.
pub const MAX_SCAN_DEPTH: usize = 64;

/// Every array in `root` whose first element is an object, in discovery order.
pub fn find_candidate_arrays(root: &Value) -> Result<Vec<&[Value]>, IngestError> {
    let mut found = Vec::new();
    visit(root, 0, &mut found)?;
    Ok(found)
}

/// Flattened record stream over all candidate arrays.
///
/// Non-object elements inside a candidate array are ignored. When the
/// document holds no candidate array at all but the root is an object, the
/// root itself is the only candidate.
pub fn collect_candidates(root: &Value) -> Result<Vec<&Map<String, Value>>, IngestError> {
    let arrays = find_candidate_arrays(root)?;

    if arrays.is_empty() {
        return Ok(root.as_object().into_iter().collect());
    }

    Ok(arrays
        .into_iter()
        .flat_map(|items| items.iter().filter_map(Value::as_object))
        .collect())
}

/// Reject raw JSON whose bracket nesting is deeper than the scanner follows.
///
/// Runs before parsing, so documents nested past the JSON parser's own
/// recursion limit still report `DepthExceeded` rather than a parse failure.
/// Brackets inside string literals are not counted.
pub fn check_raw_nesting(content: &[u8]) -> Result<(), IngestError> {
    // the root container sits at depth 0
    let max_containers = MAX_SCAN_DEPTH + 1;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for &byte in content {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                if depth > max_containers {
                    return Err(IngestError::DepthExceeded {
                        limit: MAX_SCAN_DEPTH,
                    });
                }
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

fn visit<'a>(
    value: &'a Value,
    depth: usize,
    found: &mut Vec<&'a [Value]>,
) -> Result<(), IngestError> {
    match value {
        Value::Array(items) => {
            if depth > MAX_SCAN_DEPTH {
                return Err(IngestError::DepthExceeded {
                    limit: MAX_SCAN_DEPTH,
                });
            }
            if matches!(items.first(), Some(Value::Object(_))) {
                found.push(items.as_slice());
            }
            for item in items {
                visit(item, depth + 1, found)?;
            }
        }
        Value::Object(map) => {
            if depth > MAX_SCAN_DEPTH {
                return Err(IngestError::DepthExceeded {
                    limit: MAX_SCAN_DEPTH,
                });
            }
            for child in map.values() {
                visit(child, depth + 1, found)?;
            }
        }
        _ => {}
    }
    Ok(())
}
