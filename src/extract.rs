use serde_json::{Map, Value};

pub type Record = Map<String, Value>;

/// Pull the JSON object embedded in a log line.
///
/// The object is taken to span from the first `{` to the last `}` of the line,
/// so prefixes (timestamps, levels, logger names) and suffixes are tolerated.
/// A stray `}` after the real object end makes the slice undecodable and the
/// line yields `None`.
pub fn extract_json(line: &str) -> Option<Record> {
    let first = line.find('{')?;
    let last = line.rfind('}')?;
    if last < first {
        return None;
    }
    match serde_json::from_str::<Value>(&line[first..=last]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
