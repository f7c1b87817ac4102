/*!
 * The closed set of artifact types known to the migration engine.
 *
 * Artifact types are plain strings on the wire, but only the names listed
 * here are routable. Input files are classified by keywords in their file
 * name; the first matching entry wins, so the keyword table is ordered.
 */

use std::path::Path;

/// Every artifact type the engine can route
pub const ARTIFACT_TYPES: [&str; 17] = [
    "databases",
    "schemas",
    "tables",
    "views",
    "stages",
    "external_locations",
    "streams",
    "pipes",
    "roles",
    "grants",
    "tags",
    "comments",
    "masking_policies",
    "udfs",
    "procedures",
    "sequences",
    "file_formats",
];

// Ordered: "tables" must be tried before looser keywords such as "format"
const FILENAME_KEYWORDS: [(&str, &[&str]); 17] = [
    ("tables", &["table", "tables"]),
    ("views", &["view", "views"]),
    ("schemas", &["schema", "schemas"]),
    ("databases", &["database", "databases", "db"]),
    ("procedures", &["procedure", "procedures", "proc", "procs"]),
    ("roles", &["role", "roles"]),
    ("stages", &["stage", "stages"]),
    ("streams", &["stream", "streams"]),
    ("pipes", &["pipe", "pipes"]),
    ("grants", &["grant", "grants", "grants_flattened"]),
    ("tags", &["tag", "tags"]),
    ("comments", &["comment", "comments"]),
    ("masking_policies", &["masking_policy", "masking_policies", "masking", "policy"]),
    ("udfs", &["udf", "udfs", "function", "functions"]),
    ("sequences", &["sequence", "sequences"]),
    ("file_formats", &["file_format", "file_formats", "format", "formats"]),
    ("external_locations", &["external_location", "external_locations", "external"]),
];

/// Whether `artifact_type` belongs to the closed set
pub fn is_known_artifact_type(artifact_type: &str) -> bool {
    ARTIFACT_TYPES.contains(&artifact_type)
}

/// Classify an input file by the keywords in its file name
pub fn artifact_type_from_filename(path: &Path) -> Option<&'static str> {
    let basename = path.file_name()?.to_string_lossy().to_lowercase();

    FILENAME_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| basename.contains(keyword)))
        .map(|(artifact_type, _)| *artifact_type)
}

/// The top-level JSON key that holds records of `artifact_type` in an input file
pub fn json_key_for(artifact_type: &str) -> &str {
    match artifact_type {
        "udfs" => "functions",
        "grants" => "grants_flattened",
        other => other,
    }
}
