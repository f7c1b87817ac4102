/*!
 * Prompt templates for DDL translation.
 *
 * A shared system template frames the task; per-artifact-type guidance adds
 * the mapping rules that matter for that kind of object. The user prompt
 * carries the record's metadata and the batch context.
 */

use crate::artifacts::{ArtifactRecord, BatchContext};

/// Marker the model must use to decline a record
pub const UNSUPPORTED_MARKER: &str = "-- UNSUPPORTED:";

/// System prompt template for DDL translation.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// The default system prompt for DDL translation.
    pub const DDL_TRANSLATOR: &'static str = r#"You are an expert in migrating {source_dialect} schema objects to {target_dialect}.

## Task
Translate the {artifact_type} object described by the metadata into {target_dialect} DDL.

## Output Requirements
- Return ONLY the SQL statement(s), with no explanation and no markdown fences
- Use fully qualified three-level names (catalog.schema.object) when the metadata provides them
- Preserve comments and tags carried by the metadata
- If the object has no {target_dialect} equivalent, reply with a single line starting with "-- UNSUPPORTED:" followed by the reason

## Type Guidance
{guidance}"#;

    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Create the default DDL translator template.
    pub fn ddl_translator() -> Self {
        Self::new(Self::DDL_TRANSLATOR)
    }

    /// Render the template for one artifact type.
    pub fn render(&self, source_dialect: &str, target_dialect: &str, artifact_type: &str) -> String {
        self.template
            .replace("{source_dialect}", source_dialect)
            .replace("{target_dialect}", target_dialect)
            .replace("{artifact_type}", artifact_type)
            .replace("{guidance}", guidance_for(artifact_type))
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::ddl_translator()
    }
}

/// Mapping rules for one artifact type
pub fn guidance_for(artifact_type: &str) -> &'static str {
    match artifact_type {
        "databases" => "- A database becomes a CATALOG: CREATE CATALOG IF NOT EXISTS <name>\n- Carry the comment with COMMENT '<text>'",
        "schemas" => "- CREATE SCHEMA IF NOT EXISTS <catalog>.<schema>\n- Managed access and transient flags have no equivalent; drop them",
        "tables" => "- Map VARCHAR/TEXT to STRING, NUMBER(p,s) to DECIMAL(p,s), NUMBER without scale to BIGINT, VARIANT/OBJECT to STRING or STRUCT\n- Map TIMESTAMP_NTZ to TIMESTAMP_NTZ and TIMESTAMP_LTZ/TZ to TIMESTAMP\n- Emit USING DELTA; clustering keys become CLUSTER BY\n- Keep column comments and NOT NULL constraints",
        "views" => "- Emit CREATE OR REPLACE VIEW with the fully qualified name\n- Materialized views stay MATERIALIZED VIEW\n- Rewrite positional GROUP BY to explicit columns and convert Snowflake-only functions",
        "stages" => "- External stages become EXTERNAL VOLUMEs or EXTERNAL LOCATIONs over the same URL\n- Internal stages become managed VOLUMEs",
        "external_locations" => "- CREATE EXTERNAL LOCATION IF NOT EXISTS <name> URL '<url>' WITH (STORAGE CREDENTIAL <credential>)",
        "streams" => "- Change tracking maps to Delta change data feed: ALTER TABLE <table> SET TBLPROPERTIES (delta.enableChangeDataFeed = true)",
        "pipes" => "- Continuous COPY INTO pipes become streaming tables reading with read_files or cloud_files\n- Keep the target table and file format options",
        "roles" => "- Roles become account groups; emit the statement that creates or documents the group",
        "grants" => "- Map privileges: USAGE on database to USE CATALOG, USAGE on schema to USE SCHEMA, SELECT stays SELECT, OWNERSHIP becomes ALTER ... OWNER TO\n- Grantees are groups, quoted with backticks",
        "tags" => "- Tags become key/value tags: ALTER <object> SET TAGS ('<key>' = '<value>')",
        "comments" => "- COMMENT ON <object> IS '<text>' for catalogs, schemas and tables; ALTER TABLE ... ALTER COLUMN ... COMMENT for columns",
        "masking_policies" => "- Masking policies become SQL UDFs applied with ALTER TABLE ... ALTER COLUMN ... SET MASK <function>",
        "udfs" => "- SQL UDFs become CREATE OR REPLACE FUNCTION ... RETURNS <type> RETURN <expression>\n- JavaScript UDFs become Python UDFs with LANGUAGE PYTHON",
        "procedures" => "- Stored procedures become SQL scripting procedures or Python notebooks; keep arguments and return types",
        "sequences" => "- Sequences become IDENTITY columns; document the owning table and column",
        "file_formats" => "- File formats have no DDL equivalent; emit the read_files options the format implies as a commented template",
        _ => "- Translate the object to its closest equivalent",
    }
}

/// Builder for the per-record user prompt.
#[derive(Debug, Clone)]
pub struct TranslationPromptBuilder<'a> {
    artifact_type: &'a str,
    record: &'a ArtifactRecord,
    context: Option<&'a BatchContext>,
}

impl<'a> TranslationPromptBuilder<'a> {
    pub fn new(artifact_type: &'a str, record: &'a ArtifactRecord) -> Self {
        Self {
            artifact_type,
            record,
            context: None,
        }
    }

    pub fn with_context(mut self, context: &'a BatchContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn build(&self) -> String {
        let metadata = serde_json::to_string_pretty(self.record.metadata())
            .unwrap_or_else(|_| self.record.metadata().to_string());

        let mut prompt = format!(
            "Translate this {} object: {}\n\nMetadata:\n{}\n",
            self.artifact_type,
            self.record.qualified_name(),
            metadata
        );

        if let Some(body) = self.record.body() {
            prompt.push_str(&format!("\nSource definition:\n{}\n", body));
        }

        if let Some(context) = self.context.filter(|context| !context.is_empty()) {
            prompt.push_str("\nContext:\n");
            for (key, value) in context {
                prompt.push_str(&format!("- {}: {}\n", key, value));
            }
        }

        prompt
    }
}
