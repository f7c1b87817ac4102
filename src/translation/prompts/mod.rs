/*!
 * Prompt construction for DDL translation.
 *
 * This module provides:
 * - The system prompt template shared by every artifact type
 * - Per-artifact-type mapping guidance
 * - The per-record user prompt builder
 */

pub mod templates;

// Re-export main types
pub use templates::{PromptTemplate, TranslationPromptBuilder, UNSUPPORTED_MARKER, guidance_for};
