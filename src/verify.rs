//! The `validate` command: schema checks, plus an optional header check
//! against a sample input.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::{info, warn};

use crate::{
    cli::ValidateArgs,
    engine,
    error::MappingError,
    io_utils,
    schema::Schema,
    validator::{self, HeaderMap},
};

pub fn execute(args: &ValidateArgs) -> Result<()> {
    let sample = match &args.input {
        Some(path) => Some(io_utils::read_input(path)?),
        None => None,
    };
    let mut failures = 0usize;
    for path in &args.schemas {
        match check_schema(path, sample.as_deref(), args.fixed_location) {
            Ok(()) => info!("✓ {path:?} is valid"),
            Err(err) => {
                warn!("✗ {path:?}: {err:#}");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        return Err(anyhow!(
            "{failures} of {} schema(s) failed validation",
            args.schemas.len()
        ));
    }
    Ok(())
}

fn check_schema(path: &Path, sample: Option<&[u8]>, fixed_location: bool) -> Result<()> {
    let schema = Schema::load(path).with_context(|| format!("Loading schema from {path:?}"))?;
    validator::validate(&schema, fixed_location)?;
    if let Some(bytes) = sample {
        check_sample(&schema, bytes)?;
    }
    Ok(())
}

/// Resolves the schema's header columns against the sample's header row.
pub fn check_sample(schema: &Schema, bytes: &[u8]) -> Result<(), MappingError> {
    if schema.effective_header_row_count() == 0 {
        return Ok(());
    }
    let encoding = io_utils::resolve_encoding(schema.encoding.as_deref())?;
    let text = io_utils::decode_text(bytes, encoding)?;
    let header = engine::sample_header(schema, &text)?;
    HeaderMap::build(schema, &header).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnSource;

    fn schema() -> Schema {
        Schema {
            preface_ends_with: Some("#".to_string()),
            location: Some(ColumnSource::header("Site")),
            ..Schema::default()
        }
    }

    #[test]
    fn sample_header_after_preface_is_checked() {
        assert!(check_sample(&schema(), b"Logger 7\n#\nSite,Stage\nA,1\n").is_ok());
        assert!(matches!(
            check_sample(&schema(), b"Logger 7\n#\nStation,Stage\n"),
            Err(MappingError::AllHeadersMissing)
        ));
    }
}
