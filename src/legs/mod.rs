//! Load-path input: text parsing and leg validation.

pub mod format;
pub mod parse;

pub use format::format_legs;
pub use parse::{RawLeg, parse_control, parse_legs_default, parse_legs_table, parse_table_columns};

use crate::config::{LegFormat, PathOptions};
use crate::domain::Path;
use crate::error::DriverError;

/// Parse and validate a path in one go.
///
/// Parse and format errors are reported together; formatting is skipped only
/// when parsing produced no usable legs.
pub fn build_path(text: &str, opts: &PathOptions) -> Result<Path, DriverError> {
    let (raw, mut errors) = match opts.format {
        LegFormat::Default => parse_legs_default(text),
        LegFormat::Table => parse_legs_table(text, &opts.tblcols, opts.tbltfmt, &opts.tblcfmt),
    };

    if !errors.is_empty() {
        if !raw.is_empty() {
            if let Err(DriverError::InputValidation(more)) = format_legs(&raw, opts) {
                errors.extend(more);
            }
        }
        errors.sort_by_key(|e| e.leg);
        return Err(DriverError::InputValidation(errors));
    }

    format_legs(&raw, opts)
}
