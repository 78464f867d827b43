use crate::TransferError;

/// Checks the fields required before an upload may start.
///
/// Blank (whitespace-only) values count as missing. Every missing field is
/// reported at once, in form order.
pub fn validate_metadata(
    file_selected: bool,
    title: &str,
    description: &str,
) -> Result<(), TransferError> {
    let mut missing = Vec::new();
    if !file_selected {
        missing.push("File selection");
    }
    if title.trim().is_empty() {
        missing.push("Title");
    }
    if description.trim().is_empty() {
        missing.push("Description");
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(TransferError::MissingFields(missing))
    }
}

/// Title suggested for a freshly selected file: its name up to the first `.`.
pub fn default_title(file_name: &str) -> String {
    file_name.split('.').next().unwrap_or_default().to_string()
}
