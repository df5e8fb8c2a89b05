use assetlift_protocol::types::UploadPart;

use crate::TransferError;

/// Validates that `parts` is non-empty and numbered `1..=n` in order.
pub fn validate_parts(parts: &[UploadPart]) -> Result<(), TransferError> {
    if parts.is_empty() {
        return Err(TransferError::InvalidParts("no parts".into()));
    }

    for (index, part) in parts.iter().enumerate() {
        let expected = index as u32 + 1;
        if part.part_number != expected {
            return Err(TransferError::InvalidParts(format!(
                "expected part {expected}, found {}",
                part.part_number
            )));
        }
        if part.url.is_empty() {
            return Err(TransferError::InvalidParts(format!(
                "part {expected} has no destination URL"
            )));
        }
    }

    Ok(())
}

/// Validates uploader knobs.
pub fn validate_options(chunk_size: u64, parallelism: usize) -> Result<(), TransferError> {
    if chunk_size == 0 {
        return Err(TransferError::InvalidChunkSize(chunk_size));
    }
    if parallelism == 0 {
        return Err(TransferError::InvalidParallelism(parallelism));
    }
    Ok(())
}
