use crate::errors::{Result, VidSearchError};

/// Parse one raw line of extractor output into an embedding vector.
///
/// The classifier writes lines of the form `...,v1_v2_..._vN`: the vector is
/// the segment after the last comma, with components underscore-delimited.
/// Fails on an empty line, a non-numeric token, or a length other than `dim`.
pub fn parse_raw_vector(line: &str, dim: usize) -> Result<Vec<f32>> {
    if line.trim().is_empty() {
        return Err(VidSearchError::Parse("empty vector line".to_string()));
    }

    let segment = line.rsplit(',').next().unwrap_or(line);

    let vector = segment
        .split('_')
        .map(|token| {
            token.trim().parse::<f32>().map_err(|_| {
                VidSearchError::Parse(format!("non-numeric component: {token:?}"))
            })
        })
        .collect::<Result<Vec<f32>>>()?;

    if vector.len() != dim {
        return Err(VidSearchError::InvalidDimension {
            expected: dim,
            actual: vector.len(),
        });
    }

    Ok(vector)
}
