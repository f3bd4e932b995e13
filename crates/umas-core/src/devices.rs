//! Helpers for worker and device selection strings.

use crate::error::{Result, UmasError};

/// Parse a list such as `"1-3, 5, 7-8"` into `[1, 2, 3, 5, 7, 8]`.
///
/// Items are separated by whitespace, `,`, `;` or `:`. `a-b` expands to the
/// inclusive range; an empty range (`b < a`) contributes nothing.
pub fn parse_int_list(input: &str) -> Result<Vec<i64>> {
    let invalid = |message: String| UmasError::InvalidIntList {
        input: input.to_string(),
        message,
    };
    let parse = |token: &str| {
        token
            .trim()
            .parse::<i64>()
            .map_err(|e| invalid(format!("{:?}: {}", token, e)))
    };

    let mut values = Vec::new();
    for block in input
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':'))
        .filter(|block| !block.is_empty())
    {
        match block.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (parse(start)?, parse(end)?);
                values.extend(start..=end);
            }
            None => values.push(parse(block)?),
        }
    }
    Ok(values)
}

/// Assign a device to each of `num_workers` workers.
///
/// Worker `i` gets `cuda:{gpus[i]}` while GPUs remain and `cpu` afterwards.
pub fn device_list(num_workers: usize, gpus: &[i64]) -> Vec<String> {
    (0..num_workers)
        .map(|i| match gpus.get(i) {
            Some(gpu) => format!("cuda:{}", gpu),
            None => "cpu".to_string(),
        })
        .collect()
}
