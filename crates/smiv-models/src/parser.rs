// SPDX-License-Identifier: AGPL-3.0-only

//! Network description parser
//!
//! Line-oriented text format, one layer per line:
//!
//! ```text
//! # comments start with '#'
//! name   lenet
//! input  28 28 1                         # rows cols channels
//! conv   8 3 stride=1 pad=1 act=relu     # kernels size
//! pool   max 2 stride=2                  # kind size
//! fc     64 act=relu                     # outputs
//! softmax
//! ```
//!
//! `name` is optional and `input` must precede every layer line.

use crate::error::{ModelError, Result};
use crate::network::{Activation, Network, NetworkBuilder, PoolingKind};
use std::collections::HashMap;
use std::path::Path;

/// Parse a network description from a file
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Network> {
    let path = path.as_ref();
    tracing::info!("Loading network from: {}", path.display());
    if !path.exists() {
        return Err(ModelError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path)?;
    let default_name = path
        .file_stem()
        .map_or_else(|| "network".to_string(), |s| s.to_string_lossy().into_owned());
    parse_str(&text, &default_name)
}

/// Parse a network description from text
///
/// # Errors
///
/// Returns error on unknown directives, malformed numbers, missing `input`
/// line, or invalid layer geometry.
pub fn parse_str(text: &str, default_name: &str) -> Result<Network> {
    let mut name = default_name.to_string();
    let mut builder: Option<NetworkBuilder> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut words = line.split_whitespace();
        let Some(directive) = words.next() else {
            continue;
        };
        let (positional, options) = split_args(words, line_no)?;

        match directive {
            "name" => {
                let [n] = expect_positional::<1>(&positional, "name", line_no)?;
                name = n.to_string();
            }
            "input" => {
                if builder.is_some() {
                    return Err(ModelError::parse_error(line_no, "duplicate `input` line"));
                }
                let [r, c, ch] = expect_positional::<3>(&positional, "input", line_no)?;
                builder = Some(NetworkBuilder::new(
                    name.clone(),
                    number(r, line_no)?,
                    number(c, line_no)?,
                    number(ch, line_no)?,
                ));
            }
            "conv" => {
                let b = require_input(builder.take(), line_no)?;
                let [k, size] = expect_positional::<2>(&positional, "conv", line_no)?;
                builder = Some(b.conv(
                    number(k, line_no)?,
                    number(size, line_no)?,
                    option_number(&options, "stride", 1, line_no)?,
                    option_number(&options, "pad", 0, line_no)?,
                    activation(&options, line_no)?,
                ));
            }
            "pool" => {
                let b = require_input(builder.take(), line_no)?;
                let [kind, size] = expect_positional::<2>(&positional, "pool", line_no)?;
                let kind: PoolingKind = kind
                    .parse()
                    .map_err(|e: ModelError| ModelError::parse_error(line_no, e.to_string()))?;
                let size = number(size, line_no)?;
                builder = Some(b.pool(kind, size, option_number(&options, "stride", size, line_no)?));
            }
            "fc" => {
                let b = require_input(builder.take(), line_no)?;
                let [n] = expect_positional::<1>(&positional, "fc", line_no)?;
                builder = Some(b.fc(number(n, line_no)?, activation(&options, line_no)?));
            }
            "softmax" => {
                let b = require_input(builder.take(), line_no)?;
                expect_positional::<0>(&positional, "softmax", line_no)?;
                builder = Some(b.softmax());
            }
            other => {
                return Err(ModelError::parse_error(
                    line_no,
                    format!("unknown directive `{other}`"),
                ));
            }
        }
    }

    let network = builder
        .ok_or_else(|| ModelError::parse_error(0, "missing `input` line"))?
        .build()?;
    tracing::debug!("Parsed network `{}` ({} layers)", network.name(), network.depth());
    Ok(network)
}

fn split_args<'a>(
    words: impl Iterator<Item = &'a str>,
    line_no: usize,
) -> Result<(Vec<&'a str>, HashMap<&'a str, &'a str>)> {
    let mut positional = Vec::new();
    let mut options = HashMap::new();
    for word in words {
        if let Some((key, value)) = word.split_once('=') {
            if options.insert(key, value).is_some() {
                return Err(ModelError::parse_error(
                    line_no,
                    format!("option `{key}` given twice"),
                ));
            }
        } else if options.is_empty() {
            positional.push(word);
        } else {
            return Err(ModelError::parse_error(
                line_no,
                format!("positional argument `{word}` after options"),
            ));
        }
    }
    Ok((positional, options))
}

fn expect_positional<'a, const N: usize>(
    args: &[&'a str],
    directive: &str,
    line_no: usize,
) -> Result<[&'a str; N]> {
    <[&str; N]>::try_from(args).map_err(|_| {
        ModelError::parse_error(
            line_no,
            format!("`{directive}` takes {N} argument(s), got {}", args.len()),
        )
    })
}

fn require_input(builder: Option<NetworkBuilder>, line_no: usize) -> Result<NetworkBuilder> {
    builder.ok_or_else(|| ModelError::parse_error(line_no, "layer before `input` line"))
}

fn number(word: &str, line_no: usize) -> Result<usize> {
    word.parse()
        .map_err(|_| ModelError::parse_error(line_no, format!("expected a number, got `{word}`")))
}

fn option_number(
    options: &HashMap<&str, &str>,
    key: &str,
    default: usize,
    line_no: usize,
) -> Result<usize> {
    options
        .get(key)
        .map_or(Ok(default), |value| number(value, line_no))
}

fn activation(options: &HashMap<&str, &str>, line_no: usize) -> Result<Activation> {
    options.get("act").map_or(Ok(Activation::None), |value| {
        value
            .parse()
            .map_err(|e: ModelError| ModelError::parse_error(line_no, e.to_string()))
    })
}
