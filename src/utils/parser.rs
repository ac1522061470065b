// Copyright (c) 2024 Mudit Bhargava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//

// parser.rs
//
// This file contains the trace file parser. A trace holds one request per
// line: a single 'r' (read) or 'w' (write) immediately followed by a hex
// address without a 0x prefix.

use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::errors::SimulatorError;
use crate::memory_hierarchy::storage::AccessType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    pub address: u64,
    pub access: AccessType,
}

// Load every record up to end-of-file; the first malformed line ends the
// trace the same way (no partial record is replayed).
pub fn load_trace(path: &Path) -> Result<Vec<TraceRecord>, SimulatorError> {
    let contents = fs::read_to_string(path)?;
    let mut records = Vec::new();

    for line in contents.lines() {
        match parse_record(line) {
            Some(record) => records.push(record),
            None => {
                if !line.trim().is_empty() {
                    warn!("stopping trace at malformed line: {:?}", line);
                }
                break;
            },
        }
    }

    if records.is_empty() {
        return Err(SimulatorError::EmptyTrace(path.display().to_string()));
    }

    info!("loaded {} trace records from {}", records.len(), path.display());
    Ok(records)
}

fn parse_record(line: &str) -> Option<TraceRecord> {
    let line = line.trim();
    let (access, rest) = if let Some(rest) = line.strip_prefix('r') {
        (AccessType::Read, rest)
    } else if let Some(rest) = line.strip_prefix('w') {
        (AccessType::Write, rest)
    } else {
        return None;
    };

    let address = u64::from_str_radix(rest.trim(), 16).ok()?;
    Some(TraceRecord { address, access })
}
