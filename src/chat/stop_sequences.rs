// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! In-band stop marker detection

/// A set of markers that end the assistant response where they appear
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopSequences {
    markers: Vec<String>,
}

impl StopSequences {
    /// Empty markers are dropped.
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(Into::into)
                .filter(|m: &String| !m.is_empty())
                .collect(),
        }
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Byte index of the earliest occurrence of any marker
    pub fn find_earliest(&self, text: &str) -> Option<usize> {
        self.markers.iter().filter_map(|m| text.find(m.as_str())).min()
    }

    /// Length of the longest suffix of `text` that is a proper prefix of
    /// some marker. That suffix may still grow into a marker, so it must
    /// not be released yet.
    pub fn holdback_len(&self, text: &str) -> usize {
        self.markers
            .iter()
            .filter_map(|marker| {
                (1..marker.len())
                    .rev()
                    .filter(|&k| marker.is_char_boundary(k))
                    .find(|&k| text.ends_with(&marker[..k]))
            })
            .max()
            .unwrap_or(0)
    }
}

impl From<&[String]> for StopSequences {
    fn from(markers: &[String]) -> Self {
        Self::new(markers.iter().cloned())
    }
}
