#![forbid(unsafe_code)]

//! Subset of the extractor's `--dump-json` payload plus the audio format
//! selection rules.
//!
//! Numbers that are echoed back to callers stay as `serde_json::Number` so an
//! integer duration is returned as `120` rather than `120.0`.

use std::{cmp::Ordering, collections::HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::extractor::ExtractError;

/// Codec marker the extractor uses for "this stream has no such track".
const NO_CODEC: &str = "none";

/// Description of one video as reported by the extractor. Every field is
/// optional because older or restricted videos routinely lack metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<Number>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub view_count: Option<Number>,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub formats: Vec<FormatRecord>,
}

/// One entry of the extractor's `formats` array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatRecord {
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub abr: Option<Number>,
    #[serde(default)]
    pub tbr: Option<Number>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub filesize: Option<Number>,
    #[serde(default)]
    pub url: Option<String>,
    /// Request headers the media origin expects when the URL is fetched.
    #[serde(default, deserialize_with = "header_map")]
    pub http_headers: HashMap<String, String>,
}

impl FormatRecord {
    /// A record carries audio unless the extractor explicitly says `none`.
    pub fn has_audio(&self) -> bool {
        self.acodec.as_deref() != Some(NO_CODEC)
    }

    pub fn is_audio_only(&self) -> bool {
        self.has_audio() && self.vcodec.as_deref() == Some(NO_CODEC)
    }

    /// `abr`, then `tbr`, skipping missing and zero values.
    pub fn bitrate(&self) -> Option<&Number> {
        [self.abr.as_ref(), self.tbr.as_ref()]
            .into_iter()
            .flatten()
            .find(|value| value.as_f64().is_some_and(|rate| rate != 0.0))
    }

    /// Bitrate echoed to callers: `abr` unless it is missing or zero, then
    /// `tbr` exactly as reported, zero included.
    pub fn reported_bitrate(&self) -> Option<&Number> {
        match self.abr.as_ref() {
            Some(abr) if abr.as_f64().is_some_and(|rate| rate != 0.0) => Some(abr),
            _ => self.tbr.as_ref(),
        }
    }

    fn sort_key(&self) -> f64 {
        self.bitrate().and_then(Number::as_f64).unwrap_or(0.0)
    }
}

/// Picks the highest-bitrate audio stream.
///
/// Audio-only records are preferred; muxed records with an audio track are
/// only considered when no audio-only record exists. Ties keep the order the
/// extractor reported them in.
pub fn select_best_audio(formats: &[FormatRecord]) -> Result<&FormatRecord, ExtractError> {
    let mut candidates: Vec<&FormatRecord> = formats
        .iter()
        .filter(|format| format.is_audio_only())
        .collect();
    if candidates.is_empty() {
        candidates = formats.iter().filter(|format| format.has_audio()).collect();
    }

    // `sort_by` is stable, so equal bitrates retain source order.
    candidates.sort_by(|a, b| {
        b.sort_key()
            .partial_cmp(&a.sort_key())
            .unwrap_or(Ordering::Equal)
    });
    candidates.into_iter().next().ok_or(ExtractError::NoAudio)
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Header maps may be `null` or carry `null` values; both are dropped.
fn header_map<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<HashMap<String, Option<String>>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name, value)))
        .collect())
}
