//! # Processing Options
//!
//! Snapshot tipizzato delle opzioni di elaborazione.
//!
//! La stessa struct viene usata per eseguire la pipeline e per essere salvata
//! nel record (`operations`), così la history e una eventuale rielaborazione
//! leggono un'unica forma validata.
//!
//! ## Default:
//! | campo | default |
//! |---|---|
//! | `enhance` | `false` |
//! | `filters` | vuoto |
//! | `resize` | nessuno |
//! | `rotate` | `0` |
//! | `remove_background` | `false` |
//! | `format` | `jpeg` |
//! | `quality` | `85` |

use crate::codec::{OutputFormat, Quality};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named filter. Unknown names are preserved and ignored by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Filter {
    Grayscale,
    Blur,
    Sepia,
    Other(String),
}

impl Filter {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "grayscale" | "greyscale" => Filter::Grayscale,
            "blur" => Filter::Blur,
            "sepia" => Filter::Sepia,
            _ => Filter::Other(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Filter::Grayscale => "grayscale",
            Filter::Blur => "blur",
            Filter::Sepia => "sepia",
            Filter::Other(name) => name,
        }
    }
}

impl From<String> for Filter {
    fn from(value: String) -> Self {
        Filter::parse(&value)
    }
}

impl From<Filter> for String {
    fn from(value: Filter) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact-fit resize target; an omitted edge keeps the source aspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResizeTarget {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ResizeTarget {
    pub fn is_active(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }
}

/// Options for one processing attempt.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    /// Sharpen before any other stage
    pub enhance: bool,
    pub filters: Vec<Filter>,
    pub resize: Option<ResizeTarget>,
    /// Clockwise degrees; 0 skips the stage
    pub rotate: i32,
    /// Flatten transparency onto white
    #[serde(alias = "removeBackground")]
    pub remove_background: bool,
    pub format: OutputFormat,
    pub quality: Quality,
}

impl ProcessingOptions {
    pub fn has_filter(&self, filter: &Filter) -> bool {
        self.filters.contains(filter)
    }

    /// Resize target, only if at least one edge is requested.
    pub fn active_resize(&self) -> Option<ResizeTarget> {
        self.resize.filter(ResizeTarget::is_active)
    }

    /// Short human-readable description for logs.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.enhance {
            parts.push("enhance".to_string());
        }
        if !self.filters.is_empty() {
            let names: Vec<&str> = self.filters.iter().map(Filter::as_str).collect();
            parts.push(format!("filters={}", names.join("+")));
        }
        if let Some(target) = self.active_resize() {
            let edge = |v: Option<u32>| v.map_or("auto".to_string(), |v| v.to_string());
            parts.push(format!("resize={}x{}", edge(target.width), edge(target.height)));
        }
        if self.rotate != 0 {
            parts.push(format!("rotate={}", self.rotate));
        }
        if self.remove_background {
            parts.push("flatten".to_string());
        }
        parts.push(format!("{}@{}", self.format, self.quality.value()));
        parts.join(" ")
    }
}
